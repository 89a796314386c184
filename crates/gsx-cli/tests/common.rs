#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::assert::Assert;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;

pub fn gsx(project_root: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("gsx");
    cmd.arg("-C").arg(project_root).env("NO_COLOR", "1");
    cmd
}

pub fn catalog_file(project_root: &Path) -> PathBuf {
    project_root.join("metadata").join("project_catalog.json")
}

pub fn read_catalog(project_root: &Path) -> Value {
    let contents = fs::read_to_string(catalog_file(project_root)).expect("read catalog");
    serde_json::from_str(&contents).expect("valid catalog json")
}

pub fn write_catalog(project_root: &Path, value: &Value) {
    let path = catalog_file(project_root);
    fs::create_dir_all(path.parent().expect("metadata dir")).expect("mkdir");
    fs::write(&path, serde_json::to_string_pretty(value).expect("serialize")).expect("write");
}

pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, b"raster").expect("write");
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}
