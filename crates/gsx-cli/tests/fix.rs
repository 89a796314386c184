use serde_json::json;

mod common;

use common::{gsx, parse_json, read_catalog, touch};

#[test]
fn fix_drops_records_whose_files_are_gone() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    gsx(root).arg("init").assert().success();

    let kept = root.join("timeslices_2d").join("kept.tif");
    touch(&kept);
    gsx(root)
        .args(["register", "timeslice", "--crs", "EPSG:32633", "--path"])
        .arg(&kept)
        .assert()
        .success();
    // Registration records whatever it is told; the file never existed.
    gsx(root)
        .args([
            "register",
            "timeslice",
            "--crs",
            "EPSG:32633",
            "--path",
            "timeslices_2d/never_imported.tif",
        ])
        .assert()
        .success();

    let payload = parse_json(&gsx(root).args(["--json", "fix"]).assert().success());
    assert_eq!(payload["details"]["removed_records"], json!(1));

    let catalog = read_catalog(root);
    let slices = catalog["timeslices"].as_array().expect("timeslices");
    assert_eq!(slices.len(), 1);
    assert_eq!(
        slices[0]["project_path"],
        json!(kept.to_string_lossy())
    );
}

#[test]
fn fix_can_backfill_a_crs() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    gsx(root).arg("init").assert().success();

    let slice = root.join("timeslices_2d").join("no_crs.tif");
    touch(&slice);
    gsx(root)
        .args(["register", "timeslice", "--path"])
        .arg(&slice)
        .assert()
        .success();

    let payload = parse_json(
        &gsx(root)
            .args(["--json", "fix", "--assign-crs", "EPSG:32633"])
            .assert()
            .success(),
    );
    assert_eq!(payload["details"]["crs_assigned"], json!(1));

    let catalog = read_catalog(root);
    assert_eq!(catalog["timeslices"][0]["crs"], json!("EPSG:32633"));
}

#[test]
fn keep_flags_leave_the_catalog_alone() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    gsx(root).arg("init").assert().success();
    gsx(root)
        .args([
            "register",
            "timeslice",
            "--path",
            "timeslices_2d/never_imported.tif",
        ])
        .assert()
        .success();

    let payload = parse_json(
        &gsx(root)
            .args([
                "--json",
                "fix",
                "--keep-missing-files",
                "--keep-zgrid",
                "--keep-references",
                "--keep-empty-groups",
            ])
            .assert()
            .success(),
    );
    assert_eq!(payload["details"]["removed_records"], json!(0));
    assert_eq!(payload["message"], json!("applied 0 fix(es)"));

    let catalog = read_catalog(root);
    assert_eq!(catalog["timeslices"].as_array().expect("slices").len(), 1);
}
