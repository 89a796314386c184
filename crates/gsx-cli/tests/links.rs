use serde_json::json;

mod common;

use common::{gsx, parse_json, read_catalog, touch};

#[test]
fn link_add_records_the_cross_reference() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    gsx(root).arg("init").assert().success();

    let gram = root.join("radargrams").join("line_07.tif");
    touch(&gram);
    let registered = parse_json(
        &gsx(root)
            .args(["--json", "register", "radargram", "--crs", "EPSG:32633", "--path"])
            .arg(&gram)
            .assert()
            .success(),
    );
    let gram_id = registered["details"]["record"]["id"]
        .as_str()
        .expect("radargram id")
        .to_string();

    let payload = parse_json(
        &gsx(root)
            .args([
                "--json",
                "link",
                "add",
                "--radargram",
                &gram_id,
                "--line",
                "line_07",
                "--trace-from",
                "10",
                "--trace-to",
                "240",
                "--confidence",
                "2.5",
            ])
            .assert()
            .success(),
    );
    let record = &payload["details"]["record"];
    assert!(record["id"].as_str().expect("id").starts_with("lnk_"));
    assert_eq!(record["radargram_id"], json!(gram_id));
    // Out-of-range confidence is clamped on save.
    assert_eq!(record["confidence"], json!(1.0));

    let catalog = read_catalog(root);
    assert_eq!(catalog["links"].as_array().expect("links").len(), 1);
    assert_eq!(catalog["links"][0]["trace_from"], json!(10));
}

#[test]
fn surfer_grid_is_copied_and_stamped_onto_the_timeslice() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    gsx(root).arg("init").assert().success();

    let slice = root.join("timeslices_2d").join("slice_120.tif");
    touch(&slice);
    let registered = parse_json(
        &gsx(root)
            .args(["--json", "register", "timeslice", "--crs", "EPSG:32633", "--path"])
            .arg(&slice)
            .assert()
            .success(),
    );
    let slice_id = registered["details"]["records"][0]["id"]
        .as_str()
        .expect("timeslice id")
        .to_string();

    // The source raster sits outside the project, next to its .grd twin.
    let source_raster = temp.path().join("field_data").join("slice_120.tif");
    touch(&source_raster);
    touch(&source_raster.with_extension("grd"));

    let payload = parse_json(
        &gsx(root)
            .args(["--json", "link", "surfer-grid", "--band", "1", "--reference"])
            .arg(&slice)
            .arg("--source")
            .arg(&source_raster)
            .assert()
            .success(),
    );
    assert_eq!(payload["details"]["link"]["timeslice_id"], json!(slice_id));
    assert_eq!(payload["details"]["link"]["z_source"], json!("surfer_grid"));
    assert!(slice.with_extension("grd").is_file());

    let catalog = read_catalog(root);
    assert_eq!(catalog["timeslices"][0]["z_grid_band"], json!(1));
    assert_eq!(catalog["timeslices"][0]["z_source"], json!("surfer_grid"));
}

#[test]
fn surfer_grid_without_a_grid_file_is_a_user_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    gsx(root).arg("init").assert().success();

    let slice = root.join("timeslices_2d").join("slice_a.tif");
    touch(&slice);
    let source = temp.path().join("field_data").join("slice_a.tif");
    touch(&source);

    gsx(root)
        .args(["link", "surfer-grid", "--reference"])
        .arg(&slice)
        .arg("--source")
        .arg(&source)
        .assert()
        .code(1);
}
