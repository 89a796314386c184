use gsx_domain::{CatalogDocument, CATALOG_VERSION, DEFAULT_GROUP_ID};
use serde_json::json;

mod common;

use common::{gsx, read_catalog, touch, write_catalog};

#[test]
fn legacy_catalog_is_upgraded_on_first_load() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();

    let slice = root.join("timeslices_2d").join("old_slice.tif");
    let gram = root.join("radargrams").join("old_gram.tif");
    touch(&slice);
    touch(&gram);

    // Unversioned catalog the way early releases wrote it.
    write_catalog(
        root,
        &json!({
            "timeslices": [
                { "id": "ts_old", "project_path": slice, "crs": "EPSG:32633" }
            ],
            "radargrams": [
                { "id": "rg_old", "project_path": gram, "crs": "EPSG:32633" }
            ]
        }),
    );

    gsx(root).arg("status").assert().success();

    let catalog = read_catalog(root);
    assert_eq!(catalog["catalog_version"], json!(4));
    assert_eq!(catalog["schema_version"], json!(4));
    assert_eq!(catalog["timeslices"][0]["id"], json!("ts_old"));
    assert_eq!(catalog["radargrams"][0]["id"], json!("rg_old"));

    let groups = catalog["raster_groups"].as_array().expect("groups");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["id"], json!("grp_imported"));
    assert_eq!(groups[0]["timeslice_ids"], json!(["ts_old"]));
    assert_eq!(groups[0]["radargram_ids"], json!(["rg_old"]));

    // The upgraded file must also parse as the typed document.
    let doc: CatalogDocument = serde_json::from_value(catalog).expect("typed document");
    assert_eq!(doc.catalog_version, CATALOG_VERSION);
    assert_eq!(doc.timeslices[0].id, "ts_old");
    assert!(doc.group_by_id(DEFAULT_GROUP_ID).is_some());
}

#[test]
fn newer_catalogs_are_never_downgraded() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();

    write_catalog(
        root,
        &json!({
            "catalog_version": 9,
            "schema_version": 9,
            "future_collection": [{ "id": "x_1" }],
            "timeslices": []
        }),
    );

    gsx(root).arg("status").assert().success();

    let catalog = read_catalog(root);
    assert_eq!(catalog["catalog_version"], json!(9));
    assert_eq!(catalog["schema_version"], json!(9));
    assert_eq!(catalog["future_collection"], json!([{ "id": "x_1" }]));
}

#[test]
fn empty_catalog_file_is_treated_as_a_fresh_project() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();

    write_catalog(root, &json!({}));

    gsx(root).arg("status").assert().success();

    let catalog = read_catalog(root);
    assert_eq!(catalog["catalog_version"], json!(4));
    assert_eq!(catalog["raster_groups"][0]["id"], json!("grp_imported"));
}
