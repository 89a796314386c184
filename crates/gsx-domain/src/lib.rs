#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod catalog;

pub use catalog::{
    detect_version, generate_record_id, merge_member_ids, migrate_document, normalize_document,
    normalize_records, paths_equivalent, utc_compact_stamp, utc_now_iso, validate_document,
    CatalogDocument, GeometryType, LinkRecord, MigrationOutcome, Model3dRecord, RadargramRecord,
    RasterGroupRecord, StorageMode, TimesliceRecord, ValidationReport, VectorLayerRecord,
    CATALOG_VERSION, DEFAULT_GROUP_ID, DEFAULT_GROUP_NAME,
};
