//! Project catalog document model.
//!
//! A catalog is a single JSON document per project root tracking imported
//! assets (3D models, radargrams, time-slices, vector layers, links, and
//! raster groups). Records are flat mappings related only by string id
//! lookup, so the whole document round-trips through `serde_json` without
//! losing keys written by other tools.

mod migrate;
mod normalize;
mod types;
mod validate;

pub use migrate::{detect_version, migrate_document, MigrationOutcome};
pub use normalize::{
    generate_record_id, merge_member_ids, normalize_document, normalize_records, paths_equivalent,
    utc_compact_stamp, utc_now_iso,
};
pub use types::{
    CatalogDocument, GeometryType, LinkRecord, Model3dRecord, RadargramRecord, RasterGroupRecord,
    StorageMode, TimesliceRecord, VectorLayerRecord, CATALOG_VERSION, DEFAULT_GROUP_ID,
    DEFAULT_GROUP_NAME,
};
pub use validate::{validate_document, ValidationReport};
