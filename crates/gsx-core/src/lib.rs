#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

mod groups;
mod health;
mod outcome;
mod package;
mod registry;
mod store;

pub use groups::{
    add_radargram_to_default_group, add_timeslice_to_default_group, assign_radargrams_to_group,
    assign_timeslices_to_group, create_raster_group, delete_raster_group,
    remove_radargrams_from_group, remove_timeslices_from_group, update_raster_group,
};
pub use health::{apply_quick_fixes, validate_catalog, QuickFixFlags, QuickFixSummary};
pub use outcome::{to_json_response, CommandStatus, ExecutionOutcome};
pub use package::{export_project_package, import_project_package};
pub use registry::{
    add_link, link_surfer_grid_into_project, register_model_3d, register_radargram,
    register_timeslice, register_timeslices_batch, register_vector_layer, ZGridLink,
};
pub use store::{
    catalog_path, default_document, ensure_project_structure, load_catalog, save_catalog,
    CatalogError, CATALOG_DIR, CATALOG_FILE, PROJECT_FOLDERS,
};

pub use gsx_domain::{
    CatalogDocument, GeometryType, LinkRecord, Model3dRecord, RadargramRecord, RasterGroupRecord,
    StorageMode, TimesliceRecord, ValidationReport, VectorLayerRecord, CATALOG_VERSION,
    DEFAULT_GROUP_ID, DEFAULT_GROUP_NAME,
};
