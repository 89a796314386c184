use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Current schema version. `catalog_version` and `schema_version` are kept
/// identical on disk; the dual key is part of the compatibility contract
/// with older catalog files.
pub const CATALOG_VERSION: i64 = 4;

/// The catch-all raster group every catalog carries. It cannot be deleted
/// and receives records that drop out of every other group.
pub const DEFAULT_GROUP_ID: &str = "grp_imported";
pub const DEFAULT_GROUP_NAME: &str = "Imported";

/// Root catalog document, one per project folder.
///
/// Collections keep insertion order; order matters for display only.
/// Unknown top-level keys land in `extra` and are written back verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub catalog_version: i64,
    #[serde(default)]
    pub schema_version: i64,
    #[serde(default)]
    pub project_root: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub models_3d: Vec<Model3dRecord>,
    #[serde(default)]
    pub radargrams: Vec<RadargramRecord>,
    #[serde(default)]
    pub timeslices: Vec<TimesliceRecord>,
    #[serde(default)]
    pub vector_layers: Vec<VectorLayerRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
    #[serde(default)]
    pub raster_groups: Vec<RasterGroupRecord>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl CatalogDocument {
    pub fn timeslice_ids(&self) -> Vec<&str> {
        self.timeslices.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn radargram_ids(&self) -> Vec<&str> {
        self.radargrams.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn group_by_id(&self, group_id: &str) -> Option<&RasterGroupRecord> {
        self.raster_groups.iter().find(|g| g.id == group_id)
    }

    pub fn group_by_id_mut(&mut self, group_id: &str) -> Option<&mut RasterGroupRecord> {
        self.raster_groups.iter_mut().find(|g| g.id == group_id)
    }
}

/// Imported 3D point-cloud or volume model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model3dRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub project_path: String,
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub imported_at: String,
    #[serde(default)]
    pub crs: String,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// Imported radargram raster (one survey line profile).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadargramRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub project_path: String,
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub imported_at: String,
    #[serde(default)]
    pub crs: String,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// Horizontal raster slice at a depth interval, optionally backed by a
/// z-grid that supplies per-pixel elevation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimesliceRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub project_path: String,
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub imported_at: String,
    #[serde(default)]
    pub crs: String,
    #[serde(default)]
    pub depth_from: Option<f64>,
    #[serde(default)]
    pub depth_to: Option<f64>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub z_source: String,
    #[serde(default)]
    pub z_grid_project_path: String,
    #[serde(default)]
    pub z_grid_band: Option<i64>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GeometryType {
    Point,
    Line,
    Polygon,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Memory,
    Gpkg,
}

impl StorageMode {
    /// Infer the storage mode from where the layer lives on disk.
    pub fn from_project_path(path: &str) -> Self {
        if path.to_ascii_lowercase().ends_with(".gpkg") {
            StorageMode::Gpkg
        } else {
            StorageMode::Memory
        }
    }
}

/// Registered vector layer (traces, grid cells, annotations).
///
/// `layer_name` and `name` are kept in sync; both spellings exist in
/// catalogs written by earlier releases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorLayerRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub layer_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_path: String,
    #[serde(default)]
    pub geometry_type: GeometryType,
    #[serde(default)]
    pub is_3d: bool,
    #[serde(default)]
    pub crs: String,
    #[serde(default, deserialize_with = "storage_mode_opt")]
    pub storage_mode: Option<StorageMode>,
    #[serde(default)]
    pub source_kind: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

// Unrecognized storage modes in hand-edited catalogs fall back to "absent"
// so the normalizer can re-infer from the path.
fn storage_mode_opt<'de, D>(deserializer: D) -> Result<Option<StorageMode>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|mode| mode.parse().ok()))
}

/// Cross-link between a radargram and the line and/or time-slice it was
/// acquired along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub radargram_id: String,
    #[serde(default)]
    pub line_id: String,
    #[serde(default)]
    pub timeslice_id: String,
    #[serde(default)]
    pub trace_from: Option<i64>,
    #[serde(default)]
    pub trace_to: Option<i64>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

fn default_confidence() -> f64 {
    1.0
}

impl Default for LinkRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            radargram_id: String::new(),
            line_id: String::new(),
            timeslice_id: String::new(),
            trace_from: None,
            trace_to: None,
            confidence: default_confidence(),
            extra: IndexMap::new(),
        }
    }
}

/// Named set of radargram/time-slice ids shown together on the canvas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RasterGroupRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub radargram_ids: Vec<String>,
    #[serde(default)]
    pub timeslice_ids: Vec<String>,
    #[serde(default)]
    pub style_qml_path: String,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl RasterGroupRecord {
    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_GROUP_ID
    }

    pub fn is_empty(&self) -> bool {
        self.radargram_ids.is_empty() && self.timeslice_ids.is_empty()
    }
}
