use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs_err as fs;
use serde::Serialize;

use gsx_domain::{
    paths_equivalent, utc_now_iso, LinkRecord, Model3dRecord, RadargramRecord, TimesliceRecord,
    VectorLayerRecord,
};

use crate::store::{load_catalog, save_catalog, CatalogError};

/// Register an imported 3D model. The record's id and import timestamp
/// are generated during save when absent.
pub fn register_model_3d(project_root: &Path, record: Model3dRecord) -> Result<Model3dRecord> {
    let mut doc = load_catalog(project_root)?;
    doc.models_3d.push(record);
    save_catalog(project_root, &mut doc)?;
    doc.models_3d
        .last()
        .cloned()
        .context("model record missing after save")
}

pub fn register_radargram(
    project_root: &Path,
    record: RadargramRecord,
) -> Result<RadargramRecord> {
    let mut doc = load_catalog(project_root)?;
    doc.radargrams.push(record);
    save_catalog(project_root, &mut doc)?;
    doc.radargrams
        .last()
        .cloned()
        .context("radargram record missing after save")
}

pub fn register_timeslice(
    project_root: &Path,
    record: TimesliceRecord,
) -> Result<TimesliceRecord> {
    let registered = register_timeslices_batch(project_root, vec![record])?;
    registered
        .into_iter()
        .next()
        .context("timeslice record missing after save")
}

/// Register several time-slices in a single load/save round trip. Ids
/// generated within the batch are guaranteed distinct even when all of
/// them are created in the same second.
pub fn register_timeslices_batch(
    project_root: &Path,
    records: Vec<TimesliceRecord>,
) -> Result<Vec<TimesliceRecord>> {
    let count = records.len();
    let mut doc = load_catalog(project_root)?;
    doc.timeslices.extend(records);
    save_catalog(project_root, &mut doc)?;
    let start = doc.timeslices.len() - count;
    Ok(doc.timeslices[start..].to_vec())
}

/// Upsert a vector layer: match by id first, then by the case-insensitive
/// `(project_path, layer_name)` pair. On update the original `created_at`
/// is preserved and `updated_at` refreshed; on insert both are set to now.
pub fn register_vector_layer(
    project_root: &Path,
    mut record: VectorLayerRecord,
) -> Result<VectorLayerRecord> {
    let mut doc = load_catalog(project_root)?;
    let now = utc_now_iso();

    if record.layer_name.is_empty() {
        record.layer_name = record.name.clone();
    }
    record.name = record.layer_name.clone();
    let name_key = record.layer_name.to_lowercase();

    let existing = doc.vector_layers.iter().position(|known| {
        (!record.id.is_empty() && known.id == record.id)
            || (paths_equivalent(&known.project_path, &record.project_path)
                && known.layer_name.to_lowercase() == name_key)
    });

    let index = match existing {
        Some(index) => {
            let known = &doc.vector_layers[index];
            record.id = known.id.clone();
            record.created_at = known.created_at.clone();
            record.updated_at = now;
            doc.vector_layers[index] = record;
            index
        }
        None => {
            record.created_at = now.clone();
            record.updated_at = now;
            doc.vector_layers.push(record);
            doc.vector_layers.len() - 1
        }
    };

    save_catalog(project_root, &mut doc)?;
    Ok(doc.vector_layers[index].clone())
}

/// Append a link between a radargram and a line and/or time-slice. The
/// referenced ids are not checked here; the validator reports unknowns.
pub fn add_link(project_root: &Path, record: LinkRecord) -> Result<LinkRecord> {
    let mut doc = load_catalog(project_root)?;
    doc.links.push(record);
    save_catalog(project_root, &mut doc)?;
    doc.links
        .last()
        .cloned()
        .context("link record missing after save")
}

/// Result of linking a Surfer z-grid to a raster inside the project.
#[derive(Debug, Clone, Serialize)]
pub struct ZGridLink {
    pub z_source: String,
    pub z_grid_project_path: String,
    pub z_grid_band: i64,
    /// Id of the time-slice record that was updated, when one matched
    /// the reference raster.
    pub timeslice_id: Option<String>,
}

/// Copy a Surfer `.grd` elevation grid next to a reference raster inside
/// the project and stamp the z-grid fields onto the matching time-slice
/// record, when one is registered for that raster.
///
/// `source_path` may be the grid itself or a sibling raster; in the
/// latter case the grid is looked up by swapping the extension to `.grd`.
pub fn link_surfer_grid_into_project(
    project_root: &Path,
    reference_raster_path: &Path,
    source_path: &Path,
    band: Option<i64>,
) -> Result<ZGridLink> {
    let grid_source = resolve_grid_source(source_path)?;
    let destination = reference_raster_path.with_extension("grd");
    if !paths_equivalent(
        &grid_source.to_string_lossy(),
        &destination.to_string_lossy(),
    ) {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&grid_source, &destination)?;
    }

    let band = band.unwrap_or(1);
    let destination_key = destination.to_string_lossy().to_string();
    let reference_key = reference_raster_path.to_string_lossy();

    let mut doc = load_catalog(project_root)?;
    let mut timeslice_id = None;
    if let Some(record) = doc
        .timeslices
        .iter_mut()
        .find(|r| paths_equivalent(&r.project_path, &reference_key))
    {
        record.z_source = "surfer_grid".to_string();
        record.z_grid_project_path = destination_key.clone();
        record.z_grid_band = Some(band);
        timeslice_id = Some(record.id.clone());
        save_catalog(project_root, &mut doc)?;
    }

    Ok(ZGridLink {
        z_source: "surfer_grid".to_string(),
        z_grid_project_path: destination_key,
        z_grid_band: band,
        timeslice_id,
    })
}

fn resolve_grid_source(source_path: &Path) -> Result<PathBuf> {
    let is_grid = source_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("grd"));
    let candidate = if is_grid {
        source_path.to_path_buf()
    } else {
        source_path.with_extension("grd")
    };
    if candidate.is_file() {
        Ok(candidate)
    } else {
        Err(CatalogError::MissingGrid(candidate).into())
    }
}
