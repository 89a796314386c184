use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use gsx_domain::{
    generate_record_id, merge_member_ids, CatalogDocument, RasterGroupRecord, DEFAULT_GROUP_ID,
    DEFAULT_GROUP_NAME,
};

use crate::store::{load_catalog, save_catalog, CatalogError};

fn ensure_default_group(doc: &mut CatalogDocument) -> usize {
    if let Some(index) = doc.raster_groups.iter().position(RasterGroupRecord::is_default) {
        return index;
    }
    doc.raster_groups.push(RasterGroupRecord {
        id: DEFAULT_GROUP_ID.to_string(),
        name: DEFAULT_GROUP_NAME.to_string(),
        ..RasterGroupRecord::default()
    });
    doc.raster_groups.len() - 1
}

fn group_index(doc: &CatalogDocument, group_id: &str) -> Result<usize> {
    doc.raster_groups
        .iter()
        .position(|g| g.id == group_id)
        .ok_or_else(|| CatalogError::UnknownGroup(group_id.to_string()).into())
}

/// Create-or-get a raster group by name. Name comparison is
/// case-insensitive, so `"Foo"` and `"foo"` resolve to the same group.
/// Returns the group and whether it was created by this call.
pub fn create_raster_group(
    project_root: &Path,
    name: &str,
) -> Result<(RasterGroupRecord, bool)> {
    let mut doc = load_catalog(project_root)?;
    let wanted = name.trim();
    let wanted_key = wanted.to_lowercase();
    if let Some(group) = doc
        .raster_groups
        .iter()
        .find(|g| g.name.to_lowercase() == wanted_key)
    {
        return Ok((group.clone(), false));
    }

    let taken: HashSet<String> = doc.raster_groups.iter().map(|g| g.id.clone()).collect();
    let group_id = generate_record_id("grp", Some(wanted), &taken);
    doc.raster_groups.push(RasterGroupRecord {
        id: group_id.clone(),
        name: wanted.to_string(),
        ..RasterGroupRecord::default()
    });
    tracing::info!(group = %group_id, name = wanted, "created raster group");
    save_catalog(project_root, &mut doc)?;
    let group = doc
        .group_by_id(&group_id)
        .cloned()
        .context("created group missing after save")?;
    Ok((group, true))
}

fn assign_to_group(
    project_root: &Path,
    group_id: &str,
    ids: &[String],
    timeslices: bool,
) -> Result<RasterGroupRecord> {
    let mut doc = load_catalog(project_root)?;
    let index = group_index(&doc, group_id)?;
    let group = &mut doc.raster_groups[index];
    if timeslices {
        merge_member_ids(&mut group.timeslice_ids, ids);
    } else {
        merge_member_ids(&mut group.radargram_ids, ids);
    }
    save_catalog(project_root, &mut doc)?;
    Ok(doc.raster_groups[index].clone())
}

fn remove_from_group(
    project_root: &Path,
    group_id: &str,
    ids: &[String],
    timeslices: bool,
) -> Result<RasterGroupRecord> {
    let drop: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let mut doc = load_catalog(project_root)?;
    let index = group_index(&doc, group_id)?;
    let group = &mut doc.raster_groups[index];
    if timeslices {
        group.timeslice_ids.retain(|id| !drop.contains(id.as_str()));
    } else {
        group.radargram_ids.retain(|id| !drop.contains(id.as_str()));
    }
    save_catalog(project_root, &mut doc)?;
    Ok(doc.raster_groups[index].clone())
}

/// Merge time-slice ids into a group's membership. Assignment does not
/// check that the ids resolve; the validator reports stale ones.
pub fn assign_timeslices_to_group(
    project_root: &Path,
    group_id: &str,
    timeslice_ids: &[String],
) -> Result<RasterGroupRecord> {
    assign_to_group(project_root, group_id, timeslice_ids, true)
}

pub fn assign_radargrams_to_group(
    project_root: &Path,
    group_id: &str,
    radargram_ids: &[String],
) -> Result<RasterGroupRecord> {
    assign_to_group(project_root, group_id, radargram_ids, false)
}

/// Set-difference removal; ids that were never members are ignored.
pub fn remove_timeslices_from_group(
    project_root: &Path,
    group_id: &str,
    timeslice_ids: &[String],
) -> Result<RasterGroupRecord> {
    remove_from_group(project_root, group_id, timeslice_ids, true)
}

pub fn remove_radargrams_from_group(
    project_root: &Path,
    group_id: &str,
    radargram_ids: &[String],
) -> Result<RasterGroupRecord> {
    remove_from_group(project_root, group_id, radargram_ids, false)
}

pub fn add_timeslice_to_default_group(
    project_root: &Path,
    timeslice_id: &str,
) -> Result<RasterGroupRecord> {
    let mut doc = load_catalog(project_root)?;
    let index = ensure_default_group(&mut doc);
    merge_member_ids(
        &mut doc.raster_groups[index].timeslice_ids,
        &[timeslice_id.to_string()],
    );
    save_catalog(project_root, &mut doc)?;
    Ok(doc.raster_groups[index].clone())
}

pub fn add_radargram_to_default_group(
    project_root: &Path,
    radargram_id: &str,
) -> Result<RasterGroupRecord> {
    let mut doc = load_catalog(project_root)?;
    let index = ensure_default_group(&mut doc);
    merge_member_ids(
        &mut doc.raster_groups[index].radargram_ids,
        &[radargram_id.to_string()],
    );
    save_catalog(project_root, &mut doc)?;
    Ok(doc.raster_groups[index].clone())
}

/// Shallow-merge `updates` into an existing group record: caller-supplied
/// keys overwrite, everything else is untouched.
pub fn update_raster_group(
    project_root: &Path,
    group_id: &str,
    updates: &Map<String, Value>,
) -> Result<RasterGroupRecord> {
    let mut doc = load_catalog(project_root)?;
    let index = group_index(&doc, group_id)?;

    let mut value =
        serde_json::to_value(&doc.raster_groups[index]).context("serialize group record")?;
    let object = value.as_object_mut().context("group record is an object")?;
    for (key, update) in updates {
        object.insert(key.clone(), update.clone());
    }
    doc.raster_groups[index] =
        serde_json::from_value(value).context("group update produced an invalid record")?;

    save_catalog(project_root, &mut doc)?;
    Ok(doc.raster_groups[index].clone())
}

/// Delete a raster group. The default "Imported" group is refused.
/// Members that no longer appear in any other group fall back into the
/// default group so records never silently leave every group.
pub fn delete_raster_group(project_root: &Path, group_id: &str) -> Result<RasterGroupRecord> {
    let mut doc = load_catalog(project_root)?;
    let index = group_index(&doc, group_id)?;
    if doc.raster_groups[index].is_default() {
        return Err(CatalogError::DefaultGroupImmutable.into());
    }
    let removed = doc.raster_groups.remove(index);

    let orphan_timeslices: Vec<String> = removed
        .timeslice_ids
        .iter()
        .filter(|id| {
            !doc.raster_groups
                .iter()
                .any(|g| g.timeslice_ids.contains(id))
        })
        .cloned()
        .collect();
    let orphan_radargrams: Vec<String> = removed
        .radargram_ids
        .iter()
        .filter(|id| {
            !doc.raster_groups
                .iter()
                .any(|g| g.radargram_ids.contains(id))
        })
        .cloned()
        .collect();
    if !orphan_timeslices.is_empty() || !orphan_radargrams.is_empty() {
        let default = ensure_default_group(&mut doc);
        merge_member_ids(
            &mut doc.raster_groups[default].timeslice_ids,
            &orphan_timeslices,
        );
        merge_member_ids(
            &mut doc.raster_groups[default].radargram_ids,
            &orphan_radargrams,
        );
    }

    save_catalog(project_root, &mut doc)?;
    Ok(removed)
}
