use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use gsx_domain::{normalize_document, validate_document, CatalogDocument, ValidationReport};

use crate::store::{load_catalog_unpruned, save_catalog};

fn file_exists(project_root: &Path, recorded: &str) -> bool {
    if recorded.is_empty() {
        return false;
    }
    let path = Path::new(recorded);
    if path.is_absolute() {
        path.is_file()
    } else {
        project_root.join(path).is_file()
    }
}

/// Validate the catalog for a project root.
///
/// With `document` set the caller's in-memory copy is checked; otherwise
/// the on-disk file is read with record-level normalization only, so
/// dangling references that a full load would prune are still reported.
/// Returns the fully normalized document together with the report so a
/// caller can act on quick fixes without reloading.
pub fn validate_catalog(
    project_root: &Path,
    document: Option<&CatalogDocument>,
) -> Result<(CatalogDocument, ValidationReport)> {
    let doc = match document {
        Some(doc) => doc.clone(),
        None => load_catalog_unpruned(project_root)?,
    };
    let report = validate_document(&doc, project_root);
    tracing::debug!(
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "validated catalog"
    );

    let mut normalized = doc;
    normalize_document(&mut normalized, &project_root.to_string_lossy());
    Ok((normalized, report))
}

/// Which repairs [`apply_quick_fixes`] should run. Defaults mirror the
/// health panel: everything on except CRS assignment, which needs an
/// explicit authority id.
#[derive(Debug, Clone)]
pub struct QuickFixFlags {
    /// Drop records whose project file no longer exists.
    pub remove_missing_files: bool,
    /// Clear z-grid linkage on time-slices whose grid file is gone.
    pub clear_missing_zgrid: bool,
    /// Drop group members and links that reference unknown records.
    pub clean_references: bool,
    /// Remove groups with no members (the default group is exempt).
    pub remove_empty_groups: bool,
    /// Fill this CRS authority id into time-slices that have none.
    pub assign_crs: Option<String>,
}

impl Default for QuickFixFlags {
    fn default() -> Self {
        Self {
            remove_missing_files: true,
            clear_missing_zgrid: true,
            clean_references: true,
            remove_empty_groups: true,
            assign_crs: None,
        }
    }
}

/// Per-fix change counts reported back to the caller.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QuickFixSummary {
    pub removed_records: usize,
    pub cleared_zgrid: usize,
    pub dropped_group_refs: usize,
    pub removed_links: usize,
    pub removed_groups: usize,
    pub crs_assigned: usize,
}

impl QuickFixSummary {
    pub fn total(&self) -> usize {
        self.removed_records
            + self.cleared_zgrid
            + self.dropped_group_refs
            + self.removed_links
            + self.removed_groups
            + self.crs_assigned
    }
}

/// Run the selected quick fixes in one load/save round trip and return
/// how much each one changed.
pub fn apply_quick_fixes(project_root: &Path, flags: &QuickFixFlags) -> Result<QuickFixSummary> {
    let mut doc = load_catalog_unpruned(project_root)?;
    let mut summary = QuickFixSummary::default();

    if flags.remove_missing_files {
        let before = doc.models_3d.len() + doc.radargrams.len() + doc.timeslices.len();
        doc.models_3d
            .retain(|r| file_exists(project_root, &r.project_path));
        doc.radargrams
            .retain(|r| file_exists(project_root, &r.project_path));
        doc.timeslices
            .retain(|r| file_exists(project_root, &r.project_path));
        summary.removed_records =
            before - (doc.models_3d.len() + doc.radargrams.len() + doc.timeslices.len());
    }

    if flags.clear_missing_zgrid {
        for record in &mut doc.timeslices {
            if !record.z_grid_project_path.is_empty()
                && !file_exists(project_root, &record.z_grid_project_path)
            {
                record.z_source = String::new();
                record.z_grid_project_path = String::new();
                record.z_grid_band = None;
                summary.cleared_zgrid += 1;
            }
        }
    }

    if let Some(crs) = flags.assign_crs.as_deref() {
        for record in &mut doc.timeslices {
            if record.crs.is_empty() {
                record.crs = crs.to_string();
                summary.crs_assigned += 1;
            }
        }
    }

    if flags.clean_references {
        let timeslice_ids: HashSet<String> =
            doc.timeslices.iter().map(|r| r.id.clone()).collect();
        let radargram_ids: HashSet<String> =
            doc.radargrams.iter().map(|r| r.id.clone()).collect();
        for group in &mut doc.raster_groups {
            let before = group.timeslice_ids.len() + group.radargram_ids.len();
            group.timeslice_ids.retain(|id| timeslice_ids.contains(id));
            group.radargram_ids.retain(|id| radargram_ids.contains(id));
            summary.dropped_group_refs +=
                before - (group.timeslice_ids.len() + group.radargram_ids.len());
        }
        let before = doc.links.len();
        doc.links
            .retain(|link| radargram_ids.contains(&link.radargram_id));
        summary.removed_links = before - doc.links.len();
    }

    if flags.remove_empty_groups {
        let before = doc.raster_groups.len();
        doc.raster_groups.retain(|g| g.is_default() || !g.is_empty());
        summary.removed_groups = before - doc.raster_groups.len();
    }

    save_catalog(project_root, &mut doc)?;
    tracing::info!(changes = summary.total(), "applied catalog quick fixes");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use gsx_domain::{LinkRecord, TimesliceRecord};

    use crate::groups::{assign_timeslices_to_group, create_raster_group};
    use crate::registry::{add_link, register_timeslices_batch};
    use crate::store::load_catalog;

    use super::*;

    fn slice(root: &Path, id: &str, file: &str, create_file: bool) -> TimesliceRecord {
        let path = root.join("timeslices_2d").join(file);
        if create_file {
            std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            std::fs::write(&path, b"raster").expect("write");
        }
        TimesliceRecord {
            id: id.to_string(),
            project_path: path.to_string_lossy().to_string(),
            crs: "EPSG:32633".to_string(),
            ..TimesliceRecord::default()
        }
    }

    #[test]
    fn validate_reports_stale_assignment_as_warning() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (group, _) = create_raster_group(temp.path(), "Survey A").expect("create");
        assign_timeslices_to_group(temp.path(), &group.id, &["ts_1".to_string()])
            .expect("assign");

        let (_, report) = validate_catalog(temp.path(), None).expect("validate");
        assert!(!report.has_errors());
        assert!(report
            .warnings
            .iter()
            .any(|msg| msg.contains("unknown timeslice: ts_1")));
    }

    #[test]
    fn quick_fixes_remove_missing_records_and_stale_refs() {
        let temp = tempfile::tempdir().expect("tempdir");
        register_timeslices_batch(
            temp.path(),
            vec![
                slice(temp.path(), "ts_keep", "keep.tif", true),
                slice(temp.path(), "ts_gone", "gone.tif", false),
            ],
        )
        .expect("register");
        let (group, _) = create_raster_group(temp.path(), "AreaA").expect("create");
        assign_timeslices_to_group(
            temp.path(),
            &group.id,
            &["ts_keep".to_string(), "ts_gone".to_string()],
        )
        .expect("assign");
        add_link(
            temp.path(),
            LinkRecord {
                radargram_id: "rg_never".to_string(),
                ..LinkRecord::default()
            },
        )
        .expect("link");

        let summary =
            apply_quick_fixes(temp.path(), &QuickFixFlags::default()).expect("fix");
        assert_eq!(summary.removed_records, 1);
        assert_eq!(summary.dropped_group_refs, 1);
        assert_eq!(summary.removed_links, 1);

        let doc = load_catalog(temp.path()).expect("load");
        assert_eq!(doc.timeslices.len(), 1);
        assert_eq!(doc.timeslices[0].id, "ts_keep");
        assert!(doc.links.is_empty());
        let group = doc.group_by_id(&group.id).expect("group");
        assert_eq!(group.timeslice_ids, vec!["ts_keep"]);
    }

    #[test]
    fn quick_fixes_clear_missing_zgrid_and_assign_crs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut record = slice(temp.path(), "ts_1", "a.tif", true);
        record.crs = String::new();
        record.z_source = "surfer_grid".to_string();
        record.z_grid_project_path = temp
            .path()
            .join("timeslices_2d")
            .join("gone.grd")
            .to_string_lossy()
            .to_string();
        record.z_grid_band = Some(1);
        register_timeslices_batch(temp.path(), vec![record]).expect("register");

        let flags = QuickFixFlags {
            assign_crs: Some("EPSG:32633".to_string()),
            ..QuickFixFlags::default()
        };
        let summary = apply_quick_fixes(temp.path(), &flags).expect("fix");
        assert_eq!(summary.cleared_zgrid, 1);
        assert_eq!(summary.crs_assigned, 1);

        let doc = load_catalog(temp.path()).expect("load");
        assert_eq!(doc.timeslices[0].crs, "EPSG:32633");
        assert!(doc.timeslices[0].z_source.is_empty());
        assert_eq!(doc.timeslices[0].z_grid_band, None);
    }

    #[test]
    fn empty_groups_are_removed_but_default_survives() {
        let temp = tempfile::tempdir().expect("tempdir");
        create_raster_group(temp.path(), "Empty One").expect("create");

        let summary =
            apply_quick_fixes(temp.path(), &QuickFixFlags::default()).expect("fix");
        assert_eq!(summary.removed_groups, 1);

        let doc = load_catalog(temp.path()).expect("load");
        assert_eq!(doc.raster_groups.len(), 1);
        assert!(doc.raster_groups[0].is_default());
    }
}
