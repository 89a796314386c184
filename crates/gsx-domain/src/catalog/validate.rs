use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::types::CatalogDocument;

/// Structured validation result. Errors are must-fix (duplicate ids,
/// missing hard references, missing model/radargram files); warnings are
/// should-fix (missing soft files, CRS gaps, orphaned soft references,
/// empty groups). Nothing here mutates the document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

fn resolve(project_root: &Path, recorded: &str) -> PathBuf {
    let path = Path::new(recorded);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

fn file_missing(project_root: &Path, recorded: &str) -> bool {
    !recorded.is_empty() && !resolve(project_root, recorded).is_file()
}

fn check_duplicates<'a, I>(ids: I, label: &str, errors: &mut Vec<String>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for id in ids {
        if id.is_empty() {
            continue;
        }
        if !seen.insert(id) {
            errors.push(format!("Duplicate {label} id: {id}"));
        }
    }
}

/// Read-only consistency pass over a catalog document.
///
/// File-existence severity is asymmetric on purpose: a 3D model or
/// radargram with a missing file is unusable and reported as an error,
/// while a missing time-slice or vector-layer file only degrades the
/// display and stays a warning.
pub fn validate_document(doc: &CatalogDocument, project_root: &Path) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_duplicates(
        doc.models_3d.iter().map(|r| r.id.as_str()),
        "3D model",
        &mut report.errors,
    );
    check_duplicates(
        doc.radargrams.iter().map(|r| r.id.as_str()),
        "radargram",
        &mut report.errors,
    );
    check_duplicates(
        doc.timeslices.iter().map(|r| r.id.as_str()),
        "timeslice",
        &mut report.errors,
    );
    check_duplicates(
        doc.vector_layers.iter().map(|r| r.id.as_str()),
        "vector layer",
        &mut report.errors,
    );
    check_duplicates(
        doc.links.iter().map(|r| r.id.as_str()),
        "link",
        &mut report.errors,
    );
    check_duplicates(
        doc.raster_groups.iter().map(|r| r.id.as_str()),
        "group",
        &mut report.errors,
    );

    for record in &doc.models_3d {
        if record.project_path.is_empty() {
            report
                .errors
                .push(format!("3D model {} has no project_path", record.id));
        } else if file_missing(project_root, &record.project_path) {
            report
                .errors
                .push(format!("Missing 3D model file: {}", record.project_path));
        }
        if record.crs.is_empty() {
            report
                .warnings
                .push(format!("3D model {} has no CRS", record.id));
        }
    }

    for record in &doc.radargrams {
        if record.project_path.is_empty() {
            report
                .errors
                .push(format!("Radargram {} has no project_path", record.id));
        } else if file_missing(project_root, &record.project_path) {
            report
                .errors
                .push(format!("Missing radargram file: {}", record.project_path));
        }
        if record.crs.is_empty() {
            report
                .warnings
                .push(format!("Radargram {} has no CRS", record.id));
        }
    }

    for record in &doc.timeslices {
        if record.project_path.is_empty() {
            report
                .errors
                .push(format!("Timeslice {} has no project_path", record.id));
        } else if file_missing(project_root, &record.project_path) {
            report
                .warnings
                .push(format!("Missing timeslice file: {}", record.project_path));
        }
        if record.crs.is_empty() {
            report
                .warnings
                .push(format!("Timeslice {} has no CRS", record.id));
        }
        if file_missing(project_root, &record.z_grid_project_path) {
            report.warnings.push(format!(
                "Missing z-grid file for timeslice {}: {}",
                record.id, record.z_grid_project_path
            ));
        }
    }

    for record in &doc.vector_layers {
        if file_missing(project_root, &record.project_path) {
            report.warnings.push(format!(
                "Missing vector layer file: {}",
                record.project_path
            ));
        }
    }

    let radargram_ids: HashSet<&str> = doc.radargrams.iter().map(|r| r.id.as_str()).collect();
    let timeslice_ids: HashSet<&str> = doc.timeslices.iter().map(|r| r.id.as_str()).collect();
    let line_ids: HashSet<&str> = doc.vector_layers.iter().map(|r| r.id.as_str()).collect();

    for link in &doc.links {
        if link.radargram_id.is_empty() {
            report
                .errors
                .push(format!("Link {} has no radargram_id", link.id));
        } else if !radargram_ids.contains(link.radargram_id.as_str()) {
            report.errors.push(format!(
                "Link {} references unknown radargram: {}",
                link.id, link.radargram_id
            ));
        }
        if !link.timeslice_id.is_empty() && !timeslice_ids.contains(link.timeslice_id.as_str()) {
            report.warnings.push(format!(
                "Link {} references unknown timeslice: {}",
                link.id, link.timeslice_id
            ));
        }
        if !link.line_id.is_empty() && !line_ids.contains(link.line_id.as_str()) {
            report.warnings.push(format!(
                "Link {} references unknown line: {}",
                link.id, link.line_id
            ));
        }
    }

    for group in &doc.raster_groups {
        for id in &group.timeslice_ids {
            if !timeslice_ids.contains(id.as_str()) {
                report.warnings.push(format!(
                    "Group {} references unknown timeslice: {}",
                    group.id, id
                ));
            }
        }
        for id in &group.radargram_ids {
            if !radargram_ids.contains(id.as_str()) {
                report.warnings.push(format!(
                    "Group {} references unknown radargram: {}",
                    group.id, id
                ));
            }
        }
        if group.is_empty() && !group.is_default() {
            report
                .warnings
                .push(format!("Group {} is empty", group.id));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::super::types::{
        LinkRecord, Model3dRecord, RasterGroupRecord, TimesliceRecord, DEFAULT_GROUP_ID,
    };
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, b"x").expect("write");
    }

    #[test]
    fn duplicate_timeslice_ids_are_errors() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut doc = CatalogDocument::default();
        for suffix in ["missing_1", "missing_2"] {
            doc.timeslices.push(TimesliceRecord {
                id: "ts_dup".to_string(),
                project_path: format!("timeslices_2d/{suffix}.tif"),
                crs: "EPSG:32633".to_string(),
                ..TimesliceRecord::default()
            });
        }
        let report = validate_document(&doc, temp.path());
        assert!(report
            .errors
            .iter()
            .any(|msg| msg.contains("Duplicate timeslice id: ts_dup")));
        assert!(report
            .warnings
            .iter()
            .any(|msg| msg.contains("Missing timeslice file:")));
    }

    #[test]
    fn missing_model_file_is_error_missing_timeslice_is_warning() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut doc = CatalogDocument::default();
        doc.models_3d.push(Model3dRecord {
            id: "m3d_1".to_string(),
            project_path: "volumes_3d/gone.ply".to_string(),
            crs: "EPSG:32633".to_string(),
            ..Model3dRecord::default()
        });
        doc.timeslices.push(TimesliceRecord {
            id: "ts_1".to_string(),
            project_path: "timeslices_2d/gone.tif".to_string(),
            crs: "EPSG:32633".to_string(),
            ..TimesliceRecord::default()
        });
        let report = validate_document(&doc, temp.path());
        assert!(report
            .errors
            .iter()
            .any(|msg| msg.contains("Missing 3D model file:")));
        assert!(!report
            .errors
            .iter()
            .any(|msg| msg.contains("Missing timeslice file:")));
        assert!(report
            .warnings
            .iter()
            .any(|msg| msg.contains("Missing timeslice file:")));
    }

    #[test]
    fn link_reference_severity_is_asymmetric() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut doc = CatalogDocument::default();
        doc.links.push(LinkRecord {
            id: "lnk_1".to_string(),
            radargram_id: "rg_unknown".to_string(),
            timeslice_id: "ts_unknown".to_string(),
            ..LinkRecord::default()
        });
        let report = validate_document(&doc, temp.path());
        assert!(report
            .errors
            .iter()
            .any(|msg| msg.contains("unknown radargram: rg_unknown")));
        assert!(report
            .warnings
            .iter()
            .any(|msg| msg.contains("unknown timeslice: ts_unknown")));
    }

    #[test]
    fn clean_project_reports_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let slice = temp.path().join("timeslices_2d").join("a.tif");
        touch(&slice);
        let mut doc = CatalogDocument::default();
        doc.timeslices.push(TimesliceRecord {
            id: "ts_1".to_string(),
            project_path: slice.to_string_lossy().to_string(),
            crs: "EPSG:32633".to_string(),
            ..TimesliceRecord::default()
        });
        doc.raster_groups.push(RasterGroupRecord {
            id: DEFAULT_GROUP_ID.to_string(),
            name: "Imported".to_string(),
            timeslice_ids: vec!["ts_1".to_string()],
            ..RasterGroupRecord::default()
        });
        let report = validate_document(&doc, temp.path());
        assert!(report.is_clean(), "unexpected issues: {report:?}");
    }

    #[test]
    fn empty_non_default_group_is_a_warning() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut doc = CatalogDocument::default();
        doc.raster_groups.push(RasterGroupRecord {
            id: "grp_area".to_string(),
            name: "Area".to_string(),
            ..RasterGroupRecord::default()
        });
        let report = validate_document(&doc, temp.path());
        assert!(report
            .warnings
            .iter()
            .any(|msg| msg.contains("Group grp_area is empty")));
    }
}
