use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs_err as fs;
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use gsx_domain::{
    migrate_document, normalize_document, normalize_records, utc_now_iso, CatalogDocument,
};

/// Asset subfolders created under every project root.
pub const PROJECT_FOLDERS: [&str; 6] = [
    "volumes_3d",
    "timeslices_2d",
    "radargrams",
    "vector_layers",
    "exports",
    "metadata",
];

pub const CATALOG_DIR: &str = "metadata";
pub const CATALOG_FILE: &str = "project_catalog.json";

/// Errors surfaced to callers instead of being repaired silently.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The file exists but is not parseable JSON. Never silently reset to
    /// an empty document; that would drop user data.
    #[error("catalog file is not valid JSON: {path}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Parsed fine but the collections have an unusable shape.
    #[error("catalog file has an unusable shape: {path}")]
    Shape {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown raster group: {0}")]
    UnknownGroup(String),
    #[error("the default \"Imported\" group cannot be deleted")]
    DefaultGroupImmutable,
    #[error("source z-grid not found: {0}")]
    MissingGrid(PathBuf),
    #[error("package entry escapes the target folder: {0}")]
    UnsafeArchivePath(String),
}

pub fn catalog_path(project_root: &Path) -> PathBuf {
    project_root.join(CATALOG_DIR).join(CATALOG_FILE)
}

fn root_key(project_root: &Path) -> String {
    project_root.to_string_lossy().to_string()
}

/// Create the standard project folders and return their absolute paths,
/// keyed by folder name.
pub fn ensure_project_structure(project_root: &Path) -> Result<IndexMap<String, PathBuf>> {
    fs::create_dir_all(project_root)?;
    let mut paths = IndexMap::new();
    for folder in PROJECT_FOLDERS {
        let abs = project_root.join(folder);
        fs::create_dir_all(&abs)?;
        paths.insert(folder.to_string(), abs);
    }
    Ok(paths)
}

/// Fresh catalog for a project root that has no file yet. Nothing is
/// written to disk.
pub fn default_document(project_root: &Path) -> CatalogDocument {
    let mut doc = CatalogDocument::default();
    normalize_document(&mut doc, &root_key(project_root));
    doc
}

fn parse_raw(path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|source| {
            CatalogError::Corrupt {
                path: path.to_path_buf(),
                source,
            }
            .into()
        })
}

fn typed(value: Value, path: &Path) -> Result<CatalogDocument> {
    serde_json::from_value(value).map_err(|source| {
        CatalogError::Shape {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

fn migrate_and_type(raw: Value, path: &Path) -> Result<CatalogDocument> {
    // A non-object root (array, string, number) is not a catalog and
    // must not be grown into one; the typed parse reports the shape.
    if !raw.is_object() {
        return typed(raw, path);
    }
    let (migrated, outcome) = migrate_document(raw);
    if outcome.changed() {
        tracing::info!(
            from = outcome.raw_version,
            to = outcome.final_version,
            path = ?outcome.path,
            "migrated catalog schema"
        );
    }
    typed(migrated, path)
}

/// Load the catalog for a project root.
///
/// A missing file yields the default document without touching disk. An
/// existing file is parsed, migrated, and fully normalized no matter what
/// version it reports, so hand-edited documents come back repaired. When
/// the repair changed anything relative to the raw bytes, the clean
/// document is written back before being returned.
pub fn load_catalog(project_root: &Path) -> Result<CatalogDocument> {
    let path = catalog_path(project_root);
    if !path.exists() {
        return Ok(default_document(project_root));
    }
    let raw = parse_raw(&path)?;
    let mut doc = migrate_and_type(raw.clone(), &path)?;
    normalize_document(&mut doc, &root_key(project_root));

    let clean = serde_json::to_value(&doc).context("serialize normalized catalog")?;
    if clean != raw {
        tracing::debug!(path = %path.display(), "repaired catalog on load");
        save_catalog(project_root, &mut doc)?;
    }
    Ok(doc)
}

/// Load with record-level normalization only: defaults are filled but
/// dangling references are kept and nothing is written back. Validation
/// reads the catalog this way so stale ids can still be reported before a
/// full load prunes them.
pub(crate) fn load_catalog_unpruned(project_root: &Path) -> Result<CatalogDocument> {
    let path = catalog_path(project_root);
    if !path.exists() {
        return Ok(default_document(project_root));
    }
    let raw = parse_raw(&path)?;
    let mut doc = migrate_and_type(raw, &path)?;
    normalize_records(&mut doc, &root_key(project_root));
    Ok(doc)
}

// Catalogs written by earlier releases escape everything outside ASCII,
// so the save path does too and files stay diffable across tool versions.
fn escape_non_ascii(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    for c in body.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}

/// Persist the catalog: re-normalize records, refresh `updated_at`, and
/// write pretty-printed, ASCII-escaped JSON through a temp file in the
/// same directory so an interrupted write can never leave a truncated
/// catalog behind.
pub fn save_catalog(project_root: &Path, doc: &mut CatalogDocument) -> Result<PathBuf> {
    normalize_records(doc, &root_key(project_root));
    doc.updated_at = utc_now_iso();

    let path = catalog_path(project_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = escape_non_ascii(&serde_json::to_string_pretty(doc).context("serialize catalog")?);
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body.as_bytes())?;
    fs::rename(&tmp, &path)?;
    tracing::debug!(path = %path.display(), "saved catalog");
    Ok(path)
}
