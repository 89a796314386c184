use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs_err as fs;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use gsx_domain::utc_compact_stamp;

use crate::store::{ensure_project_structure, load_catalog, save_catalog, CatalogError};

const EXPORTS_DIR: &str = "exports";

/// Zip the whole project tree (catalog plus asset folders) into an
/// archive. The `exports/` folder is left out so packages never nest
/// earlier packages. Returns the archive path, which defaults to
/// `exports/project_package_{stamp}.zip` under the project root.
pub fn export_project_package(project_root: &Path, out: Option<&Path>) -> Result<PathBuf> {
    let out_path = match out {
        Some(path) => path.to_path_buf(),
        None => project_root
            .join(EXPORTS_DIR)
            .join(format!("project_package_{}.zip", utc_compact_stamp())),
    };
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut files = Vec::new();
    collect_files(project_root, project_root, &out_path, &mut files)?;

    let mut writer = ZipWriter::new(fs::File::create(&out_path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for path in files {
        let relative = path
            .strip_prefix(project_root)
            .context("project file outside the project root")?;
        let name = relative.to_string_lossy().replace('\\', "/");
        writer.start_file(name, options)?;
        let mut file = fs::File::open(&path)?;
        io::copy(&mut file, &mut writer)?;
    }
    writer.finish()?;
    tracing::info!(archive = %out_path.display(), "exported project package");
    Ok(out_path)
}

fn collect_files(
    dir: &Path,
    project_root: &Path,
    out_path: &Path,
    files: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            // Skip the exports tree so a package never contains itself.
            if dir == project_root && entry.file_name() == EXPORTS_DIR {
                continue;
            }
            collect_files(&path, project_root, out_path, files)?;
        } else if path != out_path {
            files.push(path);
        }
    }
    Ok(())
}

/// Unpack a project package into `target_root` and re-anchor the catalog
/// there: the standard folders are created and the catalog is loaded and
/// saved once so `project_root` points at the new location.
pub fn import_project_package(archive_path: &Path, target_root: &Path) -> Result<PathBuf> {
    let mut archive = ZipArchive::new(fs::File::open(archive_path)?)?;
    fs::create_dir_all(target_root)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(CatalogError::UnsafeArchivePath(entry.name().to_string()).into());
        };
        let destination = target_root.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&destination)?;
            continue;
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&destination)?;
        io::copy(&mut entry, &mut file)?;
    }

    ensure_project_structure(target_root)?;
    let mut doc = load_catalog(target_root)?;
    save_catalog(target_root, &mut doc)?;
    tracing::info!(root = %target_root.display(), "imported project package");
    Ok(target_root.to_path_buf())
}
