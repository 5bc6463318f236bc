//! Directory listing for the per-modality collections.

use crate::types::{DatasetResult, PairedDatasetError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "ppm", "bmp", "tif", "tiff"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

fn require_dir(dir: &Path) -> DatasetResult<()> {
    if !dir.is_dir() {
        return Err(PairedDatasetError::Config {
            path: dir.to_path_buf(),
            msg: "not a valid directory".to_string(),
        });
    }
    Ok(())
}

/// Recursively list image files under `dir`, keep the first `max_size` in
/// ascending path order, and return them in descending order.
///
/// Only an unreadable `dir` fails; bad entries below it are skipped.
pub fn list_images_descending(dir: &Path, max_size: usize) -> DatasetResult<Vec<PathBuf>> {
    require_dir(dir)?;
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(PairedDatasetError::Config {
                    path: dir.to_path_buf(),
                    msg: format!("unreadable directory: {e}"),
                });
            }
            Err(e) => {
                let path = e.path().unwrap_or(dir).display().to_string();
                warn!(%path, error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if entry.file_type().is_file() && is_image_file(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    paths.truncate(max_size);
    paths.reverse();
    Ok(paths)
}

/// List files in `dir` (non-recursive) with the given extension, in
/// directory order.
pub fn list_files_with_extension(dir: &Path, extension: &str) -> DatasetResult<Vec<PathBuf>> {
    require_dir(dir)?;
    let entries = fs::read_dir(dir).map_err(|e| PairedDatasetError::Config {
        path: dir.to_path_buf(),
        msg: format!("unreadable directory: {e}"),
    })?;
    Ok(entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some(extension))
        .collect())
}
