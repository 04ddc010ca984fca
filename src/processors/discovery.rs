//! Discovery of raw input logs under a directory tree.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

use super::conversion::INPUT_EXTENSION;

/// Errors that can occur while walking the input tree.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read directory '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Whether a file name denotes a raw log: `.txt` in any case, and not a readme.
pub fn is_valid_input(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower.ends_with(INPUT_EXTENSION) && !lower.contains("readme")
}

/// Recursively collect raw logs under `root`.
///
/// Entries are visited in sorted order, files of a directory before its
/// subdirectories, so the result is stable across runs and platforms.
/// Symlinked directories are not descended into; symlinked files are kept.
///
/// Returned paths are `root` joined with each file's relative path.
pub fn discover_inputs(root: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(root.to_path_buf()));
    }

    let mut found = Vec::new();
    walk(root, &mut found)?;
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), DiscoveryError> {
    let read_err = |e| DiscoveryError::ReadDir {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut entries: Vec<(PathBuf, fs::FileType)> = fs::read_dir(dir)
        .map_err(read_err)?
        .map(|entry| entry.and_then(|e| Ok((e.path(), e.file_type()?))))
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut dirs = Vec::new();
    for (path, file_type) in entries {
        if file_type.is_dir() {
            dirs.push(path);
        } else if file_type.is_symlink() && path.is_dir() {
            debug!("Not following directory symlink {}", path.display());
        } else if let Some(name) = path.file_name() {
            let valid = match name.to_str() {
                Some(name) => is_valid_input(name),
                None => {
                    let lossy = name.to_string_lossy();
                    let valid = is_valid_input(&lossy);
                    if valid {
                        warn!("File name is not valid UTF-8, outputs use '{}': {}", lossy, path.display());
                    }
                    valid
                }
            };
            if valid {
                found.push(path);
            }
        }
    }

    for sub in dirs {
        walk(&sub, found)?;
    }

    Ok(())
}
