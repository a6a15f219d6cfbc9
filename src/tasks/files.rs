//! Shared file selection and writing helpers

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::WrittenFile;
use crate::error::{IoResultExt, PipelineError, Result};

/// A file selected for processing
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Absolute path
    pub path: PathBuf,

    /// Path relative to the walked root
    pub relative: PathBuf,
}

/// Collect the files under `root`.
///
/// Directories for which `skip_dir` returns true are not descended into;
/// files are kept when `keep` returns true. A missing root selects nothing.
pub fn collect_files(
    root: &Path,
    skip_dir: impl Fn(&Path) -> bool,
    keep: impl Fn(&Path) -> bool,
) -> Result<Vec<SourceFile>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir() && entry.depth() > 0 && skip_dir(entry.path()))
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            match e.into_io_error() {
                Some(io) => PipelineError::io(path, io),
                None => PipelineError::Other(anyhow::anyhow!("filesystem loop at {}", path.display())),
            }
        })?;

        if !entry.file_type().is_file() || !keep(entry.path()) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| entry.path().to_path_buf());

        files.push(SourceFile {
            path: entry.path().to_path_buf(),
            relative,
        });
    }

    Ok(files)
}

/// Write `contents` to `path`, creating parent directories
pub fn write_file(path: &Path, contents: &[u8]) -> Result<WrittenFile> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }
    fs::write(path, contents).with_path(path)?;

    Ok(WrittenFile {
        path: path.to_path_buf(),
        size: contents.len() as u64,
    })
}

/// Lower-cased extension of a path
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}
