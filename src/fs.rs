//! Filesystem helpers around the core encoder/decoder
//!
//! Collecting reads files into an [`Archive`] and skips (but reports) files
//! that cannot be read. Extracting writes decoded entries under a target
//! directory and checks every path again before touching the disk.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::archive::{validate_path, Archive, FileEntry};

/// A source file left out of the archive
#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: anyhow::Error,
}

/// Files gathered from disk, plus the ones that could not be read
#[derive(Debug, Default)]
pub struct Collected {
    pub archive: Archive,
    pub skipped: Vec<SkippedFile>,
}

/// Read a single file, naming the entry after its basename
pub fn collect_file(path: &Path) -> Result<FileEntry> {
    let content = fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid filename: {}", path.display()))?
        .to_string_lossy()
        .to_string();

    Ok(FileEntry::new(name, content))
}

/// Read every file below `dir`, in sorted traversal order.
///
/// Entry paths are relative to `dir` and use forward slashes.
#[cfg(feature = "walkdir")]
pub fn collect_directory(dir: &Path) -> Result<Collected> {
    anyhow::ensure!(dir.is_dir(), "Not a directory: {}", dir.display());

    let mut collected = Collected::default();

    for item in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let item = match item {
            Ok(item) => item,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                warn!(path = %path.display(), "skipping unreadable path: {}", err);
                collected.skipped.push(SkippedFile {
                    path,
                    error: err.into(),
                });
                continue;
            }
        };

        if !item.file_type().is_file() {
            continue;
        }

        let path = item.path();
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path.display(), "skipping unreadable file: {}", err);
                collected.skipped.push(SkippedFile {
                    path: path.to_path_buf(),
                    error: err.into(),
                });
                continue;
            }
        };

        let relative_path = path
            .strip_prefix(dir)
            .map_err(|_| anyhow::anyhow!("Failed to get relative path for {}", path.display()))?;

        let entry = FileEntry::new(relative_path.to_string_lossy(), content);
        debug!(
            file = %entry.path,
            encoding = %entry.encoding,
            bytes = entry.content.len(),
            "collected"
        );
        collected.archive.add_entry(entry);
    }

    Ok(collected)
}

/// An entry that could not be written
#[derive(Debug)]
pub struct ExtractFailure {
    pub path: String,
    pub error: anyhow::Error,
}

/// Outcome of writing entries to disk
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<ExtractFailure>,
}

impl ExtractReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resolve an entry path under `root`, refusing anything that could escape it
pub fn safe_join(root: &Path, name: &str) -> Result<PathBuf> {
    validate_path(name)
        .map_err(|reason| anyhow::anyhow!("Invalid filename '{}': {}", name, reason))?;

    let relative = Path::new(name);
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    anyhow::ensure!(contained, "Invalid filename '{}': leaves the output directory", name);

    Ok(root.join(relative))
}

/// Write entries below `root`, creating parent directories as needed.
///
/// A failing entry is recorded and the rest are still written.
pub fn extract_entries(entries: &[FileEntry], root: &Path) -> Result<ExtractReport> {
    fs::create_dir_all(root)
        .with_context(|| format!("Failed to create output directory: {}", root.display()))?;

    let mut report = ExtractReport::default();

    for entry in entries {
        match write_entry(entry, root) {
            Ok(path) => {
                debug!(file = %entry.path, bytes = entry.content.len(), "extracted");
                report.written.push(path);
            }
            Err(error) => {
                warn!(file = %entry.path, "failed to extract: {:#}", error);
                report.failed.push(ExtractFailure {
                    path: entry.path.clone(),
                    error,
                });
            }
        }
    }

    Ok(report)
}

fn write_entry(entry: &FileEntry, root: &Path) -> Result<PathBuf> {
    let output_path = safe_join(root, &entry.path)?;

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(&output_path, &entry.content)
        .with_context(|| format!("Failed to write: {}", output_path.display()))?;

    Ok(output_path)
}
