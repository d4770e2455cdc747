//! Loading documents from disk

use crate::error::{Result, SkillMatchError};
use crate::input::file_detector::FileType;
use crate::processing::batch::{Candidate, FailureRecord};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Raw bytes of a document read from disk, not yet decoded.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub name: String,
    pub path: PathBuf,
    pub file_type: FileType,
    pub bytes: Vec<u8>,
}

impl LoadedFile {
    pub fn mime_hint(&self) -> Option<&'static str> {
        self.file_type.mime()
    }
}

/// Read a document, enforcing the size limit and a supported file type.
pub async fn read_document(path: &Path, max_file_size_mb: u64) -> Result<LoadedFile> {
    let metadata = fs::metadata(path).await.map_err(|e| {
        SkillMatchError::InvalidInput(format!("Cannot access {}: {}", path.display(), e))
    })?;
    if !metadata.is_file() {
        return Err(SkillMatchError::InvalidInput(format!(
            "Not a file: {}",
            path.display()
        )));
    }

    let limit = max_file_size_mb.saturating_mul(1024 * 1024);
    if metadata.len() > limit {
        return Err(SkillMatchError::InvalidInput(format!(
            "{} is {:.1} MB, larger than the {} MB limit",
            path.display(),
            metadata.len() as f64 / (1024.0 * 1024.0),
            max_file_size_mb
        )));
    }

    let file_type = FileType::from_path(path);
    if !file_type.is_supported() {
        return Err(SkillMatchError::InvalidInput(format!(
            "Unsupported file type for: {} (expected pdf, txt or md)",
            path.display()
        )));
    }

    let bytes = fs::read(path).await?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());

    Ok(LoadedFile {
        name: display_name(path),
        path: path.to_path_buf(),
        file_type,
        bytes,
    })
}

/// Supported documents directly inside `dir`, sorted by path.
pub async fn collect_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await.map_err(|e| {
        SkillMatchError::InvalidInput(format!("Cannot read directory {}: {}", dir.display(), e))
    })?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && FileType::from_path(&path).is_supported() {
            paths.push(path);
        }
    }
    paths.sort();

    info!("Found {} documents in {}", paths.len(), dir.display());
    Ok(paths)
}

/// Read every CV into a [`Candidate`] keyed by file name.
///
/// Files that cannot be read come back as failure records rather than
/// aborting the load. A file name seen twice falls back to the full path.
pub async fn load_candidates(
    paths: &[PathBuf],
    max_file_size_mb: u64,
) -> (Vec<Candidate>, Vec<FailureRecord>) {
    let mut candidates = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();
    let mut seen_ids = HashSet::new();

    for path in paths {
        let name = display_name(path);
        let id = if seen_ids.contains(&name) {
            path.display().to_string()
        } else {
            name
        };
        if !seen_ids.insert(id.clone()) {
            warn!("Skipping duplicate CV {}", path.display());
            continue;
        }

        match read_document(path, max_file_size_mb).await {
            Ok(file) => {
                let mime_hint = file.mime_hint();
                candidates.push(Candidate::from_bytes(id, file.bytes, mime_hint));
            }
            Err(e) => {
                warn!("Could not load {}: {}", path.display(), e);
                failures.push(FailureRecord::new(id, &e));
            }
        }
    }

    (candidates, failures)
}

/// File name used as the candidate id.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
