use crate::error::{EngineError, Result};
use crate::models::{CombinedDataset, ParsedFile, UnreadablePolicy};
use crate::parser;
use crate::reconciler;
use crate::sheet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Sheet exports in `dir` with the given extension, sorted by path.
pub fn collect_sheet_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Reads and parses one sheet export. The display name is the file name without directories.
pub fn parse_file(path: &Path) -> Result<ParsedFile> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string());

    let grid = sheet::load_grid(path)?;
    let data = parser::parse_sheet(&grid);
    info!("📄 {}: {} students", file_name, data.students.len());

    Ok(ParsedFile { file_name, data })
}

/// Parses every file on the blocking pool and waits for all of them.
///
/// Results keep the order of `paths`. With [`UnreadablePolicy::Abort`] the
/// first unreadable file fails the whole batch; with `Skip` it is logged and
/// left out.
pub async fn load_batch(paths: Vec<PathBuf>, policy: UnreadablePolicy) -> Result<Vec<ParsedFile>> {
    let handles: Vec<_> = paths
        .into_iter()
        .map(|path| tokio::task::spawn_blocking(move || parse_file(&path)))
        .collect();

    let mut parsed = Vec::with_capacity(handles.len());
    for handle in handles {
        let result = handle
            .await
            .map_err(|e| EngineError::Task(e.to_string()))?;
        match result {
            Ok(file) => parsed.push(file),
            Err(e @ EngineError::UnreadableFile { .. }) if policy == UnreadablePolicy::Skip => {
                warn!("skipping: {}", e);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(parsed)
}

/// Loads, reconciles and analyzes a batch of sheet exports.
pub async fn build_dataset(paths: Vec<PathBuf>, policy: UnreadablePolicy) -> Result<CombinedDataset> {
    let files = load_batch(paths, policy).await?;
    if files.is_empty() {
        return Err(EngineError::EmptyBatch);
    }
    Ok(reconciler::reconcile(files))
}
