//! Directory snapshot scanning
//!
//! Turns a directory tree into the `{id, path, content}` tuples the indexer
//! consumes. File IDs are the `/`-separated paths relative to the root.

use anyhow::{Context, Result};
use camino::Utf8Path;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticStage, IndexDiagnostic};
use crate::indexer::SourceFile;
use crate::ingest::ParserAdapter;

/// Progress callback: (current, total)
pub type ScanProgress = dyn Fn(usize, usize) + Send + Sync;

/// Files read from a directory plus any read failures
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshot {
    /// Sorted by path
    pub files: Vec<SourceFile>,
    pub diagnostics: Vec<IndexDiagnostic>,
}

fn build_exclude_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).with_context(|| format!("invalid exclude pattern '{}'", pattern))?;
        builder.add(glob);
    }
    builder.build().context("failed to build exclude set")
}

/// Scan a directory and read all supported source files
///
/// # Behavior
/// 1. Walk directory recursively (symlinks not followed)
/// 2. Keep files on the extension allowlist that no exclude glob matches
/// 3. Sort by relative path for determinism
/// 4. Read each file, reporting progress via callback
///
/// # Guarantees
/// - Unsupported files are silently skipped
/// - Unreadable or non-UTF-8 files become `Read` diagnostics, not errors
pub fn scan_directory(
    root: &Path,
    config: &EngineConfig,
    progress: Option<&ScanProgress>,
) -> Result<DirectorySnapshot> {
    let excludes = build_exclude_set(&config.exclude)?;
    let adapter = ParserAdapter::new(config);

    let mut candidates: Vec<(String, PathBuf)> = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let Some(relative) = Utf8Path::from_path(relative) else {
            tracing::debug!(path = %entry.path().display(), "skipping non-UTF-8 path");
            continue;
        };
        let relative = relative.as_str().replace('\\', "/");

        if excludes.is_match(&relative) || !adapter.is_supported_for_file(&relative) {
            continue;
        }
        candidates.push((relative, entry.path().to_path_buf()));
    }

    candidates.sort();
    let total = candidates.len();

    let mut snapshot = DirectorySnapshot::default();
    for (idx, (relative, path)) in candidates.into_iter().enumerate() {
        if let Some(cb) = progress {
            cb(idx + 1, total);
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => snapshot.files.push(SourceFile::new(relative.clone(), relative, content)),
            Err(e) => snapshot
                .diagnostics
                .push(IndexDiagnostic::error(relative, DiagnosticStage::Read, e.to_string())),
        }
    }

    tracing::info!(
        root = %root.display(),
        files = snapshot.files.len(),
        unreadable = snapshot.diagnostics.len(),
        "scanned directory"
    );
    Ok(snapshot)
}
