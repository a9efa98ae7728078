//! Snapshot indexer
//!
//! Runs the full pipeline over a snapshot of source files:
//!
//! 1. **Per-file stage** (parallel, rayon): allowlist and size checks,
//!    content hashing, parse, symbol and reference extraction
//! 2. **Barrier**: all per-file results are collected before graph work
//! 3. **Graph stage**: file-level and symbol-level edges over the complete
//!    fact set
//! 4. **Store stage**: one batched write per file for symbols, references and
//!    edges
//!
//! # Failure semantics
//!
//! - Parse failures are per-file: reported to the sink, aggregated in the
//!   result, never abort the batch
//! - Storage failures abort the run and propagate to the caller unchanged

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Instant;

use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticSink, DiagnosticStage, IndexDiagnostic, SkipReason};
use crate::graph::{
    build_file_dependencies, build_symbol_dependencies, detect_circular_dependencies,
    CircularChain, DependencyEdge, EdgeLevel, IndexedFile, ReferencesByFile, SymbolsByFile,
};
use crate::ingest::{ParseError, ParseOutcome, ParserAdapter, Symbol, SymbolExtractor};
use crate::references::{extract_references, Reference};
use crate::storage::{FileRecord, StorageAdapter, StorageError};

/// One file of a snapshot as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: String,
    pub path: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(id: impl Into<String>, path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn indexed(&self) -> IndexedFile {
        IndexedFile::new(self.id.clone(), self.path.clone())
    }
}

/// Hex SHA-256 of file content
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Facts and diagnostics produced by one [`index_snapshot`] run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotIndex {
    /// Files with facts (freshly extracted or unchanged), in input order
    pub files: Vec<IndexedFile>,
    pub symbols: SymbolsByFile,
    pub references: ReferencesByFile,
    pub file_dependencies: Vec<DependencyEdge>,
    pub symbol_dependencies: Vec<DependencyEdge>,
    pub parse_errors: Vec<ParseError>,
    /// Sorted by [`IndexDiagnostic::sort_key`]
    pub diagnostics: Vec<IndexDiagnostic>,
}

impl SnapshotIndex {
    pub fn file_cycles(&self) -> Vec<CircularChain> {
        detect_circular_dependencies(&self.file_dependencies)
    }

    pub fn symbol_cycles(&self) -> Vec<CircularChain> {
        detect_circular_dependencies(&self.symbol_dependencies)
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.values().map(Vec::len).sum()
    }

    pub fn reference_count(&self) -> usize {
        self.references.values().map(Vec::len).sum()
    }

    /// Pretty JSON dump; identical input yields identical output
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Result of the per-file stage
enum FileOutcome {
    Extracted {
        symbols: Vec<Symbol>,
        references: Vec<Reference>,
        hash: String,
    },
    Unchanged {
        symbols: Vec<Symbol>,
        references: Vec<Reference>,
    },
    Failed(ParseError),
    Skipped(SkipReason),
}

/// Index a snapshot and persist its facts
///
/// # Arguments
/// * `files` - Snapshot contents; IDs must be unique
/// * `config` - Immutable engine configuration
/// * `storage` - Adapter receiving batched per-file writes
/// * `sink` - Receiver for skip and error diagnostics
///
/// # Returns
/// The snapshot's facts and edges, or the first storage error
pub fn index_snapshot(
    files: &[SourceFile],
    config: &EngineConfig,
    storage: &dyn StorageAdapter,
    sink: &dyn DiagnosticSink,
) -> Result<SnapshotIndex, StorageError> {
    let started = Instant::now();
    let adapter = ParserAdapter::new(config);

    // Unchanged detection reads storage, so it runs before the parallel stage
    let mut reused: Vec<Option<FileOutcome>> = Vec::with_capacity(files.len());
    for file in files {
        reused.push(load_unchanged(file, config, &adapter, storage)?);
    }

    let outcomes: Vec<FileOutcome> = files
        .par_iter()
        .zip(reused.into_par_iter())
        .map(|(file, reused)| match reused {
            Some(outcome) => outcome,
            None => extract_file(file, config, &adapter),
        })
        .collect();

    // Barrier: every per-file result is in hand
    let mut index = SnapshotIndex::default();
    let mut fresh: Vec<(&SourceFile, String)> = Vec::new();
    let mut stale: Vec<&SourceFile> = Vec::new();
    let mut diagnostics = Vec::new();

    for (file, outcome) in files.iter().zip(outcomes) {
        match outcome {
            FileOutcome::Extracted {
                symbols,
                references,
                hash,
            } => {
                tracing::debug!(
                    path = %file.path,
                    symbols = symbols.len(),
                    references = references.len(),
                    "extracted file"
                );
                index.files.push(file.indexed());
                index.symbols.insert(file.id.clone(), symbols);
                index.references.insert(file.id.clone(), references);
                fresh.push((file, hash));
            }
            FileOutcome::Unchanged {
                symbols,
                references,
            } => {
                index.files.push(file.indexed());
                index.symbols.insert(file.id.clone(), symbols);
                index.references.insert(file.id.clone(), references);
                diagnostics.push(IndexDiagnostic::skipped(&file.path, SkipReason::Unchanged));
            }
            FileOutcome::Failed(err) => {
                diagnostics.push(IndexDiagnostic::error(
                    &file.path,
                    DiagnosticStage::Parse,
                    err.to_string(),
                ));
                index.parse_errors.push(err);
                stale.push(file);
            }
            FileOutcome::Skipped(reason) => {
                diagnostics.push(IndexDiagnostic::skipped(&file.path, reason));
                stale.push(file);
            }
        }
    }

    // Resolution sees the whole snapshot, including files without facts
    let known: Vec<IndexedFile> = files.iter().map(SourceFile::indexed).collect();
    index.file_dependencies = build_file_dependencies(&known, &index.references, config);
    index.symbol_dependencies =
        build_symbol_dependencies(&known, &index.symbols, &index.references, config);

    // Per-file diagnostics reach the sink even if a store below fails
    diagnostics.sort();
    for diagnostic in &diagnostics {
        sink.report(diagnostic);
    }
    index.diagnostics = diagnostics;

    // Files without facts this run must not keep facts from an earlier one.
    // Runs before edge stores, which recreate edges pointing at these files.
    for file in &stale {
        storage.delete_file(&file.id).map_err(|e| {
            let diagnostic = IndexDiagnostic::error(&file.path, DiagnosticStage::Store, e.to_string());
            sink.report(&diagnostic);
            e
        })?;
    }
    for (file, hash) in &fresh {
        store_file_facts(file, hash, &index, storage).map_err(|e| {
            let diagnostic = IndexDiagnostic::error(&file.path, DiagnosticStage::Store, e.to_string());
            sink.report(&diagnostic);
            e
        })?;
    }
    for file in &index.files {
        store_file_edges(&file.id, &index, storage).map_err(|e| {
            let diagnostic = IndexDiagnostic::error(&file.path, DiagnosticStage::Store, e.to_string());
            sink.report(&diagnostic);
            e
        })?;
    }

    tracing::info!(
        files = files.len(),
        indexed = index.files.len(),
        cleared = stale.len(),
        parse_errors = index.parse_errors.len(),
        symbols = index.symbol_count(),
        file_edges = index.file_dependencies.len(),
        symbol_edges = index.symbol_dependencies.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "indexed snapshot"
    );

    Ok(index)
}

/// Stored facts for a file whose content hash matches its stored record
fn load_unchanged(
    file: &SourceFile,
    config: &EngineConfig,
    adapter: &ParserAdapter<'_>,
    storage: &dyn StorageAdapter,
) -> Result<Option<FileOutcome>, StorageError> {
    if !config.skip_unchanged || !adapter.is_supported_for_file(&file.path) {
        return Ok(None);
    }
    let Some(record) = storage.get_file(&file.id)? else {
        return Ok(None);
    };
    if record.content_hash != content_hash(&file.content) {
        return Ok(None);
    }

    let symbols: Vec<Symbol> = storage
        .get_symbols_by_file(&file.id)?
        .into_iter()
        .map(|s| s.symbol)
        .collect();
    let references: Vec<Reference> = storage
        .get_references_by_file(&file.id)?
        .into_iter()
        .map(|r| r.reference)
        .collect();
    Ok(Some(FileOutcome::Unchanged {
        symbols: in_position_order(symbols),
        references: references_in_position_order(references),
    }))
}

/// Per-file stage: pure with respect to the file and config
fn extract_file(file: &SourceFile, config: &EngineConfig, adapter: &ParserAdapter<'_>) -> FileOutcome {
    if !adapter.is_supported_for_file(&file.path) {
        return FileOutcome::Skipped(SkipReason::UnsupportedLanguage);
    }
    if config.exceeds_size_limit(file.content.len()) {
        return FileOutcome::Skipped(SkipReason::TooLarge);
    }

    let tree = match adapter.parse_file(&file.path, &file.content) {
        ParseOutcome::Parsed(tree) => tree,
        ParseOutcome::Failed(err) => return FileOutcome::Failed(err),
        ParseOutcome::Unsupported { .. } => return FileOutcome::Skipped(SkipReason::UnsupportedLanguage),
    };

    FileOutcome::Extracted {
        symbols: in_position_order(SymbolExtractor::new(config).extract(&tree)),
        references: references_in_position_order(extract_references(&tree)),
        hash: content_hash(&file.content),
    }
}

/// Canonical symbol order shared by fresh and reused facts
fn in_position_order(mut symbols: Vec<Symbol>) -> Vec<Symbol> {
    symbols.sort_by(|a, b| {
        (a.line_start, a.column_start, &a.name).cmp(&(b.line_start, b.column_start, &b.name))
    });
    symbols
}

/// Canonical reference order shared by fresh and reused facts.
///
/// Same key as the stored reference ID, so exact duplicates collapse the way
/// they do in storage.
fn references_in_position_order(mut references: Vec<Reference>) -> Vec<Reference> {
    let key = |r: &Reference| (r.line, r.column, r.reference_type.as_str(), r.target_name.clone());
    references.sort_by_key(key);
    references.dedup_by(|a, b| key(&*a) == key(&*b));
    references
}

fn store_file_facts(
    file: &SourceFile,
    hash: &str,
    index: &SnapshotIndex,
    storage: &dyn StorageAdapter,
) -> Result<(), StorageError> {
    let empty_symbols: Vec<Symbol> = Vec::new();
    let empty_refs: Vec<Reference> = Vec::new();

    storage.store_file(&FileRecord {
        id: file.id.clone(),
        path: file.path.clone(),
        content_hash: hash.to_string(),
        size_bytes: file.content.len(),
        indexed_at: chrono::Utc::now(),
    })?;
    storage.store_symbols(&file.id, index.symbols.get(&file.id).unwrap_or(&empty_symbols))?;
    storage.store_references(&file.id, index.references.get(&file.id).unwrap_or(&empty_refs))?;
    Ok(())
}

fn store_file_edges(file_id: &str, index: &SnapshotIndex, storage: &dyn StorageAdapter) -> Result<(), StorageError> {
    for (level, edges) in [
        (EdgeLevel::File, &index.file_dependencies),
        (EdgeLevel::Symbol, &index.symbol_dependencies),
    ] {
        let owned: Vec<DependencyEdge> = edges
            .iter()
            .filter(|e| e.metadata.from_file == file_id)
            .cloned()
            .collect();
        storage.store_dependencies(file_id, level, &owned)?;
    }
    Ok(())
}
