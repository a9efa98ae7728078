//! Meridian: a deterministic code-intelligence engine for TypeScript and JavaScript
//!
//! Meridian parses a snapshot of source files, extracts declared symbols and
//! syntactic references, resolves relative imports, builds file-level and
//! symbol-level dependency graphs, and detects circular dependencies.
//!
//! # Pipeline
//!
//! 1. [`ingest::ParserAdapter`]: file content → syntax tree or [`ParseError`]
//! 2. [`ingest::SymbolExtractor`]: tree → [`Symbol`]s
//! 3. [`references::extract_references`]: tree → [`Reference`]s
//! 4. [`graph::resolve_import`]: relative specifier + known files → file ID
//! 5. [`graph::build_file_dependencies`] / [`graph::build_symbol_dependencies`]
//! 6. [`graph::detect_circular_dependencies`]
//! 7. [`storage::StorageAdapter`]: memory or SQLite persistence
//!
//! [`indexer::index_snapshot`] runs all stages over a snapshot.
//!
//! # Position Conventions
//!
//! Meridian uses tree-sitter position conventions for all symbol and reference data:
//! - **Line positions**: 1-indexed (line 1 is the first line)
//! - **Column positions**: 0-indexed byte columns (column 0 is the first byte)
//!
//! # Determinism
//!
//! Extraction is pure with respect to (tree, path, known files). Re-running
//! any stage on unchanged input yields identical output, which is what makes
//! re-indexing idempotent.

pub mod config;
pub mod diagnostics;
pub mod graph;
pub mod indexer;
pub mod ingest;
pub mod references;
pub mod snapshot;
pub mod storage;

pub use config::{ConfigError, EngineConfig};
pub use diagnostics::{
    CollectingSink, DiagnosticSink, DiagnosticStage, IndexDiagnostic, SkipReason, TracingSink,
};
pub use graph::{
    build_file_dependencies, build_symbol_dependencies, detect_circular_dependencies,
    find_cycles_containing, resolve_import, CircularChain, DependencyEdge, EdgeLevel,
    EdgeMetadata, IndexedFile, KnownFiles,
};
pub use indexer::{index_snapshot, SnapshotIndex, SourceFile};
pub use ingest::{
    extract_symbols, is_supported_for_file, parse_file, symbol_id, AccessModifier, ParseError,
    ParseOutcome, ParserAdapter, SourceDialect, Symbol, SymbolExtractor, SymbolKind, SyntaxTree,
};
pub use references::{extract_references, ImportKind, Reference, ReferenceMetadata, ReferenceType};
pub use snapshot::{scan_directory, DirectorySnapshot};
pub use storage::{
    FileRecord, MemoryStorage, SqliteStorage, StorageAdapter, StorageError, StoredReference,
    StoredSymbol,
};
