//! Persistence interface for extracted facts
//!
//! The pipeline talks to [`StorageAdapter`] only. Two implementations share the
//! same observable behavior:
//! - [`MemoryStorage`]: keyed in-process maps, for tests and standalone use
//! - [`SqliteStorage`]: embedded SQLite via rusqlite
//!
//! # Identity keys
//!
//! - Symbol: (file_id, name, line_start), ID = [`symbol_id`]
//! - Reference: (file_id, line, column, reference_type, target_name), ID = [`reference_id`]
//! - Dependency: (from_id, to_id, level)
//!
//! Every store operation is an upsert on these keys, so re-indexing an
//! unchanged file leaves exactly one row per key.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::{detect_circular_dependencies, CircularChain, DependencyEdge, EdgeLevel};
use crate::ingest::Symbol;
use crate::references::Reference;

pub use crate::ingest::symbol_id;

/// Errors surfaced by storage adapters
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cannot encode or decode stored record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    LockPoisoned,

    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

/// Per-file bookkeeping written alongside the file's facts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub path: String,
    /// SHA-256 of the file content (hex)
    pub content_hash: String,
    pub size_bytes: usize,
    pub indexed_at: DateTime<Utc>,
}

/// A symbol as persisted: the record plus its owning file and stable ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSymbol {
    pub id: String,
    pub file_id: String,
    #[serde(flatten)]
    pub symbol: Symbol,
}

/// A reference as persisted: the record plus its owning file and generated ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReference {
    pub id: String,
    pub file_id: String,
    #[serde(flatten)]
    pub reference: Reference,
}

/// Generated reference ID (32-char BLAKE3 hash of the identity key)
pub fn reference_id(file_id: &str, reference: &Reference) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(file_id.as_bytes());
    hasher.update(&[0]);
    hasher.update(reference.line.to_string().as_bytes());
    hasher.update(&[0]);
    hasher.update(reference.column.to_string().as_bytes());
    hasher.update(&[0]);
    hasher.update(reference.reference_type.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(reference.target_name.as_bytes());
    let hex = hasher.finalize().to_hex();
    hex[..32].to_string()
}

/// Persistence capability set used by the indexing pipeline
///
/// # Ordering
///
/// - symbols: (line_start, name)
/// - references: (line, column, reference_type, target_name)
/// - dependencies: (level, from_id, to_id)
///
/// Both implementations honor these orders so results compare equal.
pub trait StorageAdapter: Send + Sync {
    /// Upsert a file record
    fn store_file(&self, file: &FileRecord) -> Result<(), StorageError>;

    fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>, StorageError>;

    /// Remove a file and every symbol, reference and edge touching it
    fn delete_file(&self, file_id: &str) -> Result<(), StorageError>;

    /// Upsert one symbol; returns its stable ID
    fn store_symbol(&self, file_id: &str, symbol: &Symbol) -> Result<String, StorageError>;

    /// Replace a file's symbol set in one batch; returns IDs in input order
    fn store_symbols(&self, file_id: &str, symbols: &[Symbol]) -> Result<Vec<String>, StorageError>;

    /// Upsert one reference; returns its generated ID
    fn store_reference(&self, file_id: &str, reference: &Reference) -> Result<String, StorageError>;

    /// Replace a file's reference set in one batch
    fn store_references(&self, file_id: &str, references: &[Reference]) -> Result<(), StorageError>;

    /// Upsert one edge on (from_id, to_id, level)
    fn store_dependency(&self, edge: &DependencyEdge) -> Result<(), StorageError>;

    /// Replace the edges of `level` originating in `from_file` in one batch
    fn store_dependencies(
        &self,
        from_file: &str,
        level: EdgeLevel,
        edges: &[DependencyEdge],
    ) -> Result<(), StorageError>;

    fn get_symbols_by_file(&self, file_id: &str) -> Result<Vec<StoredSymbol>, StorageError>;

    fn get_references_by_file(&self, file_id: &str) -> Result<Vec<StoredReference>, StorageError>;

    /// Edges of any level whose referencing side lives in `file_id`
    fn get_dependencies_by_file(&self, file_id: &str) -> Result<Vec<DependencyEdge>, StorageError>;

    fn all_dependencies(&self, level: EdgeLevel) -> Result<Vec<DependencyEdge>, StorageError>;

    /// Remove everything
    fn clear(&self) -> Result<(), StorageError>;

    /// Run cycle detection over the stored edges of `level`
    fn get_circular_dependencies(&self, level: EdgeLevel) -> Result<Vec<CircularChain>, StorageError> {
        let edges = self.all_dependencies(level)?;
        Ok(detect_circular_dependencies(&edges))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared behavioral checks run against both adapters

    use super::*;
    use crate::graph::EdgeMetadata;
    use crate::ingest::SymbolKind;
    use crate::references::{ReferenceMetadata, ReferenceType};

    pub fn symbol(name: &str, line: usize) -> Symbol {
        Symbol {
            name: name.to_string(),
            kind: SymbolKind::Function,
            line_start: line,
            line_end: line + 2,
            column_start: 0,
            column_end: 1,
            signature: Some(format!("{}()", name)),
            documentation: None,
            is_exported: true,
            is_default_export: false,
            is_async: Some(false),
            is_generator: Some(false),
            is_static: false,
            access_modifier: None,
            overloads: Vec::new(),
            export_aliases: Vec::new(),
        }
    }

    pub fn call(name: &str, line: usize, column: usize) -> Reference {
        Reference {
            target_name: name.to_string(),
            reference_type: ReferenceType::Call,
            line,
            column,
            metadata: ReferenceMetadata {
                argument_count: Some(0),
                ..ReferenceMetadata::default()
            },
        }
    }

    pub fn edge(from: &str, to: &str, level: EdgeLevel, from_file: &str) -> DependencyEdge {
        DependencyEdge {
            from_id: from.to_string(),
            to_id: to.to_string(),
            level,
            metadata: EdgeMetadata {
                from_file: from_file.to_string(),
                to_file: to.to_string(),
                occurrences: 1,
                ..EdgeMetadata::default()
            },
        }
    }

    pub fn file(id: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            path: format!("src/{}.ts", id),
            content_hash: "00".repeat(32),
            size_bytes: 10,
            indexed_at: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
                .map(|t| t.with_timezone(&Utc))
                .unwrap(),
        }
    }

    pub fn upsert_is_idempotent(store: &dyn StorageAdapter) {
        let id1 = store.store_symbol("a", &symbol("f", 1)).unwrap();
        let id2 = store.store_symbol("a", &symbol("f", 1)).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(id1, symbol_id("a", "f", 1));

        let mut changed = symbol("f", 1);
        changed.documentation = Some("now documented".to_string());
        store.store_symbol("a", &changed).unwrap();

        let stored = store.get_symbols_by_file("a").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].symbol.documentation.as_deref(), Some("now documented"));

        let r1 = store.store_reference("a", &call("g", 2, 4)).unwrap();
        let r2 = store.store_reference("a", &call("g", 2, 4)).unwrap();
        assert_eq!(r1, r2);
        assert_eq!(store.get_references_by_file("a").unwrap().len(), 1);

        store.store_dependency(&edge("a", "b", EdgeLevel::File, "a")).unwrap();
        store.store_dependency(&edge("a", "b", EdgeLevel::File, "a")).unwrap();
        assert_eq!(store.get_dependencies_by_file("a").unwrap().len(), 1);
    }

    pub fn batches_replace_file_sets(store: &dyn StorageAdapter) {
        store
            .store_symbols("a", &[symbol("f", 1), symbol("g", 5)])
            .unwrap();
        store.store_symbols("a", &[symbol("g", 5)]).unwrap();
        let names: Vec<_> = store
            .get_symbols_by_file("a")
            .unwrap()
            .into_iter()
            .map(|s| s.symbol.name)
            .collect();
        assert_eq!(names, vec!["g"]);

        store
            .store_references("a", &[call("x", 3, 0), call("y", 1, 0)])
            .unwrap();
        store.store_references("a", &[call("y", 1, 0)]).unwrap();
        let refs = store.get_references_by_file("a").unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].reference.target_name, "y");

        store
            .store_dependencies("a", EdgeLevel::File, &[edge("a", "b", EdgeLevel::File, "a"), edge("a", "c", EdgeLevel::File, "a")])
            .unwrap();
        store
            .store_dependencies("a", EdgeLevel::Symbol, &[edge("s1", "s2", EdgeLevel::Symbol, "a")])
            .unwrap();
        store
            .store_dependencies("a", EdgeLevel::File, &[edge("a", "c", EdgeLevel::File, "a")])
            .unwrap();
        let deps = store.get_dependencies_by_file("a").unwrap();
        let keys: Vec<_> = deps.iter().map(|e| (e.from_id.as_str(), e.to_id.as_str(), e.level)).collect();
        assert_eq!(
            keys,
            vec![("a", "c", EdgeLevel::File), ("s1", "s2", EdgeLevel::Symbol)]
        );
    }

    pub fn results_are_ordered(store: &dyn StorageAdapter) {
        store
            .store_symbols("a", &[symbol("z", 9), symbol("b", 2), symbol("a", 2)])
            .unwrap();
        let order: Vec<_> = store
            .get_symbols_by_file("a")
            .unwrap()
            .into_iter()
            .map(|s| (s.symbol.line_start, s.symbol.name))
            .collect();
        assert_eq!(
            order,
            vec![(2, "a".to_string()), (2, "b".to_string()), (9, "z".to_string())]
        );

        store
            .store_references("a", &[call("q", 4, 2), call("p", 4, 0), call("r", 1, 8)])
            .unwrap();
        let order: Vec<_> = store
            .get_references_by_file("a")
            .unwrap()
            .into_iter()
            .map(|r| r.reference.target_name)
            .collect();
        assert_eq!(order, vec!["r", "p", "q"]);
    }

    pub fn files_and_deletion(store: &dyn StorageAdapter) {
        assert_eq!(store.get_file("a").unwrap(), None);
        store.store_file(&file("a")).unwrap();
        store.store_file(&file("b")).unwrap();
        assert_eq!(store.get_file("a").unwrap(), Some(file("a")));

        store.store_symbols("a", &[symbol("f", 1)]).unwrap();
        store.store_references("a", &[call("g", 2, 0)]).unwrap();
        store
            .store_dependencies("a", EdgeLevel::File, &[edge("a", "b", EdgeLevel::File, "a")])
            .unwrap();
        store
            .store_dependencies("b", EdgeLevel::File, &[edge("b", "a", EdgeLevel::File, "b")])
            .unwrap();

        store.delete_file("a").unwrap();
        assert_eq!(store.get_file("a").unwrap(), None);
        assert!(store.get_file("b").unwrap().is_some());
        assert!(store.get_symbols_by_file("a").unwrap().is_empty());
        assert!(store.get_references_by_file("a").unwrap().is_empty());
        // Edges into the deleted file are gone too
        assert!(store.all_dependencies(EdgeLevel::File).unwrap().is_empty());
    }

    pub fn cycles_and_clear(store: &dyn StorageAdapter) {
        store
            .store_dependencies("a", EdgeLevel::File, &[edge("a", "b", EdgeLevel::File, "a")])
            .unwrap();
        store
            .store_dependencies("b", EdgeLevel::File, &[edge("b", "a", EdgeLevel::File, "b")])
            .unwrap();
        let cycles = store.get_circular_dependencies(EdgeLevel::File).unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].nodes, vec!["a", "b", "a"]);
        assert!(store.get_circular_dependencies(EdgeLevel::Symbol).unwrap().is_empty());

        store.store_file(&file("a")).unwrap();
        store.store_symbols("a", &[symbol("f", 1)]).unwrap();
        store.clear().unwrap();
        assert!(store.all_dependencies(EdgeLevel::File).unwrap().is_empty());
        assert!(store.get_symbols_by_file("a").unwrap().is_empty());
        assert_eq!(store.get_file("a").unwrap(), None);
    }

    pub fn round_trips_full_records(store: &dyn StorageAdapter) {
        let mut sym = symbol("save", 3);
        sym.kind = SymbolKind::Method;
        sym.access_modifier = Some(crate::ingest::AccessModifier::Protected);
        sym.overloads = vec!["save(a)".to_string()];
        sym.is_async = Some(true);
        store.store_symbols("a", std::slice::from_ref(&sym)).unwrap();
        let stored = store.get_symbols_by_file("a").unwrap();
        assert_eq!(stored[0].symbol, sym);
        assert_eq!(stored[0].file_id, "a");

        let mut reference = call("Foo", 7, 3);
        reference.metadata.is_constructor = true;
        reference.metadata.object_name = Some("ns".to_string());
        store.store_references("a", std::slice::from_ref(&reference)).unwrap();
        let stored = store.get_references_by_file("a").unwrap();
        assert_eq!(stored[0].reference, reference);
        assert_eq!(stored[0].id, reference_id("a", &reference));
    }
}
