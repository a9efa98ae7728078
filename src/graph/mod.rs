//! Dependency graph over files and symbols
//!
//! Edges are derived data: they are recomputed from the snapshot's symbols,
//! references and known files whenever those change. Direction always points
//! from the dependent to the dependency.
//!
//! # Node ID spaces
//!
//! - **file** level: caller-supplied file IDs
//! - **symbol** level: stable symbol IDs (32-char BLAKE3 hashes, see
//!   [`crate::ingest::symbol_id`]), or the file ID when a reference sits
//!   outside every extracted symbol

pub mod algorithms;
pub mod calls;
pub mod imports;
pub mod module_resolver;

pub use algorithms::{
    detect_circular_dependencies, detect_circular_dependencies_among, find_cycles_containing,
    CircularChain,
};
pub use calls::build_symbol_dependencies;
pub use imports::build_file_dependencies;
pub use module_resolver::{is_relative_specifier, resolve_import, IndexedFile, KnownFiles};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::ingest::Symbol;
use crate::references::{Reference, ReferenceType};

/// Per-file symbols, keyed by file ID
pub type SymbolsByFile = BTreeMap<String, Vec<Symbol>>;

/// Per-file references, keyed by file ID
pub type ReferencesByFile = BTreeMap<String, Vec<Reference>>;

/// Granularity of a dependency edge
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EdgeLevel {
    File,
    Symbol,
}

impl EdgeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeLevel::File => "file",
            EdgeLevel::Symbol => "symbol",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(EdgeLevel::File),
            "symbol" => Some(EdgeLevel::Symbol),
            _ => None,
        }
    }
}

impl fmt::Display for EdgeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of an edge
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeMetadata {
    /// File containing the referencing side
    pub from_file: String,
    /// File containing the referenced side
    pub to_file: String,
    /// Number of references collapsed into this edge
    pub occurrences: usize,
    /// Line of the first contributing reference
    pub line: usize,
    /// Distinct module specifiers (file level)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specifiers: Vec<String>,
    /// Referenced symbol name (symbol level)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    /// Kind of the first contributing reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<ReferenceType>,
}

/// Directed dependency between two files or two symbols
///
/// Identity key: (from_id, to_id, level).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyEdge {
    pub from_id: String,
    pub to_id: String,
    pub level: EdgeLevel,
    #[serde(default)]
    pub metadata: EdgeMetadata,
}

impl DependencyEdge {
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>, level: EdgeLevel) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            level,
            metadata: EdgeMetadata::default(),
        }
    }

    pub fn key(&self) -> (&str, &str, EdgeLevel) {
        (&self.from_id, &self.to_id, self.level)
    }

    pub fn is_self_loop(&self) -> bool {
        self.from_id == self.to_id
    }
}

/// Collapses repeated (from, to) pairs into one edge, preserving first-seen order
#[derive(Debug, Default)]
pub(crate) struct EdgeAccumulator {
    edges: Vec<DependencyEdge>,
    index: ahash::AHashMap<(String, String), usize>,
}

impl EdgeAccumulator {
    /// Record one occurrence; returns the edge so callers can merge metadata
    pub(crate) fn record(
        &mut self,
        from_id: &str,
        to_id: &str,
        level: EdgeLevel,
        seed: impl FnOnce() -> EdgeMetadata,
    ) -> &mut DependencyEdge {
        let key = (from_id.to_string(), to_id.to_string());
        let idx = match self.index.get(&key) {
            Some(&idx) => {
                self.edges[idx].metadata.occurrences += 1;
                idx
            }
            None => {
                let mut edge = DependencyEdge::new(from_id, to_id, level);
                edge.metadata = seed();
                edge.metadata.occurrences = 1;
                self.edges.push(edge);
                self.index.insert(key, self.edges.len() - 1);
                self.edges.len() - 1
            }
        };
        &mut self.edges[idx]
    }

    pub(crate) fn into_edges(self) -> Vec<DependencyEdge> {
        self.edges
    }
}
