//! In-memory storage adapter
//!
//! Ordered maps behind a single RwLock. Keys are chosen so that map order is
//! the documented result order, which keeps output identical to the SQLite
//! adapter without sorting on read.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    reference_id, symbol_id, FileRecord, StorageAdapter, StorageError, StoredReference,
    StoredSymbol,
};
use crate::graph::{DependencyEdge, EdgeLevel};
use crate::ingest::Symbol;
use crate::references::Reference;

/// (line_start, name)
type SymbolKey = (usize, String);
/// (line, column, reference_type, target_name)
type ReferenceKey = (usize, usize, &'static str, String);
/// (level, from_id, to_id)
type EdgeKey = (EdgeLevel, String, String);

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, FileRecord>,
    symbols: BTreeMap<String, BTreeMap<SymbolKey, StoredSymbol>>,
    references: BTreeMap<String, BTreeMap<ReferenceKey, StoredReference>>,
    dependencies: BTreeMap<EdgeKey, DependencyEdge>,
}

impl MemoryState {
    fn upsert_symbol(&mut self, file_id: &str, symbol: &Symbol) -> String {
        let id = symbol_id(file_id, &symbol.name, symbol.line_start);
        self.symbols.entry(file_id.to_string()).or_default().insert(
            (symbol.line_start, symbol.name.clone()),
            StoredSymbol {
                id: id.clone(),
                file_id: file_id.to_string(),
                symbol: symbol.clone(),
            },
        );
        id
    }

    fn upsert_reference(&mut self, file_id: &str, reference: &Reference) -> String {
        let id = reference_id(file_id, reference);
        self.references.entry(file_id.to_string()).or_default().insert(
            (
                reference.line,
                reference.column,
                reference.reference_type.as_str(),
                reference.target_name.clone(),
            ),
            StoredReference {
                id: id.clone(),
                file_id: file_id.to_string(),
                reference: reference.clone(),
            },
        );
        id
    }

    fn upsert_dependency(&mut self, edge: &DependencyEdge) {
        self.dependencies.insert(
            (edge.level, edge.from_id.clone(), edge.to_id.clone()),
            edge.clone(),
        );
    }
}

/// Storage adapter over in-process maps
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, StorageError> {
        self.state.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, StorageError> {
        self.state.write().map_err(|_| StorageError::LockPoisoned)
    }
}

impl StorageAdapter for MemoryStorage {
    fn store_file(&self, file: &FileRecord) -> Result<(), StorageError> {
        self.write()?.files.insert(file.id.clone(), file.clone());
        Ok(())
    }

    fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>, StorageError> {
        Ok(self.read()?.files.get(file_id).cloned())
    }

    fn delete_file(&self, file_id: &str) -> Result<(), StorageError> {
        let mut state = self.write()?;
        state.files.remove(file_id);
        state.symbols.remove(file_id);
        state.references.remove(file_id);
        state
            .dependencies
            .retain(|_, e| e.metadata.from_file != file_id && e.metadata.to_file != file_id);
        Ok(())
    }

    fn store_symbol(&self, file_id: &str, symbol: &Symbol) -> Result<String, StorageError> {
        Ok(self.write()?.upsert_symbol(file_id, symbol))
    }

    fn store_symbols(&self, file_id: &str, symbols: &[Symbol]) -> Result<Vec<String>, StorageError> {
        let mut state = self.write()?;
        state.symbols.remove(file_id);
        Ok(symbols
            .iter()
            .map(|s| state.upsert_symbol(file_id, s))
            .collect())
    }

    fn store_reference(&self, file_id: &str, reference: &Reference) -> Result<String, StorageError> {
        Ok(self.write()?.upsert_reference(file_id, reference))
    }

    fn store_references(&self, file_id: &str, references: &[Reference]) -> Result<(), StorageError> {
        let mut state = self.write()?;
        state.references.remove(file_id);
        for reference in references {
            state.upsert_reference(file_id, reference);
        }
        Ok(())
    }

    fn store_dependency(&self, edge: &DependencyEdge) -> Result<(), StorageError> {
        self.write()?.upsert_dependency(edge);
        Ok(())
    }

    fn store_dependencies(
        &self,
        from_file: &str,
        level: EdgeLevel,
        edges: &[DependencyEdge],
    ) -> Result<(), StorageError> {
        let mut state = self.write()?;
        state
            .dependencies
            .retain(|(l, _, _), e| *l != level || e.metadata.from_file != from_file);
        for edge in edges {
            state.upsert_dependency(edge);
        }
        Ok(())
    }

    fn get_symbols_by_file(&self, file_id: &str) -> Result<Vec<StoredSymbol>, StorageError> {
        Ok(self
            .read()?
            .symbols
            .get(file_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get_references_by_file(&self, file_id: &str) -> Result<Vec<StoredReference>, StorageError> {
        Ok(self
            .read()?
            .references
            .get(file_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get_dependencies_by_file(&self, file_id: &str) -> Result<Vec<DependencyEdge>, StorageError> {
        Ok(self
            .read()?
            .dependencies
            .values()
            .filter(|e| e.metadata.from_file == file_id)
            .cloned()
            .collect())
    }

    fn all_dependencies(&self, level: EdgeLevel) -> Result<Vec<DependencyEdge>, StorageError> {
        Ok(self
            .read()?
            .dependencies
            .values()
            .filter(|e| e.level == level)
            .cloned()
            .collect())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.write()? = MemoryState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support;

    #[test]
    fn test_upsert_is_idempotent() {
        test_support::upsert_is_idempotent(&MemoryStorage::new());
    }

    #[test]
    fn test_batches_replace_file_sets() {
        test_support::batches_replace_file_sets(&MemoryStorage::new());
    }

    #[test]
    fn test_results_are_ordered() {
        test_support::results_are_ordered(&MemoryStorage::new());
    }

    #[test]
    fn test_files_and_deletion() {
        test_support::files_and_deletion(&MemoryStorage::new());
    }

    #[test]
    fn test_cycles_and_clear() {
        test_support::cycles_and_clear(&MemoryStorage::new());
    }

    #[test]
    fn test_round_trips_full_records() {
        test_support::round_trips_full_records(&MemoryStorage::new());
    }
}
