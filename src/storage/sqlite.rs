//! SQLite storage adapter
//!
//! One connection behind a mutex. Batched writes run inside a transaction so a
//! file's symbols, references or edges are replaced atomically.
//!
//! Records are stored as JSON in a `data` column next to the key columns used
//! for upserts and ordering.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{
    reference_id, symbol_id, FileRecord, StorageAdapter, StorageError, StoredReference,
    StoredSymbol,
};
use crate::graph::{DependencyEdge, EdgeLevel};
use crate::ingest::Symbol;
use crate::references::Reference;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS symbols (
    id TEXT PRIMARY KEY,
    file_id TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    line_start INTEGER NOT NULL,
    line_end INTEGER NOT NULL,
    is_exported INTEGER NOT NULL,
    data TEXT NOT NULL,
    UNIQUE(file_id, name, line_start)
);
CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id);

CREATE TABLE IF NOT EXISTS refs (
    id TEXT PRIMARY KEY,
    file_id TEXT NOT NULL,
    line INTEGER NOT NULL,
    col INTEGER NOT NULL,
    reference_type TEXT NOT NULL,
    target_name TEXT NOT NULL,
    data TEXT NOT NULL,
    UNIQUE(file_id, line, col, reference_type, target_name)
);
CREATE INDEX IF NOT EXISTS idx_refs_file ON refs(file_id);

CREATE TABLE IF NOT EXISTS dependencies (
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    level TEXT NOT NULL,
    from_file TEXT NOT NULL,
    to_file TEXT NOT NULL,
    data TEXT NOT NULL,
    PRIMARY KEY(from_id, to_id, level)
);
CREATE INDEX IF NOT EXISTS idx_dependencies_from_file ON dependencies(from_file);
CREATE INDEX IF NOT EXISTS idx_dependencies_to_file ON dependencies(to_file);
";

const UPSERT_SYMBOL: &str = "
INSERT INTO symbols (id, file_id, name, kind, line_start, line_end, is_exported, data)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT(file_id, name, line_start) DO UPDATE SET
    kind = excluded.kind,
    line_end = excluded.line_end,
    is_exported = excluded.is_exported,
    data = excluded.data";

const UPSERT_REFERENCE: &str = "
INSERT INTO refs (id, file_id, line, col, reference_type, target_name, data)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT(file_id, line, col, reference_type, target_name) DO UPDATE SET
    data = excluded.data";

const UPSERT_DEPENDENCY: &str = "
INSERT INTO dependencies (from_id, to_id, level, from_file, to_file, data)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(from_id, to_id, level) DO UPDATE SET
    from_file = excluded.from_file,
    to_file = excluded.to_file,
    data = excluded.data";

/// Storage adapter over an embedded SQLite database
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (creating if needed) a database file and ensure the schema
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Private database that lives as long as the adapter
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

fn upsert_symbol(conn: &Connection, file_id: &str, symbol: &Symbol) -> Result<String, StorageError> {
    let id = symbol_id(file_id, &symbol.name, symbol.line_start);
    conn.prepare_cached(UPSERT_SYMBOL)?.execute(params![
        id,
        file_id,
        symbol.name,
        symbol.kind.as_str(),
        symbol.line_start as i64,
        symbol.line_end as i64,
        symbol.is_exported,
        serde_json::to_string(symbol)?,
    ])?;
    Ok(id)
}

fn upsert_reference(conn: &Connection, file_id: &str, reference: &Reference) -> Result<String, StorageError> {
    let id = reference_id(file_id, reference);
    conn.prepare_cached(UPSERT_REFERENCE)?.execute(params![
        id,
        file_id,
        reference.line as i64,
        reference.column as i64,
        reference.reference_type.as_str(),
        reference.target_name,
        serde_json::to_string(reference)?,
    ])?;
    Ok(id)
}

fn upsert_dependency(conn: &Connection, edge: &DependencyEdge) -> Result<(), StorageError> {
    conn.prepare_cached(UPSERT_DEPENDENCY)?.execute(params![
        edge.from_id,
        edge.to_id,
        edge.level.as_str(),
        edge.metadata.from_file,
        edge.metadata.to_file,
        serde_json::to_string(edge)?,
    ])?;
    Ok(())
}

/// Decode JSON `data` column values produced by a query
fn decode_rows<T: serde::de::DeserializeOwned>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<T>, StorageError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(serde_json::from_str(&row?)?);
    }
    Ok(out)
}

impl StorageAdapter for SqliteStorage {
    fn store_file(&self, file: &FileRecord) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO files (id, path, content_hash, size_bytes, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                path = excluded.path,
                content_hash = excluded.content_hash,
                size_bytes = excluded.size_bytes,
                indexed_at = excluded.indexed_at",
            params![
                file.id,
                file.path,
                file.content_hash,
                file.size_bytes as i64,
                file.indexed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>, StorageError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, path, content_hash, size_bytes, indexed_at FROM files WHERE id = ?1",
                params![file_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, path, content_hash, size_bytes, indexed_at)) = row else {
            return Ok(None);
        };
        let indexed_at = chrono::DateTime::parse_from_rfc3339(&indexed_at)
            .map_err(|e| StorageError::InvalidData(format!("indexed_at '{}': {}", indexed_at, e)))?
            .with_timezone(&chrono::Utc);
        Ok(Some(FileRecord {
            id,
            path,
            content_hash,
            size_bytes: size_bytes as usize,
            indexed_at,
        }))
    }

    fn delete_file(&self, file_id: &str) -> Result<(), StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM files WHERE id = ?1", params![file_id])?;
        tx.execute("DELETE FROM symbols WHERE file_id = ?1", params![file_id])?;
        tx.execute("DELETE FROM refs WHERE file_id = ?1", params![file_id])?;
        tx.execute(
            "DELETE FROM dependencies WHERE from_file = ?1 OR to_file = ?1",
            params![file_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn store_symbol(&self, file_id: &str, symbol: &Symbol) -> Result<String, StorageError> {
        let conn = self.lock()?;
        upsert_symbol(&conn, file_id, symbol)
    }

    fn store_symbols(&self, file_id: &str, symbols: &[Symbol]) -> Result<Vec<String>, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM symbols WHERE file_id = ?1", params![file_id])?;
        let mut ids = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            ids.push(upsert_symbol(&tx, file_id, symbol)?);
        }
        tx.commit()?;
        Ok(ids)
    }

    fn store_reference(&self, file_id: &str, reference: &Reference) -> Result<String, StorageError> {
        let conn = self.lock()?;
        upsert_reference(&conn, file_id, reference)
    }

    fn store_references(&self, file_id: &str, references: &[Reference]) -> Result<(), StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM refs WHERE file_id = ?1", params![file_id])?;
        for reference in references {
            upsert_reference(&tx, file_id, reference)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn store_dependency(&self, edge: &DependencyEdge) -> Result<(), StorageError> {
        let conn = self.lock()?;
        upsert_dependency(&conn, edge)
    }

    fn store_dependencies(
        &self,
        from_file: &str,
        level: EdgeLevel,
        edges: &[DependencyEdge],
    ) -> Result<(), StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM dependencies WHERE from_file = ?1 AND level = ?2",
            params![from_file, level.as_str()],
        )?;
        for edge in edges {
            upsert_dependency(&tx, edge)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_symbols_by_file(&self, file_id: &str) -> Result<Vec<StoredSymbol>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, data FROM symbols WHERE file_id = ?1 ORDER BY line_start, name",
        )?;
        let rows = stmt.query_map(params![file_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, data) = row?;
            out.push(StoredSymbol {
                id,
                file_id: file_id.to_string(),
                symbol: serde_json::from_str(&data)?,
            });
        }
        Ok(out)
    }

    fn get_references_by_file(&self, file_id: &str) -> Result<Vec<StoredReference>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, data FROM refs WHERE file_id = ?1
             ORDER BY line, col, reference_type, target_name",
        )?;
        let rows = stmt.query_map(params![file_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, data) = row?;
            out.push(StoredReference {
                id,
                file_id: file_id.to_string(),
                reference: serde_json::from_str(&data)?,
            });
        }
        Ok(out)
    }

    fn get_dependencies_by_file(&self, file_id: &str) -> Result<Vec<DependencyEdge>, StorageError> {
        let conn = self.lock()?;
        decode_rows(
            &conn,
            "SELECT data FROM dependencies WHERE from_file = ?1 ORDER BY level, from_id, to_id",
            params![file_id],
        )
    }

    fn all_dependencies(&self, level: EdgeLevel) -> Result<Vec<DependencyEdge>, StorageError> {
        let conn = self.lock()?;
        decode_rows(
            &conn,
            "SELECT data FROM dependencies WHERE level = ?1 ORDER BY from_id, to_id",
            params![level.as_str()],
        )
    }

    fn clear(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "BEGIN;
             DELETE FROM dependencies;
             DELETE FROM refs;
             DELETE FROM symbols;
             DELETE FROM files;
             COMMIT;",
        )?;
        Ok(())
    }
}
