//! End-to-end tests for snapshot indexing
//!
//! Drives parse → extract → resolve → graph → store through the public API.

use meridian::{
    detect_circular_dependencies, index_snapshot, symbol_id, CollectingSink, EdgeLevel,
    EngineConfig, IndexDiagnostic, MemoryStorage, ReferenceType, SourceFile, SqliteStorage,
    StorageAdapter,
};
use tempfile::TempDir;

fn two_file_snapshot() -> Vec<SourceFile> {
    vec![
        SourceFile::new("a", "a.ts", "export function f(){}"),
        SourceFile::new("b", "b.ts", "import {f} from './a'; f();"),
    ]
}

#[test]
fn test_import_and_call_across_two_files() {
    let storage = MemoryStorage::new();
    let index = index_snapshot(
        &two_file_snapshot(),
        &EngineConfig::default(),
        &storage,
        &CollectingSink::new(),
    )
    .unwrap();

    // One symbol `f` in a
    let a_symbols = &index.symbols["a"];
    assert_eq!(a_symbols.len(), 1);
    assert_eq!(a_symbols[0].name, "f");
    assert!(a_symbols[0].is_exported);

    // One import-binding and one call in b
    let b_refs = &index.references["b"];
    let kinds: Vec<_> = b_refs.iter().map(|r| r.reference_type).collect();
    assert_eq!(kinds, vec![ReferenceType::ImportBinding, ReferenceType::Call]);

    // Edge b → a, no cycles
    assert_eq!(index.file_dependencies.len(), 1);
    assert_eq!(index.file_dependencies[0].from_id, "b");
    assert_eq!(index.file_dependencies[0].to_id, "a");
    assert!(detect_circular_dependencies(&index.file_dependencies).is_empty());

    // Symbol edge from module scope of b to f
    assert_eq!(index.symbol_dependencies.len(), 1);
    assert_eq!(index.symbol_dependencies[0].to_id, symbol_id("a", "f", 1));
}

#[test]
fn test_batch_with_malformed_file_processes_the_rest() {
    let mut files = two_file_snapshot();
    files.push(SourceFile::new("broken", "broken.ts", "class {{{{ =>"));
    files.push(SourceFile::new("c", "c.js", "export class C { run() {} }"));

    let sink = CollectingSink::new();
    let index = index_snapshot(&files, &EngineConfig::default(), &MemoryStorage::new(), &sink).unwrap();

    assert_eq!(index.parse_errors.len(), 1);
    assert_eq!(index.parse_errors[0].path, "broken.ts");
    assert_eq!(index.files.len(), 3);
    assert_eq!(index.symbols["c"].len(), 2);

    let reported = sink.take_sorted();
    assert!(matches!(
        reported.as_slice(),
        [IndexDiagnostic::Error { path, .. }] if path == "broken.ts"
    ));
}

#[test]
fn test_sqlite_reindex_keeps_one_row_per_symbol() {
    let dir = TempDir::new().unwrap();
    let storage = SqliteStorage::open(&dir.path().join("index.db")).unwrap();
    let files = two_file_snapshot();

    for _ in 0..3 {
        index_snapshot(&files, &EngineConfig::default(), &storage, &CollectingSink::new()).unwrap();
    }

    assert_eq!(storage.get_symbols_by_file("a").unwrap().len(), 1);
    assert_eq!(storage.get_references_by_file("b").unwrap().len(), 2);
    assert_eq!(storage.all_dependencies(EdgeLevel::File).unwrap().len(), 1);
    assert!(storage
        .get_circular_dependencies(EdgeLevel::File)
        .unwrap()
        .is_empty());
}

#[test]
fn test_edit_removes_stale_facts() {
    let storage = MemoryStorage::new();
    let config = EngineConfig::default();
    index_snapshot(&two_file_snapshot(), &config, &storage, &CollectingSink::new()).unwrap();

    // b no longer imports a
    let edited = vec![
        SourceFile::new("a", "a.ts", "export function f(){}"),
        SourceFile::new("b", "b.ts", "export function g(){}"),
    ];
    index_snapshot(&edited, &config, &storage, &CollectingSink::new()).unwrap();

    assert!(storage.get_references_by_file("b").unwrap().is_empty());
    assert!(storage.get_dependencies_by_file("b").unwrap().is_empty());
    let names: Vec<_> = storage
        .get_symbols_by_file("b")
        .unwrap()
        .into_iter()
        .map(|s| s.symbol.name)
        .collect();
    assert_eq!(names, vec!["g"]);
}

#[test]
fn test_malformed_edit_clears_stored_cycle() {
    let dir = TempDir::new().unwrap();
    let storage = SqliteStorage::open(&dir.path().join("index.db")).unwrap();
    let config = EngineConfig::default();

    let cyclic = vec![
        SourceFile::new("a", "a.ts", "import './b';"),
        SourceFile::new("b", "b.ts", "import './a';\nexport function g() {}\n"),
    ];
    index_snapshot(&cyclic, &config, &storage, &CollectingSink::new()).unwrap();
    assert_eq!(storage.get_circular_dependencies(EdgeLevel::File).unwrap().len(), 1);

    let broken = vec![
        SourceFile::new("a", "a.ts", "import './b';"),
        SourceFile::new("b", "b.ts", "export function ("),
    ];
    let index = index_snapshot(&broken, &config, &storage, &CollectingSink::new()).unwrap();

    assert!(index.file_cycles().is_empty());
    assert_eq!(storage.get_circular_dependencies(EdgeLevel::File).unwrap(), index.file_cycles());
    assert!(storage.get_symbols_by_file("b").unwrap().is_empty());
    assert!(storage.get_dependencies_by_file("b").unwrap().is_empty());
    assert_eq!(
        storage.all_dependencies(EdgeLevel::File).unwrap(),
        index.file_dependencies
    );
}

#[test]
fn test_three_file_cycle_detected_from_storage() {
    let files = vec![
        SourceFile::new("x", "src/x.ts", "import './y';"),
        SourceFile::new("y", "src/y.ts", "import './z';"),
        SourceFile::new("z", "src/z.ts", "import './x';"),
    ];
    let storage = MemoryStorage::new();
    let index = index_snapshot(&files, &EngineConfig::default(), &storage, &CollectingSink::new()).unwrap();

    let cycles = index.file_cycles();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].nodes, vec!["x", "y", "z", "x"]);
    assert_eq!(storage.get_circular_dependencies(EdgeLevel::File).unwrap(), cycles);
}

#[test]
fn test_snapshot_json_is_deterministic() {
    let files = vec![
        SourceFile::new("m", "lib/m.ts", "/** Model. */\nexport interface M<T> { v: T }\n"),
        SourceFile::new("s", "lib/s.ts", "import type { M } from './m';\nexport const s = (m: M<string>) => m.v;\n"),
    ];
    let render = || {
        index_snapshot(&files, &EngineConfig::default(), &MemoryStorage::new(), &CollectingSink::new())
            .unwrap()
            .to_json()
            .unwrap()
    };
    let first = render();
    assert_eq!(first, render());
    assert!(first.contains("\"documentation\": \"Model.\""));
}
