//! File-level dependency edges from import bindings

use crate::config::EngineConfig;
use crate::graph::module_resolver::{resolve_import, IndexedFile, KnownFiles};
use crate::graph::{DependencyEdge, EdgeAccumulator, EdgeLevel, EdgeMetadata, ReferencesByFile};
use crate::references::ReferenceType;

/// Build file → file edges for every import-binding that resolves
///
/// Files are visited in the given order and references in document order,
/// so output order is deterministic. Several imports of the same file collapse
/// into one edge; unresolved specifiers produce nothing.
pub fn build_file_dependencies(
    files: &[IndexedFile],
    references: &ReferencesByFile,
    config: &EngineConfig,
) -> Vec<DependencyEdge> {
    let known = KnownFiles::new(files);
    let mut edges = EdgeAccumulator::default();

    for file in files {
        let Some(refs) = references.get(&file.id) else {
            continue;
        };
        for reference in refs {
            if reference.reference_type != ReferenceType::ImportBinding {
                continue;
            }
            let Some(specifier) = reference.specifier() else {
                continue;
            };
            let Some(target) = resolve_import(specifier, &file.path, &known, config) else {
                continue;
            };

            let edge = edges.record(&file.id, target, EdgeLevel::File, || EdgeMetadata {
                from_file: file.id.clone(),
                to_file: target.to_string(),
                line: reference.line,
                reference_type: Some(ReferenceType::ImportBinding),
                ..EdgeMetadata::default()
            });
            if !edge.metadata.specifiers.iter().any(|s| s == specifier) {
                edge.metadata.specifiers.push(specifier.to_string());
            }
        }
    }

    edges.into_edges()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::{ImportKind, Reference, ReferenceMetadata};

    fn import(spec: &str, line: usize) -> Reference {
        Reference {
            target_name: "x".to_string(),
            reference_type: ReferenceType::ImportBinding,
            line,
            column: 0,
            metadata: ReferenceMetadata {
                module_specifier: Some(spec.to_string()),
                import_kind: Some(ImportKind::Static),
                ..ReferenceMetadata::default()
            },
        }
    }

    fn call(name: &str) -> Reference {
        Reference {
            target_name: name.to_string(),
            reference_type: ReferenceType::Call,
            line: 1,
            column: 0,
            metadata: ReferenceMetadata::default(),
        }
    }

    #[test]
    fn test_import_produces_edge_to_dependency() {
        let files = vec![IndexedFile::new("a", "src/a.ts"), IndexedFile::new("b", "src/b.ts")];
        let mut refs = ReferencesByFile::new();
        refs.insert("b".to_string(), vec![import("./a", 1), call("f")]);

        let edges = build_file_dependencies(&files, &refs, &EngineConfig::default());
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].key(), ("b", "a", EdgeLevel::File));
        assert_eq!(edges[0].metadata.specifiers, vec!["./a".to_string()]);
        assert_eq!(edges[0].metadata.from_file, "b");
        assert_eq!(edges[0].metadata.to_file, "a");
    }

    #[test]
    fn test_repeated_imports_collapse() {
        let files = vec![IndexedFile::new("a", "a.ts"), IndexedFile::new("b", "b.ts")];
        let mut refs = ReferencesByFile::new();
        refs.insert(
            "b".to_string(),
            vec![import("./a", 1), import("./a.ts", 2), import("./a", 3)],
        );

        let edges = build_file_dependencies(&files, &refs, &EngineConfig::default());
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].metadata.occurrences, 3);
        assert_eq!(edges[0].metadata.line, 1);
        assert_eq!(
            edges[0].metadata.specifiers,
            vec!["./a".to_string(), "./a.ts".to_string()]
        );
    }

    #[test]
    fn test_unresolved_and_bare_imports_skipped() {
        let files = vec![IndexedFile::new("b", "b.ts")];
        let mut refs = ReferencesByFile::new();
        refs.insert("b".to_string(), vec![import("./missing", 1), import("lodash", 2)]);

        assert!(build_file_dependencies(&files, &refs, &EngineConfig::default()).is_empty());
    }

    #[test]
    fn test_output_follows_file_order() {
        let files = vec![
            IndexedFile::new("a", "a.ts"),
            IndexedFile::new("b", "b.ts"),
            IndexedFile::new("c", "c.ts"),
        ];
        let mut refs = ReferencesByFile::new();
        refs.insert("c".to_string(), vec![import("./a", 1)]);
        refs.insert("a".to_string(), vec![import("./b", 1)]);

        let edges = build_file_dependencies(&files, &refs, &EngineConfig::default());
        let keys: Vec<_> = edges.iter().map(|e| (e.from_id.as_str(), e.to_id.as_str())).collect();
        assert_eq!(keys, vec![("a", "b"), ("c", "a")]);
    }
}
