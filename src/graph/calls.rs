//! Symbol-level dependency edges from calls and type references
//!
//! Matching is by name only. A call or type reference links to an exported
//! symbol of a file that the referencing file imports. Two imported files
//! exporting the same name both receive an edge; no type information is
//! used to pick one.

use ahash::AHashMap;

use crate::config::EngineConfig;
use crate::graph::module_resolver::{resolve_import, IndexedFile, KnownFiles};
use crate::graph::{
    DependencyEdge, EdgeAccumulator, EdgeLevel, EdgeMetadata, ReferencesByFile, SymbolsByFile,
};
use crate::ingest::{symbol_id, Symbol, SymbolKind};
use crate::references::{ImportKind, Reference, ReferenceType};

/// Exported, top-level symbols of one file
struct ExportTable<'s> {
    by_name: AHashMap<&'s str, Vec<&'s Symbol>>,
    default_export: Option<&'s Symbol>,
}

impl<'s> ExportTable<'s> {
    fn new(symbols: &'s [Symbol]) -> Self {
        let mut by_name: AHashMap<&str, Vec<&Symbol>> = AHashMap::new();
        let mut default_export = None;
        for symbol in symbols {
            if !symbol.is_exported || matches!(symbol.kind, SymbolKind::Method | SymbolKind::Property) {
                continue;
            }
            by_name.entry(symbol.name.as_str()).or_default().push(symbol);
            for alias in &symbol.export_aliases {
                by_name.entry(alias.as_str()).or_default().push(symbol);
            }
            if symbol.is_default_export && default_export.is_none() {
                default_export = Some(symbol);
            }
        }
        Self {
            by_name,
            default_export,
        }
    }

    fn named(&self, name: &str) -> &[&'s Symbol] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// What a local name means inside the importing file
enum Binding<'k> {
    /// `import { name as local }` / `import local from`
    Named { file: &'k str, imported: String },
    /// `import * as local` / `import local = require(...)`
    Namespace { file: &'k str },
}

/// Import view of one file: local bindings plus every file it imports
struct ImportScope<'k> {
    bindings: AHashMap<String, Binding<'k>>,
    imported_files: Vec<&'k str>,
}

impl<'k> ImportScope<'k> {
    fn new(file: &IndexedFile, refs: &[Reference], known: &'k KnownFiles, config: &EngineConfig) -> Self {
        let mut bindings = AHashMap::new();
        let mut imported_files: Vec<&str> = Vec::new();

        for reference in refs.iter().filter(|r| r.is_import()) {
            let Some(target) = reference
                .specifier()
                .and_then(|spec| resolve_import(spec, &file.path, known, config))
            else {
                continue;
            };
            if !imported_files.contains(&target) {
                imported_files.push(target);
            }

            let kind = reference.metadata.import_kind;
            if !matches!(kind, Some(ImportKind::Static) | Some(ImportKind::Require)) {
                continue;
            }
            let imported = reference.metadata.imported_name.as_deref().unwrap_or("");
            let binding = match (kind, imported) {
                (_, "*") => Binding::Namespace { file: target },
                // `import m = require('./m')` binds the module object
                (Some(ImportKind::Require), _) => Binding::Namespace { file: target },
                (_, "") => continue,
                (_, name) => Binding::Named {
                    file: target,
                    imported: name.to_string(),
                },
            };
            bindings.entry(reference.target_name.clone()).or_insert(binding);
        }

        Self {
            bindings,
            imported_files,
        }
    }
}

/// Build symbol → symbol edges for calls and type references
///
/// The referencing side is the innermost symbol of the file whose line range
/// contains the reference, or the file ID at module scope. Repeated
/// (from, to) pairs collapse into one edge with an occurrence count.
pub fn build_symbol_dependencies(
    files: &[IndexedFile],
    symbols: &SymbolsByFile,
    references: &ReferencesByFile,
    config: &EngineConfig,
) -> Vec<DependencyEdge> {
    let known = KnownFiles::new(files);
    let empty: Vec<Symbol> = Vec::new();
    let exports: AHashMap<&str, ExportTable> = files
        .iter()
        .map(|f| {
            let syms = symbols.get(&f.id).unwrap_or(&empty);
            (f.id.as_str(), ExportTable::new(syms))
        })
        .collect();

    let mut edges = EdgeAccumulator::default();

    for file in files {
        let Some(refs) = references.get(&file.id) else {
            continue;
        };
        let own_symbols = symbols.get(&file.id).unwrap_or(&empty);
        let scope = ImportScope::new(file, refs, &known, config);
        if scope.imported_files.is_empty() {
            continue;
        }

        for reference in refs {
            if !matches!(
                reference.reference_type,
                ReferenceType::Call | ReferenceType::TypeReference
            ) {
                continue;
            }

            let targets = match_targets(reference, &scope, &exports);
            if targets.is_empty() {
                continue;
            }

            let from_id = match enclosing_symbol(own_symbols, reference.line) {
                Some(symbol) => symbol_id(&file.id, &symbol.name, symbol.line_start),
                None => file.id.clone(),
            };

            for (target_file, target) in targets {
                let to_id = symbol_id(target_file, &target.name, target.line_start);
                edges.record(&from_id, &to_id, EdgeLevel::Symbol, || EdgeMetadata {
                    from_file: file.id.clone(),
                    to_file: target_file.to_string(),
                    line: reference.line,
                    target_name: Some(target.name.clone()),
                    reference_type: Some(reference.reference_type),
                    ..EdgeMetadata::default()
                });
            }
        }
    }

    edges.into_edges()
}

/// Exported symbols a reference may point at, as (file_id, symbol)
fn match_targets<'a>(
    reference: &Reference,
    scope: &ImportScope<'a>,
    exports: &AHashMap<&str, ExportTable<'a>>,
) -> Vec<(&'a str, &'a Symbol)> {
    let lookup = |file: &'a str, name: &str| -> Vec<(&'a str, &'a Symbol)> {
        exports
            .get(file)
            .map(|table| table.named(name).iter().map(|s| (file, *s)).collect())
            .unwrap_or_default()
    };

    match reference.metadata.object_name.as_deref() {
        // `ns.f()` / `ns.Type` through a namespace import
        Some(object) => match scope.bindings.get(object) {
            Some(Binding::Namespace { file }) => lookup(*file, &reference.target_name),
            _ => Vec::new(),
        },
        None => match scope.bindings.get(&reference.target_name) {
            Some(Binding::Named { file, imported }) if imported == "default" => exports
                .get(file)
                .and_then(|table| table.default_export)
                .map(|s| vec![(*file, s)])
                .unwrap_or_default(),
            Some(Binding::Named { file, imported }) => lookup(*file, imported),
            Some(Binding::Namespace { .. }) => Vec::new(),
            // Name-based fallback over every imported file
            None => scope
                .imported_files
                .iter()
                .flat_map(|file| lookup(*file, &reference.target_name))
                .collect(),
        },
    }
}

/// Innermost symbol containing `line`; ties go to the first in document order
fn enclosing_symbol(symbols: &[Symbol], line: usize) -> Option<&Symbol> {
    symbols
        .iter()
        .filter(|s| s.contains_line(line))
        .fold(None, |best: Option<&Symbol>, s| match best {
            Some(b) if b.line_span() <= s.line_span() => Some(b),
            _ => Some(s),
        })
}
