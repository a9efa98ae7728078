//! Syntactic reference extraction
//!
//! Extracts imports, calls, property accesses and type references as written
//! in source. Purely syntactic: no other file is consulted and no name is
//! resolved to a declaration.

use serde::{Deserialize, Serialize};

use crate::ingest::parser::SyntaxTree;
use crate::ingest::{has_token, node_text};

/// Kind of syntactic use
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceType {
    /// A binding introduced by an import (or re-export / require / dynamic import)
    ImportBinding,
    /// A call or constructor invocation
    Call,
    /// `object.property` outside of a call's callee position
    PropertyAccess,
    /// A named type used in a type position or class heritage
    TypeReference,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::ImportBinding => "import-binding",
            ReferenceType::Call => "call",
            ReferenceType::PropertyAccess => "property-access",
            ReferenceType::TypeReference => "type-reference",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "import-binding" => Some(ReferenceType::ImportBinding),
            "call" => Some(ReferenceType::Call),
            "property-access" => Some(ReferenceType::PropertyAccess),
            "type-reference" => Some(ReferenceType::TypeReference),
            _ => None,
        }
    }
}

/// How a module dependency was introduced
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `import { a } from './m'`, `import a from './m'`, `import * as m from './m'`
    Static,
    /// `export { a } from './m'`, `export * from './m'`
    ReExport,
    /// `import './m'`
    SideEffect,
    /// `import('./m')`
    Dynamic,
    /// `require('./m')`, `import a = require('./m')`
    Require,
}

/// Per-type details of a reference. Fields not relevant to the type stay unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceMetadata {
    /// Module specifier string (import-binding)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_specifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_kind: Option<ImportKind>,
    /// Name exported by the target module: `default`, `*`, or the specifier name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_name: Option<String>,
    /// `import type { T }`
    #[serde(default)]
    pub is_type_only: bool,
    /// Number of arguments (call)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_count: Option<usize>,
    /// `new X()` (call)
    #[serde(default)]
    pub is_constructor: bool,
    /// Receiver text of `object.name` (call, property-access, qualified type)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    /// `Foo<T>` (type-reference)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_generic: Option<bool>,
}

/// A syntactic use of a name at a source position
///
/// Pure data structure. No semantic resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reference {
    /// Name as written at the use site (local binding name for imports)
    pub target_name: String,
    pub reference_type: ReferenceType,
    /// Line of the use site (1-indexed)
    pub line: usize,
    /// Column of the use site (0-indexed, bytes)
    pub column: usize,
    #[serde(default)]
    pub metadata: ReferenceMetadata,
}

impl Reference {
    pub fn is_import(&self) -> bool {
        self.reference_type == ReferenceType::ImportBinding
    }

    /// Module specifier of an import-binding reference
    pub fn specifier(&self) -> Option<&str> {
        self.metadata.module_specifier.as_deref()
    }
}

/// Extract references from a parsed file.
///
/// # Guarantees
/// - Pure function: same tree → same references, in document (pre-order) order
/// - No filesystem access, no cross-file lookups
pub fn extract_references(tree: &SyntaxTree) -> Vec<Reference> {
    let mut walker = ReferenceWalker {
        source: tree.source_bytes(),
        references: Vec::new(),
    };
    walker.walk(&tree.root());
    walker.references
}

struct ReferenceWalker<'s> {
    source: &'s [u8],
    references: Vec<Reference>,
}

impl<'s> ReferenceWalker<'s> {
    fn walk(&mut self, node: &tree_sitter::Node) {
        match node.kind() {
            "import_statement" => {
                self.import_statement(node);
                // Nothing below an import can reference anything else
            }
            "export_statement" => {
                self.re_export(node);
                self.walk_children(node);
            }
            "call_expression" => self.call_expression(node),
            "new_expression" => self.new_expression(node),
            "member_expression" => {
                let source = self.source;
                if let Some(property) = node.child_by_field_name("property") {
                    let object = node.child_by_field_name("object");
                    self.push_at(
                        &property,
                        node_text(&property, self.source),
                        ReferenceType::PropertyAccess,
                        ReferenceMetadata {
                            object_name: object.map(|o| compact_text(&o, source)),
                            ..ReferenceMetadata::default()
                        },
                    );
                }
                if let Some(object) = node.child_by_field_name("object") {
                    self.walk(&object);
                }
            }
            "type_identifier" => {
                if !is_declaration_name(node) {
                    self.type_reference(node, node_text(node, self.source), None, false);
                }
            }
            "nested_type_identifier" => self.nested_type(node, false),
            "generic_type" => {
                if let Some(name) = node.child_by_field_name("name") {
                    match name.kind() {
                        "nested_type_identifier" => self.nested_type(&name, true),
                        _ => self.type_reference(&name, node_text(&name, self.source), None, true),
                    }
                }
                if let Some(args) = node.child_by_field_name("type_arguments") {
                    self.walk(&args);
                }
            }
            // `class A extends Base` (JS class_heritage, TS extends_clause)
            "class_heritage" | "extends_clause" => {
                let mut cursor = node.walk();
                let children: Vec<_> = node.named_children(&mut cursor).collect();
                for child in children {
                    if child.kind() == "identifier" {
                        self.type_reference(&child, node_text(&child, self.source), None, false);
                    } else {
                        self.walk(&child);
                    }
                }
            }
            _ => self.walk_children(node),
        }
    }

    fn walk_children(&mut self, node: &tree_sitter::Node) {
        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        for child in children {
            self.walk(&child);
        }
    }

    fn import_statement(&mut self, node: &tree_sitter::Node) {
        let type_only = has_token(node, "type");
        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();

        // TypeScript `import a = require('./m')`
        if let Some(clause) = children.iter().find(|c| c.kind() == "import_require_clause") {
            let Some(source) = clause.child_by_field_name("source") else {
                return;
            };
            let specifier = unquote(node_text(&source, self.source));
            let mut clause_cursor = clause.walk();
            let local = clause
                .named_children(&mut clause_cursor)
                .find(|c| c.kind() == "identifier");
            if let Some(local) = local {
                self.import_binding(&local, node_text(&local, self.source), &specifier, ImportKind::Require, "default", type_only);
            }
            return;
        }

        let Some(source) = node.child_by_field_name("source") else {
            return;
        };
        let specifier = unquote(node_text(&source, self.source));

        let Some(clause) = children.iter().find(|c| c.kind() == "import_clause") else {
            // `import './polyfill'`
            self.import_binding(&source, &specifier, &specifier, ImportKind::SideEffect, "*", type_only);
            return;
        };

        let mut clause_cursor = clause.walk();
        let parts: Vec<_> = clause.named_children(&mut clause_cursor).collect();
        for part in parts {
            match part.kind() {
                "identifier" => {
                    self.import_binding(&part, node_text(&part, self.source), &specifier, ImportKind::Static, "default", type_only);
                }
                "namespace_import" => {
                    let mut ns_cursor = part.walk();
                    let local = part
                        .named_children(&mut ns_cursor)
                        .find(|c| c.kind() == "identifier");
                    if let Some(local) = local {
                        self.import_binding(&local, node_text(&local, self.source), &specifier, ImportKind::Static, "*", type_only);
                    }
                }
                "named_imports" => {
                    let mut spec_cursor = part.walk();
                    let specs: Vec<_> = part.named_children(&mut spec_cursor).collect();
                    for spec in specs {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let Some(name) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        let imported = unquote(node_text(&name, self.source));
                        let local = spec.child_by_field_name("alias").unwrap_or(name);
                        let spec_type_only = type_only || has_token(&spec, "type");
                        self.import_binding(&local, &unquote(node_text(&local, self.source)), &specifier, ImportKind::Static, &imported, spec_type_only);
                    }
                }
                _ => {}
            }
        }
    }

    /// `export { a } from './m'`, `export * from './m'`, `export * as ns from './m'`
    fn re_export(&mut self, node: &tree_sitter::Node) {
        let Some(source) = node.child_by_field_name("source") else {
            return;
        };
        let specifier = unquote(node_text(&source, self.source));
        let type_only = has_token(node, "type");

        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        let mut emitted = false;
        for child in &children {
            match child.kind() {
                "export_clause" => {
                    let mut spec_cursor = child.walk();
                    let specs: Vec<_> = child.named_children(&mut spec_cursor).collect();
                    for spec in specs {
                        if spec.kind() != "export_specifier" {
                            continue;
                        }
                        if let Some(name) = spec.child_by_field_name("name") {
                            let name_text = unquote(node_text(&name, self.source));
                            self.import_binding(&name, &name_text, &specifier, ImportKind::ReExport, &name_text, type_only);
                            emitted = true;
                        }
                    }
                }
                "namespace_export" => {
                    let mut ns_cursor = child.walk();
                    let local = child.named_children(&mut ns_cursor).next();
                    if let Some(local) = local {
                        self.import_binding(&local, node_text(&local, self.source), &specifier, ImportKind::ReExport, "*", type_only);
                        emitted = true;
                    }
                }
                _ => {}
            }
        }
        if !emitted {
            // `export * from './m'`
            self.import_binding(&source, "*", &specifier, ImportKind::ReExport, "*", type_only);
        }
    }

    fn call_expression(&mut self, node: &tree_sitter::Node) {
        let source = self.source;
        let arguments = node.child_by_field_name("arguments");
        let argument_count = arguments.map(|a| count_arguments(&a));

        if let Some(callee) = node.child_by_field_name("function") {
            match callee.kind() {
                // `import('./m')`
                "import" => {
                    if let Some(specifier) = arguments.and_then(|a| first_string_argument(&a, self.source)) {
                        self.import_binding(&callee, &specifier, &specifier, ImportKind::Dynamic, "*", false);
                    }
                }
                "identifier" => {
                    let name = node_text(&callee, self.source);
                    self.push_at(
                        &callee,
                        name,
                        ReferenceType::Call,
                        ReferenceMetadata {
                            argument_count,
                            ..ReferenceMetadata::default()
                        },
                    );
                    if name == "require" {
                        if let Some(specifier) = arguments.and_then(|a| first_string_argument(&a, self.source)) {
                            self.import_binding(&callee, &specifier, &specifier, ImportKind::Require, "default", false);
                        }
                    }
                }
                "member_expression" => {
                    if let Some(property) = callee.child_by_field_name("property") {
                        let object = callee.child_by_field_name("object");
                        self.push_at(
                            &property,
                            node_text(&property, self.source),
                            ReferenceType::Call,
                            ReferenceMetadata {
                                argument_count,
                                object_name: object.map(|o| compact_text(&o, source)),
                                ..ReferenceMetadata::default()
                            },
                        );
                    }
                    // The callee's own property is the call; only its receiver is walked
                    if let Some(object) = callee.child_by_field_name("object") {
                        self.walk(&object);
                    }
                }
                _ => self.walk(&callee),
            }
        }

        if let Some(type_args) = node.child_by_field_name("type_arguments") {
            self.walk(&type_args);
        }
        if let Some(arguments) = arguments {
            self.walk(&arguments);
        }
    }

    fn new_expression(&mut self, node: &tree_sitter::Node) {
        let source = self.source;
        let arguments = node.child_by_field_name("arguments");
        let argument_count = Some(arguments.map(|a| count_arguments(&a)).unwrap_or(0));

        if let Some(constructor) = node.child_by_field_name("constructor") {
            match constructor.kind() {
                "identifier" => self.push_at(
                    &constructor,
                    node_text(&constructor, self.source),
                    ReferenceType::Call,
                    ReferenceMetadata {
                        argument_count,
                        is_constructor: true,
                        ..ReferenceMetadata::default()
                    },
                ),
                "member_expression" => {
                    if let Some(property) = constructor.child_by_field_name("property") {
                        let object = constructor.child_by_field_name("object");
                        self.push_at(
                            &property,
                            node_text(&property, self.source),
                            ReferenceType::Call,
                            ReferenceMetadata {
                                argument_count,
                                is_constructor: true,
                                object_name: object.map(|o| compact_text(&o, source)),
                                ..ReferenceMetadata::default()
                            },
                        );
                    }
                    if let Some(object) = constructor.child_by_field_name("object") {
                        self.walk(&object);
                    }
                }
                _ => self.walk(&constructor),
            }
        }

        if let Some(type_args) = node.child_by_field_name("type_arguments") {
            self.walk(&type_args);
        }
        if let Some(arguments) = arguments {
            self.walk(&arguments);
        }
    }

    /// `ns.Type` in a type position
    fn nested_type(&mut self, node: &tree_sitter::Node, is_generic: bool) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let object = node.child_by_field_name("module").map(|m| compact_text(&m, self.source));
        self.type_reference(&name, node_text(&name, self.source), object, is_generic);
    }

    fn type_reference(&mut self, at: &tree_sitter::Node, name: &str, object_name: Option<String>, is_generic: bool) {
        self.push_at(
            at,
            name,
            ReferenceType::TypeReference,
            ReferenceMetadata {
                is_generic: Some(is_generic),
                object_name,
                ..ReferenceMetadata::default()
            },
        );
    }

    fn import_binding(
        &mut self,
        at: &tree_sitter::Node,
        local_name: &str,
        specifier: &str,
        kind: ImportKind,
        imported_name: &str,
        type_only: bool,
    ) {
        self.push_at(
            at,
            local_name,
            ReferenceType::ImportBinding,
            ReferenceMetadata {
                module_specifier: Some(specifier.to_string()),
                import_kind: Some(kind),
                imported_name: Some(imported_name.to_string()),
                is_type_only: type_only,
                ..ReferenceMetadata::default()
            },
        );
    }

    fn push_at(
        &mut self,
        at: &tree_sitter::Node,
        name: &str,
        reference_type: ReferenceType,
        metadata: ReferenceMetadata,
    ) {
        if name.is_empty() {
            return;
        }
        self.references.push(Reference {
            target_name: name.to_string(),
            reference_type,
            line: at.start_position().row + 1, // tree-sitter is 0-indexed
            column: at.start_position().column,
            metadata,
        });
    }

}

fn compact_text(node: &tree_sitter::Node, source: &[u8]) -> String {
    node_text(node, source)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Type identifiers that name the thing being declared rather than use it
fn is_declaration_name(node: &tree_sitter::Node) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        "class_declaration"
        | "abstract_class_declaration"
        | "class"
        | "interface_declaration"
        | "type_alias_declaration"
        | "type_parameter" => parent
            .child_by_field_name("name")
            .map(|n| n.id() == node.id())
            .unwrap_or(false),
        // `infer U`, `[K in keyof T]`
        "infer_type" | "mapped_type_clause" => parent
            .named_child(0)
            .map(|n| n.id() == node.id())
            .unwrap_or(false),
        _ => false,
    }
}

fn count_arguments(arguments: &tree_sitter::Node) -> usize {
    if arguments.kind() != "arguments" {
        // Tagged template: one template argument
        return 1;
    }
    let mut cursor = arguments.walk();
    let count = arguments
        .named_children(&mut cursor)
        .filter(|a| a.kind() != "comment")
        .count();
    count
}

fn first_string_argument(arguments: &tree_sitter::Node, source: &[u8]) -> Option<String> {
    let mut cursor = arguments.walk();
    let first = arguments
        .named_children(&mut cursor)
        .find(|a| a.kind() != "comment")?;
    match first.kind() {
        "string" => Some(unquote(node_text(&first, source))),
        "template_string" => {
            let text = node_text(&first, source);
            if text.contains("${") {
                None
            } else {
                Some(unquote(text))
            }
        }
        _ => None,
    }
}

/// Strip one pair of surrounding quotes (`'`, `"` or backtick)
fn unquote(text: &str) -> String {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open), Some(close)) if open == close && matches!(open, '\'' | '"' | '`') => {
            chars.as_str().to_string()
        }
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parser::{parse_file, ParseOutcome};

    fn refs_of(path: &str, source: &str) -> Vec<Reference> {
        match parse_file(path, source) {
            ParseOutcome::Parsed(tree) => extract_references(&tree),
            other => panic!("parse failed: {:?}", other),
        }
    }

    fn of_type(refs: &[Reference], ty: ReferenceType) -> Vec<&Reference> {
        refs.iter().filter(|r| r.reference_type == ty).collect()
    }

    #[test]
    fn test_import_and_call() {
        let refs = refs_of("b.ts", "import {f} from './a'; f();\n");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].reference_type, ReferenceType::ImportBinding);
        assert_eq!(refs[0].target_name, "f");
        assert_eq!(refs[0].specifier(), Some("./a"));
        assert_eq!(refs[0].metadata.import_kind, Some(ImportKind::Static));
        assert_eq!(refs[1].reference_type, ReferenceType::Call);
        assert_eq!(refs[1].target_name, "f");
        assert_eq!(refs[1].metadata.argument_count, Some(0));
        assert_eq!((refs[1].line, refs[1].column), (1, 23));
    }

    #[test]
    fn test_import_forms() {
        let source = "\
import def, { a, b as c } from './m';
import * as ns from '../n';
import type { T } from './types';
import './polyfill';
";
        let refs = refs_of("x.ts", source);
        let imports = of_type(&refs, ReferenceType::ImportBinding);
        let summary: Vec<_> = imports
            .iter()
            .map(|r| {
                (
                    r.target_name.as_str(),
                    r.metadata.imported_name.as_deref().unwrap_or(""),
                    r.specifier().unwrap_or(""),
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("def", "default", "./m"),
                ("a", "a", "./m"),
                ("c", "b", "./m"),
                ("ns", "*", "../n"),
                ("T", "T", "./types"),
                ("./polyfill", "*", "./polyfill"),
            ]
        );
        assert!(imports[4].metadata.is_type_only);
        assert_eq!(imports[5].metadata.import_kind, Some(ImportKind::SideEffect));
    }

    #[test]
    fn test_re_exports_are_import_bindings() {
        let refs = refs_of("x.ts", "export { a } from './a';\nexport * from './b';\n");
        let imports = of_type(&refs, ReferenceType::ImportBinding);
        assert_eq!(imports.len(), 2);
        assert!(imports
            .iter()
            .all(|r| r.metadata.import_kind == Some(ImportKind::ReExport)));
        assert_eq!(imports[1].target_name, "*");
        assert_eq!(imports[1].specifier(), Some("./b"));
    }

    #[test]
    fn test_require_and_dynamic_import() {
        let refs = refs_of("x.cjs", "const m = require('./m');\nimport('./lazy').then(x => x);\n");
        let imports = of_type(&refs, ReferenceType::ImportBinding);
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].metadata.import_kind, Some(ImportKind::Require));
        assert_eq!(imports[1].metadata.import_kind, Some(ImportKind::Dynamic));
        assert_eq!(imports[1].specifier(), Some("./lazy"));
        // `require(...)` is also a call
        assert!(refs
            .iter()
            .any(|r| r.reference_type == ReferenceType::Call && r.target_name == "require"));
    }

    #[test]
    fn test_method_call_and_property_access() {
        let refs = refs_of("x.js", "api.client.send(a, b);\nconst n = config.port;\n");
        let calls = of_type(&refs, ReferenceType::Call);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target_name, "send");
        assert_eq!(calls[0].metadata.argument_count, Some(2));
        assert_eq!(calls[0].metadata.object_name.as_deref(), Some("api.client"));

        let props: Vec<_> = of_type(&refs, ReferenceType::PropertyAccess)
            .iter()
            .map(|r| r.target_name.as_str())
            .collect();
        // `send` is the call target, not a property access
        assert_eq!(props, vec!["client", "port"]);
    }

    #[test]
    fn test_constructor_call() {
        let refs = refs_of("x.ts", "const s = new Service(1);\n");
        let calls = of_type(&refs, ReferenceType::Call);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].metadata.is_constructor);
        assert_eq!(calls[0].metadata.argument_count, Some(1));
    }

    #[test]
    fn test_type_references() {
        let source = "\
interface Box<T> { value: T }
function wrap(u: User): Box<User> { return { value: u }; }
class Admin extends Base implements Role {}
let p: models.Profile;
";
        let refs = refs_of("x.ts", source);
        let types: Vec<_> = of_type(&refs, ReferenceType::TypeReference)
            .iter()
            .map(|r| (r.target_name.as_str(), r.metadata.is_generic.unwrap_or(false)))
            .collect();
        assert_eq!(
            types,
            vec![
                ("T", false),
                ("User", false),
                ("Box", true),
                ("User", false),
                ("Base", false),
                ("Role", false),
                ("Profile", false),
            ]
        );
    }

    #[test]
    fn test_declaration_names_are_not_references() {
        let refs = refs_of("x.ts", "type Id = string;\ninterface Shape {}\nclass Thing {}\n");
        assert!(of_type(&refs, ReferenceType::TypeReference).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let source = "import {a} from './a';\na.b.c(new D<E>());\n";
        assert_eq!(refs_of("x.ts", source), refs_of("x.ts", source));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'./a'"), "./a");
        assert_eq!(unquote("\"./b\""), "./b");
        assert_eq!(unquote("`./c`"), "./c");
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote("'"), "'");
    }
}
