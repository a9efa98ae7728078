//! Declared-symbol extraction.
//!
//! Walks the top-level statements of a module and dispatches on node kind,
//! one handler per declaration shape. Unknown node kinds fall through to a
//! no-op arm so new syntax never breaks extraction.
//!
//! # Extracted shapes
//! - function declarations (incl. generators and overload signatures)
//! - function/arrow/class expressions bound to an identifier
//! - classes, plus one symbol per method and field
//! - interfaces, type aliases, enums
//! - exported `const`/`let`/`var` bindings
//!
//! Non-exported plain variables are not extracted.

use ahash::AHashMap;

use crate::config::EngineConfig;
use crate::ingest::comments::find_documentation;
use crate::ingest::parser::SyntaxTree;
use crate::ingest::signature::{function_signature, property_signature};
use crate::ingest::{has_token, node_text, AccessModifier, Symbol, SymbolKind};

/// Export state inherited from an enclosing `export` statement
#[derive(Debug, Clone, Copy, Default)]
struct ExportFlags {
    exported: bool,
    default: bool,
}

impl ExportFlags {
    const NONE: ExportFlags = ExportFlags {
        exported: false,
        default: false,
    };
}

/// Export applied after traversal: `export { a }`, `export default a;`
#[derive(Debug)]
struct ExportMark {
    name: String,
    default: bool,
    /// Exported name when it differs from the local one
    alias: Option<String>,
}

/// Accumulates symbols and applies the (name, line_start) collision policy.
///
/// The first declaration in document order wins; later colliding declarations
/// contribute their signature to `overloads` and their export flags.
#[derive(Default)]
struct Collector {
    symbols: Vec<Symbol>,
    top_level: Vec<bool>,
    keys: AHashMap<(String, usize), usize>,
}

impl Collector {
    fn push(&mut self, symbol: Symbol, top_level: bool) {
        let key = (symbol.name.clone(), symbol.line_start);
        if let Some(&idx) = self.keys.get(&key) {
            let existing = &mut self.symbols[idx];
            let overload = symbol
                .signature
                .clone()
                .unwrap_or_else(|| format!("{} {}", symbol.kind.as_str(), symbol.name));
            existing.overloads.push(overload);
            existing.is_exported |= symbol.is_exported;
            existing.is_default_export |= symbol.is_default_export;
            return;
        }
        self.keys.insert(key, self.symbols.len());
        self.symbols.push(symbol);
        self.top_level.push(top_level);
    }

    fn apply_marks(&mut self, marks: &[ExportMark]) {
        for mark in marks {
            for (symbol, top_level) in self.symbols.iter_mut().zip(&self.top_level) {
                if *top_level && symbol.name == mark.name {
                    symbol.is_exported = true;
                    symbol.is_default_export |= mark.default;
                    if let Some(alias) = &mark.alias {
                        if !symbol.export_aliases.contains(alias) {
                            symbol.export_aliases.push(alias.clone());
                        }
                    }
                }
            }
        }
    }
}

/// Symbol extractor bound to a configuration (sentinels, comment threshold)
#[derive(Debug, Clone, Copy)]
pub struct SymbolExtractor<'a> {
    config: &'a EngineConfig,
}

impl<'a> SymbolExtractor<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Extract declared symbols from a parsed file.
    ///
    /// # Guarantees
    /// - Pure function: same tree → same symbols, in document order
    /// - No duplicate (name, line_start) pairs
    pub fn extract(&self, tree: &SyntaxTree) -> Vec<Symbol> {
        let source = tree.source_bytes();
        let root = tree.root();
        let mut collector = Collector::default();
        let mut marks = Vec::new();

        let mut cursor = root.walk();
        for statement in root.named_children(&mut cursor) {
            self.visit_statement(&statement, source, &mut collector, &mut marks);
        }

        collector.apply_marks(&marks);
        collector.symbols
    }

    fn visit_statement(
        &self,
        node: &tree_sitter::Node,
        source: &[u8],
        out: &mut Collector,
        marks: &mut Vec<ExportMark>,
    ) {
        match node.kind() {
            "export_statement" => self.visit_export(node, source, out, marks),
            _ => self.visit_declaration(node, node, ExportFlags::NONE, source, out),
        }
    }

    fn visit_export(
        &self,
        node: &tree_sitter::Node,
        source: &[u8],
        out: &mut Collector,
        marks: &mut Vec<ExportMark>,
    ) {
        let flags = ExportFlags {
            exported: true,
            default: has_token(node, "default"),
        };

        if let Some(decl) = node.child_by_field_name("declaration") {
            self.visit_declaration(&decl, node, flags, source, out);
            return;
        }

        if let Some(value) = node.child_by_field_name("value") {
            self.visit_default_value(&value, node, source, out, marks);
            return;
        }

        // `export { a, b as c }` and `export { a } from './m'`: mark, never create
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() != "export_clause" {
                continue;
            }
            let mut spec_cursor = child.walk();
            for spec in child.named_children(&mut spec_cursor) {
                if spec.kind() != "export_specifier" {
                    continue;
                }
                if let Some(name) = spec.child_by_field_name("name") {
                    let name = node_text(&name, source).to_string();
                    let alias = spec
                        .child_by_field_name("alias")
                        .map(|a| node_text(&a, source).to_string())
                        .filter(|a| *a != name);
                    let default = alias.as_deref() == Some("default");
                    marks.push(ExportMark {
                        name,
                        default,
                        alias: alias.filter(|a| a != "default"),
                    });
                }
            }
        }
    }

    /// `export default <expression>`
    fn visit_default_value(
        &self,
        value: &tree_sitter::Node,
        anchor: &tree_sitter::Node,
        source: &[u8],
        out: &mut Collector,
        marks: &mut Vec<ExportMark>,
    ) {
        let flags = ExportFlags {
            exported: true,
            default: true,
        };
        match value.kind() {
            "identifier" => marks.push(ExportMark {
                name: node_text(value, source).to_string(),
                default: true,
                alias: None,
            }),
            "function_expression" | "function" | "generator_function" | "arrow_function" => {
                let name = own_name(value, source).unwrap_or_else(|| self.config.anonymous_name.clone());
                let symbol = self.function_symbol(&name, value, anchor, flags, source);
                out.push(symbol, true);
            }
            "class" => {
                let name = own_name(value, source).unwrap_or_else(|| self.config.anonymous_name.clone());
                self.visit_class(&name, value, anchor, flags, source, out);
            }
            "parenthesized_expression" => {
                let mut cursor = value.walk();
                let inner = value.named_children(&mut cursor).next();
                if let Some(inner) = inner {
                    self.visit_default_value(&inner, anchor, source, out, marks);
                }
            }
            _ => {
                let symbol = self.base_symbol(
                    self.config.default_export_name.clone(),
                    SymbolKind::Constant,
                    value,
                    anchor,
                    flags,
                    source,
                );
                out.push(symbol, true);
            }
        }
    }

    fn visit_declaration(
        &self,
        node: &tree_sitter::Node,
        anchor: &tree_sitter::Node,
        flags: ExportFlags,
        source: &[u8],
        out: &mut Collector,
    ) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" | "function_signature" => {
                let name = own_name(node, source).unwrap_or_else(|| self.config.anonymous_name.clone());
                let symbol = self.function_symbol(&name, node, anchor, flags, source);
                out.push(symbol, true);
            }
            "class_declaration" | "abstract_class_declaration" => {
                let name = own_name(node, source).unwrap_or_else(|| self.config.anonymous_name.clone());
                self.visit_class(&name, node, anchor, flags, source, out);
            }
            "interface_declaration" => self.push_named(node, anchor, SymbolKind::Interface, flags, source, out),
            "type_alias_declaration" => self.push_named(node, anchor, SymbolKind::Type, flags, source, out),
            "enum_declaration" => self.push_named(node, anchor, SymbolKind::Enum, flags, source, out),
            "lexical_declaration" | "variable_declaration" => {
                self.visit_variables(node, anchor, flags, source, out)
            }
            // `declare function f(): void;` and friends
            "ambient_declaration" => {
                let mut cursor = node.walk();
                let inner: Vec<_> = node.named_children(&mut cursor).collect();
                for child in inner {
                    self.visit_declaration(&child, anchor, flags, source, out);
                }
            }
            _ => {}
        }
    }

    fn push_named(
        &self,
        node: &tree_sitter::Node,
        anchor: &tree_sitter::Node,
        kind: SymbolKind,
        flags: ExportFlags,
        source: &[u8],
        out: &mut Collector,
    ) {
        if let Some(name) = own_name(node, source) {
            let symbol = self.base_symbol(name, kind, node, anchor, flags, source);
            out.push(symbol, true);
        }
    }

    fn visit_variables(
        &self,
        node: &tree_sitter::Node,
        anchor: &tree_sitter::Node,
        flags: ExportFlags,
        source: &[u8],
        out: &mut Collector,
    ) {
        let is_const = has_token(node, "const");
        let mut cursor = node.walk();
        for declarator in node.named_children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            // Destructuring patterns have no single binding name
            if name_node.kind() != "identifier" {
                continue;
            }
            let name = node_text(&name_node, source).to_string();
            let value = declarator.child_by_field_name("value");

            match value.as_ref().map(|v| v.kind()) {
                Some("arrow_function" | "function_expression" | "function" | "generator_function") => {
                    if let Some(value) = value {
                        let mut symbol = self.function_symbol(&name, &value, anchor, flags, source);
                        set_range(&mut symbol, &declarator);
                        out.push(symbol, true);
                    }
                }
                Some("class") => {
                    if let Some(value) = value {
                        self.visit_class(&name, &value, anchor, flags, source, out);
                    }
                }
                _ if flags.exported => {
                    let kind = if is_const {
                        SymbolKind::Constant
                    } else {
                        SymbolKind::Variable
                    };
                    let symbol = self.base_symbol(name, kind, &declarator, anchor, flags, source);
                    out.push(symbol, true);
                }
                _ => {}
            }
        }
    }

    fn visit_class(
        &self,
        name: &str,
        node: &tree_sitter::Node,
        anchor: &tree_sitter::Node,
        flags: ExportFlags,
        source: &[u8],
        out: &mut Collector,
    ) {
        let class = self.base_symbol(name.to_string(), SymbolKind::Class, node, anchor, flags, source);
        out.push(class, true);

        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            if let Some(symbol) = self.member_symbol(&member, source) {
                out.push(symbol, false);
            }
        }
    }

    fn member_symbol(&self, member: &tree_sitter::Node, source: &[u8]) -> Option<Symbol> {
        let (kind, name_field) = match member.kind() {
            "method_definition" | "method_signature" | "abstract_method_signature" => {
                (SymbolKind::Method, "name")
            }
            "public_field_definition" => (SymbolKind::Property, "name"),
            "field_definition" => (SymbolKind::Property, "property"),
            _ => return None,
        };
        let name_node = member.child_by_field_name(name_field)?;
        let name = node_text(&name_node, source).to_string();

        let mut symbol = self.base_symbol(name.clone(), kind, member, member, ExportFlags::NONE, source);
        symbol.is_static = has_token(member, "static");
        symbol.access_modifier = Some(access_modifier(member, &name_node, source));

        if kind == SymbolKind::Method {
            symbol.signature = Some(function_signature(&name, member, source));
            symbol.is_async = Some(has_token(member, "async"));
            symbol.is_generator = Some(has_token(member, "*"));
        } else {
            symbol.signature = property_signature(&name, member, source);
        }
        Some(symbol)
    }

    fn function_symbol(
        &self,
        name: &str,
        node: &tree_sitter::Node,
        anchor: &tree_sitter::Node,
        flags: ExportFlags,
        source: &[u8],
    ) -> Symbol {
        let mut symbol = self.base_symbol(name.to_string(), SymbolKind::Function, node, anchor, flags, source);
        symbol.signature = Some(function_signature(name, node, source));
        symbol.is_async = Some(has_token(node, "async"));
        symbol.is_generator = Some(node.kind().starts_with("generator_") || has_token(node, "*"));
        symbol
    }

    fn base_symbol(
        &self,
        name: String,
        kind: SymbolKind,
        node: &tree_sitter::Node,
        anchor: &tree_sitter::Node,
        flags: ExportFlags,
        source: &[u8],
    ) -> Symbol {
        let mut symbol = Symbol {
            name,
            kind,
            line_start: 0,
            line_end: 0,
            column_start: 0,
            column_end: 0,
            signature: None,
            documentation: find_documentation(anchor, source, self.config.doc_comment_max_distance),
            is_exported: flags.exported,
            is_default_export: flags.default,
            is_async: None,
            is_generator: None,
            is_static: false,
            access_modifier: None,
            overloads: Vec::new(),
            export_aliases: Vec::new(),
        };
        set_range(&mut symbol, node);
        symbol
    }
}

/// Extract symbols with the default configuration
pub fn extract_symbols(tree: &SyntaxTree) -> Vec<Symbol> {
    let config = EngineConfig::default();
    SymbolExtractor::new(&config).extract(tree)
}

fn set_range(symbol: &mut Symbol, node: &tree_sitter::Node) {
    symbol.line_start = node.start_position().row + 1; // tree-sitter is 0-indexed
    symbol.line_end = node.end_position().row + 1;
    symbol.column_start = node.start_position().column;
    symbol.column_end = node.end_position().column;
}

/// Text of the node's `name` field
fn own_name(node: &tree_sitter::Node, source: &[u8]) -> Option<String> {
    node.child_by_field_name("name")
        .map(|n| node_text(&n, source).to_string())
        .filter(|n| !n.is_empty())
}

fn access_modifier(
    member: &tree_sitter::Node,
    name_node: &tree_sitter::Node,
    source: &[u8],
) -> AccessModifier {
    if name_node.kind() == "private_property_identifier" {
        return AccessModifier::Private;
    }
    let mut cursor = member.walk();
    let explicit = member
        .children(&mut cursor)
        .find(|c| c.kind() == "accessibility_modifier")
        .and_then(|c| AccessModifier::parse(node_text(&c, source).trim()));
    explicit.unwrap_or(AccessModifier::Public)
}
