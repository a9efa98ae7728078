//! Source ingestion: parsing and declared-symbol extraction.
//!
//! Pure functions: Input (tree, path) → Output facts.
//! No filesystem access. No global state. No caching beyond thread-local parsers.

pub mod comments;
pub mod parser;
pub mod pool;
pub mod signature;
pub mod symbols;

pub use parser::{
    is_supported_for_file, parse_file, ParseError, ParseOutcome, ParserAdapter, SourceDialect,
    SourceLocation, SyntaxTree,
};
pub use symbols::{extract_symbols, SymbolExtractor};

use serde::{Deserialize, Serialize};

/// Kind of declared symbol
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    /// Function declaration, or function/arrow expression bound to a name
    Function,
    /// Class declaration (abstract or concrete)
    Class,
    /// Interface declaration
    Interface,
    /// Type alias
    Type,
    /// Enum declaration
    Enum,
    /// Exported `let`/`var` binding
    Variable,
    /// Exported `const` binding
    Constant,
    /// Method inside a class body
    Method,
    /// Field inside a class body
    Property,
}

impl SymbolKind {
    /// Return the normalized string key for this symbol kind (used for storage)
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Type => "type",
            SymbolKind::Enum => "enum",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Method => "method",
            SymbolKind::Property => "property",
        }
    }

    /// Parse a stored key back to a SymbolKind
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(SymbolKind::Function),
            "class" => Some(SymbolKind::Class),
            "interface" => Some(SymbolKind::Interface),
            "type" => Some(SymbolKind::Type),
            "enum" => Some(SymbolKind::Enum),
            "variable" => Some(SymbolKind::Variable),
            "constant" => Some(SymbolKind::Constant),
            "method" => Some(SymbolKind::Method),
            "property" => Some(SymbolKind::Property),
            _ => None,
        }
    }

    /// Function-like kinds carry async/generator flags and a parameter signature
    pub fn is_function_like(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }
}

/// Member visibility
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccessModifier {
    Public,
    Private,
    Protected,
}

impl AccessModifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessModifier::Public => "public",
            AccessModifier::Private => "private",
            AccessModifier::Protected => "protected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(AccessModifier::Public),
            "private" => Some(AccessModifier::Private),
            "protected" => Some(AccessModifier::Protected),
            _ => None,
        }
    }
}

/// A declared symbol extracted from a file
///
/// Pure data structure. Owned by the file it was extracted from.
/// Uniqueness key within a file: (name, line_start).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Symbol {
    /// Declared name, or a configured sentinel for anonymous default exports
    pub name: String,
    pub kind: SymbolKind,
    /// Line where the declaration starts (1-indexed)
    pub line_start: usize,
    /// Line where the declaration ends (1-indexed)
    pub line_end: usize,
    /// Column where the declaration starts (0-indexed, bytes)
    pub column_start: usize,
    /// Column where the declaration ends (0-indexed, bytes)
    pub column_end: usize,
    /// Display signature for function-like symbols and typed properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Cleaned text of the associated block comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    pub is_exported: bool,
    #[serde(default)]
    pub is_default_export: bool,
    /// Only set for function-like symbols
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_async: Option<bool>,
    /// Only set for function-like symbols
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_generator: Option<bool>,
    #[serde(default)]
    pub is_static: bool,
    /// Only set for class members
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_modifier: Option<AccessModifier>,
    /// Signatures of later declarations that collided on (name, line_start)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overloads: Vec<String>,
    /// Names this symbol is also exported under (`export { a as b }`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub export_aliases: Vec<String>,
}

impl Symbol {
    /// Whether `line` falls inside this symbol's line range
    pub fn contains_line(&self, line: usize) -> bool {
        self.line_start <= line && line <= self.line_end
    }

    /// Number of lines spanned (used to pick the innermost enclosing symbol)
    pub fn line_span(&self) -> usize {
        self.line_end.saturating_sub(self.line_start)
    }
}

/// Stable symbol ID (32-char BLAKE3 hash of the uniqueness key)
///
/// Deterministic: re-indexing an unchanged file yields the same IDs.
pub fn symbol_id(file_id: &str, name: &str, line_start: usize) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(file_id.as_bytes());
    hasher.update(&[0]);
    hasher.update(name.as_bytes());
    hasher.update(&[0]);
    hasher.update(line_start.to_string().as_bytes());
    let hex = hasher.finalize().to_hex();
    hex[..32].to_string()
}

/// Text of a node, or an empty string when the span is not valid UTF-8
pub(crate) fn node_text<'a>(node: &tree_sitter::Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// Whether `node` has an unnamed child token with the given text (e.g. "async", "static")
pub(crate) fn has_token(node: &tree_sitter::Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == token);
    found
}
