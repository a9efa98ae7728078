//! Parser adapter over tree-sitter.
//!
//! Turns file content into a [`SyntaxTree`] or a structured [`ParseError`].
//! Never panics and never returns `Err` for malformed input: the caller decides
//! whether to log or report a failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::config::EngineConfig;
use crate::ingest::pool;

/// Grammar variant used to parse a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceDialect {
    /// `.ts`, `.mts`, `.cts`
    TypeScript,
    /// `.tsx`
    Tsx,
    /// `.js`, `.jsx`, `.mjs`, `.cjs`
    JavaScript,
}

impl SourceDialect {
    /// Map a bare extension (no dot) to its dialect
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "ts" | "mts" | "cts" => Some(SourceDialect::TypeScript),
            "tsx" => Some(SourceDialect::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(SourceDialect::JavaScript),
            _ => None,
        }
    }

    pub fn is_typed(&self) -> bool {
        matches!(self, SourceDialect::TypeScript | SourceDialect::Tsx)
    }
}

impl fmt::Display for SourceDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceDialect::TypeScript => "typescript",
            SourceDialect::Tsx => "tsx",
            SourceDialect::JavaScript => "javascript",
        };
        f.write_str(name)
    }
}

/// Best-effort position of a parse failure (line 1-indexed, column 0-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

/// Structured, recoverable parse failure for a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    pub path: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(f, "{}:{}:{}: {}", self.path, loc.line, loc.column, self.message),
            None => write!(f, "{}: {}", self.path, self.message),
        }
    }
}

/// A successfully parsed file: the tree plus the source it was built from
pub struct SyntaxTree {
    path: String,
    dialect: SourceDialect,
    source: String,
    tree: tree_sitter::Tree,
}

impl SyntaxTree {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn dialect(&self) -> SourceDialect {
        self.dialect
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn source_bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    pub fn root(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("path", &self.path)
            .field("dialect", &self.dialect)
            .field("bytes", &self.source.len())
            .finish()
    }
}

/// Result of [`ParserAdapter::parse_file`]
///
/// Unsupported files are a distinct outcome, not a parse error.
#[derive(Debug)]
pub enum ParseOutcome {
    Parsed(SyntaxTree),
    Failed(ParseError),
    Unsupported { path: String },
}

impl ParseOutcome {
    /// Collapse into a Result, treating an unsupported file as `None`
    pub fn into_result(self) -> Option<Result<SyntaxTree, ParseError>> {
        match self {
            ParseOutcome::Parsed(tree) => Some(Ok(tree)),
            ParseOutcome::Failed(err) => Some(Err(err)),
            ParseOutcome::Unsupported { .. } => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed(_))
    }
}

/// Parser front-end bound to an extension allowlist
#[derive(Debug, Clone, Copy)]
pub struct ParserAdapter<'a> {
    config: &'a EngineConfig,
}

impl<'a> ParserAdapter<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Dialect for `path`, or None when its extension is not on the allowlist
    pub fn dialect_for(&self, path: &str) -> Option<SourceDialect> {
        let ext = Path::new(path).extension()?.to_str()?;
        if !self.config.allows_extension(ext) {
            return None;
        }
        SourceDialect::from_extension(ext)
    }

    pub fn is_supported_for_file(&self, path: &str) -> bool {
        self.dialect_for(path).is_some()
    }

    /// Parse `content` as the dialect implied by `path`.
    ///
    /// A tree containing ERROR or MISSING nodes is reported as [`ParseOutcome::Failed`]
    /// with the location of the first such node.
    pub fn parse_file(&self, path: &str, content: &str) -> ParseOutcome {
        let Some(dialect) = self.dialect_for(path) else {
            return ParseOutcome::Unsupported {
                path: path.to_string(),
            };
        };

        let tree = match pool::with_parser(dialect, |parser| parser.parse(content, None)) {
            Ok(Some(tree)) => tree,
            Ok(None) => {
                return ParseOutcome::Failed(ParseError {
                    path: path.to_string(),
                    message: "parser produced no tree".to_string(),
                    location: None,
                })
            }
            Err(e) => {
                return ParseOutcome::Failed(ParseError {
                    path: path.to_string(),
                    message: format!("{} grammar unavailable: {}", dialect, e),
                    location: None,
                })
            }
        };

        let root = tree.root_node();
        if root.has_error() {
            let (message, location) = match first_error_node(root) {
                Some(node) => (
                    describe_error_node(&node, content.as_bytes()),
                    Some(SourceLocation {
                        line: node.start_position().row + 1,
                        column: node.start_position().column,
                    }),
                ),
                None => ("syntax error".to_string(), None),
            };
            return ParseOutcome::Failed(ParseError {
                path: path.to_string(),
                message,
                location,
            });
        }

        ParseOutcome::Parsed(SyntaxTree {
            path: path.to_string(),
            dialect,
            source: content.to_string(),
            tree,
        })
    }
}

/// Parse with the default configuration
pub fn parse_file(path: &str, content: &str) -> ParseOutcome {
    let config = EngineConfig::default();
    ParserAdapter::new(&config).parse_file(path, content)
}

/// Allowlist check with the default configuration
pub fn is_supported_for_file(path: &str) -> bool {
    let config = EngineConfig::default();
    ParserAdapter::new(&config).is_supported_for_file(path)
}

/// First ERROR or MISSING node in document order
fn first_error_node(root: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        // Only descend into subtrees that contain an error
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

fn describe_error_node(node: &tree_sitter::Node, source: &[u8]) -> String {
    if node.is_missing() {
        return format!("missing `{}`", node.kind());
    }
    let text = node.utf8_text(source).unwrap_or("");
    let snippet: String = text.chars().take(40).collect();
    let snippet = snippet.split_whitespace().collect::<Vec<_>>().join(" ");
    if snippet.is_empty() {
        "unexpected end of input".to_string()
    } else {
        format!("unexpected `{}`", snippet)
    }
}
