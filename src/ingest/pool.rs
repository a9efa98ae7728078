//! Thread-local parser pool for reusing tree-sitter Parser instances.
//!
//! Snapshot indexing parses files on rayon worker threads. Each worker keeps
//! one parser per dialect, created lazily on first use, so no parser is shared
//! across threads and no locks are taken.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::ingest::pool::with_parser;
//! use crate::ingest::parser::SourceDialect;
//!
//! let tree = with_parser(SourceDialect::TypeScript, |parser| parser.parse(source, None))?;
//! ```

use crate::ingest::parser::SourceDialect;
use anyhow::Result;
use std::cell::RefCell;

thread_local! {
    static TYPESCRIPT_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
    static TSX_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
    static JAVASCRIPT_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
}

type ParserSlot = std::thread::LocalKey<RefCell<Option<tree_sitter::Parser>>>;

fn slot_for(dialect: SourceDialect) -> &'static ParserSlot {
    match dialect {
        SourceDialect::TypeScript => &TYPESCRIPT_PARSER,
        SourceDialect::Tsx => &TSX_PARSER,
        SourceDialect::JavaScript => &JAVASCRIPT_PARSER,
    }
}

/// Grammar backing each dialect
pub fn language_for(dialect: SourceDialect) -> tree_sitter::Language {
    match dialect {
        SourceDialect::TypeScript => tree_sitter_typescript::language_typescript(),
        SourceDialect::Tsx => tree_sitter_typescript::language_tsx(),
        SourceDialect::JavaScript => tree_sitter_javascript::language(),
    }
}

/// Execute a function with the calling thread's parser for `dialect`.
///
/// # Returns
///
/// The result of the closure, or an error if the grammar could not be loaded.
pub fn with_parser<F, R>(dialect: SourceDialect, f: F) -> Result<R>
where
    F: FnOnce(&mut tree_sitter::Parser) -> R,
{
    slot_for(dialect).with(|parser_cell| {
        let mut parser_ref = parser_cell.borrow_mut();
        if parser_ref.is_none() {
            let mut parser = tree_sitter::Parser::new();
            parser.set_language(&language_for(dialect))?;
            *parser_ref = Some(parser);
        }
        match parser_ref.as_mut() {
            Some(parser) => Ok(f(parser)),
            None => Err(anyhow::anyhow!("{} parser missing after initialization", dialect)),
        }
    })
}
