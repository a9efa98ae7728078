//! Heuristic association of block comments with declarations.
//!
//! Walks backward over the comment siblings directly preceding a declaration.
//! Only block comments whose last line is within the configured distance of
//! the declaration's first line are candidates. A doc-style comment (`/** */`)
//! wins over a plain block comment; otherwise the nearest candidate wins.

use crate::ingest::node_text;

/// Find and clean the documentation comment for `anchor`.
///
/// `anchor` is the outermost node of the declaration (the `export` statement
/// when the declaration is exported), since comments sit before that.
pub fn find_documentation(
    anchor: &tree_sitter::Node,
    source: &[u8],
    max_distance: usize,
) -> Option<String> {
    let decl_line = anchor.start_position().row;
    let mut nearest_plain: Option<tree_sitter::Node> = None;

    let mut current = anchor.prev_sibling();
    while let Some(node) = current {
        // Member separators in class and interface bodies
        if !node.is_named() && matches!(node.kind(), ";" | ",") {
            current = node.prev_sibling();
            continue;
        }
        if node.kind() != "comment" {
            break;
        }
        let distance = decl_line.saturating_sub(node.end_position().row);
        if distance > max_distance {
            break;
        }

        let text = node_text(&node, source);
        if is_doc_comment(text) {
            return Some(clean_block_comment(text));
        }
        if text.starts_with("/*") && nearest_plain.is_none() {
            nearest_plain = Some(node);
        }
        current = node.prev_sibling();
    }

    nearest_plain.map(|node| clean_block_comment(node_text(&node, source)))
}

fn is_doc_comment(text: &str) -> bool {
    // "/**/" is an empty plain comment, not a doc comment
    text.starts_with("/**") && text != "/**/"
}

/// Strip comment delimiters and leading `*` gutters; trim blank edge lines.
pub fn clean_block_comment(text: &str) -> String {
    let body = text
        .strip_prefix("/**")
        .or_else(|| text.strip_prefix("/*"))
        .unwrap_or(text);
    let body = body.strip_suffix("*/").unwrap_or(body);

    let lines: Vec<&str> = body
        .lines()
        .map(|line| {
            let trimmed = line.trim();
            let without_gutter = trimmed.strip_prefix('*').unwrap_or(trimmed);
            without_gutter.strip_prefix(' ').unwrap_or(without_gutter).trim_end()
        })
        .collect();

    let start = lines.iter().position(|l| !l.is_empty()).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !l.is_empty()).map(|i| i + 1).unwrap_or(start);
    lines[start..end].join("\n")
}
