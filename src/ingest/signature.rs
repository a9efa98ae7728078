//! Display signatures built straight from the syntax tree.
//!
//! `name(a, b?, ...rest): Return` for function-like nodes and `name?: Type`
//! for typed properties. Whitespace inside type and pattern text is collapsed
//! so a signature always fits on one line.

use crate::ingest::{has_token, node_text};

/// Signature of a function-like node (declaration, expression, arrow, method).
pub fn function_signature(name: &str, node: &tree_sitter::Node, source: &[u8]) -> String {
    let params = render_parameters(node, source);
    let mut signature = format!("{}({})", name, params.join(", "));
    if let Some(ret) = node.child_by_field_name("return_type") {
        let ret = type_text(&ret, source);
        if !ret.is_empty() {
            signature.push_str(": ");
            signature.push_str(&ret);
        }
    }
    signature
}

/// Signature of a class field with a type annotation, `None` when untyped.
pub fn property_signature(name: &str, node: &tree_sitter::Node, source: &[u8]) -> Option<String> {
    let ty = node.child_by_field_name("type")?;
    let ty = type_text(&ty, source);
    if ty.is_empty() {
        return None;
    }
    let marker = if has_token(node, "?") { "?" } else { "" };
    Some(format!("{}{}: {}", name, marker, ty))
}

fn render_parameters(node: &tree_sitter::Node, source: &[u8]) -> Vec<String> {
    // Arrow functions with a single bare parameter: `x => x`
    if let Some(single) = node.child_by_field_name("parameter") {
        return vec![render_pattern(&single, source)];
    }
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };

    let mut cursor = params.walk();
    let rendered = params
        .named_children(&mut cursor)
        .filter(|p| p.kind() != "comment")
        .map(|p| render_parameter(&p, source))
        .collect();
    rendered
}

fn render_parameter(param: &tree_sitter::Node, source: &[u8]) -> String {
    match param.kind() {
        // TypeScript: `x: T`, `x = 1`, `...xs: T[]`
        "required_parameter" => {
            let pattern = param
                .child_by_field_name("pattern")
                .map(|p| render_pattern(&p, source))
                .unwrap_or_default();
            if param.child_by_field_name("value").is_some() {
                format!("{}?", pattern)
            } else {
                pattern
            }
        }
        // TypeScript: `x?: T`
        "optional_parameter" => {
            let pattern = param
                .child_by_field_name("pattern")
                .map(|p| render_pattern(&p, source))
                .unwrap_or_default();
            format!("{}?", pattern)
        }
        // JavaScript: `x = 1`
        "assignment_pattern" => {
            let left = param
                .child_by_field_name("left")
                .map(|l| render_pattern(&l, source))
                .unwrap_or_default();
            format!("{}?", left)
        }
        _ => render_pattern(param, source),
    }
}

fn render_pattern(pattern: &tree_sitter::Node, source: &[u8]) -> String {
    match pattern.kind() {
        "rest_pattern" => {
            let mut cursor = pattern.walk();
            let inner = pattern
                .named_children(&mut cursor)
                .next()
                .map(|n| render_pattern(&n, source))
                .unwrap_or_default();
            format!("...{}", inner)
        }
        "assignment_pattern" => pattern
            .child_by_field_name("left")
            .map(|l| render_pattern(&l, source))
            .unwrap_or_default(),
        _ => collapse_whitespace(node_text(pattern, source)),
    }
}

/// Text of a type annotation without its leading `:`
fn type_text(node: &tree_sitter::Node, source: &[u8]) -> String {
    let text = node_text(node, source).trim();
    let text = text.strip_prefix(':').unwrap_or(text);
    collapse_whitespace(text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
