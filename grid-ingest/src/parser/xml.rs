//! Namespace-agnostic XML helpers
//!
//! Provider documents change namespace URIs between schema revisions, so
//! elements are matched on their local name only.

use roxmltree::{Document, Node};
use rust_decimal::Decimal;
use std::str::FromStr;

use super::{ParseError, ParseResult};

/// Decode a document body as UTF-8, dropping a leading BOM
pub(super) fn text(body: &[u8]) -> ParseResult<&str> {
    let text = std::str::from_utf8(body)
        .map_err(|e| ParseError::MalformedDocument(format!("body is not UTF-8: {}", e)))?;
    Ok(text.trim_start_matches('\u{feff}'))
}

pub(super) fn parse_tree(text: &str) -> ParseResult<Document<'_>> {
    Document::parse(text).map_err(|e| ParseError::MalformedDocument(e.to_string()))
}

pub(super) fn is(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

/// First child element with the given local name
pub(super) fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| is(c, name))
}

pub(super) fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |c| is(c, name))
}

pub(super) fn descendants<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.descendants().filter(move |c| is(c, name))
}

/// Trimmed text of a child element; `None` when missing or blank
pub(super) fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name)
        .and_then(|c| c.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Trimmed text at a child path, e.g. `["timeInterval", "start"]`
pub(super) fn path_text<'a>(node: Node<'a, '_>, path: &[&str]) -> Option<&'a str> {
    let (last, parents) = path.split_last()?;
    let mut current = node;
    for name in parents {
        current = child(current, name)?;
    }
    child_text(current, last)
}

/// Parse a provider number.
///
/// Accepts thousands separators (comma, space, no-break space) and
/// scientific notation.
pub(crate) fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}' | '\u{202f}'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}
