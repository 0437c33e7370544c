//! "Label: value" lookup for fields that have no stable markup hook.

use scraper::{ElementRef, Html, Node};

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_label(text: &str, label: &str) -> bool {
    let text = text.trim();
    let text = text.strip_suffix(':').unwrap_or(text).trim_end();
    !text.is_empty() && text.eq_ignore_ascii_case(label.trim())
}

fn is_non_content(node: &Node) -> bool {
    node.as_element()
        .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript" | "template"))
}

/// Value following the first text node that reads `label` (optionally with a colon).
///
/// A hyperlink right after the label wins, its text or else its `href`
/// with any `mailto:` prefix removed. Otherwise the next non-empty text node.
pub fn find_by_label(document: &Html, label: &str) -> Option<String> {
    let nodes: Vec<_> = document.tree.root().descendants().collect();
    let hidden = |idx: usize| nodes[idx].ancestors().any(|a| is_non_content(a.value()));

    let start = (0..nodes.len()).find(|&idx| match nodes[idx].value() {
        Node::Text(text) => is_label(text, label) && !hidden(idx),
        _ => false,
    })?;

    for idx in start + 1..nodes.len() {
        if hidden(idx) {
            continue;
        }
        let node = nodes[idx];
        match node.value() {
            Node::Element(el) if el.name() == "a" => {
                let Some(anchor) = ElementRef::wrap(node) else {
                    continue;
                };
                let text = collapse_ws(&anchor.text().collect::<String>());
                if !text.is_empty() {
                    return Some(text);
                }
                if let Some(href) = el.attr("href") {
                    let href = href.trim();
                    let href = href.strip_prefix("mailto:").unwrap_or(href);
                    if !href.is_empty() {
                        return Some(href.to_string());
                    }
                }
            }
            Node::Text(text) => {
                let value = collapse_ws(text);
                let bare = value.trim_start_matches(':').trim();
                if bare.is_empty() || is_label(bare, label) {
                    continue;
                }
                return Some(bare.to_string());
            }
            _ => {}
        }
    }
    None
}
