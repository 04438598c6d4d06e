use anyhow::{Context, Result};
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::fs;
use std::path::Path;

use crate::normalize::{normalize_whitespace, remove_boilerplate};

fn html5_parse(input: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(input)
}

/// Concatenates every text node in document order. Comments, doctypes and
/// processing instructions contribute nothing; script/style text is kept.
fn collect_text(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        NodeData::Comment { .. } | NodeData::Doctype { .. } => {}
        _ => {
            for c in node.children.borrow().iter() {
                collect_text(c, out);
            }
        }
    }
}

pub fn html_to_text(html: &str) -> String {
    let dom = html5_parse(html);
    let mut out = String::with_capacity(html.len());
    collect_text(&dom.document, &mut out);
    out
}

/// Rendered text of an HTML document, cleaned the same way annotation snippets are.
pub fn clean_document_text(html: &str, boilerplate: &[String]) -> String {
    let text = html_to_text(html).replace('\n', "");
    let text = remove_boilerplate(&text, boilerplate);
    normalize_whitespace(&text)
}

pub fn load_document_text(path: &Path, boilerplate: &[String]) -> Result<String> {
    let html = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(clean_document_text(&html, boilerplate))
}
