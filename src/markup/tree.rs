//! Lenient markup tree builder.
//!
//! Turns an HTML-ish fragment into a plain node tree (element kind,
//! attributes, children, text). The tokenizer is quick-xml with name
//! checking switched off. Editor output is rarely well-formed XML: void
//! tags go unclosed, attributes go unquoted and end tags get misnested.

use quick_xml::escape::unescape_with;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// A node in the markup tree.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupNode {
    Element(Element),
    Text(String),
}

/// An element with a lowercased tag name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub tag: String,
    /// Attribute names are lowercased; values are entity-decoded.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<MarkupNode>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Elements that never have content and therefore never open a scope.
fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "br" | "img" | "hr" | "wbr" | "input" | "meta" | "link" | "source" | "area" | "col"
    )
}

/// Parse a fragment into its top-level nodes.
///
/// Never fails. A tokenizer error ends the tree where it happened and
/// everything read so far is kept.
pub fn build_tree(markup: &str) -> Vec<MarkupNode> {
    let mut reader = Reader::from_str(markup);
    {
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
    }

    let mut roots: Vec<MarkupNode> = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let element = element_from(&e);
                if is_void(&element.tag) {
                    attach(&mut roots, &mut stack, MarkupNode::Element(element));
                } else {
                    stack.push(element);
                }
            }
            Ok(Event::Empty(e)) => {
                attach(&mut roots, &mut stack, MarkupNode::Element(element_from(&e)));
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                close_element(&mut roots, &mut stack, &tag);
            }
            Ok(Event::Text(e)) => {
                let raw = String::from_utf8_lossy(&e);
                let text = decode_entities(&raw);
                if !text.is_empty() {
                    attach(&mut roots, &mut stack, MarkupNode::Text(text));
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                attach(&mut roots, &mut stack, MarkupNode::Text(text));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                log::debug!(
                    "markup tokenizer stopped at byte {}: {}",
                    reader.buffer_position(),
                    err
                );
                break;
            }
        }
    }

    // Implicitly close anything still open.
    while let Some(element) = stack.pop() {
        attach(&mut roots, &mut stack, MarkupNode::Element(element));
    }
    roots
}

fn attach(roots: &mut Vec<MarkupNode>, stack: &mut [Element], node: MarkupNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

/// Close the nearest open element named `tag`, closing anything nested
/// inside it first. A stray end tag with no open match is dropped.
fn close_element(roots: &mut Vec<MarkupNode>, stack: &mut Vec<Element>, tag: &str) {
    let Some(pos) = stack.iter().rposition(|el| el.tag == tag) else {
        return;
    };
    while stack.len() > pos {
        if let Some(element) = stack.pop() {
            attach(roots, stack, MarkupNode::Element(element));
        }
    }
}

fn element_from(e: &BytesStart<'_>) -> Element {
    let tag = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
    let attrs = e
        .html_attributes()
        .with_checks(false)
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
            let raw = String::from_utf8_lossy(&attr.value);
            (key, decode_entities(&raw))
        })
        .collect();
    Element {
        tag,
        attrs,
        children: Vec::new(),
    }
}

/// Decode character references, falling back to the raw text when a
/// reference is malformed (a bare `&` in user text, say).
fn decode_entities(raw: &str) -> String {
    match unescape_with(raw, resolve_entity) {
        Ok(text) => text.into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn resolve_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "zwsp" => "\u{200b}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "hellip" => "\u{2026}",
        "bull" => "\u{2022}",
        "middot" => "\u{b7}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "deg" => "\u{b0}",
        "times" => "\u{d7}",
        "divide" => "\u{f7}",
        "euro" => "\u{20ac}",
        "pound" => "\u{a3}",
        "yen" => "\u{a5}",
        "cent" => "\u{a2}",
        "sect" => "\u{a7}",
        "para" => "\u{b6}",
        "larr" => "\u{2190}",
        "rarr" => "\u{2192}",
        "uarr" => "\u{2191}",
        "darr" => "\u{2193}",
        _ => return None,
    })
}
