//! # Markup Normalizer
//!
//! Walks a markup fragment and produces the styled run stream the rest of
//! the pipeline works with.
//!
//! ```text
//! markup ──[tree]──> node tree ──walk──> runs + images
//!                                          │
//!        split embedded newlines ──> coalesce ──> split into logical lines
//! ```
//!
//! Block-level elements and `<br>` become explicit newline marker runs.
//! List items get a `"• "` or `"{n}. "` prefix run. Image elements are
//! collected separately and never become text.

pub mod tree;

use crate::model::{LogicalLine, ParsedDocument, ParsedImage, StyledRun};
use crate::style::{Color, RunStyle};
use tree::{Element, MarkupNode};

/// Parse a markup fragment into logical lines of styled runs.
///
/// Empty input gives an empty document. Malformed markup is parsed as far
/// as possible. There is no error path.
pub fn parse(markup: &str) -> ParsedDocument {
    if markup.trim().is_empty() {
        return ParsedDocument::default();
    }

    let nodes = tree::build_tree(markup);
    let mut walker = Walker::default();
    walker.walk(&nodes, &RunStyle::default(), true);

    let runs = coalesce(split_embedded_newlines(walker.runs));
    ParsedDocument::from_lines(split_lines(runs), walker.images)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ListKind {
    Ordered,
    Unordered,
}

#[derive(Debug)]
struct ListFrame {
    kind: ListKind,
    /// Items seen so far in this list.
    count: usize,
}

#[derive(Debug, Default)]
struct Walker {
    runs: Vec<StyledRun>,
    images: Vec<ParsedImage>,
    lists: Vec<ListFrame>,
    pre_depth: usize,
}

impl Walker {
    /// `in_block` is true when `nodes` are the children of a block element
    /// (or the fragment root), so their outer edges are line boundaries.
    fn walk(&mut self, nodes: &[MarkupNode], inherited: &RunStyle, in_block: bool) {
        for (i, node) in nodes.iter().enumerate() {
            match node {
                MarkupNode::Text(text) => {
                    let after_boundary = match i.checked_sub(1) {
                        Some(prev) => is_boundary(&nodes[prev]),
                        None => in_block,
                    };
                    let before_boundary = nodes.get(i + 1).map_or(in_block, is_boundary);
                    self.push_text(text, inherited, after_boundary, before_boundary);
                }
                MarkupNode::Element(el) => self.visit(el, inherited),
            }
        }
    }

    fn visit(&mut self, el: &Element, inherited: &RunStyle) {
        match el.tag.as_str() {
            "br" => {
                self.runs.push(StyledRun::line_break());
                return;
            }
            "img" => {
                if let Some(image) = image_from(el) {
                    self.images.push(image);
                }
                return;
            }
            "script" | "style" | "head" | "title" | "template" => return,
            _ => {}
        }

        let style = inherited.inherit(&element_style(el));
        let block = is_block(&el.tag);
        if block {
            self.open_block();
        }

        match el.tag.as_str() {
            "ul" | "ol" => {
                let kind = if el.tag == "ol" {
                    ListKind::Ordered
                } else {
                    ListKind::Unordered
                };
                self.lists.push(ListFrame { kind, count: 0 });
                self.walk(&el.children, &style, block);
                self.lists.pop();
            }
            "li" => {
                let prefix = self.next_list_prefix();
                self.runs.push(StyledRun::plain(prefix));
                self.walk(&el.children, &style, block);
            }
            "pre" => {
                self.pre_depth += 1;
                self.walk(&el.children, &style, block);
                self.pre_depth -= 1;
            }
            _ => self.walk(&el.children, &style, block),
        }

        if block {
            self.close_block();
        }
    }

    fn next_list_prefix(&mut self) -> String {
        match self.lists.last_mut() {
            Some(frame) => {
                let ordinal = frame.count;
                frame.count += 1;
                match frame.kind {
                    ListKind::Ordered => format!("{}. ", ordinal + 1),
                    ListKind::Unordered => "• ".to_string(),
                }
            }
            None => "• ".to_string(),
        }
    }

    /// Whitespace touching a line boundary is formatting and is dropped.
    /// Newlines elsewhere are kept and later split into lines.
    fn push_text(
        &mut self,
        text: &str,
        style: &RunStyle,
        after_boundary: bool,
        before_boundary: bool,
    ) {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        let text = if self.pre_depth > 0 {
            normalized
        } else {
            let mut trimmed = normalized.as_str();
            if after_boundary {
                trimmed = trimmed.trim_start_matches(|c: char| c.is_ascii_whitespace());
            }
            if before_boundary {
                trimmed = trimmed.trim_end_matches(|c: char| c.is_ascii_whitespace());
            }
            let collapsed = collapse_whitespace(trimmed);
            if self.at_line_start() {
                collapsed.trim_start_matches(' ').to_string()
            } else {
                collapsed
            }
        };
        if !text.is_empty() {
            self.runs.push(StyledRun::new(text, style.clone()));
        }
    }

    fn at_line_start(&self) -> bool {
        self.runs.last().map_or(true, |r| r.text.ends_with('\n'))
    }

    /// A block starting mid-line begins on a fresh line.
    fn open_block(&mut self) {
        if !self.at_line_start() {
            self.runs.push(StyledRun::line_break());
        }
    }

    /// A block always ends its line, without stacking blank lines.
    fn close_block(&mut self) {
        if !self.at_line_start() {
            self.runs.push(StyledRun::line_break());
        }
    }
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "hr"
            | "li"
            | "ul"
            | "ol"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "blockquote"
            | "pre"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "table"
            | "tr"
    )
}

/// The style an element contributes on its own, before inheritance.
///
/// Tag semantics come first, then presentation attributes, then class
/// shorthand, then the inline `style` attribute. Later sources win for
/// scalar properties.
fn element_style(el: &Element) -> RunStyle {
    let mut style = RunStyle::default();
    match el.tag.as_str() {
        "b" | "strong" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => style.bold = true,
        "i" | "em" | "cite" | "var" | "dfn" => style.italic = true,
        "u" | "ins" => style.underline = true,
        "s" | "strike" | "del" => style.strike = true,
        "mark" => style.background_color = Some(Color::rgb(255, 255, 0)),
        _ => {}
    }

    if let Some(c) = el.attr("color").and_then(Color::parse) {
        style.color = Some(c);
    }
    if let Some(c) = el.attr("bgcolor").and_then(Color::parse) {
        style.background_color = Some(c);
    }
    if let Some(classes) = el.attr("class") {
        style.apply_classes(classes);
    }
    if let Some(css) = el.attr("style") {
        style.apply_declarations(css);
    }
    style
}

/// An `<img>` with a usable `src`; `None` when the source is missing.
fn image_from(el: &Element) -> Option<ParsedImage> {
    let src = el.attr("src").map(str::trim).filter(|s| !s.is_empty())?;
    let css = el.attr("style").unwrap_or("");
    let width = el
        .attr("width")
        .and_then(parse_length)
        .or_else(|| css_length(css, "width"));
    let height = el
        .attr("height")
        .and_then(parse_length)
        .or_else(|| css_length(css, "height"));
    Some(ParsedImage {
        src: src.to_string(),
        width,
        height,
        alt: el.attr("alt").map(str::to_string),
    })
}

fn parse_length(value: &str) -> Option<f64> {
    let v = value.trim();
    let v = v.strip_suffix("px").unwrap_or(v);
    v.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n > 0.0)
}

fn css_length(css: &str, prop: &str) -> Option<f64> {
    css.split(';').find_map(|decl| {
        let (name, value) = decl.split_once(':')?;
        if name.trim().eq_ignore_ascii_case(prop) {
            parse_length(value)
        } else {
            None
        }
    })
}

/// Blocks, `<br>` and `<hr>` end a line on their own.
fn is_boundary(node: &MarkupNode) -> bool {
    match node {
        MarkupNode::Element(el) => el.tag == "br" || is_block(&el.tag),
        MarkupNode::Text(_) => false,
    }
}

/// Collapse runs of spaces and tabs to one space. Newlines survive, and
/// spaces next to a newline are dropped. Non-breaking spaces are kept as is.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\n' => {
                if out.ends_with(' ') {
                    out.pop();
                }
                out.push('\n');
            }
            c if c.is_ascii_whitespace() => {
                if !out.ends_with([' ', '\n']) {
                    out.push(' ');
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// Split runs whose text contains `\n` into text pieces separated by
/// explicit newline markers.
fn split_embedded_newlines(runs: Vec<StyledRun>) -> Vec<StyledRun> {
    let mut out = Vec::with_capacity(runs.len());
    for run in runs {
        if run.is_line_break() || !run.text.contains('\n') {
            out.push(run);
            continue;
        }
        let mut pieces = run.text.split('\n').peekable();
        while let Some(piece) = pieces.next() {
            if !piece.is_empty() {
                out.push(StyledRun::new(piece, run.style.clone()));
            }
            if pieces.peek().is_some() {
                out.push(StyledRun::line_break());
            }
        }
    }
    out
}

/// Merge adjacent runs with identical style. Never merges across a newline.
fn coalesce(runs: Vec<StyledRun>) -> Vec<StyledRun> {
    let mut out: Vec<StyledRun> = Vec::with_capacity(runs.len());
    for run in runs {
        if let Some(prev) = out.last_mut() {
            if !prev.is_line_break() && !run.is_line_break() && prev.style == run.style {
                prev.text.push_str(&run.text);
                continue;
            }
        }
        out.push(run);
    }
    out
}

/// Split the run stream into logical lines on newline markers.
///
/// A newline with nothing before it on the current line yields an explicit
/// empty line, so blank lines survive.
fn split_lines(runs: Vec<StyledRun>) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut current: LogicalLine = Vec::new();
    for run in runs {
        if run.is_line_break() {
            if current.is_empty() {
                lines.push(vec![StyledRun::plain("")]);
            } else {
                lines.push(std::mem::take(&mut current));
            }
        } else {
            current.push(run);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
