//! # Document Model
//!
//! The intermediate representations that flow between the pipeline stages:
//! the parser's styled runs and logical lines, the line layout engine's
//! positioned fragments, and the compositor's rows.
//!
//! A `ParsedDocument` is immutable once produced. Every later stage derives
//! new values from it rather than editing it in place.

use crate::style::RunStyle;
use serde::{Deserialize, Serialize};

/// A maximal span of text sharing one resolved style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyledRun {
    pub text: String,
    #[serde(flatten)]
    pub style: RunStyle,
}

impl StyledRun {
    pub fn new(text: impl Into<String>, style: RunStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    /// An unstyled run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, RunStyle::default())
    }

    /// The zero-width marker the parser uses for line boundaries.
    pub fn line_break() -> Self {
        Self::plain("\n")
    }

    pub fn is_line_break(&self) -> bool {
        self.text == "\n"
    }
}

/// One line of the source document, before wrapping.
///
/// An empty line holds a single run with empty text.
pub type LogicalLine = Vec<StyledRun>;

/// An image reference found in the markup.
///
/// `width`/`height` are the declared size, a hint only. The probe step in
/// the compositor resolves the size that is actually drawn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedImage {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// Output of the markup normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDocument {
    /// All run text, newline-collapsed and trimmed. Always derived from `lines`.
    pub plain_text: String,
    pub lines: Vec<LogicalLine>,
    pub images: Vec<ParsedImage>,
}

impl ParsedDocument {
    /// Build a document from lines and images, deriving `plain_text`.
    pub fn from_lines(lines: Vec<LogicalLine>, images: Vec<ParsedImage>) -> Self {
        let plain_text = derive_plain_text(&lines);
        Self {
            plain_text,
            lines,
            images,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.images.is_empty()
    }
}

/// Join run text with newlines between lines, collapse newline runs to one,
/// and trim the result.
pub fn derive_plain_text(lines: &[LogicalLine]) -> String {
    let mut joined = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            joined.push('\n');
        }
        for run in line {
            joined.push_str(&run.text);
        }
    }

    let mut collapsed = String::with_capacity(joined.len());
    let mut prev_newline = false;
    for ch in joined.chars() {
        if ch == '\n' {
            if prev_newline {
                continue;
            }
            prev_newline = true;
        } else {
            prev_newline = false;
        }
        collapsed.push(ch);
    }
    collapsed.trim().to_string()
}

/// A width-constrained fragment of a styled run, placed on an output line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRun {
    pub text: String,
    #[serde(flatten)]
    pub style: RunStyle,
    /// Zero-based output line (row) index.
    pub line_index: usize,
    /// Horizontal offset from the content box's left edge.
    pub offset_x: f64,
    /// Measured width of `text`.
    pub width: f64,
}

/// An image whose display size and asset identity have been resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedImage {
    pub src: String,
    pub width: f64,
    pub height: f64,
    /// Filled in once the asset is materialized.
    pub file_id: Option<String>,
}

/// One unit of vertical space in the synthesized card.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LayoutRow {
    /// One wrapped text fragment. Several fragments may share a line index.
    Text(LayoutRun),
    /// An image occupying `span` consecutive row units.
    Image {
        line_index: usize,
        span: usize,
        image: ResolvedImage,
    },
    /// Fixed-height spacer between text and images.
    Gap { line_index: usize, height: f64 },
}

impl LayoutRow {
    pub fn line_index(&self) -> usize {
        match self {
            LayoutRow::Text(run) => run.line_index,
            LayoutRow::Image { line_index, .. } | LayoutRow::Gap { line_index, .. } => *line_index,
        }
    }

    /// Number of row units this entry occupies.
    pub fn span(&self) -> usize {
        match self {
            LayoutRow::Image { span, .. } => *span,
            _ => 1,
        }
    }
}
