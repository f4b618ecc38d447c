//! # Text Layout
//!
//! Character-granular line breaking under a width constraint.
//!
//! Runs are consumed in order. Characters are packed greedily onto the
//! current line and a run is split mid-text as soon as the next character
//! would overflow. There is no word-boundary search: wrapping happens at
//! whatever code point hits the edge.
//!
//! Measurement is injected through [`TextMeasurer`]. Without one, widths
//! fall back to [`HeuristicMeasurer`].

use std::fmt;

use crate::model::{LayoutRun, StyledRun};
use crate::style::RunStyle;

/// Average advance of one character as a fraction of the font size.
pub const HEURISTIC_CHAR_WIDTH: f64 = 0.6;

/// Font parameters handed to the measurer for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub family: String,
    /// Size in pixels.
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
}

impl FontSpec {
    /// The font spec for a run, given the card's base size and family.
    pub fn for_style(style: &RunStyle, base_size: f64, family: &str) -> Self {
        Self {
            family: family.to_string(),
            size: style.font_size.unwrap_or(base_size),
            bold: style.bold,
            italic: style.italic,
        }
    }

    /// CSS `font` shorthand, e.g. `italic bold 16px sans-serif`.
    pub fn css(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FontSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.italic {
            write!(f, "italic ")?;
        }
        if self.bold {
            write!(f, "bold ")?;
        }
        write!(f, "{}px {}", self.size, self.family)
    }
}

/// Text measurement hook.
pub trait TextMeasurer {
    /// Rendered width of `text` in pixels.
    fn measure(&self, text: &str, font: &FontSpec) -> f64;
}

impl<F> TextMeasurer for F
where
    F: Fn(&str, &FontSpec) -> f64,
{
    fn measure(&self, text: &str, font: &FontSpec) -> f64 {
        self(text, font)
    }
}

/// Width estimate used when no real metrics are available:
/// `chars × size × HEURISTIC_CHAR_WIDTH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicMeasurer;

impl TextMeasurer for HeuristicMeasurer {
    fn measure(&self, text: &str, font: &FontSpec) -> f64 {
        text.chars().count() as f64 * font.size * HEURISTIC_CHAR_WIDTH
    }
}

/// Parameters for one [`layout_runs`] call.
#[derive(Clone, Copy)]
pub struct LayoutOptions<'a> {
    /// Line index assigned to the first output line.
    pub start_line_index: usize,
    /// Left edge of every output line.
    pub start_offset_x: f64,
    pub max_width: f64,
    /// Base font size for runs without an explicit size.
    pub font_size: f64,
    pub font_family: &'a str,
    /// `None` selects [`HeuristicMeasurer`].
    pub measurer: Option<&'a dyn TextMeasurer>,
}

impl fmt::Debug for LayoutOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutOptions")
            .field("start_line_index", &self.start_line_index)
            .field("start_offset_x", &self.start_offset_x)
            .field("max_width", &self.max_width)
            .field("font_size", &self.font_size)
            .field("font_family", &self.font_family)
            .field("measurer", &self.measurer.is_some())
            .finish()
    }
}

/// Result of [`layout_runs`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineLayout {
    pub items: Vec<LayoutRun>,
    /// Number of output lines touched, always at least 1.
    pub lines_used: usize,
}

/// Split `runs` into width-constrained fragments.
///
/// Every character is measured on its own in its run's font. When the next
/// character would push past `start_offset_x + max_width`, the pending
/// fragment is flushed and a new line begins with that character. A
/// character wider than the whole line is still placed, alone, so layout
/// always makes progress.
///
/// Fragments are never merged across runs, even same-styled neighbours.
pub fn layout_runs(runs: &[StyledRun], options: &LayoutOptions<'_>) -> LineLayout {
    let measurer: &dyn TextMeasurer = options.measurer.unwrap_or(&HeuristicMeasurer);
    let base_x = options.start_offset_x;
    let limit = base_x + options.max_width;

    let mut items = Vec::new();
    let mut line_index = options.start_line_index;
    let mut offset_x = base_x;

    for run in runs {
        let font = FontSpec::for_style(&run.style, options.font_size, options.font_family);
        let mut pending = String::new();
        let mut pending_width = 0.0;

        for ch in run.text.chars() {
            let mut buf = [0u8; 4];
            let char_width = measurer.measure(ch.encode_utf8(&mut buf), &font).max(0.0);

            let line_has_content = !pending.is_empty() || offset_x > base_x;
            if line_has_content && offset_x + pending_width + char_width > limit {
                if !pending.is_empty() {
                    items.push(fragment(run, &pending, line_index, offset_x, pending_width));
                }
                line_index += 1;
                offset_x = base_x;
                pending.clear();
                pending_width = 0.0;
            }

            pending.push(ch);
            pending_width += char_width;
        }

        if !pending.is_empty() {
            items.push(fragment(run, &pending, line_index, offset_x, pending_width));
            offset_x += pending_width;
        }
    }

    LineLayout {
        items,
        lines_used: line_index - options.start_line_index + 1,
    }
}

fn fragment(
    run: &StyledRun,
    text: &str,
    line_index: usize,
    offset_x: f64,
    width: f64,
) -> LayoutRun {
    LayoutRun {
        text: text.to_string(),
        style: run.style.clone(),
        line_index,
        offset_x,
        width,
    }
}
