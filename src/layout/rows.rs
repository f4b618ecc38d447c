//! # Row Composition
//!
//! Merges wrapped text fragments and resolved images into one row stream
//! and resolves the vertical metrics of every row unit.
//!
//! Rows share a single line-index space. A text row is one unit tall. An
//! image spans `ceil(height / line_height)` units. A gap is one unit, raised
//! to its declared height when that is taller. Heights combine with `max`,
//! so no row ever drops below the text row height.

use crate::model::{LayoutRow, LayoutRun, ResolvedImage};

/// Ordered rows plus the number of row units they cover.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowPlan {
    pub rows: Vec<LayoutRow>,
    /// One past the last occupied line index.
    pub row_count: usize,
}

/// Build the row stream.
///
/// `text_rows` counts the row units the text fragments occupy. When images
/// follow text, a gap row separates them. Every image is followed by a gap
/// row.
pub fn plan_rows(
    text_items: Vec<LayoutRun>,
    text_rows: usize,
    images: Vec<ResolvedImage>,
    line_height: f64,
    gap_height: f64,
) -> RowPlan {
    let has_text = !text_items.is_empty();
    let mut rows: Vec<LayoutRow> = text_items.into_iter().map(LayoutRow::Text).collect();
    let mut next = text_rows;

    if !images.is_empty() && has_text {
        rows.push(LayoutRow::Gap {
            line_index: next,
            height: gap_height,
        });
        next += 1;
    }

    for image in images {
        let span = image_span(image.height, line_height);
        rows.push(LayoutRow::Image {
            line_index: next,
            span,
            image,
        });
        next += span;
        rows.push(LayoutRow::Gap {
            line_index: next,
            height: gap_height,
        });
        next += 1;
    }

    RowPlan {
        rows,
        row_count: next,
    }
}

/// Row units an image of `height` needs. Always at least one.
pub fn image_span(height: f64, line_height: f64) -> usize {
    if line_height <= 0.0 || !height.is_finite() {
        return 1;
    }
    ((height / line_height).ceil() as usize).max(1)
}

/// Resolved vertical metrics for a row plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowMetrics {
    /// Height of each row unit.
    pub heights: Vec<f64>,
    /// Top of each row unit relative to the content box.
    pub offsets: Vec<f64>,
    /// Larger of the summed row heights and the lowest image bottom edge.
    pub content_height: f64,
}

impl RowMetrics {
    pub fn height(&self, line_index: usize) -> f64 {
        self.heights.get(line_index).copied().unwrap_or(0.0)
    }

    pub fn offset(&self, line_index: usize) -> f64 {
        self.offsets
            .get(line_index)
            .copied()
            .unwrap_or(self.content_height)
    }
}

/// Compute per-row heights, prefix-sum offsets and total content height.
pub fn measure_rows(plan: &RowPlan, line_height: f64) -> RowMetrics {
    let mut heights = vec![line_height; plan.row_count];

    for row in &plan.rows {
        match row {
            LayoutRow::Text(_) => {}
            LayoutRow::Image {
                line_index,
                span,
                image,
            } => {
                let per_unit = image.height / *span as f64;
                for h in heights.iter_mut().skip(*line_index).take(*span) {
                    *h = h.max(per_unit);
                }
            }
            LayoutRow::Gap { line_index, height } => {
                if let Some(h) = heights.get_mut(*line_index) {
                    *h = h.max(*height);
                }
            }
        }
    }

    let mut offsets = Vec::with_capacity(heights.len());
    let mut y = 0.0;
    for h in &heights {
        offsets.push(y);
        y += h;
    }

    // Guard against an image whose height disagrees with its row-unit span.
    let image_bottom = plan
        .rows
        .iter()
        .filter_map(|row| match row {
            LayoutRow::Image {
                line_index, image, ..
            } => Some(offsets.get(*line_index).copied().unwrap_or(y) + image.height),
            _ => None,
        })
        .fold(0.0_f64, f64::max);

    RowMetrics {
        heights,
        offsets,
        content_height: y.max(image_bottom),
    }
}
