//! # Card Synthesis
//!
//! Turns a parsed document into the primitive set of one rich-text node.
//!
//! ```text
//! ParsedDocument
//!       ↓
//!   probe image sizes        (concurrent, every probe settles)
//!       ↓
//!   wrap each logical line   (text::layout_runs, line index threaded through)
//!       ↓
//!   plan rows                (text, gap, image, gap, ...)
//!       ↓
//!   row heights + offsets    (rows::measure_rows)
//!       ↓
//!   emit primitives          (background, then per row; images materialized in order)
//! ```
//!
//! Nothing here fails. A probe that fails yields a fallback size. An asset
//! that fails yields a placeholder. A glyph wider than the card sits on a
//! line of its own. Every call returns a structurally valid node.

pub mod rows;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ImageError;
use crate::image_loader::{
    data_url_mime, placeholder_data_url, ImageResolver, ImageSize, LocalImageResolver,
};
use crate::model::{LayoutRow, LayoutRun, ParsedDocument, ParsedImage, ResolvedImage};
use crate::scene::{EmbeddedAsset, NodeConfig, Rect, RenderPrimitive, Shape, Synthesis};
use crate::style::Color;
use crate::text::{layout_runs, LayoutOptions, TextMeasurer};
use rows::{measure_rows, plan_rows, RowMetrics};

/// Height of the spacer rows around images.
pub const GAP_ROW_HEIGHT: f64 = 8.0;
/// Size used when an image cannot be probed and declares no size.
pub const FALLBACK_IMAGE_SIZE: ImageSize = ImageSize {
    width: 200.0,
    height: 150.0,
};
/// Text color for bold runs without an explicit color.
pub const BOLD_FALLBACK_COLOR: Color = Color::rgb(0x1e, 0x1e, 0x1e);
/// Decoration thickness as a fraction of the font size.
const DECORATION_RATIO: f64 = 0.08;
/// Baseline position within the glyph box, as a fraction of the font size.
const ASCENT_RATIO: f64 = 0.8;

/// Cooperative cancellation for asset materialization.
pub trait CancelToken {
    fn is_cancelled(&self) -> bool;
}

/// Token that never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Placement and typography for one rich-text card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardConfig {
    /// Center of the card in scene coordinates.
    pub x: f64,
    pub y: f64,
    /// Outer card width, padding included.
    pub max_width: f64,
    /// Base font size in pixels.
    pub font_size: f64,
    pub font_family: String,
    /// Line height as a multiplier of the base font size.
    pub line_height: f64,
    /// Text color for runs without an explicit color.
    pub color: Color,
    pub background: Color,
    pub border_color: Color,
    pub corner_radius: f64,
    pub padding: f64,
    /// Images are scaled down to fit this height as well as the content width.
    pub max_image_height: f64,
    /// Source markup, persisted in the background primitive.
    pub markup: String,
    /// Reuse an existing node id; a fresh one is generated when `None`.
    pub node_id: Option<String>,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            max_width: 400.0,
            font_size: 16.0,
            font_family: "sans-serif".to_string(),
            line_height: 1.4,
            color: Color::rgb(0x34, 0x3a, 0x40),
            background: Color::WHITE,
            border_color: Color::rgb(0xce, 0xd4, 0xda),
            corner_radius: 8.0,
            padding: 16.0,
            max_image_height: 400.0,
            markup: String::new(),
            node_id: None,
        }
    }
}

impl CardConfig {
    /// Width available to text and images.
    pub fn content_width(&self) -> f64 {
        (self.max_width - 2.0 * self.padding).max(1.0)
    }

    /// Height of one text row.
    pub fn row_height(&self) -> f64 {
        self.font_size * self.line_height
    }

    /// This config with the size and identity fields of a persisted node.
    pub fn with_node(&self, node: &NodeConfig) -> CardConfig {
        CardConfig {
            markup: node.markup.clone(),
            font_size: node.font_size,
            max_width: node.max_width,
            padding: node.padding,
            node_id: Some(node.node_id.clone()),
            ..self.clone()
        }
    }
}

/// External collaborators for one synthesis call.
#[derive(Clone, Copy)]
pub struct Resources<'a> {
    /// `None` selects the heuristic measurer.
    pub measurer: Option<&'a dyn TextMeasurer>,
    pub images: &'a dyn ImageResolver,
    pub cancel: Option<&'a dyn CancelToken>,
}

impl Default for Resources<'static> {
    fn default() -> Self {
        Self {
            measurer: None,
            images: &LocalImageResolver,
            cancel: None,
        }
    }
}

impl<'a> Resources<'a> {
    pub fn with_measurer(mut self, measurer: &'a dyn TextMeasurer) -> Self {
        self.measurer = Some(measurer);
        self
    }

    pub fn with_images(mut self, images: &'a dyn ImageResolver) -> Self {
        self.images = images;
        self
    }

    pub fn with_cancel(mut self, cancel: &'a dyn CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Synthesize the primitive set for one node.
pub fn synthesize(
    document: &ParsedDocument,
    config: &CardConfig,
    resources: &Resources<'_>,
) -> Synthesis {
    let content_width = config.content_width();
    let row_height = config.row_height();

    // 1. Authoritative image sizes.
    let images = resolve_image_sizes(&document.images, resources.images, config);

    // 2. Wrap every logical line, threading the line index through.
    let mut text_items: Vec<LayoutRun> = Vec::new();
    let mut next_line = 0;
    for line in &document.lines {
        let options = LayoutOptions {
            start_line_index: next_line,
            start_offset_x: 0.0,
            max_width: content_width,
            font_size: config.font_size,
            font_family: &config.font_family,
            measurer: resources.measurer,
        };
        let wrapped = layout_runs(line, &options);
        // Lines with nothing visible, such as blank lines, take no row.
        if wrapped.items.is_empty() {
            continue;
        }
        next_line += wrapped.lines_used;
        text_items.extend(wrapped.items);
    }

    // 3-5. Rows, heights, offsets.
    let plan = plan_rows(text_items, next_line, images, row_height, GAP_ROW_HEIGHT);
    let metrics = measure_rows(&plan, row_height);

    let node_id = config
        .node_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut emitter = Emitter::new(Uuid::new_v4().to_string(), node_id.clone());

    // 6. Card, centered on the requested position.
    let card_height = metrics.content_height + 2.0 * config.padding;
    let card = Rect::new(
        config.x - config.max_width / 2.0,
        config.y - card_height / 2.0,
        config.max_width,
        card_height,
    );
    emitter.push(Shape::Background {
        rect: card,
        fill: config.background,
        stroke: config.border_color,
        corner_radius: config.corner_radius,
        node: NodeConfig {
            node_id,
            markup: config.markup.clone(),
            font_size: config.font_size,
            max_width: config.max_width,
            padding: config.padding,
        },
    });

    // 7-8. Row features in row order.
    let origin_x = card.x + config.padding;
    let origin_y = card.y + config.padding;
    let mut assets = BTreeMap::new();
    for row in plan.rows {
        match row {
            LayoutRow::Text(run) => {
                emit_text_run(&mut emitter, &run, &metrics, origin_x, origin_y, config);
            }
            LayoutRow::Image {
                line_index, image, ..
            } => {
                let asset = materialize(&image, resources);
                let rect = Rect::new(
                    origin_x + (content_width - image.width) / 2.0,
                    origin_y + metrics.offset(line_index),
                    image.width,
                    image.height,
                );
                emitter.push(Shape::Image {
                    rect,
                    file_id: asset.file_id.clone(),
                });
                assets.insert(asset.file_id.clone(), asset);
            }
            LayoutRow::Gap { .. } => {}
        }
    }

    Synthesis {
        primitives: emitter.finish(),
        assets,
    }
}

/// Rebuild a node from its persisted configuration.
///
/// `base` supplies placement and the visual defaults that are not persisted.
pub fn resynthesize(node: &NodeConfig, base: &CardConfig, resources: &Resources<'_>) -> Synthesis {
    let config = base.with_node(node);
    let document = crate::markup::parse(&config.markup);
    synthesize(&document, &config, resources)
}

/// Assigns ids and the shared group/node identity as primitives are emitted.
struct Emitter {
    group_id: String,
    node_id: String,
    primitives: Vec<RenderPrimitive>,
}

impl Emitter {
    fn new(group_id: String, node_id: String) -> Self {
        Self {
            group_id,
            node_id,
            primitives: Vec::new(),
        }
    }

    fn push(&mut self, shape: Shape) {
        let id = format!("{}:{}", self.group_id, self.primitives.len());
        self.primitives.push(RenderPrimitive {
            id,
            group_id: self.group_id.clone(),
            node_id: self.node_id.clone(),
            is_deleted: false,
            shape,
        });
    }

    fn finish(self) -> Vec<RenderPrimitive> {
        self.primitives
    }
}

/// Emit highlight, underline, strike and text for one fragment, in that order.
fn emit_text_run(
    emitter: &mut Emitter,
    run: &LayoutRun,
    metrics: &RowMetrics,
    origin_x: f64,
    origin_y: f64,
    config: &CardConfig,
) {
    let row_top = origin_y + metrics.offset(run.line_index);
    let row_h = metrics.height(run.line_index);
    let x = origin_x + run.offset_x;
    let font_size = run.style.font_size.unwrap_or(config.font_size);
    let color = run.style.color.unwrap_or(if run.style.bold {
        BOLD_FALLBACK_COLOR
    } else {
        config.color
    });

    if let Some(fill) = run.style.background_color {
        emitter.push(Shape::TextBg {
            rect: Rect::new(x, row_top, run.width, row_h),
            fill,
        });
    }

    let thickness = (font_size * DECORATION_RATIO).max(1.0);
    if run.style.underline {
        let baseline = row_top + (row_h - font_size) / 2.0 + font_size * ASCENT_RATIO;
        emitter.push(Shape::Underline {
            rect: Rect::new(x, baseline + thickness, run.width, thickness),
            color,
        });
    }
    if run.style.strike {
        emitter.push(Shape::Strike {
            rect: Rect::new(x, row_top + (row_h - thickness) / 2.0, run.width, thickness),
            color,
        });
    }

    emitter.push(Shape::Text {
        rect: Rect::new(x, row_top, run.width, row_h),
        text: run.text.clone(),
        font_size,
        font_family: config.font_family.clone(),
        bold: run.style.bold,
        italic: run.style.italic,
        color,
    });
}

/// Probe every image and settle each one on a display size.
fn resolve_image_sizes(
    images: &[ParsedImage],
    resolver: &dyn ImageResolver,
    config: &CardConfig,
) -> Vec<ResolvedImage> {
    let probes = probe_all(images, resolver);
    images
        .iter()
        .zip(probes)
        .map(|(image, probe)| {
            let natural = match probe {
                Ok(size) if size.width > 0.0 && size.height > 0.0 => size,
                Ok(_) => {
                    log::warn!("image '{}' reported an empty size; using fallback", image.src);
                    declared_or_fallback(image)
                }
                Err(e) => {
                    log::warn!("could not probe image '{}': {}; using fallback", image.src, e);
                    declared_or_fallback(image)
                }
            };
            let fitted = fit_within(natural, config.content_width(), config.max_image_height);
            ResolvedImage {
                src: image.src.clone(),
                width: fitted.width,
                height: fitted.height,
                file_id: None,
            }
        })
        .collect()
}

/// Run every probe to completion before returning.
#[cfg(not(target_arch = "wasm32"))]
fn probe_all(
    images: &[ParsedImage],
    resolver: &dyn ImageResolver,
) -> Vec<Result<ImageSize, ImageError>> {
    if images.len() < 2 {
        return images.iter().map(|img| resolver.probe_size(&img.src)).collect();
    }
    std::thread::scope(|scope| {
        let handles: Vec<_> = images
            .iter()
            .map(|img| scope.spawn(move || resolver.probe_size(&img.src)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(ImageError::Decode("image probe panicked".to_string())))
            })
            .collect()
    })
}

#[cfg(target_arch = "wasm32")]
fn probe_all(
    images: &[ParsedImage],
    resolver: &dyn ImageResolver,
) -> Vec<Result<ImageSize, ImageError>> {
    images.iter().map(|img| resolver.probe_size(&img.src)).collect()
}

fn declared_or_fallback(image: &ParsedImage) -> ImageSize {
    match (image.width, image.height) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => ImageSize::new(w, h),
        _ => FALLBACK_IMAGE_SIZE,
    }
}

/// Scale `size` down to fit the envelope, keeping its aspect ratio.
/// Never scales up. A non-positive limit constrains nothing.
pub fn fit_within(size: ImageSize, max_width: f64, max_height: f64) -> ImageSize {
    if !(size.width > 0.0 && size.height > 0.0) {
        return size;
    }
    let mut scale: f64 = 1.0;
    if max_width > 0.0 {
        scale = scale.min(max_width / size.width);
    }
    if max_height > 0.0 {
        scale = scale.min(max_height / size.height);
    }
    ImageSize::new(size.width * scale, size.height * scale)
}

/// Materialize one image, substituting a placeholder on failure or cancel.
fn materialize(image: &ResolvedImage, resources: &Resources<'_>) -> EmbeddedAsset {
    let cancelled = resources.cancel.is_some_and(|c| c.is_cancelled());
    let result = if cancelled {
        Err(ImageError::Cancelled)
    } else {
        resources.images.materialize(&image.src)
    };

    let data_url = match result {
        Ok(url) => url,
        Err(ImageError::Cancelled) => {
            log::debug!("asset for '{}' skipped: cancelled", image.src);
            placeholder_data_url(ImageSize::new(image.width, image.height))
        }
        Err(e) => {
            log::warn!("could not embed image '{}': {}; using placeholder", image.src, e);
            placeholder_data_url(ImageSize::new(image.width, image.height))
        }
    };

    let now = now_millis();
    EmbeddedAsset {
        file_id: file_id_for(&data_url),
        mime_type: data_url_mime(&data_url)
            .unwrap_or("application/octet-stream")
            .to_string(),
        data_url,
        created: now,
        last_retrieved: now,
    }
}

/// Content-derived file id: identical payloads share one asset.
pub fn file_id_for(data_url: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, data_url.as_bytes())
        .simple()
        .to_string()
}

fn now_millis() -> u64 {
    #[cfg(all(target_arch = "wasm32", feature = "wasm"))]
    {
        js_sys::Date::now() as u64
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
    #[cfg(all(target_arch = "wasm32", not(feature = "wasm")))]
    {
        0
    }
}
