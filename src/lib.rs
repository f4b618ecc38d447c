//! # RichCard
//!
//! Rich-text cards for vector canvases.
//!
//! Canvas editors draw rectangles, text and images. They do not draw
//! paragraphs. RichCard takes a small subset of HTML-like markup and turns
//! it into the flat list of positioned primitives a canvas can hold: one
//! card background, then highlights, decoration lines, text fragments and
//! images, all tagged with a shared node id so the host can find, delete
//! and rebuild them as one unit.
//!
//! ## Architecture
//!
//! ```text
//! Markup string
//!       ↓
//!   [markup]   — Lenient tree, style inheritance, logical lines
//!       ↓
//!   [text]     — Per-character greedy wrapping (pluggable measurer)
//!       ↓
//!   [layout]   — Rows, image sizing, vertical metrics, card placement
//!       ↓
//!   [scene]    — Primitives + embedded assets, identity queries
//! ```
//!
//! The background primitive carries the node's [`scene::NodeConfig`], which
//! is all [`layout::resynthesize`] needs to rebuild the node later.

pub mod error;
pub mod font;
pub mod image_loader;
pub mod layout;
pub mod markup;
pub mod model;
pub mod scene;
pub mod style;
pub mod text;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::{ImageError, RichCardError};
pub use layout::{resynthesize, synthesize, CancelToken, CardConfig, NeverCancel, Resources};
pub use markup::parse;
pub use model::ParsedDocument;
pub use scene::{NodeConfig, RenderPrimitive, Synthesis};

/// Parse markup and synthesize a card from it.
///
/// This is the primary entry point. `config.markup` is replaced by
/// `markup` so the node can be rebuilt from its background primitive.
pub fn render(markup: &str, config: &CardConfig, resources: &Resources<'_>) -> Synthesis {
    let document = markup::parse(markup);
    let config = CardConfig {
        markup: markup.to_string(),
        ..config.clone()
    };
    synthesize(&document, &config, resources)
}

/// Rebuild a node from its persisted configuration, given as JSON.
pub fn render_node_json(json: &str, resources: &Resources<'_>) -> Result<Synthesis, RichCardError> {
    let node = NodeConfig::from_json(json)?;
    Ok(resynthesize(&node, &CardConfig::default(), resources))
}
