//! # Scene Primitives
//!
//! The output of synthesis: positioned rectangles, text draws and image
//! draws that a host canvas inserts into its own document. Every primitive
//! carries the `group_id` of the synthesis call that produced it and the
//! `node_id` of the rich-text node it belongs to.
//!
//! Primitives are a tagged union keyed by `role`. Consumers match on
//! [`Shape`] instead of probing optional fields.

pub mod query;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RichCardError;
use crate::style::Color;

pub use query::{
    is_background, is_image, is_strike, is_text, is_text_background, is_underline, node_config,
    node_ids, primitives_for_node, replace_node, soft_delete_node,
};

/// The semantic role of a primitive within its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Background,
    Text,
    TextBg,
    Underline,
    Strike,
    Image,
}

/// An axis-aligned rectangle in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Everything needed to rebuild a node from scratch.
///
/// Embedded in the node's background primitive; this is the node's only
/// durable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub node_id: String,
    pub markup: String,
    pub font_size: f64,
    pub max_width: f64,
    pub padding: f64,
}

impl NodeConfig {
    pub fn from_json(json: &str) -> Result<Self, RichCardError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// What a primitive draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "kebab-case")]
pub enum Shape {
    /// The card behind everything else in the node.
    #[serde(rename_all = "camelCase")]
    Background {
        rect: Rect,
        fill: Color,
        stroke: Color,
        corner_radius: f64,
        node: NodeConfig,
    },
    /// Highlight behind a run with an explicit background color.
    #[serde(rename_all = "camelCase")]
    TextBg { rect: Rect, fill: Color },
    #[serde(rename_all = "camelCase")]
    Underline { rect: Rect, color: Color },
    #[serde(rename_all = "camelCase")]
    Strike { rect: Rect, color: Color },
    #[serde(rename_all = "camelCase")]
    Text {
        rect: Rect,
        text: String,
        font_size: f64,
        font_family: String,
        bold: bool,
        italic: bool,
        color: Color,
    },
    #[serde(rename_all = "camelCase")]
    Image { rect: Rect, file_id: String },
}

impl Shape {
    pub fn role(&self) -> Role {
        match self {
            Shape::Background { .. } => Role::Background,
            Shape::TextBg { .. } => Role::TextBg,
            Shape::Underline { .. } => Role::Underline,
            Shape::Strike { .. } => Role::Strike,
            Shape::Text { .. } => Role::Text,
            Shape::Image { .. } => Role::Image,
        }
    }

    pub fn rect(&self) -> &Rect {
        match self {
            Shape::Background { rect, .. }
            | Shape::TextBg { rect, .. }
            | Shape::Underline { rect, .. }
            | Shape::Strike { rect, .. }
            | Shape::Text { rect, .. }
            | Shape::Image { rect, .. } => rect,
        }
    }
}

/// One drawable produced by synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPrimitive {
    /// Unique within the scene: `"{group_id}:{seq}"`.
    pub id: String,
    pub group_id: String,
    pub node_id: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(flatten)]
    pub shape: Shape,
}

impl RenderPrimitive {
    pub fn role(&self) -> Role {
        self.shape.role()
    }
}

/// An image payload referenced by `Shape::Image::file_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedAsset {
    pub file_id: String,
    pub mime_type: String,
    #[serde(rename = "dataURL")]
    pub data_url: String,
    /// Milliseconds since the Unix epoch.
    pub created: u64,
    pub last_retrieved: u64,
}

/// The complete, self-contained output of one synthesis call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Synthesis {
    pub primitives: Vec<RenderPrimitive>,
    /// Keyed by `file_id`.
    pub assets: BTreeMap<String, EmbeddedAsset>,
}

impl Synthesis {
    /// The node id shared by every primitive, if any were produced.
    pub fn node_id(&self) -> Option<&str> {
        self.primitives.first().map(|p| p.node_id.as_str())
    }

    pub fn to_json(&self) -> Result<String, RichCardError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_serializes_with_role_tag() {
        let prim = RenderPrimitive {
            id: "g:1".to_string(),
            group_id: "g".to_string(),
            node_id: "n".to_string(),
            is_deleted: false,
            shape: Shape::TextBg {
                rect: Rect::new(1.0, 2.0, 3.0, 4.0),
                fill: Color::rgb(255, 255, 0),
            },
        };
        let json = serde_json::to_value(&prim).unwrap();
        assert_eq!(json["role"], "text-bg");
        assert_eq!(json["groupId"], "g");
        assert_eq!(json["fill"], "#ffff00");
        assert_eq!(json["rect"]["width"], 3.0);

        let back: RenderPrimitive = serde_json::from_value(json).unwrap();
        assert_eq!(back, prim);
    }

    #[test]
    fn test_node_config_from_json() {
        let cfg = NodeConfig::from_json(
            r#"{"nodeId":"n1","markup":"<b>x</b>","fontSize":16,"maxWidth":300,"padding":12}"#,
        )
        .unwrap();
        assert_eq!(cfg.node_id, "n1");
        assert_eq!(cfg.max_width, 300.0);

        let err = NodeConfig::from_json(r#"{"nodeId":"n1"}"#).unwrap_err();
        assert!(matches!(err, RichCardError::Config { .. }));
    }

    #[test]
    fn test_asset_uses_data_url_key() {
        let asset = EmbeddedAsset {
            file_id: "f".to_string(),
            mime_type: "image/png".to_string(),
            data_url: "data:image/png;base64,AA==".to_string(),
            created: 1,
            last_retrieved: 1,
        };
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["dataURL"], "data:image/png;base64,AA==");
        assert_eq!(json["mimeType"], "image/png");
    }
}
