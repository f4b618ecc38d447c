//! Identity and lookup helpers over a primitive collection.
//!
//! Deletion is soft: primitives are flagged `is_deleted` and stay in the
//! collection, so the host's undo history can bring them back.

use super::{NodeConfig, RenderPrimitive, Role, Shape, Synthesis};

pub fn is_background(p: &RenderPrimitive) -> bool {
    p.role() == Role::Background
}

pub fn is_text(p: &RenderPrimitive) -> bool {
    p.role() == Role::Text
}

pub fn is_text_background(p: &RenderPrimitive) -> bool {
    p.role() == Role::TextBg
}

pub fn is_underline(p: &RenderPrimitive) -> bool {
    p.role() == Role::Underline
}

pub fn is_strike(p: &RenderPrimitive) -> bool {
    p.role() == Role::Strike
}

pub fn is_image(p: &RenderPrimitive) -> bool {
    p.role() == Role::Image
}

/// Live (not deleted) primitives belonging to `node_id`, in paint order.
pub fn primitives_for_node<'a>(
    primitives: &'a [RenderPrimitive],
    node_id: &'a str,
) -> impl Iterator<Item = &'a RenderPrimitive> + 'a {
    primitives
        .iter()
        .filter(move |p| !p.is_deleted && p.node_id == node_id)
}

/// Distinct live node ids in first-seen order.
pub fn node_ids(primitives: &[RenderPrimitive]) -> Vec<&str> {
    let mut ids: Vec<&str> = Vec::new();
    for p in primitives.iter().filter(|p| !p.is_deleted) {
        if !ids.contains(&p.node_id.as_str()) {
            ids.push(&p.node_id);
        }
    }
    ids
}

/// Recover a node's persisted configuration from its live background.
pub fn node_config<'a>(primitives: &'a [RenderPrimitive], node_id: &str) -> Option<&'a NodeConfig> {
    primitives
        .iter()
        .filter(|p| !p.is_deleted && p.node_id == node_id)
        .find_map(|p| match &p.shape {
            Shape::Background { node, .. } => Some(node),
            _ => None,
        })
}

/// Mark every live primitive of `node_id` deleted. Returns how many changed.
pub fn soft_delete_node(primitives: &mut [RenderPrimitive], node_id: &str) -> usize {
    let mut count = 0;
    for p in primitives
        .iter_mut()
        .filter(|p| !p.is_deleted && p.node_id == node_id)
    {
        p.is_deleted = true;
        count += 1;
    }
    count
}

/// Swap a node's primitive set for a freshly synthesized one.
///
/// The old primitives sharing the new set's node id are soft-deleted and
/// the new ones are appended. Returns the number of primitives retired.
pub fn replace_node(primitives: &mut Vec<RenderPrimitive>, synthesis: Synthesis) -> usize {
    let retired = match synthesis.node_id() {
        Some(node_id) => {
            let node_id = node_id.to_string();
            soft_delete_node(primitives, &node_id)
        }
        None => 0,
    };
    primitives.extend(synthesis.primitives);
    retired
}
