use wasm_bindgen::prelude::*;

use crate::layout::{CardConfig, Resources};

/// Synthesize a card. `config_json` is a partial [`CardConfig`]; missing
/// fields take their defaults, and an empty string means all defaults.
#[wasm_bindgen]
pub fn synthesize_markup(markup: &str, config_json: &str) -> Result<JsValue, JsValue> {
    let config: CardConfig = if config_json.trim().is_empty() {
        CardConfig::default()
    } else {
        serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&format!("config parse error: {}", e)))?
    };
    let synthesis = crate::render(markup, &config, &Resources::default());
    serde_wasm_bindgen::to_value(&synthesis).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Rebuild a node from the config stored in its background primitive.
#[wasm_bindgen]
pub fn resynthesize_node(node_json: &str) -> Result<JsValue, JsValue> {
    let synthesis = crate::render_node_json(node_json, &Resources::default())
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_wasm_bindgen::to_value(&synthesis).map_err(|e| JsValue::from_str(&e.to_string()))
}
