//! Structured error types for richcard.
//!
//! The core pipeline (parse, layout, synthesize) never fails. Errors only
//! surface at the edges: decoding a persisted node configuration, reading
//! files in the CLI, and the image resolvers, whose failures the
//! synthesizer turns into fallbacks.

use thiserror::Error;

/// The error type returned by the fallible public API.
#[derive(Debug, Error)]
pub enum RichCardError {
    /// A node configuration or card config failed to parse as JSON.
    #[error("failed to parse node config: {source}{}", format_hint(.hint))]
    Config {
        #[source]
        source: serde_json::Error,
        hint: String,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_hint(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl From<serde_json::Error> for RichCardError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the node config schema. Check field names and types.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        RichCardError::Config { source: e, hint }
    }
}

/// Why an image probe or materialization failed.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to read image file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported image format")]
    UnsupportedFormat,
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("image source not resolvable here: '{0}'")]
    UnsupportedSource(String),
    #[error("image resolution cancelled")]
    Cancelled,
}
