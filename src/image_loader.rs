//! # Image Loading
//!
//! Resolves image sources for the compositor. Two operations matter: a size
//! probe, used before layout, and materialization into an embeddable data
//! URL, used when the image primitive is emitted.
//!
//! Supported `src` formats:
//! - `data:image/...;base64,...`, a data URI
//! - a file path (absolute or `./`/`../` relative), read from disk
//! - raw base64-encoded image data
//!
//! Remote URLs are not fetched here. Hosts that need them implement
//! [`ImageResolver`] on top of their own fetcher.

use std::io::Cursor;

use base64::Engine;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ImageError;

/// Pixel size of an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSize {
    pub width: f64,
    pub height: f64,
}

impl ImageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// External image I/O used by the synthesizer.
///
/// Both operations may fail. The synthesizer substitutes fallbacks and
/// never lets an error escape. Implementations must be `Sync` because
/// probes run concurrently.
pub trait ImageResolver: Sync {
    /// Natural size of the image at `src`.
    fn probe_size(&self, src: &str) -> Result<ImageSize, ImageError>;

    /// The image at `src` as a base64 data URL.
    fn materialize(&self, src: &str) -> Result<String, ImageError>;
}

/// Resolver for data URIs, local files and raw base64.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalImageResolver;

impl ImageResolver for LocalImageResolver {
    fn probe_size(&self, src: &str) -> Result<ImageSize, ImageError> {
        let bytes = read_source_bytes(src)?;
        probe_bytes(&bytes)
    }

    fn materialize(&self, src: &str) -> Result<String, ImageError> {
        let bytes = read_source_bytes(src)?;
        let mime = sniff_mime(&bytes).ok_or(ImageError::UnsupportedFormat)?;
        Ok(to_data_url(mime, &bytes))
    }
}

/// Resolve the source string to raw image bytes.
pub fn read_source_bytes(src: &str) -> Result<Vec<u8>, ImageError> {
    let src = src.trim();

    // Data URI: data:image/png;base64,iVBOR...
    if src.starts_with("data:") {
        let (header, payload) = src
            .split_once(',')
            .ok_or_else(|| ImageError::InvalidDataUri("missing comma".to_string()))?;
        if !header.ends_with(";base64") {
            return Err(ImageError::InvalidDataUri(
                "only base64 payloads are supported".to_string(),
            ));
        }
        return base64_decode(payload);
    }

    if src.starts_with("http://") || src.starts_with("https://") || src.starts_with("//") {
        return Err(ImageError::UnsupportedSource(src.to_string()));
    }

    // Only match explicit path prefixes to avoid treating base64 strings
    // (which contain '/') as file paths.
    if src.starts_with('/') || src.starts_with("./") || src.starts_with("../") {
        #[cfg(not(target_arch = "wasm32"))]
        {
            return std::fs::read(src).map_err(|source| ImageError::Io {
                path: src.to_string(),
                source,
            });
        }
        #[cfg(target_arch = "wasm32")]
        {
            return Err(ImageError::UnsupportedSource(src.to_string()));
        }
    }

    base64_decode(src)
}

fn base64_decode(input: &str) -> Result<Vec<u8>, ImageError> {
    Ok(base64::engine::general_purpose::STANDARD.decode(input.trim())?)
}

/// Detect the MIME type from magic bytes.
pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8]) {
        Some("image/jpeg")
    } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some("image/png")
    } else if data.starts_with(b"GIF8") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if looks_like_svg(data) {
        Some("image/svg+xml")
    } else {
        None
    }
}

fn looks_like_svg(data: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&data[..data.len().min(512)]);
    let head = head.trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

/// Read the natural size of raster or SVG image bytes.
pub fn probe_bytes(data: &[u8]) -> Result<ImageSize, ImageError> {
    if data.len() < 4 {
        return Err(ImageError::Decode("image data too short".to_string()));
    }
    match sniff_mime(data) {
        Some("image/svg+xml") => svg_size(data),
        Some(_) => {
            let reader = image::io::Reader::new(Cursor::new(data))
                .with_guessed_format()
                .map_err(|e| ImageError::Decode(e.to_string()))?;
            let (w, h) = reader
                .into_dimensions()
                .map_err(|e| ImageError::Decode(e.to_string()))?;
            Ok(ImageSize::new(w as f64, h as f64))
        }
        None => Err(ImageError::UnsupportedFormat),
    }
}

/// Size of an SVG document from its root `width`/`height`, else its viewBox.
fn svg_size(data: &[u8]) -> Result<ImageSize, ImageError> {
    let text = String::from_utf8_lossy(data);
    let mut reader = Reader::from_str(&text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"svg" => {
                let mut width = None;
                let mut height = None;
                let mut view_box = None;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.as_ref() {
                        b"width" => width = parse_svg_length(&value),
                        b"height" => height = parse_svg_length(&value),
                        b"viewBox" => view_box = parse_view_box(&value),
                        _ => {}
                    }
                }
                return match (width, height, view_box) {
                    (Some(w), Some(h), _) => Ok(ImageSize::new(w, h)),
                    (_, _, Some((w, h))) => Ok(ImageSize::new(w, h)),
                    _ => Err(ImageError::Decode("svg has no intrinsic size".to_string())),
                };
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ImageError::Decode(e.to_string())),
            _ => {}
        }
    }
    Err(ImageError::Decode("no <svg> root element".to_string()))
}

fn parse_svg_length(value: &str) -> Option<f64> {
    let v = value.trim();
    let v = v.strip_suffix("px").unwrap_or(v);
    v.parse::<f64>().ok().filter(|n| *n > 0.0)
}

fn parse_view_box(value: &str) -> Option<(f64, f64)> {
    let parts: Vec<f64> = value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .filter_map(|p| p.parse::<f64>().ok())
        .collect();
    match parts.as_slice() {
        [_, _, w, h] if *w > 0.0 && *h > 0.0 => Some((*w, *h)),
        _ => None,
    }
}

/// Encode bytes as a `data:` URL.
pub fn to_data_url(mime: &str, data: &[u8]) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(data);
    format!("data:{};base64,{}", mime, b64)
}

/// The MIME type declared in a data URL header, if any.
pub fn data_url_mime(data_url: &str) -> Option<&str> {
    let rest = data_url.strip_prefix("data:")?;
    let end = rest.find([';', ','])?;
    let mime = &rest[..end];
    (!mime.is_empty()).then_some(mime)
}

/// A neutral grey SVG box standing in for an image that failed to load.
pub fn placeholder_data_url(size: ImageSize) -> String {
    let svg = format!(
        concat!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"##,
            r##"<rect width="{w}" height="{h}" fill="#e9ecef" stroke="#adb5bd" stroke-width="2"/>"##,
            r##"<path d="M0 0L{w} {h}M{w} 0L0 {h}" stroke="#adb5bd" stroke-width="1"/>"##,
            "</svg>"
        ),
        w = size.width.round(),
        h = size.height.round()
    );
    to_data_url("image/svg+xml", svg.as_bytes())
}
