//! # Font Metrics
//!
//! A [`TextMeasurer`] backed by real TrueType/OpenType advance widths.
//!
//! Hosts that render with a known font can register its faces here so that
//! line breaking matches what ends up on the canvas. Families are matched by
//! name, weight and style. A bold or italic request falls back to the
//! regular face of the same family when no dedicated face is registered.
//! Anything unregistered is measured with the heuristic.

use std::collections::HashMap;

use crate::text::{FontSpec, HeuristicMeasurer, TextMeasurer};

/// Width factor applied when bold is requested but only a regular face exists.
const SYNTHETIC_BOLD_FACTOR: f64 = 1.05;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    fn new(family: &str, bold: bool, italic: bool) -> Self {
        Self {
            family: family.to_ascii_lowercase(),
            bold,
            italic,
        }
    }
}

/// Advance widths parsed from a font file with ttf-parser.
#[derive(Debug, Clone)]
pub struct FaceMetrics {
    pub units_per_em: u16,
    pub advance_widths: HashMap<char, u16>,
    pub default_advance: u16,
}

impl FaceMetrics {
    /// Parse metrics from font data. `None` if the data is not a font.
    pub fn from_font_data(data: &[u8]) -> Option<Self> {
        let face = ttf_parser::Face::parse(data, 0).ok()?;
        let units_per_em = face.units_per_em();

        let mut advance_widths = HashMap::new();
        let mut default_advance = 0u16;

        // Basic Multilingual Plane only; astral chars use the default advance.
        for code in 32u32..=0xFFFF {
            if let Some(ch) = char::from_u32(code) {
                if let Some(glyph_id) = face.glyph_index(ch) {
                    let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                    advance_widths.insert(ch, advance);
                    if ch == ' ' {
                        default_advance = advance;
                    }
                }
            }
        }

        if default_advance == 0 {
            default_advance = units_per_em / 2;
        }

        Some(FaceMetrics {
            units_per_em,
            advance_widths,
            default_advance,
        })
    }

    /// Advance width of a character in pixels.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        let w = self
            .advance_widths
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        (w as f64 / self.units_per_em.max(1) as f64) * font_size
    }
}

/// Registry of parsed faces, usable directly as a measurer.
#[derive(Debug, Default)]
pub struct FontMetricsMeasurer {
    faces: HashMap<FontKey, FaceMetrics>,
}

impl FontMetricsMeasurer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a face. Returns `false` if the data could not be parsed.
    pub fn register(&mut self, family: &str, bold: bool, italic: bool, data: &[u8]) -> bool {
        match FaceMetrics::from_font_data(data) {
            Some(metrics) => {
                self.faces
                    .insert(FontKey::new(family, bold, italic), metrics);
                true
            }
            None => {
                log::warn!("could not parse font data for family '{}'", family);
                false
            }
        }
    }

    pub fn has_family(&self, family: &str) -> bool {
        let family = family.to_ascii_lowercase();
        self.faces.keys().any(|k| k.family == family)
    }

    /// Find the closest face and the width factor to apply to it.
    fn resolve(&self, font: &FontSpec) -> Option<(&FaceMetrics, f64)> {
        let exact = FontKey::new(&font.family, font.bold, font.italic);
        if let Some(m) = self.faces.get(&exact) {
            return Some((m, 1.0));
        }
        let upright = FontKey::new(&font.family, font.bold, false);
        if let Some(m) = self.faces.get(&upright) {
            return Some((m, 1.0));
        }
        let regular = FontKey::new(&font.family, false, false);
        let factor = if font.bold { SYNTHETIC_BOLD_FACTOR } else { 1.0 };
        self.faces.get(&regular).map(|m| (m, factor))
    }
}

impl TextMeasurer for FontMetricsMeasurer {
    fn measure(&self, text: &str, font: &FontSpec) -> f64 {
        match self.resolve(font) {
            Some((metrics, factor)) => {
                text.chars()
                    .map(|ch| metrics.char_width(ch, font.size))
                    .sum::<f64>()
                    * factor
            }
            None => HeuristicMeasurer.measure(text, font),
        }
    }
}
