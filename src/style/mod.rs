//! # Style System
//!
//! The run-level style model. Markup resolves to a small set of properties
//! per text run: four boolean decorations plus color, background and size.
//!
//! Inheritance follows two rules. Booleans OR-combine down the tree, so a
//! `<u>` inside a `<b>` is both bold and underlined. Scalars take the
//! nearest ancestor's explicit value, so an inner `color` wins over an
//! outer one.

use serde::{Deserialize, Serialize};

/// Resolved style for one text run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStyle {
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strike: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Color>,
    /// Font size in pixels. `None` means the card's base size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl RunStyle {
    /// Merge a node's own style onto the inherited style.
    pub fn inherit(&self, own: &RunStyle) -> RunStyle {
        RunStyle {
            bold: self.bold || own.bold,
            italic: self.italic || own.italic,
            underline: self.underline || own.underline,
            strike: self.strike || own.strike,
            color: own.color.or(self.color),
            background_color: own.background_color.or(self.background_color),
            font_size: own.font_size.or(self.font_size),
        }
    }

    /// Apply a CSS declaration block such as `font-weight: 700; color: red`.
    ///
    /// Unknown properties and unparseable values are ignored.
    pub fn apply_declarations(&mut self, css: &str) {
        for decl in css.split(';') {
            let Some((prop, value)) = decl.split_once(':') else {
                continue;
            };
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim();
            match prop.as_str() {
                "font-weight" => {
                    if is_bold_weight(value) {
                        self.bold = true;
                    }
                }
                "font-style" => {
                    let v = value.to_ascii_lowercase();
                    if v.starts_with("italic") || v.starts_with("oblique") {
                        self.italic = true;
                    }
                }
                "text-decoration" | "text-decoration-line" => {
                    let v = value.to_ascii_lowercase();
                    for keyword in v.split_whitespace() {
                        match keyword {
                            "underline" => self.underline = true,
                            "line-through" => self.strike = true,
                            _ => {}
                        }
                    }
                }
                "color" => {
                    if let Some(c) = Color::parse(value) {
                        self.color = Some(c);
                    }
                }
                "background-color" | "background" => {
                    // `background` shorthand: take the first token that parses as a color.
                    let parsed = Color::parse(value).or_else(|| {
                        value.split_whitespace().find_map(Color::parse)
                    });
                    if let Some(c) = parsed {
                        self.background_color = Some(c);
                    }
                }
                "font-size" => {
                    if let Some(px) = parse_font_size(value) {
                        self.font_size = Some(px);
                    }
                }
                _ => {}
            }
        }
    }

    /// Apply class-like shorthand (`class="bold underline"`).
    pub fn apply_classes(&mut self, classes: &str) {
        for class in classes.split_whitespace() {
            match class.to_ascii_lowercase().as_str() {
                "bold" | "font-bold" | "font-semibold" | "font-extrabold" | "fw-bold" => {
                    self.bold = true
                }
                "italic" | "fst-italic" => self.italic = true,
                "underline" => self.underline = true,
                "line-through" | "strike" | "strikethrough" => self.strike = true,
                _ => {}
            }
        }
    }
}

/// `font-weight` values that count as bold: numeric ≥ 600 or the keywords.
pub fn is_bold_weight(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    match v.as_str() {
        "bold" | "bolder" => true,
        _ => v.parse::<f64>().map(|w| w >= 600.0).unwrap_or(false),
    }
}

/// Parse a CSS font size into pixels. Accepts `px`, `pt` and unitless values.
pub fn parse_font_size(value: &str) -> Option<f64> {
    let v = value.trim().to_ascii_lowercase();
    let px = if let Some(n) = v.strip_suffix("px") {
        n.trim().parse::<f64>().ok()?
    } else if let Some(n) = v.strip_suffix("pt") {
        n.trim().parse::<f64>().ok()? * 4.0 / 3.0
    } else {
        v.parse::<f64>().ok()?
    };
    (px.is_finite() && px > 0.0).then_some(px)
}

/// An RGBA color. Serializes as a CSS string (`#rrggbb` or `rgba(...)`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// 0.0 - 1.0
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 0.0,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parse a CSS color: hex, `rgb()`, `rgba()`, named colors or `transparent`.
    pub fn parse(s: &str) -> Option<Color> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        let lower = s.to_ascii_lowercase();
        if let Some(inner) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
        {
            let inner = inner.strip_suffix(')')?;
            let parts: Vec<&str> = inner
                .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .collect();
            if parts.len() != 3 && parts.len() != 4 {
                return None;
            }
            let channel = |p: &str| -> Option<u8> {
                let v = match p.strip_suffix('%') {
                    Some(pct) => pct.parse::<f64>().ok()? * 2.55,
                    None => p.parse::<f64>().ok()?,
                };
                Some(v.round().clamp(0.0, 255.0) as u8)
            };
            let a = match parts.get(3) {
                Some(p) => match p.strip_suffix('%') {
                    Some(pct) => pct.parse::<f64>().ok()? / 100.0,
                    None => p.parse::<f64>().ok()?,
                },
                None => 1.0,
            };
            return Some(Color {
                r: channel(parts[0])?,
                g: channel(parts[1])?,
                b: channel(parts[2])?,
                a: a.clamp(0.0, 1.0),
            });
        }
        named_color(&lower)
    }

    /// CSS form: `#rrggbb` when opaque, `rgba(r, g, b, a)` otherwise.
    pub fn to_css(&self) -> String {
        if self.a >= 1.0 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl From<Color> for String {
    fn from(c: Color) -> String {
        c.to_css()
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Color::parse(&s).ok_or_else(|| format!("invalid color '{}'", s))
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.is_ascii() {
        return None;
    }
    let byte = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 | 4 => {
            let d: Vec<u8> = hex
                .chars()
                .map(|c| byte(&c.to_string().repeat(2)))
                .collect::<Option<_>>()?;
            let a = d.get(3).map(|v| *v as f64 / 255.0).unwrap_or(1.0);
            Some(Color {
                r: d[0],
                g: d[1],
                b: d[2],
                a,
            })
        }
        6 | 8 => {
            let r = byte(hex.get(0..2)?)?;
            let g = byte(hex.get(2..4)?)?;
            let b = byte(hex.get(4..6)?)?;
            let a = match hex.get(6..8) {
                Some(a) => byte(a)? as f64 / 255.0,
                None => 1.0,
            };
            Some(Color { r, g, b, a })
        }
        _ => None,
    }
}

fn named_color(name: &str) -> Option<Color> {
    let (r, g, b) = match name {
        "transparent" => return Some(Color::TRANSPARENT),
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "lime" => (0, 255, 0),
        "blue" => (0, 0, 255),
        "navy" => (0, 0, 128),
        "yellow" => (255, 255, 0),
        "gray" | "grey" => (128, 128, 128),
        "silver" => (192, 192, 192),
        "orange" => (255, 165, 0),
        "purple" => (128, 0, 128),
        "pink" => (255, 192, 203),
        "brown" => (165, 42, 42),
        "cyan" | "aqua" => (0, 255, 255),
        "magenta" | "fuchsia" => (255, 0, 255),
        "teal" => (0, 128, 128),
        "olive" => (128, 128, 0),
        "maroon" => (128, 0, 0),
        _ => return None,
    };
    Some(Color::rgb(r, g, b))
}
