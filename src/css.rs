//! Helpers for resolved CSS values.
//!
//! Computed style hands us already-resolved strings (`"rgba(0, 0, 0, 0.5)"`,
//! `"12px"`), so nothing here cascades or inherits; it only reads values.

use crate::fonts::FontFaceDecl;
use crate::{Error, Result};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// An 8-bit RGB color with a fractional alpha channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0.0);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 1.0);

    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    /// The same color at full opacity.
    pub fn opaque(&self) -> Rgba {
        Rgba::new(self.r, self.g, self.b, 1.0)
    }

    /// `rgb(r,g,b)` without the alpha channel, as used for flood colors.
    pub fn rgb_string(&self) -> String {
        format!("rgb({},{},{})", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a >= 1.0 {
            write!(f, "rgb({},{},{})", self.r, self.g, self.b)
        } else {
            write!(f, "rgba({},{},{},{})", self.r, self.g, self.b, fmt_num(self.a))
        }
    }
}

/// Parse any CSS color syntax (`transparent`, named, hex, `rgb()`, `rgba()`,
/// `hsl()`, ...).
pub fn parse_color(input: &str) -> Option<Rgba> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let c = trimmed.parse::<csscolorparser::Color>().ok()?;
    let [r, g, b, _] = c.to_rgba8();
    Some(Rgba::new(r, g, b, (c.a as f32).clamp(0.0, 1.0)))
}

/// Whether a resolved background is invisible: missing, `none`,
/// `transparent`, or any color whose alpha resolves to 0.
pub fn is_invisible_background(value: Option<&str>) -> bool {
    let Some(value) = value.map(str::trim) else {
        return true;
    };
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return true;
    }
    match parse_color(value) {
        Some(c) => c.is_transparent(),
        None => false,
    }
}

/// Parse a pixel length (`"12px"`, `"12"`, `"-3.5px"`).
pub fn parse_px(input: &str) -> Option<f32> {
    let s = input.trim();
    let number = s.strip_suffix("px").unwrap_or(s).trim();
    number.parse::<f32>().ok().filter(|v| v.is_finite())
}

/// Resolve a `border-radius` value to a single corner radius in pixels.
///
/// Only the first (top-left) radius is honoured; percentages resolve against
/// the box width. `none` and zero radii resolve to `None`.
pub fn parse_border_radius(input: &str, box_width: f32) -> Option<f32> {
    let first = input.split(['/', ' ']).find(|t| !t.is_empty())?;
    if first.eq_ignore_ascii_case("none") {
        return None;
    }
    let radius = match first.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f32>().ok()? / 100.0 * box_width,
        None => parse_px(first)?,
    };
    (radius > 0.0).then_some(radius)
}

/// Extract the uniform factor from a `scale(...)` transform, if any.
pub fn scale_from_transform(transform: &str) -> Option<f32> {
    static SCALE: OnceLock<Regex> = OnceLock::new();
    let re = SCALE.get_or_init(|| Regex::new(r"scale\(\s*([^),\s]+)").expect("scale regex"));
    let caps = re.captures(transform)?;
    caps[1]
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Split on `sep` wherever it is not nested inside parentheses. A space
/// separator matches any whitespace.
pub(crate) fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in input.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if depth == 0 && (c == sep || (sep == ' ' && c.is_whitespace())) => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Format a float without trailing zeros, rounded to 3 decimals.
pub(crate) fn fmt_num(v: f32) -> String {
    let rounded = (v * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        return "0".to_string();
    }
    let s = format!("{:.3}", rounded);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// A stylesheet as offered by the host's style-source collaborator.
#[derive(Debug, Clone)]
pub enum StyleSource {
    /// Sheet text, plus the URL relative font sources resolve against.
    Readable { css: String, base_url: Option<String> },
    /// A sheet whose rules the host could not read (cross-origin).
    Unreadable { href: String },
}

/// Collect `@font-face` declarations from every readable source, in order.
///
/// Unreadable sources are routine and are dropped without logging.
pub fn font_faces_from_sources(sources: &[StyleSource]) -> Vec<FontFaceDecl> {
    sources
        .iter()
        .filter_map(|source| read_font_faces(source).ok())
        .flatten()
        .collect()
}

fn read_font_faces(source: &StyleSource) -> Result<Vec<FontFaceDecl>> {
    match source {
        StyleSource::Readable { css, base_url } => Ok(font_faces_from_css(css, base_url.as_deref())),
        StyleSource::Unreadable { href } => Err(Error::StyleRuleUnreadable(href.clone())),
    }
}

/// Scan stylesheet text for `@font-face` rules whose `src` has a `url(...)`.
/// The first url of each rule wins.
pub fn font_faces_from_css(css: &str, base_url: Option<&str>) -> Vec<FontFaceDecl> {
    static FONT_FACE: OnceLock<Regex> = OnceLock::new();
    static URL: OnceLock<Regex> = OnceLock::new();
    let face_re = FONT_FACE
        .get_or_init(|| Regex::new(r"(?is)@font-face\s*\{([^}]*)\}").expect("font-face regex"));
    let url_re =
        URL.get_or_init(|| Regex::new(r#"url\(\s*['"]?([^'")]+?)['"]?\s*\)"#).expect("url regex"));

    let mut decls = Vec::new();
    for block in face_re.captures_iter(css) {
        let body = &block[1];
        let mut family = None;
        let mut src = None;
        for declaration in split_top_level(body, ';') {
            let Some((name, value)) = declaration.split_once(':') else {
                continue;
            };
            match name.trim().to_ascii_lowercase().as_str() {
                "font-family" => family = Some(value.trim().to_string()),
                // `data:` urls contain ':' so take everything after the first one
                "src" => src = Some(value.trim().to_string()),
                _ => {}
            }
        }
        let (Some(family), Some(src)) = (family, src) else {
            continue;
        };
        let Some(url) = url_re.captures(&src).map(|c| c[1].to_string()) else {
            continue;
        };
        decls.push(FontFaceDecl {
            family_name: family,
            source_url: resolve_url(&url, base_url),
        });
    }
    decls
}

fn resolve_url(href: &str, base_url: Option<&str>) -> String {
    if href.starts_with("data:") {
        return href.to_string();
    }
    match base_url.and_then(|b| url::Url::parse(b).ok()) {
        Some(base) => base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
        None => href.to_string(),
    }
}
