//! The synthesized vector document and its SVG serialization.
//!
//! Elements paint in emission order, so a shadow silhouette pushed before a
//! fill rect ends up underneath it.

use crate::css::{fmt_num, Rgba};
use crate::fonts::{to_path_data, FontFormat, PathCommand};
use crate::node::{BoundingRect, ComputedStyle, StyleProperty};
use std::fmt::Write as _;

/// Drop-shadow filter parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DropShadowFilter {
    pub id: String,
    pub dx: f32,
    pub dy: f32,
    pub std_deviation: f32,
    /// Opaque flood color; the alpha lives in `flood_opacity`.
    pub flood_color: Rgba,
    pub flood_opacity: f32,
    /// Filter region in user space, large enough for offset and blur.
    pub region: BoundingRect,
}

/// An `@font-face` entry embedding a font's raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct FontFaceResource {
    pub family_name: String,
    pub bytes_base64: String,
    pub format: FontFormat,
}

/// Primitive vector elements, in paint order.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorElement {
    Rect {
        rect: BoundingRect,
        fill: Rgba,
        corner_radius: Option<f32>,
        filter: Option<String>,
    },
    TextRun {
        x: f32,
        y: f32,
        text: String,
        /// Resolved CSS color, passed through as written.
        fill: String,
        font_size: f32,
        /// The raw family list; the viewer resolves it.
        font_family: String,
    },
    GlyphPath {
        commands: Vec<PathCommand>,
        fill: String,
    },
    FilterDef(DropShadowFilter),
    EmbeddedGraphic {
        x: f32,
        y: f32,
        markup: String,
    },
    FontFace(FontFaceResource),
}

/// Container-level values copied verbatim into the document's style block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleBlock {
    pub transform: Option<String>,
    pub transform_origin: Option<String>,
    pub background: Option<String>,
    pub align_items: Option<String>,
    pub justify_content: Option<String>,
}

impl StyleBlock {
    /// Container values taken from an element's computed style.
    pub fn from_style(style: &ComputedStyle) -> Self {
        Self {
            transform: style.text(StyleProperty::Transform),
            transform_origin: style.text(StyleProperty::TransformOrigin),
            background: style.text(StyleProperty::Background),
            align_items: style.text(StyleProperty::AlignItems),
            justify_content: style.text(StyleProperty::JustifyContent),
        }
    }

    fn declarations(&self) -> Vec<(&'static str, &str)> {
        [
            ("transform", &self.transform),
            ("transform-origin", &self.transform_origin),
            ("background", &self.background),
            ("align-items", &self.align_items),
            ("justify-content", &self.justify_content),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorDocument {
    pub width: f32,
    pub height: f32,
    pub style: StyleBlock,
    pub elements: Vec<VectorElement>,
}

impl VectorDocument {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn push(&mut self, element: VectorElement) {
        self.elements.push(element);
    }

    pub fn font_faces(&self) -> impl Iterator<Item = &FontFaceResource> {
        self.elements.iter().filter_map(|e| match e {
            VectorElement::FontFace(face) => Some(face),
            _ => None,
        })
    }

    /// Serialize as a standalone SVG document.
    ///
    /// Filter definitions stay at their position in the sequence, each in its
    /// own `<defs>`. Font faces are gathered into one trailing `<style>`.
    pub fn to_svg(&self) -> String {
        let mut out = String::new();
        let (w, h) = (fmt_num(self.width), fmt_num(self.height));
        let _ = write!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
        );

        out.push_str("<style>");
        let declarations = self.style.declarations();
        if !declarations.is_empty() {
            out.push_str(":root{");
            for (name, value) in declarations {
                let _ = write!(out, "{}:{};", name, escape_text(value));
            }
            out.push('}');
        }
        out.push_str("</style>");

        let mut faces = Vec::new();
        for element in &self.elements {
            match element {
                VectorElement::FontFace(face) => faces.push(face),
                other => write_element(&mut out, other),
            }
        }
        if !faces.is_empty() {
            out.push_str("<defs><style>");
            for face in faces {
                let _ = write!(
                    out,
                    r#"@font-face{{font-family:"{}";src:url(data:{};base64,{}) format("{}");}}"#,
                    escape_text(&face.family_name.replace('"', "")),
                    face.format.mime_type(),
                    face.bytes_base64,
                    face.format.css_format()
                );
            }
            out.push_str("</style></defs>");
        }

        out.push_str("</svg>");
        out
    }

    /// The SVG as a `data:image/svg+xml` URI.
    pub fn to_data_uri(&self) -> String {
        format!("data:image/svg+xml,{}", urlencoding::encode(&self.to_svg()))
    }
}

fn write_element(out: &mut String, element: &VectorElement) {
    let _ = match element {
        VectorElement::Rect { rect, fill, corner_radius, filter } => {
            let _ = write!(
                out,
                r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}""#,
                fmt_num(rect.x),
                fmt_num(rect.y),
                fmt_num(rect.width),
                fmt_num(rect.height),
                fill
            );
            if let Some(r) = corner_radius {
                let _ = write!(out, r#" rx="{0}" ry="{0}""#, fmt_num(*r));
            }
            if let Some(id) = filter {
                let _ = write!(out, r#" filter="url(#{})""#, escape_attr(id));
            }
            write!(out, "/>")
        }
        VectorElement::TextRun { x, y, text, fill, font_size, font_family } => write!(
            out,
            r#"<text x="{}" y="{}" fill="{}" font-size="{}" font-family="{}" xml:space="preserve">{}</text>"#,
            fmt_num(*x),
            fmt_num(*y),
            escape_attr(fill),
            fmt_num(*font_size),
            escape_attr(font_family),
            escape_text(text)
        ),
        VectorElement::GlyphPath { commands, fill } => write!(
            out,
            r#"<path d="{}" fill="{}"/>"#,
            to_path_data(commands),
            escape_attr(fill)
        ),
        VectorElement::FilterDef(f) => write!(
            out,
            concat!(
                r#"<defs><filter id="{}" filterUnits="userSpaceOnUse" x="{}" y="{}" width="{}" height="{}">"#,
                r#"<feDropShadow dx="{}" dy="{}" stdDeviation="{}" flood-color="{}" flood-opacity="{}" result="shadow"/>"#,
                r#"<feComposite in="shadow" in2="SourceGraphic" operator="out"/>"#,
                "</filter></defs>"
            ),
            escape_attr(&f.id),
            fmt_num(f.region.x),
            fmt_num(f.region.y),
            fmt_num(f.region.width),
            fmt_num(f.region.height),
            fmt_num(f.dx),
            fmt_num(f.dy),
            fmt_num(f.std_deviation),
            f.flood_color.rgb_string(),
            fmt_num(f.flood_opacity)
        ),
        VectorElement::EmbeddedGraphic { x, y, markup } => write!(
            out,
            r#"<g transform="translate({} {})">{}</g>"#,
            fmt_num(*x),
            fmt_num(*y),
            markup
        ),
        VectorElement::FontFace(_) => Ok(()),
    };
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
