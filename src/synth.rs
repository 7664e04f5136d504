//! Snapshot-to-vector synthesis.
//!
//! Walks the node tree depth-first with an explicit stack, so nesting depth
//! is bounded by memory rather than by the call stack, and lowers each
//! visible node into vector elements in document order.

use crate::css::{is_invisible_background, parse_border_radius, parse_color, Rgba};
use crate::document::{FontFaceResource, VectorDocument, VectorElement};
use crate::fonts::{FontEntry, FontRepository};
use crate::node::{BoundingRect, ComputedStyle, NodeKind, StyleNode, StyleProperty};
use crate::shadow::{self, ShadowSpec};
use crate::SnapshotConfig;
use base64::Engine as _;
use log::trace;
use std::sync::Arc;

/// Class of the host's off-screen text measurement nodes. Never rendered.
pub const MEASURE_CLASS: &str = "CodeMirror-measure";

const DEFAULT_FONT_SIZE: f32 = 16.0;
const DEFAULT_TEXT_FILL: &str = "rgb(0, 0, 0)";
const ZERO_WIDTH_SPACE: &str = "\u{200B}";
const NO_BREAK_SPACE: char = '\u{00A0}';

/// Synthesize a vector document for `root`.
///
/// Only cached fonts are consulted; call [`FontRepository::refresh`] first
/// (or use [`crate::snapshot`]) to load the document's font faces.
pub fn synthesize(root: &StyleNode, fonts: &FontRepository, config: &SnapshotConfig) -> VectorDocument {
    let mut synth = Synthesizer {
        origin: root.bounding_rect,
        doc: VectorDocument::new(root.bounding_rect.width, root.bounding_rect.height),
        fonts,
        config,
        embedded: Vec::new(),
        filter_count: 0,
    };
    synth.doc.style = config.container_style.clone();

    // Each node travels with the style of its nearest element ancestor.
    let mut stack: Vec<(&StyleNode, Option<&ComputedStyle>)> = Vec::new();
    if config.includes(root) {
        stack.push((root, None));
    }

    while let Some((node, inherited)) = stack.pop() {
        match &node.kind {
            NodeKind::Text { content } => {
                if carries_no_text(content) {
                    continue;
                }
                synth.text(node, content, inherited);
            }
            NodeKind::EmbeddedGraphic { markup } => {
                let at = node.bounding_rect.relative_to(&synth.origin);
                trace!("Passing through embedded graphic at ({}, {})", at.x, at.y);
                synth.doc.push(VectorElement::EmbeddedGraphic {
                    x: at.x,
                    y: at.y,
                    markup: markup.clone(),
                });
            }
            NodeKind::Element { style, .. } => {
                if node.is_box_container() {
                    synth.box_container(node, style);
                }
                // Reverse push so siblings pop in document order.
                for child in node.children.iter().rev() {
                    if child.has_class(MEASURE_CLASS) || !config.includes(child) {
                        continue;
                    }
                    stack.push((child, Some(style)));
                }
            }
        }
    }

    synth.finish()
}

struct Synthesizer<'a> {
    origin: BoundingRect,
    doc: VectorDocument,
    fonts: &'a FontRepository,
    config: &'a SnapshotConfig,
    /// Families to embed, in first-use order.
    embedded: Vec<Arc<FontEntry>>,
    filter_count: usize,
}

impl Synthesizer<'_> {
    fn text(&mut self, node: &StyleNode, content: &str, inherited: Option<&ComputedStyle>) {
        let default_style = ComputedStyle::default();
        let style = inherited.unwrap_or(&default_style);
        let at = node.bounding_rect.relative_to(&self.origin);
        let font_size = style.font_size_px().unwrap_or(DEFAULT_FONT_SIZE);
        let fill = style
            .text(StyleProperty::Color)
            .unwrap_or_else(|| DEFAULT_TEXT_FILL.to_string());
        let family = style.text(StyleProperty::FontFamily).unwrap_or_default();
        let baseline = at.y + font_size;

        match self.fonts.lookup(&family) {
            Some(entry) if self.config.text_as_path => {
                trace!("Drawing {:?} as glyph paths in {}", content, entry.family_key());
                self.doc.push(VectorElement::GlyphPath {
                    commands: entry.glyph_outline(content, at.x, baseline, font_size),
                    fill,
                });
            }
            matched => {
                if let Some(entry) = matched {
                    if !self.embedded.iter().any(|e| Arc::ptr_eq(e, &entry)) {
                        self.embedded.push(entry);
                    }
                }
                self.doc.push(VectorElement::TextRun {
                    x: at.x,
                    y: baseline,
                    text: protect_spaces(content),
                    fill,
                    font_size,
                    font_family: family,
                });
            }
        }
    }

    fn box_container(&mut self, node: &StyleNode, style: &ComputedStyle) {
        let rect = node.bounding_rect.relative_to(&self.origin);
        let corner_radius = style
            .text(StyleProperty::BorderRadius)
            .and_then(|r| parse_border_radius(&r, rect.width));

        let current_color = style
            .text(StyleProperty::Color)
            .and_then(|c| parse_color(&c))
            .unwrap_or(Rgba::BLACK);
        let shadows = style
            .text(StyleProperty::BoxShadow)
            .map(|v| ShadowSpec::parse_list(&v, current_color))
            .unwrap_or_default();
        // The first listed shadow paints on top, so emit the list backwards.
        for spec in shadows.iter().rev().filter(|s| !s.color.is_transparent()) {
            let id = format!("shadow-{}", self.filter_count);
            if let Some(lowered) = shadow::lower(spec, &rect, corner_radius, &id) {
                self.filter_count += 1;
                self.doc.elements.extend(lowered.into_elements());
            }
        }

        let background = style.text(StyleProperty::BackgroundColor);
        if is_invisible_background(background.as_deref()) {
            return;
        }
        let Some(fill) = background.as_deref().and_then(parse_color) else {
            return;
        };
        self.doc.push(VectorElement::Rect {
            rect,
            fill,
            corner_radius,
            filter: None,
        });
    }

    /// Append the deferred font-face resources.
    fn finish(mut self) -> VectorDocument {
        for entry in self.embedded {
            self.doc.push(VectorElement::FontFace(FontFaceResource {
                family_name: entry.family_name().to_string(),
                bytes_base64: base64::engine::general_purpose::STANDARD.encode(entry.raw_bytes()),
                format: entry.format(),
            }));
        }
        self.doc
    }
}

/// Empty, whitespace-only and lone zero-width-space runs draw nothing.
fn carries_no_text(content: &str) -> bool {
    content.trim().is_empty() || content == ZERO_WIDTH_SPACE
}

/// Replace single spaces between two visible characters with no-break
/// spaces so viewers do not collapse them.
fn protect_spaces(content: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let interior = i > 0
                && i + 1 < chars.len()
                && !chars[i - 1].is_whitespace()
                && !chars[i + 1].is_whitespace();
            if c == ' ' && interior {
                NO_BREAK_SPACE
            } else {
                c
            }
        })
        .collect()
}
