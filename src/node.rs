//! The style-annotated node tree handed in by the host.
//!
//! A snapshot is fully materialized: every node owns its children and its
//! resolved style values, so nothing here refers back into a live document.
//! The types deserialize from JSON so a host can capture a tree in one
//! process and synthesize it in another.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Axis-aligned rectangle in the document's pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// This rectangle expressed relative to `origin`'s top-left corner.
    pub fn relative_to(&self, origin: &BoundingRect) -> BoundingRect {
        BoundingRect {
            x: self.x - origin.x,
            y: self.y - origin.y,
            width: self.width,
            height: self.height,
        }
    }

    /// Grow (or shrink, for negative `by`) every edge by `by` pixels.
    pub fn inflate(&self, by: f32) -> BoundingRect {
        BoundingRect {
            x: self.x - by,
            y: self.y - by,
            width: (self.width + 2.0 * by).max(0.0),
            height: (self.height + 2.0 * by).max(0.0),
        }
    }
}

/// Style properties the synthesizer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleProperty {
    Color,
    FontSize,
    FontFamily,
    BackgroundColor,
    BorderRadius,
    BoxShadow,
    Transform,
    TransformOrigin,
    Background,
    AlignItems,
    JustifyContent,
}

impl StyleProperty {
    pub const ALL: [StyleProperty; 11] = [
        StyleProperty::Color,
        StyleProperty::FontSize,
        StyleProperty::FontFamily,
        StyleProperty::BackgroundColor,
        StyleProperty::BorderRadius,
        StyleProperty::BoxShadow,
        StyleProperty::Transform,
        StyleProperty::TransformOrigin,
        StyleProperty::Background,
        StyleProperty::AlignItems,
        StyleProperty::JustifyContent,
    ];

    /// Name as it appears in a computed-style mapping.
    pub fn as_str(self) -> &'static str {
        match self {
            StyleProperty::Color => "color",
            StyleProperty::FontSize => "fontSize",
            StyleProperty::FontFamily => "fontFamily",
            StyleProperty::BackgroundColor => "backgroundColor",
            StyleProperty::BorderRadius => "borderRadius",
            StyleProperty::BoxShadow => "boxShadow",
            StyleProperty::Transform => "transform",
            StyleProperty::TransformOrigin => "transformOrigin",
            StyleProperty::Background => "background",
            StyleProperty::AlignItems => "alignItems",
            StyleProperty::JustifyContent => "justifyContent",
        }
    }

    /// Name as written in a CSS declaration.
    pub fn css_name(self) -> &'static str {
        match self {
            StyleProperty::Color => "color",
            StyleProperty::FontSize => "font-size",
            StyleProperty::FontFamily => "font-family",
            StyleProperty::BackgroundColor => "background-color",
            StyleProperty::BorderRadius => "border-radius",
            StyleProperty::BoxShadow => "box-shadow",
            StyleProperty::Transform => "transform",
            StyleProperty::TransformOrigin => "transform-origin",
            StyleProperty::Background => "background",
            StyleProperty::AlignItems => "align-items",
            StyleProperty::JustifyContent => "justify-content",
        }
    }

    /// Accepts both the camelCase and the hyphenated spelling.
    pub fn from_name(name: &str) -> Option<StyleProperty> {
        StyleProperty::ALL
            .into_iter()
            .find(|p| p.as_str() == name || p.css_name() == name)
    }
}

/// A resolved style value: hosts hand over either strings (`"16px"`) or bare
/// numbers (`16`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StyleValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for StyleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleValue::Number(n) => write!(f, "{}", n),
            StyleValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for StyleValue {
    fn from(s: &str) -> Self {
        StyleValue::Text(s.to_string())
    }
}

impl From<String> for StyleValue {
    fn from(s: String) -> Self {
        StyleValue::Text(s)
    }
}

impl From<f64> for StyleValue {
    fn from(n: f64) -> Self {
        StyleValue::Number(n)
    }
}

/// Computed style of an element, keyed by property name.
///
/// Unknown property names are kept so a snapshot round-trips, but only the
/// names listed in [`StyleProperty`] are ever consulted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComputedStyle {
    properties: HashMap<String, StyleValue>,
}

impl ComputedStyle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter, mostly for hosts and tests assembling trees by hand.
    pub fn with(mut self, property: StyleProperty, value: impl Into<StyleValue>) -> Self {
        self.set(property, value);
        self
    }

    pub fn set(&mut self, property: StyleProperty, value: impl Into<StyleValue>) {
        self.properties
            .insert(property.as_str().to_string(), value.into());
    }

    pub fn get(&self, property: StyleProperty) -> Option<&StyleValue> {
        self.properties
            .get(property.as_str())
            .or_else(|| self.properties.get(property.css_name()))
    }

    /// The value as text; numbers are formatted without a unit.
    pub fn text(&self, property: StyleProperty) -> Option<String> {
        self.get(property).map(|v| v.to_string())
    }

    /// Font size in pixels. Bare numbers are taken as pixels.
    pub fn font_size_px(&self) -> Option<f32> {
        match self.get(StyleProperty::FontSize)? {
            StyleValue::Number(n) => Some(*n as f32),
            StyleValue::Text(s) => crate::css::parse_px(s),
        }
    }
}

/// Closed set of node kinds, decided once when the snapshot is captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeKind {
    /// A styled box. `tag` is the host's tag name (`"DIV"`, `"span"`, ...).
    Element {
        tag: String,
        #[serde(default)]
        classes: Vec<String>,
        #[serde(default, rename = "computedStyle")]
        style: ComputedStyle,
    },
    /// A run of text. Its font and color come from the nearest element
    /// ancestor.
    Text { content: String },
    /// An already-vector sub-graphic (an inline `<svg>`), carried as markup.
    EmbeddedGraphic { markup: String },
}

/// One node of the snapshot tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleNode {
    #[serde(flatten)]
    pub kind: NodeKind,
    pub bounding_rect: BoundingRect,
    #[serde(default)]
    pub children: Vec<StyleNode>,
}

impl StyleNode {
    /// Parse a snapshot tree from JSON. Nesting depth is bounded by memory
    /// rather than by the parser's recursion limit.
    pub fn from_json(json: &str) -> crate::Result<StyleNode> {
        let mut de = serde_json::Deserializer::from_str(json);
        de.disable_recursion_limit();
        let node = StyleNode::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        de.end()?;
        Ok(node)
    }

    pub fn element(tag: impl Into<String>, style: ComputedStyle, bounding_rect: BoundingRect) -> Self {
        Self {
            kind: NodeKind::Element {
                tag: tag.into(),
                classes: Vec::new(),
                style,
            },
            bounding_rect,
            children: Vec::new(),
        }
    }

    pub fn text(content: impl Into<String>, bounding_rect: BoundingRect) -> Self {
        Self {
            kind: NodeKind::Text {
                content: content.into(),
            },
            bounding_rect,
            children: Vec::new(),
        }
    }

    pub fn embedded_graphic(markup: impl Into<String>, bounding_rect: BoundingRect) -> Self {
        Self {
            kind: NodeKind::EmbeddedGraphic {
                markup: markup.into(),
            },
            bounding_rect,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<StyleNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        if let NodeKind::Element { classes, .. } = &mut self.kind {
            classes.push(class.into());
        }
        self
    }

    pub fn style(&self) -> Option<&ComputedStyle> {
        match &self.kind {
            NodeKind::Element { style, .. } => Some(style),
            _ => None,
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        match &self.kind {
            NodeKind::Element { classes, .. } => classes.iter().any(|c| c == class),
            _ => false,
        }
    }

    /// A generic box container, rendered as a rect.
    pub fn is_box_container(&self) -> bool {
        matches!(&self.kind, NodeKind::Element { tag, .. } if tag.eq_ignore_ascii_case("div"))
    }
}
