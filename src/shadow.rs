//! Box-shadow lowering.
//!
//! A CSS box shadow becomes a drop-shadow filter plus a silhouette rect that
//! references it. The filter composites the shadow `out` of its own source
//! graphic, so only the part outside the box remains and nothing shows
//! through a semi-transparent fill painted on top.

use crate::css::{parse_color, parse_px, split_top_level, Rgba};
use crate::document::{DropShadowFilter, VectorElement};
use crate::node::BoundingRect;

/// One resolved shadow from a `box-shadow` list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSpec {
    pub offset_x: f32,
    pub offset_y: f32,
    pub blur_radius: f32,
    pub spread: f32,
    pub color: Rgba,
    pub inset: bool,
}

impl ShadowSpec {
    /// Parse one shadow. Lengths and color may come in any order; a missing
    /// color takes `current_color`.
    pub fn parse(value: &str, current_color: Rgba) -> Option<ShadowSpec> {
        let mut lengths = Vec::with_capacity(4);
        let mut color = None;
        let mut inset = false;
        for token in split_top_level(value, ' ') {
            if token.eq_ignore_ascii_case("inset") {
                inset = true;
            } else if let Some(px) = parse_px(token) {
                lengths.push(px);
            } else if color.is_none() {
                color = Some(parse_color(token)?);
            } else {
                return None;
            }
        }
        let (offset_x, offset_y, blur_radius, spread) = match lengths.as_slice() {
            [x, y] => (*x, *y, 0.0, 0.0),
            [x, y, blur] => (*x, *y, *blur, 0.0),
            [x, y, blur, spread] => (*x, *y, *blur, *spread),
            _ => return None,
        };
        if blur_radius < 0.0 {
            return None;
        }
        Some(ShadowSpec {
            offset_x,
            offset_y,
            blur_radius,
            spread,
            color: color.unwrap_or(current_color),
            inset,
        })
    }

    /// Parse a comma-separated `box-shadow` value. `none` yields no shadows;
    /// unparsable entries are dropped.
    pub fn parse_list(value: &str, current_color: Rgba) -> Vec<ShadowSpec> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("none") {
            return Vec::new();
        }
        split_top_level(value, ',')
            .into_iter()
            .filter_map(|s| ShadowSpec::parse(s, current_color))
            .collect()
    }
}

/// Filter definition and silhouette produced for one shadow.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredShadow {
    pub filter: VectorElement,
    pub silhouette: VectorElement,
}

impl LoweredShadow {
    /// Elements in paint order: the filter must be defined before use.
    pub fn into_elements(self) -> [VectorElement; 2] {
        [self.filter, self.silhouette]
    }
}

/// Lower `spec` for a box at `subject` (already relative to the document).
///
/// The silhouette follows the subject's corner radius and is grown by the
/// spread distance. Inset shadows have no outer silhouette and return `None`.
pub fn lower(spec: &ShadowSpec, subject: &BoundingRect, corner_radius: Option<f32>, filter_id: &str) -> Option<LoweredShadow> {
    if spec.inset {
        return None;
    }
    let std_deviation = spec.blur_radius / 2.0;
    let silhouette_rect = subject.inflate(spec.spread);
    // Three standard deviations cover the visible blur.
    let reach = 3.0 * std_deviation + spec.offset_x.abs().max(spec.offset_y.abs());
    let filter = DropShadowFilter {
        id: filter_id.to_string(),
        dx: spec.offset_x,
        dy: spec.offset_y,
        std_deviation,
        flood_color: spec.color.opaque(),
        flood_opacity: spec.color.a,
        region: silhouette_rect.inflate(reach.ceil() + 1.0),
    };
    let silhouette = VectorElement::Rect {
        rect: silhouette_rect,
        fill: spec.color.opaque(),
        corner_radius: corner_radius.map(|r| (r + spec.spread).max(0.0)).filter(|r| *r > 0.0),
        filter: Some(filter_id.to_string()),
    };
    Some(LoweredShadow {
        filter: VectorElement::FilterDef(filter),
        silhouette,
    })
}
