//! Glyph outlines as positioned path commands.

use crate::css::fmt_num;
use std::fmt::Write as _;
use ttf_parser::{Face, GlyphId, OutlineBuilder};

/// One path-drawing command in document space (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo { x: f32, y: f32 },
    LineTo { x: f32, y: f32 },
    QuadTo { x1: f32, y1: f32, x: f32, y: f32 },
    CurveTo { x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32 },
    Close,
}

impl PathCommand {
    fn map_points(self, f: impl Fn(f32, f32) -> (f32, f32)) -> PathCommand {
        match self {
            PathCommand::MoveTo { x, y } => {
                let (x, y) = f(x, y);
                PathCommand::MoveTo { x, y }
            }
            PathCommand::LineTo { x, y } => {
                let (x, y) = f(x, y);
                PathCommand::LineTo { x, y }
            }
            PathCommand::QuadTo { x1, y1, x, y } => {
                let (x1, y1) = f(x1, y1);
                let (x, y) = f(x, y);
                PathCommand::QuadTo { x1, y1, x, y }
            }
            PathCommand::CurveTo { x1, y1, x2, y2, x, y } => {
                let (x1, y1) = f(x1, y1);
                let (x2, y2) = f(x2, y2);
                let (x, y) = f(x, y);
                PathCommand::CurveTo { x1, y1, x2, y2, x, y }
            }
            PathCommand::Close => PathCommand::Close,
        }
    }
}

/// Serialize commands as SVG path data (`M10 20L30 20Z`).
pub fn to_path_data(commands: &[PathCommand]) -> String {
    let mut d = String::new();
    for command in commands {
        // Writing to a String cannot fail.
        let _ = match *command {
            PathCommand::MoveTo { x, y } => write!(d, "M{} {}", fmt_num(x), fmt_num(y)),
            PathCommand::LineTo { x, y } => write!(d, "L{} {}", fmt_num(x), fmt_num(y)),
            PathCommand::QuadTo { x1, y1, x, y } => write!(
                d,
                "Q{} {} {} {}",
                fmt_num(x1),
                fmt_num(y1),
                fmt_num(x),
                fmt_num(y)
            ),
            PathCommand::CurveTo { x1, y1, x2, y2, x, y } => write!(
                d,
                "C{} {} {} {} {} {}",
                fmt_num(x1),
                fmt_num(y1),
                fmt_num(x2),
                fmt_num(y2),
                fmt_num(x),
                fmt_num(y)
            ),
            PathCommand::Close => write!(d, "Z"),
        };
    }
    d
}

/// A glyph in font units with the y axis pointing up, as stored in the font.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct GlyphOutline {
    pub(crate) commands: Vec<PathCommand>,
    pub(crate) advance: u16,
}

#[derive(Default)]
struct Collector(Vec<PathCommand>);

impl OutlineBuilder for Collector {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.push(PathCommand::MoveTo { x, y });
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.push(PathCommand::LineTo { x, y });
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.push(PathCommand::QuadTo { x1, y1, x, y });
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.push(PathCommand::CurveTo { x1, y1, x2, y2, x, y });
    }

    fn close(&mut self) {
        self.0.push(PathCommand::Close);
    }
}

/// Read the outline of `ch`. Unmapped characters use glyph 0 (`.notdef`).
pub(crate) fn extract(face: &Face<'_>, ch: char) -> GlyphOutline {
    let glyph = face.glyph_index(ch).unwrap_or(GlyphId(0));
    let mut collector = Collector::default();
    face.outline_glyph(glyph, &mut collector);
    GlyphOutline {
        commands: collector.0,
        advance: face.glyph_hor_advance(glyph).unwrap_or(0),
    }
}

/// Append `glyph` placed with its origin at the pen, scaled from font units
/// to `font_size` pixels. Returns the horizontal advance in pixels.
pub(crate) fn place(
    glyph: &GlyphOutline,
    pen_x: f32,
    pen_y: f32,
    font_size: f32,
    units_per_em: u16,
    out: &mut Vec<PathCommand>,
) -> f32 {
    let upem = f32::from(units_per_em.max(1));
    let to_px = |v: f32| v * font_size / upem;
    out.extend(
        glyph
            .commands
            .iter()
            .map(|c| c.map_points(|x, y| (pen_x + to_px(x), pen_y - to_px(y)))),
    );
    to_px(f32::from(glyph.advance))
}
