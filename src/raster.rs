//! Rasterizing a synthesized document.

use crate::document::VectorDocument;
use crate::{Error, Result};
use log::debug;

/// A rendered image.
#[derive(Debug, Clone)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub png_data: Vec<u8>,
}

/// Host 2D drawing surface: decodes an SVG document, draws it once onto a
/// `width` x `height` pixel surface under a uniform `scale`, and returns the
/// encoded pixels.
pub trait DrawingSurface {
    fn draw(&self, svg: &str, width: u32, height: u32, scale: f32) -> Result<Vec<u8>>;
}

/// Draw `doc` at `scale` onto `surface`.
///
/// The surface is sized to the document's size times the scale factor.
/// Decode or draw failures come back as [`Error::SurfaceDrawError`] and are
/// not retried.
pub fn to_raster(doc: &VectorDocument, scale: f32, surface: &dyn DrawingSurface) -> Result<Raster> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(Error::ConfigError(format!("scale factor must be positive, got {}", scale)));
    }
    let width = (doc.width * scale).ceil();
    let height = (doc.height * scale).ceil();
    if !(width >= 1.0 && height >= 1.0 && width <= u32::MAX as f32 && height <= u32::MAX as f32) {
        return Err(Error::SurfaceDrawError(format!(
            "cannot allocate a {}x{} surface",
            width, height
        )));
    }
    let (width, height) = (width as u32, height as u32);
    debug!("Rasterizing {}x{} document at scale {}", doc.width, doc.height, scale);
    let png_data = surface.draw(&doc.to_svg(), width, height, scale)?;
    Ok(Raster {
        width,
        height,
        png_data,
    })
}

/// Software surface backed by `resvg` and `tiny-skia`.
#[cfg(feature = "raster")]
#[derive(Debug, Clone, Default)]
pub struct ResvgSurface {
    fontdb: std::sync::Arc<resvg::usvg::fontdb::Database>,
}

#[cfg(feature = "raster")]
impl ResvgSurface {
    /// Surface with an empty font database: text runs draw nothing unless
    /// fonts are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also resolve text against the fonts installed on this machine.
    pub fn with_system_fonts(mut self) -> Self {
        std::sync::Arc::make_mut(&mut self.fontdb).load_system_fonts();
        self
    }

    /// Make every font cached in `fonts` available to text runs.
    pub fn with_fonts(mut self, fonts: &crate::fonts::FontRepository) -> Self {
        let db = std::sync::Arc::make_mut(&mut self.fontdb);
        for entry in fonts.entries() {
            db.load_font_data(entry.sfnt_bytes().to_vec());
        }
        self
    }

    pub fn font_count(&self) -> usize {
        self.fontdb.len()
    }
}

#[cfg(feature = "raster")]
impl DrawingSurface for ResvgSurface {
    fn draw(&self, svg: &str, width: u32, height: u32, scale: f32) -> Result<Vec<u8>> {
        use resvg::{tiny_skia, usvg};

        let options = usvg::Options {
            fontdb: self.fontdb.clone(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(svg, &options)
            .map_err(|e| Error::SurfaceDrawError(format!("Failed to decode document: {}", e)))?;
        let mut pixmap = tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| Error::SurfaceDrawError(format!("cannot allocate a {}x{} pixmap", width, height)))?;
        resvg::render(&tree, tiny_skia::Transform::from_scale(scale, scale), &mut pixmap.as_mut());
        pixmap
            .encode_png()
            .map_err(|e| Error::SurfaceDrawError(format!("Failed to encode PNG: {}", e)))
    }
}
