//! domsnap CLI: synthesize a captured node tree into SVG and PNG.
//!
//! Usage:
//!   domsnap <snapshot.json> [--fonts fonts.json] [--css sheet.css ...]
//!           [--svg out.svg] [--png out.png] [--scale N] [--text-as-path]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use domsnap::css::{font_faces_from_sources, scale_from_transform, StyleSource};
use domsnap::{FontFaceDecl, FontRepository, SnapshotConfig, StyleBlock, StyleNode};
use log::info;

#[derive(Parser)]
#[command(name = "domsnap", about = "Snapshot a styled node tree into a self-contained SVG", version)]
struct Cli {
    /// Captured node tree (JSON)
    snapshot: PathBuf,

    /// Font-face declarations (JSON array of {familyName, sourceUrl})
    #[arg(long)]
    fonts: Option<PathBuf>,

    /// Stylesheets to scan for @font-face rules
    #[arg(long = "css")]
    css: Vec<PathBuf>,

    /// Write the SVG document here (stdout when neither output is given)
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Rasterize to PNG
    #[arg(long)]
    png: Option<PathBuf>,

    /// Scale factor for the PNG; defaults to the root transform's scale
    #[arg(long)]
    scale: Option<f32>,

    /// Draw text with cached glyph outlines
    #[arg(long)]
    text_as_path: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn font_declarations(cli: &Cli) -> Result<Vec<FontFaceDecl>> {
    let mut decls: Vec<FontFaceDecl> = match &cli.fonts {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    let mut sources = Vec::new();
    for path in &cli.css {
        let css = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let base_url = std::fs::canonicalize(path)
            .ok()
            .and_then(|p| url::Url::from_file_path(p).ok())
            .map(|u| u.to_string());
        sources.push(StyleSource::Readable { css, base_url });
    }
    decls.extend(font_faces_from_sources(&sources));
    Ok(decls)
}

fn font_repository() -> Result<FontRepository> {
    #[cfg(feature = "http")]
    {
        Ok(FontRepository::with_http(&domsnap::FetchConfig::default())?)
    }
    #[cfg(not(feature = "http"))]
    {
        Ok(FontRepository::default())
    }
}

#[cfg(feature = "raster")]
fn write_png(doc: &domsnap::VectorDocument, fonts: &FontRepository, scale: f32, path: &Path) -> Result<()> {
    let surface = domsnap::ResvgSurface::new().with_system_fonts().with_fonts(fonts);
    let raster = domsnap::to_raster(doc, scale, &surface)?;
    std::fs::write(path, &raster.png_data).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {}x{} PNG to {}", raster.width, raster.height, path.display());
    Ok(())
}

#[cfg(not(feature = "raster"))]
fn write_png(_doc: &domsnap::VectorDocument, _fonts: &FontRepository, _scale: f32, _path: &Path) -> Result<()> {
    anyhow::bail!("PNG output requires the `raster` feature")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let snapshot = std::fs::read_to_string(&cli.snapshot)
        .with_context(|| format!("Failed to read {}", cli.snapshot.display()))?;
    let root = StyleNode::from_json(&snapshot).with_context(|| format!("Failed to parse {}", cli.snapshot.display()))?;
    let decls = font_declarations(&cli)?;
    let fonts = font_repository()?;

    let container_style = root.style().map(StyleBlock::from_style).unwrap_or_default();
    let scale = cli
        .scale
        .or_else(|| container_style.transform.as_deref().and_then(scale_from_transform))
        .unwrap_or(1.0);
    let config = SnapshotConfig {
        text_as_path: cli.text_as_path,
        container_style,
        ..Default::default()
    };

    let doc = domsnap::snapshot(&root, &decls, &fonts, &config).await;
    info!(
        "Synthesized {} elements with {} cached font(s)",
        doc.elements.len(),
        fonts.len()
    );

    let svg = doc.to_svg();
    match &cli.svg {
        Some(path) => std::fs::write(path, &svg).with_context(|| format!("Failed to write {}", path.display()))?,
        None if cli.png.is_none() => println!("{}", svg),
        None => {}
    }
    if let Some(path) = &cli.png {
        write_png(&doc, &fonts, scale, path)?;
    }
    Ok(())
}
