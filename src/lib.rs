//! domsnap
//!
//! Snapshots a style-annotated node tree into a self-contained SVG document
//! and optionally rasterizes it to PNG.
//!
//! # Features
//!
//! - **Font repository**: discovers `@font-face` sources, fetches and decodes
//!   WOFF2/WOFF/TTF/OTF binaries and extracts glyph outlines
//! - **Synthesis**: lowers backgrounds, rounded corners, box shadows, text and
//!   embedded graphics into primitive vector elements in paint order
//! - **Rasterization** (`raster` feature, default): draws the document with
//!   `resvg`
//!
//! # Example
//!
//! ```no_run
//! use domsnap::{FontRepository, SnapshotConfig, StyleNode};
//!
//! # async fn run(tree: StyleNode) -> domsnap::Result<()> {
//! let fonts = FontRepository::default();
//! let config = SnapshotConfig {
//!     text_as_path: true,
//!     ..Default::default()
//! };
//! let doc = domsnap::snapshot(&tree, &[], &fonts, &config).await;
//! println!("{}", doc.to_svg());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

pub mod css;
pub mod document;
pub mod error;
pub mod fonts;
pub mod node;
pub mod raster;
pub mod shadow;
pub mod synth;

pub use document::{StyleBlock, VectorDocument, VectorElement};
pub use error::{Error, Result};
pub use fonts::{FontEntry, FontFaceDecl, FontRepository};
pub use node::{BoundingRect, ComputedStyle, NodeKind, StyleNode, StyleProperty};
#[cfg(feature = "raster")]
pub use raster::ResvgSurface;
pub use raster::{to_raster, DrawingSurface, Raster};
pub use synth::synthesize;

/// Inclusion predicate: a node failing it is skipped along with its subtree.
pub type NodeFilter = Arc<dyn Fn(&StyleNode) -> bool + Send + Sync>;

/// Options for one synthesis call.
///
/// # Examples
///
/// ```
/// let cfg = domsnap::SnapshotConfig::default();
/// assert!(!cfg.text_as_path);
/// assert!(cfg.filter.is_none());
/// ```
#[derive(Clone, Default)]
pub struct SnapshotConfig {
    /// Decides inclusion and traversal of each node; `None` includes all
    pub filter: Option<NodeFilter>,
    /// Draw text as glyph outlines when its font is cached
    pub text_as_path: bool,
    /// Container values copied verbatim into the document's style block
    pub container_style: StyleBlock,
}

impl SnapshotConfig {
    pub fn includes(&self, node: &StyleNode) -> bool {
        self.filter.as_ref().map_or(true, |f| f(node))
    }
}

impl std::fmt::Debug for SnapshotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotConfig")
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .field("text_as_path", &self.text_as_path)
            .field("container_style", &self.container_style)
            .finish()
    }
}

/// Configuration for the HTTP font fetcher
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string to send with font requests
    pub user_agent: String,
    /// Per-request timeout in milliseconds (0 => none)
    pub timeout_ms: u64,
    /// Custom HTTP headers
    pub headers: HashMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("domsnap/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: 30000,
            headers: HashMap::new(),
        }
    }
}

/// Load the given font faces into `fonts`, then synthesize `root`.
///
/// Font failures never fail the snapshot; affected text falls back to
/// system-font text runs.
pub async fn snapshot(
    root: &StyleNode,
    font_faces: &[FontFaceDecl],
    fonts: &FontRepository,
    config: &SnapshotConfig,
) -> VectorDocument {
    fonts.refresh(font_faces).await;
    synthesize(root, fonts, config)
}
