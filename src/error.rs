//! Error types for the snapshot pipeline

use thiserror::Error;

/// Result type alias for snapshot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while snapshotting a node tree
///
/// Only [`Error::SurfaceDrawError`] ever escapes a public operation as a hard
/// failure of the capture. The font pipeline variants are produced per font
/// entry and swallowed by [`crate::fonts::FontRepository::refresh`], which
/// leaves the family uncached so synthesis falls back to system-font text.
#[derive(Error, Debug)]
pub enum Error {
    /// The first four bytes of a font binary matched no known signature
    #[error("Unknown font format: {}", hex_prefix(.0))]
    UnknownFontFormat([u8; 4]),

    /// A WOFF or WOFF2 container could not be decompressed
    #[error("Font decompression failed: {0}")]
    DecompressionError(String),

    /// The outline tables could not be parsed
    #[error("Font parsing failed: {0}")]
    FontParseError(String),

    /// Fetching font bytes failed
    #[error("Failed to fetch {url}: {reason}")]
    FetchError { url: String, reason: String },

    /// A style source could not be read (cross-origin sheets)
    #[error("Style rules unreadable: {0}")]
    StyleRuleUnreadable(String),

    /// The drawing surface failed to decode, draw or encode the document
    #[error("Surface draw failed: {0}")]
    SurfaceDrawError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error belongs to the per-font pipeline (fetch, identify,
    /// decompress, parse). These never abort a refresh.
    pub fn is_font_pipeline(&self) -> bool {
        matches!(
            self,
            Error::UnknownFontFormat(_)
                | Error::DecompressionError(_)
                | Error::FontParseError(_)
                | Error::FetchError { .. }
        )
    }
}

fn hex_prefix(bytes: &[u8; 4]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
