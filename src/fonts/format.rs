//! Font binary identification by magic number.

use crate::{Error, Result};

/// Container formats recognised by their first four bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFormat {
    Woff2,
    Woff,
    Ttf,
    Otf,
}

impl FontFormat {
    /// Keyword for a CSS `format()` hint.
    pub fn css_format(self) -> &'static str {
        match self {
            FontFormat::Woff2 => "woff2",
            FontFormat::Woff => "woff",
            FontFormat::Ttf => "truetype",
            FontFormat::Otf => "opentype",
        }
    }

    /// MIME type used when re-embedding the raw bytes as a data URI.
    pub fn mime_type(self) -> &'static str {
        match self {
            FontFormat::Woff2 => "font/woff2",
            FontFormat::Woff => "font/woff",
            FontFormat::Ttf => "font/ttf",
            FontFormat::Otf => "font/otf",
        }
    }
}

/// Identify a font binary from its first four bytes.
///
/// Inputs shorter than four bytes are zero-padded before matching, so they
/// always fail with [`Error::UnknownFontFormat`].
pub fn detect_format(bytes: &[u8]) -> Result<FontFormat> {
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    if n < 4 {
        return Err(Error::UnknownFontFormat(magic));
    }
    match &magic {
        b"wOF2" => Ok(FontFormat::Woff2),
        b"wOFF" => Ok(FontFormat::Woff),
        [0x00, 0x01, 0x00, 0x00] => Ok(FontFormat::Ttf),
        b"OTTO" => Ok(FontFormat::Otf),
        _ => Err(Error::UnknownFontFormat(magic)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_table() {
        assert_eq!(detect_format(&[0x77, 0x4f, 0x46, 0x32, 0xff]).unwrap(), FontFormat::Woff2);
        assert_eq!(detect_format(&[0x77, 0x4f, 0x46, 0x46]).unwrap(), FontFormat::Woff);
        assert_eq!(detect_format(&[0x00, 0x01, 0x00, 0x00]).unwrap(), FontFormat::Ttf);
        assert_eq!(detect_format(&[0x4f, 0x54, 0x54, 0x4f]).unwrap(), FontFormat::Otf);
    }

    #[test]
    fn other_prefixes_are_rejected() {
        for prefix in [[0u8; 4], *b"true", *b"ttcf", [0x00, 0x01, 0x00, 0x01], *b"wOF3"] {
            match detect_format(&prefix) {
                Err(Error::UnknownFontFormat(m)) => assert_eq!(m, prefix),
                other => panic!("expected UnknownFontFormat for {:?}, got {:?}", prefix, other),
            }
        }
        assert!(matches!(detect_format(b"wO"), Err(Error::UnknownFontFormat(_))));
    }
}
