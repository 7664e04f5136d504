//! OpenType table directory assembly and a small big-endian reader shared by
//! the WOFF decoders.

use crate::{Error, Result};

/// Table tag as four ASCII bytes.
pub type Tag = [u8; 4];

pub(crate) const HEAD: Tag = *b"head";

/// Largest decoded font accepted. Declared lengths past it are rejected
/// before anything is allocated.
pub(crate) const MAX_SFNT_LEN: usize = 256 << 20;

/// Cursor over big-endian font data. Every read failure is reported as a
/// decompression error because the readers only run over container data.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    /// Everything consumed since `start`.
    pub(crate) fn since(&self, start: usize) -> &'a [u8] {
        &self.data[start.min(self.pos)..self.pos]
    }

    pub(crate) fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| truncated(self.pos, n))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<()> {
        self.bytes(n).map(|_| ())
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn i16(&mut self) -> Result<i16> {
        Ok(self.u16()? as i16)
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn tag(&mut self) -> Result<Tag> {
        let b = self.bytes(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }
}

fn truncated(pos: usize, n: usize) -> Error {
    Error::DecompressionError(format!("unexpected end of data reading {} bytes at offset {}", n, pos))
}

/// Checksum of a table as defined by the OpenType table directory: the sum of
/// its big-endian u32 words, zero-padded.
pub fn table_checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// Reassembles a set of tables into a standalone sfnt binary.
#[derive(Debug, Default)]
pub struct SfntBuilder {
    flavor: u32,
    tables: Vec<(Tag, Vec<u8>)>,
}

impl SfntBuilder {
    /// `flavor` is the sfnt version: `0x00010000` for TrueType outlines,
    /// `OTTO` for CFF.
    pub fn new(flavor: u32) -> Self {
        Self { flavor, tables: Vec::new() }
    }

    pub fn add_table(&mut self, tag: Tag, data: Vec<u8>) -> &mut Self {
        self.tables.push((tag, data));
        self
    }

    pub fn has_table(&self, tag: &Tag) -> bool {
        self.tables.iter().any(|(t, _)| t == tag)
    }

    pub fn table(&self, tag: &Tag) -> Option<&[u8]> {
        self.tables.iter().find(|(t, _)| t == tag).map(|(_, d)| d.as_slice())
    }

    /// Emit the binary: tables sorted by tag, 4-byte aligned, checksummed,
    /// with `head.checkSumAdjustment` fixed up.
    pub fn build(mut self) -> Vec<u8> {
        self.tables.sort_by(|a, b| a.0.cmp(&b.0));
        let num_tables = self.tables.len() as u16;
        let entry_selector = if num_tables == 0 { 0 } else { 15 - num_tables.leading_zeros() as u16 };
        let search_range = (1u16 << entry_selector).wrapping_mul(16);
        let range_shift = num_tables.wrapping_mul(16).wrapping_sub(search_range);

        let header_len = 12 + 16 * self.tables.len();
        let body_len: usize = self.tables.iter().map(|(_, d)| pad4(d.len())).sum();
        let mut out = Vec::with_capacity(header_len + body_len);
        out.extend_from_slice(&self.flavor.to_be_bytes());
        out.extend_from_slice(&num_tables.to_be_bytes());
        out.extend_from_slice(&search_range.to_be_bytes());
        out.extend_from_slice(&entry_selector.to_be_bytes());
        out.extend_from_slice(&range_shift.to_be_bytes());

        let mut offset = header_len;
        let mut head_offset = None;
        for (tag, data) in &mut self.tables {
            if *tag == HEAD && data.len() >= 12 {
                data[8..12].copy_from_slice(&[0; 4]);
                head_offset = Some(offset);
            }
            out.extend_from_slice(tag);
            out.extend_from_slice(&table_checksum(data).to_be_bytes());
            out.extend_from_slice(&(offset as u32).to_be_bytes());
            out.extend_from_slice(&(data.len() as u32).to_be_bytes());
            offset += pad4(data.len());
        }
        for (_, data) in &self.tables {
            out.extend_from_slice(data);
            out.resize(pad4(out.len()), 0);
        }

        if let Some(head) = head_offset {
            let adjustment = 0xB1B0_AFBAu32.wrapping_sub(table_checksum(&out));
            out[head + 8..head + 12].copy_from_slice(&adjustment.to_be_bytes());
        }
        out
    }
}

pub(crate) fn pad4(n: usize) -> usize {
    (n + 3) & !3
}
