//! WOFF 1.0 decoding.
//!
//! A WOFF file is an sfnt whose tables were individually zlib-compressed. A
//! table is stored raw when compression would not have made it smaller.

use super::sfnt::{Reader, SfntBuilder, MAX_SFNT_LEN};
use crate::{Error, Result};
use flate2::read::ZlibDecoder;
use std::io::Read;

const WOFF_SIGNATURE: u32 = 0x774F_4646;
const HEADER_LEN: usize = 44;
const DIRECTORY_ENTRY_LEN: usize = 20;

/// Decode a WOFF 1.0 binary into a plain sfnt.
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut r = Reader::new(data);
    if r.u32()? != WOFF_SIGNATURE {
        return Err(Error::DecompressionError("missing wOFF signature".into()));
    }
    let flavor = r.u32()?;
    let length = r.u32()? as usize;
    let num_tables = r.u16()? as usize;
    r.skip(2)?; // reserved
    if length != data.len() {
        return Err(Error::DecompressionError(format!(
            "header length {} does not match file size {}",
            length,
            data.len()
        )));
    }
    if num_tables == 0 {
        return Err(Error::DecompressionError("no tables".into()));
    }

    let mut dir = Reader::at(data, HEADER_LEN);
    let mut builder = SfntBuilder::new(flavor);
    let mut decoded_len = 0usize;
    for _ in 0..num_tables {
        let tag = dir.tag()?;
        let offset = dir.u32()? as usize;
        let comp_length = dir.u32()? as usize;
        let orig_length = dir.u32()? as usize;
        dir.skip(4)?; // origChecksum, recomputed by the builder
        decoded_len = decoded_len
            .checked_add(orig_length)
            .filter(|len| *len <= MAX_SFNT_LEN)
            .ok_or_else(|| Error::DecompressionError("declared table lengths exceed the decoded size limit".into()))?;

        let stored = Reader::at(data, offset).bytes(comp_length)?;
        let table = if comp_length < orig_length {
            inflate(stored, orig_length).map_err(|e| {
                Error::DecompressionError(format!("table {}: {}", String::from_utf8_lossy(&tag), e))
            })?
        } else if comp_length == orig_length {
            stored.to_vec()
        } else {
            return Err(Error::DecompressionError(format!(
                "table {} is larger compressed ({}) than original ({})",
                String::from_utf8_lossy(&tag),
                comp_length,
                orig_length
            )));
        };
        builder.add_table(tag, table);
    }
    debug_assert_eq!(dir.position(), HEADER_LEN + num_tables * DIRECTORY_ENTRY_LEN);
    Ok(builder.build())
}

fn inflate(stored: &[u8], orig_length: usize) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(stored)
        .take(orig_length as u64 + 1)
        .read_to_end(&mut out)?;
    if out.len() != orig_length {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("inflated to {} bytes, expected {}", out.len(), orig_length),
        ));
    }
    Ok(out)
}

/// Wrap an sfnt's tables into a WOFF container. Only used to build fixtures.
#[cfg(test)]
pub(crate) fn encode(sfnt: &[u8]) -> Vec<u8> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut r = Reader::new(sfnt);
    let flavor = r.u32().unwrap();
    let num_tables = r.u16().unwrap() as usize;
    r.skip(6).unwrap();
    let mut tables = Vec::new();
    for _ in 0..num_tables {
        let tag = r.tag().unwrap();
        let checksum = r.u32().unwrap();
        let offset = r.u32().unwrap() as usize;
        let len = r.u32().unwrap() as usize;
        tables.push((tag, checksum, sfnt[offset..offset + len].to_vec()));
    }

    let mut body = Vec::new();
    let mut directory = Vec::new();
    let mut offset = HEADER_LEN + num_tables * DIRECTORY_ENTRY_LEN;
    for (tag, checksum, data) in &tables {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::best());
        enc.write_all(data).unwrap();
        let compressed = enc.finish().unwrap();
        let stored = if compressed.len() < data.len() { compressed } else { data.clone() };
        directory.extend_from_slice(tag);
        directory.extend_from_slice(&(offset as u32).to_be_bytes());
        directory.extend_from_slice(&(stored.len() as u32).to_be_bytes());
        directory.extend_from_slice(&(data.len() as u32).to_be_bytes());
        directory.extend_from_slice(&checksum.to_be_bytes());
        let padded = super::sfnt::pad4(stored.len());
        body.extend_from_slice(&stored);
        body.resize(body.len() + padded - stored.len(), 0);
        offset += padded;
    }

    let total = HEADER_LEN + directory.len() + body.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&WOFF_SIGNATURE.to_be_bytes());
    out.extend_from_slice(&flavor.to_be_bytes());
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(&(num_tables as u16).to_be_bytes());
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(&(sfnt.len() as u32).to_be_bytes());
    out.extend_from_slice(&[0, 1, 0, 0]); // version 1.0
    out.extend_from_slice(&[0; 20]); // no metadata or private block
    out.extend_from_slice(&directory);
    out.extend_from_slice(&body);
    out
}
