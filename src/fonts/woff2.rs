//! WOFF2 decoding.
//!
//! All tables share one brotli stream. `glyf`/`loca` are usually stored in
//! the transformed form (separate streams for contour counts, point counts,
//! flags, coordinates, composites, bounding boxes and instructions) and
//! `hmtx` may omit side bearings that equal the glyph's `xMin`; both are
//! rebuilt here before the sfnt is reassembled.

use super::sfnt::{Reader, SfntBuilder, Tag, MAX_SFNT_LEN};
use crate::{Error, Result};
use std::io::Read;

const WOFF2_SIGNATURE: u32 = 0x774F_4632;
const TTC_FLAVOR: u32 = 0x7474_6366;
const HEADER_LEN: usize = 48;

const GLYF: Tag = *b"glyf";
const LOCA: Tag = *b"loca";
const HMTX: Tag = *b"hmtx";
const HHEA: Tag = *b"hhea";
const MAXP: Tag = *b"maxp";

const KNOWN_TAGS: [&[u8; 4]; 63] = [
    b"cmap", b"head", b"hhea", b"hmtx", b"maxp", b"name", b"OS/2", b"post", b"cvt ", b"fpgm",
    b"glyf", b"loca", b"prep", b"CFF ", b"VORG", b"EBDT", b"EBLC", b"gasp", b"hdmx", b"kern",
    b"LTSH", b"PCLT", b"VDMX", b"vhea", b"vmtx", b"BASE", b"GDEF", b"GPOS", b"GSUB", b"EBSC",
    b"JSTF", b"MATH", b"CBDT", b"CBLC", b"COLR", b"CPAL", b"SVG ", b"sbix", b"acnt", b"avar",
    b"bdat", b"bloc", b"bsln", b"cvar", b"fdsc", b"feat", b"fmtx", b"fvar", b"gvar", b"hsty",
    b"just", b"lcar", b"mort", b"morx", b"opbd", b"prop", b"trak", b"Zapf", b"Silf", b"Glat",
    b"Gloc", b"Feat", b"Sill",
];

// Simple glyph flags
const ON_CURVE_POINT: u8 = 0x01;
const X_SHORT_VECTOR: u8 = 0x02;
const Y_SHORT_VECTOR: u8 = 0x04;
const X_IS_SAME_OR_POSITIVE: u8 = 0x10;
const Y_IS_SAME_OR_POSITIVE: u8 = 0x20;
const OVERLAP_SIMPLE: u8 = 0x40;

// Composite glyph flags
const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;

#[derive(Debug)]
struct TableEntry {
    tag: Tag,
    orig_length: usize,
    transformed: bool,
    stored_length: usize,
}

fn corrupt(msg: impl Into<String>) -> Error {
    Error::DecompressionError(msg.into())
}

/// Decode a WOFF2 binary into a plain sfnt.
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut r = Reader::new(data);
    if r.u32()? != WOFF2_SIGNATURE {
        return Err(corrupt("missing wOF2 signature"));
    }
    let flavor = r.u32()?;
    let length = r.u32()? as usize;
    let num_tables = r.u16()? as usize;
    r.skip(2)?; // reserved
    let _total_sfnt_size = r.u32()?;
    let total_compressed_size = r.u32()? as usize;
    r.skip(HEADER_LEN - r.position())?; // versions, metadata and private block

    if length != data.len() {
        return Err(corrupt(format!(
            "header length {} does not match file size {}",
            length,
            data.len()
        )));
    }
    if flavor == TTC_FLAVOR {
        return Err(corrupt("font collections are not supported"));
    }
    if num_tables == 0 {
        return Err(corrupt("no tables"));
    }

    let entries = (0..num_tables)
        .map(|_| read_table_entry(&mut r))
        .collect::<Result<Vec<_>>>()?;
    check_glyf_loca_pairing(&entries)?;

    let expected = entries
        .iter()
        .try_fold(0usize, |total, e| total.checked_add(e.stored_length))
        .filter(|total| *total <= MAX_SFNT_LEN)
        .ok_or_else(|| corrupt("declared table lengths exceed the decoded size limit"))?;
    let compressed = r.bytes(total_compressed_size)?;
    let stream = decompress(compressed, expected)?;

    let mut stored = Vec::with_capacity(entries.len());
    let mut offset = 0;
    for entry in &entries {
        stored.push(&stream[offset..offset + entry.stored_length]);
        offset += entry.stored_length;
    }

    let mut builder = SfntBuilder::new(flavor);
    let mut x_mins = None;
    let mut deferred_hmtx = None;
    for (entry, data) in entries.iter().zip(&stored) {
        match (entry.tag, entry.transformed) {
            (GLYF, true) => {
                let glyf = reconstruct_glyf(data)?;
                let loca_entry = entries
                    .iter()
                    .find(|e| e.tag == LOCA)
                    .ok_or_else(|| corrupt("transformed glyf without loca"))?;
                if glyf.loca.len() != loca_entry.orig_length {
                    return Err(corrupt(format!(
                        "reconstructed loca is {} bytes, directory says {}",
                        glyf.loca.len(),
                        loca_entry.orig_length
                    )));
                }
                builder.add_table(GLYF, glyf.glyf);
                builder.add_table(LOCA, glyf.loca);
                x_mins = Some(glyf.x_mins);
            }
            (LOCA, true) => {} // rebuilt together with glyf
            (HMTX, true) => deferred_hmtx = Some(*data),
            (tag, false) => {
                if data.len() != entry.orig_length {
                    return Err(corrupt("table length mismatch"));
                }
                builder.add_table(tag, data.to_vec());
            }
            (tag, true) => {
                return Err(corrupt(format!(
                    "unsupported transform for table {}",
                    String::from_utf8_lossy(&tag)
                )))
            }
        }
    }

    if let Some(data) = deferred_hmtx {
        let x_mins = x_mins.ok_or_else(|| corrupt("transformed hmtx requires transformed glyf"))?;
        let num_glyphs = builder
            .table(&MAXP)
            .and_then(|t| read_u16_at(t, 4))
            .ok_or_else(|| corrupt("missing maxp"))? as usize;
        let num_hmetrics = builder
            .table(&HHEA)
            .and_then(|t| read_u16_at(t, 34))
            .ok_or_else(|| corrupt("missing hhea"))? as usize;
        let hmtx = reconstruct_hmtx(data, num_glyphs, num_hmetrics, &x_mins)?;
        builder.add_table(HMTX, hmtx);
    }

    if !builder.has_table(b"head") {
        return Err(corrupt("missing head table"));
    }
    Ok(builder.build())
}

fn read_u16_at(data: &[u8], offset: usize) -> Option<u16> {
    let b = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

fn read_table_entry(r: &mut Reader<'_>) -> Result<TableEntry> {
    let flags = r.u8()?;
    let tag = match flags & 0x3f {
        0x3f => r.tag()?,
        index => *KNOWN_TAGS[index as usize],
    };
    let version = flags >> 6;
    let orig_length = read_base128(r)? as usize;
    // For glyf/loca version 0 is the transform and 3 the null transform;
    // every other table inverts that.
    let transformed = if tag == GLYF || tag == LOCA { version == 0 } else { version != 0 };
    let stored_length = if transformed {
        let len = read_base128(r)? as usize;
        if tag == LOCA && len != 0 {
            return Err(corrupt("transformed loca must be empty"));
        }
        len
    } else {
        orig_length
    };
    Ok(TableEntry {
        tag,
        orig_length,
        transformed,
        stored_length,
    })
}

fn check_glyf_loca_pairing(entries: &[TableEntry]) -> Result<()> {
    let glyf = entries.iter().find(|e| e.tag == GLYF).map(|e| e.transformed);
    let loca = entries.iter().find(|e| e.tag == LOCA).map(|e| e.transformed);
    match (glyf, loca) {
        (Some(g), Some(l)) if g != l => Err(corrupt("glyf and loca must share a transform")),
        (Some(true), None) | (None, Some(true)) => Err(corrupt("glyf and loca must appear together")),
        _ => Ok(()),
    }
}

fn decompress(compressed: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    brotli::Decompressor::new(compressed, 4096)
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| corrupt(format!("brotli: {}", e)))?;
    if out.len() != expected {
        return Err(corrupt(format!(
            "decompressed {} bytes, expected {}",
            out.len(),
            expected
        )));
    }
    Ok(out)
}

/// UIntBase128: big-endian groups of 7 bits, high bit set on all but the
/// last byte, at most five bytes, no leading zero groups.
fn read_base128(r: &mut Reader<'_>) -> Result<u32> {
    let mut acc: u32 = 0;
    for i in 0..5 {
        let byte = r.u8()?;
        if i == 0 && byte == 0x80 {
            return Err(corrupt("UIntBase128 with leading zero"));
        }
        if acc & 0xFE00_0000 != 0 {
            return Err(corrupt("UIntBase128 overflow"));
        }
        acc = (acc << 7) | u32::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return Ok(acc);
        }
    }
    Err(corrupt("UIntBase128 longer than five bytes"))
}

fn read_255_u16(r: &mut Reader<'_>) -> Result<u16> {
    const LOWEST_U_CODE: u16 = 253;
    match r.u8()? {
        253 => r.u16(),
        254 => Ok(u16::from(r.u8()?) + LOWEST_U_CODE * 2),
        255 => Ok(u16::from(r.u8()?) + LOWEST_U_CODE),
        code => Ok(u16::from(code)),
    }
}

struct RebuiltGlyf {
    glyf: Vec<u8>,
    loca: Vec<u8>,
    x_mins: Vec<i16>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Bbox {
    x_min: i16,
    y_min: i16,
    x_max: i16,
    y_max: i16,
}

impl Bbox {
    fn read(r: &mut Reader<'_>) -> Result<Bbox> {
        Ok(Bbox {
            x_min: r.i16()?,
            y_min: r.i16()?,
            x_max: r.i16()?,
            y_max: r.i16()?,
        })
    }

    fn of_points(points: &[Point]) -> Bbox {
        let mut iter = points.iter();
        let Some(first) = iter.next() else {
            return Bbox::default();
        };
        iter.fold(
            Bbox {
                x_min: first.x,
                y_min: first.y,
                x_max: first.x,
                y_max: first.y,
            },
            |b, p| Bbox {
                x_min: b.x_min.min(p.x),
                y_min: b.y_min.min(p.y),
                x_max: b.x_max.max(p.x),
                y_max: b.y_max.max(p.y),
            },
        )
    }

    fn write(&self, out: &mut Vec<u8>) {
        for v in [self.x_min, self.y_min, self.x_max, self.y_max] {
            out.extend_from_slice(&v.to_be_bytes());
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Point {
    x: i16,
    y: i16,
    on_curve: bool,
}

fn bit_set(bitmap: &[u8], index: usize) -> bool {
    bitmap
        .get(index >> 3)
        .is_some_and(|byte| byte & (0x80 >> (index & 7)) != 0)
}

fn reconstruct_glyf(data: &[u8]) -> Result<RebuiltGlyf> {
    let mut header = Reader::new(data);
    header.skip(2)?; // reserved
    let option_flags = header.u16()?;
    let num_glyphs = header.u16()? as usize;
    let index_format = header.u16()?;
    let mut sizes = [0usize; 7];
    for size in &mut sizes {
        *size = header.u32()? as usize;
    }
    let [n_contour_size, n_points_size, flag_size, glyph_size, composite_size, bbox_size, instruction_size] =
        sizes;

    let mut body = Reader::at(data, header.position());
    let mut n_contours = Reader::new(body.bytes(n_contour_size)?);
    let mut n_points = Reader::new(body.bytes(n_points_size)?);
    let mut flags = Reader::new(body.bytes(flag_size)?);
    let mut glyphs = Reader::new(body.bytes(glyph_size)?);
    let mut composites = Reader::new(body.bytes(composite_size)?);
    let bbox_data = body.bytes(bbox_size)?;
    let mut instructions = Reader::new(body.bytes(instruction_size)?);
    let overlap_bitmap = if option_flags & 1 != 0 {
        Some(body.bytes(num_glyphs.div_ceil(8))?)
    } else {
        None
    };

    let bitmap_len = 4 * num_glyphs.div_ceil(32);
    if bbox_data.len() < bitmap_len {
        return Err(corrupt("bbox stream shorter than its bitmap"));
    }
    let (bbox_bitmap, bbox_values) = bbox_data.split_at(bitmap_len);
    let mut bboxes = Reader::new(bbox_values);

    let mut glyf = Vec::new();
    let mut offsets = Vec::with_capacity(num_glyphs + 1);
    let mut x_mins = Vec::with_capacity(num_glyphs);
    for index in 0..num_glyphs {
        offsets.push(glyf.len());
        let has_bbox = bit_set(bbox_bitmap, index);
        let contour_count = n_contours.i16()?;
        match contour_count {
            0 => {
                if has_bbox {
                    return Err(corrupt(format!("empty glyph {} has a bbox", index)));
                }
                x_mins.push(0);
            }
            -1 => {
                if !has_bbox {
                    return Err(corrupt(format!("composite glyph {} without bbox", index)));
                }
                let bbox = Bbox::read(&mut bboxes)?;
                let (components, have_instructions) = read_composite(&mut composites)?;
                glyf.extend_from_slice(&contour_count.to_be_bytes());
                bbox.write(&mut glyf);
                glyf.extend_from_slice(components);
                if have_instructions {
                    let len = read_255_u16(&mut glyphs)?;
                    glyf.extend_from_slice(&len.to_be_bytes());
                    glyf.extend_from_slice(instructions.bytes(len as usize)?);
                }
                x_mins.push(bbox.x_min);
            }
            count if count > 0 => {
                let mut end_points = Vec::with_capacity(count as usize);
                let mut total = 0usize;
                for _ in 0..count {
                    total += read_255_u16(&mut n_points)? as usize;
                    let end = total
                        .checked_sub(1)
                        .filter(|e| *e <= u16::MAX as usize)
                        .ok_or_else(|| corrupt(format!("bad contour in glyph {}", index)))?;
                    end_points.push(end as u16);
                }
                let points = decode_triplets(flags.bytes(total)?, &mut glyphs)?;
                let instruction_len = read_255_u16(&mut glyphs)?;
                let program = instructions.bytes(instruction_len as usize)?;
                let bbox = if has_bbox { Bbox::read(&mut bboxes)? } else { Bbox::of_points(&points) };
                let overlap = overlap_bitmap.is_some_and(|bm| bit_set(bm, index));

                glyf.extend_from_slice(&contour_count.to_be_bytes());
                bbox.write(&mut glyf);
                for end in &end_points {
                    glyf.extend_from_slice(&end.to_be_bytes());
                }
                glyf.extend_from_slice(&instruction_len.to_be_bytes());
                glyf.extend_from_slice(program);
                encode_points(&points, overlap, &mut glyf)?;
                x_mins.push(bbox.x_min);
            }
            _ => return Err(corrupt(format!("invalid contour count {}", contour_count))),
        }
        glyf.resize((glyf.len() + 3) & !3, 0);
    }
    offsets.push(glyf.len());

    let loca = match index_format {
        0 => {
            let mut loca = Vec::with_capacity(offsets.len() * 2);
            for offset in offsets {
                let half = u16::try_from(offset / 2).map_err(|_| corrupt("glyf too large for short loca"))?;
                loca.extend_from_slice(&half.to_be_bytes());
            }
            loca
        }
        _ => offsets.iter().flat_map(|o| (*o as u32).to_be_bytes()).collect(),
    };

    Ok(RebuiltGlyf { glyf, loca, x_mins })
}

fn read_composite<'a>(r: &mut Reader<'a>) -> Result<(&'a [u8], bool)> {
    let start = r.position();
    let mut have_instructions = false;
    loop {
        let flags = r.u16()?;
        have_instructions |= flags & WE_HAVE_INSTRUCTIONS != 0;
        let args = if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        let transform = if flags & WE_HAVE_A_SCALE != 0 {
            2
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            4
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            8
        } else {
            0
        };
        r.skip(2 + args + transform)?; // glyphIndex, arguments, transform
        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    Ok((r.since(start), have_instructions))
}

fn with_sign(flag: u8, value: i32) -> i32 {
    if flag & 1 != 0 {
        value
    } else {
        -value
    }
}

/// Decode the point triplets of one simple glyph. Each flag byte selects how
/// many coordinate bytes follow in the glyph stream and how they split
/// between dx and dy.
fn decode_triplets(flags: &[u8], glyphs: &mut Reader<'_>) -> Result<Vec<Point>> {
    let mut points = Vec::with_capacity(flags.len());
    let (mut x, mut y) = (0i32, 0i32);
    for &raw in flags {
        let on_curve = raw >> 7 == 0;
        let flag = raw & 0x7f;
        let (dx, dy) = if flag < 10 {
            let b = glyphs.u8()? as i32;
            (0, with_sign(flag, (((flag & 14) as i32) << 7) + b))
        } else if flag < 20 {
            let b = glyphs.u8()? as i32;
            (with_sign(flag, ((((flag - 10) & 14) as i32) << 7) + b), 0)
        } else if flag < 84 {
            let b0 = (flag - 20) as i32;
            let b1 = glyphs.u8()? as i32;
            (
                with_sign(flag, 1 + (b0 & 0x30) + (b1 >> 4)),
                with_sign(flag >> 1, 1 + ((b0 & 0x0c) << 2) + (b1 & 0x0f)),
            )
        } else if flag < 120 {
            let b0 = (flag - 84) as i32;
            let b = glyphs.bytes(2)?;
            (
                with_sign(flag, 1 + ((b0 / 12) << 8) + b[0] as i32),
                with_sign(flag >> 1, 1 + (((b0 % 12) >> 2) << 8) + b[1] as i32),
            )
        } else if flag < 124 {
            let b = glyphs.bytes(3)?;
            (
                with_sign(flag, ((b[0] as i32) << 4) + ((b[1] as i32) >> 4)),
                with_sign(flag >> 1, (((b[1] & 0x0f) as i32) << 8) + b[2] as i32),
            )
        } else {
            let b = glyphs.bytes(4)?;
            (
                with_sign(flag, ((b[0] as i32) << 8) + b[1] as i32),
                with_sign(flag >> 1, ((b[2] as i32) << 8) + b[3] as i32),
            )
        };
        x += dx;
        y += dy;
        points.push(Point {
            x: i16::try_from(x).map_err(|_| corrupt("x coordinate out of range"))?,
            y: i16::try_from(y).map_err(|_| corrupt("y coordinate out of range"))?,
            on_curve,
        });
    }
    Ok(points)
}

/// Write flags and coordinate deltas in the plain `glyf` encoding.
fn encode_points(points: &[Point], overlap: bool, out: &mut Vec<u8>) -> Result<()> {
    let mut flag_bytes = Vec::with_capacity(points.len());
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let (mut last_x, mut last_y) = (0i32, 0i32);
    for (i, p) in points.iter().enumerate() {
        let mut flag = if p.on_curve { ON_CURVE_POINT } else { 0 };
        if i == 0 && overlap {
            flag |= OVERLAP_SIMPLE;
        }
        let dx = p.x as i32 - last_x;
        let dy = p.y as i32 - last_y;
        flag |= encode_delta(dx, X_SHORT_VECTOR, X_IS_SAME_OR_POSITIVE, &mut xs)?;
        flag |= encode_delta(dy, Y_SHORT_VECTOR, Y_IS_SAME_OR_POSITIVE, &mut ys)?;
        flag_bytes.push(flag);
        last_x = p.x as i32;
        last_y = p.y as i32;
    }
    out.extend_from_slice(&flag_bytes);
    out.extend_from_slice(&xs);
    out.extend_from_slice(&ys);
    Ok(())
}

fn encode_delta(delta: i32, short: u8, same_or_positive: u8, out: &mut Vec<u8>) -> Result<u8> {
    if delta == 0 {
        Ok(same_or_positive)
    } else if delta.abs() < 256 {
        out.push(delta.unsigned_abs() as u8);
        Ok(short | if delta > 0 { same_or_positive } else { 0 })
    } else {
        let v = i16::try_from(delta).map_err(|_| corrupt("coordinate delta out of range"))?;
        out.extend_from_slice(&v.to_be_bytes());
        Ok(0)
    }
}

fn reconstruct_hmtx(data: &[u8], num_glyphs: usize, num_hmetrics: usize, x_mins: &[i16]) -> Result<Vec<u8>> {
    if num_hmetrics == 0 || num_hmetrics > num_glyphs || x_mins.len() != num_glyphs {
        return Err(corrupt("hmtx metrics do not match glyph count"));
    }
    let mut r = Reader::new(data);
    let flags = r.u8()?;
    let has_proportional_lsbs = flags & 1 == 0;
    let has_monospace_lsbs = flags & 2 == 0;
    if has_proportional_lsbs && has_monospace_lsbs {
        return Err(corrupt("transformed hmtx omits no side bearings"));
    }

    let advances = (0..num_hmetrics).map(|_| r.u16()).collect::<Result<Vec<_>>>()?;
    let mut lsbs = Vec::with_capacity(num_glyphs);
    for (i, x_min) in x_mins.iter().enumerate() {
        let explicit = if i < num_hmetrics { has_proportional_lsbs } else { has_monospace_lsbs };
        lsbs.push(if explicit { r.i16()? } else { *x_min });
    }

    let mut out = Vec::with_capacity(num_hmetrics * 4 + (num_glyphs - num_hmetrics) * 2);
    for (advance, lsb) in advances.iter().zip(&lsbs) {
        out.extend_from_slice(&advance.to_be_bytes());
        out.extend_from_slice(&lsb.to_be_bytes());
    }
    for lsb in &lsbs[num_hmetrics..] {
        out.extend_from_slice(&lsb.to_be_bytes());
    }
    Ok(out)
}
