//! A tiny TrueType font assembled in memory for tests.
//!
//! Glyphs: 0 `.notdef` (empty), 1 `A` (a 500x700 square), 2 `B` (a quadratic
//! triangle 500 wide, 500 tall). 1000 units per em. The `name` table carries
//! family "Square" so font databases will index it.

use super::sfnt::SfntBuilder;

pub(crate) const UNITS_PER_EM: u16 = 1000;

fn be16(out: &mut Vec<u8>, values: &[i32]) {
    for v in values {
        out.extend_from_slice(&(*v as u16).to_be_bytes());
    }
}

fn be32(out: &mut Vec<u8>, values: &[u32]) {
    for v in values {
        out.extend_from_slice(&v.to_be_bytes());
    }
}

pub(crate) fn head() -> Vec<u8> {
    let mut t = Vec::new();
    be16(&mut t, &[1, 0]);
    be32(&mut t, &[0x0001_0000, 0, 0x5F0F_3CF5]);
    be16(&mut t, &[0, UNITS_PER_EM as i32]);
    t.extend_from_slice(&[0; 16]); // created, modified
    be16(&mut t, &[0, 0, 500, 700, 0, 8, 2, 1, 0]);
    assert_eq!(t.len(), 54);
    t
}

pub(crate) fn hhea() -> Vec<u8> {
    let mut t = Vec::new();
    be32(&mut t, &[0x0001_0000]);
    be16(&mut t, &[800, -200, 0, 600, 0, 0, 500, 1, 0, 0, 0, 0, 0, 0, 0, 3]);
    assert_eq!(t.len(), 36);
    t
}

pub(crate) fn maxp() -> Vec<u8> {
    let mut t = Vec::new();
    be32(&mut t, &[0x0000_5000]);
    be16(&mut t, &[3]);
    t
}

pub(crate) fn cmap() -> Vec<u8> {
    let mut t = Vec::new();
    be16(&mut t, &[0, 1, 0, 3]);
    be32(&mut t, &[12]);
    // format 6: 'A' -> 1, 'B' -> 2
    be16(&mut t, &[6, 14, 0, 0x41, 2, 1, 2]);
    t
}

/// Family (1) and PostScript (6) names, both "Square", Windows/Unicode BMP.
pub(crate) fn name() -> Vec<u8> {
    let family: Vec<u8> = "Square".encode_utf16().flat_map(u16::to_be_bytes).collect();
    let mut t = Vec::new();
    be16(&mut t, &[0, 2, 30]);
    for name_id in [1, 6] {
        be16(&mut t, &[3, 1, 0x0409, name_id, family.len() as i32, 0]);
    }
    t.extend_from_slice(&family);
    t
}

pub(crate) fn hmtx() -> Vec<u8> {
    let mut t = Vec::new();
    be16(&mut t, &[600, 0, 600, 0, 500, 0]);
    t
}

/// Glyph records as stored in `glyf`, unpadded.
pub(crate) fn glyph_records() -> Vec<Vec<u8>> {
    let mut square = Vec::new();
    be16(&mut square, &[1, 0, 0, 500, 700, 3, 0]);
    square.extend_from_slice(&[1, 1, 1, 1]);
    be16(&mut square, &[0, 500, 0, -500, 0, 0, 700, 0]);

    let mut triangle = Vec::new();
    be16(&mut triangle, &[1, 0, 0, 500, 500, 2, 0]);
    triangle.extend_from_slice(&[1, 0, 1]);
    be16(&mut triangle, &[0, 250, 250, 0, 500, -500]);

    vec![Vec::new(), square, triangle]
}

/// `glyf` and long-format `loca` for [`glyph_records`].
pub(crate) fn glyf_and_loca() -> (Vec<u8>, Vec<u8>) {
    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    for record in glyph_records() {
        be32(&mut loca, &[glyf.len() as u32]);
        glyf.extend_from_slice(&record);
        glyf.resize((glyf.len() + 3) & !3, 0);
    }
    be32(&mut loca, &[glyf.len() as u32]);
    (glyf, loca)
}

pub(crate) fn square_font() -> Vec<u8> {
    let (glyf, loca) = glyf_and_loca();
    let mut builder = SfntBuilder::new(0x0001_0000);
    builder
        .add_table(*b"cmap", cmap())
        .add_table(*b"cvt ", vec![0; 64])
        .add_table(*b"glyf", glyf)
        .add_table(*b"head", head())
        .add_table(*b"hhea", hhea())
        .add_table(*b"hmtx", hmtx())
        .add_table(*b"loca", loca)
        .add_table(*b"maxp", maxp())
        .add_table(*b"name", name());
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_parses_with_expected_glyphs() {
        let data = square_font();
        let face = ttf_parser::Face::parse(&data, 0).expect("fixture parses");
        assert_eq!(face.units_per_em(), UNITS_PER_EM);
        assert_eq!(face.number_of_glyphs(), 3);
        let a = face.glyph_index('A').expect("A is mapped");
        assert_eq!(a.0, 1);
        assert_eq!(face.glyph_hor_advance(a), Some(600));
        assert_eq!(face.glyph_index('B').map(|g| g.0), Some(2));
        assert!(face.glyph_index('C').is_none());
        let family = face
            .names()
            .into_iter()
            .find(|n| n.name_id == ttf_parser::name_id::FAMILY)
            .and_then(|n| n.to_string());
        assert_eq!(family.as_deref(), Some("Square"));
    }
}
