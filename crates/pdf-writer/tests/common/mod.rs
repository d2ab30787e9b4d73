//! Fixtures for end-to-end document tests: a synthetic TrueType font and
//! small in-memory PNG files.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn simple_glyph(points: &[(i16, i16)]) -> Vec<u8> {
    let xs: Vec<i16> = points.iter().map(|p| p.0).collect();
    let ys: Vec<i16> = points.iter().map(|p| p.1).collect();
    let mut out = Vec::new();
    push_i16(&mut out, 1);
    push_i16(&mut out, *xs.iter().min().unwrap());
    push_i16(&mut out, *ys.iter().min().unwrap());
    push_i16(&mut out, *xs.iter().max().unwrap());
    push_i16(&mut out, *ys.iter().max().unwrap());
    push_u16(&mut out, points.len() as u16 - 1);
    push_u16(&mut out, 0); // no instructions
    for _ in points {
        out.push(0x01);
    }
    let mut prev = 0i16;
    for &x in &xs {
        push_i16(&mut out, x - prev);
        prev = x;
    }
    prev = 0;
    for &y in &ys {
        push_i16(&mut out, y - prev);
        prev = y;
    }
    out
}

/// Composite of gids 5 and 1, word args, no instructions.
fn composite_glyph() -> Vec<u8> {
    let mut out = Vec::new();
    push_i16(&mut out, -1);
    push_i16(&mut out, 10);
    push_i16(&mut out, 0);
    push_i16(&mut out, 560);
    push_i16(&mut out, 700);
    push_u16(&mut out, 0x0001 | 0x0002 | 0x0020); // words, xy, more
    push_u16(&mut out, 5);
    push_i16(&mut out, 0);
    push_i16(&mut out, 0);
    push_u16(&mut out, 0x0001 | 0x0002);
    push_u16(&mut out, 1);
    push_i16(&mut out, 60);
    push_i16(&mut out, 0);
    out
}

/// Six glyphs; cmap maps 0x41..=0x44 to gids 1..=4. Gid 3 ('C') is a
/// composite of gids 5 and 1, gid 4 ('D') is empty.
pub fn test_font() -> Vec<u8> {
    let glyphs: Vec<Vec<u8>> = vec![
        simple_glyph(&[(0, 0), (0, 700), (500, 700), (500, 0)]),
        simple_glyph(&[(10, 0), (10, 700), (490, 700), (490, 0)]),
        simple_glyph(&[(20, -10), (20, 710), (480, 710), (480, -10)]),
        composite_glyph(),
        Vec::new(),
        simple_glyph(&[(5, 0), (5, 650), (455, 650), (455, 0)]),
    ];

    let mut glyf = Vec::new();
    let mut offsets = Vec::new();
    for glyph in &glyphs {
        offsets.push(glyf.len() as u32);
        glyf.extend_from_slice(glyph);
        while glyf.len() % 4 != 0 {
            glyf.push(0);
        }
    }
    offsets.push(glyf.len() as u32);

    let mut loca = Vec::new();
    for &offset in &offsets {
        push_u32(&mut loca, offset);
    }

    let mut cmap = Vec::new();
    push_u16(&mut cmap, 0);
    push_u16(&mut cmap, 1);
    push_u16(&mut cmap, 3);
    push_u16(&mut cmap, 1);
    push_u32(&mut cmap, 12);
    push_u16(&mut cmap, 4);
    push_u16(&mut cmap, 32);
    push_u16(&mut cmap, 0);
    push_u16(&mut cmap, 4); // segCountX2
    push_u16(&mut cmap, 4);
    push_u16(&mut cmap, 1);
    push_u16(&mut cmap, 0);
    push_u16(&mut cmap, 0x44);
    push_u16(&mut cmap, 0xFFFF);
    push_u16(&mut cmap, 0);
    push_u16(&mut cmap, 0x41);
    push_u16(&mut cmap, 0xFFFF);
    push_u16(&mut cmap, 0xFFC0);
    push_u16(&mut cmap, 1);
    push_u16(&mut cmap, 0);
    push_u16(&mut cmap, 0);

    let mut head = Vec::new();
    push_u32(&mut head, 0x0001_0000);
    push_u32(&mut head, 0x0001_0000);
    push_u32(&mut head, 0);
    push_u32(&mut head, 0x5F0F_3CF5);
    push_u16(&mut head, 0);
    push_u16(&mut head, 1000); // unitsPerEm
    head.extend_from_slice(&[0u8; 16]);
    push_i16(&mut head, 0);
    push_i16(&mut head, -10);
    push_i16(&mut head, 560);
    push_i16(&mut head, 710);
    push_u16(&mut head, 0);
    push_u16(&mut head, 7);
    push_i16(&mut head, 2);
    push_i16(&mut head, 1); // long loca
    push_i16(&mut head, 0);

    let mut hhea = Vec::new();
    push_u32(&mut hhea, 0x0001_0000);
    push_i16(&mut hhea, 800);
    push_i16(&mut hhea, -200);
    push_i16(&mut hhea, 90);
    push_u16(&mut hhea, 640);
    push_i16(&mut hhea, 0);
    push_i16(&mut hhea, 0);
    push_i16(&mut hhea, 560);
    push_i16(&mut hhea, 1);
    push_i16(&mut hhea, 0);
    push_i16(&mut hhea, 0);
    hhea.extend_from_slice(&[0u8; 8]);
    push_i16(&mut hhea, 0);
    push_u16(&mut hhea, 6);

    let mut hmtx = Vec::new();
    for advance in [500u16, 600, 620, 640, 300, 580] {
        push_u16(&mut hmtx, advance);
        push_i16(&mut hmtx, 0);
    }

    let mut maxp = Vec::new();
    push_u32(&mut maxp, 0x0001_0000);
    push_u16(&mut maxp, 6);
    for _ in 0..13 {
        push_u16(&mut maxp, 4);
    }

    let mut tables: Vec<([u8; 4], Vec<u8>)> = vec![
        (*b"cmap", cmap),
        (*b"glyf", glyf),
        (*b"head", head),
        (*b"hhea", hhea),
        (*b"hmtx", hmtx),
        (*b"loca", loca),
        (*b"maxp", maxp),
    ];
    tables.sort_by_key(|(tag, _)| u32::from_be_bytes(*tag));

    let mut out = Vec::new();
    push_u32(&mut out, 0x0001_0000);
    push_u16(&mut out, tables.len() as u16);
    push_u16(&mut out, 0);
    push_u16(&mut out, 0);
    push_u16(&mut out, 0);
    let mut offset = 12 + tables.len() * 16;
    for (tag, table) in &tables {
        out.extend_from_slice(tag);
        push_u32(&mut out, 0);
        push_u32(&mut out, offset as u32);
        push_u32(&mut out, table.len() as u32);
        offset += (table.len() + 3) & !3;
    }
    for (_, table) in &tables {
        out.extend_from_slice(table);
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }
    out
}

fn png_chunk(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out.extend_from_slice(&[0u8; 4]);
    out
}

/// 2x2 truecolour PNG: red, green / blue, white.
pub fn test_png() -> Vec<u8> {
    let mut filtered = Vec::new();
    filtered.push(0u8);
    filtered.extend_from_slice(&[255, 0, 0, 0, 255, 0]);
    filtered.push(0u8);
    filtered.extend_from_slice(&[0, 0, 255, 255, 255, 255]);
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&filtered).unwrap();
    let idat = encoder.finish().unwrap();

    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&2u32.to_be_bytes());
    ihdr.extend_from_slice(&2u32.to_be_bytes());
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);

    let mut out = Vec::new();
    out.extend_from_slice(&[137, 80, 78, 71, 13, 10, 26, 10]);
    out.extend_from_slice(&png_chunk(b"IHDR", &ihdr));
    out.extend_from_slice(&png_chunk(b"IDAT", &idat));
    out.extend_from_slice(&png_chunk(b"IEND", &[]));
    out
}
