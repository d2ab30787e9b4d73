//! Synthetic TrueType fixtures.
//!
//! Builds a small but structurally valid font in memory so the tests do not
//! depend on font files on disk. Layout:
//!
//! | gid | meaning                                             |
//! |-----|-----------------------------------------------------|
//! | 0   | .notdef, simple outline with 2 instruction bytes    |
//! | 1   | 'A', simple                                         |
//! | 2   | 'B', simple                                         |
//! | 3   | 'C', composite of gids 5 and 1, with instructions   |
//! | 4   | 'D', empty (no outline)                             |
//! | 5   | un-cmapped simple glyph, only reachable through 'C' |

pub const UNITS_PER_EM: u16 = 1000;
pub const ADVANCES: [u16; 6] = [500, 600, 620, 640, 300, 580];

/// Which cmap subtable the fixture carries.
#[derive(Clone, Copy, PartialEq)]
pub enum CmapKind {
    /// Platform 3 encoding 1, format 4: 0x41..=0x44 -> gids 1..=4.
    Format4,
    /// Platform 0, format 6: same mapping.
    Format6,
    /// Platform 3 encoding 10, format 12: same mapping.
    Format12,
    /// Format 12 mapping U+1F600 -> gid 1.
    Format12Astral,
    /// Platform 1 (Mac) only: no usable Unicode subtable.
    MacRomanOnly,
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// One-contour simple glyph with all points on-curve and long coordinates.
fn simple_glyph(points: &[(i16, i16)], instructions: &[u8]) -> Vec<u8> {
    let xs: Vec<i16> = points.iter().map(|p| p.0).collect();
    let ys: Vec<i16> = points.iter().map(|p| p.1).collect();
    let mut out = Vec::new();
    push_i16(&mut out, 1); // contours
    push_i16(&mut out, *xs.iter().min().unwrap());
    push_i16(&mut out, *ys.iter().min().unwrap());
    push_i16(&mut out, *xs.iter().max().unwrap());
    push_i16(&mut out, *ys.iter().max().unwrap());
    push_u16(&mut out, points.len() as u16 - 1); // endPtsOfContours
    push_u16(&mut out, instructions.len() as u16);
    out.extend_from_slice(instructions);
    for _ in points {
        out.push(0x01); // on curve, long x, long y
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

/// Composite glyph; every component uses word args as x/y offsets.
fn composite_glyph(
    bbox: (i16, i16, i16, i16),
    components: &[(u16, i16, i16)],
    instructions: &[u8],
) -> Vec<u8> {
    const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
    const ARGS_ARE_XY_VALUES: u16 = 0x0002;
    const MORE_COMPONENTS: u16 = 0x0020;
    const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;

    let mut out = Vec::new();
    push_i16(&mut out, -1);
    push_i16(&mut out, bbox.0);
    push_i16(&mut out, bbox.1);
    push_i16(&mut out, bbox.2);
    push_i16(&mut out, bbox.3);
    for (i, &(gid, dx, dy)) in components.iter().enumerate() {
        let last = i == components.len() - 1;
        let mut flags = ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES;
        if !last {
            flags |= MORE_COMPONENTS;
        } else if !instructions.is_empty() {
            flags |= WE_HAVE_INSTRUCTIONS;
        }
        push_u16(&mut out, flags);
        push_u16(&mut out, gid);
        push_i16(&mut out, dx);
        push_i16(&mut out, dy);
    }
    if !instructions.is_empty() {
        push_u16(&mut out, instructions.len() as u16);
        out.extend_from_slice(instructions);
    }
    out
}

fn build_cmap(kind: CmapKind) -> Vec<u8> {
    let mut table = Vec::new();
    push_u16(&mut table, 0); // version
    push_u16(&mut table, 1); // one subtable
    let (platform, encoding) = match kind {
        CmapKind::Format4 => (3u16, 1u16),
        CmapKind::Format6 => (0, 3),
        CmapKind::Format12 | CmapKind::Format12Astral => (3, 10),
        CmapKind::MacRomanOnly => (1, 0),
    };
    push_u16(&mut table, platform);
    push_u16(&mut table, encoding);
    push_u32(&mut table, 12); // subtable offset

    match kind {
        CmapKind::Format4 => {
            push_u16(&mut table, 4);
            push_u16(&mut table, 32); // length
            push_u16(&mut table, 0); // language
            push_u16(&mut table, 4); // segCountX2
            push_u16(&mut table, 4); // searchRange
            push_u16(&mut table, 1); // entrySelector
            push_u16(&mut table, 0); // rangeShift
            push_u16(&mut table, 0x44); // endCode[0]
            push_u16(&mut table, 0xFFFF);
            push_u16(&mut table, 0); // reservedPad
            push_u16(&mut table, 0x41); // startCode[0]
            push_u16(&mut table, 0xFFFF);
            push_u16(&mut table, 0xFFC0); // idDelta[0]: 0x41 -> 1
            push_u16(&mut table, 1);
            push_u16(&mut table, 0); // idRangeOffset
            push_u16(&mut table, 0);
        }
        CmapKind::Format6 => {
            push_u16(&mut table, 6);
            push_u16(&mut table, 18);
            push_u16(&mut table, 0);
            push_u16(&mut table, 0x41); // firstCode
            push_u16(&mut table, 4); // entryCount
            for gid in 1u16..=4 {
                push_u16(&mut table, gid);
            }
        }
        CmapKind::Format12 | CmapKind::Format12Astral => {
            push_u16(&mut table, 12);
            push_u16(&mut table, 0); // reserved
            push_u32(&mut table, 28); // length
            push_u32(&mut table, 0); // language
            push_u32(&mut table, 1); // nGroups
            let (start, end, gid) = if kind == CmapKind::Format12 {
                (0x41u32, 0x44u32, 1u32)
            } else {
                (0x1F600, 0x1F600, 1)
            };
            push_u32(&mut table, start);
            push_u32(&mut table, end);
            push_u32(&mut table, gid);
        }
        CmapKind::MacRomanOnly => {
            // Format 0 stub; never consulted.
            push_u16(&mut table, 0);
            push_u16(&mut table, 262);
            push_u16(&mut table, 0);
            table.extend_from_slice(&[0u8; 256]);
        }
    }
    table
}

/// Builds the complete fixture font.
pub fn build_font(cmap: CmapKind, with_os2: bool) -> Vec<u8> {
    let glyphs: Vec<Vec<u8>> = vec![
        simple_glyph(&[(0, 0), (0, 700), (500, 700), (500, 0)], &[0xB0, 0x01]),
        simple_glyph(&[(10, 0), (10, 700), (490, 700), (490, 0)], &[0xB0, 0x02]),
        simple_glyph(&[(20, -10), (20, 710), (480, 710), (480, -10)], &[]),
        composite_glyph((10, 0, 560, 700), &[(5, 0, 0), (1, 60, 0)], &[0xB0, 0x03, 0x04]),
        Vec::new(), // 'D': no outline
        simple_glyph(&[(5, 0), (5, 650), (455, 650), (455, 0)], &[0xB1]),
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

    // Short loca: offsets divided by two.
    let mut loca = Vec::new();
    for &offset in &offsets {
        push_u16(&mut loca, (offset / 2) as u16);
    }

    let mut head = Vec::new();
    push_u32(&mut head, 0x0001_0000);
    push_u32(&mut head, 0x0002_8000); // fontRevision 2.5
    push_u32(&mut head, 0); // checkSumAdjustment
    push_u32(&mut head, 0x5F0F_3CF5);
    push_u16(&mut head, 0); // flags
    push_u16(&mut head, UNITS_PER_EM);
    head.extend_from_slice(&[0u8; 16]); // dates
    push_i16(&mut head, 0);
    push_i16(&mut head, -10);
    push_i16(&mut head, 560);
    push_i16(&mut head, 710);
    push_u16(&mut head, 0); // macStyle
    push_u16(&mut head, 7); // lowestRecPPEM
    push_i16(&mut head, 2); // fontDirectionHint
    push_i16(&mut head, 0); // indexToLocFormat: short
    push_i16(&mut head, 0); // glyphDataFormat

    let mut hhea = Vec::new();
    push_u32(&mut hhea, 0x0001_0000);
    push_i16(&mut hhea, 800); // ascent
    push_i16(&mut hhea, -200); // descent
    push_i16(&mut hhea, 90); // lineGap
    push_u16(&mut hhea, 640); // advanceWidthMax
    push_i16(&mut hhea, 0); // minLeftSideBearing
    push_i16(&mut hhea, 0); // minRightSideBearing
    push_i16(&mut hhea, 560); // xMaxExtent
    push_i16(&mut hhea, 1);
    push_i16(&mut hhea, 0);
    push_i16(&mut hhea, 0);
    hhea.extend_from_slice(&[0u8; 8]);
    push_i16(&mut hhea, 0); // metricDataFormat
    push_u16(&mut hhea, 6); // numOfLongHorMetrics

    let mut hmtx = Vec::new();
    for &advance in &ADVANCES {
        push_u16(&mut hmtx, advance);
        push_i16(&mut hmtx, 0);
    }

    let mut maxp = Vec::new();
    push_u32(&mut maxp, 0x0001_0000);
    push_u16(&mut maxp, 6); // numGlyphs
    push_u16(&mut maxp, 4);
    push_u16(&mut maxp, 1);
    push_u16(&mut maxp, 8);
    push_u16(&mut maxp, 2);
    push_u16(&mut maxp, 2);
    for _ in 0..7 {
        push_u16(&mut maxp, 0);
    }
    push_u16(&mut maxp, 2); // maxComponentElements
    push_u16(&mut maxp, 1); // maxComponentDepth

    let mut os2 = Vec::new();
    if with_os2 {
        push_u16(&mut os2, 4); // version
        os2.extend_from_slice(&[0u8; 86]);
        push_i16(&mut os2, 650); // sCapHeight at offset 88
        os2.extend_from_slice(&[0u8; 6]);
    }

    let mut tables: Vec<([u8; 4], Vec<u8>)> = vec![
        (*b"cmap", build_cmap(cmap)),
        (*b"glyf", glyf),
        (*b"head", head),
        (*b"hhea", hhea),
        (*b"hmtx", hmtx),
        (*b"loca", loca),
        (*b"maxp", maxp),
    ];
    if with_os2 {
        tables.push((*b"OS/2", os2));
    }
    tables.sort_by_key(|(tag, _)| u32::from_be_bytes(*tag));

    let mut out = Vec::new();
    push_u32(&mut out, 0x0001_0000);
    push_u16(&mut out, tables.len() as u16);
    push_u16(&mut out, 0); // searchRange: unused by the reader
    push_u16(&mut out, 0);
    push_u16(&mut out, 0);
    let mut offset = 12 + tables.len() * 16;
    for (tag, table) in &tables {
        out.extend_from_slice(tag);
        push_u32(&mut out, 0); // checksum: unused by the reader
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
