//! TrueType font reading.
//!
//! Parses only the tables the subsetter needs: `head`, `hhea`, `maxp`,
//! `OS/2`, `cmap` (formats 4, 6 and 12 on a Unicode platform), `hmtx`,
//! `glyf` and `loca`. Glyph data is addressed by offset into the source
//! font's bytes and never copied during parsing.
//!
//! Reference: <https://developer.apple.com/fonts/TrueType-Reference-Manual/>

use thiserror::Error;

/// Most deeply nested composite accepted before the font is rejected.
pub const MAX_COMPOSITE_DEPTH: usize = 8;

/// Errors raised while reading a TrueType font.
#[derive(Debug, Error)]
pub enum TrueTypeError {
    #[error("font data truncated at byte {offset}")]
    Truncated { offset: usize },

    #[error("not a TrueType font: scaler type {scaler:#010X}")]
    BadScalerType { scaler: u32 },

    #[error("required table '{tag}' missing")]
    MissingTable { tag: &'static str },

    #[error("no usable Unicode cmap subtable (formats 4, 6 and 12 supported)")]
    NoUnicodeCmap,

    #[error("glyph index {glyph} out of range (font has {count} glyphs)")]
    GlyphOutOfRange { glyph: u16, count: u16 },

    #[error("composite glyph {glyph} nests deeper than {limit} levels")]
    CompositeTooDeep { glyph: u16, limit: usize },
}

pub(crate) fn be_u16(data: &[u8], offset: usize) -> Result<u16, TrueTypeError> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(TrueTypeError::Truncated { offset })
}

pub(crate) fn be_i16(data: &[u8], offset: usize) -> Result<i16, TrueTypeError> {
    be_u16(data, offset).map(|v| v as i16)
}

pub(crate) fn be_u32(data: &[u8], offset: usize) -> Result<u32, TrueTypeError> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(TrueTypeError::Truncated { offset })
}

/// Component record of a composite glyph.
#[derive(Debug, Clone, Copy)]
pub struct Component {
    /// Source glyph index the component points at.
    pub glyph_index: u16,
    pub flags: u16,
    /// Byte offset of the flags word within the glyph entry.
    pub flags_offset: usize,
    /// Byte offset of the glyph index word within the glyph entry.
    pub glyph_index_offset: usize,
}

/// One `glyf` entry, addressed into the source font bytes.
#[derive(Debug, Clone)]
pub struct Glyph<'a> {
    /// Contour count; negative marks a composite. Zero with empty `raw`
    /// means the glyph has no outline (space and friends).
    pub contours: i16,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    /// The raw `glyf` entry bytes.
    pub raw: &'a [u8],
    /// Components of a composite glyph, in record order.
    pub components: Vec<Component>,
    /// Byte offset just past the last component record; composite
    /// instructions (if any) start here.
    pub components_end: usize,
}

impl Glyph<'_> {
    pub fn is_composite(&self) -> bool {
        self.contours < 0
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Point, contour and nesting statistics gathered across a composite tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlyphStats {
    pub points: u16,
    pub contours: u16,
    pub depth: usize,
    pub components: u16,
}

/// A parsed TrueType font borrowing the caller's bytes.
pub struct FontFile<'a> {
    data: &'a [u8],
    pub units_per_em: u16,
    /// `fontRevision` word, carried into the subset's `head` verbatim.
    pub font_revision: u32,
    pub ascent: i16,
    pub descent: i16,
    pub line_gap: i16,
    pub num_glyphs: u16,
    /// `sCapHeight` when `OS/2` version 2 or later is present.
    pub os2_cap_height: Option<i16>,
    index_to_loc_format: i16,
    num_long_metrics: u16,
    /// Absolute offsets of usable Unicode cmap subtables, in file order.
    cmap_subtables: Vec<usize>,
    glyf: (usize, usize),
    loca: (usize, usize),
    hmtx: (usize, usize),
}

/// Composite glyph flag bits.
pub mod composite_flags {
    pub const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
    pub const WE_HAVE_A_SCALE: u16 = 0x0008;
    pub const MORE_COMPONENTS: u16 = 0x0020;
    pub const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
    pub const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
    pub const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;
}

impl<'a> FontFile<'a> {
    /// Parses the table directory and every table the subsetter relies on.
    pub fn parse(data: &'a [u8]) -> Result<FontFile<'a>, TrueTypeError> {
        let scaler = be_u32(data, 0)?;
        // 0x00010000, or 'true' from older Mac fonts.
        if scaler != 0x0001_0000 && scaler != 0x7472_7565 {
            return Err(TrueTypeError::BadScalerType { scaler });
        }
        let num_tables = be_u16(data, 4)? as usize;

        let find = |wanted: &'static str| -> Result<(usize, usize), TrueTypeError> {
            for i in 0..num_tables {
                let entry = 12 + i * 16;
                let tag = data
                    .get(entry..entry + 4)
                    .ok_or(TrueTypeError::Truncated { offset: entry })?;
                if tag == wanted.as_bytes() {
                    let offset = be_u32(data, entry + 8)? as usize;
                    let length = be_u32(data, entry + 12)? as usize;
                    if offset + length > data.len() {
                        return Err(TrueTypeError::Truncated { offset });
                    }
                    return Ok((offset, length));
                }
            }
            Err(TrueTypeError::MissingTable { tag: wanted })
        };

        let head = find("head")?;
        let hhea = find("hhea")?;
        let maxp = find("maxp")?;
        let cmap = find("cmap")?;
        let glyf = find("glyf")?;
        let loca = find("loca")?;
        let hmtx = find("hmtx")?;
        let os2 = find("OS/2").ok();

        let units_per_em = be_u16(data, head.0 + 18)?;
        let font_revision = be_u32(data, head.0 + 4)?;
        let index_to_loc_format = be_i16(data, head.0 + 50)?;

        let ascent = be_i16(data, hhea.0 + 4)?;
        let descent = be_i16(data, hhea.0 + 6)?;
        let line_gap = be_i16(data, hhea.0 + 8)?;
        let num_long_metrics = be_u16(data, hhea.0 + 34)?;

        let num_glyphs = be_u16(data, maxp.0 + 4)?;

        let os2_cap_height = match os2 {
            Some((offset, length)) if length >= 90 => {
                let version = be_u16(data, offset)?;
                if version >= 2 {
                    Some(be_i16(data, offset + 88)?)
                } else {
                    None
                }
            }
            _ => None,
        };

        // Register Unicode subtables: platform 0 (any encoding), or
        // platform 3 encodings 1 (BMP) and 10 (full range).
        let mut cmap_subtables = Vec::new();
        let subtable_count = be_u16(data, cmap.0 + 2)? as usize;
        for i in 0..subtable_count {
            let record = cmap.0 + 4 + i * 8;
            let platform = be_u16(data, record)?;
            let encoding = be_u16(data, record + 2)?;
            let subtable = cmap.0 + be_u32(data, record + 4)? as usize;
            let unicode = platform == 0 || (platform == 3 && (encoding == 1 || encoding == 10));
            if !unicode {
                continue;
            }
            let format = be_u16(data, subtable)?;
            if matches!(format, 4 | 6 | 12) {
                cmap_subtables.push(subtable);
            }
        }
        if cmap_subtables.is_empty() {
            return Err(TrueTypeError::NoUnicodeCmap);
        }

        Ok(FontFile {
            data,
            units_per_em,
            font_revision,
            ascent,
            descent,
            line_gap,
            num_glyphs,
            os2_cap_height,
            index_to_loc_format,
            num_long_metrics,
            cmap_subtables,
            glyf,
            loca,
            hmtx,
        })
    }

    /// Cap height in font units, defaulting to 0.7 em when `OS/2` is absent
    /// or too old to carry one.
    pub fn cap_height(&self) -> i16 {
        match self.os2_cap_height {
            Some(height) if height != 0 => height,
            _ => (self.units_per_em as f64 * 0.7) as i16,
        }
    }

    /// Maps a Unicode codepoint to a source glyph index by walking the
    /// registered cmap subtables in order.
    pub fn find_glyph(&self, codepoint: u32) -> Option<u16> {
        for &subtable in &self.cmap_subtables {
            let found = match be_u16(self.data, subtable).ok()? {
                4 => self.lookup_format4(subtable, codepoint),
                6 => self.lookup_format6(subtable, codepoint),
                12 => self.lookup_format12(subtable, codepoint),
                _ => None,
            };
            if let Some(glyph) = found {
                if glyph != 0 {
                    return Some(glyph);
                }
            }
        }
        None
    }

    fn lookup_format4(&self, subtable: usize, codepoint: u32) -> Option<u16> {
        if codepoint > 0xFFFF {
            return None;
        }
        let data = self.data;
        let code = codepoint as u16;
        let seg_count = be_u16(data, subtable + 6).ok()? as usize / 2;
        let end_codes = subtable + 14;
        let start_codes = end_codes + seg_count * 2 + 2;
        let id_deltas = start_codes + seg_count * 2;
        let id_range_offsets = id_deltas + seg_count * 2;

        for segment in 0..seg_count {
            let end = be_u16(data, end_codes + segment * 2).ok()?;
            if code > end {
                continue;
            }
            let start = be_u16(data, start_codes + segment * 2).ok()?;
            if code < start {
                return None;
            }
            let delta = be_u16(data, id_deltas + segment * 2).ok()?;
            let range_offset = be_u16(data, id_range_offsets + segment * 2).ok()?;
            let glyph = if range_offset == 0 {
                code.wrapping_add(delta)
            } else {
                let entry = id_range_offsets
                    + segment * 2
                    + range_offset as usize
                    + (code - start) as usize * 2;
                let glyph = be_u16(data, entry).ok()?;
                if glyph == 0 {
                    return None;
                }
                glyph.wrapping_add(delta)
            };
            return Some(glyph);
        }
        None
    }

    fn lookup_format6(&self, subtable: usize, codepoint: u32) -> Option<u16> {
        let first = be_u16(self.data, subtable + 6).ok()? as u32;
        let count = be_u16(self.data, subtable + 8).ok()? as u32;
        if codepoint < first || codepoint >= first + count {
            return None;
        }
        be_u16(
            self.data,
            subtable + 10 + (codepoint - first) as usize * 2,
        )
        .ok()
    }

    fn lookup_format12(&self, subtable: usize, codepoint: u32) -> Option<u16> {
        let group_count = be_u32(self.data, subtable + 12).ok()? as usize;
        for group in 0..group_count {
            let record = subtable + 16 + group * 12;
            let start = be_u32(self.data, record).ok()?;
            let end = be_u32(self.data, record + 4).ok()?;
            if codepoint < start {
                return None;
            }
            if codepoint <= end {
                let start_glyph = be_u32(self.data, record + 8).ok()?;
                return Some((start_glyph + (codepoint - start)) as u16);
            }
        }
        None
    }

    /// `(advance width, left side bearing)` for a glyph, honouring the
    /// shared advance of trailing `hmtx` entries.
    pub fn metrics(&self, glyph: u16) -> Result<(u16, i16), TrueTypeError> {
        if glyph >= self.num_glyphs {
            return Err(TrueTypeError::GlyphOutOfRange {
                glyph,
                count: self.num_glyphs,
            });
        }
        let (hmtx, _) = self.hmtx;
        let long = self.num_long_metrics.max(1) as usize;
        if (glyph as usize) < long {
            let entry = hmtx + glyph as usize * 4;
            Ok((be_u16(self.data, entry)?, be_i16(self.data, entry + 2)?))
        } else {
            let advance = be_u16(self.data, hmtx + (long - 1) * 4)?;
            let lsb_entry = hmtx + long * 4 + (glyph as usize - long) * 2;
            Ok((advance, be_i16(self.data, lsb_entry)?))
        }
    }

    fn loca_entry(&self, index: usize) -> Result<usize, TrueTypeError> {
        let (loca, _) = self.loca;
        if self.index_to_loc_format == 0 {
            Ok(be_u16(self.data, loca + index * 2)? as usize * 2)
        } else {
            Ok(be_u32(self.data, loca + index * 4)? as usize)
        }
    }

    /// Reads one `glyf` entry, including the component list of a composite.
    pub fn glyph(&self, glyph: u16) -> Result<Glyph<'a>, TrueTypeError> {
        if glyph >= self.num_glyphs {
            return Err(TrueTypeError::GlyphOutOfRange {
                glyph,
                count: self.num_glyphs,
            });
        }
        let start = self.loca_entry(glyph as usize)?;
        let end = self.loca_entry(glyph as usize + 1)?;
        let (glyf, glyf_len) = self.glyf;
        if end > glyf_len || start > end {
            return Err(TrueTypeError::Truncated { offset: glyf + start });
        }
        let raw = &self.data[glyf + start..glyf + end];
        if raw.is_empty() {
            return Ok(Glyph {
                contours: 0,
                x_min: 0,
                y_min: 0,
                x_max: 0,
                y_max: 0,
                raw,
                components: Vec::new(),
                components_end: 0,
            });
        }

        let contours = be_i16(raw, 0)?;
        let mut parsed = Glyph {
            contours,
            x_min: be_i16(raw, 2)?,
            y_min: be_i16(raw, 4)?,
            x_max: be_i16(raw, 6)?,
            y_max: be_i16(raw, 8)?,
            raw,
            components: Vec::new(),
            components_end: raw.len(),
        };
        if contours >= 0 {
            return Ok(parsed);
        }

        let mut offset = 10;
        loop {
            let flags = be_u16(raw, offset)?;
            let glyph_index = be_u16(raw, offset + 2)?;
            parsed.components.push(Component {
                glyph_index,
                flags,
                flags_offset: offset,
                glyph_index_offset: offset + 2,
            });
            offset += 4;
            offset += if flags & composite_flags::ARG_1_AND_2_ARE_WORDS != 0 {
                4
            } else {
                2
            };
            if flags & composite_flags::WE_HAVE_A_SCALE != 0 {
                offset += 2;
            } else if flags & composite_flags::WE_HAVE_AN_X_AND_Y_SCALE != 0 {
                offset += 4;
            } else if flags & composite_flags::WE_HAVE_A_TWO_BY_TWO != 0 {
                offset += 8;
            }
            if flags & composite_flags::MORE_COMPONENTS == 0 {
                break;
            }
        }
        parsed.components_end = offset;
        Ok(parsed)
    }

    /// Point/contour counts of a simple glyph entry.
    pub fn simple_glyph_points(&self, glyph: &Glyph) -> Result<u16, TrueTypeError> {
        debug_assert!(glyph.contours >= 0);
        if glyph.contours == 0 {
            return Ok(0);
        }
        let last_end = be_u16(glyph.raw, 10 + (glyph.contours as usize - 1) * 2)?;
        Ok(last_end + 1)
    }

    /// Recursively counts points, contours, components and nesting depth
    /// across a composite tree.
    pub fn glyph_stats(&self, glyph: u16) -> Result<GlyphStats, TrueTypeError> {
        self.stats_inner(glyph, 0)
    }

    fn stats_inner(&self, glyph: u16, depth: usize) -> Result<GlyphStats, TrueTypeError> {
        if depth > MAX_COMPOSITE_DEPTH {
            return Err(TrueTypeError::CompositeTooDeep {
                glyph,
                limit: MAX_COMPOSITE_DEPTH,
            });
        }
        let entry = self.glyph(glyph)?;
        if entry.is_empty() {
            return Ok(GlyphStats::default());
        }
        if !entry.is_composite() {
            return Ok(GlyphStats {
                points: self.simple_glyph_points(&entry)?,
                contours: entry.contours as u16,
                depth,
                components: 0,
            });
        }
        let mut stats = GlyphStats {
            depth,
            components: entry.components.len() as u16,
            ..Default::default()
        };
        for component in &entry.components {
            let child = self.stats_inner(component.glyph_index, depth + 1)?;
            stats.points += child.points;
            stats.contours += child.contours;
            stats.depth = stats.depth.max(child.depth);
            stats.components = stats.components.max(child.components);
        }
        Ok(stats)
    }
}
