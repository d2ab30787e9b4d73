//! TrueType subsetting.
//!
//! Keeps only the glyphs a document actually references and writes a valid
//! reduced font containing `glyf`, `head`, `hhea`, `hmtx`, `loca` and `maxp`.
//! Other tables are omitted: a subset embedded as CIDFontType2 under an
//! Identity-H Type0 font needs none of them.
//!
//! Glyph closure over composites is realized lazily. Component glyph indices
//! are rewritten as entries are emitted, and a component not yet in the
//! subset is appended to the glyph list mid-iteration, so the emission loop
//! runs to a fixpoint rather than over a precomputed set.

use std::collections::HashMap;

use thiserror::Error;

use crate::truetype::{be_u16, composite_flags, FontFile, TrueTypeError};

/// Subsetting failures.
#[derive(Debug, Error)]
pub enum SubsetError {
    #[error(transparent)]
    Font(#[from] TrueTypeError),
}

/// A finished subset font.
#[derive(Debug, Clone)]
pub struct SubsetFont {
    /// The complete TrueType file: directory plus the six emitted tables,
    /// 4-byte aligned, with `head.checkSumAdjustment` populated.
    pub bytes: Vec<u8>,
    /// Advance width per subset glyph, in font units.
    pub widths: Vec<u16>,
    /// Bounding box over every emitted outline, in font units.
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
}

/// Accumulates the glyphs a document uses and emits the reduced font.
///
/// Subset indices are insertion order: the first mapped codepoint gets glyph
/// 0. The same indices serve as CIDs under Identity-H encoding. The source
/// font is passed into each call rather than held, so the state can live
/// next to the `FontFile` that owns the table offsets.
#[derive(Debug, Default)]
pub struct Subsetter {
    /// Ordered source glyph indices; the subset index is the position.
    g_list: Vec<u16>,
    /// Source glyph index to subset index.
    xlat: HashMap<u16, u16>,
    /// Codepoint to source glyph index, caching cmap walks.
    lookup: HashMap<u32, u16>,
    /// Codepoint per subset glyph for text extraction; 0 for glyphs that
    /// entered through composite closure only.
    unicode: Vec<u32>,
}

impl Subsetter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn glyph_count(&self) -> usize {
        self.g_list.len()
    }

    /// Codepoint per subset index, 0 where none applies.
    pub fn codepoints(&self) -> &[u32] {
        &self.unicode
    }

    /// Returns the subset index for a codepoint, interning the glyph on
    /// first use. Codepoints the font does not map land on the source
    /// `.notdef` glyph.
    pub fn map_codepoint(&mut self, font: &FontFile, codepoint: u32) -> u16 {
        if let Some(&source) = self.lookup.get(&codepoint) {
            return self.xlat[&source];
        }
        match font.find_glyph(codepoint) {
            Some(source) => {
                self.lookup.insert(codepoint, source);
                let index = self.intern(source);
                if self.unicode[index as usize] == 0 {
                    self.unicode[index as usize] = codepoint;
                }
                index
            }
            None => {
                self.lookup.insert(codepoint, 0);
                self.intern(0)
            }
        }
    }

    /// Interns a source glyph, returning its existing subset index or
    /// appending it.
    fn intern(&mut self, source: u16) -> u16 {
        if let Some(&index) = self.xlat.get(&source) {
            return index;
        }
        let index = self.g_list.len() as u16;
        self.g_list.push(source);
        self.unicode.push(0);
        self.xlat.insert(source, index);
        index
    }

    /// Emits the subset font.
    ///
    /// Iterates the glyph list by index because rewriting a composite can
    /// intern components and grow the list; the loop simply runs until it
    /// catches up with the tail.
    pub fn write(&mut self, font: &FontFile) -> Result<SubsetFont, SubsetError> {
        let mut glyf: Vec<u8> = Vec::new();
        let mut loca: Vec<u32> = Vec::new();
        let mut widths: Vec<u16> = Vec::new();
        let mut bearings: Vec<i16> = Vec::new();

        let mut x_min = i16::MAX;
        let mut y_min = i16::MAX;
        let mut x_max = i16::MIN;
        let mut y_max = i16::MIN;
        let mut advance_width_max = 0u16;
        let mut min_lsb = i16::MAX;
        let mut min_rsb = i32::MAX;
        let mut x_max_extent = i32::MIN;
        let mut max_points = 0u16;
        let mut max_contours = 0u16;
        let mut max_composite_points = 0u16;
        let mut max_composite_contours = 0u16;
        let mut max_component_elements = 0u16;
        let mut max_component_depth = 0usize;

        let mut index = 0;
        while index < self.g_list.len() {
            let source = self.g_list[index];
            let entry = font.glyph(source)?;
            let (advance, lsb) = font.metrics(source)?;

            loca.push(glyf.len() as u32);
            widths.push(advance);
            bearings.push(if entry.is_empty() { 0 } else { lsb });
            advance_width_max = advance_width_max.max(advance);

            if !entry.is_empty() {
                x_min = x_min.min(entry.x_min);
                y_min = y_min.min(entry.y_min);
                x_max = x_max.max(entry.x_max);
                y_max = y_max.max(entry.y_max);
                min_lsb = min_lsb.min(lsb);
                let width = entry.x_max as i32 - entry.x_min as i32;
                min_rsb = min_rsb.min(advance as i32 - lsb as i32 - width);
                x_max_extent = x_max_extent.max(lsb as i32 + width);

                if entry.is_composite() {
                    let stats = font.glyph_stats(source)?;
                    max_composite_points = max_composite_points.max(stats.points);
                    max_composite_contours = max_composite_contours.max(stats.contours);
                    max_component_elements =
                        max_component_elements.max(entry.components.len() as u16);
                    max_component_depth = max_component_depth.max(stats.depth);

                    // Copy up to the end of the component records, dropping
                    // any trailing instructions, then rewrite each component
                    // in place.
                    let base = glyf.len();
                    glyf.extend_from_slice(&entry.raw[..entry.components_end]);
                    for component in &entry.components {
                        let subset_index = self.intern(component.glyph_index);
                        let at = base + component.glyph_index_offset;
                        glyf[at..at + 2].copy_from_slice(&subset_index.to_be_bytes());
                        let flags =
                            component.flags & !composite_flags::WE_HAVE_INSTRUCTIONS;
                        let at = base + component.flags_offset;
                        glyf[at..at + 2].copy_from_slice(&flags.to_be_bytes());
                    }
                } else {
                    max_points = max_points.max(font.simple_glyph_points(&entry)?);
                    max_contours = max_contours.max(entry.contours as u16);

                    // Header and contour end points, a zeroed instruction
                    // length, then flags and coordinates.
                    let instructions_at = 10 + entry.contours as usize * 2;
                    let instruction_len = be_u16(entry.raw, instructions_at)? as usize;
                    glyf.extend_from_slice(&entry.raw[..instructions_at]);
                    glyf.extend_from_slice(&0u16.to_be_bytes());
                    glyf.extend_from_slice(&entry.raw[instructions_at + 2 + instruction_len..]);
                }
                while glyf.len() % 4 != 0 {
                    glyf.push(0);
                }
            }
            index += 1;
        }
        loca.push(glyf.len() as u32);

        let glyph_count = self.g_list.len() as u16;
        if x_min > x_max {
            // No outlines at all; keep the box empty rather than inverted.
            x_min = 0;
            y_min = 0;
            x_max = 0;
            y_max = 0;
        }
        if min_lsb == i16::MAX {
            min_lsb = 0;
        }
        if min_rsb == i32::MAX {
            min_rsb = 0;
        }
        if x_max_extent == i32::MIN {
            x_max_extent = 0;
        }

        let head = self.build_head(font, x_min, y_min, x_max, y_max);
        let hhea = build_hhea(
            y_max,
            y_min,
            font.line_gap,
            advance_width_max,
            min_lsb,
            clamp_i16(min_rsb),
            clamp_i16(x_max_extent),
            glyph_count,
        );
        let hmtx = build_hmtx(&widths, &bearings);
        let loca_bytes = build_loca(&loca);
        let maxp = build_maxp(
            glyph_count,
            max_points,
            max_contours,
            max_composite_points,
            max_composite_contours,
            max_component_elements,
            max_component_depth as u16,
        );

        let bytes = assemble(&[
            (*b"glyf", glyf),
            (*b"head", head),
            (*b"hhea", hhea),
            (*b"hmtx", hmtx),
            (*b"loca", loca_bytes),
            (*b"maxp", maxp),
        ]);

        Ok(SubsetFont {
            bytes,
            widths,
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    fn build_head(
        &self,
        font: &FontFile,
        x_min: i16,
        y_min: i16,
        x_max: i16,
        y_max: i16,
    ) -> Vec<u8> {
        let mut head = Vec::with_capacity(54);
        push_u32(&mut head, 0x0001_0000); // version
        push_u32(&mut head, font.font_revision);
        push_u32(&mut head, 0); // checkSumAdjustment, patched after assembly
        push_u32(&mut head, 0x5F0F_3CF5); // magic
        push_u16(&mut head, 0); // flags
        push_u16(&mut head, font.units_per_em);
        head.extend_from_slice(&[0u8; 16]); // created, modified
        push_i16(&mut head, x_min);
        push_i16(&mut head, y_min);
        push_i16(&mut head, x_max);
        push_i16(&mut head, y_max);
        push_u16(&mut head, 0); // macStyle
        push_u16(&mut head, 7); // lowestRecPPEM
        push_i16(&mut head, 2); // fontDirectionHint
        push_i16(&mut head, 1); // indexToLocFormat: long offsets
        push_i16(&mut head, 0); // glyphDataFormat
        head
    }
}

fn clamp_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_i16(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

#[allow(clippy::too_many_arguments)]
fn build_hhea(
    ascent: i16,
    descent: i16,
    line_gap: i16,
    advance_width_max: u16,
    min_lsb: i16,
    min_rsb: i16,
    x_max_extent: i16,
    num_long_metrics: u16,
) -> Vec<u8> {
    let mut hhea = Vec::with_capacity(36);
    push_u32(&mut hhea, 0x0001_0000);
    push_i16(&mut hhea, ascent);
    push_i16(&mut hhea, descent);
    push_i16(&mut hhea, line_gap);
    push_u16(&mut hhea, advance_width_max);
    push_i16(&mut hhea, min_lsb);
    push_i16(&mut hhea, min_rsb);
    push_i16(&mut hhea, x_max_extent);
    push_i16(&mut hhea, 1); // caretSlopeRise
    push_i16(&mut hhea, 0); // caretSlopeRun
    push_i16(&mut hhea, 0); // caretOffset
    hhea.extend_from_slice(&[0u8; 8]); // reserved
    push_i16(&mut hhea, 0); // metricDataFormat
    push_u16(&mut hhea, num_long_metrics);
    hhea
}

fn build_hmtx(widths: &[u16], bearings: &[i16]) -> Vec<u8> {
    let mut hmtx = Vec::with_capacity(widths.len() * 4);
    for (&advance, &lsb) in widths.iter().zip(bearings) {
        push_u16(&mut hmtx, advance);
        push_i16(&mut hmtx, lsb);
    }
    hmtx
}

fn build_loca(offsets: &[u32]) -> Vec<u8> {
    let mut loca = Vec::with_capacity(offsets.len() * 4);
    for &offset in offsets {
        push_u32(&mut loca, offset);
    }
    loca
}

fn build_maxp(
    glyph_count: u16,
    max_points: u16,
    max_contours: u16,
    max_composite_points: u16,
    max_composite_contours: u16,
    max_component_elements: u16,
    max_component_depth: u16,
) -> Vec<u8> {
    let mut maxp = Vec::with_capacity(32);
    push_u32(&mut maxp, 0x0001_0000);
    push_u16(&mut maxp, glyph_count);
    push_u16(&mut maxp, max_points);
    push_u16(&mut maxp, max_contours);
    push_u16(&mut maxp, max_composite_points);
    push_u16(&mut maxp, max_composite_contours);
    push_u16(&mut maxp, 1); // maxZones: no twilight zone, instructions gone
    push_u16(&mut maxp, 0); // maxTwilightPoints
    push_u16(&mut maxp, 0); // maxStorage
    push_u16(&mut maxp, 0); // maxFunctionDefs
    push_u16(&mut maxp, 0); // maxInstructionDefs
    push_u16(&mut maxp, 0); // maxStackElements
    push_u16(&mut maxp, 0); // maxSizeOfInstructions
    push_u16(&mut maxp, max_component_elements);
    push_u16(&mut maxp, max_component_depth);
    maxp
}

/// Sum of big-endian u32 words with implicit zero padding, mod 2^32.
pub fn table_checksum(data: &[u8]) -> u32 {
    let mut sum = 0u32;
    let mut chunks = data.chunks_exact(4);
    for word in &mut chunks {
        sum = sum.wrapping_add(u32::from_be_bytes([word[0], word[1], word[2], word[3]]));
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let mut word = [0u8; 4];
        word[..rest.len()].copy_from_slice(rest);
        sum = sum.wrapping_add(u32::from_be_bytes(word));
    }
    sum
}

/// Sentinel the whole-file checksum must reach once `checkSumAdjustment` is
/// added in.
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

/// Builds the table directory (tables sorted by tag), lays every table out on
/// a 4-byte boundary, and patches `head.checkSumAdjustment`.
fn assemble(tables: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let mut ordered: Vec<&([u8; 4], Vec<u8>)> = tables.iter().collect();
    ordered.sort_by_key(|(tag, _)| u32::from_be_bytes(*tag));

    let num_tables = ordered.len() as u16;
    let search_range = {
        let mut power = 1u16;
        while power * 2 <= num_tables {
            power *= 2;
        }
        power * 16
    };
    let entry_selector = (search_range / 16).ilog2() as u16;
    let range_shift = num_tables * 16 - search_range;

    let mut out = Vec::new();
    push_u32(&mut out, 0x0001_0000); // scaler type
    push_u16(&mut out, num_tables);
    push_u16(&mut out, search_range);
    push_u16(&mut out, entry_selector);
    push_u16(&mut out, range_shift);

    let mut offset = 12 + ordered.len() * 16;
    let mut head_offset = None;
    for (tag, table) in &ordered {
        let padded_len = (table.len() + 3) & !3;
        out.extend_from_slice(tag);
        push_u32(&mut out, table_checksum(table));
        push_u32(&mut out, offset as u32);
        push_u32(&mut out, table.len() as u32);
        if tag == b"head" {
            head_offset = Some(offset);
        }
        offset += padded_len;
    }
    for (_, table) in &ordered {
        out.extend_from_slice(table);
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }

    let file_checksum = table_checksum(&out);
    let adjustment = CHECKSUM_MAGIC.wrapping_sub(file_checksum);
    let head_offset = head_offset.expect("head table is always emitted");
    out[head_offset + 8..head_offset + 12].copy_from_slice(&adjustment.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_sums_be_words() {
        assert_eq!(table_checksum(&[]), 0);
        assert_eq!(table_checksum(&[0, 0, 0, 1]), 1);
        assert_eq!(table_checksum(&[0, 0, 0, 1, 0, 0, 0, 2]), 3);
    }

    #[test]
    fn checksum_pads_tail_with_zeros() {
        // 0x01000000 from the lone byte in the second word.
        assert_eq!(table_checksum(&[0, 0, 0, 1, 1]), 1 + 0x0100_0000);
    }

    #[test]
    fn checksum_wraps_mod_2_32() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 2];
        assert_eq!(table_checksum(&data), 1);
    }
}
