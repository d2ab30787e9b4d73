//! Embedded font resources.
//!
//! Each document font is a TrueType file plus the subsetting state that
//! accumulates glyphs as text is laid out. At finalization the subset is
//! emitted as five indirect objects, in this order: FontFile2 stream,
//! FontDescriptor, CIDFontType2, ToUnicode CMap, and the Type0 font the
//! pages reference. The Type0 id is pre-allocated when the font is added so
//! page resources can name it before the subset exists.

use flate_encoder::deflate;
use font_toolkit::{generate_cmap, FontFile, Subsetter};

use crate::objects::{ObjId, ObjectWriter, StreamPayload};
use crate::PdfError;

pub(crate) struct FontResource<'a> {
    pub font: FontFile<'a>,
    pub subsetter: Subsetter,
    /// Family name as given by the caller, sanitized for a PostScript name.
    pub name: String,
    /// Pre-allocated Type0 object id; pages reference `/F<id>`.
    pub type0_id: ObjId,
    /// Position in the document's font list, used for the subset tag.
    pub index: usize,
}

impl FontResource<'_> {
    /// Maps one codepoint, returning the subset glyph index and its advance
    /// in font units.
    pub fn map_char(&mut self, codepoint: u32) -> (u16, u16) {
        let glyph = self.subsetter.map_codepoint(&self.font, codepoint);
        let source = self.font.find_glyph(codepoint).unwrap_or(0);
        let advance = self.font.metrics(source).map_or(0, |(advance, _)| advance);
        (glyph, advance)
    }

    /// Advance width of a codepoint in font units without interning it.
    pub fn measure_char(&self, codepoint: u32) -> u16 {
        let Some(source) = self.font.find_glyph(codepoint) else {
            return self.font.metrics(0).map_or(0, |(advance, _)| advance);
        };
        self.font.metrics(source).map_or(0, |(advance, _)| advance)
    }

    /// Baseline-to-baseline distance for a font size, in points.
    pub fn line_height(&self, size: f64) -> f64 {
        let units = self.font.units_per_em.max(1) as f64;
        let span = (self.font.ascent as f64 - self.font.descent as f64
            + self.font.line_gap as f64)
            .max(units);
        size * span / units
    }

    /// Ascent for a font size, in points.
    pub fn ascent(&self, size: f64) -> f64 {
        size * self.font.ascent as f64 / self.font.units_per_em.max(1) as f64
    }

    /// Writes the five font objects; the subset reaches its composite
    /// closure fixpoint here.
    pub fn write_objects(&mut self, writer: &mut ObjectWriter) -> Result<(), PdfError> {
        if self.subsetter.glyph_count() == 0 {
            // A font that was added but never used still needs a
            // well-formed one-glyph subset.
            self.subsetter.map_codepoint(&self.font, ' ' as u32);
        }
        let subset = self.subsetter.write(&self.font)?;
        let units = self.font.units_per_em.max(1) as f64;
        let to_pdf = |value: f64| (value * 1000.0 / units).round();
        let base_font = format!("{}+{}", subset_tag(self.index), self.name);

        // FontFile2: always deflated, with the uncompressed length declared.
        let compressed = deflate(&subset.bytes, writer.deflate_options())?;
        let file_id = writer.put_new_stream(
            &format!("/Length1 {}", subset.bytes.len()),
            StreamPayload::Deflated(&compressed),
        )?;

        let descriptor_id = writer.alloc();
        writer.start_obj(descriptor_id);
        writer.push(&format!(
            "<</Type/FontDescriptor/FontName/{base_font}/Flags 4\
             /FontBBox[{} {} {} {}]/ItalicAngle 0/Ascent {}/Descent {}\
             /CapHeight {}/StemV 80/FontFile2 {file_id}>>",
            to_pdf(subset.x_min as f64),
            to_pdf(subset.y_min as f64),
            to_pdf(subset.x_max as f64),
            to_pdf(subset.y_max as f64),
            to_pdf(self.font.ascent as f64),
            to_pdf(self.font.descent as f64),
            to_pdf(self.font.cap_height() as f64),
        ));
        writer.end_obj();

        // CIDFontType2 with a dense /W array: subset index = CID = GID.
        let cid_id = writer.alloc();
        writer.start_obj(cid_id);
        let mut widths = String::new();
        for &advance in &subset.widths {
            widths.push_str(&format!("{} ", to_pdf(advance as f64)));
        }
        writer.push(&format!(
            "<</Type/Font/Subtype/CIDFontType2/BaseFont/{base_font}\
             /CIDSystemInfo<</Registry(Adobe)/Ordering(UCS)/Supplement 0>>\
             /FontDescriptor {descriptor_id}/CIDToGIDMap/Identity\
             /W[0[{}]]>>",
            widths.trim_end(),
        ));
        writer.end_obj();

        let cmap = generate_cmap(self.subsetter.codepoints());
        let to_unicode_id = writer.put_new_stream("", StreamPayload::Plain(cmap.as_bytes()))?;

        writer.start_obj(self.type0_id);
        writer.push(&format!(
            "<</Type/Font/Subtype/Type0/BaseFont/{base_font}/Encoding/Identity-H\
             /DescendantFonts[{cid_id}]/ToUnicode {to_unicode_id}>>"
        ));
        writer.end_obj();
        Ok(())
    }
}

/// Six-letter subset prefix, distinct per font index.
fn subset_tag(index: usize) -> String {
    let mut tag = String::with_capacity(6);
    let mut value = index;
    for _ in 0..6 {
        tag.push((b'A' + (value % 26) as u8) as char);
        value /= 26;
    }
    tag
}

/// Strips characters that do not belong in a PostScript name.
pub(crate) fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "Embedded".to_string()
    } else {
        cleaned
    }
}
