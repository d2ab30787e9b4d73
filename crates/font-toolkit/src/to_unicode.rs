//! ToUnicode CMap generation for PDF text extraction.
//!
//! Maps subset glyph indices (the CIDs under Identity-H) back to the Unicode
//! codepoints they were interned for, as a single `bfrange` covering the
//! whole subset. Codepoints beyond the BMP become UTF-16BE surrogate pairs.

use std::fmt::Write as FmtWrite;

/// CMap header (PostScript).
const CMAP_HEADER: &str = "/CIDInit /ProcSet findresource begin\n\
12 dict begin\n\
begincmap\n\
/CIDSystemInfo\n\
<< /Registry (Adobe)\n\
   /Ordering (UCS)\n\
   /Supplement 0\n\
>> def\n\
/CMapName /Adobe-Identity-UCS def\n\
/CMapType 2 def\n\
1 begincodespacerange\n\
<0000> <FFFF>\n\
endcodespacerange\n";

/// CMap footer (PostScript).
const CMAP_FOOTER: &str = "endcmap\n\
CMapName currentdict /CMap defineresource pop\n\
end\n\
end";

/// Generates the CMap body for a subset.
///
/// `codepoints[i]` is the Unicode codepoint of subset glyph `i`, 0 when the
/// glyph has none (composite closure only); those map to U+0000 so the range
/// stays dense.
pub fn generate_cmap(codepoints: &[u32]) -> String {
    let estimated = CMAP_HEADER.len() + CMAP_FOOTER.len() + 64 + codepoints.len() * 12;
    let mut cmap = String::with_capacity(estimated);
    cmap.push_str(CMAP_HEADER);

    if !codepoints.is_empty() {
        let _ = writeln!(
            &mut cmap,
            "1 beginbfrange\n<0000> <{:04X}> [",
            codepoints.len() - 1
        );
        for &codepoint in codepoints {
            cmap.push('<');
            match char::from_u32(codepoint) {
                Some(ch) => {
                    let mut units = [0u16; 2];
                    for unit in ch.encode_utf16(&mut units) {
                        let _ = write!(&mut cmap, "{:04X}", unit);
                    }
                }
                None => cmap.push_str("0000"),
            }
            cmap.push_str(">\n");
        }
        cmap.push_str("]\nendbfrange\n");
    }

    cmap.push_str(CMAP_FOOTER);
    cmap
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_indices_to_codepoints() {
        let cmap = generate_cmap(&[0x41, 0x42]);
        assert!(cmap.contains("begincmap"));
        assert!(cmap.contains("1 beginbfrange"));
        assert!(cmap.contains("<0000> <0001> ["));
        assert!(cmap.contains("<0041>"));
        assert!(cmap.contains("<0042>"));
        assert!(cmap.contains("endbfrange"));
        assert!(cmap.contains("endcmap"));
    }

    #[test]
    fn astral_codepoints_become_surrogate_pairs() {
        // U+1D11E MUSICAL SYMBOL G CLEF
        let cmap = generate_cmap(&[0x1D11E]);
        assert!(cmap.contains("<D834DD1E>"));
    }

    #[test]
    fn closure_only_glyphs_map_to_nul() {
        let cmap = generate_cmap(&[0x41, 0]);
        assert!(cmap.contains("<0000> <0001> ["));
        assert!(cmap.contains("<0000>\n"));
    }

    #[test]
    fn empty_subset_has_no_bfrange() {
        let cmap = generate_cmap(&[]);
        assert!(cmap.contains("begincmap"));
        assert!(!cmap.contains("beginbfrange"));
    }
}
