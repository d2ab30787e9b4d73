//! Font processing toolkit for PDF generation.
//!
//! Reads TrueType fonts, reduces them to the glyphs a document actually
//! uses, and produces the pieces a PDF embedder needs:
//!
//! ## `truetype`
//! Table-directory and glyph parsing: `cmap` (formats 4/6/12), `glyf`/`loca`,
//! `hmtx`, `head`, `hhea`, `maxp`, `OS/2`. Composite glyphs are walked
//! recursively with a bounded nesting depth.
//!
//! ## `subsetter`
//! Emits a valid reduced font (glyf, head, hhea, hmtx, loca, maxp) with
//! hinting instructions stripped, composite component indices rewritten, and
//! checksums recomputed, `head.checkSumAdjustment` included.
//!
//! ## `to_unicode`
//! Generates the ToUnicode CMap mapping subset indices back to Unicode so
//! text extraction works on the embedded subset.
//!
//! # Example
//!
//! ```no_run
//! use font_toolkit::{FontFile, Subsetter};
//!
//! let data = std::fs::read("font.ttf").unwrap();
//! let font = FontFile::parse(&data).unwrap();
//! let mut subsetter = Subsetter::new();
//! for ch in "Hello".chars() {
//!     subsetter.map_codepoint(&font, ch as u32);
//! }
//! let subset = subsetter.write(&font).unwrap();
//! assert!(subset.bytes.len() < data.len());
//! ```

pub mod subsetter;
pub mod to_unicode;
pub mod truetype;

pub use subsetter::{SubsetError, SubsetFont, Subsetter};
pub use to_unicode::generate_cmap;
pub use truetype::{FontFile, Glyph, GlyphStats, TrueTypeError};
