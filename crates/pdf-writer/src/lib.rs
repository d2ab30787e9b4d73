//! PDF 1.4 document writer.
//!
//! Assembles a single-file PDF with a classic cross-reference table:
//! numbered indirect objects, deflated content streams, a page tree, and
//! the resource graph for embedded subset fonts (CIDFontType2 under
//! Identity-H, with ToUnicode CMaps) and PNG-derived images.
//!
//! Compression is this workspace's own DEFLATE encoder (`flate-encoder`);
//! fonts come from `font-toolkit`, images from `png-import`.
//!
//! # Example
//!
//! ```no_run
//! use pdf_writer::{Document, DocumentConfig};
//!
//! let font_bytes = std::fs::read("font.ttf").unwrap();
//! let mut doc = Document::new(DocumentConfig::default());
//! doc.set_title("Example");
//! let font = doc.add_font("Example", &font_bytes).unwrap();
//! doc.new_page().unwrap();
//! doc.set_font(font, 12.0).unwrap();
//! doc.txt("Hello, world.").unwrap();
//! let pdf = doc.finish().unwrap();
//! std::fs::write("out.pdf", pdf).unwrap();
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod document;
mod fonts;
mod images;
pub mod objects;
mod page;

pub use document::{Document, FontId, ImageId};
pub use flate_encoder::DeflateOptions;

/// Writer failures.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error(transparent)]
    Deflate(#[from] flate_encoder::DeflateError),

    #[error(transparent)]
    Font(#[from] font_toolkit::TrueTypeError),

    #[error(transparent)]
    Subset(#[from] font_toolkit::SubsetError),

    #[error(transparent)]
    Image(#[from] png_import::PngError),

    #[error("sink write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("no font selected: call set_font before writing text")]
    NoFontSelected,
}

/// Common page sizes; dimensions in points (1/72 inch).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub enum PageSize {
    /// ISO A4: 210 x 297 mm.
    #[default]
    A4,
    /// US Letter: 8.5 x 11 in.
    Letter,
    /// US Legal: 8.5 x 14 in.
    Legal,
}

impl PageSize {
    /// `(width, height)` in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.276, 841.890),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
        }
    }
}

/// Page margins in points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    pub fn uniform(value: f64) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(36.0)
    }
}

/// Document-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    pub page_size: PageSize,
    pub margins: Margins,
    /// Deflate content streams and embedded data. Off is useful for
    /// debugging the raw object structure.
    pub compress: bool,
    /// Stretch wrapped lines to the full content width.
    pub justify: bool,
    /// Multiplier on the font's natural line height.
    pub line_spacing: f64,
    pub deflate_options: DeflateOptions,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            margins: Margins::default(),
            compress: true,
            justify: false,
            line_spacing: 1.0,
            deflate_options: DeflateOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_sizes_are_points() {
        assert_eq!(PageSize::Letter.dimensions(), (612.0, 792.0));
        let (w, h) = PageSize::A4.dimensions();
        assert!((w - 595.276).abs() < 1e-9);
        assert!((h - 841.890).abs() < 1e-9);
    }

    #[test]
    fn default_config_compresses() {
        let config = DocumentConfig::default();
        assert!(config.compress);
        assert!(!config.justify);
        assert_eq!(config.margins.top, 36.0);
    }
}
