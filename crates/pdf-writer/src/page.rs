//! Page content stream construction.
//!
//! A page accumulates its content-stream operators as text and remembers
//! which font and image resources it touched, so the page dictionary can
//! list exactly those in its `/Resources`.

use std::collections::BTreeSet;
use std::fmt::Write as FmtWrite;

use crate::objects::{fmt_num, ObjId};

#[derive(Debug, Default)]
pub(crate) struct Page {
    pub(crate) content: String,
    /// Type0 font object ids used on this page; the resource name is
    /// `/F<id>`.
    pub(crate) fonts: BTreeSet<u32>,
    /// Image XObject ids used on this page; the resource name is `/X<id>`.
    pub(crate) images: BTreeSet<u32>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    fn op(&mut self, text: &str) {
        self.content.push_str(text);
        self.content.push('\n');
    }

    // Graphics state

    pub fn save_state(&mut self) {
        self.op("q");
    }

    pub fn restore_state(&mut self) {
        self.op("Q");
    }

    pub fn concat_matrix(&mut self, m: [f64; 6]) {
        let _ = writeln!(
            self.content,
            "{} {} {} {} {} {} cm",
            fmt_num(m[0]),
            fmt_num(m[1]),
            fmt_num(m[2]),
            fmt_num(m[3]),
            fmt_num(m[4]),
            fmt_num(m[5]),
        );
    }

    // Path construction and painting

    pub fn move_to(&mut self, x: f64, y: f64) {
        let _ = writeln!(self.content, "{} {} m", fmt_num(x), fmt_num(y));
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        let _ = writeln!(self.content, "{} {} l", fmt_num(x), fmt_num(y));
    }

    pub fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x: f64, y: f64) {
        let _ = writeln!(
            self.content,
            "{} {} {} {} {} {} c",
            fmt_num(x1),
            fmt_num(y1),
            fmt_num(x2),
            fmt_num(y2),
            fmt_num(x),
            fmt_num(y),
        );
    }

    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let _ = writeln!(
            self.content,
            "{} {} {} {} re",
            fmt_num(x),
            fmt_num(y),
            fmt_num(width),
            fmt_num(height),
        );
    }

    pub fn stroke(&mut self) {
        self.op("S");
    }

    pub fn fill(&mut self) {
        self.op("f");
    }

    pub fn set_fill_color(&mut self, r: f64, g: f64, b: f64) {
        let _ = writeln!(
            self.content,
            "{} {} {} rg",
            fmt_num(r),
            fmt_num(g),
            fmt_num(b),
        );
    }

    // Text

    pub fn begin_text(&mut self) {
        self.op("BT");
    }

    pub fn end_text(&mut self) {
        self.op("ET");
    }

    pub fn set_font(&mut self, font_id: ObjId, size: f64) {
        self.fonts.insert(font_id.0);
        let _ = writeln!(self.content, "/F{} {} Tf", font_id.0, fmt_num(size));
    }

    pub fn set_char_spacing(&mut self, spacing: f64) {
        let _ = writeln!(self.content, "{} Tc", fmt_num(spacing));
    }

    pub fn set_rise(&mut self, rise: f64) {
        let _ = writeln!(self.content, "{} Ts", fmt_num(rise));
    }

    pub fn text_move(&mut self, dx: f64, dy: f64) {
        let _ = writeln!(self.content, "{} {} Td", fmt_num(dx), fmt_num(dy));
    }

    /// Shows glyphs by subset index, as a hex string of 2-byte CIDs.
    pub fn show_glyphs(&mut self, glyphs: &[u16]) {
        self.content.push('<');
        for &glyph in glyphs {
            let _ = write!(self.content, "{glyph:04X}");
        }
        self.op("> Tj");
    }

    /// Places an image XObject under a translation/scale matrix.
    pub fn draw_image(&mut self, image_id: ObjId, x: f64, y: f64, width: f64, height: f64) {
        self.images.insert(image_id.0);
        self.save_state();
        self.concat_matrix([width, 0.0, 0.0, height, x, y]);
        let _ = writeln!(self.content, "/X{} Do", image_id.0);
        self.restore_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_accumulate_in_order() {
        let mut page = Page::new();
        page.save_state();
        page.move_to(10.0, 20.0);
        page.line_to(30.0, 20.0);
        page.stroke();
        page.restore_state();
        assert_eq!(page.content, "q\n10 20 m\n30 20 l\nS\nQ\n");
    }

    #[test]
    fn glyphs_render_as_hex_cids() {
        let mut page = Page::new();
        page.show_glyphs(&[0, 1, 0x1234]);
        assert_eq!(page.content, "<000000011234> Tj\n");
    }

    #[test]
    fn font_use_is_tracked() {
        let mut page = Page::new();
        page.set_font(ObjId(7), 11.5);
        assert!(page.fonts.contains(&7));
        assert_eq!(page.content, "/F7 11.5 Tf\n");
    }

    #[test]
    fn image_placement_wraps_in_gsave() {
        let mut page = Page::new();
        page.draw_image(ObjId(9), 100.0, 200.0, 50.0, 25.0);
        assert_eq!(page.content, "q\n50 0 0 25 100 200 cm\n/X9 Do\nQ\n");
        assert!(page.images.contains(&9));
    }
}
