//! Document assembly: pages, text flow, resources, finalization.
//!
//! Text is laid out through a word/line buffer: characters accumulate into a
//! word, words commit to the current line with a wrap check against the
//! content width, and a finished line is written to the page content stream
//! as one `BT`/`ET` block with `Td` positioning per word. Full justification
//! distributes the residual line width across the inter-word gaps.
//!
//! Fonts are deferred objects: a Type0 id is allocated when the font is
//! added so pages can reference it, but the five font objects are only
//! written at `finish`, once every glyph the document needs has been mapped.

use std::io::Write;

use font_toolkit::{FontFile, Subsetter};
use png_import::decode_png;

use crate::fonts::{sanitize_name, FontResource};
use crate::images::ImageResource;
use crate::objects::{fmt_num, pdf_string, ObjId, ObjectWriter, StreamPayload};
use crate::page::Page;
use crate::{DocumentConfig, PdfError};

/// Handle to a font added to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontId(usize);

/// Handle to an image added to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageId(usize);

/// Current text attributes; captured into each word as it is built.
#[derive(Debug, Clone)]
struct TextState {
    font: Option<usize>,
    size: f64,
    color: [f64; 3],
    char_spacing: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 12.0,
            color: [0.0, 0.0, 0.0],
            char_spacing: 0.0,
            rise: 0.0,
        }
    }
}

/// One word staged for the current line.
#[derive(Debug, Clone)]
struct Word {
    type0: ObjId,
    size: f64,
    color: [f64; 3],
    char_spacing: f64,
    rise: f64,
    glyphs: Vec<u16>,
    width: f64,
    /// Inter-word gap preceding this word, 0 at a line start.
    gap_before: f64,
    ascent: f64,
    line_height: f64,
}

/// A PDF document under construction. Borrows the caller's font bytes.
pub struct Document<'a> {
    writer: ObjectWriter,
    config: DocumentConfig,
    title: Option<String>,
    pages: Vec<Page>,
    fonts: Vec<FontResource<'a>>,
    images: Vec<ImageResource>,
    state: TextState,
    pending: Option<Word>,
    pending_gap: f64,
    line: Vec<Word>,
    line_width: f64,
    /// Top of the next text line, in page coordinates.
    cursor_top: f64,
}

impl<'a> Document<'a> {
    pub fn new(config: DocumentConfig) -> Self {
        let writer = ObjectWriter::new(config.compress, config.deflate_options.clone());
        let cursor_top = config.page_size.dimensions().1 - config.margins.top;
        Self {
            writer,
            config,
            title: None,
            pages: Vec::new(),
            fonts: Vec::new(),
            images: Vec::new(),
            state: TextState::default(),
            pending: None,
            pending_gap: 0.0,
            line: Vec::new(),
            line_width: 0.0,
            cursor_top,
        }
    }

    /// Document title for the /Info dictionary.
    pub fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_string());
    }

    /// Registers a TrueType font. The bytes must outlive the document.
    pub fn add_font(&mut self, name: &str, data: &'a [u8]) -> Result<FontId, PdfError> {
        let font = FontFile::parse(data)?;
        let type0_id = self.writer.alloc();
        let index = self.fonts.len();
        self.fonts.push(FontResource {
            font,
            subsetter: Subsetter::new(),
            name: sanitize_name(name),
            type0_id,
            index,
        });
        Ok(FontId(index))
    }

    /// Decodes and registers a PNG image.
    pub fn add_image(&mut self, data: &[u8]) -> Result<ImageId, PdfError> {
        let image = decode_png(data)?;
        let id = self.writer.alloc();
        let index = self.images.len();
        self.images.push(ImageResource { image, id });
        Ok(ImageId(index))
    }

    /// Natural display size of an image in points, from its pixel density.
    pub fn image_display_size(&self, image: ImageId) -> (f64, f64) {
        self.images[image.0].display_size()
    }

    // Text state

    pub fn set_font(&mut self, font: FontId, size: f64) -> Result<(), PdfError> {
        self.commit_word()?;
        self.state.font = Some(font.0);
        self.state.size = size;
        Ok(())
    }

    pub fn set_color(&mut self, r: f64, g: f64, b: f64) -> Result<(), PdfError> {
        self.commit_word()?;
        self.state.color = [r, g, b];
        Ok(())
    }

    pub fn set_char_spacing(&mut self, spacing: f64) -> Result<(), PdfError> {
        self.commit_word()?;
        self.state.char_spacing = spacing;
        Ok(())
    }

    /// Raises subsequent text by `fraction` of the current size (negative
    /// for subscripts); 0 restores the baseline.
    pub fn set_superscript(&mut self, fraction: f64) -> Result<(), PdfError> {
        self.commit_word()?;
        self.state.rise = self.state.size * fraction;
        Ok(())
    }

    /// Flows text onto the page, wrapping at the content width. `\n` forces
    /// a line break.
    pub fn txt(&mut self, text: &str) -> Result<(), PdfError> {
        let font_index = self.state.font.ok_or(PdfError::NoFontSelected)?;
        for ch in text.chars() {
            if ch == '\n' {
                self.new_line()?;
                continue;
            }
            if ch.is_whitespace() {
                self.commit_word()?;
                let advance = self.fonts[font_index].measure_char(ch as u32);
                self.pending_gap += self.scaled(font_index, advance);
                continue;
            }
            self.push_char(font_index, ch)?;
        }
        Ok(())
    }

    /// Ends the current line without justification.
    pub fn new_line(&mut self) -> Result<(), PdfError> {
        self.commit_word()?;
        self.flush_line(false)
    }

    /// Ends the current line and starts a fresh page.
    pub fn new_page(&mut self) -> Result<(), PdfError> {
        self.commit_word()?;
        if !self.line.is_empty() {
            self.flush_line(false)?;
        }
        self.push_page();
        Ok(())
    }

    // Graphics on the current page

    pub fn save_graphics(&mut self) {
        self.page_mut().save_state();
    }

    pub fn restore_graphics(&mut self) {
        self.page_mut().restore_state();
    }

    pub fn concat_matrix(&mut self, matrix: [f64; 6]) {
        self.page_mut().concat_matrix(matrix);
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.page_mut().move_to(x, y);
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.page_mut().line_to(x, y);
    }

    pub fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x: f64, y: f64) {
        self.page_mut().curve_to(x1, y1, x2, y2, x, y);
    }

    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.page_mut().rect(x, y, width, height);
    }

    pub fn stroke(&mut self) {
        self.page_mut().stroke();
    }

    pub fn fill(&mut self) {
        self.page_mut().fill();
    }

    pub fn set_fill_color(&mut self, r: f64, g: f64, b: f64) {
        self.page_mut().set_fill_color(r, g, b);
    }

    /// Draws an image at `(x, y)` (lower-left corner) scaled to the given
    /// size in points.
    pub fn draw_image(&mut self, image: ImageId, x: f64, y: f64, width: f64, height: f64) {
        let id = self.images[image.0].id;
        self.page_mut().draw_image(id, x, y, width, height);
    }

    /// Finalizes the document and returns the complete file.
    pub fn finish(mut self) -> Result<Vec<u8>, PdfError> {
        self.commit_word()?;
        if !self.line.is_empty() || self.pending.is_some() {
            self.flush_line(false)?;
        }
        if self.pages.is_empty() {
            self.push_page();
        }

        let (page_width, page_height) = self.config.page_size.dimensions();
        let pages_root = self.writer.alloc();

        let mut kids = Vec::with_capacity(self.pages.len());
        let pages = std::mem::take(&mut self.pages);
        for page in &pages {
            let content_id = self
                .writer
                .put_new_stream("", StreamPayload::Plain(page.content.as_bytes()))?;
            let page_id = self.writer.alloc();
            self.writer.start_obj(page_id);
            let mut dict = format!(
                "<</Type/Page/Parent {pages_root}/MediaBox[0 0 {} {}]/Contents {content_id}",
                fmt_num(page_width),
                fmt_num(page_height),
            );
            dict.push_str("/Resources<<");
            if !page.fonts.is_empty() {
                dict.push_str("/Font<<");
                for id in &page.fonts {
                    dict.push_str(&format!("/F{id} {id} 0 R"));
                }
                dict.push_str(">>");
            }
            if !page.images.is_empty() {
                dict.push_str("/XObject<<");
                for id in &page.images {
                    dict.push_str(&format!("/X{id} {id} 0 R"));
                }
                dict.push_str(">>");
            }
            dict.push_str(">>>>");
            self.writer.push(&dict);
            self.writer.end_obj();
            kids.push(page_id);
        }

        self.writer.start_obj(pages_root);
        let kid_refs: Vec<String> = kids.iter().map(|id| id.to_string()).collect();
        self.writer.push(&format!(
            "<</Type/Pages/Kids[{}]/Count {}>>",
            kid_refs.join(" "),
            kids.len(),
        ));
        self.writer.end_obj();

        let catalog = self.writer.alloc();
        self.writer.start_obj(catalog);
        self.writer.push(&format!("<</Type/Catalog/Pages {pages_root}>>"));
        self.writer.end_obj();

        // /Info is always written; an absent title defaults rather than
        // leaving a dangling reference.
        let info = self.writer.alloc();
        self.writer.start_obj(info);
        self.writer.push("<</Title ");
        let title = self.title.as_deref().unwrap_or("Untitled");
        self.writer.push_bytes(&pdf_string(title));
        self.writer.push(">>");
        self.writer.end_obj();

        // Deferred objects drain in allocation order: fonts, then images.
        let mut fonts = std::mem::take(&mut self.fonts);
        for font in &mut fonts {
            font.write_objects(&mut self.writer)?;
        }
        let images = std::mem::take(&mut self.images);
        for image in &images {
            image.write_objects(&mut self.writer)?;
        }

        Ok(self.writer.finish(catalog, info))
    }

    /// Finalizes the document into a sink.
    pub fn write_to<W: Write>(self, mut sink: W) -> Result<(), PdfError> {
        let bytes = self.finish()?;
        sink.write_all(&bytes)?;
        Ok(())
    }

    // Internals

    fn content_width(&self) -> f64 {
        let (page_width, _) = self.config.page_size.dimensions();
        page_width - self.config.margins.left - self.config.margins.right
    }

    fn scaled(&self, font_index: usize, advance: u16) -> f64 {
        let units = self.fonts[font_index].font.units_per_em.max(1) as f64;
        advance as f64 * self.state.size / units
    }

    fn push_char(&mut self, font_index: usize, ch: char) -> Result<(), PdfError> {
        if self.pending.is_none() {
            let resource = &self.fonts[font_index];
            self.pending = Some(Word {
                type0: resource.type0_id,
                size: self.state.size,
                color: self.state.color,
                char_spacing: self.state.char_spacing,
                rise: self.state.rise,
                glyphs: Vec::new(),
                width: 0.0,
                gap_before: std::mem::take(&mut self.pending_gap),
                ascent: resource.ascent(self.state.size),
                line_height: resource.line_height(self.state.size) * self.config.line_spacing,
            });
        }
        let (glyph, advance) = self.fonts[font_index].map_char(ch as u32);
        let advance = self.scaled(font_index, advance) + self.state.char_spacing;
        let word = self.pending.as_mut().expect("just ensured");
        word.glyphs.push(glyph);
        word.width += advance;
        Ok(())
    }

    /// Moves the pending word onto the line, wrapping first if it does not
    /// fit.
    fn commit_word(&mut self) -> Result<(), PdfError> {
        let Some(mut word) = self.pending.take() else {
            return Ok(());
        };
        if self.line.is_empty() {
            word.gap_before = 0.0;
        }
        let needed = self.line_width + word.gap_before + word.width;
        if !self.line.is_empty() && needed > self.content_width() {
            self.flush_line(self.config.justify)?;
            word.gap_before = 0.0;
        }
        self.line_width += word.gap_before + word.width;
        self.line.push(word);
        Ok(())
    }

    /// Emits the buffered line as one BT/ET block and advances the cursor.
    fn flush_line(&mut self, justified: bool) -> Result<(), PdfError> {
        if self.pages.is_empty() {
            self.push_page();
        }
        self.pending_gap = 0.0;

        if self.line.is_empty() {
            // Blank line: advance by the current nominal size.
            self.cursor_top -= self.state.size * self.config.line_spacing;
            return Ok(());
        }

        let line_ascent = self
            .line
            .iter()
            .map(|w| w.ascent)
            .fold(f64::MIN, f64::max);
        let line_height = self
            .line
            .iter()
            .map(|w| w.line_height)
            .fold(f64::MIN, f64::max);

        let mut baseline = self.cursor_top - line_ascent;
        if baseline < self.config.margins.bottom {
            self.push_page();
            baseline = self.cursor_top - line_ascent;
        }

        let gaps = self.line.iter().filter(|w| w.gap_before > 0.0).count();
        let extra = if justified && gaps > 0 {
            ((self.content_width() - self.line_width) / gaps as f64).max(0.0)
        } else {
            0.0
        };

        let line = std::mem::take(&mut self.line);
        let left = self.config.margins.left;
        let page = self.pages.last_mut().expect("page ensured above");
        page.begin_text();
        let mut emitted_font: Option<(ObjId, f64)> = None;
        let mut emitted_color: Option<[f64; 3]> = None;
        let mut emitted_spacing = 0.0f64;
        let mut emitted_rise = 0.0f64;
        let mut pen_x = left;
        let mut previous_start = (0.0f64, 0.0f64);
        for (i, word) in line.iter().enumerate() {
            if emitted_font != Some((word.type0, word.size)) {
                page.set_font(word.type0, word.size);
                emitted_font = Some((word.type0, word.size));
            }
            if emitted_color != Some(word.color) {
                page.set_fill_color(word.color[0], word.color[1], word.color[2]);
                emitted_color = Some(word.color);
            }
            if word.char_spacing != emitted_spacing {
                page.set_char_spacing(word.char_spacing);
                emitted_spacing = word.char_spacing;
            }
            if word.rise != emitted_rise {
                page.set_rise(word.rise);
                emitted_rise = word.rise;
            }
            let mut start_x = pen_x + word.gap_before;
            if word.gap_before > 0.0 {
                start_x += extra;
            }
            if i == 0 {
                page.text_move(start_x, baseline);
            } else {
                page.text_move(start_x - previous_start.0, 0.0);
            }
            page.show_glyphs(&word.glyphs);
            previous_start = (start_x, baseline);
            pen_x = start_x + word.width;
        }
        page.end_text();

        self.line_width = 0.0;
        self.cursor_top -= line_height;
        Ok(())
    }

    fn push_page(&mut self) {
        self.pages.push(Page::new());
        let (_, page_height) = self.config.page_size.dimensions();
        self.cursor_top = page_height - self.config.margins.top;
    }

    fn page_mut(&mut self) -> &mut Page {
        if self.pages.is_empty() {
            self.push_page();
        }
        self.pages.last_mut().expect("just ensured")
    }
}
