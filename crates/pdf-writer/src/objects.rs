//! Low-level PDF byte emission.
//!
//! An append-only output buffer plus the cross-reference bookkeeping:
//! allocating object ids, recording the byte offset of every `N 0 obj`
//! header, wrapping stream payloads (deflating them when compression is on),
//! and writing the classic xref table and trailer.

use flate_encoder::{deflate, DeflateOptions};

use crate::PdfError;

/// A 1-based indirect object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjId(pub u32);

impl std::fmt::Display for ObjId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} 0 R", self.0)
    }
}

/// Stream payload handed to [`ObjectWriter::put_stream`].
pub enum StreamPayload<'d> {
    /// Uncompressed bytes; deflated here when compression is enabled.
    Plain(&'d [u8]),
    /// Already-deflated bytes, embedded as-is with `/Filter/FlateDecode`.
    Deflated(&'d [u8]),
}

pub struct ObjectWriter {
    out: Vec<u8>,
    /// Byte offset of object `i + 1`'s header; 0 until the object is written.
    xref: Vec<u64>,
    compress: bool,
    deflate_options: DeflateOptions,
}

impl ObjectWriter {
    pub fn new(compress: bool, deflate_options: DeflateOptions) -> Self {
        // Header line plus a high-bit comment so transports treat the file
        // as binary.
        let mut out = Vec::with_capacity(4096);
        out.extend_from_slice(b"%PDF-1.4\n%\xC7\xEC\x8F\xA2\n");
        Self {
            out,
            xref: Vec::new(),
            compress,
            deflate_options,
        }
    }

    /// Reserves the next object id.
    pub fn alloc(&mut self) -> ObjId {
        self.xref.push(0);
        ObjId(self.xref.len() as u32)
    }

    /// Records the object's offset and writes its header line.
    pub fn start_obj(&mut self, id: ObjId) {
        debug_assert_eq!(self.xref[id.0 as usize - 1], 0, "object written twice");
        self.xref[id.0 as usize - 1] = self.out.len() as u64;
        self.push(&format!("{} 0 obj\n", id.0));
    }

    pub fn end_obj(&mut self) {
        self.push("\nendobj\n");
    }

    pub fn push(&mut self, text: &str) {
        self.out.extend_from_slice(text.as_bytes());
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }

    /// Writes a complete stream object at `id`. `extra` holds additional
    /// dictionary entries (`/Subtype/Image...`); `/Length` and `/Filter` are
    /// appended here.
    pub fn put_stream(
        &mut self,
        id: ObjId,
        extra: &str,
        payload: StreamPayload,
    ) -> Result<(), PdfError> {
        let owned;
        let (body, filtered): (&[u8], bool) = match payload {
            StreamPayload::Plain(data) if self.compress => {
                owned = deflate(data, &self.deflate_options)?;
                (&owned, true)
            }
            StreamPayload::Plain(data) => (data, false),
            StreamPayload::Deflated(data) => (data, true),
        };
        self.start_obj(id);
        self.push("<<");
        self.push(extra);
        if filtered {
            self.push("/Filter/FlateDecode");
        }
        self.push(&format!("/Length {}>>stream\n", body.len()));
        self.push_bytes(body);
        self.push("\nendstream");
        self.end_obj();
        Ok(())
    }

    /// Allocates an id and writes a stream object there.
    pub fn put_new_stream(
        &mut self,
        extra: &str,
        payload: StreamPayload,
    ) -> Result<ObjId, PdfError> {
        let id = self.alloc();
        self.put_stream(id, extra, payload)?;
        Ok(id)
    }

    pub fn compress(&self) -> bool {
        self.compress
    }

    pub fn deflate_options(&self) -> &DeflateOptions {
        &self.deflate_options
    }

    /// Writes the xref table and trailer and returns the finished file.
    pub fn finish(mut self, root: ObjId, info: ObjId) -> Vec<u8> {
        let startxref = self.out.len();
        let size = self.xref.len() + 1;
        self.push(&format!("xref\n0 {size}\n"));
        self.push("0000000000 65535 f \n");
        for i in 0..self.xref.len() {
            let offset = self.xref[i];
            self.push(&format!("{offset:010} 00000 n \n"));
        }
        self.push(&format!(
            "trailer\n<</Size {size}/Root {root}/Info {info}>>\nstartxref\n{startxref}\n%%EOF\n"
        ));
        self.out
    }
}

/// Serializes a text string per the PDF string rules: pure-ASCII text as a
/// literal string with `\\`, `\(`, `\)` and octal `\015` escapes; anything
/// else as UTF-16BE with a byte order mark, escaped the same way bytewise.
pub fn pdf_string(text: &str) -> Vec<u8> {
    let bytes: Vec<u8> = if text.is_ascii() {
        text.bytes().collect()
    } else {
        let mut utf16 = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            utf16.extend_from_slice(&unit.to_be_bytes());
        }
        utf16
    };

    let mut out = Vec::with_capacity(bytes.len() + 2);
    out.push(b'(');
    for byte in bytes {
        match byte {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'(' => out.extend_from_slice(b"\\("),
            b')' => out.extend_from_slice(b"\\)"),
            b'\r' => out.extend_from_slice(b"\\015"),
            other => out.push(other),
        }
    }
    out.push(b')');
    out
}

/// Formats a number the PDF way: no exponents, no trailing zeros.
pub fn fmt_num(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e12 {
        format!("{}", value as i64)
    } else {
        let text = format!("{value:.3}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
