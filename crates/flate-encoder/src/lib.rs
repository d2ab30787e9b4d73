//! DEFLATE (RFC 1951) encoder with optional zlib (RFC 1950) framing.
//!
//! Produces the `/FlateDecode` streams embedded in PDF output. Every block is
//! a dynamic-Huffman block: LZ77 back-references from a lazy hash-chain
//! matcher, canonical Huffman codes limited to 15 bits (7 for the code-length
//! alphabet) via package-merge, and a block planner that grows block
//! boundaries while merging is free.
//!
//! # Examples
//!
//! ```
//! // zlib-wrapped, as PDF's FlateDecode expects
//! let compressed = flate_encoder::compress(b"hello hello hello").unwrap();
//! assert_eq!(&compressed[..2], &[0x78, 0x9C]);
//! ```
//!
//! The optional two-thread mode splits matching and encoding:
//!
//! ```
//! use flate_encoder::DeflateOptions;
//!
//! let options = DeflateOptions {
//!     threaded: true,
//!     ..Default::default()
//! };
//! let compressed = flate_encoder::deflate(b"hello hello hello", &options).unwrap();
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod bit_sink;
mod block;
mod driver;
mod heap;
pub mod huffman;
pub mod matcher;

use bit_sink::BitSink;
use block::MatchSource;
use matcher::{MatchRecord, Matcher, RecordSink};

/// Encoder failures.
///
/// The encoder never produces invalid output on valid input; the only error
/// kind is an internal coding invariant that package-merge is supposed to
/// make unreachable.
#[derive(Debug, Error)]
pub enum DeflateError {
    /// A Huffman code length exceeded its limit even after package-merge.
    #[error("huffman code length {length} for symbol {symbol} exceeds limit {limit}")]
    CodeLengthOverflow { symbol: usize, length: u8, limit: u8 },
}

/// Encoder tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeflateOptions {
    /// Frame the stream per RFC 1950: `78 9C` header and a big-endian
    /// Adler-32 trailer. On for PDF `/FlateDecode`.
    pub zlib_wrapper: bool,
    /// Run the matcher on a second thread.
    pub threaded: bool,
    /// Initial candidate block size in input bytes; the planner doubles it
    /// while merging adjacent blocks costs nothing.
    pub start_block_size: usize,
    /// Shift a block boundary forward when the previous block's codes are
    /// cheaper for the first records of the next one.
    pub tune_boundaries: bool,
}

impl Default for DeflateOptions {
    fn default() -> Self {
        Self {
            zlib_wrapper: true,
            threaded: false,
            start_block_size: 4096,
            tune_boundaries: false,
        }
    }
}

/// Inputs below this size always encode on the calling thread.
const THREADING_THRESHOLD: usize = 4096;

/// Compresses `data` with default options (zlib-wrapped, single-threaded).
pub fn compress(data: &[u8]) -> Result<Vec<u8>, DeflateError> {
    deflate(data, &DeflateOptions::default())
}

/// Compresses `data` per `options`.
pub fn deflate(data: &[u8], options: &DeflateOptions) -> Result<Vec<u8>, DeflateError> {
    let mut sink = BitSink::new();
    if options.zlib_wrapper {
        sink.write_bits(8, 0x78);
        sink.write_bits(8, 0x9C);
    }

    if options.threaded && data.len() >= THREADING_THRESHOLD {
        driver::deflate_threaded(data, options, &mut sink)?;
    } else {
        let mut source = InlineSource::new(data);
        block::plan(data, options, &mut source, &mut sink)?;
    }

    if options.zlib_wrapper {
        sink.pad(8);
        for byte in adler32(data).to_be_bytes() {
            sink.write_bits(8, byte as u64);
        }
    }
    Ok(sink.into_bytes())
}

/// Adler-32 of `data` (RFC 1950 §8.2). `adler32(&[]) == 1`.
pub fn adler32(data: &[u8]) -> u32 {
    const MOD: u32 = 65521;
    // Largest chunk for which s2 cannot overflow 32 bits between reductions.
    const NMAX: usize = 5552;
    let mut s1: u32 = 1;
    let mut s2: u32 = 0;
    for chunk in data.chunks(NMAX) {
        for &byte in chunk {
            s1 += byte as u32;
            s2 += s1;
        }
        s1 %= MOD;
        s2 %= MOD;
    }
    (s2 << 16) | s1
}

/// Single-threaded match source: advances the matcher on the calling thread
/// exactly as far as the planner asks.
struct InlineSource<'a> {
    matcher: Matcher<'a>,
    pending: Vec<MatchRecord>,
}

impl<'a> InlineSource<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            matcher: Matcher::new(input),
            pending: Vec::new(),
        }
    }
}

struct VecSink<'v>(&'v mut Vec<MatchRecord>);

impl RecordSink for VecSink<'_> {
    fn save(&mut self, record: MatchRecord, _scanned: usize) {
        self.0.push(record);
    }

    fn finish(&mut self, _scanned: usize) {}
}

impl MatchSource for InlineSource<'_> {
    fn pull(&mut self, target: usize, out: &mut Vec<MatchRecord>) -> usize {
        self.matcher.advance(target, &mut VecSink(&mut self.pending));
        out.append(&mut self.pending);
        self.matcher.scanned()
    }
}
