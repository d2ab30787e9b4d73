//! In-memory PNG fixtures.
//!
//! Chunk CRCs are written as zeros; the decoder ignores them.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

pub const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

pub fn chunk(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 12);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out.extend_from_slice(&[0u8; 4]); // CRC, unchecked
    out
}

pub fn ihdr(width: u32, height: u32, bit_depth: u8, color_type: u8, interlace: u8) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&width.to_be_bytes());
    body.extend_from_slice(&height.to_be_bytes());
    body.push(bit_depth);
    body.push(color_type);
    body.push(0); // compression
    body.push(0); // filter method
    body.push(interlace);
    chunk(b"IHDR", &body)
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Forward filter, the encoder-side inverse of reconstruction.
pub fn filter_row(filter: u8, raw: &[u8], prev: &[u8], step: usize) -> Vec<u8> {
    fn paeth(left: u8, up: u8, upper_left: u8) -> u8 {
        let p = left as i16 + up as i16 - upper_left as i16;
        let pa = (p - left as i16).abs();
        let pb = (p - up as i16).abs();
        let pc = (p - upper_left as i16).abs();
        if pa <= pb && pa <= pc {
            left
        } else if pb <= pc {
            up
        } else {
            upper_left
        }
    }
    let mut out = Vec::with_capacity(raw.len() + 1);
    out.push(filter);
    for i in 0..raw.len() {
        let left = if i >= step { raw[i - step] } else { 0 };
        let up = prev[i];
        let upper_left = if i >= step { prev[i - step] } else { 0 };
        let predictor = match filter {
            0 => 0,
            1 => left,
            2 => up,
            3 => (((left as u16) + (up as u16)) / 2) as u8,
            4 => paeth(left, up, upper_left),
            _ => panic!("bad filter {filter}"),
        };
        out.push(raw[i].wrapping_sub(predictor));
    }
    out
}

/// Serializes rows (packed, without filter bytes) into a filtered and
/// deflated IDAT body, one filter type per row.
pub fn idat_from_rows(rows: &[&[u8]], filters: &[u8], step: usize) -> Vec<u8> {
    assert_eq!(rows.len(), filters.len());
    let mut filtered = Vec::new();
    let mut prev = vec![0u8; rows.first().map_or(0, |r| r.len())];
    for (row, &filter) in rows.iter().zip(filters) {
        filtered.extend_from_slice(&filter_row(filter, row, &prev, step));
        prev = row.to_vec();
    }
    deflate(&filtered)
}

/// Assembles a complete PNG file: signature, IHDR, extra chunks, IDAT, IEND.
pub fn png_file(
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
    interlace: u8,
    extra_chunks: &[Vec<u8>],
    idat_body: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&SIGNATURE);
    out.extend_from_slice(&ihdr(width, height, bit_depth, color_type, interlace));
    for extra in extra_chunks {
        out.extend_from_slice(extra);
    }
    out.extend_from_slice(&chunk(b"IDAT", idat_body));
    out.extend_from_slice(&chunk(b"IEND", &[]));
    out
}

/// Non-interlaced file from unfiltered rows, filter type 0 everywhere.
pub fn simple_png(
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
    rows: &[&[u8]],
    extra_chunks: &[Vec<u8>],
) -> Vec<u8> {
    let filters = vec![0u8; rows.len()];
    let body = idat_from_rows(rows, &filters, 1);
    png_file(width, height, bit_depth, color_type, 0, extra_chunks, &body)
}
