//! PNG decoding into PDF-ready image streams.
//!
//! Accepts any PNG the format allows (grayscale, truecolour, palette, with
//! or without alpha, bit depths 1 to 16, Adam7 interlaced or not) and
//! produces what a PDF writer needs: base image samples with 1 or 3
//! components, an optional soft mask or colour key for transparency, a
//! colourspace synthesized from the colour chunks, and, when the coded data
//! can be reused as-is, the original deflated IDAT payload so the PDF reader
//! performs PNG's own filter inversion via `/DecodeParms`.
//!
//! Inflation of IDAT and iCCP payloads is delegated to `flate2`.
//!
//! # Example
//!
//! ```no_run
//! let data = std::fs::read("image.png").unwrap();
//! let image = png_import::decode_png(&data).unwrap();
//! println!("{}x{}, {} component(s)", image.width, image.height, image.components);
//! ```

use std::io::Read;

use flate2::read::ZlibDecoder;
use thiserror::Error;

pub mod chunks;
pub mod colorspace;
mod filter;
pub mod interlace;

use chunks::{Header, RawPng};
pub use colorspace::ColorSpace;

/// PNG decoding failures.
#[derive(Debug, Error)]
pub enum PngError {
    #[error("not a PNG: signature mismatch")]
    BadSignature,

    #[error("PNG data truncated at byte {offset}")]
    Truncated { offset: usize },

    #[error("unsupported colour type {color_type} with bit depth {bit_depth}")]
    UnsupportedFormat { color_type: u8, bit_depth: u8 },

    #[error("bad {chunk} chunk: {reason}")]
    BadChunk { chunk: &'static str, reason: String },

    #[error("IDAT decompression failed: {0}")]
    Inflate(String),

    #[error("pixel data ends early: needed {needed} bytes, got {got}")]
    PixelDataTruncated { needed: usize, got: usize },
}

/// Per-pixel transparency attached to an image.
#[derive(Debug, Clone)]
pub struct SoftMask {
    /// 8 for alpha masks, 1 for fully-on/fully-off palette masks.
    pub bits_per_component: u8,
    /// Packed mask rows, same dimensions as the image.
    pub data: Vec<u8>,
}

/// A decoded image, ready to become a PDF Image XObject.
#[derive(Debug, Clone)]
pub struct PngImage {
    pub width: u32,
    pub height: u32,
    /// 1 (gray or palette index) or 3 (RGB).
    pub components: u8,
    /// `min(bit_depth, 8)`; 16-bit sources are downshifted.
    pub bits_per_component: u8,
    /// Base image samples, alpha removed, packed at `bits_per_component`
    /// with byte-aligned rows.
    pub raw: Vec<u8>,
    /// The source's deflated IDAT payload, present when it can be embedded
    /// verbatim (not interlaced, not 16-bit, no alpha channel to strip).
    /// The PDF stream then carries `/DecodeParms` with `/Predictor 15`.
    pub verbatim_idat: Option<Vec<u8>>,
    pub color_space: ColorSpace,
    /// Soft mask from an alpha channel or fractional palette transparency.
    pub smask: Option<SoftMask>,
    /// 1-bit stencil from fully-on/off palette transparency; bit 1 marks a
    /// masked (transparent) pixel.
    pub stencil: Option<SoftMask>,
    /// Colour-key transparency values from tRNS on gray/truecolour images,
    /// one value per component in output sample space.
    pub color_key: Option<Vec<u16>>,
    /// Pixel density from pHYs, dots per inch.
    pub dpi: Option<(f64, f64)>,
}

/// Decodes a complete PNG file.
pub fn decode_png(data: &[u8]) -> Result<PngImage, PngError> {
    let raw = chunks::parse(data)?;
    let header = raw.header;

    let total_samples = header.width as u64 * header.height as u64 * header.channels() as u64;
    if total_samples > (1 << 31) {
        return Err(PngError::BadChunk {
            chunk: "IHDR",
            reason: format!("image too large: {}x{}", header.width, header.height),
        });
    }

    let mut inflated = Vec::new();
    ZlibDecoder::new(&raw.idat[..])
        .read_to_end(&mut inflated)
        .map_err(|e| PngError::Inflate(e.to_string()))?;

    let samples = decode_samples(&header, &inflated)?;

    let base_channels: usize = match header.color_type {
        2 | 6 => 3,
        _ => 1,
    };
    let bits_out = header.bit_depth.min(8);
    let raw_rows = pack_base_samples(&header, &samples, base_channels, bits_out);

    let smask = alpha_soft_mask(&header, &samples)
        .or_else(|| palette_soft_mask(&header, &raw, &samples));
    let stencil = palette_stencil(&header, &raw, &samples);
    let color_key = color_key_values(&header, &raw);

    let verbatim = header.interlace == 0
        && header.bit_depth <= 8
        && matches!(header.color_type, 0 | 2 | 3);

    let gray = matches!(header.color_type, 0 | 4);
    let gamma = if raw.srgb { Some(45455) } else { raw.gamma };
    let chromaticities = if raw.srgb {
        Some(colorspace::SRGB_CHROMATICITIES)
    } else {
        raw.chromaticities
    };
    let color_space = if header.color_type == 3 {
        let base = colorspace::select(false, gamma, chromaticities, raw.icc_profile.clone());
        ColorSpace::Indexed {
            base: Box::new(base),
            palette: raw.palette.clone().unwrap_or_default(),
        }
    } else {
        colorspace::select(gray, gamma, chromaticities, raw.icc_profile.clone())
    };

    Ok(PngImage {
        width: header.width,
        height: header.height,
        components: base_channels as u8,
        bits_per_component: bits_out,
        raw: raw_rows,
        verbatim_idat: verbatim.then_some(raw.idat),
        color_space,
        smask,
        stencil,
        color_key,
        dpi: raw.density.and_then(|d| d.dpi()),
    })
}

/// Reconstructs filters (and de-interlaces) into one byte per channel
/// sample, row-major; 16-bit samples are downshifted to their high byte.
fn decode_samples(header: &Header, inflated: &[u8]) -> Result<Vec<u8>, PngError> {
    let channels = header.channels();
    let mut samples = vec![0u8; header.width as usize * header.height as usize * channels];
    let mut offset = 0usize;

    if header.interlace == 0 {
        decode_pass(
            header,
            inflated,
            &mut offset,
            header.width,
            header.height,
            |x, y| (y as usize * header.width as usize + x as usize) * channels,
            &mut samples,
        )?;
    } else {
        for pass in 0..7 {
            let (pass_width, pass_height) = interlace::pass_size(pass, header.width, header.height);
            if pass_width == 0 || pass_height == 0 {
                continue;
            }
            let (x0, y0, dx, dy) = interlace::ADAM7[pass];
            decode_pass(
                header,
                inflated,
                &mut offset,
                pass_width,
                pass_height,
                |x, y| {
                    let image_x = x0 as usize + x as usize * dx as usize;
                    let image_y = y0 as usize + y as usize * dy as usize;
                    (image_y * header.width as usize + image_x) * channels
                },
                &mut samples,
            )?;
        }
    }
    Ok(samples)
}

/// Decodes one (sub-)image: per row, a filter byte and the packed row, then
/// sample extraction into `samples` at the index `place` computes.
fn decode_pass(
    header: &Header,
    inflated: &[u8],
    offset: &mut usize,
    pass_width: u32,
    pass_height: u32,
    place: impl Fn(u32, u32) -> usize,
    samples: &mut [u8],
) -> Result<(), PngError> {
    let channels = header.channels();
    let depth = header.bit_depth as usize;
    let row_bytes = header.row_bytes(pass_width);
    let step = header.filter_step();

    let mut prev = vec![0u8; row_bytes];
    let mut row = vec![0u8; row_bytes];
    for y in 0..pass_height {
        let needed = *offset + 1 + row_bytes;
        if needed > inflated.len() {
            return Err(PngError::PixelDataTruncated {
                needed,
                got: inflated.len(),
            });
        }
        let filter_type = inflated[*offset];
        row.copy_from_slice(&inflated[*offset + 1..needed]);
        *offset = needed;
        filter::reconstruct_row(filter_type, &mut row, &prev, step)?;

        for x in 0..pass_width {
            let base = place(x, y);
            for c in 0..channels {
                let index = x as usize * channels + c;
                samples[base + c] = match depth {
                    8 => row[index],
                    16 => row[index * 2],
                    d => {
                        let bit = index * d;
                        let shift = 8 - d - (bit % 8);
                        (row[bit / 8] >> shift) & ((1 << d) - 1)
                    }
                };
            }
        }
        std::mem::swap(&mut prev, &mut row);
    }
    Ok(())
}

/// Packs the base (non-alpha) channels back into byte-aligned rows at the
/// output bit depth.
fn pack_base_samples(
    header: &Header,
    samples: &[u8],
    base_channels: usize,
    bits_out: u8,
) -> Vec<u8> {
    let width = header.width as usize;
    let height = header.height as usize;
    let channels = header.channels();
    let out_row_bits = width * base_channels * bits_out as usize;
    let out_row_bytes = (out_row_bits + 7) / 8;
    let mut out = vec![0u8; out_row_bytes * height];

    for y in 0..height {
        let row_out = &mut out[y * out_row_bytes..(y + 1) * out_row_bytes];
        let mut bit = 0usize;
        for x in 0..width {
            let base = (y * width + x) * channels;
            for c in 0..base_channels {
                let value = samples[base + c];
                if bits_out == 8 {
                    row_out[bit / 8] = value;
                    bit += 8;
                } else {
                    let shift = 8 - bits_out as usize - (bit % 8);
                    row_out[bit / 8] |= (value & ((1 << bits_out) - 1)) << shift;
                    bit += bits_out as usize;
                }
            }
        }
    }
    out
}

/// 8-bit soft mask from the alpha channel of colour types 4 and 6.
fn alpha_soft_mask(header: &Header, samples: &[u8]) -> Option<SoftMask> {
    if !header.has_alpha_channel() {
        return None;
    }
    let channels = header.channels();
    let alpha_at = channels - 1;
    let data = samples
        .chunks_exact(channels)
        .map(|pixel| pixel[alpha_at])
        .collect();
    Some(SoftMask {
        bits_per_component: 8,
        data,
    })
}

/// Palette alpha table: tRNS entries padded with opaque.
fn palette_alphas<'r>(header: &Header, raw: &'r RawPng) -> Option<&'r [u8]> {
    (header.color_type == 3)
        .then_some(raw.transparency.as_deref())
        .flatten()
}

/// 8-bit soft mask for palette transparency with fractional alpha entries.
fn palette_soft_mask(header: &Header, raw: &RawPng, samples: &[u8]) -> Option<SoftMask> {
    let alphas = palette_alphas(header, raw)?;
    if alphas.iter().all(|&a| a == 0 || a == 255) {
        return None;
    }
    let data = samples
        .iter()
        .map(|&index| alphas.get(index as usize).copied().unwrap_or(255))
        .collect();
    Some(SoftMask {
        bits_per_component: 8,
        data,
    })
}

/// 1-bit stencil for palette transparency that is all-or-nothing.
fn palette_stencil(header: &Header, raw: &RawPng, samples: &[u8]) -> Option<SoftMask> {
    let alphas = palette_alphas(header, raw)?;
    if !alphas.iter().all(|&a| a == 0 || a == 255) || !alphas.contains(&0) {
        return None;
    }
    let width = header.width as usize;
    let row_bytes = (width + 7) / 8;
    let mut data = vec![0u8; row_bytes * header.height as usize];
    for (i, &index) in samples.iter().enumerate() {
        if alphas.get(index as usize).copied().unwrap_or(255) == 0 {
            let (x, y) = (i % width, i / width);
            data[y * row_bytes + x / 8] |= 0x80 >> (x % 8);
        }
    }
    Some(SoftMask {
        bits_per_component: 1,
        data,
    })
}

/// Colour-key values from tRNS on gray (type 0) and truecolour (type 2)
/// images, converted to output sample space.
fn color_key_values(header: &Header, raw: &RawPng) -> Option<Vec<u16>> {
    if !matches!(header.color_type, 0 | 2) {
        return None;
    }
    let trns = raw.transparency.as_deref()?;
    let count = if header.color_type == 0 { 1 } else { 3 };
    if trns.len() < count * 2 {
        return None;
    }
    let values = (0..count)
        .map(|i| {
            let value = u16::from_be_bytes([trns[i * 2], trns[i * 2 + 1]]);
            if header.bit_depth == 16 {
                value >> 8
            } else {
                value
            }
        })
        .collect();
    Some(values)
}
