//! PNG chunk stream parsing.
//!
//! Walks the chunk sequence after the 8-byte signature and collects
//! everything later stages need: IHDR fields, concatenated IDAT payload,
//! palette, transparency, and the ancillary colour chunks (gAMA, cHRM, sRGB,
//! iCCP, pHYs). Chunk CRCs are not verified.
//!
//! Reference: <https://www.w3.org/TR/png-3/>

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::PngError;

/// PNG file signature.
pub const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// IHDR fields.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
    pub interlace: u8,
}

impl Header {
    /// Samples per pixel in the coded image.
    pub fn channels(&self) -> usize {
        match self.color_type {
            0 | 3 => 1,
            4 => 2,
            2 => 3,
            _ => 4,
        }
    }

    pub fn has_alpha_channel(&self) -> bool {
        self.color_type == 4 || self.color_type == 6
    }

    /// Filter delta distance in bytes: whole pixels, at least one byte.
    pub fn filter_step(&self) -> usize {
        ((self.channels() * self.bit_depth as usize) / 8).max(1)
    }

    /// Packed bytes per row for a given pixel count.
    pub fn row_bytes(&self, width: u32) -> usize {
        (width as usize * self.channels() * self.bit_depth as usize + 7) / 8
    }
}

/// Physical pixel density from pHYs.
#[derive(Debug, Clone, Copy)]
pub struct Density {
    pub x_per_meter: u32,
    pub y_per_meter: u32,
    pub in_meters: bool,
}

impl Density {
    /// Dots per inch, when the chunk used an absolute unit.
    pub fn dpi(&self) -> Option<(f64, f64)> {
        if !self.in_meters || self.x_per_meter == 0 || self.y_per_meter == 0 {
            return None;
        }
        Some((
            self.x_per_meter as f64 * 0.0254,
            self.y_per_meter as f64 * 0.0254,
        ))
    }
}

/// Everything gathered from one pass over the chunk stream.
pub struct RawPng {
    pub header: Header,
    /// Concatenated (still deflated) IDAT payload.
    pub idat: Vec<u8>,
    /// PLTE entries as RGB triples.
    pub palette: Option<Vec<u8>>,
    /// tRNS payload, meaning depends on the colour type.
    pub transparency: Option<Vec<u8>>,
    /// gAMA value, gamma x 100000.
    pub gamma: Option<u32>,
    /// cHRM values x 100000: wx, wy, rx, ry, gx, gy, bx, by.
    pub chromaticities: Option<[u32; 8]>,
    pub srgb: bool,
    /// Inflated ICC profile from iCCP.
    pub icc_profile: Option<Vec<u8>>,
    pub density: Option<Density>,
}

fn be_u32(data: &[u8], offset: usize) -> Result<u32, PngError> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(PngError::Truncated { offset })
}

/// Valid bit depths per colour type.
fn depth_valid(color_type: u8, bit_depth: u8) -> bool {
    match color_type {
        0 => matches!(bit_depth, 1 | 2 | 4 | 8 | 16),
        3 => matches!(bit_depth, 1 | 2 | 4 | 8),
        2 | 4 | 6 => matches!(bit_depth, 8 | 16),
        _ => false,
    }
}

/// Parses the signature and every chunk up to IEND.
pub fn parse(data: &[u8]) -> Result<RawPng, PngError> {
    if data.len() < 8 || data[..8] != SIGNATURE {
        return Err(PngError::BadSignature);
    }

    let mut header: Option<Header> = None;
    let mut idat: Vec<u8> = Vec::new();
    let mut palette = None;
    let mut transparency = None;
    let mut gamma = None;
    let mut chromaticities = None;
    let mut srgb = false;
    let mut icc_profile = None;
    let mut density = None;

    let mut offset = 8;
    while offset + 8 <= data.len() {
        let length = be_u32(data, offset)? as usize;
        let kind: [u8; 4] = data[offset + 4..offset + 8].try_into().expect("4 bytes");
        let body_start = offset + 8;
        let body = data
            .get(body_start..body_start + length)
            .ok_or(PngError::Truncated { offset: body_start })?;
        // Skip the CRC without verifying it.
        offset = body_start + length + 4;
        if offset > data.len() {
            return Err(PngError::Truncated { offset: data.len() });
        }

        match &kind {
            b"IHDR" => {
                if body.len() < 13 {
                    return Err(PngError::BadChunk {
                        chunk: "IHDR",
                        reason: format!("{} bytes, expected 13", body.len()),
                    });
                }
                let parsed = Header {
                    width: be_u32(body, 0)?,
                    height: be_u32(body, 4)?,
                    bit_depth: body[8],
                    color_type: body[9],
                    interlace: body[12],
                };
                if parsed.width == 0 || parsed.height == 0 {
                    return Err(PngError::BadChunk {
                        chunk: "IHDR",
                        reason: format!("zero dimension {}x{}", parsed.width, parsed.height),
                    });
                }
                if body[10] != 0 || body[11] != 0 || parsed.interlace > 1 {
                    return Err(PngError::BadChunk {
                        chunk: "IHDR",
                        reason: "unknown compression, filter or interlace method".into(),
                    });
                }
                if !depth_valid(parsed.color_type, parsed.bit_depth) {
                    return Err(PngError::UnsupportedFormat {
                        color_type: parsed.color_type,
                        bit_depth: parsed.bit_depth,
                    });
                }
                header = Some(parsed);
            }
            b"PLTE" => {
                if body.is_empty() || body.len() % 3 != 0 {
                    return Err(PngError::BadChunk {
                        chunk: "PLTE",
                        reason: format!("{} bytes, expected a multiple of 3", body.len()),
                    });
                }
                palette = Some(body.to_vec());
            }
            b"IDAT" => idat.extend_from_slice(body),
            b"tRNS" => transparency = Some(body.to_vec()),
            b"gAMA" => gamma = Some(be_u32(body, 0)?),
            b"cHRM" => {
                let mut values = [0u32; 8];
                for (i, value) in values.iter_mut().enumerate() {
                    *value = be_u32(body, i * 4)?;
                }
                chromaticities = Some(values);
            }
            b"sRGB" => srgb = true,
            b"iCCP" => {
                // Profile name (latin-1, NUL-terminated), compression
                // method, then a deflated profile.
                let nul = body
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or(PngError::BadChunk {
                        chunk: "iCCP",
                        reason: "missing name terminator".into(),
                    })?;
                let compressed = body.get(nul + 2..).ok_or(PngError::BadChunk {
                    chunk: "iCCP",
                    reason: "truncated profile".into(),
                })?;
                let mut profile = Vec::new();
                ZlibDecoder::new(compressed)
                    .read_to_end(&mut profile)
                    .map_err(|e| PngError::BadChunk {
                        chunk: "iCCP",
                        reason: format!("profile inflate failed: {e}"),
                    })?;
                icc_profile = Some(profile);
            }
            b"pHYs" => {
                density = Some(Density {
                    x_per_meter: be_u32(body, 0)?,
                    y_per_meter: be_u32(body, 4)?,
                    in_meters: body.get(8) == Some(&1),
                });
            }
            b"IEND" => break,
            _ => {}
        }
    }

    let header = header.ok_or(PngError::BadChunk {
        chunk: "IHDR",
        reason: "chunk never appeared".into(),
    })?;
    if idat.is_empty() {
        return Err(PngError::BadChunk {
            chunk: "IDAT",
            reason: "chunk never appeared".into(),
        });
    }
    if header.color_type == 3 && palette.is_none() {
        return Err(PngError::BadChunk {
            chunk: "PLTE",
            reason: "required by palette colour type".into(),
        });
    }

    Ok(RawPng {
        header,
        idat,
        palette,
        transparency,
        gamma,
        chromaticities,
        srgb,
        icc_profile,
        density,
    })
}
