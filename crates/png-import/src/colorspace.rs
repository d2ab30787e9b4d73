//! PDF colourspace synthesis from PNG colour chunks.
//!
//! gAMA/cHRM/sRGB turn into CalGray or CalRGB dictionaries with a computed
//! white point and primary matrix; an iCCP profile is attached opaquely; a
//! palette becomes an Indexed space over the synthesized base.

/// A PDF colourspace, ready for the writer to serialize.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    CalGray {
        white_point: [f64; 3],
        gamma: f64,
    },
    CalRgb {
        white_point: [f64; 3],
        gamma: [f64; 3],
        /// Column-major XYZ of the three primaries: Xa Ya Za Xb Yb Zb Xc Yc Zc.
        matrix: [f64; 9],
    },
    /// Opaque ICC profile; `channels` is the declared component count.
    IccBased {
        profile: Vec<u8>,
        channels: u8,
    },
    /// Palette lookup over a base space; `palette` holds RGB triples.
    Indexed {
        base: Box<ColorSpace>,
        palette: Vec<u8>,
    },
}

/// sRGB chromaticities x 100000: wx, wy, rx, ry, gx, gy, bx, by.
pub const SRGB_CHROMATICITIES: [u32; 8] =
    [31270, 32900, 64000, 33000, 30000, 60000, 15000, 6000];

/// Chooses the colourspace for a decoded image.
///
/// `gray` selects the one-component variants. `gamma` is the gAMA value
/// (x 100000); an sRGB chunk should be passed as gamma 45455 with the
/// standard chromaticities. ICC wins over everything; a missing-or-unity
/// gamma with no chromaticities stays device-dependent.
pub fn select(
    gray: bool,
    gamma: Option<u32>,
    chromaticities: Option<[u32; 8]>,
    icc_profile: Option<Vec<u8>>,
) -> ColorSpace {
    if let Some(profile) = icc_profile {
        return ColorSpace::IccBased {
            profile,
            channels: if gray { 1 } else { 3 },
        };
    }

    let unity = gamma.map_or(true, |g| g == 100_000);
    if unity && chromaticities.is_none() {
        return if gray {
            ColorSpace::DeviceGray
        } else {
            ColorSpace::DeviceRgb
        };
    }

    // Decoding exponent: the inverse of the encoding gamma the file states.
    let decode_gamma = gamma.map_or(1.0, |g| 100_000.0 / g as f64);
    let chrm = chromaticities.unwrap_or(SRGB_CHROMATICITIES);
    let scale = |v: u32| v as f64 / 100_000.0;
    let (wx, wy) = (scale(chrm[0]), scale(chrm[1]));
    let white_point = xyz_of(wx, wy);

    if gray {
        return ColorSpace::CalGray {
            white_point,
            gamma: decode_gamma,
        };
    }

    let matrix = primary_matrix(
        (scale(chrm[2]), scale(chrm[3])),
        (scale(chrm[4]), scale(chrm[5])),
        (scale(chrm[6]), scale(chrm[7])),
        white_point,
    );
    ColorSpace::CalRgb {
        white_point,
        gamma: [decode_gamma; 3],
        matrix,
    }
}

/// XYZ of a chromaticity with luminance normalized to 1.
fn xyz_of(x: f64, y: f64) -> [f64; 3] {
    if y <= 0.0 {
        return [1.0, 1.0, 1.0];
    }
    [x / y, 1.0, (1.0 - x - y) / y]
}

/// XYZ columns for the red, green and blue primaries, scaled so that full
/// drive of all three reproduces the white point.
fn primary_matrix(
    red: (f64, f64),
    green: (f64, f64),
    blue: (f64, f64),
    white: [f64; 3],
) -> [f64; 9] {
    let r = xyz_of(red.0, red.1);
    let g = xyz_of(green.0, green.1);
    let b = xyz_of(blue.0, blue.1);

    // Solve [r g b] * s = white for the per-primary scales.
    let m = [r[0], g[0], b[0], r[1], g[1], b[1], r[2], g[2], b[2]];
    let s = solve_3x3(&m, &white).unwrap_or([1.0, 1.0, 1.0]);

    [
        r[0] * s[0],
        r[1] * s[0],
        r[2] * s[0],
        g[0] * s[1],
        g[1] * s[1],
        g[2] * s[1],
        b[0] * s[2],
        b[1] * s[2],
        b[2] * s[2],
    ]
}

/// Solves `m * x = v` for a row-major 3x3 matrix by the adjugate.
fn solve_3x3(m: &[f64; 9], v: &[f64; 3]) -> Option<[f64; 3]> {
    let det = m[0] * (m[4] * m[8] - m[5] * m[7]) - m[1] * (m[3] * m[8] - m[5] * m[6])
        + m[2] * (m[3] * m[7] - m[4] * m[6]);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv = [
        (m[4] * m[8] - m[5] * m[7]) / det,
        (m[2] * m[7] - m[1] * m[8]) / det,
        (m[1] * m[5] - m[2] * m[4]) / det,
        (m[5] * m[6] - m[3] * m[8]) / det,
        (m[0] * m[8] - m[2] * m[6]) / det,
        (m[2] * m[3] - m[0] * m[5]) / det,
        (m[3] * m[7] - m[4] * m[6]) / det,
        (m[1] * m[6] - m[0] * m[7]) / det,
        (m[0] * m[4] - m[1] * m[3]) / det,
    ];
    Some([
        inv[0] * v[0] + inv[1] * v[1] + inv[2] * v[2],
        inv[3] * v[0] + inv[4] * v[1] + inv[5] * v[2],
        inv[6] * v[0] + inv[7] * v[1] + inv[8] * v[2],
    ])
}
