//! Scanline filter reconstruction (PNG filter method 0).
//!
//! Each row carries a 1-byte filter type followed by the packed row bytes;
//! reconstruction is in place against the previous reconstructed row.

use crate::PngError;

const FILTER_NONE: u8 = 0;
const FILTER_SUB: u8 = 1;
const FILTER_UP: u8 = 2;
const FILTER_AVERAGE: u8 = 3;
const FILTER_PAETH: u8 = 4;

/// Paeth predictor: the neighbour closest to `left + up - upper_left`.
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

/// Reconstructs one row in place. `prev` is the reconstructed row above
/// (zeros for the first row), `step` the filter delta distance in bytes.
pub fn reconstruct_row(
    filter: u8,
    row: &mut [u8],
    prev: &[u8],
    step: usize,
) -> Result<(), PngError> {
    debug_assert_eq!(row.len(), prev.len());
    match filter {
        FILTER_NONE => {}
        FILTER_SUB => {
            for i in step..row.len() {
                row[i] = row[i].wrapping_add(row[i - step]);
            }
        }
        FILTER_UP => {
            for i in 0..row.len() {
                row[i] = row[i].wrapping_add(prev[i]);
            }
        }
        FILTER_AVERAGE => {
            for i in 0..row.len() {
                let left = if i >= step { row[i - step] as u16 } else { 0 };
                // Flooring division.
                let average = ((left + prev[i] as u16) / 2) as u8;
                row[i] = row[i].wrapping_add(average);
            }
        }
        FILTER_PAETH => {
            for i in 0..row.len() {
                let left = if i >= step { row[i - step] } else { 0 };
                let upper_left = if i >= step { prev[i - step] } else { 0 };
                row[i] = row[i].wrapping_add(paeth(left, prev[i], upper_left));
            }
        }
        other => {
            return Err(PngError::BadChunk {
                chunk: "IDAT",
                reason: format!("unknown filter type {other}"),
            })
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test-side forward filter, the inverse of `reconstruct_row`.
    fn apply_filter(filter: u8, raw: &[u8], prev: &[u8], step: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(raw.len());
        for i in 0..raw.len() {
            let left = if i >= step { raw[i - step] } else { 0 };
            let up = prev[i];
            let upper_left = if i >= step { prev[i - step] } else { 0 };
            let predictor = match filter {
                FILTER_NONE => 0,
                FILTER_SUB => left,
                FILTER_UP => up,
                FILTER_AVERAGE => (((left as u16) + (up as u16)) / 2) as u8,
                FILTER_PAETH => paeth(left, up, upper_left),
                _ => unreachable!(),
            };
            out.push(raw[i].wrapping_sub(predictor));
        }
        out
    }

    #[test]
    fn paeth_picks_nearest_neighbour() {
        assert_eq!(paeth(0, 0, 0), 0);
        assert_eq!(paeth(10, 20, 30), 10); // p = 0, closest to left
        assert_eq!(paeth(100, 2, 3), 100);
        // Ties prefer left, then up.
        assert_eq!(paeth(5, 5, 5), 5);
    }

    #[test]
    fn every_filter_roundtrips() {
        let raw: Vec<u8> = (0u8..60).map(|i| i.wrapping_mul(37)).collect();
        let prev: Vec<u8> = (0u8..60).map(|i| i.wrapping_mul(11).wrapping_add(5)).collect();
        for step in [1usize, 3, 4] {
            for filter in 0..=4u8 {
                let mut filtered = apply_filter(filter, &raw, &prev, step);
                reconstruct_row(filter, &mut filtered, &prev, step).unwrap();
                assert_eq!(filtered, raw, "filter {filter} step {step}");
            }
        }
    }

    #[test]
    fn unknown_filter_is_rejected() {
        let mut row = [0u8; 4];
        let prev = [0u8; 4];
        assert!(reconstruct_row(9, &mut row, &prev, 1).is_err());
    }
}
