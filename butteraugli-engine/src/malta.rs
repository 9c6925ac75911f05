//! Malta line filters.
//!
//! A Malta filter sums a difference image along 16 short line segments
//! through each pixel and adds up the squared sums. A difference that
//! lines up into an edge therefore scores higher than the same energy
//! scattered as noise.
//!
//! There are two variants:
//! - [`MaltaKind::Hf`]: 9 contiguous samples per line (7 on diagonals),
//!   used for the UHF band
//! - [`MaltaKind::Lf`]: 5 sparse samples per line, used for HF and MF

use crate::consts::{
    MALTA_LEN, MALTA_MULLI_HF, MALTA_MULLI_LF, MALTA_WEIGHT_ASYMMETRIC, MALTA_WEIGHT_SYMMETRIC,
};
use crate::image::ImageF;

type Offset = (i32, i32);

/// Filter variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaltaKind {
    Hf,
    Lf,
}

const HF_PATTERNS: [&[Offset]; 16] = [
    &[(-4, 0), (-3, 0), (-2, 0), (-1, 0), (0, 0), (1, 0), (2, 0), (3, 0), (4, 0)],
    &[(0, -4), (0, -3), (0, -2), (0, -1), (0, 0), (0, 1), (0, 2), (0, 3), (0, 4)],
    &[(-3, -3), (-2, -2), (-1, -1), (0, 0), (1, 1), (2, 2), (3, 3)],
    &[(3, -3), (2, -2), (1, -1), (0, 0), (-1, 1), (-2, 2), (-3, 3)],
    &[(1, -4), (1, -3), (1, -2), (0, -1), (0, 0), (0, 1), (-1, 2), (-1, 3), (-1, 4)],
    &[(-1, -4), (-1, -3), (-1, -2), (0, -1), (0, 0), (0, 1), (1, 2), (1, 3), (1, 4)],
    &[(-4, -1), (-3, -1), (-2, -1), (-1, 0), (0, 0), (1, 0), (2, 1), (3, 1), (4, 1)],
    &[(-4, 1), (-3, 1), (-2, 1), (-1, 0), (0, 0), (1, 0), (2, -1), (3, -1), (4, -1)],
    &[(-2, -3), (-1, -2), (-1, -1), (0, 0), (1, 1), (1, 2), (2, 3)],
    &[(2, -3), (1, -2), (1, -1), (0, 0), (-1, 1), (-1, 2), (-2, 3)],
    &[(-3, -2), (-2, -1), (-1, -1), (0, 0), (1, 1), (2, 1), (3, 2)],
    &[(3, -2), (2, -1), (1, -1), (0, 0), (-1, 1), (-2, 1), (-3, 2)],
    // Repeats of 8, 7, 6 and 5
    &[(-4, 1), (-3, 1), (-2, 1), (-1, 0), (0, 0), (1, 0), (2, -1), (3, -1), (4, -1)],
    &[(-4, -1), (-3, -1), (-2, -1), (-1, 0), (0, 0), (1, 0), (2, 1), (3, 1), (4, 1)],
    &[(-1, -4), (-1, -3), (-1, -2), (0, -1), (0, 0), (0, 1), (1, 2), (1, 3), (1, 4)],
    &[(1, -4), (1, -3), (1, -2), (0, -1), (0, 0), (0, 1), (-1, 2), (-1, 3), (-1, 4)],
];

const LF_PATTERNS: [[Offset; 5]; 16] = [
    [(-4, 0), (-2, 0), (0, 0), (2, 0), (4, 0)],
    [(0, -4), (0, -2), (0, 0), (0, 2), (0, 4)],
    [(-3, -3), (-2, -2), (0, 0), (2, 2), (3, 3)],
    [(3, -3), (2, -2), (0, 0), (-2, 2), (-3, 3)],
    [(1, -4), (1, -2), (0, 0), (-1, 2), (-1, 4)],
    [(-1, -4), (-1, -2), (0, 0), (1, 2), (1, 4)],
    [(-4, -1), (-2, -1), (0, 0), (2, 1), (4, 1)],
    [(-4, 1), (-2, 1), (0, 0), (2, -1), (4, -1)],
    [(-2, -3), (-1, -2), (0, 0), (1, 2), (2, 3)],
    [(2, -3), (1, -2), (0, 0), (-1, 2), (-2, 3)],
    [(-3, -2), (-2, -1), (0, 0), (2, 1), (3, 2)],
    [(3, -2), (2, -1), (0, 0), (-2, 1), (-3, 2)],
    [(-4, 2), (-2, 1), (0, 0), (2, -1), (4, -2)],
    [(-4, -2), (-2, -1), (0, 0), (2, 1), (4, 2)],
    [(-2, -4), (-1, -2), (0, 0), (1, 2), (2, 4)],
    [(2, -4), (1, -2), (0, 0), (-1, 2), (-2, 4)],
];

/// Access a pixel in a 9x9 window at offset (dx, dy) from the center.
#[inline]
fn tap(window: &[f32; 81], (dx, dy): Offset) -> f32 {
    window[((4 + dy) * 9 + (4 + dx)) as usize]
}

/// Copies the 9x9 neighborhood of (x, y); samples outside the image are 0.
#[inline]
fn extract_window(data: &ImageF, x: usize, y: usize) -> [f32; 81] {
    let width = data.width();
    let height = data.height();
    let mut window = [0.0f32; 81];

    if x >= 4 && y >= 4 && x + 4 < width && y + 4 < height {
        for dy in 0..9 {
            let row = data.row(y + dy - 4);
            window[dy * 9..dy * 9 + 9].copy_from_slice(&row[x - 4..x + 5]);
        }
    } else {
        for dy in 0..9 {
            let Some(sy) = (y + dy).checked_sub(4).filter(|&sy| sy < height) else {
                continue;
            };
            let row = data.row(sy);
            for dx in 0..9 {
                if let Some(sx) = (x + dx).checked_sub(4).filter(|&sx| sx < width) {
                    window[dy * 9 + dx] = row[sx];
                }
            }
        }
    }

    window
}

fn malta_window(window: &[f32; 81], kind: MaltaKind) -> f32 {
    let mut retval = 0.0f32;
    match kind {
        MaltaKind::Hf => {
            for pattern in HF_PATTERNS {
                let sum: f32 = pattern.iter().map(|&o| tap(window, o)).sum();
                retval += sum * sum;
            }
        }
        MaltaKind::Lf => {
            for pattern in &LF_PATTERNS {
                let sum: f32 = pattern.iter().map(|&o| tap(window, o)).sum();
                retval += sum * sum;
            }
        }
    }
    retval
}

/// Filter response at one pixel.
#[must_use]
pub fn malta_unit(data: &ImageF, x: usize, y: usize, kind: MaltaKind) -> f32 {
    malta_window(&extract_window(data, x, y), kind)
}

/// Scaled, asymmetric difference of two band images fed through a Malta
/// filter.
///
/// `w_0gt1` weights the symmetric difference; `w_0lt1` weights the
/// half-open terms that fire when `lum1` falls outside
/// `[0.55 |lum0|, 1.05 |lum0|]`.
#[must_use]
pub fn malta_diff_map(
    lum0: &ImageF,
    lum1: &ImageF,
    w_0gt1: f64,
    w_0lt1: f64,
    norm1: f64,
    kind: MaltaKind,
) -> ImageF {
    let width = lum0.width();
    let height = lum0.height();

    let mulli = match kind {
        MaltaKind::Hf => MALTA_MULLI_HF,
        MaltaKind::Lf => MALTA_MULLI_LF,
    };
    let w_pre0gt1 = mulli * (MALTA_WEIGHT_SYMMETRIC * w_0gt1).sqrt() / (MALTA_LEN * 2.0 + 1.0);
    let w_pre0lt1 = mulli * (MALTA_WEIGHT_ASYMMETRIC * w_0lt1).sqrt() / (MALTA_LEN * 2.0 + 1.0);
    let norm2_0gt1 = (w_pre0gt1 * norm1) as f32;
    let norm2_0lt1 = (w_pre0lt1 * norm1) as f32;
    let norm1 = norm1 as f32;

    let mut diffs = ImageF::new(width, height);
    for y in 0..height {
        let row0 = lum0.row(y);
        let row1 = lum1.row(y);
        for ((out, &v0), &v1) in diffs.row_mut(y).iter_mut().zip(row0).zip(row1) {
            let absval = 0.5 * (v0.abs() + v1.abs());
            let diff = v0 - v1;
            let scaler = norm2_0gt1 / (norm1 + absval);

            // Primary symmetric quadratic objective
            let mut scaled_diff = scaler * diff;

            // Secondary half-open quadratic objectives
            let scaler2 = norm2_0lt1 / (norm1 + absval);
            let fabs0 = v0.abs();
            let too_small = 0.55 * fabs0;
            let too_big = 1.05 * fabs0;

            if v0 < 0.0 {
                if v1 > -too_small {
                    scaled_diff -= scaler2 * (v1 + too_small);
                } else if v1 < -too_big {
                    scaled_diff += scaler2 * (-v1 - too_big);
                }
            } else if v1 < too_small {
                scaled_diff += scaler2 * (too_small - v1);
            } else if v1 > too_big {
                scaled_diff -= scaler2 * (v1 - too_big);
            }

            *out = scaled_diff;
        }
    }

    let mut block_diff_ac = ImageF::new(width, height);
    for y in 0..height {
        let out = block_diff_ac.row_mut(y);
        for (x, v) in out.iter_mut().enumerate() {
            *v = malta_unit(&diffs, x, y, kind);
        }
    }
    block_diff_ac
}
