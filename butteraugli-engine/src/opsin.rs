//! Opponent color transform (opsin dynamics).
//!
//! Linear RGB is mixed into three cone-like absorbance channels, each
//! scaled by a sensitivity derived from a blurred copy of the image, and
//! then rotated into XYB: X is red-green opponency, Y is luminance and B
//! is the blue channel.

use std::f32::consts::LN_2;

use crate::blur::gaussian_blur;
use crate::consts::{
    GAMMA_ADD, GAMMA_BIAS, GAMMA_MUL, OPSIN_ABSORBANCE_BIAS, OPSIN_ABSORBANCE_MATRIX,
    OPSIN_BLUR_SIGMA, OPSIN_MIN_VALUE,
};
use crate::image::Image3F;
use crate::ingest::LinearImage;

/// Three planes in XYB order.
pub type OpponentImage = Image3F;

/// Fast approximation of log2.
///
/// Range-reduces the mantissa to `[2/3, 4/3]` and evaluates a (2,2)
/// rational polynomial; absolute error is about 4e-6.
#[inline]
pub fn fast_log2f(x: f32) -> f32 {
    const P0: f32 = -1.850_383_3E-6;
    const P1: f32 = 1.428_716_1;
    const P2: f32 = 0.742_458_7;

    const Q0: f32 = 0.990_328_14;
    const Q1: f32 = 1.009_671_9;
    const Q2: f32 = 0.174_093_43;

    let x_bits = x.to_bits() as i32;

    // 0x3f2aaaab is 2/3
    let exp_bits = x_bits.wrapping_sub(0x3f2a_aaab_u32 as i32);
    let exp_shifted = exp_bits >> 23;
    let mantissa = f32::from_bits((x_bits - (exp_shifted << 23)) as u32);
    let m = mantissa - 1.0;

    let yp = (P2 * m + P1) * m + P0;
    let yq = (Q2 * m + Q1) * m + Q0;
    yp / yq + exp_shifted as f32
}

/// Log-shaped response curve applied to absorbance values.
#[inline]
pub fn gamma(v: f32) -> f32 {
    let biased = v.max(0.0) + GAMMA_BIAS;
    (GAMMA_MUL * LN_2) * fast_log2f(biased) + GAMMA_ADD
}

/// Mixes an RGB triple into the three absorbance channels.
///
/// With `clamp`, each output is floored at its channel bias.
#[inline]
pub fn opsin_absorbance(rgb: [f32; 3], clamp: bool) -> [f32; 3] {
    let mut out = [0.0f32; 3];
    for (c, slot) in out.iter_mut().enumerate() {
        let m = &OPSIN_ABSORBANCE_MATRIX[c];
        let v = m[0] * rgb[0] + m[1] * rgb[1] + m[2] * rgb[2] + OPSIN_ABSORBANCE_BIAS[c];
        *slot = if clamp {
            v.max(OPSIN_ABSORBANCE_BIAS[c])
        } else {
            v
        };
    }
    out
}

/// Converts linear RGB to the opponent (XYB) representation.
///
/// `intensity_target` is the display luminance, in nits, of a linear
/// value of 1.0.
#[must_use]
pub fn to_opponent_space(linear: &LinearImage, intensity_target: f32) -> OpponentImage {
    let rgb = linear.planes();
    let width = rgb.width();
    let height = rgb.height();

    let blurred = [
        gaussian_blur(rgb.plane(0), OPSIN_BLUR_SIGMA),
        gaussian_blur(rgb.plane(1), OPSIN_BLUR_SIGMA),
        gaussian_blur(rgb.plane(2), OPSIN_BLUR_SIGMA),
    ];

    let mut xyb = Image3F::new(width, height);
    let mut out: Vec<[f32; 3]> = Vec::with_capacity(width);
    for y in 0..height {
        let src = [rgb.plane_row(0, y), rgb.plane_row(1, y), rgb.plane_row(2, y)];
        let blur = [blurred[0].row(y), blurred[1].row(y), blurred[2].row(y)];
        out.clear();

        for x in 0..width {
            let adapt = [
                blur[0][x] * intensity_target,
                blur[1][x] * intensity_target,
                blur[2][x] * intensity_target,
            ];
            let pre = opsin_absorbance(adapt, true);

            let cur = opsin_absorbance(
                [
                    src[0][x] * intensity_target,
                    src[1][x] * intensity_target,
                    src[2][x] * intensity_target,
                ],
                false,
            );

            let mut mixed = [0.0f32; 3];
            for c in 0..3 {
                let p = pre[c].max(OPSIN_MIN_VALUE);
                let sensitivity = (gamma(p) / p).max(OPSIN_MIN_VALUE);
                mixed[c] = (cur[c] * sensitivity).max(OPSIN_ABSORBANCE_BIAS[c]);
            }
            out.push([mixed[0] - mixed[1], mixed[0] + mixed[1], mixed[2]]);
        }

        for c in 0..3 {
            let row = xyb.plane_row_mut(c, y);
            for (dst, v) in row.iter_mut().zip(&out) {
                *dst = v[c];
            }
        }
    }

    xyb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageF;

    #[test]
    fn test_gamma_positive() {
        let result = gamma(1.0);
        assert!(result.is_finite());
        assert!(result > -30.0 && result < 30.0);
    }

    #[test]
    fn test_gamma_zero() {
        assert!(gamma(0.0).is_finite());
        assert_eq!(gamma(-5.0), gamma(0.0));
    }

    #[test]
    fn test_gamma_monotonic() {
        let mut prev = gamma(0.0);
        for i in 1..200 {
            let g = gamma(i as f32 * 0.5);
            assert!(g > prev);
            prev = g;
        }
    }

    #[test]
    fn test_opsin_absorbance_bias() {
        let out = opsin_absorbance([0.0, 0.0, 0.0], false);
        for c in 0..3 {
            assert!((out[c] - OPSIN_ABSORBANCE_BIAS[c]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_opsin_absorbance_clamped() {
        let out = opsin_absorbance([-100.0, -100.0, -100.0], true);
        for c in 0..3 {
            assert!(out[c] >= OPSIN_ABSORBANCE_BIAS[c]);
        }
    }

    #[test]
    fn test_fast_log2f() {
        for i in 1..100 {
            let x = i as f32 * 0.1;
            let fast = fast_log2f(x);
            let exact = x.log2();
            assert!(
                (fast - exact).abs() < 1e-4,
                "fast_log2f({}) = {}, expected {}",
                x,
                fast,
                exact
            );
        }
    }

    #[test]
    fn test_gray_has_small_x() {
        let gray = LinearImage::from_planes(
            ImageF::filled(8, 8, 0.5),
            ImageF::filled(8, 8, 0.5),
            ImageF::filled(8, 8, 0.5),
        );
        let xyb = to_opponent_space(&gray, 80.0);
        let x = xyb.plane(0).get(4, 4).abs();
        let y = xyb.plane(1).get(4, 4);
        assert!(y > 0.0);
        assert!(x < y * 0.1, "x={x} y={y}");
    }

    #[test]
    fn test_brighter_means_larger_y() {
        let make = |v: f32| {
            LinearImage::from_planes(
                ImageF::filled(4, 4, v),
                ImageF::filled(4, 4, v),
                ImageF::filled(4, 4, v),
            )
        };
        let dark = to_opponent_space(&make(0.1), 80.0);
        let bright = to_opponent_space(&make(0.9), 80.0);
        assert!(bright.plane(1).get(1, 1) > dark.plane(1).get(1, 1));
    }
}
