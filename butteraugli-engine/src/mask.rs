//! Visual masking.
//!
//! A difference is harder to see next to strong texture. The mask is
//! built from the reference image's HF and UHF energy and turned into
//! per-pixel weights for the AC and DC error terms.
//!
//! Key functions:
//! - `combine_channels_for_masking`: merges HF and UHF into one energy image
//! - `diff_precompute`: compresses energy with a biased square root
//! - `fuzzy_erosion`: finds smooth areas using a weighted minimum
//! - `mask_y` / `mask_dc_y`: map a mask value to an error weight

use crate::blur::gaussian_blur;
use crate::consts::{
    COMBINE_CHANNELS_MULS, EROSION_STEP, EROSION_WEIGHTS, GLOBAL_SCALE, MASK_BIAS, MASK_DC_Y_MUL,
    MASK_DC_Y_OFFSET, MASK_DC_Y_SCALER, MASK_MUL, MASK_RADIUS, MASK_TO_ERROR_MUL, MASK_Y_MUL,
    MASK_Y_OFFSET, MASK_Y_SCALER,
};
use crate::image::ImageF;

/// Combines HF and UHF channels into a single energy image.
///
/// Only X and Y take part; blue matters little at high frequencies.
#[must_use]
pub fn combine_channels_for_masking(hf: &[ImageF; 2], uhf: &[ImageF; 2]) -> ImageF {
    let width = hf[0].width();
    let height = hf[0].height();
    let mut out = ImageF::new(width, height);

    for y in 0..height {
        let row_x_hf = hf[0].row(y);
        let row_x_uhf = uhf[0].row(y);
        let row_y_hf = hf[1].row(y);
        let row_y_uhf = uhf[1].row(y);
        let row_out = out.row_mut(y);

        for x in 0..width {
            let xdiff = (row_x_uhf[x] + row_x_hf[x]) * COMBINE_CHANNELS_MULS[0];
            let ydiff =
                row_y_uhf[x] * COMBINE_CHANNELS_MULS[1] + row_y_hf[x] * COMBINE_CHANNELS_MULS[2];
            row_out[x] = (xdiff * xdiff + ydiff * ydiff).sqrt();
        }
    }
    out
}

/// `sqrt(mul * |v| + mul * bias) - sqrt(mul * bias)`, zero at zero.
#[must_use]
pub fn diff_precompute(input: &ImageF, mul: f32, bias_arg: f32) -> ImageF {
    let bias = mul * bias_arg;
    let sqrt_bias = bias.sqrt();
    let mut out = ImageF::new(input.width(), input.height());

    for y in 0..input.height() {
        for (o, &v) in out.row_mut(y).iter_mut().zip(input.row(y)) {
            *o = (mul * v.abs() + bias).sqrt() - sqrt_bias;
        }
    }
    out
}

/// Keeps the three smallest values seen, in ascending order.
#[inline]
fn store_min3(v: f32, min0: &mut f32, min1: &mut f32, min2: &mut f32) {
    if v < *min2 {
        if v < *min0 {
            *min2 = *min1;
            *min1 = *min0;
            *min0 = v;
        } else if v < *min1 {
            *min2 = *min1;
            *min1 = v;
        } else {
            *min2 = v;
        }
    }
}

/// Weighted minimum over the pixel and its 8 neighbors at distance 3.
///
/// Texture only masks a difference if the area around it is textured
/// too, so isolated bright spots are pulled down.
#[must_use]
pub fn fuzzy_erosion(from: &ImageF) -> ImageF {
    let width = from.width();
    let height = from.height();
    let mut to = ImageF::new(width, height);

    for y in 0..height {
        let row_c = from.row(y);
        let row_up = y.checked_sub(EROSION_STEP).map(|yy| from.row(yy));
        let row_dn = (y + EROSION_STEP < height).then(|| from.row(y + EROSION_STEP));
        let out_row = to.row_mut(y);

        for x in 0..width {
            let mut min0 = row_c[x];
            let mut min1 = 2.0 * min0;
            let mut min2 = min1;

            let mut visit = |v: f32| store_min3(v, &mut min0, &mut min1, &mut min2);
            if x >= EROSION_STEP {
                let xl = x - EROSION_STEP;
                visit(row_c[xl]);
                if let Some(r) = row_up {
                    visit(r[xl]);
                }
                if let Some(r) = row_dn {
                    visit(r[xl]);
                }
            }
            if x + EROSION_STEP < width {
                let xr = x + EROSION_STEP;
                visit(row_c[xr]);
                if let Some(r) = row_up {
                    visit(r[xr]);
                }
                if let Some(r) = row_dn {
                    visit(r[xr]);
                }
            }
            if let Some(r) = row_up {
                visit(r[x]);
            }
            if let Some(r) = row_dn {
                visit(r[x]);
            }

            out_row[x] =
                EROSION_WEIGHTS[0] * min0 + EROSION_WEIGHTS[1] * min1 + EROSION_WEIGHTS[2] * min2;
        }
    }
    to
}

/// AC error weight for a mask value. Decreasing in `delta`.
#[inline]
#[must_use]
pub fn mask_y(delta: f64) -> f64 {
    let c = MASK_Y_MUL / (MASK_Y_SCALER * delta + MASK_Y_OFFSET);
    let retval = f64::from(GLOBAL_SCALE) * (1.0 + c);
    retval * retval
}

/// DC error weight for a mask value. Decreasing in `delta`.
#[inline]
#[must_use]
pub fn mask_dc_y(delta: f64) -> f64 {
    let c = MASK_DC_Y_MUL / (MASK_DC_Y_SCALER * delta + MASK_DC_Y_OFFSET);
    let retval = f64::from(GLOBAL_SCALE) * (1.0 + c);
    retval * retval
}

/// Builds the mask from the reference energy `mask0`.
///
/// When `diff_ac` is given, the squared difference between the blurred
/// energies of both images is added to it as an extra error term.
pub fn compute_mask(mask0: &ImageF, mask1: &ImageF, diff_ac: Option<&mut ImageF>) -> ImageF {
    let blurred0 = gaussian_blur(&diff_precompute(mask0, MASK_MUL, MASK_BIAS), MASK_RADIUS);
    let mask = fuzzy_erosion(&blurred0);

    if let Some(ac) = diff_ac {
        let blurred1 = gaussian_blur(&diff_precompute(mask1, MASK_MUL, MASK_BIAS), MASK_RADIUS);
        for y in 0..mask0.height() {
            let b0 = blurred0.row(y);
            let b1 = blurred1.row(y);
            for ((a, &v0), &v1) in ac.row_mut(y).iter_mut().zip(b0).zip(b1) {
                let diff = v0 - v1;
                *a += MASK_TO_ERROR_MUL * diff * diff;
            }
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_min3() {
        let mut min0 = 10.0f32;
        let mut min1 = 20.0f32;
        let mut min2 = 30.0f32;

        store_min3(5.0, &mut min0, &mut min1, &mut min2);
        assert_eq!((min0, min1, min2), (5.0, 10.0, 20.0));

        store_min3(15.0, &mut min0, &mut min1, &mut min2);
        assert_eq!((min0, min1, min2), (5.0, 10.0, 15.0));

        store_min3(40.0, &mut min0, &mut min1, &mut min2);
        assert_eq!((min0, min1, min2), (5.0, 10.0, 15.0));
    }

    #[test]
    fn test_fuzzy_erosion_pulls_down_isolated_spot() {
        let mut from = ImageF::new(16, 16);
        from.set(8, 8, 10.0);
        let to = fuzzy_erosion(&from);
        assert!(to.get(8, 8) < 10.0);
        assert!(to.get(8, 8) >= 0.0);
    }

    #[test]
    fn test_fuzzy_erosion_keeps_constant() {
        let from = ImageF::filled(10, 10, 2.0);
        let to = fuzzy_erosion(&from);
        assert!(to.rows().flatten().all(|&v| (v - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_diff_precompute_zero_at_zero() {
        let input = ImageF::new(4, 4);
        let out = diff_precompute(&input, MASK_MUL, MASK_BIAS);
        assert!(out.rows().flatten().all(|&v| v.abs() < 1e-6));

        let input = ImageF::filled(4, 4, -1.0);
        let out = diff_precompute(&input, 1.0, 0.01);
        assert!(out.get(0, 0) > 0.0);
    }

    #[test]
    fn test_mask_weights_decrease_with_contrast() {
        assert!(mask_y(10.0) < mask_y(1.0));
        assert!(mask_dc_y(10.0) < mask_dc_y(1.0));
        assert!(mask_y(0.0).is_finite() && mask_y(0.0) > 0.0);
    }

    #[test]
    fn test_mask_y_value() {
        let offset = 0.829591754942;
        let scaler = 0.451936922203;
        let mul = 2.5485944793;
        let global_scale = 1.0 / (17.83 * 0.790799174);

        let c = mul / (scaler * 1.0 + offset);
        let retval = global_scale * (1.0 + c);
        let expected = retval * retval;

        let result = mask_y(1.0);
        assert!(
            (result - expected).abs() < 1e-6,
            "MaskY(1.0) = {result}, expected {expected}"
        );
    }

    #[test]
    fn test_compute_mask_identical_adds_nothing() {
        let mut energy = ImageF::new(12, 12);
        energy.set(6, 6, 3.0);
        let mut ac = ImageF::new(12, 12);
        let _ = compute_mask(&energy, &energy, Some(&mut ac));
        assert!(ac.rows().flatten().all(|&v| v == 0.0));
    }
}
