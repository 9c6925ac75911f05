//! Multi-scale psychovisual decomposition.
//!
//! An opponent image is split into four spatial-frequency bands by
//! subtracting successively wider Gaussian blurs:
//! - UHF (ultra high frequency): very fine detail, X and Y only
//! - HF (high frequency): edges and fine texture, X and Y only
//! - MF (medium frequency): larger texture, X, Y and B
//! - LF (low frequency): smooth gradients and base color, X, Y and B

use std::convert::Infallible;

use tracing::trace;

use crate::blur::gaussian_blur;
use crate::consts::{
    ADD_HF_RANGE, ADD_MF_RANGE, BMUL_LF_TO_VALS, MAXCLAMP_HF, MAXCLAMP_MUL, MAXCLAMP_UHF,
    MUL_Y_HF, MUL_Y_UHF, REMOVE_HF_RANGE, REMOVE_MF_RANGE, REMOVE_UHF_RANGE, SIGMA_HF, SIGMA_LF,
    SIGMA_UHF, SUPPRESS_S, SUPPRESS_XY, XMUL_LF_TO_VALS, YMUL_LF_TO_VALS, Y_TO_B_MUL_LF_TO_VALS,
};
use crate::engine::CancelToken;
use crate::image::{Image3F, ImageF};
use crate::opsin::OpponentImage;
use crate::ButteraugliError;

/// One channel of one frequency band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    UhfX,
    UhfY,
    HfX,
    HfY,
    MfX,
    MfY,
    MfB,
    LfX,
    LfY,
    LfB,
}

impl Band {
    /// Every band, finest first.
    pub const ALL: [Self; 10] = [
        Self::UhfX,
        Self::UhfY,
        Self::HfX,
        Self::HfY,
        Self::MfX,
        Self::MfY,
        Self::MfB,
        Self::LfX,
        Self::LfY,
        Self::LfB,
    ];
}

/// Frequency-decomposed version of an image.
#[derive(Debug, Clone)]
pub struct PsychoImage {
    /// Ultra high frequency (X, Y).
    pub uhf: [ImageF; 2],
    /// High frequency (X, Y).
    pub hf: [ImageF; 2],
    /// Medium frequency (X, Y, B).
    pub mf: Image3F,
    /// Low frequency in "vals" space (X, Y, B).
    pub lf: Image3F,
}

impl PsychoImage {
    #[must_use]
    pub fn width(&self) -> usize {
        self.lf.width()
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.lf.height()
    }

    /// Returns one band channel.
    #[must_use]
    pub fn band(&self, band: Band) -> &ImageF {
        match band {
            Band::UhfX => &self.uhf[0],
            Band::UhfY => &self.uhf[1],
            Band::HfX => &self.hf[0],
            Band::HfY => &self.hf[1],
            Band::MfX => self.mf.plane(0),
            Band::MfY => self.mf.plane(1),
            Band::MfB => self.mf.plane(2),
            Band::LfX => self.lf.plane(0),
            Band::LfY => self.lf.plane(1),
            Band::LfB => self.lf.plane(2),
        }
    }

    /// All band channels in [`Band::ALL`] order.
    pub fn bands(&self) -> impl Iterator<Item = (Band, &ImageF)> + '_ {
        Band::ALL.into_iter().map(move |b| (b, self.band(b)))
    }
}

/// Makes the area around zero less important.
#[inline]
fn remove_range_around_zero(x: f32, range: f32) -> f32 {
    if x > range {
        x - range
    } else if x < -range {
        x + range
    } else {
        0.0
    }
}

/// Makes the area around zero more important.
#[inline]
fn amplify_range_around_zero(x: f32, range: f32) -> f32 {
    if x > range {
        x + range
    } else if x < -range {
        x - range
    } else {
        x * 2.0
    }
}

/// Compresses values beyond `max_val` so outliers don't dominate.
#[inline]
fn maximum_clamp(v: f32, max_val: f32) -> f32 {
    if v >= max_val {
        (v - max_val) * MAXCLAMP_MUL + max_val
    } else if v <= -max_val {
        (v + max_val) * MAXCLAMP_MUL - max_val
    } else {
        v
    }
}

fn subtract_into(a: &ImageF, b: &ImageF, out: &mut ImageF) {
    for y in 0..a.height() {
        for ((dst, &va), &vb) in out.row_mut(y).iter_mut().zip(a.row(y)).zip(b.row(y)) {
            *dst = va - vb;
        }
    }
}

/// Converts low-frequency XYB to "vals" space, where distances can be
/// compared with an L2 norm.
fn xyb_low_freq_to_vals(lf: &mut Image3F) {
    for y in 0..lf.height() {
        let row_y: Vec<f32> = lf.plane_row(1, y).to_vec();

        for (vb, &vy) in lf.plane_row_mut(2, y).iter_mut().zip(&row_y) {
            *vb = (Y_TO_B_MUL_LF_TO_VALS as f32 * vy + *vb) * BMUL_LF_TO_VALS as f32;
        }
        for vx in lf.plane_row_mut(0, y) {
            *vx *= XMUL_LF_TO_VALS as f32;
        }
        for vy in lf.plane_row_mut(1, y) {
            *vy *= YMUL_LF_TO_VALS as f32;
        }
    }
}

/// Strong luminance detail lowers sensitivity to chroma detail.
fn suppress_x_by_y(in_y: &ImageF, inout_x: &mut ImageF) {
    let s = SUPPRESS_S as f32;
    let one_minus_s = 1.0 - s;
    let yw = SUPPRESS_XY as f32;

    for y in 0..in_y.height() {
        for (vx, &vy) in inout_x.row_mut(y).iter_mut().zip(in_y.row(y)) {
            let scaler = (yw / (vy * vy + yw)) * one_minus_s + s;
            *vx *= scaler;
        }
    }
}

fn separate_lf_and_mf(xyb: &OpponentImage) -> (Image3F, Image3F) {
    let width = xyb.width();
    let height = xyb.height();
    let mut lf = Image3F::new(width, height);
    let mut mf = Image3F::new(width, height);

    for i in 0..3 {
        let blurred = gaussian_blur(xyb.plane(i), SIGMA_LF as f32);
        subtract_into(xyb.plane(i), &blurred, mf.plane_mut(i));
        *lf.plane_mut(i) = blurred;
    }
    xyb_low_freq_to_vals(&mut lf);
    (lf, mf)
}

fn separate_mf_and_hf(mf: &mut Image3F) -> [ImageF; 2] {
    let sigma = SIGMA_HF as f32;
    let mut hf = [mf.plane(0).clone(), mf.plane(1).clone()];

    for (i, hf_plane) in hf.iter_mut().enumerate() {
        let blurred = gaussian_blur(mf.plane(i), sigma);
        for y in 0..blurred.height() {
            let row_blur = blurred.row(y);
            for (h, &b) in hf_plane.row_mut(y).iter_mut().zip(row_blur) {
                *h -= b;
            }
            let row_mf = mf.plane_row_mut(i, y);
            for (m, &b) in row_mf.iter_mut().zip(row_blur) {
                *m = if i == 0 {
                    remove_range_around_zero(b, REMOVE_MF_RANGE as f32)
                } else {
                    amplify_range_around_zero(b, ADD_MF_RANGE as f32)
                };
            }
        }
    }

    // No HF/UHF for blue
    *mf.plane_mut(2) = gaussian_blur(mf.plane(2), sigma);

    let [mut hf_x, hf_y] = hf;
    suppress_x_by_y(&hf_y, &mut hf_x);
    [hf_x, hf_y]
}

fn separate_hf_and_uhf(hf: &mut [ImageF; 2]) -> [ImageF; 2] {
    let sigma = SIGMA_UHF as f32;
    let mut uhf = [hf[0].clone(), hf[1].clone()];

    for (i, (hf_plane, uhf_plane)) in hf.iter_mut().zip(uhf.iter_mut()).enumerate() {
        let blurred = gaussian_blur(hf_plane, sigma);
        for y in 0..blurred.height() {
            let row_hf = hf_plane.row_mut(y);
            let row_uhf = uhf_plane.row_mut(y);
            for ((h, u), &b) in row_hf.iter_mut().zip(row_uhf).zip(blurred.row(y)) {
                if i == 0 {
                    *u = remove_range_around_zero(*u - b, REMOVE_UHF_RANGE as f32);
                    *h = remove_range_around_zero(b, REMOVE_HF_RANGE as f32);
                } else {
                    // Y clamps HF before the UHF residual is taken
                    let hf_clamped = maximum_clamp(b, MAXCLAMP_HF as f32);
                    let uhf_clamped = maximum_clamp(*u - hf_clamped, MAXCLAMP_UHF as f32);
                    *u = uhf_clamped * MUL_Y_UHF as f32;
                    *h = amplify_range_around_zero(
                        hf_clamped * MUL_Y_HF as f32,
                        ADD_HF_RANGE as f32,
                    );
                }
            }
        }
    }
    uhf
}

/// Decomposes an opponent image into frequency bands.
#[must_use]
pub fn separate_frequencies(xyb: &OpponentImage) -> PsychoImage {
    match separate_stages(xyb, || Ok::<(), Infallible>(())) {
        Ok(ps) => ps,
        Err(never) => match never {},
    }
}

/// Like [`separate_frequencies`], checking `cancel` between bands.
pub fn separate_frequencies_cancellable(
    xyb: &OpponentImage,
    cancel: &CancelToken,
) -> Result<PsychoImage, ButteraugliError> {
    trace!(width = xyb.width(), height = xyb.height(), "separating frequencies");
    separate_stages(xyb, || cancel.check())
}

fn separate_stages<E>(
    xyb: &OpponentImage,
    mut checkpoint: impl FnMut() -> Result<(), E>,
) -> Result<PsychoImage, E> {
    let (lf, mut mf) = separate_lf_and_mf(xyb);
    checkpoint()?;
    let mut hf = separate_mf_and_hf(&mut mf);
    checkpoint()?;
    let uhf = separate_hf_and_uhf(&mut hf);
    checkpoint()?;
    Ok(PsychoImage { uhf, hf, mf, lf })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: usize, height: usize) -> Image3F {
        let mut xyb = Image3F::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let val = (x + y) as f32 / 64.0;
                xyb.plane_mut(0).set(x, y, val * 0.1);
                xyb.plane_mut(1).set(x, y, val);
                xyb.plane_mut(2).set(x, y, val * 0.5);
            }
        }
        xyb
    }

    #[test]
    fn test_remove_range_around_zero() {
        assert!((remove_range_around_zero(0.5, 0.1) - 0.4).abs() < 0.001);
        assert!((remove_range_around_zero(-0.5, 0.1) - (-0.4)).abs() < 0.001);
        assert_eq!(remove_range_around_zero(0.05, 0.1), 0.0);
    }

    #[test]
    fn test_amplify_range_around_zero() {
        assert!((amplify_range_around_zero(0.5, 0.1) - 0.6).abs() < 0.001);
        assert!((amplify_range_around_zero(-0.5, 0.1) - (-0.6)).abs() < 0.001);
        assert!((amplify_range_around_zero(0.05, 0.1) - 0.1).abs() < 0.001);
    }

    #[test]
    fn test_maximum_clamp() {
        assert_eq!(maximum_clamp(5.0, 10.0), 5.0);
        assert!(maximum_clamp(15.0, 10.0) < 15.0);
        assert!(maximum_clamp(15.0, 10.0) > 10.0);
        assert_eq!(maximum_clamp(-15.0, 10.0), -maximum_clamp(15.0, 10.0));
    }

    #[test]
    fn test_band_order_is_fixed() {
        let ps = separate_frequencies(&ramp(16, 16));
        let order: Vec<Band> = ps.bands().map(|(b, _)| b).collect();
        assert_eq!(order, Band::ALL.to_vec());
        for (_, img) in ps.bands() {
            assert_eq!(img.width(), 16);
            assert_eq!(img.height(), 16);
        }
    }

    #[test]
    fn test_uniform_has_no_detail() {
        let mut xyb = Image3F::new(20, 12);
        for c in 0..3 {
            xyb.plane_mut(c).fill(0.3);
        }
        let ps = separate_frequencies(&xyb);
        for band in [Band::UhfX, Band::UhfY, Band::HfX, Band::HfY, Band::MfX] {
            assert!(ps.band(band).rows().flatten().all(|v| v.abs() < 1e-5));
        }
    }

    #[test]
    fn test_cancelled_token_stops() {
        let token = CancelToken::new();
        token.cancel();
        let err = separate_frequencies_cancellable(&ramp(8, 8), &token).unwrap_err();
        assert!(matches!(err, ButteraugliError::Cancelled));
    }
}
