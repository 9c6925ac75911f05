//! Difference model.
//!
//! Ties the stages together: two linear images are decomposed into
//! frequency bands at one or two resolutions, the bands are compared with
//! Malta filters and L2 terms, and the result is weighted by the
//! reference's visual mask.

use std::borrow::Cow;

use tracing::trace;

use crate::consts::{
    MIN_FRAME_SIZE, MIN_SIZE_FOR_SUBSAMPLE, NORM1_HF, NORM1_HF_X, NORM1_MF, NORM1_MF_X, NORM1_UHF,
    NORM1_UHF_X, SUBSAMPLE_MIXING, SUBSAMPLE_WEIGHT, WMUL, W_HF_MALTA, W_HF_MALTA_X, W_MF_MALTA,
    W_MF_MALTA_X, W_UHF_MALTA, W_UHF_MALTA_X,
};
use crate::distance::DistanceMap;
use crate::engine::CancelToken;
use crate::image::{Image3F, ImageF};
use crate::ingest::LinearImage;
use crate::malta::{malta_diff_map, MaltaKind};
use crate::mask::{combine_channels_for_masking, compute_mask, mask_dc_y, mask_y};
use crate::opsin::to_opponent_space;
use crate::psycho::{separate_frequencies_cancellable, PsychoImage};
use crate::{ButteraugliError, ButteraugliParams};

/// Adds `diff^2 * w` to `diffmap`.
fn l2_diff(i0: &ImageF, i1: &ImageF, w: f32, diffmap: &mut ImageF) {
    for y in 0..i0.height() {
        let row0 = i0.row(y);
        let row1 = i1.row(y);
        for ((d, &v0), &v1) in diffmap.row_mut(y).iter_mut().zip(row0).zip(row1) {
            let diff = v0 - v1;
            *d += diff * diff * w;
        }
    }
}

/// L2 difference with an extra penalty when `i1` leaves the band
/// `[0.4 |i0|, |i0|]` around the reference.
///
/// * `w_0gt1` - weight of the symmetric squared difference
/// * `w_0lt1` - weight of the half-open penalty
fn l2_diff_asymmetric(i0: &ImageF, i1: &ImageF, w_0gt1: f32, w_0lt1: f32, diffmap: &mut ImageF) {
    if w_0gt1 == 0.0 && w_0lt1 == 0.0 {
        return;
    }

    let vw_0gt1 = w_0gt1 * 0.8;
    let vw_0lt1 = w_0lt1 * 0.8;

    for y in 0..i0.height() {
        let row0 = i0.row(y);
        let row1 = i1.row(y);
        for ((d, &val0), &val1) in diffmap.row_mut(y).iter_mut().zip(row0).zip(row1) {
            // Primary symmetric quadratic objective
            let diff = val0 - val1;
            let mut total = *d + diff * diff * vw_0gt1;

            // Secondary half-open quadratic objectives
            let fabs0 = val0.abs();
            let too_small = 0.4 * fabs0;
            let too_big = fabs0;

            let v = if val0 < 0.0 {
                if val1 > -too_small {
                    val1 + too_small
                } else if val1 < -too_big {
                    -val1 - too_big
                } else {
                    0.0
                }
            } else if val1 < too_small {
                too_small - val1
            } else if val1 > too_big {
                val1 - too_big
            } else {
                0.0
            };

            total += vw_0lt1 * v * v;
            *d = total;
        }
    }
}

fn accumulate(src: &ImageF, dst: &mut ImageF) {
    for y in 0..src.height() {
        for (d, &s) in dst.row_mut(y).iter_mut().zip(src.row(y)) {
            *d += s;
        }
    }
}

/// AC differences of all bands, one plane per opponent channel.
///
/// `hf_asymmetry` scales the symmetric weight up and the half-open weight
/// down: UHF by `a`, HF by `sqrt(a)`. Values above 1.0 penalize new
/// high-frequency artifacts more than blurring.
fn compute_psycho_diff_malta(ps0: &PsychoImage, ps1: &PsychoImage, hf_asymmetry: f32) -> Image3F {
    let mut block_diff_ac = Image3F::new(ps0.width(), ps0.height());
    let asym = f64::from(hf_asymmetry);
    let sqrt_asym = asym.sqrt();

    // (plane, reference band, distorted band, w_0gt1, w_0lt1, norm, filter)
    #[rustfmt::skip]
    let malta_terms: [(usize, &ImageF, &ImageF, f64, f64, f64, MaltaKind); 6] = [
        (1, &ps0.uhf[1], &ps1.uhf[1], W_UHF_MALTA * asym, W_UHF_MALTA / asym, NORM1_UHF, MaltaKind::Hf),
        (0, &ps0.uhf[0], &ps1.uhf[0], W_UHF_MALTA_X * asym, W_UHF_MALTA_X / asym, NORM1_UHF_X, MaltaKind::Hf),
        (1, &ps0.hf[1], &ps1.hf[1], W_HF_MALTA * sqrt_asym, W_HF_MALTA / sqrt_asym, NORM1_HF, MaltaKind::Lf),
        (0, &ps0.hf[0], &ps1.hf[0], W_HF_MALTA_X * sqrt_asym, W_HF_MALTA_X / sqrt_asym, NORM1_HF_X, MaltaKind::Lf),
        (1, ps0.mf.plane(1), ps1.mf.plane(1), W_MF_MALTA, W_MF_MALTA, NORM1_MF, MaltaKind::Lf),
        (0, ps0.mf.plane(0), ps1.mf.plane(0), W_MF_MALTA_X, W_MF_MALTA_X, NORM1_MF_X, MaltaKind::Lf),
    ];
    for (plane, lum0, lum1, w_0gt1, w_0lt1, norm1, kind) in malta_terms {
        let diff = malta_diff_map(lum0, lum1, w_0gt1, w_0lt1, norm1, kind);
        accumulate(&diff, block_diff_ac.plane_mut(plane));
    }

    // HF L2 terms (X and Y, no blue)
    for c in 0..2 {
        let w = WMUL[c] as f32;
        l2_diff_asymmetric(
            &ps0.hf[c],
            &ps1.hf[c],
            w * hf_asymmetry,
            w / hf_asymmetry,
            block_diff_ac.plane_mut(c),
        );
    }

    for c in 0..3 {
        l2_diff(
            ps0.mf.plane(c),
            ps1.mf.plane(c),
            WMUL[3 + c] as f32,
            block_diff_ac.plane_mut(c),
        );
    }

    block_diff_ac
}

/// Builds the reference mask, adding the mask difference to AC-Y.
fn mask_psycho_image(ps0: &PsychoImage, ps1: &PsychoImage, diff_ac: &mut ImageF) -> ImageF {
    let mask0 = combine_channels_for_masking(&ps0.hf, &ps0.uhf);
    let mask1 = combine_channels_for_masking(&ps1.hf, &ps1.uhf);
    compute_mask(&mask0, &mask1, Some(diff_ac))
}

/// `sqrt(DC * dc_mask + AC * ac_mask)`, X scaled by `xmul`.
///
/// Channel terms are summed X, Y, B for DC and then for AC.
fn combine_channels_to_diffmap(
    mask: &ImageF,
    block_diff_dc: &Image3F,
    block_diff_ac: &Image3F,
    xmul: f32,
) -> ImageF {
    let width = mask.width();
    let height = mask.height();
    let mut diffmap = ImageF::new(width, height);

    for y in 0..height {
        let mask_row = mask.row(y);
        let dc = [
            block_diff_dc.plane_row(0, y),
            block_diff_dc.plane_row(1, y),
            block_diff_dc.plane_row(2, y),
        ];
        let ac = [
            block_diff_ac.plane_row(0, y),
            block_diff_ac.plane_row(1, y),
            block_diff_ac.plane_row(2, y),
        ];
        let out = diffmap.row_mut(y);

        for x in 0..width {
            let val = f64::from(mask_row[x]);
            let maskval = mask_y(val) as f32;
            let dc_maskval = mask_dc_y(val) as f32;

            let dc_masked =
                dc[0][x] * xmul * dc_maskval + dc[1][x] * dc_maskval + dc[2][x] * dc_maskval;
            let ac_masked = ac[0][x] * xmul * maskval + ac[1][x] * maskval + ac[2][x] * maskval;
            out[x] = (dc_masked + ac_masked).sqrt();
        }
    }

    diffmap
}

fn single_resolution_diffmap(
    ps0: &PsychoImage,
    ps1: &PsychoImage,
    params: &ButteraugliParams,
) -> ImageF {
    let width = ps0.width();
    let height = ps0.height();

    let mut block_diff_ac = compute_psycho_diff_malta(ps0, ps1, params.hf_asymmetry());
    let mask = mask_psycho_image(ps0, ps1, block_diff_ac.plane_mut(1));

    let mut block_diff_dc = Image3F::new(width, height);
    for c in 0..3 {
        l2_diff(
            ps0.lf.plane(c),
            ps1.lf.plane(c),
            WMUL[6 + c] as f32,
            block_diff_dc.plane_mut(c),
        );
    }

    combine_channels_to_diffmap(&mask, &block_diff_dc, &block_diff_ac, params.xmul())
}

/// Per-pixel distance between two decompositions at one resolution.
#[must_use]
///
/// Masking is driven by `ps0`, the reference.
pub fn diff_bands(
    ps0: &PsychoImage,
    ps1: &PsychoImage,
    params: &ButteraugliParams,
) -> DistanceMap {
    DistanceMap::new(single_resolution_diffmap(ps0, ps1, params))
}

/// Blends a half-resolution map into `dest` with nearest-neighbor upsampling.
///
/// `dest = dest * (1 - 0.3 * weight) + weight * src`
fn add_supersampled_2x(src: &ImageF, weight: f32, dest: &mut ImageF) {
    let blend = 1.0 - SUBSAMPLE_MIXING * weight;
    let src_w = src.width();
    let src_h = src.height();

    for y in 0..dest.height() {
        let src_row = src.row((y / 2).min(src_h - 1));
        for (x, d) in dest.row_mut(y).iter_mut().enumerate() {
            *d = *d * blend + weight * src_row[(x / 2).min(src_w - 1)];
        }
    }
}

/// Frequency decomposition of one image at full and, optionally, half
/// resolution.
#[derive(Debug, Clone)]
pub(crate) struct Levels {
    full: PsychoImage,
    half: Option<PsychoImage>,
}

fn decompose(
    linear: &LinearImage,
    intensity_target: f32,
    cancel: &CancelToken,
) -> Result<PsychoImage, ButteraugliError> {
    cancel.check()?;
    let xyb = to_opponent_space(linear, intensity_target);
    cancel.check()?;
    separate_frequencies_cancellable(&xyb, cancel)
}

fn decompose_levels(
    linear: &LinearImage,
    params: &ButteraugliParams,
    cancel: &CancelToken,
) -> Result<Levels, ButteraugliError> {
    let it = params.intensity_target();
    let multires = !params.single_resolution()
        && linear.width() >= MIN_SIZE_FOR_SUBSAMPLE
        && linear.height() >= MIN_SIZE_FOR_SUBSAMPLE;

    if !multires {
        return Ok(Levels {
            full: decompose(linear, it, cancel)?,
            half: None,
        });
    }

    let (full, half) = rayon::join(
        || decompose(linear, it, cancel),
        || decompose(&linear.subsample_2x(), it, cancel),
    );
    Ok(Levels {
        full: full?,
        half: Some(half?),
    })
}

fn diff_levels(
    reference: &Levels,
    distorted: &Levels,
    params: &ButteraugliParams,
    cancel: &CancelToken,
) -> Result<ImageF, ButteraugliError> {
    let diffmap = match (&reference.half, &distorted.half) {
        (Some(ref_half), Some(dis_half)) => {
            let (full, half) = rayon::join(
                || diff_bands(&reference.full, &distorted.full, params),
                || diff_bands(ref_half, dis_half, params),
            );
            let (mut full, half) = (full.into_image(), half.into_image());
            trace!(
                half_width = half.width(),
                half_height = half.height(),
                "blending half resolution"
            );
            add_supersampled_2x(&half, SUBSAMPLE_WEIGHT, &mut full);
            full
        }
        _ => diff_bands(&reference.full, &distorted.full, params).into_image(),
    };
    cancel.check()?;
    Ok(diffmap)
}

/// Reference-side state reused across comparisons.
#[derive(Debug, Clone)]
pub(crate) struct ReferenceState {
    original: LinearImage,
    levels: Levels,
}

impl ReferenceState {
    pub(crate) fn width(&self) -> usize {
        self.original.width()
    }

    pub(crate) fn height(&self) -> usize {
        self.original.height()
    }
}

fn needs_padding(linear: &LinearImage) -> bool {
    linear.width() < MIN_FRAME_SIZE || linear.height() < MIN_FRAME_SIZE
}

/// The image the pipeline actually sees: small frames are embedded in a
/// larger canvas filled from the reference's edges.
fn canvas<'a>(linear: &'a LinearImage, reference: &LinearImage) -> Cow<'a, LinearImage> {
    if needs_padding(reference) {
        Cow::Owned(linear.padded_with(reference, MIN_FRAME_SIZE))
    } else {
        Cow::Borrowed(linear)
    }
}

pub(crate) fn prepare_reference(
    reference: LinearImage,
    params: &ButteraugliParams,
    cancel: &CancelToken,
) -> Result<ReferenceState, ButteraugliError> {
    let levels = decompose_levels(&canvas(&reference, &reference), params, cancel)?;
    Ok(ReferenceState {
        original: reference,
        levels,
    })
}

fn finish(diffmap: ImageF, reference: &LinearImage) -> Result<DistanceMap, ButteraugliError> {
    let diffmap = if needs_padding(reference) {
        diffmap.crop(reference.width(), reference.height())
    } else {
        diffmap
    };
    if diffmap.rows().flatten().any(|v| !v.is_finite()) {
        return Err(ButteraugliError::ComputeFailure(
            "distance map contains non-finite values".into(),
        ));
    }
    Ok(DistanceMap::new(diffmap))
}

fn check_same_size(a: &LinearImage, b: &LinearImage) -> Result<(), ButteraugliError> {
    if a.width() != b.width() || a.height() != b.height() {
        return Err(ButteraugliError::SizeMismatch {
            w1: a.width(),
            h1: a.height(),
            w2: b.width(),
            h2: b.height(),
        });
    }
    Ok(())
}

/// Compares a distorted image against a prepared reference.
pub(crate) fn compare_prepared(
    state: &ReferenceState,
    distorted: &LinearImage,
    params: &ButteraugliParams,
    cancel: &CancelToken,
) -> Result<DistanceMap, ButteraugliError> {
    check_same_size(&state.original, distorted)?;
    if state.original == *distorted {
        return Ok(DistanceMap::zeros(distorted.width(), distorted.height()));
    }

    let levels = decompose_levels(&canvas(distorted, &state.original), params, cancel)?;
    let diffmap = diff_levels(&state.levels, &levels, params, cancel)?;
    finish(diffmap, &state.original)
}

/// Full comparison of two linear images.
///
/// Both images are decomposed concurrently; each branch is sequential, so
/// the result does not depend on the number of threads.
pub(crate) fn compute_distance_map(
    reference: &LinearImage,
    distorted: &LinearImage,
    params: &ButteraugliParams,
    cancel: &CancelToken,
) -> Result<DistanceMap, ButteraugliError> {
    check_same_size(reference, distorted)?;
    if reference == distorted {
        return Ok(DistanceMap::zeros(reference.width(), reference.height()));
    }

    let (ref_levels, dis_levels) = rayon::join(
        || decompose_levels(&canvas(reference, reference), params, cancel),
        || decompose_levels(&canvas(distorted, reference), params, cancel),
    );
    let diffmap = diff_levels(&ref_levels?, &dis_levels?, params, cancel)?;
    finish(diffmap, reference)
}
