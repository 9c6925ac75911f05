//! Per-pixel distance maps and their scalar summaries.

use imgref::ImgVec;

use crate::image::ImageF;
use crate::ButteraugliError;

/// Non-negative perceptual distance per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMap {
    map: ImageF,
}

impl DistanceMap {
    pub(crate) fn new(map: ImageF) -> Self {
        Self { map }
    }

    pub(crate) fn zeros(width: usize, height: usize) -> Self {
        Self {
            map: ImageF::new(width, height),
        }
    }

    pub(crate) fn into_image(self) -> ImageF {
        self.map
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.map.width()
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.map.height()
    }

    /// Distance at one pixel.
    ///
    /// # Panics
    /// Panics if (x, y) is outside the map.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.map.get(x, y)
    }

    /// Row `y`, left to right.
    #[must_use]
    pub fn row(&self, y: usize) -> &[f32] {
        self.map.row(y)
    }

    /// Copies the map into a tightly packed image.
    #[must_use]
    pub fn to_imgvec(&self) -> ImgVec<f32> {
        self.map.clone().into_imgvec()
    }

    /// Largest per-pixel distance.
    #[must_use]
    pub fn max_distance(&self) -> f64 {
        let max = self
            .map
            .rows()
            .flatten()
            .fold(0.0f32, |acc, &v| if v > acc { v } else { acc });
        f64::from(max)
    }

    /// Power mean `(mean v^p)^(1/p)` over all pixels.
    ///
    /// Values are scaled by the maximum before exponentiation so large `p`
    /// cannot overflow, and the result is clamped to the maximum. Sums run
    /// row by row in `f64`.
    ///
    /// # Errors
    /// [`ButteraugliError::InvalidArgument`] if `p` is not a positive finite
    /// number.
    pub fn lp_norm(&self, p: f64) -> Result<f64, ButteraugliError> {
        if !(p.is_finite() && p > 0.0) {
            return Err(ButteraugliError::InvalidArgument(format!(
                "pnorm must be positive and finite, got {p}"
            )));
        }
        let max = self.max_distance();
        if max == 0.0 {
            return Ok(0.0);
        }

        let mut sum = 0.0f64;
        for row in self.map.rows() {
            for &v in row {
                sum += (f64::from(v) / max).powf(p);
            }
        }
        let count = (self.width() * self.height()) as f64;
        let norm = max * (sum / count).powf(1.0 / p);
        Ok(norm.min(max))
    }
}

/// Maps a distance onto a rough 0-100 quality scale.
///
/// 0.0 maps to 100 and 4.0 or more maps to 0.
#[must_use]
pub fn score_to_quality(score: f64) -> f64 {
    (100.0 - score * 25.0).clamp(0.0, 100.0)
}

/// Fuzzy class of a distance: 2.0 for a perfect match, 1.0 for "ok" and
/// 0.0 for bad.
#[must_use]
pub fn fuzzy_class(score: f64) -> f64 {
    (2.0 - score * 0.5).clamp(0.0, 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(values: &[f32], width: usize) -> DistanceMap {
        DistanceMap::new(ImageF::from_vec(values.to_vec(), width, values.len() / width))
    }

    #[test]
    fn test_max_and_mean() {
        let map = map_of(&[1.0, 3.0, 0.0, 2.0], 2);
        assert_eq!(map.max_distance(), 3.0);
        assert!((map.lp_norm(1.0).unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_uniform_map_norm_equals_max() {
        let map = map_of(&[0.7; 9], 3);
        for p in [0.5, 1.0, 3.0, 50.0] {
            let lp = map.lp_norm(p).unwrap();
            assert!((lp - map.max_distance()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_norm_never_exceeds_max() {
        let map = map_of(&[0.1, 5.0, 2.5, 0.0, 4.9, 1.0], 3);
        let max = map.max_distance();
        for p in [0.25, 1.0, 2.0, 8.0, 1e3, 1e9] {
            let lp = map.lp_norm(p).unwrap();
            assert!(lp <= max, "p={p} lp={lp} max={max}");
            assert!(lp.is_finite());
        }
    }

    #[test]
    fn test_norm_grows_with_p() {
        let map = map_of(&[0.1, 5.0, 2.5, 0.0], 2);
        let l1 = map.lp_norm(1.0).unwrap();
        let l3 = map.lp_norm(3.0).unwrap();
        assert!(l3 > l1);
    }

    #[test]
    fn test_invalid_pnorm() {
        let map = map_of(&[1.0], 1);
        for p in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                map.lp_norm(p),
                Err(ButteraugliError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_zero_map() {
        let map = DistanceMap::zeros(4, 4);
        assert_eq!(map.max_distance(), 0.0);
        assert_eq!(map.lp_norm(3.0).unwrap(), 0.0);
    }

    #[test]
    fn test_score_to_quality() {
        assert!((score_to_quality(0.0) - 100.0).abs() < 0.001);
        assert!((score_to_quality(4.0) - 0.0).abs() < 0.001);
        assert!((score_to_quality(2.0) - 50.0).abs() < 0.001);
    }

    #[test]
    fn test_fuzzy_class() {
        assert!((fuzzy_class(0.0) - 2.0).abs() < 0.001);
        assert!((fuzzy_class(2.0) - 1.0).abs() < 0.001);
        assert!((fuzzy_class(4.0) - 0.0).abs() < 0.001);
    }
}
