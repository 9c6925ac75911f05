//! # Butteraugli engine
//!
//! Perceptual distance between a reference and a distorted image, using
//! the butteraugli model, behind an explicit engine/result handle API.
//!
//! The model is based on:
//! - Opsin: dynamics of photosensitive chemicals in the retina
//! - XYB: hybrid opponent/trichromatic color space
//! - Visual masking: how features hide other features
//! - Multi-scale analysis: UHF, HF, MF, LF frequency components
//!
//! ## Quality Thresholds
//!
//! - Score < 1.0: Images are perceived as identical
//! - Score 1.0-2.0: Subtle differences may be noticeable
//! - Score > 2.0: Visible difference between images
//!
//! ## Example
//!
//! ```rust
//! use butteraugli_engine::{Engine, PixelFormat, RawFrame};
//!
//! let width = 16;
//! let height = 16;
//! let reference: Vec<u8> = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
//! let mut distorted = reference.clone();
//! distorted[100] = distorted[100].wrapping_add(40);
//!
//! let engine = Engine::new();
//! let fmt = PixelFormat::rgb8();
//! let result = engine.compute(
//!     &RawFrame::new(width, height, &reference, fmt),
//!     &RawFrame::new(width, height, &distorted, fmt),
//! )?;
//!
//! assert!(result.max_distance() > 0.0);
//! assert!(result.distance(3.0)? <= result.max_distance());
//! # Ok::<(), butteraugli_engine::ButteraugliError>(())
//! ```
//!
//! ## Features
//!
//! - **`internals`**: Expose internal modules for testing/benchmarking (unstable API)
//!
//! ## References
//!
//! - <https://github.com/google/butteraugli>
//! - <https://github.com/libjxl/libjxl>

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// Model constants are kept with their published precision
#![allow(clippy::unreadable_literal)]
#![allow(clippy::inconsistent_digit_grouping)]
#![allow(clippy::excessive_precision)]
// mul_add would change results
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::float_cmp)]
#![allow(clippy::imprecise_flops)]

// Internal modules - exposed with "internals" feature for testing/benchmarking
#[cfg(feature = "internals")]
pub mod blur;
#[cfg(not(feature = "internals"))]
pub(crate) mod blur;

#[cfg(feature = "internals")]
pub mod consts;
#[cfg(not(feature = "internals"))]
pub(crate) mod consts;

#[cfg(feature = "internals")]
pub mod diff;
#[cfg(not(feature = "internals"))]
pub(crate) mod diff;

#[cfg(feature = "internals")]
pub mod malta;
#[cfg(not(feature = "internals"))]
pub(crate) mod malta;

#[cfg(feature = "internals")]
pub mod mask;
#[cfg(not(feature = "internals"))]
pub(crate) mod mask;

pub mod distance;
pub mod engine;
pub mod format;
pub mod handle;
pub mod image;
pub mod ingest;
pub mod opsin;
pub mod psycho;

pub use consts::{BUTTERAUGLI_BAD, BUTTERAUGLI_GOOD};
pub use diff::diff_bands;
pub use distance::{fuzzy_class, score_to_quality, DistanceMap};
pub use engine::{CancelToken, ComputeResult, Engine, EngineConfig, PreparedReference};
pub use format::{DataType, Endianness, PixelFormat};
pub use handle::{EngineHandle, ResultHandle};
pub use image::{Image3F, ImageF};
pub use ingest::{ingest, srgb_to_linear, LinearImage, RawFrame};
pub use opsin::{to_opponent_space, OpponentImage};
pub use psycho::{separate_frequencies, Band, PsychoImage};

// Re-export imgref and rgb types for convenience
pub use imgref::{Img, ImgRef, ImgVec};
pub use rgb::{RGB, RGB8};

use serde::{Deserialize, Serialize};

/// Error type for engine operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ButteraugliError {
    /// Unsupported or inconsistent frame layout.
    #[error("invalid frame format: {0}")]
    Format(String),
    /// Frame buffer is shorter than its declared layout requires.
    #[error("buffer too small: need {expected} bytes, got {actual}")]
    BufferTooSmall {
        /// Required length in bytes.
        expected: usize,
        /// Provided length in bytes.
        actual: usize,
    },
    /// Reference and distorted frames differ in size.
    #[error("image dimensions don't match: {w1}x{h1} vs {w2}x{h2}")]
    SizeMismatch {
        /// Reference width.
        w1: usize,
        /// Reference height.
        h1: usize,
        /// Distorted width.
        w2: usize,
        /// Distorted height.
        h2: usize,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The computation produced an unusable result.
    #[error("computation failed: {0}")]
    ComputeFailure(String),
    #[error("computation cancelled")]
    Cancelled,
    /// The handle was already destroyed.
    #[error("handle already released")]
    Released,
}

/// Butteraugli comparison parameters.
///
/// Use the builder pattern to construct:
/// ```rust
/// use butteraugli_engine::ButteraugliParams;
///
/// let params = ButteraugliParams::new()
///     .with_intensity_target(250.0)  // HDR display
///     .with_hf_asymmetry(1.5)        // Penalize new artifacts more
///     .with_single_resolution(true); // Skip the half-resolution pass
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButteraugliParams {
    hf_asymmetry: f32,
    xmul: f32,
    intensity_target: f32,
    single_resolution: bool,
}

impl Default for ButteraugliParams {
    fn default() -> Self {
        Self {
            hf_asymmetry: 1.0,
            xmul: 1.0,
            intensity_target: 80.0,
            single_resolution: false,
        }
    }
}

impl ButteraugliParams {
    /// Creates a new `ButteraugliParams` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the intensity target (display brightness in nits).
    #[must_use]
    pub fn with_intensity_target(mut self, intensity_target: f32) -> Self {
        self.intensity_target = intensity_target;
        self
    }

    /// Sets the HF asymmetry multiplier.
    /// Values > 1.0 penalize new high-frequency artifacts more than blurring.
    #[must_use]
    pub fn with_hf_asymmetry(mut self, hf_asymmetry: f32) -> Self {
        self.hf_asymmetry = hf_asymmetry;
        self
    }

    /// Sets the X channel multiplier.
    #[must_use]
    pub fn with_xmul(mut self, xmul: f32) -> Self {
        self.xmul = xmul;
        self
    }

    /// Compares at full resolution only.
    #[must_use]
    pub fn with_single_resolution(mut self, single_resolution: bool) -> Self {
        self.single_resolution = single_resolution;
        self
    }

    /// Returns the HF asymmetry multiplier.
    #[must_use]
    pub fn hf_asymmetry(&self) -> f32 {
        self.hf_asymmetry
    }

    /// Returns the X channel multiplier.
    #[must_use]
    pub fn xmul(&self) -> f32 {
        self.xmul
    }

    /// Returns the intensity target in nits.
    #[must_use]
    pub fn intensity_target(&self) -> f32 {
        self.intensity_target
    }

    #[must_use]
    pub fn single_resolution(&self) -> bool {
        self.single_resolution
    }

    /// Checks that every tunable is usable.
    ///
    /// # Errors
    /// [`ButteraugliError::InvalidArgument`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ButteraugliError> {
        if !(self.intensity_target.is_finite() && self.intensity_target > 0.0) {
            return Err(ButteraugliError::InvalidArgument(format!(
                "intensity_target must be positive and finite, got {}",
                self.intensity_target
            )));
        }
        if !(self.hf_asymmetry.is_finite() && self.hf_asymmetry > 0.0) {
            return Err(ButteraugliError::InvalidArgument(format!(
                "hf_asymmetry must be positive and finite, got {}",
                self.hf_asymmetry
            )));
        }
        if !(self.xmul.is_finite() && self.xmul >= 0.0) {
            return Err(ButteraugliError::InvalidArgument(format!(
                "xmul must be non-negative and finite, got {}",
                self.xmul
            )));
        }
        Ok(())
    }
}
