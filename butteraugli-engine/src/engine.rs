//! Long-lived comparison engine.
//!
//! An [`Engine`] owns the tunables and, optionally, a dedicated worker
//! pool. Tunables sit behind a lock and are copied once at the start of
//! every computation, so an engine shared across threads can be
//! reconfigured while other threads compute.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use imgref::ImgRef;
use rgb::RGB8;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::{compare_prepared, compute_distance_map, prepare_reference, ReferenceState};
use crate::distance::DistanceMap;
use crate::ingest::{ingest, LinearImage, RawFrame};
use crate::{ButteraugliError, ButteraugliParams};

/// Cooperative cancellation flag shared between a caller and a running
/// computation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Computations notice at their next stage
    /// boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Returns [`ButteraugliError::Cancelled`] once cancellation was
    /// requested.
    pub fn check(&self) -> Result<(), ButteraugliError> {
        if self.is_cancelled() {
            Err(ButteraugliError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Engine construction settings.
///
/// ```rust
/// use butteraugli_engine::engine::EngineConfig;
///
/// let config: EngineConfig =
///     serde_json::from_str(r#"{ "params": { "intensity_target": 250.0 }, "threads": 2 }"#)?;
/// assert_eq!(config.threads, Some(2));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub params: ButteraugliParams,
    /// Size of a dedicated worker pool. `None` uses rayon's global pool.
    pub threads: Option<usize>,
}

fn build_thread_pool(threads: Option<usize>) -> Result<Option<rayon::ThreadPool>, ButteraugliError> {
    let Some(n) = threads else {
        return Ok(None);
    };
    if n == 0 {
        return Err(ButteraugliError::InvalidArgument(
            "threads must be >= 1 when set".into(),
        ));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .thread_name(|i| format!("butteraugli-{i}"))
        .build()
        .map(Some)
        .map_err(|e| ButteraugliError::ComputeFailure(format!("failed to build thread pool: {e}")))
}

/// Outcome of one comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeResult {
    max: f64,
    map: DistanceMap,
}

impl ComputeResult {
    fn new(map: DistanceMap) -> Self {
        Self {
            max: map.max_distance(),
            map,
        }
    }

    /// Largest per-pixel distance.
    #[must_use]
    pub fn max_distance(&self) -> f64 {
        self.max
    }

    /// Lp-norm of the distance map. See [`DistanceMap::lp_norm`].
    pub fn distance(&self, pnorm: f64) -> Result<f64, ButteraugliError> {
        self.map.lp_norm(pnorm)
    }

    #[must_use]
    pub fn distance_map(&self) -> &DistanceMap {
        &self.map
    }

    #[must_use]
    pub fn into_distance_map(self) -> DistanceMap {
        self.map
    }
}

/// Perceptual distance engine.
#[derive(Debug)]
pub struct Engine {
    params: RwLock<ButteraugliParams>,
    pool: Option<rayon::ThreadPool>,
}

impl Engine {
    /// Engine with default tunables on rayon's global pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            params: RwLock::new(ButteraugliParams::default()),
            pool: None,
        }
    }

    /// # Errors
    /// [`ButteraugliError::InvalidArgument`] for invalid tunables or a zero
    /// thread count, [`ButteraugliError::ComputeFailure`] if the pool cannot
    /// be created.
    pub fn with_config(config: EngineConfig) -> Result<Self, ButteraugliError> {
        config.params.validate()?;
        let pool = build_thread_pool(config.threads)?;
        debug!(threads = ?config.threads, params = ?config.params, "engine created");
        Ok(Self {
            params: RwLock::new(config.params),
            pool,
        })
    }

    /// Copy of the current tunables.
    #[must_use]
    pub fn params(&self) -> ButteraugliParams {
        *self.params.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(
        &self,
        f: impl FnOnce(ButteraugliParams) -> ButteraugliParams,
    ) -> Result<(), ButteraugliError> {
        let mut guard = self.params.write().unwrap_or_else(PoisonError::into_inner);
        let next = f(*guard);
        next.validate()?;
        *guard = next;
        debug!(params = ?next, "engine tunables updated");
        Ok(())
    }

    /// Display luminance in nits that linear 1.0 maps to. Affects only
    /// computations started afterwards.
    pub fn set_intensity_target(&self, intensity_target: f32) -> Result<(), ButteraugliError> {
        self.update(|p| p.with_intensity_target(intensity_target))
    }

    /// Relative weight of gained versus lost high-frequency detail.
    pub fn set_hf_asymmetry(&self, hf_asymmetry: f32) -> Result<(), ButteraugliError> {
        self.update(|p| p.with_hf_asymmetry(hf_asymmetry))
    }

    pub fn set_xmul(&self, xmul: f32) -> Result<(), ButteraugliError> {
        self.update(|p| p.with_xmul(xmul))
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Compares a distorted frame against a reference frame.
    ///
    /// # Errors
    /// Ingestion errors for either frame, [`ButteraugliError::SizeMismatch`]
    /// when the frames differ in size, [`ButteraugliError::ComputeFailure`]
    /// if the map is not finite.
    pub fn compute(
        &self,
        reference: &RawFrame<'_>,
        distorted: &RawFrame<'_>,
    ) -> Result<ComputeResult, ButteraugliError> {
        self.compute_with_cancel(reference, distorted, &CancelToken::new())
    }

    /// Like [`Engine::compute`], returning [`ButteraugliError::Cancelled`]
    /// if `cancel` fires before the computation completes.
    #[tracing::instrument(
        skip_all,
        fields(width = reference.width, height = reference.height)
    )]
    pub fn compute_with_cancel(
        &self,
        reference: &RawFrame<'_>,
        distorted: &RawFrame<'_>,
        cancel: &CancelToken,
    ) -> Result<ComputeResult, ButteraugliError> {
        let params = self.params();
        self.install(|| {
            let (reference, distorted) = rayon::join(|| ingest(reference), || ingest(distorted));
            let (reference, distorted) = (reference?, distorted?);
            debug!("frames ingested");
            compute_distance_map(&reference, &distorted, &params, cancel).map(ComputeResult::new)
        })
    }

    /// Compares two images already in linear RGB.
    #[tracing::instrument(
        skip_all,
        fields(width = reference.width(), height = reference.height())
    )]
    pub fn compute_linear(
        &self,
        reference: &LinearImage,
        distorted: &LinearImage,
    ) -> Result<ComputeResult, ButteraugliError> {
        reference.check_finite()?;
        distorted.check_finite()?;
        let params = self.params();
        self.install(|| {
            compute_distance_map(reference, distorted, &params, &CancelToken::new())
                .map(ComputeResult::new)
        })
    }

    /// Compares two 8-bit sRGB images.
    pub fn compute_srgb(
        &self,
        reference: ImgRef<'_, RGB8>,
        distorted: ImgRef<'_, RGB8>,
    ) -> Result<ComputeResult, ButteraugliError> {
        let reference = LinearImage::from_srgb8(reference)?;
        let distorted = LinearImage::from_srgb8(distorted)?;
        self.compute_linear(&reference, &distorted)
    }

    /// Ingests and decomposes a reference once for repeated comparisons.
    ///
    /// The tunables are captured now; later setter calls do not affect the
    /// prepared reference.
    #[tracing::instrument(skip_all, fields(width = reference.width, height = reference.height))]
    pub fn prepare_reference(
        &self,
        reference: &RawFrame<'_>,
    ) -> Result<PreparedReference<'_>, ButteraugliError> {
        let params = self.params();
        let state = self.install(|| {
            let linear = ingest(reference)?;
            prepare_reference(linear, &params, &CancelToken::new())
        })?;
        debug!("reference prepared");
        Ok(PreparedReference {
            engine: self,
            state,
            params,
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// A reference frame decomposed ahead of time.
#[derive(Debug)]
pub struct PreparedReference<'e> {
    engine: &'e Engine,
    state: ReferenceState,
    params: ButteraugliParams,
}

impl PreparedReference<'_> {
    #[must_use]
    pub fn width(&self) -> usize {
        self.state.width()
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.state.height()
    }

    /// Compares a distorted frame against this reference.
    pub fn compare(&self, distorted: &RawFrame<'_>) -> Result<ComputeResult, ButteraugliError> {
        self.compare_with_cancel(distorted, &CancelToken::new())
    }

    pub fn compare_with_cancel(
        &self,
        distorted: &RawFrame<'_>,
        cancel: &CancelToken,
    ) -> Result<ComputeResult, ButteraugliError> {
        self.engine.install(|| {
            let distorted = ingest(distorted)?;
            compare_prepared(&self.state, &distorted, &self.params, cancel).map(ComputeResult::new)
        })
    }
}
