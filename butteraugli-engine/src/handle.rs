//! Explicitly released engine and result handles.
//!
//! This is the surface a foreign-language binding wraps: every resource
//! has an idempotent `destroy` that is the primary way to release it.
//! `Drop` releases anything the caller forgot and logs it.
//!
//! ```rust
//! use butteraugli_engine::format::PixelFormat;
//! use butteraugli_engine::handle::EngineHandle;
//!
//! let mut engine = EngineHandle::create();
//! engine.set_intensity_target(80.0)?;
//!
//! let fmt = PixelFormat::rgb8();
//! let reference = vec![128u8; 16 * 16 * 3];
//! let distorted = vec![130u8; 16 * 16 * 3];
//! let mut result = engine.compute(16, 16, &reference, fmt, &distorted, fmt)?;
//! assert!(result.max_distance()? >= result.distance(3.0)?);
//!
//! result.destroy();
//! result.destroy();
//! engine.destroy();
//! # Ok::<(), butteraugli_engine::ButteraugliError>(())
//! ```

use tracing::debug;

use crate::engine::{ComputeResult, Engine};
use crate::format::PixelFormat;
use crate::ingest::RawFrame;
use crate::ButteraugliError;

/// Owning handle to an [`Engine`].
#[derive(Debug)]
pub struct EngineHandle {
    engine: Option<Engine>,
}

impl EngineHandle {
    #[must_use]
    pub fn create() -> Self {
        debug!("engine handle created");
        Self {
            engine: Some(Engine::new()),
        }
    }

    /// Wraps an already configured engine.
    #[must_use]
    pub fn from_engine(engine: Engine) -> Self {
        Self {
            engine: Some(engine),
        }
    }

    /// Releases the engine. Calling it again does nothing.
    pub fn destroy(&mut self) {
        if self.engine.take().is_some() {
            debug!("engine handle destroyed");
        }
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.engine.is_none()
    }

    fn engine(&self) -> Result<&Engine, ButteraugliError> {
        self.engine.as_ref().ok_or(ButteraugliError::Released)
    }

    pub fn set_intensity_target(&self, intensity_target: f32) -> Result<(), ButteraugliError> {
        self.engine()?.set_intensity_target(intensity_target)
    }

    pub fn set_hf_asymmetry(&self, hf_asymmetry: f32) -> Result<(), ButteraugliError> {
        self.engine()?.set_hf_asymmetry(hf_asymmetry)
    }

    /// Compares two frames of the same size.
    ///
    /// On error no result handle exists.
    pub fn compute(
        &self,
        width: usize,
        height: usize,
        reference: &[u8],
        reference_format: PixelFormat,
        distorted: &[u8],
        distorted_format: PixelFormat,
    ) -> Result<ResultHandle, ButteraugliError> {
        let engine = self.engine()?;
        let result = engine.compute(
            &RawFrame::new(width, height, reference, reference_format),
            &RawFrame::new(width, height, distorted, distorted_format),
        )?;
        Ok(ResultHandle {
            result: Some(result),
        })
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if self.engine.take().is_some() {
            debug!("engine handle released on drop without destroy");
        }
    }
}

/// Owning handle to one [`ComputeResult`].
#[derive(Debug)]
pub struct ResultHandle {
    result: Option<ComputeResult>,
}

impl ResultHandle {
    /// Releases the result. Calling it again does nothing.
    pub fn destroy(&mut self) {
        if self.result.take().is_some() {
            debug!("result handle destroyed");
        }
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.result.is_none()
    }

    fn result(&self) -> Result<&ComputeResult, ButteraugliError> {
        self.result.as_ref().ok_or(ButteraugliError::Released)
    }

    pub fn max_distance(&self) -> Result<f64, ButteraugliError> {
        Ok(self.result()?.max_distance())
    }

    /// Lp-norm of the distance map; `pnorm` must be positive.
    pub fn distance(&self, pnorm: f64) -> Result<f64, ButteraugliError> {
        self.result()?.distance(pnorm)
    }

    /// Takes the result out, leaving the handle released.
    pub fn take(&mut self) -> Result<ComputeResult, ButteraugliError> {
        self.result.take().ok_or(ButteraugliError::Released)
    }
}

impl Drop for ResultHandle {
    fn drop(&mut self) {
        if self.result.take().is_some() {
            debug!("result handle released on drop without destroy");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames() -> (Vec<u8>, Vec<u8>) {
        let reference = vec![100u8; 10 * 10 * 3];
        let mut distorted = reference.clone();
        distorted[0] = 255;
        (reference, distorted)
    }

    #[test]
    fn test_double_destroy_engine() {
        let mut engine = EngineHandle::create();
        engine.destroy();
        engine.destroy();
        assert!(engine.is_released());
        assert_eq!(
            engine.set_intensity_target(100.0),
            Err(ButteraugliError::Released)
        );
    }

    #[test]
    fn test_double_destroy_result() {
        let engine = EngineHandle::create();
        let (a, b) = frames();
        let fmt = PixelFormat::rgb8();
        let mut result = engine.compute(10, 10, &a, fmt, &b, fmt).unwrap();
        assert!(result.max_distance().unwrap() > 0.0);
        result.destroy();
        result.destroy();
        assert_eq!(result.max_distance(), Err(ButteraugliError::Released));
        assert_eq!(result.distance(2.0), Err(ButteraugliError::Released));
    }

    #[test]
    fn test_compute_after_destroy() {
        let mut engine = EngineHandle::create();
        engine.destroy();
        let (a, b) = frames();
        let fmt = PixelFormat::rgb8();
        assert!(matches!(
            engine.compute(10, 10, &a, fmt, &b, fmt),
            Err(ButteraugliError::Released)
        ));
    }

    #[test]
    fn test_result_outlives_engine() {
        let mut engine = EngineHandle::create();
        let (a, b) = frames();
        let fmt = PixelFormat::rgb8();
        let result = engine.compute(10, 10, &a, fmt, &b, fmt).unwrap();
        engine.destroy();
        assert!(result.distance(3.0).unwrap() <= result.max_distance().unwrap());
    }

    #[test]
    fn test_take_releases() {
        let engine = EngineHandle::create();
        let (a, b) = frames();
        let fmt = PixelFormat::rgb8();
        let mut handle = engine.compute(10, 10, &a, fmt, &b, fmt).unwrap();
        let result = handle.take().unwrap();
        assert!(handle.is_released());
        assert!(result.max_distance() > 0.0);
    }
}
