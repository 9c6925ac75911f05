//! Common test utilities for engine tests.

#![allow(dead_code)]

pub mod generators;

use butteraugli_engine::{ComputeResult, Engine, PixelFormat, RawFrame};

/// Compares two packed 8-bit RGB frames with a default engine.
#[track_caller]
pub fn compare_rgb8(width: usize, height: usize, reference: &[u8], distorted: &[u8]) -> ComputeResult {
    compare_rgb8_with(&Engine::new(), width, height, reference, distorted)
}

#[track_caller]
pub fn compare_rgb8_with(
    engine: &Engine,
    width: usize,
    height: usize,
    reference: &[u8],
    distorted: &[u8],
) -> ComputeResult {
    let fmt = PixelFormat::rgb8();
    engine
        .compute(
            &RawFrame::new(width, height, reference, fmt),
            &RawFrame::new(width, height, distorted, fmt),
        )
        .unwrap_or_else(|e| panic!("compute failed for {width}x{height}: {e}"))
}

/// Installs a test subscriber when `RUST_LOG` is set.
pub fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_some() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}
