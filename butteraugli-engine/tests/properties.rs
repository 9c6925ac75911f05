//! Property-based tests over random frames.

mod common;

use butteraugli_engine::{Engine, PixelFormat, RawFrame};
use common::generators::{distort_noise, gen_noise};
use proptest::prelude::*;

fn frames(max_side: usize) -> impl Strategy<Value = (usize, usize, u64, u8)> {
    (1..=max_side, 1..=max_side, any::<u64>(), 0u8..=60)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Max distance bounds every Lp-norm, and the map covers the frame.
    #[test]
    fn max_bounds_lp_norm((width, height, seed, amplitude) in frames(24), p in 0.25f64..32.0) {
        let reference = gen_noise(width, height, seed);
        let distorted = distort_noise(&reference, amplitude, seed ^ 0x5eed);
        let fmt = PixelFormat::rgb8();
        let result = Engine::new()
            .compute(
                &RawFrame::new(width, height, &reference, fmt),
                &RawFrame::new(width, height, &distorted, fmt),
            )
            .unwrap();

        let max = result.max_distance();
        let lp = result.distance(p).unwrap();
        prop_assert!(max.is_finite() && max >= 0.0);
        prop_assert!(lp >= 0.0 && lp <= max, "p={} lp={} max={}", p, lp, max);
        prop_assert_eq!(result.distance_map().width(), width);
        prop_assert_eq!(result.distance_map().height(), height);
    }

    /// Byte-identical inputs give bit-identical outputs.
    #[test]
    fn compute_is_deterministic((width, height, seed, amplitude) in frames(20)) {
        let reference = gen_noise(width, height, seed);
        let distorted = distort_noise(&reference, amplitude, seed.wrapping_add(1));
        let fmt = PixelFormat::rgb8();
        let engine = Engine::new();
        let run = || {
            engine
                .compute(
                    &RawFrame::new(width, height, &reference, fmt),
                    &RawFrame::new(width, height, &distorted, fmt),
                )
                .unwrap()
        };
        let a = run();
        let b = run();
        prop_assert_eq!(a.max_distance().to_bits(), b.max_distance().to_bits());
        prop_assert_eq!(a.distance_map(), b.distance_map());
    }

    /// Comparing a frame with itself is always zero.
    #[test]
    fn identical_is_zero((width, height, seed, _amplitude) in frames(20)) {
        let data = gen_noise(width, height, seed);
        let fmt = PixelFormat::rgb8();
        let frame = RawFrame::new(width, height, &data, fmt);
        let result = Engine::new().compute(&frame, &frame).unwrap();
        prop_assert_eq!(result.max_distance(), 0.0);
        prop_assert_eq!(result.distance(2.0).unwrap(), 0.0);
    }

    /// Short buffers are rejected for every layout.
    #[test]
    fn short_buffer_rejected(
        width in 1usize..16,
        height in 1usize..16,
        channels in 1u32..=4,
        align in prop::sample::select(vec![0usize, 1, 4, 16]),
        missing in 1usize..8,
    ) {
        let fmt = PixelFormat::new(channels, butteraugli_engine::DataType::Uint16).with_align(align);
        let needed = fmt.required_len(width, height).unwrap();
        let data = vec![0u8; needed.saturating_sub(missing)];
        let full = vec![0u8; needed];
        let err = Engine::new()
            .compute(
                &RawFrame::new(width, height, &full, fmt),
                &RawFrame::new(width, height, &data, fmt),
            )
            .unwrap_err();
        let is_buffer_too_small =
            matches!(err, butteraugli_engine::ButteraugliError::BufferTooSmall { .. });
        prop_assert!(is_buffer_too_small);
    }
}
