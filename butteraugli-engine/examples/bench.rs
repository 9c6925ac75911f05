use butteraugli_engine::{Engine, PixelFormat, RawFrame};
use std::time::Instant;

fn main() {
    let width = 512;
    let height = 512;

    // Gradient frames with a small structured difference
    let mut reference = vec![0u8; width * height * 3];
    let mut distorted = vec![0u8; width * height * 3];

    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) * 3;
            let val = ((x as f32 / width as f32) * 200.0) as u8;
            reference[idx..idx + 3].fill(val);
            distorted[idx..idx + 3].fill(val.saturating_add(((x * y) % 10) as u8));
        }
    }

    let fmt = PixelFormat::rgb8();
    let ref_frame = RawFrame::new(width, height, &reference, fmt);
    let dis_frame = RawFrame::new(width, height, &distorted, fmt);
    let engine = Engine::new();

    // Warmup
    let result = engine.compute(&ref_frame, &dis_frame).expect("compute");

    let iterations = 10;
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = engine.compute(&ref_frame, &dis_frame);
    }
    let elapsed = start.elapsed();

    println!(
        "512x512 image: {:.2}ms per iteration ({} iterations, total {:.2}s)",
        elapsed.as_secs_f64() * 1000.0 / iterations as f64,
        iterations,
        elapsed.as_secs_f64()
    );

    let prepared = engine.prepare_reference(&ref_frame).expect("prepare");
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = prepared.compare(&dis_frame);
    }
    let elapsed = start.elapsed();

    println!(
        "prepared reference: {:.2}ms per iteration",
        elapsed.as_secs_f64() * 1000.0 / iterations as f64,
    );
    println!(
        "max {:.4}, p3 {:.4}",
        result.max_distance(),
        result.distance(3.0).expect("pnorm")
    );
}
