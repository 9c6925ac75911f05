//! Deterministic synthetic frames for engine tests.
//!
//! All generators produce packed 8-bit RGB unless noted, using an LCG PRNG
//! so inputs are identical across platforms.

/// LCG pseudo-random number generator (deterministic)
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u8(&mut self) -> u8 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.state >> 33) & 0xFF) as u8
    }

    pub fn next_u8_range(&mut self, min: u8, max: u8) -> u8 {
        let range = (max - min) as u64 + 1;
        let val = self.next_u8() as u64;
        (min as u64 + (val * range / 256)) as u8
    }

    /// Uniform in `[0, 1]`.
    pub fn next_unit(&mut self) -> f32 {
        f32::from(self.next_u8()) / 255.0
    }
}

/// Uniform color frame.
pub fn gen_uniform(width: usize, height: usize, r: u8, g: u8, b: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * 3);
    for _ in 0..width * height {
        data.extend_from_slice(&[r, g, b]);
    }
    data
}

/// Horizontal grayscale gradient.
pub fn gen_gradient_h(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * 3);
    for _y in 0..height {
        for x in 0..width {
            let val = if width > 1 {
                (x * 255 / (width - 1)) as u8
            } else {
                128
            };
            data.extend_from_slice(&[val, val, val]);
        }
    }
    data
}

/// Checkerboard of `block_size` squares alternating between `lo` and `hi`.
pub fn gen_checkerboard(width: usize, height: usize, block_size: usize, lo: u8, hi: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let val = if (x / block_size + y / block_size) % 2 == 0 {
                lo
            } else {
                hi
            };
            data.extend_from_slice(&[val, val, val]);
        }
    }
    data
}

/// Random RGB noise.
pub fn gen_noise(width: usize, height: usize, seed: u64) -> Vec<u8> {
    let mut lcg = Lcg::new(seed);
    (0..width * height * 3).map(|_| lcg.next_u8()).collect()
}

/// Adds bounded random noise to every sample.
pub fn distort_noise(data: &[u8], amplitude: u8, seed: u64) -> Vec<u8> {
    let mut lcg = Lcg::new(seed);
    data.iter()
        .map(|&v| {
            let delta = i16::from(lcg.next_u8_range(0, 2 * amplitude)) - i16::from(amplitude);
            (i16::from(v) + delta).clamp(0, 255) as u8
        })
        .collect()
}

/// Shifts every sample by `delta`, saturating.
pub fn distort_shift(data: &[u8], delta: i16) -> Vec<u8> {
    data.iter()
        .map(|&v| (i16::from(v) + delta).clamp(0, 255) as u8)
        .collect()
}

/// 3x3 box blur of packed RGB, clamping at the borders.
pub fn distort_blur(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; data.len()];
    for y in 0..height {
        for x in 0..width {
            for c in 0..3 {
                let mut sum = 0u32;
                let mut count = 0u32;
                for yy in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                    for xx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                        sum += u32::from(data[(yy * width + xx) * 3 + c]);
                        count += 1;
                    }
                }
                out[(y * width + x) * 3 + c] = (sum / count) as u8;
            }
        }
    }
    out
}

/// Interleaved little-endian `f32` RGB samples.
pub fn f32_le_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|v| v.to_le_bytes()).collect()
}
