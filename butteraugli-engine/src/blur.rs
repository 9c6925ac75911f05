//! Separable Gaussian blur with mirrored borders.
//!
//! The blur is two 1D passes. Each pass convolves rows and writes the
//! result transposed, so the second pass is again a row convolution and
//! the output comes back in the original orientation.
//!
//! Out-of-range taps are mirrored back into the image (the edge pixel is
//! not repeated at the mirror point), so the kernel always sums to one and
//! any image size down to 1x1 is handled. Every convolution sum is
//! accumulated in `f64` and the SIMD and scalar paths add terms in the
//! same order, so the result does not depend on which path ran.

use crate::image::ImageF;
use wide::f64x4;

/// Computes a normalized 1D Gaussian kernel for the given sigma.
///
/// The kernel has `2 * radius + 1` taps with `radius = max(1, 2.25 * sigma)`.
#[must_use]
pub fn compute_kernel(sigma: f32) -> Vec<f64> {
    const M: f64 = 2.25; // Accuracy increases when m is increased
    let sigma = f64::from(sigma.abs());
    let scaler = -1.0 / (2.0 * sigma * sigma);
    let radius = (M * sigma).max(1.0) as i64;

    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|i| (scaler * (i * i) as f64).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Mirrors a coordinate outside `0..size` back into range.
///
/// For x < 0: x = -x - 1 (so -1 → 0, -2 → 1)
/// For x >= size: x = 2*size - 1 - x (so size → size-1, size+1 → size-2)
#[inline]
fn mirror(mut x: i64, size: i64) -> usize {
    while x < 0 || x >= size {
        if x < 0 {
            x = -x - 1;
        } else {
            x = 2 * size - 1 - x;
        }
    }
    x as usize
}

/// Copies one row into `padded` with `radius` mirrored samples on each side.
fn fill_padded_row(row: &[f32], radius: usize, padded: &mut Vec<f64>) {
    let width = row.len() as i64;
    padded.clear();
    let radius = radius as i64;
    padded.extend((-radius..width + radius).map(|x| f64::from(row[mirror(x, width)])));
}

/// Convolves every row of `input` and writes the result transposed.
fn convolve_rows_transposed(input: &ImageF, kernel: &[f64], output: &mut ImageF) {
    let width = input.width();
    let radius = kernel.len() / 2;
    let mut padded = Vec::with_capacity(width + 2 * radius);
    let mut sums = vec![0.0f64; width];

    for y in 0..input.height() {
        fill_padded_row(input.row(y), radius, &mut padded);
        convolve_padded(&padded, kernel, &mut sums);
        for (x, &sum) in sums.iter().enumerate() {
            output.set(y, x, sum as f32);
        }
    }
}

/// Convolves a padded row, four outputs at a time.
///
/// `out[x] = sum_j padded[x + j] * kernel[j]`, summed in increasing `j`.
#[multiversion::multiversion(targets(
    "x86_64+avx+avx2+bmi1+bmi2+fma+lzcnt+movbe+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3",
    "x86_64+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3",
    "aarch64+neon",
))]
fn convolve_padded(padded: &[f64], kernel: &[f64], out: &mut [f64]) {
    let chunks = out.len() / 4;

    for chunk in 0..chunks {
        let x = chunk * 4;
        let mut sum = f64x4::splat(0.0);
        for (j, &k) in kernel.iter().enumerate() {
            let d = x + j;
            let lanes = f64x4::from([padded[d], padded[d + 1], padded[d + 2], padded[d + 3]]);
            sum += lanes * f64x4::splat(k);
        }
        out[x..x + 4].copy_from_slice(&sum.to_array());
    }

    for (x, slot) in out.iter_mut().enumerate().skip(chunks * 4) {
        let mut sum = 0.0f64;
        for (j, &k) in kernel.iter().enumerate() {
            sum += padded[x + j] * k;
        }
        *slot = sum;
    }
}

/// Applies a 2D Gaussian blur to an image.
///
/// A non-positive sigma returns a copy of the input.
#[must_use]
pub fn gaussian_blur(input: &ImageF, sigma: f32) -> ImageF {
    if sigma <= 0.0 {
        return input.clone();
    }

    let kernel = compute_kernel(sigma);
    let mut scratch = ImageF::new(input.height(), input.width());
    convolve_rows_transposed(input, &kernel, &mut scratch);
    let mut output = ImageF::new(input.width(), input.height());
    convolve_rows_transposed(&scratch, &kernel, &mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_generation() {
        let kernel = compute_kernel(1.0);
        assert_eq!(kernel.len() % 2, 1);

        let center = kernel.len() / 2;
        for (i, &v) in kernel.iter().enumerate() {
            if i != center {
                assert!(v <= kernel[center]);
            }
        }

        let sum: f64 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mirror() {
        assert_eq!(mirror(-1, 5), 0);
        assert_eq!(mirror(-2, 5), 1);
        assert_eq!(mirror(5, 5), 4);
        assert_eq!(mirror(6, 5), 3);
        assert_eq!(mirror(-7, 1), 0);
        assert_eq!(mirror(9, 2), 1);
    }

    #[test]
    fn test_blur_constant_image() {
        // Mirrored borders keep a constant exact everywhere, borders included
        let img = ImageF::filled(32, 32, 0.5);
        let blurred = gaussian_blur(&img, 2.0);

        for y in 0..32 {
            for x in 0..32 {
                assert!(
                    (blurred.get(x, y) - 0.5).abs() < 1e-6,
                    "Expected 0.5, got {} at ({}, {})",
                    blurred.get(x, y),
                    x,
                    y
                );
            }
        }
    }

    #[test]
    fn test_blur_tiny_images() {
        for (w, h) in [(1, 1), (1, 5), (3, 2), (2, 9)] {
            let img = ImageF::filled(w, h, 3.0);
            let blurred = gaussian_blur(&img, 7.15);
            for y in 0..h {
                for x in 0..w {
                    assert!((blurred.get(x, y) - 3.0).abs() < 1e-5);
                }
            }
        }
    }

    #[test]
    fn test_blur_reduces_delta() {
        let mut img = ImageF::new(32, 32);
        img.set(16, 16, 1.0);

        let blurred = gaussian_blur(&img, 2.0);

        assert!(blurred.get(16, 16) < 1.0);
        assert!(blurred.get(15, 16) > 0.0);
        assert!(blurred.get(17, 16) > 0.0);
        // Symmetric kernel gives a symmetric response
        assert_eq!(blurred.get(14, 16), blurred.get(18, 16));
    }

    #[test]
    fn test_simd_and_scalar_paths_agree() {
        let kernel = compute_kernel(1.5);
        let padded: Vec<f64> = (0..40).map(|i| f64::from(i * 7 % 11) * 0.1).collect();
        let n = padded.len() - kernel.len() + 1;
        let mut out = vec![0.0; n];
        convolve_padded(&padded, &kernel, &mut out);

        for (x, &got) in out.iter().enumerate() {
            let mut expected = 0.0f64;
            for (j, &k) in kernel.iter().enumerate() {
                expected += padded[x + j] * k;
            }
            assert_eq!(got.to_bits(), expected.to_bits(), "mismatch at {x}");
        }
    }
}
