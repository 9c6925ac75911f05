//! Raw frame ingestion.
//!
//! Decodes caller-owned bytes into an owned planar linear RGB image. The
//! borrow of the caller's buffer ends when [`ingest`] returns.

use half::f16;
use imgref::ImgRef;
use rgb::{RGB, RGB8};

use crate::format::{DataType, PixelFormat};
use crate::image::{Image3F, ImageF};
use crate::ButteraugliError;

/// Read-only view of one caller-provided frame.
///
/// Pixels are row-major with the origin at the top-left.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8],
    pub format: PixelFormat,
}

impl<'a> RawFrame<'a> {
    #[must_use]
    pub const fn new(width: usize, height: usize, data: &'a [u8], format: PixelFormat) -> Self {
        Self {
            width,
            height,
            data,
            format,
        }
    }
}

/// Owned linear-light RGB image, one plane per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearImage {
    planes: Image3F,
}

impl LinearImage {
    /// Creates from three planes of equal size.
    ///
    /// # Panics
    /// Panics if the planes differ in size.
    #[must_use]
    pub fn from_planes(r: ImageF, g: ImageF, b: ImageF) -> Self {
        Self {
            planes: Image3F::from_planes(r, g, b),
        }
    }

    /// Creates from interleaved linear RGB `f32` samples.
    pub fn from_interleaved(
        data: &[f32],
        width: usize,
        height: usize,
    ) -> Result<Self, ButteraugliError> {
        check_dimensions(width, height)?;
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| ButteraugliError::Format("frame size overflows".into()))?;
        if data.len() < expected {
            return Err(ButteraugliError::BufferTooSmall {
                expected,
                actual: data.len(),
            });
        }
        let mut planes = Image3F::new(width, height);
        for y in 0..height {
            let src = &data[y * width * 3..(y + 1) * width * 3];
            for c in 0..3 {
                let row = planes.plane_row_mut(c, y);
                for (x, dst) in row.iter_mut().enumerate() {
                    *dst = src[x * 3 + c];
                }
            }
        }
        let image = Self { planes };
        image.check_finite()?;
        Ok(image)
    }

    /// Creates from linear RGB pixels.
    pub fn from_imgref(img: ImgRef<'_, RGB<f32>>) -> Result<Self, ButteraugliError> {
        check_dimensions(img.width(), img.height())?;
        let mut planes = Image3F::new(img.width(), img.height());
        for (y, row) in img.rows().enumerate() {
            for (x, px) in row.iter().enumerate() {
                planes.plane_mut(0).set(x, y, px.r);
                planes.plane_mut(1).set(x, y, px.g);
                planes.plane_mut(2).set(x, y, px.b);
            }
        }
        let image = Self { planes };
        image.check_finite()?;
        Ok(image)
    }

    /// Creates from gamma-encoded sRGB pixels.
    pub fn from_srgb8(img: ImgRef<'_, RGB8>) -> Result<Self, ButteraugliError> {
        check_dimensions(img.width(), img.height())?;
        let lut = srgb_lut();
        let mut planes = Image3F::new(img.width(), img.height());
        for (y, row) in img.rows().enumerate() {
            for (x, px) in row.iter().enumerate() {
                planes.plane_mut(0).set(x, y, lut[usize::from(px.r)]);
                planes.plane_mut(1).set(x, y, lut[usize::from(px.g)]);
                planes.plane_mut(2).set(x, y, lut[usize::from(px.b)]);
            }
        }
        Ok(Self { planes })
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.planes.width()
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.planes.height()
    }

    /// The R, G and B planes.
    #[must_use]
    pub fn planes(&self) -> &Image3F {
        &self.planes
    }

    pub(crate) fn check_finite(&self) -> Result<(), ButteraugliError> {
        for plane in self.planes.planes() {
            if plane.rows().flatten().any(|v| !v.is_finite()) {
                return Err(ButteraugliError::InvalidArgument(
                    "frame contains non-finite samples".into(),
                ));
            }
        }
        Ok(())
    }

    /// Averages each 2x2 block into one pixel.
    ///
    /// Odd edges average the samples that exist.
    #[must_use]
    pub fn subsample_2x(&self) -> Self {
        let width = self.width();
        let height = self.height();
        let out_width = width.div_ceil(2);
        let out_height = height.div_ceil(2);

        let mut planes = Image3F::new(out_width, out_height);
        for c in 0..3 {
            let src = self.planes.plane(c);
            let dst = planes.plane_mut(c);
            for oy in 0..out_height {
                for ox in 0..out_width {
                    let mut sum = 0.0f32;
                    let mut count = 0.0f32;
                    for iy in (oy * 2)..(oy * 2 + 2).min(height) {
                        for ix in (ox * 2)..(ox * 2 + 2).min(width) {
                            sum += src.get(ix, iy);
                            count += 1.0;
                        }
                    }
                    dst.set(ox, oy, sum / count);
                }
            }
        }
        Self { planes }
    }

    /// Embeds the image into a canvas at least `min_size` pixels on each
    /// side, filling the new area from `fill`'s edge-replicated pixels.
    ///
    /// The original pixels stay at the top-left.
    #[must_use]
    pub(crate) fn padded_with(&self, fill: &Self, min_size: usize) -> Self {
        let width = self.width();
        let height = self.height();
        let out_width = width.max(min_size);
        let out_height = height.max(min_size);

        let mut planes = Image3F::new(out_width, out_height);
        for c in 0..3 {
            let src = self.planes.plane(c);
            let edge = fill.planes.plane(c);
            let dst = planes.plane_mut(c);
            for y in 0..out_height {
                for x in 0..out_width {
                    let v = if x < width && y < height {
                        src.get(x, y)
                    } else {
                        edge.get(x.min(width - 1), y.min(height - 1))
                    };
                    dst.set(x, y, v);
                }
            }
        }
        Self { planes }
    }
}

fn check_dimensions(width: usize, height: usize) -> Result<(), ButteraugliError> {
    if width == 0 || height == 0 {
        return Err(ButteraugliError::Format(format!(
            "frame dimensions must be positive, got {width}x{height}"
        )));
    }
    Ok(())
}

/// sRGB transfer function (gamma decoding) for an 8-bit sample.
#[inline]
#[must_use]
pub fn srgb_to_linear(v: u8) -> f32 {
    let v = f32::from(v) / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn srgb_lut() -> [f32; 256] {
    let mut lut = [0.0f32; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        *slot = srgb_to_linear(i as u8);
    }
    lut
}

/// Reads sample `index` of a row, honouring type and byte order.
#[inline]
fn read_sample(row: &[u8], index: usize, format: &PixelFormat) -> f32 {
    let little = format.endianness.is_little();
    match format.data_type {
        DataType::Uint8 => f32::from(row[index]) / 255.0,
        DataType::Uint16 => {
            let b = [row[index * 2], row[index * 2 + 1]];
            let v = if little {
                u16::from_le_bytes(b)
            } else {
                u16::from_be_bytes(b)
            };
            f32::from(v) / 65535.0
        }
        DataType::Float16 => {
            let b = [row[index * 2], row[index * 2 + 1]];
            let v = if little {
                f16::from_le_bytes(b)
            } else {
                f16::from_be_bytes(b)
            };
            v.to_f32()
        }
        DataType::Float => {
            let b = [
                row[index * 4],
                row[index * 4 + 1],
                row[index * 4 + 2],
                row[index * 4 + 3],
            ];
            if little {
                f32::from_le_bytes(b)
            } else {
                f32::from_be_bytes(b)
            }
        }
    }
}

/// Validates a raw frame and converts it to linear RGB.
///
/// Gray input (one or two channels) is replicated into R, G and B. A
/// trailing alpha channel is dropped.
///
/// # Errors
/// * [`ButteraugliError::Format`] for zero dimensions, a bad channel count
///   or sizes that overflow.
/// * [`ButteraugliError::BufferTooSmall`] when `data` is shorter than the
///   declared layout needs.
/// * [`ButteraugliError::InvalidArgument`] when a float sample is NaN or
///   infinite.
pub fn ingest(frame: &RawFrame<'_>) -> Result<LinearImage, ButteraugliError> {
    check_dimensions(frame.width, frame.height)?;
    let format = &frame.format;
    format.validate()?;

    let overflow = || ButteraugliError::Format("frame size overflows".into());
    let stride = format.stride(frame.width).ok_or_else(overflow)?;
    let row_bytes = format.row_bytes(frame.width).ok_or_else(overflow)?;
    let expected = format
        .required_len(frame.width, frame.height)
        .ok_or_else(overflow)?;
    if frame.data.len() < expected {
        return Err(ButteraugliError::BufferTooSmall {
            expected,
            actual: frame.data.len(),
        });
    }

    let channels = format.num_channels as usize;
    let mut planes = Image3F::new(frame.width, frame.height);
    for y in 0..frame.height {
        let row = &frame.data[y * stride..y * stride + row_bytes];
        for x in 0..frame.width {
            let base = x * channels;
            let rgb = if channels < 3 {
                let gray = read_sample(row, base, format);
                [gray; 3]
            } else {
                [
                    read_sample(row, base, format),
                    read_sample(row, base + 1, format),
                    read_sample(row, base + 2, format),
                ]
            };
            for (c, v) in rgb.into_iter().enumerate() {
                planes.plane_mut(c).set(x, y, v);
            }
        }
    }

    let image = LinearImage { planes };
    if matches!(format.data_type, DataType::Float | DataType::Float16) {
        image.check_finite()?;
    }
    Ok(image)
}
