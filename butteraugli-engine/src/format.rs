//! Pixel format descriptors for raw frames.

use serde::{Deserialize, Serialize};

use crate::ButteraugliError;

/// Sample storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// IEEE 754 single precision.
    Float,
    Uint8,
    Uint16,
    /// IEEE 754 half precision.
    Float16,
}

impl DataType {
    /// Bytes per sample.
    #[must_use]
    pub const fn sample_size(self) -> usize {
        match self {
            Self::Float => 4,
            Self::Uint8 => 1,
            Self::Uint16 | Self::Float16 => 2,
        }
    }

    /// Decodes the numeric code used by the C pixel-format ABI.
    pub fn from_code(code: u32) -> Result<Self, ButteraugliError> {
        match code {
            0 => Ok(Self::Float),
            2 => Ok(Self::Uint8),
            3 => Ok(Self::Uint16),
            5 => Ok(Self::Float16),
            other => Err(ButteraugliError::Format(format!(
                "unknown data type code {other}"
            ))),
        }
    }

    /// Numeric code used by the C pixel-format ABI.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Float => 0,
            Self::Uint8 => 2,
            Self::Uint16 => 3,
            Self::Float16 => 5,
        }
    }
}

/// Byte order of multi-byte samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// Whatever the host uses.
    #[default]
    Native,
    Little,
    Big,
}

impl Endianness {
    pub fn from_code(code: u32) -> Result<Self, ButteraugliError> {
        match code {
            0 => Ok(Self::Native),
            1 => Ok(Self::Little),
            2 => Ok(Self::Big),
            other => Err(ButteraugliError::Format(format!(
                "unknown endianness code {other}"
            ))),
        }
    }

    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Native => 0,
            Self::Little => 1,
            Self::Big => 2,
        }
    }

    /// Resolves `Native` to the host byte order.
    #[must_use]
    pub const fn is_little(self) -> bool {
        match self {
            Self::Native => cfg!(target_endian = "little"),
            Self::Little => true,
            Self::Big => false,
        }
    }
}

/// Describes how the bytes of a raw frame are laid out.
///
/// Channels are interleaved. One channel is gray, two are gray + alpha,
/// three are RGB and four are RGBA. Alpha is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelFormat {
    pub num_channels: u32,
    pub data_type: DataType,
    #[serde(default)]
    pub endianness: Endianness,
    /// Row alignment in bytes. 0 or 1 means rows are tightly packed.
    #[serde(default)]
    pub align: usize,
}

impl PixelFormat {
    #[must_use]
    pub const fn new(num_channels: u32, data_type: DataType) -> Self {
        Self {
            num_channels,
            data_type,
            endianness: Endianness::Native,
            align: 0,
        }
    }

    /// Tightly packed 8-bit RGB.
    #[must_use]
    pub const fn rgb8() -> Self {
        Self::new(3, DataType::Uint8)
    }

    /// Tightly packed 8-bit RGBA.
    #[must_use]
    pub const fn rgba8() -> Self {
        Self::new(4, DataType::Uint8)
    }

    /// Tightly packed native-endian `f32` RGB.
    #[must_use]
    pub const fn rgb_f32() -> Self {
        Self::new(3, DataType::Float)
    }

    #[must_use]
    pub const fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    #[must_use]
    pub const fn with_align(mut self, align: usize) -> Self {
        self.align = align;
        self
    }

    /// Builds a format from the numeric codes of the C pixel-format ABI.
    pub fn from_codes(
        num_channels: u32,
        data_type: u32,
        endianness: u32,
        align: usize,
    ) -> Result<Self, ButteraugliError> {
        let format = Self {
            num_channels,
            data_type: DataType::from_code(data_type)?,
            endianness: Endianness::from_code(endianness)?,
            align,
        };
        format.validate()?;
        Ok(format)
    }

    /// Checks the channel count.
    pub fn validate(&self) -> Result<(), ButteraugliError> {
        if !(1..=4).contains(&self.num_channels) {
            return Err(ButteraugliError::Format(format!(
                "num_channels must be 1..=4, got {}",
                self.num_channels
            )));
        }
        Ok(())
    }

    /// Bytes per pixel.
    #[must_use]
    pub const fn pixel_size(&self) -> usize {
        self.num_channels as usize * self.data_type.sample_size()
    }

    /// Unpadded bytes in one row, or `None` on overflow.
    #[must_use]
    pub fn row_bytes(&self, width: usize) -> Option<usize> {
        width.checked_mul(self.pixel_size())
    }

    /// Distance in bytes between row starts, or `None` on overflow.
    #[must_use]
    pub fn stride(&self, width: usize) -> Option<usize> {
        let row = self.row_bytes(width)?;
        if self.align > 1 {
            row.checked_next_multiple_of(self.align)
        } else {
            Some(row)
        }
    }

    /// Minimum buffer length for a `width` x `height` frame.
    ///
    /// The last row needs no alignment padding.
    #[must_use]
    pub fn required_len(&self, width: usize, height: usize) -> Option<usize> {
        if height == 0 {
            return Some(0);
        }
        let stride = self.stride(width)?;
        stride
            .checked_mul(height - 1)?
            .checked_add(self.row_bytes(width)?)
    }
}
