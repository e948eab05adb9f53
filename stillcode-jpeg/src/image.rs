//! Core image buffer type.

use crate::error::{JpegError, Result};

/// JPEG dimension ceiling: frame fields are 16-bit on the wire.
pub const MAX_DIMENSION: u32 = 65_535;

/// Pixel format of an interleaved image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Grayscale, 8 bits per pixel.
    Gray8,
    /// RGB, 24 bits per pixel.
    Rgb8,
    /// RGBA, 32 bits per pixel. Alpha is dropped at encode.
    Rgba8,
}

impl PixelFormat {
    /// Get bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }

    /// Get number of channels.
    pub fn channels(&self) -> u8 {
        self.bytes_per_pixel() as u8
    }
}

/// An interleaved pixel buffer with its geometry.
///
/// The codec only reads these at encode and allocates-and-returns them at
/// decode; ownership stays with the caller.
#[derive(Debug, Clone)]
pub struct Image {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Image {
    /// Create a zero-filled image.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        Self::validate_dimensions(width, height)?;
        let data = vec![0u8; width as usize * height as usize * format.bytes_per_pixel()];
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Create an image from an existing interleaved buffer.
    ///
    /// Fails when the buffer length does not match
    /// `width * height * bytes_per_pixel`.
    pub fn from_data(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        Self::validate_dimensions(width, height)?;
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(JpegError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    fn validate_dimensions(width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(JpegError::InvalidDimensions { width, height });
        }
        Ok(())
    }

    /// Get image width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Get image height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get pixel format.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Get pixel data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable pixel data.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Take the pixel buffer, consuming the image.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Get one pixel's bytes.
    pub fn get_pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let offset = (y as usize * self.width as usize + x as usize) * bpp;
        &self.data[offset..offset + bpp]
    }

    /// Borrow the buffer as RGB, squeezing out alpha when present.
    ///
    /// Gray8 images are returned untouched; callers branch on
    /// [`format`](Self::format) first.
    pub fn to_rgb_bytes(&self) -> std::borrow::Cow<'_, [u8]> {
        match self.format {
            PixelFormat::Rgb8 | PixelFormat::Gray8 => std::borrow::Cow::Borrowed(&self.data),
            PixelFormat::Rgba8 => {
                let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
                for px in self.data.chunks_exact(4) {
                    rgb.extend_from_slice(&px[..3]);
                }
                std::borrow::Cow::Owned(rgb)
            }
        }
    }
}
