// Allow common patterns in DSP/codec code
#![allow(clippy::excessive_precision)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]
#![warn(missing_docs)]

//! Baseline JPEG encoder and decoder.
//!
//! This crate implements the baseline sequential JPEG codec end to end:
//! - RGB <-> YCbCr color transform with selectable standard/range/precision
//! - Chroma subsampling (4:4:4, 4:2:2, 4:2:0) and decode-side upsampling
//! - Exact 8x8 DCT with quality-scaled quantization
//! - Canonical Huffman coding, default (Annex K) or image-optimized tables
//! - Marker/segment framing with restart-interval resynchronization
//! - EXIF/ICC payload embedding and extraction (byte ranges only)
//!
//! ## Example
//!
//! ```no_run
//! use stillcode_jpeg::{decode, encode, JpegConfig};
//!
//! let pixels = vec![128u8; 16 * 16 * 3];
//! let jpeg = encode(&pixels, 16, 16, &JpegConfig::default())?;
//! let image = decode(&jpeg)?;
//! assert_eq!(image.width(), 16);
//! # Ok::<(), stillcode_jpeg::JpegError>(())
//! ```

mod color;
mod dct;
mod decoder;
mod encoder;
mod error;
mod huffman;
mod image;
mod marker;
mod quant;
mod sampling;

pub use color::{
    ColorRange, ColorStandard, ColorTransform, ConversionStats, GamutMode, Rounding,
};
pub use decoder::{DecodeOptions, JpegDecoder, JpegInfo};
pub use encoder::{DensityUnits, JfifDensity, JpegConfig, JpegEncoder};
pub use error::{JpegError, Result};
pub use image::{Image, PixelFormat, MAX_DIMENSION};
pub use sampling::{ChromaSubsampling, Upsampling};

/// Check whether a buffer starts with the JPEG magic bytes.
pub fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 3 && data[0] == 0xFF && data[1] == 0xD8 && data[2] == 0xFF
}

/// Encode an interleaved pixel buffer to a JPEG byte stream.
///
/// The buffer is interpreted per `config.pixel_format` and must hold exactly
/// `width * height * channels` bytes.
pub fn encode(pixels: &[u8], width: u32, height: u32, config: &JpegConfig) -> Result<Vec<u8>> {
    let image = Image::from_data(width, height, config.pixel_format, pixels.to_vec())?;
    JpegEncoder::new(config.clone()).encode(&image)
}

/// Encode an interleaved pixel buffer, appending to a caller-supplied vector.
pub fn encode_into(
    out: &mut Vec<u8>,
    pixels: &[u8],
    width: u32,
    height: u32,
    config: &JpegConfig,
) -> Result<()> {
    let image = Image::from_data(width, height, config.pixel_format, pixels.to_vec())?;
    JpegEncoder::new(config.clone()).encode_into(out, &image)
}

/// Decode a JPEG byte stream with default options.
pub fn decode(data: &[u8]) -> Result<Image> {
    JpegDecoder::new().decode(data)
}

/// Decode a JPEG byte stream with explicit options.
pub fn decode_with(data: &[u8], options: &DecodeOptions) -> Result<Image> {
    JpegDecoder::with_options(*options).decode(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_jpeg() {
        assert!(is_jpeg(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(!is_jpeg(&[0x89, 0x50, 0x4E, 0x47]));
        assert!(!is_jpeg(&[0xFF, 0xD8]));
    }

    #[test]
    fn test_encode_validates_buffer_size() {
        let result = encode(&[0u8; 10], 4, 4, &JpegConfig::default());
        assert!(matches!(result, Err(JpegError::BufferSize { .. })));
    }

    #[test]
    fn test_encode_validates_dimensions() {
        let result = encode(&[], 0, 4, &JpegConfig::default());
        assert!(matches!(result, Err(JpegError::InvalidDimensions { .. })));
    }
}
