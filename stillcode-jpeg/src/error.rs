//! JPEG codec error types.

use thiserror::Error;

/// JPEG codec errors.
///
/// Every failure path surfaces a distinct condition so callers can tell bad
/// input from a broken invariant. Structural and reference errors abort the
/// whole call with no partial output.
#[derive(Error, Debug)]
pub enum JpegError {
    /// The buffer does not start with an SOI marker.
    #[error("Invalid JPEG header: {0}")]
    InvalidHeader(String),

    /// Data ended mid-segment or mid-scan.
    #[error("Truncated data: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required to continue.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// A marker segment's payload is malformed.
    #[error("Invalid segment 0xFF{marker:02X}: {reason}")]
    InvalidSegment {
        /// Marker type byte of the offending segment.
        marker: u8,
        /// What was wrong with it.
        reason: String,
    },

    /// A scan references a quantization table that was never defined.
    #[error("Missing quantization table {id}")]
    MissingQuantTable {
        /// Table id (0-3).
        id: u8,
    },

    /// A scan references a Huffman table that was never defined.
    #[error("Missing {class} Huffman table {id}")]
    MissingHuffmanTable {
        /// "DC" or "AC".
        class: &'static str,
        /// Table id (0-3).
        id: u8,
    },

    /// SOS names a component id absent from SOF.
    #[error("Scan references unknown component id {id}")]
    UnknownComponent {
        /// The component identifier from the scan header.
        id: u8,
    },

    /// Width or height outside 1..=65535, or a zero-sized plane.
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },

    /// Pixel buffer length does not match dimensions and channel count.
    #[error("Pixel buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize {
        /// Required length.
        expected: usize,
        /// Provided length.
        actual: usize,
    },

    /// Feature outside the baseline profile (progressive, 12-bit, arithmetic).
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Huffman code lengths could not be held within 16 bits.
    #[error("Huffman code length overflow after rebalancing")]
    CodeLengthOverflow,

    /// Coefficient magnitude exceeds the 15-bit category range.
    #[error("Coefficient magnitude {value} exceeds category range")]
    CategoryOverflow {
        /// The offending value.
        value: i32,
    },

    /// No Huffman code matched within the maximum length; the entropy stream
    /// is corrupt.
    #[error("Invalid Huffman code in entropy-coded data")]
    InvalidHuffmanCode,

    /// A symbol to encode has no code in the active table. The statistics
    /// and emission passes diverged; an internal invariant is broken.
    #[error("Symbol 0x{symbol:02X} has no code in the active Huffman table")]
    SymbolNotInTable {
        /// The uncodable symbol byte.
        symbol: u8,
    },

    /// The restart marker found does not match the expected RSTn index.
    #[error("Restart marker mismatch: expected RST{expected}, found 0xFF{found:02X}")]
    RestartMismatch {
        /// Expected restart index (0-7).
        expected: u8,
        /// Marker byte actually encountered.
        found: u8,
    },

    /// Errors from the bit layer (alignment contract, truncation, unexpected
    /// markers) bubbling up through the codec.
    #[error("Bitstream error: {0}")]
    Bitstream(#[from] stillcode_core::Error),

    /// I/O errors from writing segment bytes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// JPEG codec result type.
pub type Result<T> = std::result::Result<T, JpegError>;

impl From<stillcode_core::BitstreamError> for JpegError {
    fn from(err: stillcode_core::BitstreamError) -> Self {
        JpegError::Bitstream(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = JpegError::InvalidHeader("bad magic".to_string());
        assert!(err.to_string().contains("bad magic"));

        let err = JpegError::MissingHuffmanTable { class: "AC", id: 1 };
        assert_eq!(err.to_string(), "Missing AC Huffman table 1");

        let err = JpegError::RestartMismatch {
            expected: 3,
            found: 0xD5,
        };
        assert!(err.to_string().contains("RST3"));
        assert!(err.to_string().contains("0xFFD5"));
    }

    #[test]
    fn test_bitstream_conversion() {
        let err: JpegError = stillcode_core::BitstreamError::UnexpectedEnd.into();
        assert!(matches!(err, JpegError::Bitstream(_)));
    }
}
