//! Error types for the stillcode core layer.

use thiserror::Error;

/// Main error type for the core layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Bitstream-level errors.
    #[error("Bitstream error: {0}")]
    Bitstream(#[from] BitstreamError),

    /// Invalid parameter provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Entropy-layer bitstream errors.
#[derive(Error, Debug)]
pub enum BitstreamError {
    /// Unexpected end of bitstream.
    #[error("Unexpected end of bitstream")]
    UnexpectedEnd,

    /// A real marker (0xFF followed by a non-stuffed byte) was encountered
    /// where entropy-coded data was being read. The marker has not been
    /// consumed; callers decide whether it was expected.
    #[error("Marker 0xFF{marker:02X} encountered in entropy-coded data")]
    MarkerInData {
        /// The marker type byte following 0xFF.
        marker: u8,
    },

    /// A marker was expected at a byte boundary but data bits were found.
    #[error("Expected a marker at byte offset {offset}")]
    ExpectedMarker {
        /// Byte offset where the marker should have started.
        offset: usize,
    },

    /// A byte-aligned operation was requested while bits are pending.
    #[error("Operation requires byte alignment, {pending} bits pending")]
    NotAligned {
        /// Number of bits buffered past the last byte boundary.
        pending: u8,
    },

    /// Bit count outside the supported 1..=16 range.
    #[error("Cannot transfer {requested} bits in one call (1-16 supported)")]
    InvalidBitCount {
        /// The requested bit count.
        requested: u8,
    },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid parameter error.
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    /// Check if this error is a marker-encountered condition.
    #[must_use]
    pub fn is_marker(&self) -> bool {
        matches!(self, Error::Bitstream(BitstreamError::MarkerInData { .. }))
    }

    /// Return the pending marker byte if this is a marker-encountered condition.
    #[must_use]
    pub fn marker(&self) -> Option<u8> {
        match self {
            Error::Bitstream(BitstreamError::MarkerInData { marker }) => Some(*marker),
            _ => None,
        }
    }
}
