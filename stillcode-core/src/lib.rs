//! # Stillcode Core
//!
//! Core types for the stillcode still-image codec library.
//!
//! This crate provides the building blocks shared by the codec crates:
//! - Error handling types
//! - The entropy-layer bit reader/writer (byte-stuffing, marker detection,
//!   signed-magnitude coding)

#![warn(missing_docs)]

pub mod bitstream;
pub mod error;

pub use bitstream::{JpegBitReader, JpegBitWriter};
pub use error::{BitstreamError, Error, Result};
