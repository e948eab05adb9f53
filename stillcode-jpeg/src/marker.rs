//! Marker classification, segment framing helpers, and scan-order constants.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::error::{JpegError, Result};

/// Marker type bytes used by the baseline codec.
pub mod bytes {
    /// Start of image.
    pub const SOI: u8 = 0xD8;
    /// End of image.
    pub const EOI: u8 = 0xD9;
    /// Start of frame, baseline sequential DCT.
    pub const SOF0: u8 = 0xC0;
    /// Start of frame, progressive DCT (recognized, rejected).
    pub const SOF2: u8 = 0xC2;
    /// Define Huffman table.
    pub const DHT: u8 = 0xC4;
    /// Define quantization table.
    pub const DQT: u8 = 0xDB;
    /// Start of scan.
    pub const SOS: u8 = 0xDA;
    /// Define restart interval.
    pub const DRI: u8 = 0xDD;
    /// First restart marker; RST0..=RST7 cycle from here.
    pub const RST0: u8 = 0xD0;
    /// Application segment 0 (JFIF).
    pub const APP0: u8 = 0xE0;
    /// Application segment 1 (EXIF).
    pub const APP1: u8 = 0xE1;
    /// Application segment 2 (ICC profile).
    pub const APP2: u8 = 0xE2;
    /// Comment.
    pub const COM: u8 = 0xFE;
}

/// Classified JPEG marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegMarker {
    /// Start of image.
    Soi,
    /// End of image.
    Eoi,
    /// Start of frame, baseline sequential.
    Sof0,
    /// Start of frame, any non-baseline SOF (type byte carried for errors).
    SofOther(u8),
    /// Define Huffman table.
    Dht,
    /// Define quantization table.
    Dqt,
    /// Start of scan.
    Sos,
    /// Define restart interval.
    Dri,
    /// Restart marker with its index 0-7.
    Rst(u8),
    /// Application segment with its index 0-15.
    App(u8),
    /// Comment.
    Com,
    /// Any other marker; skipped when it carries a payload.
    Other(u8),
}

impl JpegMarker {
    /// Classify a marker type byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            bytes::SOI => JpegMarker::Soi,
            bytes::EOI => JpegMarker::Eoi,
            bytes::SOF0 => JpegMarker::Sof0,
            // SOF1..SOF15, skipping DHT (0xC4), JPG (0xC8) and DAC (0xCC)
            // which are not frame headers.
            0xC1..=0xCF if byte != 0xC4 && byte != 0xC8 && byte != 0xCC => {
                JpegMarker::SofOther(byte)
            }
            bytes::DHT => JpegMarker::Dht,
            bytes::DQT => JpegMarker::Dqt,
            bytes::SOS => JpegMarker::Sos,
            bytes::DRI => JpegMarker::Dri,
            0xD0..=0xD7 => JpegMarker::Rst(byte - bytes::RST0),
            0xE0..=0xEF => JpegMarker::App(byte - bytes::APP0),
            bytes::COM => JpegMarker::Com,
            other => JpegMarker::Other(other),
        }
    }

    /// Whether this marker is followed by a length-prefixed payload.
    pub fn has_payload(&self) -> bool {
        !matches!(
            self,
            JpegMarker::Soi | JpegMarker::Eoi | JpegMarker::Rst(_) | JpegMarker::Other(0x01)
        )
    }
}

/// Zigzag scan order: index = scan position, value = natural (row-major)
/// position.
pub const ZIGZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, //
    17, 24, 32, 25, 18, 11, 4, 5, //
    12, 19, 26, 33, 40, 48, 41, 34, //
    27, 20, 13, 6, 7, 14, 21, 28, //
    35, 42, 49, 56, 57, 50, 43, 36, //
    29, 22, 15, 23, 30, 37, 44, 51, //
    58, 59, 52, 45, 38, 31, 39, 46, //
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// Inverse zigzag: index = natural position, value = scan position.
pub const IZIGZAG: [usize; 64] = [
    0, 1, 5, 6, 14, 15, 27, 28, //
    2, 4, 7, 13, 16, 26, 29, 42, //
    3, 8, 12, 17, 25, 30, 41, 43, //
    9, 11, 18, 24, 31, 40, 44, 53, //
    10, 19, 23, 32, 39, 45, 52, 54, //
    20, 22, 33, 38, 46, 51, 55, 60, //
    21, 34, 37, 47, 50, 56, 59, 61, //
    35, 36, 48, 49, 57, 58, 62, 63,
];

/// Largest payload a single marker segment can carry: the 16-bit length
/// field includes its own two bytes.
pub const MAX_SEGMENT_PAYLOAD: usize = 65_533;

/// Write `0xFF marker` followed by a length-prefixed payload.
///
/// The big-endian length covers the two length bytes plus the payload, per
/// the format.
pub fn write_segment(out: &mut Vec<u8>, marker: u8, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_SEGMENT_PAYLOAD {
        return Err(JpegError::InvalidSegment {
            marker,
            reason: format!("payload of {} bytes exceeds segment capacity", payload.len()),
        });
    }
    out.push(0xFF);
    out.push(marker);
    out.write_u16::<BigEndian>((payload.len() + 2) as u16)?;
    out.extend_from_slice(payload);
    Ok(())
}

/// Write a bare marker with no payload (SOI, EOI, RSTn).
pub fn write_bare_marker(out: &mut Vec<u8>, marker: u8) {
    out.push(0xFF);
    out.push(marker);
}

/// Read a big-endian u16 at `offset`, with a truncation check.
pub fn read_u16_be(data: &[u8], offset: usize) -> Result<u16> {
    if offset + 2 > data.len() {
        return Err(JpegError::Truncated {
            expected: offset + 2,
            actual: data.len(),
        });
    }
    Ok(BigEndian::read_u16(&data[offset..offset + 2]))
}

/// Read one byte at `offset`, with a truncation check.
pub fn read_u8(data: &[u8], offset: usize) -> Result<u8> {
    if offset >= data.len() {
        return Err(JpegError::Truncated {
            expected: offset + 1,
            actual: data.len(),
        });
    }
    Ok(data[offset])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_classification() {
        assert_eq!(JpegMarker::from_byte(0xD8), JpegMarker::Soi);
        assert_eq!(JpegMarker::from_byte(0xD9), JpegMarker::Eoi);
        assert_eq!(JpegMarker::from_byte(0xC0), JpegMarker::Sof0);
        assert_eq!(JpegMarker::from_byte(0xC2), JpegMarker::SofOther(0xC2));
        assert_eq!(JpegMarker::from_byte(0xC4), JpegMarker::Dht);
        assert_eq!(JpegMarker::from_byte(0xD3), JpegMarker::Rst(3));
        assert_eq!(JpegMarker::from_byte(0xE1), JpegMarker::App(1));
    }

    #[test]
    fn test_payload_classification() {
        assert!(!JpegMarker::Soi.has_payload());
        assert!(!JpegMarker::Rst(5).has_payload());
        assert!(JpegMarker::Dqt.has_payload());
        assert!(JpegMarker::App(2).has_payload());
    }

    #[test]
    fn test_zigzag_tables_are_inverse() {
        for scan in 0..64 {
            assert_eq!(IZIGZAG[ZIGZAG[scan]], scan);
        }
        // Low frequencies first.
        assert_eq!(ZIGZAG[0], 0);
        assert_eq!(ZIGZAG[1], 1);
        assert_eq!(ZIGZAG[2], 8);
    }

    #[test]
    fn test_write_segment_length_field() {
        let mut out = Vec::new();
        write_segment(&mut out, 0xFE, b"hi").unwrap();
        assert_eq!(out, vec![0xFF, 0xFE, 0x00, 0x04, b'h', b'i']);
    }

    #[test]
    fn test_segment_capacity() {
        let mut out = Vec::new();
        let oversized = vec![0u8; MAX_SEGMENT_PAYLOAD + 1];
        assert!(matches!(
            write_segment(&mut out, 0xE2, &oversized),
            Err(JpegError::InvalidSegment { marker: 0xE2, .. })
        ));
    }

    #[test]
    fn test_read_helpers_truncation() {
        assert!(matches!(
            read_u16_be(&[0x12], 0),
            Err(JpegError::Truncated { .. })
        ));
        assert_eq!(read_u16_be(&[0x12, 0x34], 0).unwrap(), 0x1234);
        assert!(read_u8(&[], 0).is_err());
    }
}
