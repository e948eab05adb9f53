//! JPEG decoder implementation.

use stillcode_core::JpegBitReader;
use tracing::{debug, trace};

use crate::color::ColorTransform;
use crate::dct;
use crate::error::{JpegError, Result};
use crate::huffman::{HuffmanTable, TableClass};
use crate::image::{Image, PixelFormat};
use crate::marker::{bytes, read_u16_be, read_u8, JpegMarker, ZIGZAG};
use crate::quant;
use crate::sampling::{crop_plane, upsample_plane, Upsampling};

/// Decode-time options.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Chroma upsampling filter.
    pub upsampling: Upsampling,
    /// Inverse color transform selection.
    pub color: ColorTransform,
}

/// Stream metadata gathered while parsing.
#[derive(Debug, Clone, Default)]
pub struct JpegInfo {
    /// Image width.
    pub width: u32,
    /// Image height.
    pub height: u32,
    /// Number of components.
    pub components: u8,
    /// Bits per sample (always 8 for baseline).
    pub bits_per_sample: u8,
    /// Whether a progressive frame header was encountered.
    pub progressive: bool,
    /// Whether a JFIF APP0 segment was present.
    pub has_jfif: bool,
    /// JFIF version, when present.
    pub jfif_version: (u8, u8),
    /// Whether an EXIF APP1 segment was present.
    pub has_exif: bool,
    /// Restart interval in MCUs (0 = none declared).
    pub restart_interval: u16,
}

/// One frame component and its table assignments.
#[derive(Debug, Clone)]
struct Component {
    id: u8,
    h: usize,
    v: usize,
    quant_id: u8,
    dc_id: u8,
    ac_id: u8,
}

/// Frame geometry from SOF.
#[derive(Debug, Clone)]
struct Frame {
    width: usize,
    height: usize,
    max_h: usize,
    max_v: usize,
    mcus_per_line: usize,
    mcus_per_column: usize,
    components: Vec<Component>,
}

/// Identifier prefix of an ICC APP2 chunk.
const ICC_HEADER: &[u8] = b"ICC_PROFILE\0";

/// JPEG decoder.
///
/// One decoder instance owns the tables, frame state, and predictors of a
/// single decode session; nothing is shared or global, so independent
/// sessions can run on separate threads freely.
pub struct JpegDecoder {
    options: DecodeOptions,
    info: JpegInfo,
    quant_tables: [Option<[u8; 64]>; 4],
    dc_tables: [Option<HuffmanTable>; 4],
    ac_tables: [Option<HuffmanTable>; 4],
    frame: Option<Frame>,
    restart_interval: u16,
    exif: Option<Vec<u8>>,
    icc_chunks: Vec<(u8, u8, Vec<u8>)>,
}

impl JpegDecoder {
    /// Create a decoder with default options.
    pub fn new() -> Self {
        Self::with_options(DecodeOptions::default())
    }

    /// Create a decoder with explicit options.
    pub fn with_options(options: DecodeOptions) -> Self {
        Self {
            options,
            info: JpegInfo::default(),
            quant_tables: [None; 4],
            dc_tables: [None, None, None, None],
            ac_tables: [None, None, None, None],
            frame: None,
            restart_interval: 0,
            exif: None,
            icc_chunks: Vec::new(),
        }
    }

    /// Stream metadata gathered so far (complete after a successful decode).
    pub fn info(&self) -> &JpegInfo {
        &self.info
    }

    /// Raw EXIF APP1 payload, when the stream carried one.
    pub fn exif(&self) -> Option<&[u8]> {
        self.exif.as_deref()
    }

    /// Reassembled ICC profile, when every declared APP2 chunk arrived.
    pub fn icc_profile(&self) -> Option<Vec<u8>> {
        let total = self.icc_chunks.first().map(|chunk| chunk.1)?;
        if total == 0 || self.icc_chunks.len() != usize::from(total) {
            return None;
        }
        let mut chunks: Vec<_> = self.icc_chunks.iter().collect();
        chunks.sort_by_key(|chunk| chunk.0);
        let mut profile = Vec::new();
        for chunk in chunks {
            profile.extend_from_slice(&chunk.2);
        }
        Some(profile)
    }

    /// Decode a JPEG byte stream into an image.
    pub fn decode(&mut self, data: &[u8]) -> Result<Image> {
        if data.len() < 2 {
            return Err(JpegError::Truncated {
                expected: 2,
                actual: data.len(),
            });
        }
        if data[0] != 0xFF || data[1] != bytes::SOI {
            return Err(JpegError::InvalidHeader("missing SOI marker".into()));
        }

        let mut offset = 2usize;
        loop {
            let (marker_byte, next) = next_marker(data, offset)?;
            offset = next;
            let marker = JpegMarker::from_byte(marker_byte);
            trace!(marker = ?marker, offset, "segment");

            match marker {
                JpegMarker::Soi => {
                    return Err(JpegError::InvalidSegment {
                        marker: marker_byte,
                        reason: "SOI inside stream body".into(),
                    });
                }
                JpegMarker::Eoi => {
                    return Err(JpegError::InvalidSegment {
                        marker: marker_byte,
                        reason: "EOI before any scan data".into(),
                    });
                }
                JpegMarker::Rst(_) => {
                    return Err(JpegError::InvalidSegment {
                        marker: marker_byte,
                        reason: "restart marker outside entropy-coded data".into(),
                    });
                }
                JpegMarker::Sof0 => offset = self.parse_sof(data, offset)?,
                JpegMarker::SofOther(byte) => {
                    if byte == bytes::SOF2 {
                        self.info.progressive = true;
                    }
                    return Err(JpegError::Unsupported(format!(
                        "SOF{} frame; only baseline sequential is supported",
                        byte - 0xC0
                    )));
                }
                JpegMarker::Dqt => offset = self.parse_dqt(data, offset)?,
                JpegMarker::Dht => offset = self.parse_dht(data, offset)?,
                JpegMarker::Dri => offset = self.parse_dri(data, offset)?,
                JpegMarker::App(0) => offset = self.parse_app0(data, offset)?,
                JpegMarker::App(1) => offset = self.parse_app1(data, offset)?,
                JpegMarker::App(2) => offset = self.parse_app2(data, offset)?,
                JpegMarker::App(_) | JpegMarker::Com => offset = skip_segment(data, offset)?,
                JpegMarker::Sos => {
                    let scan_start = self.parse_sos(data, offset)?;
                    return self.decode_scan(data, scan_start);
                }
                JpegMarker::Other(byte) => {
                    if marker.has_payload() {
                        offset = skip_segment(data, offset)?;
                    } else {
                        return Err(JpegError::InvalidSegment {
                            marker: byte,
                            reason: "unexpected bare marker".into(),
                        });
                    }
                }
            }
        }
    }

    fn parse_app0(&mut self, data: &[u8], offset: usize) -> Result<usize> {
        let (payload, next) = segment_payload(data, offset)?;
        if payload.len() >= 7 && &payload[..5] == b"JFIF\0" {
            self.info.has_jfif = true;
            self.info.jfif_version = (payload[5], payload[6]);
        }
        Ok(next)
    }

    fn parse_app1(&mut self, data: &[u8], offset: usize) -> Result<usize> {
        let (payload, next) = segment_payload(data, offset)?;
        if payload.len() >= 4 && &payload[..4] == b"Exif" {
            self.info.has_exif = true;
            self.exif = Some(payload.to_vec());
        }
        Ok(next)
    }

    fn parse_app2(&mut self, data: &[u8], offset: usize) -> Result<usize> {
        let (payload, next) = segment_payload(data, offset)?;
        if payload.len() > ICC_HEADER.len() + 2 && payload.starts_with(ICC_HEADER) {
            let seq = payload[ICC_HEADER.len()];
            let count = payload[ICC_HEADER.len() + 1];
            let chunk = payload[ICC_HEADER.len() + 2..].to_vec();
            self.icc_chunks.push((seq, count, chunk));
        }
        Ok(next)
    }

    fn parse_dqt(&mut self, data: &[u8], offset: usize) -> Result<usize> {
        let (payload, next) = segment_payload(data, offset)?;
        let mut pos = 0usize;
        while pos < payload.len() {
            let spec = payload[pos];
            let precision = spec >> 4;
            let id = spec & 0x0F;
            pos += 1;

            if id > 3 {
                return Err(JpegError::InvalidSegment {
                    marker: bytes::DQT,
                    reason: format!("quantization table id {} out of range", id),
                });
            }
            if precision != 0 {
                return Err(JpegError::Unsupported(
                    "16-bit quantization tables require extended precision".into(),
                ));
            }
            if pos + 64 > payload.len() {
                return Err(JpegError::Truncated {
                    expected: offset + 2 + pos + 64,
                    actual: offset + 2 + payload.len(),
                });
            }

            let mut table = [0u8; 64];
            for (scan, &natural) in ZIGZAG.iter().enumerate() {
                let value = payload[pos + scan];
                if value == 0 {
                    return Err(JpegError::InvalidSegment {
                        marker: bytes::DQT,
                        reason: format!("zero quantizer step in table {}", id),
                    });
                }
                table[natural] = value;
            }
            self.quant_tables[usize::from(id)] = Some(table);
            pos += 64;
            trace!(id, "quantization table defined");
        }
        Ok(next)
    }

    fn parse_dht(&mut self, data: &[u8], offset: usize) -> Result<usize> {
        let (payload, next) = segment_payload(data, offset)?;
        let mut pos = 0usize;
        while pos < payload.len() {
            let spec = payload[pos];
            let class = spec >> 4;
            let id = spec & 0x0F;
            pos += 1;

            if class > 1 || id > 3 {
                return Err(JpegError::InvalidSegment {
                    marker: bytes::DHT,
                    reason: format!("Huffman table class {} id {} out of range", class, id),
                });
            }
            if pos + 16 > payload.len() {
                return Err(JpegError::Truncated {
                    expected: offset + 2 + pos + 16,
                    actual: offset + 2 + payload.len(),
                });
            }

            let mut bits = [0u8; 17];
            let mut total = 0usize;
            for length in 1..=16usize {
                bits[length] = payload[pos + length - 1];
                total += usize::from(bits[length]);
            }
            pos += 16;

            if pos + total > payload.len() {
                return Err(JpegError::Truncated {
                    expected: offset + 2 + pos + total,
                    actual: offset + 2 + payload.len(),
                });
            }
            let huffval = payload[pos..pos + total].to_vec();
            pos += total;

            let table_class = if class == 0 {
                TableClass::Dc
            } else {
                TableClass::Ac
            };
            let table = HuffmanTable::from_spec(table_class, id, bits, huffval)?;
            if class == 0 {
                self.dc_tables[usize::from(id)] = Some(table);
            } else {
                self.ac_tables[usize::from(id)] = Some(table);
            }
            trace!(class, id, "Huffman table defined");
        }
        Ok(next)
    }

    fn parse_dri(&mut self, data: &[u8], offset: usize) -> Result<usize> {
        let (payload, next) = segment_payload(data, offset)?;
        if payload.len() != 2 {
            return Err(JpegError::InvalidSegment {
                marker: bytes::DRI,
                reason: format!("DRI payload of {} bytes", payload.len()),
            });
        }
        self.restart_interval = u16::from_be_bytes([payload[0], payload[1]]);
        self.info.restart_interval = self.restart_interval;
        Ok(next)
    }

    fn parse_sof(&mut self, data: &[u8], offset: usize) -> Result<usize> {
        if self.frame.is_some() {
            return Err(JpegError::InvalidSegment {
                marker: bytes::SOF0,
                reason: "multiple frame headers".into(),
            });
        }

        let (payload, next) = segment_payload(data, offset)?;
        if payload.len() < 6 {
            return Err(JpegError::InvalidSegment {
                marker: bytes::SOF0,
                reason: "frame header too short".into(),
            });
        }

        let precision = payload[0];
        if precision != 8 {
            return Err(JpegError::Unsupported(format!(
                "{}-bit sample precision; baseline is 8-bit",
                precision
            )));
        }

        let height = u32::from(u16::from_be_bytes([payload[1], payload[2]]));
        let width = u32::from(u16::from_be_bytes([payload[3], payload[4]]));
        if width == 0 || height == 0 {
            return Err(JpegError::InvalidDimensions { width, height });
        }

        let component_count = usize::from(payload[5]);
        if component_count != 1 && component_count != 3 {
            return Err(JpegError::Unsupported(format!(
                "{}-component frame",
                component_count
            )));
        }
        if payload.len() < 6 + component_count * 3 {
            return Err(JpegError::InvalidSegment {
                marker: bytes::SOF0,
                reason: "frame header truncates component list".into(),
            });
        }

        let mut components = Vec::with_capacity(component_count);
        for i in 0..component_count {
            let base = 6 + i * 3;
            let id = payload[base];
            let sampling = payload[base + 1];
            let quant_id = payload[base + 2];
            let h = usize::from(sampling >> 4);
            let v = usize::from(sampling & 0x0F);

            if !(1..=2).contains(&h) || !(1..=2).contains(&v) {
                return Err(JpegError::Unsupported(format!(
                    "sampling factors {}x{} for component {}",
                    h, v, id
                )));
            }
            if quant_id > 3 {
                return Err(JpegError::InvalidSegment {
                    marker: bytes::SOF0,
                    reason: format!("quantization table id {} out of range", quant_id),
                });
            }
            components.push(Component {
                id,
                h,
                v,
                quant_id,
                dc_id: 0,
                ac_id: 0,
            });
        }

        let max_h = components.iter().map(|c| c.h).max().unwrap_or(1);
        let max_v = components.iter().map(|c| c.v).max().unwrap_or(1);

        self.info.width = width;
        self.info.height = height;
        self.info.components = component_count as u8;
        self.info.bits_per_sample = precision;

        self.frame = Some(Frame {
            width: width as usize,
            height: height as usize,
            max_h,
            max_v,
            mcus_per_line: (width as usize).div_ceil(8 * max_h),
            mcus_per_column: (height as usize).div_ceil(8 * max_v),
            components,
        });

        debug!(width, height, components = component_count, "frame header parsed");
        Ok(next)
    }

    /// Parse the scan header and validate every reference it makes.
    ///
    /// Returns the offset where entropy-coded data begins.
    fn parse_sos(&mut self, data: &[u8], offset: usize) -> Result<usize> {
        let frame = self.frame.as_mut().ok_or(JpegError::InvalidSegment {
            marker: bytes::SOS,
            reason: "SOS before SOF".into(),
        })?;

        let (payload, next) = segment_payload(data, offset)?;
        if payload.is_empty() {
            return Err(JpegError::InvalidSegment {
                marker: bytes::SOS,
                reason: "empty scan header".into(),
            });
        }

        let scan_components = usize::from(payload[0]);
        if scan_components != frame.components.len() {
            return Err(JpegError::Unsupported(format!(
                "scan covers {} of {} components; only fully interleaved scans are supported",
                scan_components,
                frame.components.len()
            )));
        }
        if payload.len() < 1 + scan_components * 2 + 3 {
            return Err(JpegError::InvalidSegment {
                marker: bytes::SOS,
                reason: "scan header too short".into(),
            });
        }

        for i in 0..scan_components {
            let id = payload[1 + i * 2];
            let tables = payload[2 + i * 2];
            let component = frame
                .components
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or(JpegError::UnknownComponent { id })?;
            component.dc_id = tables >> 4;
            component.ac_id = tables & 0x0F;
        }

        let ss = payload[1 + scan_components * 2];
        let se = payload[2 + scan_components * 2];
        let approx = payload[3 + scan_components * 2];
        if ss != 0 || se != 63 || approx != 0 {
            return Err(JpegError::Unsupported(
                "spectral selection / successive approximation scan".into(),
            ));
        }

        // Reference checks up front: decoding cannot start with anything
        // missing.
        for component in &frame.components {
            if self.quant_tables[usize::from(component.quant_id)].is_none() {
                return Err(JpegError::MissingQuantTable {
                    id: component.quant_id,
                });
            }
            if component.dc_id > 3 || self.dc_tables[usize::from(component.dc_id)].is_none() {
                return Err(JpegError::MissingHuffmanTable {
                    class: "DC",
                    id: component.dc_id,
                });
            }
            if component.ac_id > 3 || self.ac_tables[usize::from(component.ac_id)].is_none() {
                return Err(JpegError::MissingHuffmanTable {
                    class: "AC",
                    id: component.ac_id,
                });
            }
        }

        Ok(next)
    }

    /// Decode the entropy-coded MCU grid and reconstruct the image.
    fn decode_scan(&mut self, data: &[u8], offset: usize) -> Result<Image> {
        let frame = self.frame.clone().ok_or(JpegError::InvalidSegment {
            marker: bytes::SOS,
            reason: "scan without frame".into(),
        })?;

        debug!(
            mcus_x = frame.mcus_per_line,
            mcus_y = frame.mcus_per_column,
            restart_interval = self.restart_interval,
            "decoding scan"
        );

        // Component planes at padded (MCU-aligned) resolution.
        let mut planes: Vec<Vec<u8>> = frame
            .components
            .iter()
            .map(|c| {
                vec![0u8; (frame.mcus_per_line * 8 * c.h) * (frame.mcus_per_column * 8 * c.v)]
            })
            .collect();

        let mut reader = JpegBitReader::new(&data[offset..]);
        let mut predictors = vec![0i16; frame.components.len()];
        let interval = usize::from(self.restart_interval);
        let mut restart_index = 0u8;
        let total_mcus = frame.mcus_per_line * frame.mcus_per_column;

        for mcu in 0..total_mcus {
            if interval > 0 && mcu > 0 && mcu % interval == 0 {
                let found = reader.expect_marker()?;
                let expected = bytes::RST0 + restart_index;
                if found != expected {
                    return Err(JpegError::RestartMismatch {
                        expected: restart_index,
                        found,
                    });
                }
                reader.consume_marker();
                restart_index = (restart_index + 1) & 7;
                predictors.iter_mut().for_each(|p| *p = 0);
            }

            let mcu_x = mcu % frame.mcus_per_line;
            let mcu_y = mcu / frame.mcus_per_line;

            for (ci, component) in frame.components.iter().enumerate() {
                let plane_width = frame.mcus_per_line * 8 * component.h;
                for by in 0..component.v {
                    for bx in 0..component.h {
                        let coeffs =
                            self.decode_block(&mut reader, component, &mut predictors[ci])?;
                        let samples = dct::inverse_dct(&coeffs);
                        let x0 = (mcu_x * component.h + bx) * 8;
                        let y0 = (mcu_y * component.v + by) * 8;
                        let plane = &mut planes[ci];
                        for row in 0..8 {
                            let dst = (y0 + row) * plane_width + x0;
                            for col in 0..8 {
                                plane[dst + col] = samples[row * 8 + col] as u8;
                            }
                        }
                    }
                }
            }
        }

        // The stream must close the scan with EOI immediately after the grid.
        let closing = reader.expect_marker()?;
        if closing != bytes::EOI {
            return Err(JpegError::InvalidSegment {
                marker: closing,
                reason: "expected EOI after final MCU".into(),
            });
        }
        reader.consume_marker();

        self.reconstruct(&frame, planes)
    }

    /// Decode one block into dequantized coefficients (natural order).
    fn decode_block(
        &self,
        reader: &mut JpegBitReader<'_>,
        component: &Component,
        predictor: &mut i16,
    ) -> Result<[i16; 64]> {
        let dc_table = self.dc_tables[usize::from(component.dc_id)]
            .as_ref()
            .ok_or(JpegError::MissingHuffmanTable {
                class: "DC",
                id: component.dc_id,
            })?;
        let ac_table = self.ac_tables[usize::from(component.ac_id)]
            .as_ref()
            .ok_or(JpegError::MissingHuffmanTable {
                class: "AC",
                id: component.ac_id,
            })?;
        let table = self.quant_tables[usize::from(component.quant_id)]
            .as_ref()
            .ok_or(JpegError::MissingQuantTable {
                id: component.quant_id,
            })?;

        let mut levels = [0i16; 64];

        let dc_category = dc_table.decode_symbol(reader)?;
        if dc_category > 15 {
            return Err(JpegError::CategoryOverflow {
                value: i32::from(dc_category),
            });
        }
        let diff = reader.receive_signed(dc_category)?;
        let dc = i32::from(*predictor) + diff;
        *predictor = dc.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        levels[0] = *predictor;

        let mut k = 1usize;
        while k < 64 {
            let symbol = ac_table.decode_symbol(reader)?;
            if symbol == 0x00 {
                break; // EOB: the rest of the block is zero
            }
            if symbol == 0xF0 {
                k += 16;
                continue;
            }
            let run = usize::from(symbol >> 4);
            let category = symbol & 0x0F;
            k += run;
            if k >= 64 {
                return Err(JpegError::InvalidHuffmanCode);
            }
            levels[ZIGZAG[k]] = reader.receive_signed(category)? as i16;
            k += 1;
        }

        Ok(quant::dequantize(&levels, table))
    }

    /// Crop, upsample, and color-convert the component planes into the
    /// output image.
    fn reconstruct(&self, frame: &Frame, planes: Vec<Vec<u8>>) -> Result<Image> {
        let width = frame.width;
        let height = frame.height;

        // Each component's true sampled extent, cut out of its MCU-aligned
        // plane before any upsampling decision is made.
        let sampled = |component: &Component, plane: &[u8]| -> (Vec<u8>, usize, usize) {
            let stride = frame.mcus_per_line * 8 * component.h;
            let sample_width = (width * component.h).div_ceil(frame.max_h);
            let sample_height = (height * component.v).div_ceil(frame.max_v);
            (
                crop_plane(plane, stride, sample_width, sample_height),
                sample_width,
                sample_height,
            )
        };

        if frame.components.len() == 1 {
            let (gray, _, _) = sampled(&frame.components[0], &planes[0]);
            return Image::from_data(width as u32, height as u32, PixelFormat::Gray8, gray);
        }

        let mut full = Vec::with_capacity(3);
        for (ci, component) in frame.components.iter().enumerate() {
            let (cropped, sample_width, sample_height) = sampled(component, &planes[ci]);
            full.push(upsample_plane(
                &cropped,
                sample_width,
                sample_height,
                width,
                height,
                self.options.upsampling,
            ));
        }

        let (rgb, stats) = self
            .options
            .color
            .interleaved_from_planes(&full[0], &full[1], &full[2]);
        trace!(
            pixels = stats.pixels,
            out_of_gamut = stats.out_of_gamut,
            "inverse color transform"
        );

        Image::from_data(width as u32, height as u32, PixelFormat::Rgb8, rgb)
    }
}

impl Default for JpegDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate the next marker, skipping 0xFF fill bytes.
///
/// Returns the marker type byte and the offset just past it.
fn next_marker(data: &[u8], offset: usize) -> Result<(u8, usize)> {
    let lead = read_u8(data, offset)?;
    if lead != 0xFF {
        return Err(JpegError::InvalidSegment {
            marker: lead,
            reason: "expected 0xFF marker prefix".into(),
        });
    }
    let mut pos = offset + 1;
    while read_u8(data, pos)? == 0xFF {
        pos += 1;
    }
    if data[pos] == 0x00 {
        return Err(JpegError::InvalidSegment {
            marker: 0x00,
            reason: "stuffed byte outside entropy-coded data".into(),
        });
    }
    Ok((data[pos], pos + 1))
}

/// Borrow a marker segment's payload, validating its length field.
///
/// Returns the payload and the offset just past the segment.
fn segment_payload(data: &[u8], offset: usize) -> Result<(&[u8], usize)> {
    let length = usize::from(read_u16_be(data, offset)?);
    if length < 2 {
        return Err(JpegError::InvalidSegment {
            marker: 0,
            reason: format!("segment length {} below minimum", length),
        });
    }
    let end = offset + length;
    if end > data.len() {
        return Err(JpegError::Truncated {
            expected: end,
            actual: data.len(),
        });
    }
    Ok((&data[offset + 2..end], end))
}

/// Skip a length-prefixed segment.
fn skip_segment(data: &[u8], offset: usize) -> Result<usize> {
    segment_payload(data, offset).map(|(_, next)| next)
}
