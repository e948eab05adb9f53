//! JPEG encoder implementation.

use byteorder::{BigEndian, WriteBytesExt};
use stillcode_core::JpegBitWriter;
use tracing::{debug, trace};

use crate::color::ColorTransform;
use crate::dct;
use crate::error::{JpegError, Result};
use crate::huffman::{
    self, walk_block, BlockSink, FrequencyCounter, HuffmanEncoder, HuffmanTable, StatsSink,
    TableClass,
};
use crate::image::{Image, PixelFormat};
use crate::marker::{bytes, write_bare_marker, write_segment, ZIGZAG};
use crate::quant;
use crate::sampling::{downsample_plane, ChromaSubsampling};

/// Units of the JFIF pixel density fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DensityUnits {
    /// No units; x/y describe the pixel aspect ratio.
    #[default]
    AspectRatio,
    /// Dots per inch.
    DotsPerInch,
    /// Dots per centimeter.
    DotsPerCm,
}

impl DensityUnits {
    fn wire_value(self) -> u8 {
        match self {
            DensityUnits::AspectRatio => 0,
            DensityUnits::DotsPerInch => 1,
            DensityUnits::DotsPerCm => 2,
        }
    }
}

/// JFIF APP0 density declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JfifDensity {
    /// Density units.
    pub units: DensityUnits,
    /// Horizontal density.
    pub x: u16,
    /// Vertical density.
    pub y: u16,
}

impl Default for JfifDensity {
    fn default() -> Self {
        Self {
            units: DensityUnits::AspectRatio,
            x: 1,
            y: 1,
        }
    }
}

/// JPEG encoder configuration.
#[derive(Debug, Clone)]
pub struct JpegConfig {
    /// Quality (1-100). Out-of-range values clamp.
    pub quality: u8,
    /// Chroma subsampling.
    pub subsampling: ChromaSubsampling,
    /// Pixel format the free-function entry points interpret raw buffers as.
    pub pixel_format: PixelFormat,
    /// Restart interval in MCUs; 0 disables restart markers.
    pub restart_interval: u16,
    /// JFIF density declaration.
    pub density: JfifDensity,
    /// Raw APP1 payload to embed verbatim (EXIF).
    pub exif: Option<Vec<u8>>,
    /// Raw ICC profile to embed, chunked into APP2 segments.
    pub icc_profile: Option<Vec<u8>>,
    /// Build image-specific Huffman tables in a statistics pre-pass.
    pub optimize_coding: bool,
    /// Color transform selection.
    pub color: ColorTransform,
}

impl Default for JpegConfig {
    fn default() -> Self {
        Self {
            quality: 75,
            subsampling: ChromaSubsampling::default(),
            pixel_format: PixelFormat::Rgb8,
            restart_interval: 0,
            density: JfifDensity::default(),
            exif: None,
            icc_profile: None,
            optimize_coding: false,
            color: ColorTransform::default(),
        }
    }
}

impl JpegConfig {
    /// Default configuration at a given quality.
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality,
            ..Self::default()
        }
    }

    fn effective_quality(&self) -> u8 {
        self.quality.clamp(1, 100)
    }
}

/// Prepared component planes for one encode session.
struct PreparedPlanes {
    /// Full-resolution luma.
    y: Vec<u8>,
    /// Downsampled chroma, absent for grayscale.
    chroma: Option<ChromaPlanes>,
}

struct ChromaPlanes {
    cb: Vec<u8>,
    cr: Vec<u8>,
    width: usize,
    height: usize,
}

/// Scan geometry derived from image dimensions and sampling factors.
struct ScanGeometry {
    width: usize,
    height: usize,
    /// Luma sampling factors.
    h: usize,
    v: usize,
    mcus_x: usize,
    mcus_y: usize,
}

impl ScanGeometry {
    fn new(width: usize, height: usize, subsampling: ChromaSubsampling) -> Self {
        let (h, v) = subsampling.luma_factors();
        Self {
            width,
            height,
            h,
            v,
            mcus_x: width.div_ceil(8 * h),
            mcus_y: height.div_ceil(8 * v),
        }
    }
}

/// One step of the MCU traversal.
enum ScanEvent<'a> {
    /// A restart boundary: predictors reset; the emit pass writes RSTn.
    Restart,
    /// One quantized block of a component channel (0 = Y, 1 = Cb, 2 = Cr).
    Block { channel: usize, levels: &'a [i16; 64] },
}

/// Bit-level emission sink for one block.
struct EmitSink<'a, 'b> {
    writer: &'a mut JpegBitWriter,
    dc: &'b HuffmanEncoder,
    ac: &'b HuffmanEncoder,
}

impl BlockSink for EmitSink<'_, '_> {
    fn dc(&mut self, category: u8, diff: i32) -> Result<()> {
        let (code, length) = self
            .dc
            .code(category)
            .ok_or(JpegError::SymbolNotInTable { symbol: category })?;
        self.writer.write_bits(code, length)?;
        if category > 0 {
            self.writer
                .write_bits(huffman::magnitude_bits(diff, category), category)?;
        }
        Ok(())
    }

    fn ac(&mut self, symbol: u8, category: u8, value: i32) -> Result<()> {
        let (code, length) = self
            .ac
            .code(symbol)
            .ok_or(JpegError::SymbolNotInTable { symbol })?;
        self.writer.write_bits(code, length)?;
        if category > 0 {
            self.writer
                .write_bits(huffman::magnitude_bits(value, category), category)?;
        }
        Ok(())
    }
}

/// The entropy tables selected for one encode session.
struct TableSet {
    dc_lum: HuffmanTable,
    ac_lum: HuffmanTable,
    dc_chr: Option<HuffmanTable>,
    ac_chr: Option<HuffmanTable>,
}

/// JPEG encoder.
pub struct JpegEncoder {
    config: JpegConfig,
    lum_quant: [u8; 64],
    chr_quant: [u8; 64],
}

impl JpegEncoder {
    /// Create an encoder, deriving the quantization tables for the
    /// configured quality.
    pub fn new(config: JpegConfig) -> Self {
        let quality = config.effective_quality();
        let lum_quant = quant::table_for_quality(&quant::LUMINANCE_BASE, quality);
        let chr_quant = quant::table_for_quality(&quant::CHROMINANCE_BASE, quality);
        Self {
            config,
            lum_quant,
            chr_quant,
        }
    }

    /// Borrow the configuration.
    pub fn config(&self) -> &JpegConfig {
        &self.config
    }

    /// Encode an image into a fresh byte buffer.
    pub fn encode(&self, image: &Image) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(
            image.width() as usize * image.height() as usize / 4 + 1024,
        );
        self.encode_into(&mut out, image)?;
        Ok(out)
    }

    /// Encode an image, appending the stream to a caller-supplied buffer.
    pub fn encode_into(&self, out: &mut Vec<u8>, image: &Image) -> Result<()> {
        let width = image.width() as usize;
        let height = image.height() as usize;
        let grayscale = image.format() == PixelFormat::Gray8
            || self.config.subsampling == ChromaSubsampling::Gray;
        let subsampling = if grayscale {
            ChromaSubsampling::Gray
        } else {
            self.config.subsampling
        };

        debug!(
            width,
            height,
            quality = self.config.effective_quality(),
            subsampling = ?subsampling,
            optimize = self.config.optimize_coding,
            "encoding JPEG"
        );

        let planes = self.prepare_planes(image, grayscale);
        let geometry = ScanGeometry::new(width, height, subsampling);
        let tables = self.select_tables(&planes, &geometry, grayscale)?;

        write_bare_marker(out, bytes::SOI);
        self.write_app0(out)?;
        if let Some(exif) = &self.config.exif {
            write_segment(out, bytes::APP1, exif)?;
        }
        if let Some(icc) = &self.config.icc_profile {
            write_icc_profile(out, icc)?;
        }
        self.write_dqt(out, grayscale)?;
        self.write_sof0(out, &geometry, grayscale)?;
        self.write_dht(out, &tables)?;
        if self.config.restart_interval > 0 {
            let mut payload = Vec::with_capacity(2);
            payload.write_u16::<BigEndian>(self.config.restart_interval)?;
            write_segment(out, bytes::DRI, &payload)?;
        }
        self.write_sos(out, grayscale)?;
        self.write_scan(out, &planes, &geometry, &tables)?;
        write_bare_marker(out, bytes::EOI);

        trace!(bytes = out.len(), "JPEG stream assembled");
        Ok(())
    }

    /// Color-convert and subsample the input into component planes.
    fn prepare_planes(&self, image: &Image, grayscale: bool) -> PreparedPlanes {
        let width = image.width() as usize;
        let height = image.height() as usize;

        if grayscale {
            let y = match image.format() {
                PixelFormat::Gray8 => image.data().to_vec(),
                _ => {
                    let rgb = image.to_rgb_bytes();
                    let ([y, _, _], stats) =
                        self.config
                            .color
                            .planes_from_interleaved(&rgb, width, height, 3);
                    trace!(pixels = stats.pixels, "luma-only color transform");
                    y
                }
            };
            return PreparedPlanes { y, chroma: None };
        }

        let rgb = image.to_rgb_bytes();
        let ([y, cb, cr], stats) = self
            .config
            .color
            .planes_from_interleaved(&rgb, width, height, 3);
        trace!(
            pixels = stats.pixels,
            out_of_gamut = stats.out_of_gamut,
            "color transform"
        );

        let (cb, cw, ch) = downsample_plane(&cb, width, height, self.config.subsampling);
        let (cr, _, _) = downsample_plane(&cr, width, height, self.config.subsampling);
        PreparedPlanes {
            y,
            chroma: Some(ChromaPlanes {
                cb,
                cr,
                width: cw,
                height: ch,
            }),
        }
    }

    /// Pick entropy tables: Annex K defaults, or image-specific optimized
    /// tables built from a statistics pre-pass.
    fn select_tables(
        &self,
        planes: &PreparedPlanes,
        geometry: &ScanGeometry,
        grayscale: bool,
    ) -> Result<TableSet> {
        if !self.config.optimize_coding {
            return Ok(TableSet {
                dc_lum: huffman::dc_luminance(),
                ac_lum: huffman::ac_luminance(),
                dc_chr: (!grayscale).then(huffman::dc_chrominance),
                ac_chr: (!grayscale).then(huffman::ac_chrominance),
            });
        }

        let mut dc_lum_hist = FrequencyCounter::new();
        let mut ac_lum_hist = FrequencyCounter::new();
        let mut dc_chr_hist = FrequencyCounter::new();
        let mut ac_chr_hist = FrequencyCounter::new();
        let mut preds = [0i16; 3];

        self.iterate_scan(planes, geometry, |event| match event {
            ScanEvent::Restart => {
                preds = [0; 3];
                Ok(())
            }
            ScanEvent::Block { channel, levels } => {
                let (dc_hist, ac_hist) = if channel == 0 {
                    (&mut dc_lum_hist, &mut ac_lum_hist)
                } else {
                    (&mut dc_chr_hist, &mut ac_chr_hist)
                };
                let mut sink = StatsSink {
                    dc: dc_hist,
                    ac: ac_hist,
                };
                preds[channel] = walk_block(levels, preds[channel], &mut sink)?;
                Ok(())
            }
        })?;

        trace!("optimized Huffman statistics collected");
        Ok(TableSet {
            dc_lum: huffman::build_optimal_table(TableClass::Dc, 0, &dc_lum_hist)?,
            ac_lum: huffman::build_optimal_table(TableClass::Ac, 0, &ac_lum_hist)?,
            dc_chr: if grayscale {
                None
            } else {
                Some(huffman::build_optimal_table(TableClass::Dc, 1, &dc_chr_hist)?)
            },
            ac_chr: if grayscale {
                None
            } else {
                Some(huffman::build_optimal_table(TableClass::Ac, 1, &ac_chr_hist)?)
            },
        })
    }

    /// Drive the MCU traversal, emitting restart boundaries and quantized
    /// blocks in the mandated order: row-major MCUs; within an MCU the luma
    /// blocks row-major, then Cb, then Cr.
    ///
    /// Both the statistics pass and the emission pass run through here, so
    /// predictor resets and block order cannot diverge between them.
    fn iterate_scan(
        &self,
        planes: &PreparedPlanes,
        geometry: &ScanGeometry,
        mut on_event: impl FnMut(ScanEvent<'_>) -> Result<()>,
    ) -> Result<()> {
        let interval = usize::from(self.config.restart_interval);
        let mut mcu_index = 0usize;

        for mcu_y in 0..geometry.mcus_y {
            for mcu_x in 0..geometry.mcus_x {
                if interval > 0 && mcu_index > 0 && mcu_index % interval == 0 {
                    on_event(ScanEvent::Restart)?;
                }

                for by in 0..geometry.v {
                    for bx in 0..geometry.h {
                        let px = (mcu_x * geometry.h + bx) * 8;
                        let py = (mcu_y * geometry.v + by) * 8;
                        let block =
                            extract_block(&planes.y, geometry.width, geometry.height, px, py);
                        let levels =
                            quant::quantize(&dct::forward_dct(&block), &self.lum_quant);
                        on_event(ScanEvent::Block {
                            channel: 0,
                            levels: &levels,
                        })?;
                    }
                }

                if let Some(chroma) = &planes.chroma {
                    let cx = mcu_x * 8;
                    let cy = mcu_y * 8;
                    for (channel, plane) in [(1usize, &chroma.cb), (2usize, &chroma.cr)] {
                        let block = extract_block(plane, chroma.width, chroma.height, cx, cy);
                        let levels =
                            quant::quantize(&dct::forward_dct(&block), &self.chr_quant);
                        on_event(ScanEvent::Block {
                            channel,
                            levels: &levels,
                        })?;
                    }
                }

                mcu_index += 1;
            }
        }
        Ok(())
    }

    /// Emit the entropy-coded scan data, restart markers included.
    fn write_scan(
        &self,
        out: &mut Vec<u8>,
        planes: &PreparedPlanes,
        geometry: &ScanGeometry,
        tables: &TableSet,
    ) -> Result<()> {
        let dc_lum = HuffmanEncoder::from_table(&tables.dc_lum);
        let ac_lum = HuffmanEncoder::from_table(&tables.ac_lum);
        let dc_chr = tables.dc_chr.as_ref().map(HuffmanEncoder::from_table);
        let ac_chr = tables.ac_chr.as_ref().map(HuffmanEncoder::from_table);

        let mut writer =
            JpegBitWriter::with_capacity(geometry.width * geometry.height / 4 + 256);
        let mut preds = [0i16; 3];
        let mut restart_index = 0u8;

        self.iterate_scan(planes, geometry, |event| match event {
            ScanEvent::Restart => {
                writer.align()?;
                writer.write_marker(bytes::RST0 + restart_index)?;
                restart_index = (restart_index + 1) & 7;
                preds = [0; 3];
                Ok(())
            }
            ScanEvent::Block { channel, levels } => {
                let (dc, ac) = if channel == 0 {
                    (&dc_lum, &ac_lum)
                } else {
                    let dc = dc_chr.as_ref().ok_or(JpegError::MissingHuffmanTable {
                        class: "DC",
                        id: 1,
                    })?;
                    let ac = ac_chr.as_ref().ok_or(JpegError::MissingHuffmanTable {
                        class: "AC",
                        id: 1,
                    })?;
                    (dc, ac)
                };
                let mut sink = EmitSink {
                    writer: &mut writer,
                    dc,
                    ac,
                };
                preds[channel] = walk_block(levels, preds[channel], &mut sink)?;
                Ok(())
            }
        })?;

        writer.align()?;
        out.extend_from_slice(&writer.finish()?);
        Ok(())
    }

    fn write_app0(&self, out: &mut Vec<u8>) -> Result<()> {
        let density = self.config.density;
        let mut payload = Vec::with_capacity(14);
        payload.extend_from_slice(b"JFIF\0");
        payload.push(1);
        payload.push(1);
        payload.push(density.units.wire_value());
        payload.write_u16::<BigEndian>(density.x)?;
        payload.write_u16::<BigEndian>(density.y)?;
        payload.push(0);
        payload.push(0);
        write_segment(out, bytes::APP0, &payload)
    }

    fn write_dqt(&self, out: &mut Vec<u8>, grayscale: bool) -> Result<()> {
        let mut payload = Vec::with_capacity(65);
        payload.push(0x00);
        for &natural in ZIGZAG.iter() {
            payload.push(self.lum_quant[natural]);
        }
        write_segment(out, bytes::DQT, &payload)?;

        if !grayscale {
            payload.clear();
            payload.push(0x01);
            for &natural in ZIGZAG.iter() {
                payload.push(self.chr_quant[natural]);
            }
            write_segment(out, bytes::DQT, &payload)?;
        }
        Ok(())
    }

    fn write_sof0(&self, out: &mut Vec<u8>, geometry: &ScanGeometry, grayscale: bool) -> Result<()> {
        let component_count = if grayscale { 1 } else { 3 };
        let mut payload = Vec::with_capacity(6 + component_count * 3);
        payload.push(8); // sample precision
        payload.write_u16::<BigEndian>(geometry.height as u16)?;
        payload.write_u16::<BigEndian>(geometry.width as u16)?;
        payload.push(component_count as u8);

        let luma_sampling = ((geometry.h as u8) << 4) | geometry.v as u8;
        if grayscale {
            payload.extend_from_slice(&[1, 0x11, 0]);
        } else {
            payload.extend_from_slice(&[1, luma_sampling, 0]);
            payload.extend_from_slice(&[2, 0x11, 1]);
            payload.extend_from_slice(&[3, 0x11, 1]);
        }
        write_segment(out, bytes::SOF0, &payload)
    }

    fn write_dht(&self, out: &mut Vec<u8>, tables: &TableSet) -> Result<()> {
        let mut all: Vec<&HuffmanTable> = vec![&tables.dc_lum, &tables.ac_lum];
        if let (Some(dc), Some(ac)) = (&tables.dc_chr, &tables.ac_chr) {
            all.push(dc);
            all.push(ac);
        }
        for table in all {
            let mut payload = Vec::with_capacity(17 + table.huffval.len());
            payload.push((table.class.wire_value() << 4) | table.id);
            payload.extend_from_slice(&table.bits[1..=16]);
            payload.extend_from_slice(&table.huffval);
            write_segment(out, bytes::DHT, &payload)?;
        }
        Ok(())
    }

    fn write_sos(&self, out: &mut Vec<u8>, grayscale: bool) -> Result<()> {
        let component_count = if grayscale { 1 } else { 3 };
        let mut payload = Vec::with_capacity(4 + component_count * 2);
        payload.push(component_count as u8);
        payload.extend_from_slice(&[1, 0x00]);
        if !grayscale {
            payload.extend_from_slice(&[2, 0x11]);
            payload.extend_from_slice(&[3, 0x11]);
        }
        // Baseline spectral selection: full spectrum, no approximation.
        payload.extend_from_slice(&[0x00, 0x3F, 0x00]);
        write_segment(out, bytes::SOS, &payload)
    }
}

/// Extract one 8x8 level-shifted block, replicating edge samples where the
/// block hangs past the plane.
fn extract_block(plane: &[u8], width: usize, height: usize, x: usize, y: usize) -> [i16; 64] {
    let mut block = [0i16; 64];
    for row in 0..8 {
        let py = (y + row).min(height - 1);
        for col in 0..8 {
            let px = (x + col).min(width - 1);
            block[row * 8 + col] = i16::from(plane[py * width + px]) - 128;
        }
    }
    block
}

/// Identifier prefix of an ICC APP2 chunk.
const ICC_HEADER: &[u8] = b"ICC_PROFILE\0";

/// Largest profile slice one APP2 segment can carry.
const ICC_CHUNK_CAPACITY: usize = 65_519;

/// Chunk an ICC profile across APP2 segments, each prefixed with the
/// identifier plus a 1-based index and total count.
fn write_icc_profile(out: &mut Vec<u8>, profile: &[u8]) -> Result<()> {
    let count = profile.len().div_ceil(ICC_CHUNK_CAPACITY).max(1);
    if count > 255 {
        return Err(JpegError::InvalidSegment {
            marker: bytes::APP2,
            reason: format!("ICC profile of {} bytes needs more than 255 chunks", profile.len()),
        });
    }
    for (index, chunk) in profile.chunks(ICC_CHUNK_CAPACITY).enumerate() {
        let mut payload = Vec::with_capacity(ICC_HEADER.len() + 2 + chunk.len());
        payload.extend_from_slice(ICC_HEADER);
        payload.push((index + 1) as u8);
        payload.push(count as u8);
        payload.extend_from_slice(chunk);
        write_segment(out, bytes::APP2, &payload)?;
    }
    Ok(())
}
