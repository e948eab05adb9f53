//! End-to-end conformance tests: encode/decode round trips, restart
//! resynchronization, metadata embedding, and error surfaces.

use stillcode_jpeg::{
    decode, decode_with, encode, ChromaSubsampling, DecodeOptions, Image, JpegConfig,
    JpegDecoder, JpegEncoder, JpegError, PixelFormat, Upsampling,
};

fn solid_rgb(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for _ in 0..width * height {
        data.extend_from_slice(&rgb);
    }
    data
}

/// A smooth neutral gradient: equal channels keep chroma flat, so
/// subsampling introduces no extra error.
fn neutral_gradient(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = ((x + y) * 255 / (width + height - 2)) as u8;
            data.extend_from_slice(&[v, v, v]);
        }
    }
    data
}

/// A deterministic textured pattern that keeps the entropy coder busy.
fn textured(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = (((x * 13 + y * 7) % 32) * 8) as u8;
            data.extend_from_slice(&[v, v.wrapping_add(40), v.wrapping_add(90)]);
        }
    }
    data
}

fn mean_absolute_error(a: &[u8], b: &[u8]) -> f64 {
    assert_eq!(a.len(), b.len());
    let total: u64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum();
    total as f64 / a.len() as f64
}

#[test]
fn solid_mid_gray_q90_444_stays_within_two() {
    let pixels = solid_rgb(16, 16, [128, 128, 128]);
    let config = JpegConfig {
        quality: 90,
        subsampling: ChromaSubsampling::Yuv444,
        ..Default::default()
    };
    let jpeg = encode(&pixels, 16, 16, &config).unwrap();
    let image = decode(&jpeg).unwrap();

    assert_eq!(image.width(), 16);
    assert_eq!(image.height(), 16);
    for &sample in image.data() {
        assert!(
            (i16::from(sample) - 128).abs() <= 2,
            "sample {} strays from 128",
            sample
        );
    }
}

#[test]
fn smooth_gradient_q100_444_has_low_error() {
    let pixels = neutral_gradient(32, 32);
    let config = JpegConfig {
        quality: 100,
        subsampling: ChromaSubsampling::Yuv444,
        ..Default::default()
    };
    let jpeg = encode(&pixels, 32, 32, &config).unwrap();
    let image = decode(&jpeg).unwrap();

    let mae = mean_absolute_error(&pixels, image.data());
    assert!(mae < 5.0, "mean absolute error {}", mae);
}

#[test]
fn checkerboard_q100_keeps_contrast() {
    let mut pixels = Vec::with_capacity(8 * 8 * 3);
    for y in 0..8u32 {
        for x in 0..8u32 {
            let v = if (x + y) % 2 == 0 { 255u8 } else { 0 };
            pixels.extend_from_slice(&[v, v, v]);
        }
    }
    let config = JpegConfig {
        quality: 100,
        subsampling: ChromaSubsampling::Yuv444,
        ..Default::default()
    };
    let jpeg = encode(&pixels, 8, 8, &config).unwrap();
    let image = decode(&jpeg).unwrap();

    let min = image.data().iter().copied().min().unwrap();
    let max = image.data().iter().copied().max().unwrap();
    assert!(min < 64, "dark squares washed out: min {}", min);
    assert!(max > 192, "bright squares washed out: max {}", max);
}

#[test]
fn subsampled_roundtrips_decode_to_original_geometry() {
    for subsampling in [ChromaSubsampling::Yuv420, ChromaSubsampling::Yuv422] {
        let pixels = neutral_gradient(40, 24);
        let config = JpegConfig {
            quality: 85,
            subsampling,
            ..Default::default()
        };
        let jpeg = encode(&pixels, 40, 24, &config).unwrap();
        let image = decode(&jpeg).unwrap();

        assert_eq!(image.width(), 40);
        assert_eq!(image.height(), 24);
        let mae = mean_absolute_error(&pixels, image.data());
        assert!(mae < 6.0, "{:?} mean absolute error {}", subsampling, mae);
    }
}

#[test]
fn restart_interval_decodes_identically() {
    let pixels = textured(48, 16);
    let plain = JpegConfig {
        subsampling: ChromaSubsampling::Yuv444,
        ..Default::default()
    };
    let with_restarts = JpegConfig {
        restart_interval: 2,
        ..plain.clone()
    };

    let jpeg_plain = encode(&pixels, 48, 16, &plain).unwrap();
    let jpeg_restart = encode(&pixels, 48, 16, &with_restarts).unwrap();
    assert_ne!(jpeg_plain, jpeg_restart);

    // Restart markers only repartition the entropy stream; the decoded
    // samples must be bit-identical.
    let a = decode(&jpeg_plain).unwrap();
    let b = decode(&jpeg_restart).unwrap();
    assert_eq!(a.data(), b.data());
}

#[test]
fn restart_marker_mismatch_is_fatal() {
    let pixels = textured(48, 16);
    let config = JpegConfig {
        subsampling: ChromaSubsampling::Yuv444,
        restart_interval: 2,
        ..Default::default()
    };
    let mut jpeg = encode(&pixels, 48, 16, &config).unwrap();

    // The first restart marker in the stream is RST0; forge its index.
    let rst0 = jpeg
        .windows(2)
        .position(|w| w == [0xFF, 0xD0])
        .expect("restart marker present");
    jpeg[rst0 + 1] = 0xD4;

    let err = decode(&jpeg).unwrap_err();
    assert!(
        matches!(
            err,
            JpegError::RestartMismatch {
                expected: 0,
                found: 0xD4
            }
        ),
        "unexpected error: {err}"
    );
}

#[test]
fn optimized_tables_decode_identically_and_shrink() {
    let pixels = textured(64, 48);
    let plain_config = JpegConfig::default();
    let optimized_config = JpegConfig {
        optimize_coding: true,
        ..Default::default()
    };

    let plain = encode(&pixels, 64, 48, &plain_config).unwrap();
    let optimized = encode(&pixels, 64, 48, &optimized_config).unwrap();
    assert!(optimized.len() < plain.len());

    // Table optimization is lossless: identical decoded samples.
    let a = decode(&plain).unwrap();
    let b = decode(&optimized).unwrap();
    assert_eq!(a.data(), b.data());
}

#[test]
fn grayscale_roundtrip() {
    let mut data = Vec::with_capacity(24 * 24);
    for y in 0..24u32 {
        for x in 0..24u32 {
            data.push(((x * 255) / 23).min(255) as u8 / 2 + (y as u8));
        }
    }
    let image = Image::from_data(24, 24, PixelFormat::Gray8, data.clone()).unwrap();
    let encoder = JpegEncoder::new(JpegConfig::with_quality(95));
    let jpeg = encoder.encode(&image).unwrap();

    let decoded = decode(&jpeg).unwrap();
    assert_eq!(decoded.format(), PixelFormat::Gray8);
    assert_eq!(decoded.width(), 24);
    let mae = mean_absolute_error(&data, decoded.data());
    assert!(mae < 4.0, "mean absolute error {}", mae);
}

#[test]
fn rgba_input_drops_alpha() {
    let mut pixels = Vec::with_capacity(16 * 16 * 4);
    for _ in 0..16 * 16 {
        pixels.extend_from_slice(&[180, 90, 30, 255]);
    }
    let config = JpegConfig {
        pixel_format: PixelFormat::Rgba8,
        subsampling: ChromaSubsampling::Yuv444,
        quality: 95,
        ..Default::default()
    };
    let jpeg = encode(&pixels, 16, 16, &config).unwrap();
    let image = decode(&jpeg).unwrap();

    assert_eq!(image.format(), PixelFormat::Rgb8);
    let px = image.get_pixel(8, 8);
    assert!((i16::from(px[0]) - 180).abs() <= 4);
    assert!((i16::from(px[1]) - 90).abs() <= 4);
    assert!((i16::from(px[2]) - 30).abs() <= 4);
}

#[test]
fn exif_and_icc_survive_embedding() {
    let exif = b"Exif\0\0II*\0fake-tiff-body".to_vec();
    let icc: Vec<u8> = (0..70_000u32).map(|i| (i % 251) as u8).collect();

    let config = JpegConfig {
        exif: Some(exif.clone()),
        icc_profile: Some(icc.clone()),
        ..Default::default()
    };
    let jpeg = encode(&solid_rgb(8, 8, [10, 20, 30]), 8, 8, &config).unwrap();

    let mut decoder = JpegDecoder::new();
    decoder.decode(&jpeg).unwrap();
    assert!(decoder.info().has_exif);
    assert_eq!(decoder.exif(), Some(exif.as_slice()));
    assert_eq!(decoder.icc_profile(), Some(icc));
}

#[test]
fn jfif_header_is_reported() {
    let jpeg = encode(
        &solid_rgb(8, 8, [1, 2, 3]),
        8,
        8,
        &JpegConfig::default(),
    )
    .unwrap();
    let mut decoder = JpegDecoder::new();
    decoder.decode(&jpeg).unwrap();
    assert!(decoder.info().has_jfif);
    assert_eq!(decoder.info().jfif_version, (1, 1));
    assert_eq!(decoder.info().bits_per_sample, 8);
}

#[test]
fn fancy_and_nearest_upsampling_differ_on_chroma_edges() {
    // A hard red/blue boundary puts a step into both chroma planes.
    let width = 32u32;
    let mut pixels = Vec::with_capacity((width * width * 3) as usize);
    for _y in 0..width {
        for x in 0..width {
            if x < width / 2 {
                pixels.extend_from_slice(&[220, 30, 30]);
            } else {
                pixels.extend_from_slice(&[30, 30, 220]);
            }
        }
    }
    let config = JpegConfig {
        subsampling: ChromaSubsampling::Yuv420,
        ..Default::default()
    };
    let jpeg = encode(&pixels, width, width, &config).unwrap();

    let fancy = decode_with(
        &jpeg,
        &DecodeOptions {
            upsampling: Upsampling::Fancy,
            ..Default::default()
        },
    )
    .unwrap();
    let nearest = decode_with(
        &jpeg,
        &DecodeOptions {
            upsampling: Upsampling::Nearest,
            ..Default::default()
        },
    )
    .unwrap();

    assert_ne!(fancy.data(), nearest.data());
}

#[test]
fn odd_dimensions_roundtrip() {
    let pixels = neutral_gradient(17, 13);
    for subsampling in [
        ChromaSubsampling::Yuv444,
        ChromaSubsampling::Yuv422,
        ChromaSubsampling::Yuv420,
    ] {
        let config = JpegConfig {
            quality: 90,
            subsampling,
            ..Default::default()
        };
        let jpeg = encode(&pixels, 17, 13, &config).unwrap();
        let image = decode(&jpeg).unwrap();
        assert_eq!(image.width(), 17);
        assert_eq!(image.height(), 13);
        let mae = mean_absolute_error(&pixels, image.data());
        assert!(mae < 8.0, "{:?} mean absolute error {}", subsampling, mae);
    }
}

#[test]
fn higher_quality_spends_more_bytes() {
    let pixels = textured(64, 64);
    let low = encode(&pixels, 64, 64, &JpegConfig::with_quality(30)).unwrap();
    let high = encode(&pixels, 64, 64, &JpegConfig::with_quality(95)).unwrap();
    assert!(low.len() < high.len());
}

#[test]
fn truncated_scan_fails_loudly() {
    let jpeg = encode(
        &textured(32, 32),
        32,
        32,
        &JpegConfig::default(),
    )
    .unwrap();
    let cut = &jpeg[..jpeg.len() - 12];
    let err = decode(cut).unwrap_err();
    assert!(
        matches!(err, JpegError::Bitstream(_) | JpegError::Truncated { .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn encoded_streams_carry_the_magic_bytes() {
    let jpeg = encode(
        &solid_rgb(8, 8, [5, 5, 5]),
        8,
        8,
        &JpegConfig::default(),
    )
    .unwrap();
    assert!(stillcode_jpeg::is_jpeg(&jpeg));
}
