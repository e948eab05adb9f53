//! Quantization tables and quality scaling.

/// Luminance base quantization table (Annex K, quality 50), natural order.
pub const LUMINANCE_BASE: [u8; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61, //
    12, 12, 14, 19, 26, 58, 60, 55, //
    14, 13, 16, 24, 40, 57, 69, 56, //
    14, 17, 22, 29, 51, 87, 80, 62, //
    18, 22, 37, 56, 68, 109, 103, 77, //
    24, 35, 55, 64, 81, 104, 113, 92, //
    49, 64, 78, 87, 103, 121, 120, 101, //
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// Chrominance base quantization table (Annex K, quality 50), natural order.
pub const CHROMINANCE_BASE: [u8; 64] = [
    17, 18, 24, 47, 99, 99, 99, 99, //
    18, 21, 26, 66, 99, 99, 99, 99, //
    24, 26, 56, 99, 99, 99, 99, 99, //
    47, 66, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99,
];

/// Map a 1-100 quality setting onto the standard scale factor curve.
///
/// Below 50 the curve is hyperbolic (`5000/q`), above it linear (`200-2q`);
/// smaller factors mean finer quantization.
pub fn quality_scale_factor(quality: u8) -> u32 {
    let q = u32::from(quality.clamp(1, 100));
    if q < 50 {
        5000 / q
    } else {
        200 - 2 * q
    }
}

/// Scale a base table by a quality scale factor.
///
/// Each entry rounds to nearest and clamps to 1..=255; an entry of zero would
/// make dequantization undefined.
pub fn scale_table(base: &[u8; 64], scale_factor: u32) -> [u8; 64] {
    let mut scaled = [0u8; 64];
    for i in 0..64 {
        let value = (u32::from(base[i]) * scale_factor + 50) / 100;
        scaled[i] = value.clamp(1, 255) as u8;
    }
    scaled
}

/// Build the scaled table for a quality setting in one step.
pub fn table_for_quality(base: &[u8; 64], quality: u8) -> [u8; 64] {
    scale_table(base, quality_scale_factor(quality))
}

/// Quantize a block of DCT coefficients: nearest, ties away from zero.
pub fn quantize(coeffs: &[f32; 64], table: &[u8; 64]) -> [i16; 64] {
    let mut levels = [0i16; 64];
    for i in 0..64 {
        levels[i] = (coeffs[i] / f32::from(table[i])).round() as i16;
    }
    levels
}

/// Dequantize coefficient levels back into coefficients.
///
/// Products are clamped into i16 so corrupt streams cannot overflow; valid
/// baseline coefficients stay far inside the range.
pub fn dequantize(levels: &[i16; 64], table: &[u8; 64]) -> [i16; 64] {
    let mut coeffs = [0i16; 64];
    for i in 0..64 {
        let product = i32::from(levels[i]) * i32::from(table[i]);
        coeffs[i] = product.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
    }
    coeffs
}
