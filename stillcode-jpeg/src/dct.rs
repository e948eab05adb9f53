//! Discrete Cosine Transform on 8x8 blocks.
//!
//! Exact separable DCT-II (forward) and DCT-III (inverse) over f32, driven by
//! a precomputed basis table. Forward input is level-shifted spatial samples;
//! inverse output restores the +128 level shift and clamps to 0..=255.

use std::f32::consts::PI;
use std::sync::OnceLock;

/// Basis table: `basis[k][n] = 0.5 * alpha(k) * cos((2n+1)k*pi/16)`.
///
/// The two 0.5 factors of the separable passes combine into the 1/4 of the
/// 2D definition.
fn basis() -> &'static [[f32; 8]; 8] {
    static BASIS: OnceLock<[[f32; 8]; 8]> = OnceLock::new();
    BASIS.get_or_init(|| {
        let mut table = [[0.0f32; 8]; 8];
        for (k, row) in table.iter_mut().enumerate() {
            let alpha = if k == 0 { 0.5f32.sqrt() } else { 1.0 };
            for (n, cell) in row.iter_mut().enumerate() {
                *cell = 0.5 * alpha * (PI * (2 * n + 1) as f32 * k as f32 / 16.0).cos();
            }
        }
        table
    })
}

/// Forward 2D DCT-II on a level-shifted 8x8 block.
///
/// Input samples are in [-128, 127]; output coefficients are in natural
/// row-major order (vertical frequency selects the row).
pub fn forward_dct(block: &[i16; 64]) -> [f32; 64] {
    let basis = basis();
    let mut rows = [[0.0f32; 8]; 8];

    for y in 0..8 {
        for u in 0..8 {
            let mut sum = 0.0f32;
            for x in 0..8 {
                sum += f32::from(block[y * 8 + x]) * basis[u][x];
            }
            rows[y][u] = sum;
        }
    }

    let mut coeffs = [0.0f32; 64];
    for u in 0..8 {
        for v in 0..8 {
            let mut sum = 0.0f32;
            for y in 0..8 {
                sum += rows[y][u] * basis[v][y];
            }
            coeffs[v * 8 + u] = sum;
        }
    }

    coeffs
}

/// Inverse 2D DCT-III on an 8x8 coefficient block.
///
/// Restores the level shift (+128) and clamps each sample to 0..=255.
pub fn inverse_dct(coeffs: &[i16; 64]) -> [i16; 64] {
    let basis = basis();
    let mut cols = [[0.0f32; 8]; 8];

    for u in 0..8 {
        for y in 0..8 {
            let mut sum = 0.0f32;
            for v in 0..8 {
                sum += f32::from(coeffs[v * 8 + u]) * basis[v][y];
            }
            cols[y][u] = sum;
        }
    }

    let mut samples = [0i16; 64];
    for y in 0..8 {
        for x in 0..8 {
            let mut sum = 0.0f32;
            for u in 0..8 {
                sum += cols[y][u] * basis[u][x];
            }
            samples[y * 8 + x] = (sum + 128.0).round().clamp(0.0, 255.0) as i16;
        }
    }

    samples
}
