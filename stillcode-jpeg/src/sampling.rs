//! Chroma subsampling (encode) and upsampling (decode).

/// Chroma subsampling layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChromaSubsampling {
    /// 4:4:4 - no subsampling.
    Yuv444,
    /// 4:2:2 - horizontal subsampling.
    Yuv422,
    /// 4:2:0 - horizontal and vertical subsampling.
    #[default]
    Yuv420,
    /// Grayscale (no chroma planes at all).
    Gray,
}

impl ChromaSubsampling {
    /// Luma sampling factors (h, v) relative to the 1x1 chroma planes.
    pub fn luma_factors(self) -> (usize, usize) {
        match self {
            ChromaSubsampling::Yuv444 | ChromaSubsampling::Gray => (1, 1),
            ChromaSubsampling::Yuv422 => (2, 1),
            ChromaSubsampling::Yuv420 => (2, 2),
        }
    }

    /// Dimensions of a chroma plane for a full-resolution image.
    pub fn chroma_dimensions(self, width: usize, height: usize) -> (usize, usize) {
        let (h, v) = self.luma_factors();
        (width.div_ceil(h), height.div_ceil(v))
    }
}

/// Upsampling filter selection for decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Upsampling {
    /// Nearest-neighbor replication (fast path).
    Nearest,
    /// Triangle-filter interpolation (quality path).
    #[default]
    Fancy,
}

/// Downsample one chroma plane per the subsampling layout (box filter).
///
/// Returns the plane and its dimensions. 4:4:4 and grayscale pass through.
/// Odd edges replicate the last sample into the average.
pub fn downsample_plane(
    plane: &[u8],
    width: usize,
    height: usize,
    mode: ChromaSubsampling,
) -> (Vec<u8>, usize, usize) {
    match mode {
        ChromaSubsampling::Yuv444 | ChromaSubsampling::Gray => {
            (plane.to_vec(), width, height)
        }
        ChromaSubsampling::Yuv422 => {
            let new_width = width.div_ceil(2);
            let mut out = vec![0u8; new_width * height];
            for y in 0..height {
                for x in 0..new_width {
                    let x0 = x * 2;
                    let x1 = (x * 2 + 1).min(width - 1);
                    let sum = u16::from(plane[y * width + x0]) + u16::from(plane[y * width + x1]);
                    out[y * new_width + x] = ((sum + 1) / 2) as u8;
                }
            }
            (out, new_width, height)
        }
        ChromaSubsampling::Yuv420 => {
            let new_width = width.div_ceil(2);
            let new_height = height.div_ceil(2);
            let mut out = vec![0u8; new_width * new_height];
            for y in 0..new_height {
                for x in 0..new_width {
                    let y0 = y * 2;
                    let y1 = (y * 2 + 1).min(height - 1);
                    let x0 = x * 2;
                    let x1 = (x * 2 + 1).min(width - 1);
                    let sum = u16::from(plane[y0 * width + x0])
                        + u16::from(plane[y0 * width + x1])
                        + u16::from(plane[y1 * width + x0])
                        + u16::from(plane[y1 * width + x1]);
                    out[y * new_width + x] = ((sum + 2) / 4) as u8;
                }
            }
            (out, new_width, new_height)
        }
    }
}

/// Cut the top-left `width` x `height` window out of a padded plane.
///
/// Decoded component planes are MCU-aligned; this recovers the component's
/// true sampled extent before upsampling.
pub fn crop_plane(plane: &[u8], stride: usize, width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; width * height];
    for y in 0..height {
        out[y * width..(y + 1) * width].copy_from_slice(&plane[y * stride..y * stride + width]);
    }
    out
}

/// Expand a chroma plane back to full resolution.
///
/// Per-axis factors must be 1 or 2, which covers every baseline sampling
/// layout. The filter runs separably: horizontal pass, then vertical.
pub fn upsample_plane(
    plane: &[u8],
    plane_width: usize,
    plane_height: usize,
    target_width: usize,
    target_height: usize,
    mode: Upsampling,
) -> Vec<u8> {
    let horizontal = expand_rows(plane, plane_width, plane_height, target_width, mode);
    expand_columns(&horizontal, target_width, plane_height, target_height, mode)
}

fn expand_rows(
    src: &[u8],
    src_width: usize,
    height: usize,
    target_width: usize,
    mode: Upsampling,
) -> Vec<u8> {
    if src_width >= target_width {
        // Factor 1: crop any MCU padding on the right.
        let mut out = vec![0u8; target_width * height];
        for y in 0..height {
            out[y * target_width..(y + 1) * target_width]
                .copy_from_slice(&src[y * src_width..y * src_width + target_width]);
        }
        return out;
    }

    let mut out = vec![0u8; target_width * height];
    for y in 0..height {
        let row = &src[y * src_width..(y + 1) * src_width];
        let out_row = &mut out[y * target_width..(y + 1) * target_width];
        for (x, cell) in out_row.iter_mut().enumerate() {
            let center = (x / 2).min(src_width - 1);
            match mode {
                Upsampling::Nearest => *cell = row[center],
                Upsampling::Fancy => {
                    // Triangle filter: 3/4 of the covering sample plus 1/4 of
                    // the nearer neighbor; edges collapse to replication.
                    let neighbor = if x % 2 == 0 {
                        center.saturating_sub(1)
                    } else {
                        (center + 1).min(src_width - 1)
                    };
                    let value = 3 * u16::from(row[center]) + u16::from(row[neighbor]) + 2;
                    *cell = (value / 4) as u8;
                }
            }
        }
    }
    out
}

fn expand_columns(
    src: &[u8],
    width: usize,
    src_height: usize,
    target_height: usize,
    mode: Upsampling,
) -> Vec<u8> {
    if src_height >= target_height {
        return src[..width * target_height].to_vec();
    }

    let mut out = vec![0u8; width * target_height];
    for y in 0..target_height {
        let center = (y / 2).min(src_height - 1);
        let neighbor = match mode {
            Upsampling::Nearest => center,
            Upsampling::Fancy => {
                if y % 2 == 0 {
                    center.saturating_sub(1)
                } else {
                    (center + 1).min(src_height - 1)
                }
            }
        };
        for x in 0..width {
            let value = match mode {
                Upsampling::Nearest => src[center * width + x],
                Upsampling::Fancy => {
                    let v = 3 * u16::from(src[center * width + x])
                        + u16::from(src[neighbor * width + x])
                        + 2;
                    (v / 4) as u8
                }
            };
            out[y * width + x] = value;
        }
    }
    out
}
