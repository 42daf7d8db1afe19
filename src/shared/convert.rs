// This is free and unencumbered software released into the public domain.

//! YUV 4:2:0 to BGRA8 conversion for platforms that deliver planar frames.

/// Luma samples inspected before deciding a frame is blank.
const BLANK_SAMPLE_LEN: usize = 100;

/// One plane of a planar image with its strides in bytes.
#[derive(Clone, Copy, Debug)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl<'a> Plane<'a> {
    pub fn new(data: &'a [u8], row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    /// Sample at `(row, col)`; samples past the end read as mid-gray.
    #[inline]
    fn sample(&self, row: usize, col: usize) -> i32 {
        let i = row * self.row_stride + col * self.pixel_stride;
        self.data.get(i).copied().map_or(128, i32::from)
    }
}

/// Y, U and V planes of a 4:2:0 image; chroma is subsampled 2x2.
#[derive(Clone, Copy, Debug)]
pub struct Yuv420Planes<'a> {
    pub y: Plane<'a>,
    pub u: Plane<'a>,
    pub v: Plane<'a>,
}

/// Full-range BT.601 conversion into tightly packed BGRA8.
pub fn yuv420_to_bgra(planes: &Yuv420Planes<'_>, width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut out = vec![0u8; w * h * 4];
    for row in 0..h {
        for col in 0..w {
            let y = planes.y.sample(row, col) as f32;
            let u = (planes.u.sample(row / 2, col / 2) - 128) as f32;
            let v = (planes.v.sample(row / 2, col / 2) - 128) as f32;

            let r = (y + 1.402 * v) as i32;
            let g = (y - 0.344 * u - 0.714 * v) as i32;
            let b = (y + 1.772 * u) as i32;

            let i = (row * w + col) * 4;
            out[i] = b.clamp(0, 255) as u8;
            out[i + 1] = g.clamp(0, 255) as u8;
            out[i + 2] = r.clamp(0, 255) as u8;
            out[i + 3] = 255;
        }
    }
    out
}

/// Grayscale fallback from a tightly packed luma plane. A blank plane
/// yields [`quadrant_test_pattern`] so a dead sensor is visible.
pub fn luma_to_bgra(luma: &[u8], width: u32, height: u32) -> Vec<u8> {
    let head = &luma[..luma.len().min(BLANK_SAMPLE_LEN)];
    if head.iter().all(|&y| y == 0) {
        return quadrant_test_pattern(width, height);
    }
    let n = width as usize * height as usize;
    let mut out = vec![0u8; n * 4];
    for (i, px) in out.chunks_exact_mut(4).enumerate() {
        let y = luma.get(i).copied().unwrap_or(0);
        px.copy_from_slice(&[y, y, y, 255]);
    }
    out
}

/// Red, green, blue and yellow quadrants (clockwise from top-left: red,
/// green, yellow, blue).
pub fn quadrant_test_pattern(width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut out = vec![0u8; w * h * 4];
    for y in 0..h {
        for x in 0..w {
            let (r, g, b) = match (x < w / 2, y < h / 2) {
                (true, true) => (255, 0, 0),
                (false, true) => (0, 255, 0),
                (true, false) => (0, 0, 255),
                (false, false) => (255, 255, 0),
            };
            let i = (y * w + x) * 4;
            out[i..i + 4].copy_from_slice(&[b, g, r, 255]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(y: u8, u: u8, v: u8, w: usize, h: usize) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        (vec![y; w * h], vec![u; (w / 2) * (h / 2)], vec![v; (w / 2) * (h / 2)])
    }

    #[test]
    fn neutral_chroma_is_gray() {
        let (y, u, v) = uniform(100, 128, 128, 4, 4);
        let planes = Yuv420Planes {
            y: Plane::new(&y, 4, 1),
            u: Plane::new(&u, 2, 1),
            v: Plane::new(&v, 2, 1),
        };
        let bgra = yuv420_to_bgra(&planes, 4, 4);
        assert_eq!(bgra.len(), 64);
        assert!(bgra.chunks_exact(4).all(|px| px == [100, 100, 100, 255]));
    }

    #[test]
    fn strong_red_clamps() {
        let (y, u, v) = uniform(200, 128, 255, 2, 2);
        let planes = Yuv420Planes {
            y: Plane::new(&y, 2, 1),
            u: Plane::new(&u, 1, 1),
            v: Plane::new(&v, 1, 1),
        };
        let bgra = yuv420_to_bgra(&planes, 2, 2);
        // r = 200 + 1.402 * 127 > 255, g = 200 - 0.714 * 127 = 109.3
        assert_eq!(&bgra[..4], &[200, 109, 255, 255]);
    }

    #[test]
    fn interleaved_chroma_uses_pixel_stride() {
        // NV21-style: V and U share one buffer with pixel stride 2.
        let y = vec![128u8; 4];
        let vu = vec![128u8, 128u8];
        let planes = Yuv420Planes {
            y: Plane::new(&y, 2, 1),
            u: Plane::new(&vu[1..], 2, 2),
            v: Plane::new(&vu, 2, 2),
        };
        let bgra = yuv420_to_bgra(&planes, 2, 2);
        assert!(bgra.chunks_exact(4).all(|px| px == [128, 128, 128, 255]));
    }

    #[test]
    fn short_planes_read_mid_gray() {
        let planes = Yuv420Planes {
            y: Plane::new(&[], 2, 1),
            u: Plane::new(&[], 1, 1),
            v: Plane::new(&[], 1, 1),
        };
        let bgra = yuv420_to_bgra(&planes, 2, 2);
        assert!(bgra.chunks_exact(4).all(|px| px == [128, 128, 128, 255]));
    }

    #[test]
    fn luma_copies_into_all_channels() {
        let bgra = luma_to_bgra(&[10, 20, 30, 40], 2, 2);
        assert_eq!(&bgra[4..8], &[20, 20, 20, 255]);
    }

    #[test]
    fn blank_luma_yields_test_pattern() {
        let bgra = luma_to_bgra(&[0; 16], 4, 4);
        assert_eq!(bgra, quadrant_test_pattern(4, 4));
        // top-left red, bottom-right yellow, BGRA order
        assert_eq!(&bgra[..4], &[0, 0, 255, 255]);
        assert_eq!(&bgra[60..64], &[0, 255, 255, 255]);
    }
}
