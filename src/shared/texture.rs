// This is free and unencumbered software released into the public domain.

use crate::shared::{CameraError, PixelFormat};
use std::sync::{
    Arc, RwLock,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

pub type TextureHandle = Arc<Texture>;

/// A rectangle of texels, in texture coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TextureRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole `width` x `height` area anchored at the origin.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Intersection with a `width` x `height` texture, `None` when empty.
    pub fn clip(&self, width: u32, height: u32) -> Option<Self> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(Self::new(self.x, self.y, w, h))
    }
}

/// BGRA8 preview surface.
///
/// Stands in for the GPU-resident texture: uploads happen on the render
/// queue only, readers take snapshots.
#[derive(Debug)]
pub struct Texture {
    width: u32,
    height: u32,
    pixels: RwLock<Vec<u8>>,
    released: AtomicBool,
    updates: AtomicU64,
}

impl Texture {
    pub fn new(width: u32, height: u32, clear_value: u8) -> Self {
        let len = width as usize * height as usize * PixelFormat::Bgra8.bytes_per_pixel();
        Self {
            width,
            height,
            pixels: RwLock::new(vec![clear_value; len]),
            released: AtomicBool::new(false),
            updates: AtomicU64::new(0),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Bgra8
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Marks the resource dead. Later uploads are refused.
    ///
    /// Waits for an upload in progress to finish; once this returns no
    /// further texel is written.
    pub fn release(&self) {
        let _pixels = self.pixels.write().unwrap_or_else(|p| p.into_inner());
        self.released.store(true, Ordering::Release);
    }

    /// Number of uploads applied so far.
    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::Acquire)
    }

    /// Copies `region` rows out of `data`, laid out with `src_pitch` bytes
    /// per row. The region is clipped to the texture; source rows beyond the
    /// clipped width are skipped.
    pub fn update_region(
        &self,
        region: TextureRegion,
        src_pitch: usize,
        data: &[u8],
    ) -> Result<(), CameraError> {
        if self.is_released() {
            return Err(CameraError::NotActive);
        }
        let bpp = PixelFormat::Bgra8.bytes_per_pixel();
        let Some(clipped) = region.clip(self.width, self.height) else {
            return Err(CameraError::texture_region(format!(
                "{region:?} lies outside {}x{}",
                self.width, self.height
            )));
        };
        let row_bytes = clipped.width as usize * bpp;
        if src_pitch < row_bytes {
            return Err(CameraError::texture_region(format!(
                "source pitch {src_pitch} shorter than row of {row_bytes} bytes"
            )));
        }
        let needed = src_pitch * (clipped.height as usize - 1) + row_bytes;
        if data.len() < needed {
            return Err(CameraError::texture_region(format!(
                "source holds {} bytes, region needs {needed}",
                data.len()
            )));
        }

        let dst_pitch = self.width as usize * bpp;
        let mut pixels = self.pixels.write().unwrap_or_else(|p| p.into_inner());
        // Released while we waited for the lock.
        if self.is_released() {
            return Err(CameraError::NotActive);
        }
        for row in 0..clipped.height as usize {
            let src = &data[row * src_pitch..row * src_pitch + row_bytes];
            let dst_start = (clipped.y as usize + row) * dst_pitch + clipped.x as usize * bpp;
            pixels[dst_start..dst_start + row_bytes].copy_from_slice(src);
        }
        drop(pixels);

        self.updates.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Copy of the current BGRA8 contents, tightly packed.
    pub fn snapshot(&self) -> Vec<u8> {
        self.pixels
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// BGRA texel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let pixels = self.pixels.read().unwrap_or_else(|p| p.into_inner());
        Some([pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]])
    }

    /// Converts the contents to an RGBA image, e.g. for saving a snapshot.
    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        let mut rgba = self.snapshot();
        for px in rgba.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        image::RgbaImage::from_raw(self.width, self.height, rgba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_texture_is_cleared() {
        let texture = Texture::new(4, 2, 64);
        assert!(texture.snapshot().iter().all(|&b| b == 64));
        assert_eq!(texture.snapshot().len(), 4 * 2 * 4);
        assert_eq!(texture.update_count(), 0);
    }

    #[test]
    fn uploads_full_region() {
        let texture = Texture::new(2, 2, 0);
        let data: Vec<u8> = (0..16).collect();
        texture.update_region(TextureRegion::full(2, 2), 8, &data).unwrap();
        assert_eq!(texture.snapshot(), data);
        assert_eq!(texture.update_count(), 1);
    }

    #[test]
    fn uploads_sub_region_with_pitch() {
        let texture = Texture::new(3, 3, 0);
        // 1x2 region, source pitch padded to 8 bytes.
        let data = [1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8];
        texture.update_region(TextureRegion::new(1, 1, 1, 2), 8, &data).unwrap();
        assert_eq!(texture.pixel(1, 1), Some([1, 2, 3, 4]));
        assert_eq!(texture.pixel(1, 2), Some([5, 6, 7, 8]));
        assert_eq!(texture.pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn oversized_frames_are_clipped() {
        let texture = Texture::new(2, 1, 0);
        let data: Vec<u8> = (0..24).collect(); // 3x2 source
        texture.update_region(TextureRegion::full(3, 2), 12, &data).unwrap();
        assert_eq!(texture.snapshot(), (0..8).collect::<Vec<u8>>());
    }

    #[test]
    fn short_source_is_rejected() {
        let texture = Texture::new(2, 2, 9);
        let err = texture
            .update_region(TextureRegion::full(2, 2), 8, &[0; 15])
            .unwrap_err();
        assert!(matches!(err, CameraError::TextureRegion(_)));
        assert!(texture.snapshot().iter().all(|&b| b == 9));
    }

    #[test]
    fn region_outside_is_rejected() {
        let texture = Texture::new(2, 2, 0);
        assert!(texture.update_region(TextureRegion::new(2, 0, 1, 1), 4, &[0; 4]).is_err());
    }

    #[test]
    fn released_texture_refuses_uploads() {
        let texture = Texture::new(1, 1, 0);
        texture.release();
        assert!(texture.is_released());
        assert!(texture.update_region(TextureRegion::full(1, 1), 4, &[1; 4]).is_err());
        assert_eq!(texture.update_count(), 0);
    }

    #[test]
    fn release_excludes_a_waiting_upload() {
        use std::{thread, time::Duration};

        let texture = Arc::new(Texture::new(1, 1, 0));
        let reader = texture.pixels.read().unwrap();

        let uploader = {
            let texture = Arc::clone(&texture);
            thread::spawn(move || texture.update_region(TextureRegion::full(1, 1), 4, &[9; 4]))
        };
        thread::sleep(Duration::from_millis(100));
        let releaser = {
            let texture = Arc::clone(&texture);
            thread::spawn(move || {
                texture.release();
                (texture.update_count(), texture.pixel(0, 0))
            })
        };
        thread::sleep(Duration::from_millis(100));
        drop(reader);

        let result = uploader.join().unwrap();
        let (count_at_release, pixel_at_release) = releaser.join().unwrap();

        assert!(texture.is_released());
        assert_eq!(texture.update_count(), count_at_release);
        assert_eq!(texture.pixel(0, 0), pixel_at_release);
        match result {
            Ok(()) => assert_eq!((count_at_release, pixel_at_release), (1, Some([9; 4]))),
            Err(err) => {
                assert!(matches!(err, CameraError::NotActive));
                assert_eq!((count_at_release, pixel_at_release), (0, Some([0; 4])));
            },
        }
    }

    #[test]
    fn rgba_image_swaps_channels() {
        let texture = Texture::new(1, 1, 0);
        texture.update_region(TextureRegion::full(1, 1), 4, &[10, 20, 30, 255]).unwrap();
        let image = texture.to_rgba_image().unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [30, 20, 10, 255]);
    }
}
