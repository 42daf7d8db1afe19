// This is free and unencumbered software released into the public domain.

use crate::shared::CameraError;
use bytes::Bytes;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Bgra8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 => 4,
        }
    }
}

/// Counters for frame copies moving through the delivery pipeline.
#[derive(Debug, Default)]
pub struct FrameStats {
    allocated: AtomicU64,
    released: AtomicU64,
    uploaded: AtomicU64,
    rejected: AtomicU64,
    dropped_stale: AtomicU64,
    dropped_backpressure: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStatsSnapshot {
    pub allocated: u64,
    pub released: u64,
    pub uploaded: u64,
    pub rejected: u64,
    pub dropped_stale: u64,
    pub dropped_backpressure: u64,
}

impl FrameStatsSnapshot {
    pub fn in_flight(&self) -> u64 {
        self.allocated.saturating_sub(self.released)
    }
}

impl FrameStats {
    pub fn snapshot(&self) -> FrameStatsSnapshot {
        FrameStatsSnapshot {
            allocated: self.allocated.load(Ordering::Acquire),
            released: self.released.load(Ordering::Acquire),
            uploaded: self.uploaded.load(Ordering::Acquire),
            rejected: self.rejected.load(Ordering::Acquire),
            dropped_stale: self.dropped_stale.load(Ordering::Acquire),
            dropped_backpressure: self.dropped_backpressure.load(Ordering::Acquire),
        }
    }

    pub fn in_flight(&self) -> u64 {
        let released = self.released.load(Ordering::Acquire);
        self.allocated.load(Ordering::Acquire).saturating_sub(released)
    }

    pub(crate) fn record_uploaded(&self) {
        self.uploaded.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_stale(&self) {
        self.dropped_stale.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_backpressure(&self) {
        self.dropped_backpressure.fetch_add(1, Ordering::AcqRel);
    }
}

/// An owned BGRA8 frame copy, `width * height * 4` bytes, tightly packed.
///
/// The copy is released exactly once, when the value is dropped, whichever
/// pipeline stage holds it at that point.
#[derive(Debug)]
pub struct FrameBuffer {
    data: Bytes,
    width: u32,
    height: u32,
    stats: Option<Arc<FrameStats>>,
}

impl FrameBuffer {
    /// Expected byte length of a BGRA8 frame, or `None` on overflow.
    pub fn expected_len(width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(PixelFormat::Bgra8.bytes_per_pixel())
    }

    /// Copies a platform buffer that is only valid for the duration of the
    /// current callback.
    ///
    /// Longer input is truncated to the expected size; shorter input is
    /// rejected.
    pub fn copy_from(
        raw: &[u8],
        width: u32,
        height: u32,
        stats: Option<Arc<FrameStats>>,
    ) -> Result<Self, CameraError> {
        if width == 0 || height == 0 {
            return Err(CameraError::invalid_frame(format!(
                "zero-sized frame {width}x{height}"
            )));
        }
        if raw.is_empty() {
            return Err(CameraError::invalid_frame("empty buffer"));
        }
        let expected = Self::expected_len(width, height).ok_or_else(|| {
            CameraError::invalid_frame(format!("frame size {width}x{height} overflows"))
        })?;
        if raw.len() < expected {
            return Err(CameraError::invalid_frame(format!(
                "buffer holds {} bytes, {width}x{height} BGRA8 needs {expected}",
                raw.len()
            )));
        }

        if let Some(stats) = &stats {
            stats.allocated.fetch_add(1, Ordering::AcqRel);
        }
        Ok(Self {
            data: Bytes::copy_from_slice(&raw[..expected]),
            width,
            height,
            stats,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.width as usize * PixelFormat::Bgra8.bytes_per_pixel()
    }

    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Bgra8
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        if let Some(stats) = self.stats.take() {
            stats.released.fetch_add(1, Ordering::AcqRel);
        }
    }
}
