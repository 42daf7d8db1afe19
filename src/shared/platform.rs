// This is free and unencumbered software released into the public domain.

use crate::shared::{
    CameraError, CameraIntrinsics, CharacteristicsDump, Resolution, session::SessionShared,
};
use std::sync::Arc;

/// The native camera stack, reduced to what a preview session needs.
///
/// Implementations call back into the [`CaptureSink`] they are given from
/// their own threads; none of the sink methods block on downstream work.
pub trait CameraPlatform: dogma::Named + Send + Sync {
    fn has_permission(&self) -> bool;

    /// Asks the user for camera access. Fire-and-forget; the answer shows up
    /// in later `has_permission` calls.
    fn request_permission(&self);

    /// Opens the camera and starts delivering frames and metadata to `sink`.
    fn start_capture(&self, sink: CaptureSink) -> Result<(), CameraError>;

    /// Stops delivery and releases the camera. Safe to call when stopped.
    fn stop_capture(&self);

    /// Re-dumps the characteristics of the current camera and returns them.
    fn dump_characteristics(&self) -> Result<CharacteristicsDump, CameraError>;

    /// The most recent dump, without re-dumping.
    fn last_characteristics(&self) -> Option<CharacteristicsDump>;

    /// Starts a dump whose result arrives through
    /// [`CaptureSink::on_characteristics_dump`].
    fn request_characteristics_dump(&self);
}

/// Inbound callbacks from a [`CameraPlatform`] into one session.
///
/// Metadata is accepted at any time; frames only reach the texture while
/// the session's preview is active.
#[derive(Clone)]
pub struct CaptureSink {
    pub(crate) shared: Arc<SessionShared>,
}

impl core::fmt::Debug for CaptureSink {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CaptureSink").finish_non_exhaustive()
    }
}

impl CaptureSink {
    /// One BGRA8 frame, `width * 4` bytes per row. `data` only needs to stay
    /// valid for the duration of the call.
    pub fn on_frame(&self, data: &[u8], width: u32, height: u32) {
        self.shared.on_frame(data, width, height)
    }

    pub fn on_intrinsics(&self, intrinsics: CameraIntrinsics) {
        self.shared.set_intrinsics(intrinsics)
    }

    pub fn on_distortion(&self, coeffs: &[f32]) {
        self.shared.set_distortion(coeffs)
    }

    pub fn on_pixel_array_size(&self, size: Resolution) {
        self.shared.set_pixel_array_size(size)
    }

    pub fn on_active_array_size(&self, size: Resolution) {
        self.shared.set_active_array_size(size)
    }

    pub fn on_original_resolution(&self, size: Resolution) {
        self.shared.set_original_resolution(size)
    }

    /// Stores the blob, then fetches the canonical `(json, path)` pair from
    /// the platform.
    pub fn on_characteristics_dump(&self, json: impl Into<String>) {
        self.shared.on_characteristics_dump(json.into())
    }
}
