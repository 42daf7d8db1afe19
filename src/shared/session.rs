// This is free and unencumbered software released into the public domain.

use crate::shared::{
    CameraError, CameraIntrinsics, CameraPlatform, CaptureSink, CharacteristicsDump,
    DistortionModel, FrameDeliveryPipeline, FrameRoute, FrameStats, FrameStatsSnapshot,
    Resolution, SensorGeometry, SessionConfig, Texture, TextureHandle, TextureSlot,
    map_to_canonical_with,
};
use derive_more::Display;
use scopeguard::ScopeGuard;
use std::{
    sync::{Arc, Mutex, RwLock, Weak},
    time::Duration,
};
use tracing::{debug, error, info, warn};

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq)]
pub enum PreviewState {
    #[default]
    #[display("inactive")]
    Inactive,
    #[display("starting")]
    Starting,
    #[display("active")]
    Active,
}

/// State written by platform callbacks and read by accessors.
///
/// Each group sits behind its own lock, so a reader always sees one
/// complete delivery (last write wins).
pub(crate) struct SessionShared {
    platform: Weak<dyn CameraPlatform>,
    distortion_model: DistortionModel,
    state: RwLock<PreviewState>,
    texture: Arc<TextureSlot>,
    route: RwLock<Option<FrameRoute>>,
    intrinsics: RwLock<CameraIntrinsics>,
    distortion: RwLock<Vec<f32>>,
    geometry: RwLock<SensorGeometry>,
    original_resolution: RwLock<Resolution>,
    characteristics: RwLock<Option<CharacteristicsDump>>,
    stats: Arc<FrameStats>,
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(|p| p.into_inner()).clone()
}

fn write<T>(lock: &RwLock<T>, value: T) {
    *lock.write().unwrap_or_else(|p| p.into_inner()) = value;
}

impl SessionShared {
    fn state(&self) -> PreviewState {
        read(&self.state)
    }

    fn set_state(&self, state: PreviewState) {
        write(&self.state, state);
    }

    fn set_route(&self, route: Option<FrameRoute>) {
        write(&self.route, route);
    }

    pub(crate) fn on_frame(&self, data: &[u8], width: u32, height: u32) {
        let route = self.route.read().unwrap_or_else(|p| p.into_inner());
        match route.as_ref() {
            Some(route) => route.on_frame_received(data, width, height),
            None => debug!(width, height, "frame ignored: preview not active"),
        }
    }

    pub(crate) fn set_intrinsics(&self, k: CameraIntrinsics) {
        info!(
            fx = k.fx,
            fy = k.fy,
            cx = k.cx,
            cy = k.cy,
            skew = k.skew,
            calib = %k.calib,
            "intrinsics received"
        );
        write(&self.intrinsics, k);
    }

    pub(crate) fn set_distortion(&self, coeffs: &[f32]) {
        if coeffs.is_empty() {
            warn!("empty distortion array received");
        } else {
            info!(len = coeffs.len(), ?coeffs, "distortion received");
        }
        write(&self.distortion, coeffs.to_vec());
    }

    pub(crate) fn set_pixel_array_size(&self, size: Resolution) {
        info!(%size, "pixel array size received");
        self.geometry.write().unwrap_or_else(|p| p.into_inner()).pixel_array = Some(size);
    }

    pub(crate) fn set_active_array_size(&self, size: Resolution) {
        info!(%size, "active array size received");
        self.geometry.write().unwrap_or_else(|p| p.into_inner()).active_array = Some(size);
    }

    pub(crate) fn set_original_resolution(&self, size: Resolution) {
        info!(%size, "original resolution received");
        write(&self.original_resolution, size);
    }

    pub(crate) fn on_characteristics_dump(&self, json: String) {
        info!(len = json.len(), "characteristics dump received");
        {
            let mut slot = self.characteristics.write().unwrap_or_else(|p| p.into_inner());
            let file_path = slot.take().map(|d| d.file_path).unwrap_or_default();
            *slot = Some(CharacteristicsDump { json, file_path });
        }

        let Some(platform) = self.platform.upgrade() else {
            return;
        };
        match platform.last_characteristics() {
            Some(dump) => {
                debug!(path = %dump.file_path.display(), "characteristics dump saved");
                write(&self.characteristics, Some(dump));
            },
            None => debug!("platform has no saved characteristics dump"),
        }
    }
}

/// One camera preview: texture, frame queues and the latest calibration.
///
/// Accessors may be called from any thread. Dropping the session stops
/// the preview.
pub struct CameraSession {
    platform: Arc<dyn CameraPlatform>,
    config: SessionConfig,
    shared: Arc<SessionShared>,
    preview: Mutex<Option<FrameDeliveryPipeline>>,
}

impl core::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CameraSession")
            .field("platform", &self.platform.name())
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl CameraSession {
    pub fn new(
        platform: Arc<dyn CameraPlatform>,
        config: SessionConfig,
    ) -> Result<Self, CameraError> {
        config.validate()?;
        let shared = Arc::new(SessionShared {
            platform: Arc::downgrade(&platform),
            distortion_model: config.distortion_model,
            state: RwLock::new(PreviewState::Inactive),
            texture: Arc::new(TextureSlot::default()),
            route: RwLock::new(None),
            intrinsics: RwLock::new(CameraIntrinsics::default()),
            distortion: RwLock::new(Vec::new()),
            geometry: RwLock::new(SensorGeometry::default()),
            original_resolution: RwLock::new(Resolution::default()),
            characteristics: RwLock::new(None),
            stats: Arc::new(FrameStats::default()),
        });
        Ok(Self {
            platform,
            config,
            shared,
            preview: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn platform(&self) -> &Arc<dyn CameraPlatform> {
        &self.platform
    }

    /// Inbound callback surface for this session.
    pub fn sink(&self) -> CaptureSink {
        CaptureSink {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> PreviewState {
        self.shared.state()
    }

    pub fn is_active(&self) -> bool {
        self.state() == PreviewState::Active
    }

    /// Creates the texture and frame queues and starts platform capture.
    ///
    /// Idempotent while active. Without camera permission a request is
    /// issued and [`CameraError::PermissionPending`] returned; call again
    /// once it is granted.
    pub fn start_preview(&self) -> Result<(), CameraError> {
        let mut preview = self.preview.lock().unwrap_or_else(|p| p.into_inner());
        if preview.is_some() {
            debug!("camera preview already active");
            return Ok(());
        }

        if !self.platform.has_permission() {
            warn!(platform = %self.platform.name(), "camera permission not granted, requesting");
            self.platform.request_permission();
            return Err(CameraError::PermissionPending);
        }

        self.shared.set_state(PreviewState::Starting);
        let pipeline = match FrameDeliveryPipeline::spawn(
            Arc::clone(&self.shared.texture),
            Arc::clone(&self.shared.stats),
            self.config.max_in_flight,
        ) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                error!(%err, "failed to start frame queues");
                self.shared.set_state(PreviewState::Inactive);
                return Err(err);
            },
        };

        let texture = Arc::new(Texture::new(
            self.config.texture_width,
            self.config.texture_height,
            self.config.clear_value,
        ));
        debug!(
            width = texture.width(),
            height = texture.height(),
            "camera texture created"
        );
        self.shared.texture.set(texture);
        self.shared.set_route(Some(pipeline.route()));

        let shared = Arc::clone(&self.shared);
        let pipeline = scopeguard::guard(pipeline, move |mut pipeline| {
            shared.set_route(None);
            shared.texture.clear();
            pipeline.shutdown();
            shared.set_state(PreviewState::Inactive);
        });

        if let Err(err) = self.platform.start_capture(self.sink()) {
            error!(%err, platform = %self.platform.name(), "failed to start camera");
            return Err(err);
        }

        *preview = Some(ScopeGuard::into_inner(pipeline));
        self.shared.set_state(PreviewState::Active);
        info!(platform = %self.platform.name(), "camera preview started");
        Ok(())
    }

    /// Stops capture and releases the texture. A no-op when not active.
    pub fn stop_preview(&self) {
        let mut preview = self.preview.lock().unwrap_or_else(|p| p.into_inner());
        let Some(mut pipeline) = preview.take() else {
            debug!("camera preview not active, nothing to stop");
            return;
        };

        self.platform.stop_capture();
        self.shared.set_route(None);
        self.shared.texture.clear();
        pipeline.shutdown();
        self.shared.set_state(PreviewState::Inactive);

        let stats = self.stats();
        info!(
            uploaded = stats.uploaded,
            dropped = stats.dropped_stale + stats.dropped_backpressure,
            rejected = stats.rejected,
            "camera preview stopped"
        );
        if self.config.diagnostics {
            info!(?stats, "frame statistics");
        }
    }

    /// The preview texture, `None` unless active.
    pub fn texture(&self) -> Option<TextureHandle> {
        self.shared.texture.get()
    }

    pub fn intrinsics(&self) -> CameraIntrinsics {
        read(&self.shared.intrinsics)
    }

    pub fn fx(&self) -> f32 {
        self.intrinsics().fx
    }

    pub fn fy(&self) -> f32 {
        self.intrinsics().fy
    }

    pub fn principal_point(&self) -> (f32, f32) {
        self.intrinsics().principal_point()
    }

    pub fn skew(&self) -> f32 {
        self.intrinsics().skew
    }

    pub fn calibration_resolution(&self) -> Resolution {
        self.intrinsics().calib
    }

    /// Coefficients exactly as the platform reported them.
    pub fn distortion_raw(&self) -> Vec<f32> {
        read(&self.shared.distortion)
    }

    /// `[K1, K2, P1, P2, K3, K4, K5, K6]`, recomputed on every call.
    pub fn distortion_canonical(&self) -> [f32; 8] {
        let raw = self.shared.distortion.read().unwrap_or_else(|p| p.into_inner());
        map_to_canonical_with(&raw, self.shared.distortion_model)
    }

    pub fn original_resolution(&self) -> Resolution {
        read(&self.shared.original_resolution)
    }

    pub fn pixel_array_size(&self) -> Option<Resolution> {
        read(&self.shared.geometry).pixel_array
    }

    pub fn active_array_size(&self) -> Option<Resolution> {
        read(&self.shared.geometry).active_array
    }

    pub fn sensor_geometry(&self) -> SensorGeometry {
        read(&self.shared.geometry)
    }

    /// The characteristics JSON and the file it was saved to. Empty strings
    /// when the platform cannot provide a dump.
    pub fn characteristics(&self, force_redump: bool) -> CharacteristicsDump {
        if !force_redump {
            if let Some(dump) = read(&self.shared.characteristics).filter(|d| !d.is_empty()) {
                return dump;
            }
            if let Some(dump) = self.platform.last_characteristics() {
                write(&self.shared.characteristics, Some(dump.clone()));
                return dump;
            }
        }

        match self.platform.dump_characteristics() {
            Ok(dump) => {
                write(&self.shared.characteristics, Some(dump.clone()));
                dump
            },
            Err(err) => {
                warn!(%err, "characteristics dump failed");
                read(&self.shared.characteristics).unwrap_or_default()
            },
        }
    }

    /// Fire-and-forget; the result arrives through the sink.
    pub fn request_characteristics_dump(&self) {
        self.platform.request_characteristics_dump();
    }

    pub fn stats(&self) -> FrameStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Waits until every frame accepted so far has been uploaded or dropped.
    /// Returns `true` immediately when not active.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let preview = self.preview.lock().unwrap_or_else(|p| p.into_inner());
        match preview.as_ref() {
            Some(pipeline) => pipeline.wait_idle(timeout),
            None => true,
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stop_preview();
    }
}
