// This is free and unencumbered software released into the public domain.

//! A software camera that behaves like a Camera2 device: it lists cameras,
//! gates capture behind a permission, publishes calibration metadata and
//! streams YUV gradient frames converted to BGRA.

use crate::shared::{
    CameraError, CameraInfo, CameraIntrinsics, CameraPlatform, CaptureSink, CharacteristicsDocument,
    CharacteristicsDump, LensFacing, Plane, Resolution, SensorGeometry, Yuv420Planes, rect_value,
    range_value, save_dump, select_camera, yuv420_to_bgra,
};
use alloc::borrow::Cow;
use serde_json::json;
use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub cameras: Vec<CameraInfo>,
    pub permission_granted: bool,
    /// Whether `request_permission` grants access immediately.
    pub grant_on_request: bool,
    pub frame_width: u32,
    pub frame_height: u32,
    pub fps: f64,
    /// Stop producing after this many frames.
    pub frame_limit: Option<u64>,
    /// `[fx, fy, cx, cy, skew]` in sensor pixels. Empty falls back to the
    /// focal length.
    pub calibration: Vec<f32>,
    pub focal_length_mm: f32,
    pub physical_size_mm: (f32, f32),
    pub distortion: Vec<f32>,
    pub pixel_array: Resolution,
    pub active_array: Resolution,
    pub sdk: u32,
    /// Where characteristics dumps are saved; `None` keeps them in memory.
    pub dump_dir: Option<PathBuf>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            cameras: vec![
                CameraInfo::new("0", LensFacing::Back),
                CameraInfo::new("1", LensFacing::Front),
            ],
            permission_granted: true,
            grant_on_request: true,
            frame_width: 1280,
            frame_height: 720,
            fps: 30.0,
            frame_limit: None,
            calibration: vec![3000.0, 3000.0, 2000.0, 1500.0, 0.0],
            focal_length_mm: 4.38,
            physical_size_mm: (5.6, 4.2),
            distortion: vec![0.12, -0.31, 0.18, 0.0008, -0.0004],
            pixel_array: Resolution::new(4000, 3000),
            active_array: Resolution::new(4000, 3000),
            sdk: 34,
            dump_dir: None,
        }
    }
}

impl SyntheticConfig {
    pub fn with_cameras(mut self, cameras: Vec<CameraInfo>) -> Self {
        self.cameras = cameras;
        self
    }

    pub fn with_permission(mut self, granted: bool, grant_on_request: bool) -> Self {
        self.permission_granted = granted;
        self.grant_on_request = grant_on_request;
        self
    }

    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_width = width;
        self.frame_height = height;
        self
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    pub fn with_calibration(mut self, calibration: Vec<f32>) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_distortion(mut self, distortion: Vec<f32>) -> Self {
        self.distortion = distortion;
        self
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(0.1))
    }

    fn geometry(&self) -> SensorGeometry {
        SensorGeometry {
            pixel_array: Some(self.pixel_array).filter(|r| !r.is_empty()),
            active_array: Some(self.active_array).filter(|r| !r.is_empty()),
        }
    }

    /// Sensor-space intrinsics, from the calibration key or else the focal
    /// length.
    fn sensor_intrinsics(&self) -> Option<CameraIntrinsics> {
        let sensor = self.geometry().original_resolution().unwrap_or_default();
        CameraIntrinsics::from_calibration(&self.calibration, sensor).or_else(|| {
            CameraIntrinsics::from_focal_length(
                self.focal_length_mm,
                self.physical_size_mm,
                self.pixel_array,
            )
        })
    }
}

struct Capture {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
    sink: CaptureSink,
}

pub struct SyntheticPlatform {
    config: SyntheticConfig,
    permission: AtomicBool,
    permission_requests: AtomicU64,
    selected: Mutex<Option<CameraInfo>>,
    last_dump: Mutex<Option<CharacteristicsDump>>,
    capture: Mutex<Option<Capture>>,
}

impl core::fmt::Debug for SyntheticPlatform {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SyntheticPlatform")
            .field("config", &self.config)
            .field("permission", &self.permission.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SyntheticPlatform {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            permission: AtomicBool::new(config.permission_granted),
            config,
            permission_requests: AtomicU64::new(0),
            selected: Mutex::new(None),
            last_dump: Mutex::new(None),
            capture: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    pub fn cameras(&self) -> &[CameraInfo] {
        &self.config.cameras
    }

    pub fn permission_requests(&self) -> u64 {
        self.permission_requests.load(Ordering::Relaxed)
    }

    pub fn grant_permission(&self) {
        self.permission.store(true, Ordering::SeqCst);
    }

    pub fn is_capturing(&self) -> bool {
        self.capture
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .is_some()
    }

    /// The camera capture would open, selected once and then remembered.
    pub fn selected_camera(&self) -> Result<CameraInfo, CameraError> {
        let mut selected = self.selected.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(camera) = selected.as_ref() {
            return Ok(camera.clone());
        }
        let camera = select_camera(&self.config.cameras)
            .cloned()
            .ok_or(CameraError::NoCamera)?;
        info!(id = %camera.id, facing = %camera.facing, "camera selected");
        *selected = Some(camera.clone());
        Ok(camera)
    }

    pub fn describe(&self, camera: &CameraInfo) -> CharacteristicsDocument {
        let c = &self.config;
        let facing = match camera.facing {
            LensFacing::Front => 0,
            LensFacing::Back => 1,
            LensFacing::External => 2,
            LensFacing::Unknown => -1,
        };
        let fps = c.fps.round() as i64;

        let mut doc = CharacteristicsDocument::new(camera.id.clone(), c.sdk);
        doc.insert("android.lens.facing", facing)
            .insert_size("android.sensor.info.pixelArraySize", c.pixel_array)
            .insert(
                "android.sensor.info.activeArraySize",
                rect_value(0, 0, c.active_array.width as i32, c.active_array.height as i32),
            )
            .insert(
                "android.sensor.info.physicalSize",
                json!({ "width": c.physical_size_mm.0, "height": c.physical_size_mm.1 }),
            )
            .insert("android.lens.info.availableFocalLengths", json!([c.focal_length_mm]))
            .insert("android.lens.intrinsicCalibration", json!(c.calibration))
            .insert("android.lens.distortion", json!(c.distortion))
            .insert(
                "android.control.aeAvailableTargetFpsRanges",
                json!([range_value(fps.min(15), fps), range_value(fps, fps)]),
            );
        doc
    }

    fn dump_for(&self, camera: &CameraInfo) -> Result<CharacteristicsDump, CameraError> {
        let json = self.describe(camera).to_json();
        let file_path = match &self.config.dump_dir {
            Some(dir) => save_dump(dir, &camera.id, &json)?,
            None => PathBuf::new(),
        };
        let dump = CharacteristicsDump { json, file_path };
        *self.last_dump.lock().unwrap_or_else(|p| p.into_inner()) = Some(dump.clone());
        debug!(id = %camera.id, path = %dump.file_path.display(), "characteristics dumped");
        Ok(dump)
    }

    fn report_metadata(&self, sink: &CaptureSink) {
        let c = &self.config;
        let geometry = c.geometry();
        if let Some(size) = geometry.pixel_array {
            sink.on_pixel_array_size(size);
        }
        if let Some(size) = geometry.active_array {
            sink.on_active_array_size(size);
        }
        let original = geometry.original_resolution().unwrap_or_default();
        sink.on_original_resolution(original);
        sink.on_distortion(&c.distortion);

        let output = Resolution::new(c.frame_width, c.frame_height);
        match c.sensor_intrinsics() {
            Some(k) => sink.on_intrinsics(k.for_stream(original, output)),
            None => warn!("no calibration or focal length published"),
        }
    }
}

impl dogma::Named for SyntheticPlatform {
    fn name(&self) -> Cow<'_, str> {
        "synthetic".into()
    }
}

impl CameraPlatform for SyntheticPlatform {
    fn has_permission(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    fn request_permission(&self) {
        self.permission_requests.fetch_add(1, Ordering::Relaxed);
        if self.config.grant_on_request {
            debug!("camera permission granted");
            self.permission.store(true, Ordering::SeqCst);
        }
    }

    fn start_capture(&self, sink: CaptureSink) -> Result<(), CameraError> {
        let mut capture = self.capture.lock().unwrap_or_else(|p| p.into_inner());
        if capture.is_some() {
            return Ok(());
        }
        if !self.has_permission() {
            return Err(CameraError::PermissionPending);
        }

        let camera = self.selected_camera()?;
        let dump = self.dump_for(&camera)?;
        sink.on_characteristics_dump(dump.json);
        self.report_metadata(&sink);

        let (width, height) = (self.config.frame_width, self.config.frame_height);
        let interval = self.config.frame_interval();
        let limit = self.config.frame_limit;
        let stop = Arc::new(AtomicBool::new(false));

        let join = {
            let stop = Arc::clone(&stop);
            let sink = sink.clone();
            thread::Builder::new()
                .name("camera2-capture".into())
                .spawn(move || {
                    let mut n: u64 = 0;
                    while !stop.load(Ordering::Relaxed) && limit.is_none_or(|l| n < l) {
                        let bgra = gradient_frame(width, height, n);
                        sink.on_frame(&bgra, width, height);
                        n += 1;
                        thread::sleep(interval);
                    }
                    debug!(frames = n, "capture thread finished");
                })
                .map_err(|e| CameraError::driver("spawning capture thread", e))?
        };

        info!(id = %camera.id, width, height, "synthetic capture started");
        *capture = Some(Capture {
            stop,
            join: Some(join),
            sink,
        });
        Ok(())
    }

    fn stop_capture(&self) {
        let Some(mut capture) = self.capture.lock().unwrap_or_else(|p| p.into_inner()).take()
        else {
            return;
        };
        capture.stop.store(true, Ordering::Relaxed);
        if let Some(join) = capture.join.take() {
            let _ = join.join();
        }
        info!("synthetic capture stopped");
    }

    fn dump_characteristics(&self) -> Result<CharacteristicsDump, CameraError> {
        let camera = self.selected_camera()?;
        self.dump_for(&camera)
    }

    fn last_characteristics(&self) -> Option<CharacteristicsDump> {
        self.last_dump.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn request_characteristics_dump(&self) {
        let sink = self
            .capture
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .map(|c| c.sink.clone());
        let Some(sink) = sink else {
            debug!("characteristics dump requested while not capturing");
            return;
        };
        match self.dump_characteristics() {
            Ok(dump) => sink.on_characteristics_dump(dump.json),
            Err(err) => warn!(%err, "characteristics dump failed"),
        }
    }
}

impl Drop for SyntheticPlatform {
    fn drop(&mut self) {
        self.stop_capture();
    }
}

/// A moving diagonal luma ramp over slowly rotating chroma.
fn gradient_frame(width: u32, height: u32, n: u64) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    let shift = (n % 256) as usize;

    let y: Vec<u8> = (0..w * h)
        .map(|i| ((i % w + i / w + shift) % 256) as u8)
        .collect();
    let u = vec![(128 + (shift / 4)) as u8; cw * ch];
    let v = vec![(192 - (shift / 4)) as u8; cw * ch];

    let planes = Yuv420Planes {
        y: Plane::new(&y, w, 1),
        u: Plane::new(&u, cw, 1),
        v: Plane::new(&v, cw, 1),
    };
    yuv420_to_bgra(&planes, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{CameraSession, SessionConfig};

    const WAIT: Duration = Duration::from_secs(5);

    fn small() -> SyntheticConfig {
        SyntheticConfig::default()
            .with_frame_size(64, 36)
            .with_fps(200.0)
    }

    #[test]
    fn gradient_frame_is_bgra() {
        let frame = gradient_frame(8, 6, 3);
        assert_eq!(frame.len(), 8 * 6 * 4);
        assert!(frame.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn front_camera_selected_by_default() {
        let platform = SyntheticPlatform::new(SyntheticConfig::default());
        assert_eq!(platform.selected_camera().unwrap().id, "1");
    }

    #[test]
    fn no_cameras() {
        let platform = SyntheticPlatform::new(SyntheticConfig::default().with_cameras(vec![]));
        assert!(matches!(
            platform.dump_characteristics(),
            Err(CameraError::NoCamera)
        ));
    }

    #[test]
    fn dump_written_to_dump_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let platform = SyntheticPlatform::new(SyntheticConfig::default().with_dump_dir(tmp.path()));
        let dump = platform.dump_characteristics().unwrap();
        assert_eq!(
            dump.file_path,
            tmp.path().join("Camera2").join("camera_characteristics_1.json")
        );
        let value = dump.parse().unwrap();
        assert_eq!(value["cameraId"], "1");
        assert_eq!(value["values"]["android.lens.facing"], 0);
        assert_eq!(platform.last_characteristics(), Some(dump));
    }

    #[test]
    fn session_receives_frames_and_metadata() {
        let platform = Arc::new(SyntheticPlatform::new(small()));
        let session =
            CameraSession::new(platform.clone(), SessionConfig::new(64, 36)).unwrap();
        session.start_preview().unwrap();
        assert!(platform.is_capturing());

        let deadline = std::time::Instant::now() + WAIT;
        while session.stats().uploaded < 2 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(session.stats().uploaded >= 2);

        // 4000x3000 cropped to 16:9 and scaled to 64 wide.
        assert_eq!(session.calibration_resolution(), Resolution::new(64, 36));
        assert!((session.fx() - 48.0).abs() < 1e-3);
        assert_eq!(session.original_resolution(), Resolution::new(4000, 3000));
        assert_eq!(session.distortion_raw().len(), 5);
        assert!(!session.characteristics(false).is_empty());

        session.stop_preview();
        assert!(!platform.is_capturing());
        assert_eq!(session.stats().in_flight(), 0);
    }

    #[test]
    fn frame_limit_stops_production() {
        let platform = Arc::new(SyntheticPlatform::new(small().with_frame_limit(3)));
        let session =
            CameraSession::new(platform.clone(), SessionConfig::new(64, 36)).unwrap();
        session.start_preview().unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(session.wait_idle(WAIT));
        let stats = session.stats();
        assert_eq!(stats.allocated, 3);
        assert_eq!(stats.uploaded, 3);
    }

    #[test]
    fn permission_granted_on_request() {
        let platform = Arc::new(SyntheticPlatform::new(small().with_permission(false, true)));
        let session = CameraSession::new(platform.clone(), SessionConfig::new(64, 36)).unwrap();
        assert!(matches!(
            session.start_preview(),
            Err(CameraError::PermissionPending)
        ));
        assert_eq!(platform.permission_requests(), 1);
        session.start_preview().unwrap();
        assert!(session.is_active());
    }

    #[test]
    fn focal_length_fallback() {
        let config = SyntheticConfig::default().with_calibration(vec![]);
        let k = config.sensor_intrinsics().unwrap();
        assert!((k.fx - 4.38 * 4000.0 / 5.6).abs() < 1e-2);
        assert_eq!(k.principal_point(), (2000.0, 1500.0));
    }
}
