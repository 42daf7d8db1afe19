// This is free and unencumbered software released into the public domain.

// C ABI for native hosts (engine plugins, JNI shims).
//
// The host owns the real camera. It drives the session through the
// `camera2_*` calls and reports frames and metadata back through the
// `camera2_on_*` calls, from whatever thread it likes.

use crate::shared::{
    CameraError, CameraIntrinsics, CameraPlatform, CameraSession, CaptureSink, CharacteristicsDump,
    DEFAULT_TEXTURE_HEIGHT, DEFAULT_TEXTURE_WIDTH, Resolution, SessionConfig,
};
use alloc::borrow::Cow;
use core::ffi::{c_char, c_void};
use core::ptr;
use std::{
    ffi::{CStr, CString},
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::{debug, warn};

/// Host-implemented callbacks. Every entry is optional.
///
/// `start_camera` returns `false` when the camera could not be opened.
/// `dump_characteristics` must report its result through
/// [`camera2_set_characteristics`] before returning.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Camera2HostCallbacks {
    pub user_data: *mut c_void,
    pub has_permission: Option<extern "C" fn(user_data: *mut c_void) -> bool>,
    pub request_permission: Option<extern "C" fn(user_data: *mut c_void)>,
    pub start_camera: Option<extern "C" fn(user_data: *mut c_void) -> bool>,
    pub stop_camera: Option<extern "C" fn(user_data: *mut c_void)>,
    pub dump_characteristics: Option<extern "C" fn(user_data: *mut c_void)>,
    pub request_characteristics_dump: Option<extern "C" fn(user_data: *mut c_void)>,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Camera2Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub skew: f32,
    pub calib_width: u32,
    pub calib_height: u32,
}

impl From<CameraIntrinsics> for Camera2Intrinsics {
    fn from(k: CameraIntrinsics) -> Self {
        Self {
            fx: k.fx,
            fy: k.fy,
            cx: k.cx,
            cy: k.cy,
            skew: k.skew,
            calib_width: k.calib.width,
            calib_height: k.calib.height,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Camera2FrameStats {
    pub allocated: u64,
    pub released: u64,
    pub uploaded: u64,
    pub rejected: u64,
    pub dropped_stale: u64,
    pub dropped_backpressure: u64,
}

/// The host's camera seen as a [`CameraPlatform`].
struct HostPlatform {
    callbacks: Camera2HostCallbacks,
    last_dump: Mutex<Option<CharacteristicsDump>>,
}

// SAFETY: the only raw pointer is `user_data`, which is never dereferenced
// here and is handed back to the host, which owns its thread-safety.
unsafe impl Send for HostPlatform {}
unsafe impl Sync for HostPlatform {}

impl HostPlatform {
    fn user_data(&self) -> *mut c_void {
        self.callbacks.user_data
    }
}

impl dogma::Named for HostPlatform {
    fn name(&self) -> Cow<'_, str> {
        "host".into()
    }
}

impl CameraPlatform for HostPlatform {
    fn has_permission(&self) -> bool {
        match self.callbacks.has_permission {
            Some(f) => f(self.user_data()),
            None => true,
        }
    }

    fn request_permission(&self) {
        if let Some(f) = self.callbacks.request_permission {
            f(self.user_data());
        }
    }

    fn start_capture(&self, _sink: CaptureSink) -> Result<(), CameraError> {
        let f = self
            .callbacks
            .start_camera
            .ok_or_else(|| CameraError::unsupported("host has no start_camera callback"))?;
        if f(self.user_data()) {
            Ok(())
        } else {
            Err(CameraError::other("host failed to start the camera"))
        }
    }

    fn stop_capture(&self) {
        if let Some(f) = self.callbacks.stop_camera {
            f(self.user_data());
        }
    }

    fn dump_characteristics(&self) -> Result<CharacteristicsDump, CameraError> {
        let f = self
            .callbacks
            .dump_characteristics
            .ok_or_else(|| CameraError::unsupported("host has no dump_characteristics callback"))?;
        f(self.user_data());
        self.last_characteristics()
            .ok_or_else(|| CameraError::other("host reported no characteristics"))
    }

    fn last_characteristics(&self) -> Option<CharacteristicsDump> {
        self.last_dump.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn request_characteristics_dump(&self) {
        match self.callbacks.request_characteristics_dump {
            Some(f) => f(self.user_data()),
            None => debug!("host has no request_characteristics_dump callback"),
        }
    }
}

/// Internal handle; hosts only see an opaque `void*`.
pub struct Camera2Handle {
    session: CameraSession,
    sink: CaptureSink,
    host: Arc<HostPlatform>,
}

fn handle_ref<'a>(handle: *mut c_void) -> Option<&'a Camera2Handle> {
    if handle.is_null() {
        warn!("null camera2 handle");
        return None;
    }
    Some(unsafe { &*(handle as *const Camera2Handle) })
}

/// `NULL` reads as the empty string; invalid UTF-8 is replaced.
fn c_str_lossy<'a>(s: *const c_char) -> Cow<'a, str> {
    if s.is_null() {
        return Cow::Borrowed("");
    }
    unsafe { CStr::from_ptr(s) }.to_string_lossy()
}

fn into_c_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(s) => s.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Create a session bound to the host's callbacks.
///
/// `width`/`height` of 0 select the default 1280x720 texture. Returns NULL
/// when `callbacks` is NULL or the configuration is invalid.
#[unsafe(no_mangle)]
pub extern "C" fn camera2_session_new(
    callbacks: *const Camera2HostCallbacks,
    width: u32,
    height: u32,
) -> *mut c_void {
    if callbacks.is_null() {
        return ptr::null_mut();
    }
    let callbacks = unsafe { *callbacks };

    let config = SessionConfig::new(
        if width == 0 { DEFAULT_TEXTURE_WIDTH } else { width },
        if height == 0 { DEFAULT_TEXTURE_HEIGHT } else { height },
    );
    let host = Arc::new(HostPlatform {
        callbacks,
        last_dump: Mutex::new(None),
    });

    let platform: Arc<dyn CameraPlatform> = host.clone();
    match CameraSession::new(platform, config) {
        Ok(session) => {
            let sink = session.sink();
            let handle = Box::new(Camera2Handle {
                session,
                sink,
                host,
            });
            Box::into_raw(handle) as *mut c_void
        },
        Err(err) => {
            warn!(%err, "failed to create camera2 session");
            ptr::null_mut()
        },
    }
}

/// Stops the preview and frees the handle. It must not be used afterwards.
#[unsafe(no_mangle)]
pub extern "C" fn camera2_session_free(handle: *mut c_void) {
    if handle.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(handle as *mut Camera2Handle));
    }
}

/// Returns `false` when not started, including when permission is still
/// pending; retry after the host's permission prompt completes.
#[unsafe(no_mangle)]
pub extern "C" fn camera2_start_preview(handle: *mut c_void) -> bool {
    let Some(h) = handle_ref(handle) else {
        return false;
    };
    h.session.start_preview().is_ok()
}

#[unsafe(no_mangle)]
pub extern "C" fn camera2_stop_preview(handle: *mut c_void) {
    if let Some(h) = handle_ref(handle) {
        h.session.stop_preview();
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn camera2_is_active(handle: *mut c_void) -> bool {
    handle_ref(handle).is_some_and(|h| h.session.is_active())
}

/// Waits until every frame reported so far has reached the texture or been
/// dropped.
#[unsafe(no_mangle)]
pub extern "C" fn camera2_wait_idle(handle: *mut c_void, timeout_ms: u32) -> bool {
    handle_ref(handle)
        .is_some_and(|h| h.session.wait_idle(Duration::from_millis(timeout_ms.into())))
}

#[unsafe(no_mangle)]
pub extern "C" fn camera2_get_intrinsics(handle: *mut c_void, out: *mut Camera2Intrinsics) -> bool {
    let Some(h) = handle_ref(handle) else {
        return false;
    };
    if out.is_null() {
        return false;
    }
    unsafe { *out = h.session.intrinsics().into() };
    true
}

/// Copies up to `capacity` raw coefficients and returns how many the
/// platform reported. Pass NULL/0 to query the count.
#[unsafe(no_mangle)]
pub extern "C" fn camera2_get_distortion_raw(
    handle: *mut c_void,
    out: *mut f32,
    capacity: usize,
) -> usize {
    let Some(h) = handle_ref(handle) else {
        return 0;
    };
    let raw = h.session.distortion_raw();
    if !out.is_null() {
        let n = raw.len().min(capacity);
        unsafe { ptr::copy_nonoverlapping(raw.as_ptr(), out, n) };
    }
    raw.len()
}

/// Writes `[K1, K2, P1, P2, K3, K4, K5, K6]` into `out`, which must hold 8.
#[unsafe(no_mangle)]
pub extern "C" fn camera2_get_distortion_canonical(handle: *mut c_void, out: *mut f32) -> bool {
    let Some(h) = handle_ref(handle) else {
        return false;
    };
    if out.is_null() {
        return false;
    }
    let canonical = h.session.distortion_canonical();
    unsafe { ptr::copy_nonoverlapping(canonical.as_ptr(), out, canonical.len()) };
    true
}

#[unsafe(no_mangle)]
pub extern "C" fn camera2_get_original_resolution(
    handle: *mut c_void,
    out_width: *mut u32,
    out_height: *mut u32,
) -> bool {
    let Some(h) = handle_ref(handle) else {
        return false;
    };
    if out_width.is_null() || out_height.is_null() {
        return false;
    }
    let size = h.session.original_resolution();
    unsafe {
        *out_width = size.width;
        *out_height = size.height;
    }
    true
}

/// Characteristics JSON; free with [`camera2_string_free`]. Empty string
/// when unavailable, NULL only for a NULL handle.
#[unsafe(no_mangle)]
pub extern "C" fn camera2_get_characteristics_json(
    handle: *mut c_void,
    force_redump: bool,
) -> *mut c_char {
    let Some(h) = handle_ref(handle) else {
        return ptr::null_mut();
    };
    into_c_string(&h.session.characteristics(force_redump).json)
}

/// Path of the last saved dump; free with [`camera2_string_free`].
#[unsafe(no_mangle)]
pub extern "C" fn camera2_get_characteristics_path(handle: *mut c_void) -> *mut c_char {
    let Some(h) = handle_ref(handle) else {
        return ptr::null_mut();
    };
    let dump = h.session.characteristics(false);
    into_c_string(&dump.file_path.to_string_lossy())
}

#[unsafe(no_mangle)]
pub extern "C" fn camera2_string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    unsafe { drop(CString::from_raw(s)) };
}

#[unsafe(no_mangle)]
pub extern "C" fn camera2_request_characteristics_dump(handle: *mut c_void) {
    if let Some(h) = handle_ref(handle) {
        h.session.request_characteristics_dump();
    }
}

/// Size of the preview texture; `false` while no texture exists.
#[unsafe(no_mangle)]
pub extern "C" fn camera2_texture_info(
    handle: *mut c_void,
    out_width: *mut u32,
    out_height: *mut u32,
) -> bool {
    let Some(texture) = handle_ref(handle).and_then(|h| h.session.texture()) else {
        return false;
    };
    if out_width.is_null() || out_height.is_null() {
        return false;
    }
    unsafe {
        *out_width = texture.width();
        *out_height = texture.height();
    }
    true
}

/// Copies the BGRA texture into `out` and returns the bytes written, or 0
/// when there is no texture or `len` is too small.
#[unsafe(no_mangle)]
pub extern "C" fn camera2_texture_copy(handle: *mut c_void, out: *mut u8, len: usize) -> usize {
    let Some(texture) = handle_ref(handle).and_then(|h| h.session.texture()) else {
        return 0;
    };
    if out.is_null() {
        return 0;
    }
    let pixels = texture.snapshot();
    if len < pixels.len() {
        return 0;
    }
    unsafe { ptr::copy_nonoverlapping(pixels.as_ptr(), out, pixels.len()) };
    pixels.len()
}

#[unsafe(no_mangle)]
pub extern "C" fn camera2_frame_stats(handle: *mut c_void, out: *mut Camera2FrameStats) -> bool {
    let Some(h) = handle_ref(handle) else {
        return false;
    };
    if out.is_null() {
        return false;
    }
    let s = h.session.stats();
    unsafe {
        *out = Camera2FrameStats {
            allocated: s.allocated,
            released: s.released,
            uploaded: s.uploaded,
            rejected: s.rejected,
            dropped_stale: s.dropped_stale,
            dropped_backpressure: s.dropped_backpressure,
        };
    }
    true
}

/// One BGRA8 frame. `data` only needs to stay valid for the call.
#[unsafe(no_mangle)]
pub extern "C" fn camera2_on_frame(
    handle: *mut c_void,
    data: *const u8,
    len: usize,
    width: u32,
    height: u32,
) {
    let Some(h) = handle_ref(handle) else {
        return;
    };
    if data.is_null() || len == 0 {
        warn!(width, height, "null frame data ignored");
        return;
    }
    let data = unsafe { core::slice::from_raw_parts(data, len) };
    h.sink.on_frame(data, width, height);
}

#[unsafe(no_mangle)]
pub extern "C" fn camera2_on_intrinsics(
    handle: *mut c_void,
    fx: f32,
    fy: f32,
    cx: f32,
    cy: f32,
    skew: f32,
    calib_width: i32,
    calib_height: i32,
) {
    if let Some(h) = handle_ref(handle) {
        h.sink.on_intrinsics(CameraIntrinsics {
            fx,
            fy,
            cx,
            cy,
            skew,
            calib: Resolution::from_signed(calib_width, calib_height),
        });
    }
}

/// NULL or zero-length data records an empty coefficient array.
#[unsafe(no_mangle)]
pub extern "C" fn camera2_on_distortion(handle: *mut c_void, data: *const f32, len: usize) {
    let Some(h) = handle_ref(handle) else {
        return;
    };
    if data.is_null() || len == 0 {
        h.sink.on_distortion(&[]);
        return;
    }
    let coeffs = unsafe { core::slice::from_raw_parts(data, len) };
    h.sink.on_distortion(coeffs);
}

#[unsafe(no_mangle)]
pub extern "C" fn camera2_on_pixel_array_size(handle: *mut c_void, width: i32, height: i32) {
    if let Some(h) = handle_ref(handle) {
        h.sink.on_pixel_array_size(Resolution::from_signed(width, height));
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn camera2_on_active_array_size(handle: *mut c_void, width: i32, height: i32) {
    if let Some(h) = handle_ref(handle) {
        h.sink.on_active_array_size(Resolution::from_signed(width, height));
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn camera2_on_original_resolution(handle: *mut c_void, width: i32, height: i32) {
    if let Some(h) = handle_ref(handle) {
        h.sink.on_original_resolution(Resolution::from_signed(width, height));
    }
}

/// Asynchronous dump result. Set the saved file first with
/// [`camera2_set_characteristics`] so the session picks up its path.
#[unsafe(no_mangle)]
pub extern "C" fn camera2_on_characteristics_dump(handle: *mut c_void, json: *const c_char) {
    if let Some(h) = handle_ref(handle) {
        h.sink.on_characteristics_dump(c_str_lossy(json).into_owned());
    }
}

/// Records the host's latest `(json, path)` dump.
#[unsafe(no_mangle)]
pub extern "C" fn camera2_set_characteristics(
    handle: *mut c_void,
    json: *const c_char,
    path: *const c_char,
) {
    let Some(h) = handle_ref(handle) else {
        return;
    };
    let dump = CharacteristicsDump::new(
        c_str_lossy(json).into_owned(),
        c_str_lossy(path).into_owned(),
    );
    *h.host.last_dump.lock().unwrap_or_else(|p| p.into_inner()) = Some(dump);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Host {
        granted: AtomicBool,
        permission_requests: AtomicUsize,
        starts: AtomicUsize,
        stops: AtomicUsize,
        handle: AtomicUsize,
    }

    fn host(user_data: *mut c_void) -> &'static Host {
        unsafe { &*(user_data as *const Host) }
    }

    extern "C" fn has_permission(user_data: *mut c_void) -> bool {
        host(user_data).granted.load(Ordering::SeqCst)
    }

    extern "C" fn request_permission(user_data: *mut c_void) {
        let h = host(user_data);
        h.permission_requests.fetch_add(1, Ordering::SeqCst);
        h.granted.store(true, Ordering::SeqCst);
    }

    extern "C" fn start_camera(user_data: *mut c_void) -> bool {
        host(user_data).starts.fetch_add(1, Ordering::SeqCst);
        true
    }

    extern "C" fn stop_camera(user_data: *mut c_void) {
        host(user_data).stops.fetch_add(1, Ordering::SeqCst);
    }

    extern "C" fn dump_characteristics(user_data: *mut c_void) {
        let handle = host(user_data).handle.load(Ordering::SeqCst) as *mut c_void;
        let json = CString::new("{\"cameraId\":\"0\"}").unwrap();
        let path = CString::new("/tmp/Camera2/camera_characteristics_0.json").unwrap();
        camera2_set_characteristics(handle, json.as_ptr(), path.as_ptr());
    }

    fn callbacks(h: &Host) -> Camera2HostCallbacks {
        Camera2HostCallbacks {
            user_data: h as *const Host as *mut c_void,
            has_permission: Some(has_permission),
            request_permission: Some(request_permission),
            start_camera: Some(start_camera),
            stop_camera: Some(stop_camera),
            dump_characteristics: Some(dump_characteristics),
            request_characteristics_dump: None,
        }
    }

    fn leak_host() -> &'static Host {
        Box::leak(Box::new(Host::default()))
    }

    #[test]
    fn null_handles_are_rejected() {
        let null = ptr::null_mut();
        assert!(camera2_session_new(ptr::null(), 4, 4).is_null());
        assert!(!camera2_start_preview(null));
        camera2_stop_preview(null);
        camera2_on_frame(null, [0u8; 4].as_ptr(), 4, 1, 1);
        assert_eq!(camera2_get_distortion_raw(null, ptr::null_mut(), 0), 0);
        assert!(camera2_get_characteristics_json(null, false).is_null());
        camera2_string_free(ptr::null_mut());
        camera2_session_free(null);
    }

    #[test]
    fn permission_then_frames() {
        let host = leak_host();
        let cb = callbacks(host);
        let handle = camera2_session_new(&cb, 2, 2);
        assert!(!handle.is_null());
        host.handle.store(handle as usize, Ordering::SeqCst);

        assert!(!camera2_start_preview(handle));
        assert_eq!(host.permission_requests.load(Ordering::SeqCst), 1);
        assert!(camera2_start_preview(handle));
        assert!(camera2_is_active(handle));
        assert_eq!(host.starts.load(Ordering::SeqCst), 1);

        let frame = [7u8; 16];
        camera2_on_frame(handle, frame.as_ptr(), frame.len(), 2, 2);
        assert!(camera2_wait_idle(handle, 5000));

        let (mut w, mut h) = (0, 0);
        assert!(camera2_texture_info(handle, &mut w, &mut h));
        assert_eq!((w, h), (2, 2));
        let mut pixels = [0u8; 16];
        assert_eq!(camera2_texture_copy(handle, pixels.as_mut_ptr(), pixels.len()), 16);
        assert_eq!(pixels, frame);

        let mut stats = Camera2FrameStats::default();
        assert!(camera2_frame_stats(handle, &mut stats));
        assert_eq!(stats.uploaded, 1);

        camera2_stop_preview(handle);
        assert!(!camera2_is_active(handle));
        assert_eq!(host.stops.load(Ordering::SeqCst), 1);
        assert!(!camera2_texture_info(handle, &mut w, &mut h));
        camera2_session_free(handle);
    }

    #[test]
    fn metadata_round_trip() {
        let host = leak_host();
        let cb = callbacks(host);
        let handle = camera2_session_new(&cb, 0, 0);
        host.handle.store(handle as usize, Ordering::SeqCst);

        camera2_on_intrinsics(handle, 500.0, 501.0, 320.0, 240.0, 0.5, 640, 480);
        let mut k = Camera2Intrinsics::default();
        assert!(camera2_get_intrinsics(handle, &mut k));
        assert_eq!(k.fx, 500.0);
        assert_eq!((k.calib_width, k.calib_height), (640, 480));

        let coeffs = [0.1f32, 0.2, 0.3, 0.4, 0.5];
        camera2_on_distortion(handle, coeffs.as_ptr(), coeffs.len());
        assert_eq!(camera2_get_distortion_raw(handle, ptr::null_mut(), 0), 5);
        let mut canonical = [9f32; 8];
        assert!(camera2_get_distortion_canonical(handle, canonical.as_mut_ptr()));
        assert_eq!(canonical, [0.1, 0.2, 0.0, 0.0, 0.3, 0.4, 0.5, 0.0]);

        camera2_on_distortion(handle, ptr::null(), 3);
        assert_eq!(camera2_get_distortion_raw(handle, ptr::null_mut(), 0), 0);

        camera2_on_pixel_array_size(handle, 4000, 3000);
        camera2_on_original_resolution(handle, 4000, 3000);
        let (mut w, mut h) = (0, 0);
        assert!(camera2_get_original_resolution(handle, &mut w, &mut h));
        assert_eq!((w, h), (4000, 3000));

        let json = camera2_get_characteristics_json(handle, true);
        assert!(!json.is_null());
        assert_eq!(unsafe { CStr::from_ptr(json) }.to_str().unwrap(), "{\"cameraId\":\"0\"}");
        camera2_string_free(json);

        let path = camera2_get_characteristics_path(handle);
        assert!(unsafe { CStr::from_ptr(path) }.to_str().unwrap().ends_with("_0.json"));
        camera2_string_free(path);

        camera2_session_free(handle);
    }
}
