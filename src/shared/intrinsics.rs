// This is free and unencumbered software released into the public domain.

//! Pinhole intrinsics and the sensor geometry they are expressed in.

/// Width and height in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Builds a resolution from platform integers; negatives become zero.
    pub fn from_signed(width: i32, height: i32) -> Self {
        Self::new(width.max(0) as u32, height.max(0) as u32)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> Option<f32> {
        if self.is_empty() {
            None
        } else {
            Some(self.width as f32 / self.height as f32)
        }
    }
}

impl core::fmt::Display for Resolution {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Crop window inside a sensor array, `[left, right) x [top, bottom)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CropRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl CropRect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Aspect-preserving centered crop of `sensor` that matches `output`.
pub fn center_crop(sensor: Resolution, output: Resolution) -> CropRect {
    let (sw, sh) = (sensor.width as i32, sensor.height as i32);
    let (Some(src_aspect), Some(dst_aspect)) = (sensor.aspect(), output.aspect()) else {
        return CropRect {
            left: 0,
            top: 0,
            right: sw,
            bottom: sh,
        };
    };
    if dst_aspect > src_aspect {
        // Wider output: crop height.
        let crop_h = (sw as f32 / dst_aspect).round() as i32;
        let top = (sh - crop_h) / 2;
        CropRect {
            left: 0,
            top,
            right: sw,
            bottom: top + crop_h,
        }
    } else {
        let crop_w = (sh as f32 * dst_aspect).round() as i32;
        let left = (sw - crop_w) / 2;
        CropRect {
            left,
            top: 0,
            right: left + crop_w,
            bottom: sh,
        }
    }
}

/// Pinhole calibration, in pixels of `calib`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub skew: f32,
    pub calib: Resolution,
}

impl CameraIntrinsics {
    /// Reads `[fx, fy, cx, cy, skew?]` as reported by the lens calibration
    /// key, expressed in the `calib` pixel grid. `None` when fewer than four
    /// values are present.
    pub fn from_calibration(values: &[f32], calib: Resolution) -> Option<Self> {
        if values.len() < 4 {
            return None;
        }
        Some(Self {
            fx: values[0],
            fy: values[1],
            cx: values[2],
            cy: values[3],
            skew: values.get(4).copied().unwrap_or(0.0),
            calib,
        })
    }

    /// Derives intrinsics from the nominal focal length when no calibration
    /// is published. The principal point sits at the array center.
    pub fn from_focal_length(
        focal_mm: f32,
        physical_size_mm: (f32, f32),
        pixel_array: Resolution,
    ) -> Option<Self> {
        let (w_mm, h_mm) = physical_size_mm;
        if focal_mm <= 0.0 || w_mm <= 0.0 || h_mm <= 0.0 || pixel_array.is_empty() {
            return None;
        }
        let px_per_mm_x = pixel_array.width as f32 / w_mm;
        let px_per_mm_y = pixel_array.height as f32 / h_mm;
        Some(Self {
            fx: focal_mm * px_per_mm_x,
            fy: focal_mm * px_per_mm_y,
            cx: pixel_array.width as f32 * 0.5,
            cy: pixel_array.height as f32 * 0.5,
            skew: 0.0,
            calib: pixel_array,
        })
    }

    pub fn principal_point(&self) -> (f32, f32) {
        (self.cx, self.cy)
    }

    pub fn is_known(&self) -> bool {
        self.fx != 0.0 && self.fy != 0.0
    }

    /// Re-expresses sensor-space intrinsics in the pixel grid of an output
    /// stream that is a centered crop of `sensor` scaled to `output`.
    pub fn for_stream(&self, sensor: Resolution, output: Resolution) -> Self {
        let crop = center_crop(sensor, output);
        if crop.width() <= 0 || crop.height() <= 0 || output.is_empty() {
            return Self {
                calib: output,
                ..*self
            };
        }
        let sx = output.width as f32 / crop.width() as f32;
        let sy = output.height as f32 / crop.height() as f32;
        Self {
            fx: self.fx * sx,
            fy: self.fy * sy,
            cx: (self.cx - crop.left as f32) * sx,
            cy: (self.cy - crop.top as f32) * sy,
            skew: self.skew,
            calib: output,
        }
    }
}

/// Sensor sizes reported alongside the calibration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SensorGeometry {
    pub pixel_array: Option<Resolution>,
    pub active_array: Option<Resolution>,
}

impl SensorGeometry {
    /// The resolution intrinsics were calibrated against: the pixel array,
    /// else the active array.
    pub fn original_resolution(&self) -> Option<Resolution> {
        self.pixel_array
            .filter(|r| !r.is_empty())
            .or(self.active_array.filter(|r| !r.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn crop_wider_output_trims_height() {
        let crop = center_crop(Resolution::new(4000, 3000), Resolution::new(1280, 720));
        assert_eq!(crop, CropRect { left: 0, top: 375, right: 4000, bottom: 2625 });
    }

    #[test]
    fn crop_taller_output_trims_width() {
        let crop = center_crop(Resolution::new(1920, 1080), Resolution::new(1080, 1080));
        assert_eq!(crop, CropRect { left: 420, top: 0, right: 1500, bottom: 1080 });
    }

    #[test]
    fn stream_intrinsics_follow_crop_and_scale() {
        let sensor = Resolution::new(4000, 3000);
        let k = CameraIntrinsics {
            fx: 3000.0,
            fy: 3000.0,
            cx: 2000.0,
            cy: 1500.0,
            skew: 0.0,
            calib: sensor,
        };
        let s = k.for_stream(sensor, Resolution::new(1280, 720));
        assert!(close(s.fx, 960.0));
        assert!(close(s.fy, 960.0));
        assert!(close(s.cx, 640.0));
        assert!(close(s.cy, 360.0));
        assert_eq!(s.calib, Resolution::new(1280, 720));
    }

    #[test]
    fn stream_intrinsics_with_unknown_sensor_keep_values() {
        let k = CameraIntrinsics { fx: 1.0, fy: 2.0, cx: 3.0, cy: 4.0, ..Default::default() };
        let s = k.for_stream(Resolution::default(), Resolution::new(640, 480));
        assert_eq!((s.fx, s.fy, s.cx, s.cy), (1.0, 2.0, 3.0, 4.0));
        assert_eq!(s.calib, Resolution::new(640, 480));
    }

    #[test]
    fn calibration_needs_four_values() {
        assert!(CameraIntrinsics::from_calibration(&[1.0, 2.0, 3.0], Resolution::default()).is_none());
        let k = CameraIntrinsics::from_calibration(&[1.0, 2.0, 3.0, 4.0], Resolution::default())
            .unwrap();
        assert_eq!(k.skew, 0.0);
        let k = CameraIntrinsics::from_calibration(&[1.0, 2.0, 3.0, 4.0, 0.5], Resolution::default())
            .unwrap();
        assert_eq!(k.skew, 0.5);
    }

    #[test]
    fn calibration_keeps_its_resolution() {
        let sensor = Resolution::new(4000, 3000);
        let k = CameraIntrinsics::from_calibration(&[3000.0, 3000.0, 2000.0, 1500.0], sensor)
            .unwrap();
        assert_eq!(k.calib, sensor);
        assert_eq!((k.fx, k.cx, k.cy), (3000.0, 2000.0, 1500.0));
    }

    #[test]
    fn focal_length_fallback() {
        let k = CameraIntrinsics::from_focal_length(4.0, (6.4, 4.8), Resolution::new(640, 480))
            .unwrap();
        assert!(close(k.fx, 400.0));
        assert!(close(k.fy, 400.0));
        assert_eq!(k.principal_point(), (320.0, 240.0));
        assert!(CameraIntrinsics::from_focal_length(0.0, (6.4, 4.8), Resolution::new(640, 480)).is_none());
    }

    #[test]
    fn original_resolution_prefers_pixel_array() {
        let both = SensorGeometry {
            pixel_array: Some(Resolution::new(4032, 3024)),
            active_array: Some(Resolution::new(4000, 3000)),
        };
        assert_eq!(both.original_resolution(), Some(Resolution::new(4032, 3024)));
        let active_only = SensorGeometry { pixel_array: None, ..both };
        assert_eq!(active_only.original_resolution(), Some(Resolution::new(4000, 3000)));
        assert_eq!(SensorGeometry::default().original_resolution(), None);
    }

    #[test]
    fn signed_resolution_clamps_negatives() {
        assert_eq!(Resolution::from_signed(-1, 480), Resolution::new(0, 480));
        assert_eq!(Resolution::new(640, 480).to_string(), "640x480");
    }
}
