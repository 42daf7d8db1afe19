// This is free and unencumbered software released into the public domain.

use derive_more::Display;

/// Vendor passthrough camera ids that win over anything else when present.
pub const PRIORITY_CAMERA_IDS: [&str; 2] = ["50", "51"];

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq)]
pub enum LensFacing {
    #[display("FRONT")]
    Front,
    #[display("BACK")]
    Back,
    #[display("EXTERNAL")]
    External,
    #[default]
    #[display("UNKNOWN")]
    Unknown,
}

impl LensFacing {
    /// Maps the platform's `LENS_FACING` integer.
    pub fn from_platform(value: i32) -> Self {
        match value {
            0 => LensFacing::Front,
            1 => LensFacing::Back,
            2 => LensFacing::External,
            _ => LensFacing::Unknown,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraInfo {
    pub id: String,
    pub facing: LensFacing,
}

impl CameraInfo {
    pub fn new(id: impl Into<String>, facing: LensFacing) -> Self {
        Self {
            id: id.into(),
            facing,
        }
    }
}

/// Picks the camera to open: a priority id, else the first front camera,
/// else the first back camera, else the first one listed.
pub fn select_camera(cameras: &[CameraInfo]) -> Option<&CameraInfo> {
    cameras
        .iter()
        .find(|c| PRIORITY_CAMERA_IDS.contains(&c.id.as_str()))
        .or_else(|| cameras.iter().find(|c| c.facing == LensFacing::Front))
        .or_else(|| cameras.iter().find(|c| c.facing == LensFacing::Back))
        .or_else(|| cameras.first())
}
