// This is free and unencumbered software released into the public domain.

use crate::shared::DistortionModel;

/// Width of the preview texture created at `start_preview`.
pub const DEFAULT_TEXTURE_WIDTH: u32 = 1280;

/// Height of the preview texture created at `start_preview`.
pub const DEFAULT_TEXTURE_HEIGHT: u32 = 720;

/// Byte value the preview texture is cleared to (dark gray).
pub const DEFAULT_CLEAR_VALUE: u8 = 64;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub texture_width: u32,
    pub texture_height: u32,
    pub clear_value: u8,
    /// Upper bound on frame copies alive between the capture callback and
    /// the texture upload. `None` keeps the queues unbounded.
    pub max_in_flight: Option<usize>,
    pub distortion_model: DistortionModel,
    pub diagnostics: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            texture_width: DEFAULT_TEXTURE_WIDTH,
            texture_height: DEFAULT_TEXTURE_HEIGHT,
            clear_value: DEFAULT_CLEAR_VALUE,
            max_in_flight: None,
            distortion_model: DistortionModel::default(),
            diagnostics: false,
        }
    }
}

impl SessionConfig {
    pub fn new(texture_width: u32, texture_height: u32) -> Self {
        Self {
            texture_width,
            texture_height,
            ..Default::default()
        }
    }

    pub fn with_clear_value(mut self, value: u8) -> Self {
        self.clear_value = value;
        self
    }

    pub fn with_max_in_flight(mut self, n: usize) -> Self {
        self.max_in_flight = Some(n.max(1));
        self
    }

    pub fn with_distortion_model(mut self, model: DistortionModel) -> Self {
        self.distortion_model = model;
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), crate::shared::CameraError> {
        if self.texture_width == 0 || self.texture_height == 0 {
            return Err(crate::shared::CameraError::invalid_config(format!(
                "texture size {}x{} must be non-zero",
                self.texture_width, self.texture_height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_preview_texture() {
        let config = SessionConfig::default();
        assert_eq!((config.texture_width, config.texture_height), (1280, 720));
        assert_eq!(config.clear_value, 64);
        assert!(config.max_in_flight.is_none());
        assert_eq!(config.distortion_model, DistortionModel::RadialFiveTerm);
    }

    #[test]
    fn in_flight_bound_is_at_least_one() {
        assert_eq!(SessionConfig::default().with_max_in_flight(0).max_in_flight, Some(1));
    }

    #[test]
    fn zero_sized_texture_is_rejected() {
        assert!(SessionConfig::new(0, 720).validate().is_err());
        assert!(SessionConfig::new(640, 480).validate().is_ok());
    }
}
