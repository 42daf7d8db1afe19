// This is free and unencumbered software released into the public domain.

use super::{
    CameraError, CameraPlatform,
    drivers::synthetic::{SyntheticConfig, SyntheticPlatform},
};
use std::sync::Arc;

/// Names accepted by [`open_platform`].
pub const PLATFORM_NAMES: &[&str] = &["synthetic"];

/// Resolves a platform by name. An empty name picks the default.
///
/// Native hosts bring their own [`CameraPlatform`] (see the C ABI); only
/// the synthetic camera is built in.
pub fn open_platform(
    name: impl AsRef<str>,
    config: SyntheticConfig,
) -> Result<Arc<dyn CameraPlatform>, CameraError> {
    match name.as_ref().trim() {
        "" | "synthetic" => Ok(Arc::new(SyntheticPlatform::new(config))),
        _ => Err(CameraError::NoDriver),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_synthetic() {
        let platform = open_platform("", SyntheticConfig::default()).unwrap();
        assert_eq!(platform.name(), "synthetic");
        assert!(open_platform(" synthetic ", SyntheticConfig::default()).is_ok());
    }

    #[test]
    fn unknown_platform() {
        assert!(matches!(
            open_platform("v4l2", SyntheticConfig::default()),
            Err(CameraError::NoDriver)
        ));
    }
}
