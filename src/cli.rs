// This is free and unencumbered software released into the public domain.

//! CLI helpers (error reporting, verbosity handling, argument parsing).
//!
//! This module must compile even when the crate feature `cli` is disabled,
//! because the library is built in non-CLI configurations.

#[cfg(feature = "cli")]
use crate::shared::CameraError;

#[cfg(feature = "cli")]
use asimov_module::SysexitsError::{self, *};

#[cfg(feature = "cli")]
use clientele::StandardOptions;

#[cfg(feature = "cli")]
pub fn handle_error(err: &CameraError, flags: &StandardOptions) -> SysexitsError {
    tracing::error!(target: "camera2_bridge", %err, "camera command failed");
    if flags.debug || flags.verbose >= 2 {
        tracing::debug!(target: "camera2_bridge", ?err, "detailed error");
    }

    report_error(err, flags);
    map_error_to_sysexit(err)
}

#[cfg(feature = "cli")]
pub fn info_user(flags: &StandardOptions, msg: &str) {
    if flags.debug || flags.verbose >= 1 {
        eprintln!("INFO: {msg}");
    }
    tracing::info!(target: "camera2_bridge", "{msg}");
}

#[cfg(feature = "cli")]
pub fn warn_user(flags: &StandardOptions, msg: &str) {
    if flags.debug || flags.verbose >= 1 {
        eprintln!("WARN: {msg}");
    }
    tracing::warn!(target: "camera2_bridge", "{msg}");
}

#[cfg(feature = "cli")]
fn report_error(err: &CameraError, flags: &StandardOptions) {
    use std::error::Error as _;
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "ERROR: {err}");

    if flags.debug || flags.verbose >= 2 {
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(stderr, "  Caused by: {}", cause);
            source = cause.source();
        }
    }
}

#[cfg(feature = "cli")]
pub fn map_error_to_sysexit(err: &CameraError) -> SysexitsError {
    match err {
        CameraError::NoDriver => EX_UNAVAILABLE,
        CameraError::NoCamera => EX_UNAVAILABLE,
        CameraError::PermissionPending => EX_UNAVAILABLE,
        CameraError::NotActive => EX_SOFTWARE,
        CameraError::InvalidFrame(_) | CameraError::TextureRegion(_) => EX_SOFTWARE,
        CameraError::Unsupported(_) => EX_UNAVAILABLE,
        CameraError::InvalidConfig(_) => EX_CONFIG,
        CameraError::Closed => EX_SOFTWARE,
        CameraError::DriverError { .. } => EX_SOFTWARE,
        CameraError::Other(_) => EX_SOFTWARE,
    }
}

/// Parses `WxH` (also accepts `×`).
pub fn parse_dimensions(s: &str) -> Result<(u32, u32), String> {
    let s = s.trim().replace('×', "x");
    let Some((w, h)) = s.split_once('x') else {
        return Err(format!("Invalid format '{s}'. Use WxH (e.g., 1280x720)"));
    };
    let (w, h) = (w.trim(), h.trim());

    let width: u32 = w.parse().map_err(|_| format!("Invalid width: {w}"))?;
    let height: u32 = h.parse().map_err(|_| format!("Invalid height: {h}"))?;

    if !(16..=7680).contains(&width) {
        return Err(format!("Width {width} is out of reasonable range (16-7680)"));
    }
    if !(16..=4320).contains(&height) {
        return Err(format!("Height {height} is out of reasonable range (16-4320)"));
    }

    Ok((width, height))
}

pub fn parse_frequency(s: &str) -> Result<f64, String> {
    let freq: f64 = s.parse().map_err(|_| format!("Invalid frequency: {s}"))?;

    if freq <= 0.0 {
        return Err("Frequency must be positive".to_string());
    }
    if freq > 240.0 {
        return Err(format!("Frequency {freq} Hz exceeds reasonable maximum (240 Hz)"));
    }
    if freq < 0.1 {
        return Err(format!("Frequency {freq} Hz is below reasonable minimum (0.1 Hz)"));
    }

    Ok(freq)
}

// When `cli` is disabled, keep the module linkable without exposing CLI-only types.
#[cfg(not(feature = "cli"))]
#[inline]
pub fn info_user(_msg: &str) {}

#[cfg(not(feature = "cli"))]
#[inline]
pub fn warn_user(_msg: &str) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions() {
        assert_eq!(parse_dimensions("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_dimensions(" 640 × 480 "), Ok((640, 480)));
        assert!(parse_dimensions("1280").is_err());
        assert!(parse_dimensions("0x720").is_err());
        assert!(parse_dimensions("axb").is_err());
    }

    #[test]
    fn frequency() {
        assert_eq!(parse_frequency("30"), Ok(30.0));
        assert!(parse_frequency("0").is_err());
        assert!(parse_frequency("1000").is_err());
        assert!(parse_frequency("0.01").is_err());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn exit_codes() {
        assert!(matches!(
            map_error_to_sysexit(&CameraError::PermissionPending),
            EX_UNAVAILABLE
        ));
        assert!(matches!(
            map_error_to_sysexit(&CameraError::invalid_config("zero texture width")),
            EX_CONFIG
        ));
    }
}
