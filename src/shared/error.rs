// This is free and unencumbered software released into the public domain.

use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("no suitable camera platform available")]
    NoDriver,

    #[error("no camera device available")]
    NoCamera,

    #[error("camera permission not granted; a request was issued, retry once granted")]
    PermissionPending,

    #[error("camera preview is not active")]
    NotActive,

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("invalid texture region: {0}")]
    TextureRegion(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("queue closed")]
    Closed,

    #[error("platform error while {context}")]
    DriverError {
        context: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("{0}")]
    Other(String),
}

impl CameraError {
    #[inline]
    pub fn driver(context: &'static str, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::DriverError {
            context,
            source: Box::new(source),
        }
    }

    #[inline]
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    #[inline]
    pub fn texture_region(msg: impl Into<String>) -> Self {
        Self::TextureRegion(msg.into())
    }

    #[inline]
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    #[inline]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether the caller can succeed by simply retrying later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PermissionPending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "helper class missing");
        let err = CameraError::driver("loading camera helper", io);
        assert_eq!(err.to_string(), "platform error while loading camera helper");
        let source = err.source().expect("source");
        assert_eq!(source.to_string(), "helper class missing");
    }

    #[test]
    fn only_permission_is_retryable() {
        assert!(CameraError::PermissionPending.is_retryable());
        assert!(!CameraError::NoCamera.is_retryable());
        assert!(!CameraError::invalid_frame("empty").is_retryable());
    }
}
