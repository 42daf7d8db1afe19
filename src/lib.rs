// This is free and unencumbered software released into the public domain.

//! Camera2 preview bridge.
//!
//! A [`shared::CameraSession`] accepts frames and lens metadata from a
//! [`shared::CameraPlatform`] on the platform's own threads, hands frames
//! through two ordered task queues into a [`shared::Texture`], and exposes
//! the latest calibration (intrinsics, distortion, characteristics) to any
//! caller.

extern crate alloc;

pub mod cli;

#[cfg(feature = "ffi")]
pub mod ffi;

pub mod shared;
