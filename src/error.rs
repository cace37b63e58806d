//! Error types

use std::collections::TryReserveError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by a device state source.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeviceError {
    /// The native input connection could not be established.
    #[error("device connection is not initialized: {0}")]
    NotInitialized(String),

    /// Neither a keyboard nor a pointer device could be opened.
    #[error("no usable keyboard or pointer device found in {}", .0.display())]
    NoDevices(PathBuf),

    /// An OS call on an input device failed.
    #[error("device I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The native state query reported a failure.
    #[error("state query failed: {0}")]
    QueryFailed(String),

    /// No device state source exists for this platform.
    #[error("platform not supported")]
    UnsupportedPlatform,
}

/// Errors reported by the event handler.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EventError {
    /// The device state source could not be set up.
    #[error("failed to initialize device state: {0}")]
    Init(#[source] DeviceError),

    /// A callback partition could not grow.
    #[error("failed to register callback: {0}")]
    Registration(#[from] TryReserveError),

    /// A polling thread could not be spawned.
    #[error("failed to spawn {0} polling thread: {1}")]
    Spawn(&'static str, #[source] io::Error),

    /// A polling thread terminated by panicking.
    #[error("{0} polling thread panicked")]
    LoopPanicked(&'static str),
}
