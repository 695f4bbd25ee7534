// src/error.rs

use thiserror::Error;

/// Why the capture device could not be acquired.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("no input device found")]
    NoDeviceFound,

    #[error("device already in use by another session")]
    AlreadyInUse,
}

/// Error taxonomy for the audio core.
///
/// Device and decode errors are returned to the immediate caller and never
/// retried automatically. Export failures are isolated per job. The
/// compressed-format fallback is a warning carried on the export job, not an
/// error, so it has no variant here.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(#[from] DeviceError),

    /// All three duration-resolution strategies were exhausted. Never coerced
    /// to a zero duration; the caller must re-attempt capture.
    #[error("recording duration could not be resolved")]
    DurationUnresolved,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("export failed: {0}")]
    ExportFailed(String),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}
