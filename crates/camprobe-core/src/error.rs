use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for camera probing.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("failed to open camera index {index}: {reason}")]
    Open { index: i32, reason: String },
    #[error("failed to read frame from camera {index}: {reason}")]
    Read { index: i32, reason: String },
    #[error("camera {index} returned an empty frame")]
    EmptyFrame { index: i32 },
    #[error("failed to save {path}: {reason}")]
    Save { path: String, reason: String },
}
