//! Camera probing: open a device by index, read one frame, save it, report.
//! The `camprobe` binary drives this crate; tests drive it with scripted backends.

pub mod camera;
pub mod config;
pub mod error;
pub mod probe;

pub use crate::camera::{CaptureBackend, CaptureHandle, Frame, HandleGuard, NativeBackend};
pub use crate::config::{BackendKind, ProbeSettings};
pub use crate::error::{Error, Result};
pub use crate::probe::{CameraProbe, ProbeOutcome};
