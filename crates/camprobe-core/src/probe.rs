use crate::camera::{CaptureBackend, CaptureHandle, Frame, HandleGuard};
use crate::error::{Error, Result};
use std::fmt;
use std::io::Write;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const SEPARATOR_WIDTH: usize = 30;

pub fn frame_filename(index: i32) -> String {
    format!("test_cam_{index}.jpg")
}

/// What happened when a single index was probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Frame read and written to `path`.
    Captured {
        width: u32,
        height: u32,
        path: PathBuf,
    },
    /// Frame read but the image file could not be written.
    Unsaved { width: u32, height: u32 },
    OpenFailed,
    ReadFailed,
}

impl ProbeOutcome {
    /// The read's own success flag.
    pub fn succeeded(&self) -> bool {
        matches!(
            self,
            ProbeOutcome::Captured { .. } | ProbeOutcome::Unsaved { .. }
        )
    }
}

/// Opens one device at a time, reads a single frame, saves it and reports
/// each step on `out`.
pub struct CameraProbe<B, W> {
    backend: B,
    output_dir: PathBuf,
    out: W,
}

impl<B: CaptureBackend, W: Write> CameraProbe<B, W> {
    pub fn new(backend: B, output_dir: impl Into<PathBuf>, out: W) -> Self {
        Self {
            backend,
            output_dir: output_dir.into(),
            out,
        }
    }

    pub fn into_parts(self) -> (B, W) {
        (self.backend, self.out)
    }

    pub fn probe(&mut self, index: i32) -> bool {
        self.probe_outcome(index).succeeded()
    }

    pub fn probe_outcome(&mut self, index: i32) -> ProbeOutcome {
        self.say(format_args!("Testing Camera Index: {index}..."));

        let handle = match self.backend.open(index) {
            Ok(handle) => handle,
            Err(err) => {
                debug!(index, %err, "open failed");
                self.say(format_args!("❌ Failed to open camera index {index}"));
                return ProbeOutcome::OpenFailed;
            }
        };
        let mut handle = HandleGuard::new(handle);

        let frame = match read_one(&mut handle, index) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(index, %err, "read failed");
                self.say(format_args!(
                    "❌ Opened camera {index} but could not read frame (empty frame)"
                ));
                return ProbeOutcome::ReadFailed;
            }
        };

        let (width, height) = (frame.width(), frame.height());
        let filename = frame_filename(index);
        let path = self.output_dir.join(&filename);
        match frame.save_jpeg(&path) {
            Ok(()) => {
                info!(index, width, height, path = %path.display(), "frame saved");
                self.say(format_args!("✅ Success! Captured frame saved as {filename}"));
                self.say(format_args!("   Resolution: {width}x{height}"));
                ProbeOutcome::Captured {
                    width,
                    height,
                    path,
                }
            }
            Err(err) => {
                warn!(index, %err, "frame captured but not saved");
                self.say(format_args!(
                    "❌ Captured frame from camera {index} but could not save {filename}: {err}"
                ));
                ProbeOutcome::Unsaved { width, height }
            }
        }
    }

    /// Probe every index in ascending order, printing a separator after each
    /// attempt. Failures never stop the loop.
    pub fn run(&mut self, indices: RangeInclusive<i32>) -> Vec<(i32, ProbeOutcome)> {
        let mut outcomes = Vec::new();
        for index in indices {
            let outcome = self.probe_outcome(index);
            self.say(format_args!("{}", "-".repeat(SEPARATOR_WIDTH)));
            outcomes.push((index, outcome));
        }
        let captured = outcomes.iter().filter(|(_, o)| o.succeeded()).count();
        info!(attempted = outcomes.len(), captured, "probe run finished");
        outcomes
    }

    fn say(&mut self, line: fmt::Arguments<'_>) {
        if let Err(err) = writeln!(self.out, "{line}") {
            warn!(%err, "failed to write probe output");
        }
    }
}

fn read_one<H: CaptureHandle>(handle: &mut HandleGuard<H>, index: i32) -> Result<Frame> {
    let frame = handle.read_frame()?;
    if frame.is_empty() {
        return Err(Error::EmptyFrame { index });
    }
    Ok(frame)
}
