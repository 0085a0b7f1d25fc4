use crate::config::BackendKind;
use crate::error::{Error, Result};
use image::{ImageFormat, RgbImage};
use std::ops::{Deref, DerefMut};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct CameraDevice {
    pub index: u32,
    pub name: String,
    pub description: String,
}

/// One still image read from an open capture handle.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Encode as JPEG, overwriting whatever is at `path`.
    pub fn save_jpeg(&self, path: &Path) -> Result<()> {
        self.image
            .save_with_format(path, ImageFormat::Jpeg)
            .map_err(|e| Error::Save {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }
}

/// A live connection to a camera device.
pub trait CaptureHandle {
    /// Read exactly one frame, blocking until the backend answers.
    fn read_frame(&mut self) -> Result<Frame>;

    /// Give the device back to the system. Called once by [`HandleGuard`].
    fn release(&mut self);
}

/// Something that can open camera devices by index.
pub trait CaptureBackend {
    type Handle: CaptureHandle;

    /// Indices are passed through untouched; the backend decides what is invalid.
    fn open(&mut self, index: i32) -> Result<Self::Handle>;
}

/// Owns an open handle and releases it when dropped, whichever way the
/// surrounding scope is left.
pub struct HandleGuard<H: CaptureHandle> {
    handle: H,
}

impl<H: CaptureHandle> HandleGuard<H> {
    pub fn new(handle: H) -> Self {
        Self { handle }
    }
}

impl<H: CaptureHandle> Deref for HandleGuard<H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.handle
    }
}

impl<H: CaptureHandle> DerefMut for HandleGuard<H> {
    fn deref_mut(&mut self) -> &mut H {
        &mut self.handle
    }
}

impl<H: CaptureHandle> Drop for HandleGuard<H> {
    fn drop(&mut self) {
        self.handle.release();
    }
}

#[cfg(feature = "camera")]
mod impls {
    use super::{BackendKind, CameraDevice, CaptureBackend, CaptureHandle, Error, Frame, Result};
    use nokhwa::Camera;
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
    use tracing::{debug, warn};

    fn api_backend(kind: BackendKind) -> ApiBackend {
        match kind {
            BackendKind::V4l2 => ApiBackend::Video4Linux,
            BackendKind::Auto => ApiBackend::Auto,
        }
    }

    pub fn list_devices(kind: BackendKind) -> Result<Vec<CameraDevice>> {
        let devices = nokhwa::query(api_backend(kind))
            .map_err(|e| Error::CameraUnavailable(format!("failed to list cameras: {e}")))?;

        Ok(devices
            .into_iter()
            .enumerate()
            .map(|(pos, dev)| CameraDevice {
                index: dev.index().as_index().unwrap_or(pos as u32),
                name: dev.human_name(),
                description: dev.description().to_string(),
            })
            .collect())
    }

    /// nokhwa-backed capture, Video4Linux2 unless told otherwise.
    #[derive(Debug, Clone, Copy)]
    pub struct NativeBackend {
        kind: BackendKind,
    }

    impl NativeBackend {
        pub fn new(kind: BackendKind) -> Self {
            Self { kind }
        }
    }

    pub struct NativeHandle {
        index: i32,
        camera: Camera,
        streaming: bool,
    }

    impl CaptureBackend for NativeBackend {
        type Handle = NativeHandle;

        fn open(&mut self, index: i32) -> Result<NativeHandle> {
            let device = u32::try_from(index).map_err(|_| Error::Open {
                index,
                reason: "negative device index".into(),
            })?;
            let format =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
            let mut camera =
                Camera::with_backend(CameraIndex::Index(device), format, api_backend(self.kind))
                    .map_err(|e| Error::Open {
                        index,
                        reason: format!("open camera failed: {e}"),
                    })?;
            camera.open_stream().map_err(|e| Error::Open {
                index,
                reason: format!("open stream failed: {e}"),
            })?;
            debug!(index, format = ?camera.camera_format(), "camera stream open");
            Ok(NativeHandle {
                index,
                camera,
                streaming: true,
            })
        }
    }

    impl CaptureHandle for NativeHandle {
        fn read_frame(&mut self) -> Result<Frame> {
            let index = self.index;
            let buffer = self.camera.frame().map_err(|e| Error::Read {
                index,
                reason: format!("capture error: {e}"),
            })?;
            let image = buffer.decode_image::<RgbFormat>().map_err(|e| Error::Read {
                index,
                reason: format!("decode error: {e}"),
            })?;
            Ok(Frame::new(image))
        }

        fn release(&mut self) {
            if !self.streaming {
                return;
            }
            self.streaming = false;
            if let Err(err) = self.camera.stop_stream() {
                warn!(index = self.index, %err, "failed to stop camera stream");
            }
        }
    }
}

#[cfg(not(feature = "camera"))]
mod impls {
    use super::{BackendKind, CameraDevice, CaptureBackend, CaptureHandle, Error, Frame, Result};

    const NO_CAMERA: &str = "built without camera support; enable feature `camera`";

    pub fn list_devices(_kind: BackendKind) -> Result<Vec<CameraDevice>> {
        Err(Error::CameraUnavailable(NO_CAMERA.into()))
    }

    #[derive(Debug, Clone, Copy)]
    pub struct NativeBackend {
        _kind: BackendKind,
    }

    impl NativeBackend {
        pub fn new(kind: BackendKind) -> Self {
            Self { _kind: kind }
        }
    }

    /// Never constructed: opening always fails without a capture backend.
    pub enum NativeHandle {}

    impl CaptureBackend for NativeBackend {
        type Handle = NativeHandle;

        fn open(&mut self, _index: i32) -> Result<NativeHandle> {
            Err(Error::CameraUnavailable(NO_CAMERA.into()))
        }
    }

    impl CaptureHandle for NativeHandle {
        fn read_frame(&mut self) -> Result<Frame> {
            match *self {}
        }

        fn release(&mut self) {
            match *self {}
        }
    }
}

pub use impls::*;

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingHandle {
        releases: Rc<Cell<u32>>,
    }

    impl CaptureHandle for CountingHandle {
        fn read_frame(&mut self) -> Result<Frame> {
            Err(Error::Read {
                index: 0,
                reason: "no data".into(),
            })
        }

        fn release(&mut self) {
            self.releases.set(self.releases.get() + 1);
        }
    }

    #[test]
    fn guard_releases_once_on_drop() {
        let releases = Rc::new(Cell::new(0));
        {
            let mut guard = HandleGuard::new(CountingHandle {
                releases: releases.clone(),
            });
            assert!(guard.read_frame().is_err());
            assert_eq!(releases.get(), 0);
        }
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn guard_releases_on_early_return() {
        fn read_or_bail(releases: Rc<Cell<u32>>) -> Result<Frame> {
            let mut guard = HandleGuard::new(CountingHandle { releases });
            let frame = guard.read_frame()?;
            Ok(frame)
        }

        let releases = Rc::new(Cell::new(0));
        assert!(read_or_bail(releases.clone()).is_err());
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn frame_reports_dimensions() {
        let frame = Frame::new(RgbImage::from_pixel(640, 480, Rgb([10, 20, 30])));
        assert_eq!((frame.width(), frame.height()), (640, 480));
        assert!(!frame.is_empty());
        assert!(Frame::new(RgbImage::new(0, 0)).is_empty());
    }

    #[test]
    fn save_into_missing_dir_is_save_error() {
        let frame = Frame::new(RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])));
        let path = std::env::temp_dir()
            .join(format!("camprobe-missing-{}", uuid::Uuid::new_v4()))
            .join("frame.jpg");
        match frame.save_jpeg(&path) {
            Err(Error::Save { path: saved, .. }) => assert!(saved.ends_with("frame.jpg")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(not(feature = "camera"))]
    #[test]
    fn native_backend_unavailable_without_feature() {
        let mut backend = NativeBackend::new(BackendKind::Auto);
        assert!(matches!(backend.open(0), Err(Error::CameraUnavailable(_))));
        assert!(list_devices(BackendKind::Auto).is_err());
    }
}
