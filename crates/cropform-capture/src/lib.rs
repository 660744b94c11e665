#![warn(missing_docs)]
//! # cropform-capture
//!
//! ## Purpose
//! Provides the two acquisition paths that deliver one raw image to the crop
//! stage: a native file selection and a live camera stream.
//!
//! ## Responsibilities
//! - Reduce a multi-file selection to its first file.
//! - Define a backend-agnostic camera trait with a rear-then-front fallback.
//! - Own camera streams so every track is released on capture, stop, or drop.
//! - Expose a deterministic synthetic camera for CI and unit tests.
//!
//! ## Data flow
//! File change -> [`first_selected`] -> [`AcquiredImage::decode`].
//! Camera click -> [`CameraDialog::open`] -> [`CameraDialog::capture`] ->
//! [`AcquiredImage::decode`]. Both end in a [`RasterImage`] for the crop stage.
//!
//! ## Ownership and lifetimes
//! [`StreamingCamera`] owns its [`MediaStream`]; capture consumes the session
//! value, so capturing without a live stream cannot be expressed.
//!
//! ## Error model
//! Permission, availability, and codec failures are reported as
//! [`CaptureError`] values; none of them leave a stream running.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cropform_core::{
    CAMERA_FILE_NAME, CoreError, FileValue, JPEG_CONTENT_TYPE, RasterImage, decode_image_bytes,
    encode_jpeg,
};
use thiserror::Error;

/// Camera facing direction requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Rear camera.
    Environment,
    /// Front camera.
    User,
}

/// Order in which facing modes are requested.
pub const FACING_PREFERENCE: [FacingMode; 2] = [FacingMode::Environment, FacingMode::User];

/// Which path produced an acquired image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionSource {
    /// Native file chooser.
    File,
    /// Camera capture.
    Camera,
}

/// Encoded image bytes handed from an acquisition path to the crop stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredImage {
    /// Path that produced the image.
    pub source: AcquisitionSource,
    /// Image as a file value.
    pub file: FileValue,
}

impl AcquiredImage {
    /// Decodes the file bytes into a raster.
    ///
    /// # Errors
    /// Returns [`CaptureError::Decode`] when the bytes are not a supported
    /// image.
    pub fn decode(&self) -> Result<RasterImage, CaptureError> {
        decode_image_bytes(&self.file.bytes).map_err(CaptureError::Decode)
    }
}

/// Returns the first file of a native selection; the rest are ignored.
pub fn first_selected(files: Vec<FileValue>) -> Option<FileValue> {
    let total = files.len();
    let first = files.into_iter().next();
    if total > 1 {
        log::debug!(target: "acquire", "ignored extra files count={}", total - 1);
    }
    first
}

/// Live media stream produced by a camera backend.
pub trait MediaStream: Send {
    /// Native frame resolution as `(width, height)`.
    fn resolution(&self) -> (u32, u32);

    /// Draws the current frame at native resolution.
    ///
    /// # Errors
    /// Returns [`CaptureError::StreamEnded`] when tracks were already stopped.
    fn grab_frame(&mut self) -> Result<RasterImage, CaptureError>;

    /// Number of tracks still holding hardware.
    fn live_tracks(&self) -> usize;

    /// Stops every track. Must be idempotent.
    fn stop_all_tracks(&mut self);
}

/// Trait implemented by concrete camera providers.
pub trait CameraBackend: Send + Sync {
    /// Requests a stream for the given facing mode.
    ///
    /// # Errors
    /// Returns [`CaptureError::PermissionDenied`], [`CaptureError::NoCamera`],
    /// or [`CaptureError::Unsupported`].
    fn open_stream(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>, CaptureError>;
}

/// A camera session with a live stream.
///
/// Dropping the session stops every track.
pub struct StreamingCamera {
    stream: Box<dyn MediaStream>,
    facing: FacingMode,
}

impl StreamingCamera {
    /// Opens a stream, preferring the rear camera and falling back to the
    /// front camera when the first request fails.
    ///
    /// # Errors
    /// Returns the error of the last attempted facing mode.
    pub fn start(backend: &dyn CameraBackend) -> Result<Self, CaptureError> {
        let mut last_error = CaptureError::NoCamera;
        for facing in FACING_PREFERENCE {
            match backend.open_stream(facing) {
                Ok(stream) => {
                    let (width, height) = stream.resolution();
                    log::info!(
                        target: "camera",
                        "stream ready facing={facing:?} resolution={width}x{height}"
                    );
                    return Ok(Self { stream, facing });
                }
                Err(error) => {
                    log::warn!(target: "camera", "request failed facing={facing:?} error={error}");
                    last_error = error;
                }
            }
        }
        Err(last_error)
    }

    /// Facing mode of the live stream.
    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    /// Number of tracks still holding hardware.
    pub fn live_tracks(&self) -> usize {
        self.stream.live_tracks()
    }

    /// Draws the current frame, encodes it as JPEG, and stops the stream.
    ///
    /// The stream is stopped even when drawing or encoding fails.
    ///
    /// # Errors
    /// Returns [`CaptureError::StreamEnded`] or [`CaptureError::Encode`].
    pub fn capture(mut self, quality: u8) -> Result<AcquiredImage, CaptureError> {
        let frame = self.stream.grab_frame();
        self.stream.stop_all_tracks();

        let frame = frame?;
        let jpeg = encode_jpeg(&frame, quality).map_err(CaptureError::Encode)?;
        log::info!(
            target: "camera",
            "captured resolution={}x{} bytes={}",
            jpeg.width,
            jpeg.height,
            jpeg.bytes.len()
        );

        Ok(AcquiredImage {
            source: AcquisitionSource::Camera,
            file: FileValue::chosen(CAMERA_FILE_NAME, JPEG_CONTENT_TYPE, jpeg.bytes),
        })
    }

    /// Stops the stream without capturing.
    pub fn stop(self) {}
}

impl Drop for StreamingCamera {
    fn drop(&mut self) {
        self.stream.stop_all_tracks();
    }
}

impl std::fmt::Debug for StreamingCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingCamera")
            .field("facing", &self.facing)
            .field("live_tracks", &self.stream.live_tracks())
            .finish()
    }
}

/// Observable phase of the camera dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPhase {
    /// No camera activity.
    Idle,
    /// A stream request is outstanding.
    Requesting,
    /// A live preview is shown.
    Streaming,
    /// A frame was captured and the stream released.
    Captured,
    /// The user stopped the stream without capturing.
    Stopped,
}

/// Shared camera dialog holding at most one streaming session.
#[derive(Debug)]
pub struct CameraDialog {
    phase: CameraPhase,
    session: Option<StreamingCamera>,
}

impl CameraDialog {
    /// Creates an idle dialog.
    pub fn new() -> Self {
        Self {
            phase: CameraPhase::Idle,
            session: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> CameraPhase {
        self.phase
    }

    /// Returns `true` while the live preview is visible.
    pub fn is_streaming(&self) -> bool {
        self.session.is_some()
    }

    /// Live tracks held by the current session, zero when idle.
    pub fn live_tracks(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, StreamingCamera::live_tracks)
    }

    /// Replaces any existing session with a new stream.
    ///
    /// # Errors
    /// Returns the backend error; the dialog is left idle with no stream.
    pub fn open(&mut self, backend: &dyn CameraBackend) -> Result<FacingMode, CaptureError> {
        self.session = None;
        self.phase = CameraPhase::Requesting;

        match StreamingCamera::start(backend) {
            Ok(session) => {
                let facing = session.facing();
                self.session = Some(session);
                self.phase = CameraPhase::Streaming;
                Ok(facing)
            }
            Err(error) => {
                self.phase = CameraPhase::Idle;
                Err(error)
            }
        }
    }

    /// Captures the current frame and releases the stream.
    ///
    /// # Errors
    /// Returns [`CaptureError::NoActiveStream`] when nothing is streaming,
    /// otherwise the capture error.
    pub fn capture(&mut self, quality: u8) -> Result<AcquiredImage, CaptureError> {
        let session = self.session.take().ok_or(CaptureError::NoActiveStream)?;
        match session.capture(quality) {
            Ok(image) => {
                self.phase = CameraPhase::Captured;
                Ok(image)
            }
            Err(error) => {
                self.phase = CameraPhase::Idle;
                Err(error)
            }
        }
    }

    /// Stops any live stream. Returns `true` if a stream was stopped.
    pub fn stop(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                session.stop();
                self.phase = CameraPhase::Stopped;
                log::info!(target: "camera", "stream stopped");
                true
            }
            None => false,
        }
    }
}

impl Default for CameraDialog {
    fn default() -> Self {
        Self::new()
    }
}

/// Backend for hosts without camera access.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedCameraBackend;

impl CameraBackend for UnsupportedCameraBackend {
    fn open_stream(&self, _facing: FacingMode) -> Result<Box<dyn MediaStream>, CaptureError> {
        Err(CaptureError::Unsupported)
    }
}

/// Deterministic synthetic camera for test and CI usage.
///
/// Every opened stream registers its tracks in a shared counter so callers
/// can assert that no hardware handle leaks.
#[derive(Debug)]
pub struct SyntheticCameraBackend {
    width: u32,
    height: u32,
    facings: Vec<FacingMode>,
    denied: bool,
    live_tracks: Arc<AtomicUsize>,
    requests: Mutex<Vec<FacingMode>>,
}

impl SyntheticCameraBackend {
    /// Creates a backend with rear and front cameras at the given resolution.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            facings: FACING_PREFERENCE.to_vec(),
            denied: false,
            live_tracks: Arc::new(AtomicUsize::new(0)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Restricts the backend to the given cameras.
    pub fn with_facings(mut self, facings: &[FacingMode]) -> Self {
        self.facings = facings.to_vec();
        self
    }

    /// Makes every request fail as if the user denied permission.
    pub fn denied(mut self) -> Self {
        self.denied = true;
        self
    }

    /// Tracks currently live across every opened stream.
    pub fn live_tracks(&self) -> usize {
        self.live_tracks.load(Ordering::SeqCst)
    }

    /// Facing modes requested so far, in order.
    pub fn requests(&self) -> Vec<FacingMode> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl CameraBackend for SyntheticCameraBackend {
    fn open_stream(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>, CaptureError> {
        self.requests
            .lock()
            .map_err(|_| CaptureError::Backend("synthetic request log poisoned".to_string()))?
            .push(facing);

        if self.denied {
            return Err(CaptureError::PermissionDenied);
        }
        if !self.facings.contains(&facing) {
            return Err(CaptureError::NoCamera);
        }

        self.live_tracks.fetch_add(SyntheticStream::TRACKS, Ordering::SeqCst);
        Ok(Box::new(SyntheticStream {
            width: self.width,
            height: self.height,
            facing,
            live: true,
            counter: Arc::clone(&self.live_tracks),
        }))
    }
}

struct SyntheticStream {
    width: u32,
    height: u32,
    facing: FacingMode,
    live: bool,
    counter: Arc<AtomicUsize>,
}

impl SyntheticStream {
    // One video track plus one audio track, as a typical user-media stream.
    const TRACKS: usize = 2;
}

impl MediaStream for SyntheticStream {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn grab_frame(&mut self) -> Result<RasterImage, CaptureError> {
        if !self.live {
            return Err(CaptureError::StreamEnded);
        }

        // Horizontal gradient; rear and front cameras differ in the blue channel.
        let blue = match self.facing {
            FacingMode::Environment => 0,
            FacingMode::User => 255,
        };
        let mut rgba = Vec::with_capacity((self.width * self.height * 4) as usize);
        for _y in 0..self.height {
            for x in 0..self.width {
                let red = ((x * 255) / self.width.max(1)) as u8;
                rgba.extend_from_slice(&[red, 128, blue, 255]);
            }
        }

        RasterImage::new(self.width, self.height, rgba)
            .map_err(|error| CaptureError::Backend(error.to_string()))
    }

    fn live_tracks(&self) -> usize {
        if self.live { Self::TRACKS } else { 0 }
    }

    fn stop_all_tracks(&mut self) {
        if self.live {
            self.live = false;
            self.counter.fetch_sub(Self::TRACKS, Ordering::SeqCst);
        }
    }
}

/// Acquisition layer error type.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The user or platform denied camera access.
    #[error("camera permission denied")]
    PermissionDenied,
    /// No camera matches the request.
    #[error("no camera available")]
    NoCamera,
    /// Camera capture is not supported on this host.
    #[error("camera capture is not supported")]
    Unsupported,
    /// Capture was requested without a live stream.
    #[error("no active camera stream")]
    NoActiveStream,
    /// Frames were requested after the tracks stopped.
    #[error("camera stream has ended")]
    StreamEnded,
    /// Acquired bytes are not a decodable image.
    #[error("decode failure: {0}")]
    Decode(CoreError),
    /// Captured frame could not be encoded.
    #[error("encode failure: {0}")]
    Encode(CoreError),
    /// Backend runtime failure.
    #[error("camera backend failure: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for acquisition paths and stream ownership.

    use super::*;

    #[test]
    fn first_selected_keeps_only_the_first_file() {
        let files = vec![
            FileValue::chosen("a.png", "image/png", vec![1]),
            FileValue::chosen("b.png", "image/png", vec![2]),
        ];
        let first = first_selected(files).expect("one file expected");
        assert_eq!(first.name, "a.png");
        assert!(first_selected(Vec::new()).is_none());
    }

    #[test]
    fn start_prefers_rear_camera() {
        let backend = SyntheticCameraBackend::new(8, 6);
        let session = StreamingCamera::start(&backend).expect("stream should open");
        assert_eq!(session.facing(), FacingMode::Environment);
        assert_eq!(backend.requests(), vec![FacingMode::Environment]);
        assert_eq!(backend.live_tracks(), 2);
    }

    #[test]
    fn start_falls_back_to_front_camera() {
        let backend = SyntheticCameraBackend::new(8, 6).with_facings(&[FacingMode::User]);
        let session = StreamingCamera::start(&backend).expect("front stream should open");
        assert_eq!(session.facing(), FacingMode::User);
        assert_eq!(
            backend.requests(),
            vec![FacingMode::Environment, FacingMode::User]
        );
    }

    #[test]
    fn denied_permission_reports_last_error_and_leaks_nothing() {
        let backend = SyntheticCameraBackend::new(8, 6).denied();
        let mut dialog = CameraDialog::new();
        let result = dialog.open(&backend);

        assert!(matches!(result, Err(CaptureError::PermissionDenied)));
        assert_eq!(dialog.phase(), CameraPhase::Idle);
        assert_eq!(backend.live_tracks(), 0);
    }

    #[test]
    fn capture_releases_tracks_and_returns_native_resolution_jpeg() {
        let backend = SyntheticCameraBackend::new(32, 24);
        let mut dialog = CameraDialog::new();
        dialog.open(&backend).expect("stream should open");
        assert_eq!(dialog.live_tracks(), 2);

        let acquired = dialog.capture(92).expect("capture should work");
        assert_eq!(backend.live_tracks(), 0);
        assert_eq!(dialog.phase(), CameraPhase::Captured);
        assert_eq!(acquired.source, AcquisitionSource::Camera);
        assert_eq!(acquired.file.name, CAMERA_FILE_NAME);

        let raster = acquired.decode().expect("captured frame decodes");
        assert_eq!((raster.width, raster.height), (32, 24));
    }

    #[test]
    fn capture_without_stream_is_rejected() {
        let mut dialog = CameraDialog::new();
        assert!(matches!(
            dialog.capture(92),
            Err(CaptureError::NoActiveStream)
        ));
    }

    #[test]
    fn stop_and_drop_release_every_track() {
        let backend = SyntheticCameraBackend::new(4, 4);
        let mut dialog = CameraDialog::new();
        dialog.open(&backend).expect("stream should open");
        assert!(dialog.stop());
        assert_eq!(dialog.phase(), CameraPhase::Stopped);
        assert_eq!(backend.live_tracks(), 0);

        {
            let _session = StreamingCamera::start(&backend).expect("stream should open");
            assert_eq!(backend.live_tracks(), 2);
        }
        assert_eq!(backend.live_tracks(), 0);
    }

    #[test]
    fn reopening_replaces_the_previous_stream() {
        let backend = SyntheticCameraBackend::new(4, 4);
        let mut dialog = CameraDialog::new();
        dialog.open(&backend).expect("first stream");
        dialog.open(&backend).expect("second stream");
        assert_eq!(backend.live_tracks(), 2);
    }

    #[test]
    fn decode_of_chosen_png_yields_raster() {
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(5, 3, image::Rgba([1, 2, 3, 255]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .expect("png encode");

        let acquired = AcquiredImage {
            source: AcquisitionSource::File,
            file: FileValue::chosen("a.png", "image/png", png),
        };
        let raster = acquired.decode().expect("png decodes");
        assert_eq!((raster.width, raster.height), (5, 3));
    }
}
