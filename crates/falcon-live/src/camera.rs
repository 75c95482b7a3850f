//! Live camera capture.
//!
//! A camera runs on its own thread and pushes every frame it reads into a
//! [`LatestFrameSlot`]; the loop samples whatever frame is newest. Two
//! backends exist:
//! - `stub://<name>`: a synthetic test pattern, always available
//! - `/dev/videoN`: a V4L2 device, built with the `camera-v4l2` feature

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use falcon_models::{Frame, FrameError, FrameResult};
use image::{DynamicImage, Rgb, RgbImage};
use tracing::{debug, info, warn};

use crate::config::env_parse;
use crate::error::{LiveError, LiveResult};
use crate::frame_source::{encode_jpeg, FramePublisher, FrameSource, LatestFrameSlot};
use crate::logging::FailureTracker;
use crate::metrics;

const SYNTHETIC_PREFIX: &str = "stub://";

/// Consecutive read failures logged before going quiet.
const MAX_LOGGED_FAILURES: u32 = 3;
/// After this many consecutive failures the slot is cleared.
const LOST_AFTER: u32 = 10;
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// True for frame source strings that name a camera rather than a file.
pub fn is_camera_uri(source: &str) -> bool {
    source.starts_with(SYNTHETIC_PREFIX) || source.starts_with("/dev/video")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    /// `/dev/videoN` or `stub://<name>`
    pub device: String,
    pub width: u32,
    pub height: u32,
    /// Requested frame rate; 0 keeps the driver default
    pub target_fps: u32,
    /// JPEG quality for frames the camera does not deliver as JPEG
    pub jpeg_quality: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            target_fps: 30,
            jpeg_quality: 92,
        }
    }
}

impl CameraConfig {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Self::default()
        }
    }

    /// Camera settings from `FALCON_CAMERA_*`; the device comes from the caller.
    pub fn from_env(device: impl Into<String>, jpeg_quality: u8) -> Self {
        let defaults = Self::default();
        Self {
            device: device.into(),
            width: env_parse("FALCON_CAMERA_WIDTH").unwrap_or(defaults.width),
            height: env_parse("FALCON_CAMERA_HEIGHT").unwrap_or(defaults.height),
            target_fps: env_parse("FALCON_CAMERA_FPS").unwrap_or(defaults.target_fps),
            jpeg_quality,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps;
        self
    }

    pub fn is_synthetic(&self) -> bool {
        self.device.starts_with(SYNTHETIC_PREFIX)
    }

    fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }
}

/// Pixel layouts a device may deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Motion JPEG; frames pass through without re-encoding
    Mjpeg,
    /// Packed YUV 4:2:2
    Yuyv,
    /// Packed 8-bit RGB
    Rgb24,
}

impl PixelFormat {
    /// Tried in this order when configuring a device.
    pub const PREFERRED: [PixelFormat; 3] = [PixelFormat::Mjpeg, PixelFormat::Yuyv, PixelFormat::Rgb24];

    pub fn fourcc(&self) -> &'static [u8; 4] {
        match self {
            PixelFormat::Mjpeg => b"MJPG",
            PixelFormat::Yuyv => b"YUYV",
            PixelFormat::Rgb24 => b"RGB3",
        }
    }

    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"MJPG" | b"JPEG" => Some(PixelFormat::Mjpeg),
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"RGB3" => Some(PixelFormat::Rgb24),
            _ => None,
        }
    }
}

/// Negotiated capture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraFormat {
    pub pixel: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Bytes per row; 0 means tightly packed
    pub stride: u32,
}

impl CameraFormat {
    /// Turn one raw buffer into a JPEG frame.
    pub fn decode(&self, data: &[u8], quality: u8) -> FrameResult<Frame> {
        match self.pixel {
            PixelFormat::Mjpeg => {
                if data.len() < 2 || data[..2] != [0xFF, 0xD8] {
                    return Err(FrameError::source("MJPEG buffer is not a JPEG image"));
                }
                Ok(Frame::new(data.to_vec(), self.width, self.height))
            }
            PixelFormat::Yuyv => {
                let img = self.yuyv_to_rgb(data)?;
                encode_jpeg(&DynamicImage::ImageRgb8(img), quality)
            }
            PixelFormat::Rgb24 => {
                let row = self.width as usize * 3;
                let packed = self.packed_rows(data, row)?;
                let img = RgbImage::from_raw(self.width, self.height, packed)
                    .ok_or_else(|| FrameError::source("RGB buffer too short"))?;
                encode_jpeg(&DynamicImage::ImageRgb8(img), quality)
            }
        }
    }

    fn packed_rows(&self, data: &[u8], row: usize) -> FrameResult<Vec<u8>> {
        let stride = if self.stride == 0 { row } else { self.stride as usize };
        if stride < row || data.len() < stride * (self.height as usize).saturating_sub(1) + row {
            return Err(FrameError::source(format!(
                "buffer of {} bytes too short for {}x{}",
                data.len(),
                self.width,
                self.height
            )));
        }
        let mut out = Vec::with_capacity(row * self.height as usize);
        for y in 0..self.height as usize {
            out.extend_from_slice(&data[y * stride..y * stride + row]);
        }
        Ok(out)
    }

    fn yuyv_to_rgb(&self, data: &[u8]) -> FrameResult<RgbImage> {
        let packed = self.packed_rows(data, self.width as usize * 2)?;
        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for quad in packed.chunks_exact(4) {
            let (u, v) = (quad[1], quad[3]);
            rgb.extend_from_slice(&yuv_to_rgb(quad[0], u, v));
            rgb.extend_from_slice(&yuv_to_rgb(quad[2], u, v));
        }
        RgbImage::from_raw(self.width, self.height, rgb)
            .ok_or_else(|| FrameError::source("YUYV frame width must be even"))
    }
}

/// BT.601 full-range conversion.
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let (y, u, v) = (y as f32, u as f32 - 128.0, v as f32 - 128.0);
    let clamp = |c: f32| c.round().clamp(0.0, 255.0) as u8;
    [
        clamp(y + 1.402 * v),
        clamp(y - 0.344_136 * u - 0.714_136 * v),
        clamp(y + 1.772 * u),
    ]
}

/// Moving-bar test pattern for `stub://` cameras.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    quality: u8,
    frame_count: u64,
}

impl SyntheticCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            quality: config.jpeg_quality,
            frame_count: 0,
        }
    }

    pub fn next_frame(&mut self) -> FrameResult<Frame> {
        self.frame_count += 1;
        let (w, h) = (self.width.max(1), self.height.max(1));
        let bar = ((self.frame_count * 8) % u64::from(w)) as u32;
        let img = RgbImage::from_fn(self.width, self.height, |x, y| {
            if x.abs_diff(bar) < 4 {
                Rgb([255, 255, 255])
            } else {
                Rgb([
                    (u64::from(x) * 255 / u64::from(w)) as u8,
                    (u64::from(y) * 255 / u64::from(h)) as u8,
                    64,
                ])
            }
        });
        encode_jpeg(&DynamicImage::ImageRgb8(img), self.quality)
    }
}

#[derive(Debug, Default)]
struct CaptureState {
    stop: AtomicBool,
    frames: AtomicU64,
}

/// Publishes capture results from the camera thread.
struct CapturePump {
    device: String,
    publisher: FramePublisher,
    state: Arc<CaptureState>,
    failures: FailureTracker,
}

impl CapturePump {
    /// Hand one result to the slot. Returns `false` once the camera should stop.
    fn push(&mut self, result: FrameResult<Frame>) -> bool {
        match result {
            Ok(frame) => {
                self.publisher.publish(frame);
                self.state.frames.fetch_add(1, Ordering::Relaxed);
                self.failures.record_success();
                metrics::record_camera_frame();
            }
            Err(e) => {
                metrics::record_camera_error();
                if self.failures.record_failure() {
                    warn!(device = %self.device, "Camera read failed: {}", e);
                }
                if self.failures.failure_count() == LOST_AFTER {
                    warn!(device = %self.device, "Camera lost, frames unavailable until it recovers");
                    self.publisher.clear();
                }
                thread::sleep(ERROR_BACKOFF);
            }
        }
        !self.state.stop.load(Ordering::Relaxed)
    }
}

/// A camera feeding the live loop from a background thread.
///
/// `capture` never blocks; before the first frame arrives (or after the
/// camera is lost) it returns `Unavailable`.
pub struct CameraSource {
    device: String,
    slot: LatestFrameSlot,
    state: Arc<CaptureState>,
    thread: Option<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for CameraSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSource")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl CameraSource {
    /// Open the camera and start capturing. Fails if the device cannot be
    /// opened or configured.
    pub fn open(config: CameraConfig) -> LiveResult<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(LiveError::config("camera width and height must be non-zero"));
        }
        if !config.is_synthetic() && !cfg!(feature = "camera-v4l2") {
            return Err(LiveError::config(format!(
                "camera {} needs the camera-v4l2 feature",
                config.device
            )));
        }

        let (publisher, slot) = LatestFrameSlot::new(config.jpeg_quality);
        let state = Arc::new(CaptureState::default());
        let pump = CapturePump {
            device: config.device.clone(),
            publisher,
            state: Arc::clone(&state),
            failures: FailureTracker::new(MAX_LOGGED_FAILURES).with_subject("Camera"),
        };

        let device = config.device.clone();
        let (ready_tx, ready_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("falcon-camera".to_string())
            .spawn(move || run_capture(config, ready_tx, pump))?;

        match ready_rx.recv() {
            Ok(Ok(format)) => {
                info!(
                    device = %device,
                    width = format.width,
                    height = format.height,
                    pixel = ?format.pixel,
                    "Camera capture started"
                );
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(LiveError::config(format!(
                    "camera thread for {} exited during startup",
                    device
                )))
            }
        }

        Ok(Self {
            device,
            slot,
            state,
            thread: Some(thread),
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn frames_captured(&self) -> u64 {
        self.state.frames.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Ask the capture thread to finish after its current read.
    pub fn stop(&self) {
        self.state.stop.store(true, Ordering::Relaxed);
    }
}

impl FrameSource for CameraSource {
    fn capture(&self) -> FrameResult<Frame> {
        self.slot.capture()
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        // Not joined: a device read can block until the next frame.
        self.stop();
        self.thread.take();
        debug!(device = %self.device, "Camera source dropped");
    }
}

fn run_capture(
    config: CameraConfig,
    ready: mpsc::Sender<FrameResult<CameraFormat>>,
    mut pump: CapturePump,
) {
    if config.is_synthetic() {
        let mut camera = SyntheticCamera::new(&config);
        let format = CameraFormat {
            pixel: PixelFormat::Mjpeg,
            width: config.width,
            height: config.height,
            stride: 0,
        };
        if ready.send(Ok(format)).is_err() {
            return;
        }
        let period = config.frame_period();
        loop {
            thread::sleep(period);
            if !pump.push(camera.next_frame()) {
                break;
            }
        }
    } else {
        #[cfg(feature = "camera-v4l2")]
        device::run(&config, &ready, &mut pump);
        #[cfg(not(feature = "camera-v4l2"))]
        let _ = ready.send(Err(FrameError::source("camera-v4l2 feature not enabled")));
    }
    debug!(device = %config.device, "Camera thread finished");
}

#[cfg(feature = "camera-v4l2")]
mod device {
    use std::sync::mpsc;

    use falcon_models::{FrameError, FrameResult};
    use tracing::warn;
    use v4l::buffer::Type;
    use v4l::io::traits::CaptureStream;
    use v4l::prelude::MmapStream;
    use v4l::video::capture::Parameters;
    use v4l::video::Capture;
    use v4l::{Device, FourCC};

    use super::{CameraConfig, CameraFormat, CapturePump, PixelFormat};

    const BUFFER_COUNT: u32 = 4;

    fn configure(device: &Device, config: &CameraConfig) -> FrameResult<CameraFormat> {
        let mut format = device.format()?;
        format.width = config.width;
        format.height = config.height;

        for pixel in PixelFormat::PREFERRED {
            format.fourcc = FourCC::new(pixel.fourcc());
            let actual = match device.set_format(&format) {
                Ok(actual) => actual,
                Err(e) => {
                    warn!(device = %config.device, ?pixel, "Failed to set camera format: {}", e);
                    continue;
                }
            };
            if let Some(pixel) = PixelFormat::from_fourcc(&actual.fourcc.repr) {
                if config.target_fps > 0 {
                    if let Err(e) = device.set_params(&Parameters::with_fps(config.target_fps)) {
                        warn!(device = %config.device, "Failed to set camera fps: {}", e);
                    }
                }
                return Ok(CameraFormat {
                    pixel,
                    width: actual.width,
                    height: actual.height,
                    stride: actual.stride,
                });
            }
        }
        Err(FrameError::source(format!(
            "{} offers none of MJPG, YUYV or RGB3",
            config.device
        )))
    }

    pub(super) fn run(
        config: &CameraConfig,
        ready: &mpsc::Sender<FrameResult<CameraFormat>>,
        pump: &mut CapturePump,
    ) {
        let mut device = match Device::with_path(&config.device) {
            Ok(device) => device,
            Err(e) => {
                let _ = ready.send(Err(FrameError::source(format!("open {}: {}", config.device, e))));
                return;
            }
        };
        let format = match configure(&device, config) {
            Ok(format) => format,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let mut stream = match MmapStream::with_buffers(&mut device, Type::VideoCapture, BUFFER_COUNT) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready.send(Err(FrameError::source(format!(
                    "create buffer stream for {}: {}",
                    config.device, e
                ))));
                return;
            }
        };
        if ready.send(Ok(format)).is_err() {
            return;
        }

        loop {
            let frame = match stream.next() {
                Ok((buf, meta)) => {
                    let used = (meta.bytesused as usize).min(buf.len());
                    let data = if used == 0 { buf } else { &buf[..used] };
                    format.decode(data, config.jpeg_quality)
                }
                Err(e) => Err(FrameError::from(e)),
            };
            if !pump.push(frame) {
                break;
            }
        }
    }
}
