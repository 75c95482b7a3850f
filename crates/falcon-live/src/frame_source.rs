//! Frame sources for the live loop.
//!
//! A source hands out the current frame on demand. Sources that are not
//! ready yet return [`FrameError::Unavailable`], which the loop skips
//! without logging.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use falcon_models::{Frame, FrameError, FrameResult};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tokio::sync::watch;
use tracing::{debug, info};

/// Produces the current frame of a live video source.
pub trait FrameSource: Send + Sync {
    fn capture(&self) -> FrameResult<Frame>;
}

/// Encode an image as a JPEG frame at its native size.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> FrameResult<Frame> {
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(FrameError::Unavailable);
    }

    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(|e| FrameError::encode(e.to_string()))?;

    Ok(Frame::new(buf, width, height))
}

fn load_image(path: &Path) -> FrameResult<DynamicImage> {
    image::open(path).map_err(|e| FrameError::source(format!("{}: {}", path.display(), e)))
}

/// Replays one still image on every capture.
pub struct StillImageSource {
    frame: Frame,
}

impl StillImageSource {
    pub fn open(path: impl AsRef<Path>, quality: u8) -> FrameResult<Self> {
        let path = path.as_ref();
        let img = load_image(path)?;
        let frame = encode_jpeg(&img, quality)?;
        info!(
            path = %path.display(),
            width = frame.width,
            height = frame.height,
            "Loaded still frame source"
        );
        Ok(Self { frame })
    }

    pub fn from_image(img: &DynamicImage, quality: u8) -> FrameResult<Self> {
        Ok(Self {
            frame: encode_jpeg(img, quality)?,
        })
    }
}

impl FrameSource for StillImageSource {
    fn capture(&self) -> FrameResult<Frame> {
        let mut frame = self.frame.clone();
        frame.captured_at = chrono::Utc::now();
        Ok(frame)
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// Cycles through the images of a directory in file-name order.
pub struct DirectorySource {
    files: Vec<PathBuf>,
    next: AtomicUsize,
    quality: u8,
}

impl DirectorySource {
    pub fn open(dir: impl AsRef<Path>, quality: u8) -> FrameResult<Self> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if path.is_file() && is_image {
                files.push(path);
            }
        }
        files.sort();

        info!(dir = %dir.display(), frames = files.len(), "Opened directory frame source");
        Ok(Self {
            files,
            next: AtomicUsize::new(0),
            quality,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for DirectorySource {
    fn capture(&self) -> FrameResult<Frame> {
        if self.files.is_empty() {
            return Err(FrameError::Unavailable);
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.files.len();
        let path = &self.files[idx];
        debug!(path = %path.display(), "Capturing frame");
        encode_jpeg(&load_image(path)?, self.quality)
    }
}

/// Producer half of a [`LatestFrameSlot`].
#[derive(Clone)]
pub struct FramePublisher {
    tx: watch::Sender<Option<Frame>>,
    quality: u8,
}

impl FramePublisher {
    /// Replace the current frame.
    pub fn publish(&self, frame: Frame) {
        self.tx.send_replace(Some(frame));
    }

    pub fn publish_image(&self, img: &DynamicImage) -> FrameResult<()> {
        self.publish(encode_jpeg(img, self.quality)?);
        Ok(())
    }

    /// Mark the source as not ready (e.g. camera lost).
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }
}

/// Holds only the newest frame pushed by an external producer.
///
/// Capture never blocks: it returns whatever frame is current, or
/// `Unavailable` before the first one arrives.
pub struct LatestFrameSlot {
    rx: watch::Receiver<Option<Frame>>,
}

impl LatestFrameSlot {
    pub fn new(quality: u8) -> (FramePublisher, Self) {
        let (tx, rx) = watch::channel(None);
        (FramePublisher { tx, quality }, Self { rx })
    }
}

impl FrameSource for LatestFrameSlot {
    fn capture(&self) -> FrameResult<Frame> {
        self.rx.borrow().clone().ok_or(FrameError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(w: u32, h: u32, v: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([v, v, v])))
    }

    #[test]
    fn test_encode_keeps_native_size() {
        let frame = encode_jpeg(&solid(64, 48, 100), 90).unwrap();
        assert_eq!((frame.width, frame.height), (64, 48));
        // JPEG SOI marker
        assert_eq!(&frame.jpeg()[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_zero_sized_image_is_unavailable() {
        let err = encode_jpeg(&DynamicImage::new_rgb8(0, 0), 90).unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_slot_unavailable_until_published() {
        let (publisher, slot) = LatestFrameSlot::new(90);
        assert!(slot.capture().unwrap_err().is_unavailable());

        publisher.publish_image(&solid(8, 8, 10)).unwrap();
        assert_eq!(slot.capture().unwrap().width, 8);

        publisher.publish_image(&solid(16, 8, 10)).unwrap();
        assert_eq!(slot.capture().unwrap().width, 16);

        publisher.clear();
        assert!(slot.capture().unwrap_err().is_unavailable());
    }

    #[test]
    fn test_directory_source_cycles_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        solid(10, 10, 0).save(dir.path().join("b.png")).unwrap();
        solid(20, 10, 0).save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let source = DirectorySource::open(dir.path(), 90).unwrap();
        assert_eq!(source.len(), 2);
        let widths: Vec<_> = (0..3).map(|_| source.capture().unwrap().width).collect();
        assert_eq!(widths, vec![20, 10, 20]);
    }

    #[test]
    fn test_empty_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::open(dir.path(), 90).unwrap();
        assert!(source.capture().unwrap_err().is_unavailable());
    }

    #[test]
    fn test_still_image_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        solid(32, 24, 200).save(&path).unwrap();

        let source = StillImageSource::open(&path, 80).unwrap();
        let a = source.capture().unwrap();
        let b = source.capture().unwrap();
        assert_eq!(a.jpeg(), b.jpeg());
        assert_eq!((a.width, a.height), (32, 24));
    }
}
