//! Overlay image output.

use std::path::{Path, PathBuf};

use falcon_models::Frame;
use falcon_overlay::{Overlay, Rasterizer};
use image::{ImageFormat, RgbaImage};
use tracing::trace;

use crate::error::LiveResult;

/// Writes each new overlay as a PNG.
///
/// By default the PNG is transparent outside the boxes. With
/// [`OverlayWriter::with_background`] the overlay is drawn over the frame it
/// was rendered for. The file is replaced atomically so a viewer polling it
/// never sees a half-written image.
pub struct OverlayWriter {
    path: PathBuf,
    rasterizer: Rasterizer,
    background: bool,
}

impl OverlayWriter {
    pub fn new(path: impl Into<PathBuf>, rasterizer: Rasterizer) -> Self {
        Self {
            path: path.into(),
            rasterizer,
            background: false,
        }
    }

    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `overlay`, composited onto `frame` when backgrounds are on.
    pub fn write(&self, overlay: &Overlay, frame: Option<&Frame>) -> LiveResult<()> {
        let img = match frame.filter(|_| self.background) {
            Some(frame) => self.rasterizer.compose(&decode_frame(frame)?, overlay)?,
            None => self.rasterizer.rasterize(overlay),
        };
        let tmp = self.path.with_extension("png.tmp");
        img.save_with_format(&tmp, ImageFormat::Png)?;
        std::fs::rename(&tmp, &self.path)?;
        trace!(path = %self.path.display(), boxes = overlay.box_count(), "Overlay written");
        Ok(())
    }
}

fn decode_frame(frame: &Frame) -> LiveResult<RgbaImage> {
    Ok(image::load_from_memory_with_format(frame.jpeg(), ImageFormat::Jpeg)?.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use falcon_models::{BoundingBox, Detection, DetectionBatch};
    use falcon_overlay::OverlayRenderer;
    use image::{DynamicImage, Rgb, RgbImage};

    use crate::frame_source::encode_jpeg;

    #[test]
    fn test_writes_png_at_native_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.png");
        let batch = DetectionBatch::new(vec![Detection::new(
            "Oxygen_Tank",
            0,
            0.7,
            BoundingBox::new(5.0, 40.0, 25.0, 70.0),
        )]);
        let overlay = OverlayRenderer::default().render(&batch, 80, 90);

        let writer = OverlayWriter::new(&path, Rasterizer::default());
        tokio_test::assert_ok!(writer.write(&overlay, None));

        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (80, 90));
        assert!(!dir.path().join("overlay.png.tmp").exists());
    }

    #[test]
    fn test_background_frame_shows_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("composite.png");
        let bg = DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 90, Rgb([200, 200, 200])));
        let frame = encode_jpeg(&bg, 95).unwrap();
        let batch = DetectionBatch::new(vec![Detection::new(
            "Fire_Alarm",
            3,
            0.9,
            BoundingBox::new(10.0, 50.0, 30.0, 70.0),
        )]);
        let overlay = OverlayRenderer::default().render(&batch, 80, 90);

        let writer = OverlayWriter::new(&path, Rasterizer::default()).with_background(true);
        tokio_test::assert_ok!(writer.write(&overlay, Some(&frame)));

        let img = image::open(&path).unwrap().to_rgba8();
        let px = img.get_pixel(70, 85);
        assert_eq!(px[3], 255);
        assert!(px[0] > 180, "background pixel {:?}", px);
    }

    #[test]
    fn test_background_ignored_unless_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.png");
        let frame = encode_jpeg(&DynamicImage::new_rgb8(80, 90), 90).unwrap();
        let overlay = OverlayRenderer::default().render(&DetectionBatch::empty(), 80, 90);

        let writer = OverlayWriter::new(&path, Rasterizer::default());
        writer.write(&overlay, Some(&frame)).unwrap();
        assert_eq!(image::open(&path).unwrap().to_rgba8().get_pixel(5, 5)[3], 0);
    }
}
