//! Replays display lists onto RGBA images.

use ab_glyph::{FontArc, PxScale};
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use falcon_models::Color;
use tracing::debug;

use crate::display::{DrawOp, Overlay, RectF};
use crate::error::{OverlayError, OverlayResult};

fn rgba(color: Color) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, 255])
}

/// Rasterises overlays. Text is skipped when no font is loaded.
#[derive(Clone, Default)]
pub struct Rasterizer {
    font: Option<FontArc>,
}

impl Rasterizer {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    /// Draw the overlay on a transparent surface of its own size.
    pub fn rasterize(&self, overlay: &Overlay) -> RgbaImage {
        let mut img = RgbaImage::new(overlay.width, overlay.height);
        for op in &overlay.ops {
            self.apply(&mut img, op);
        }
        img
    }

    /// Draw the overlay over a video frame of the same native size.
    pub fn compose(&self, background: &RgbaImage, overlay: &Overlay) -> OverlayResult<RgbaImage> {
        if background.dimensions() != (overlay.width, overlay.height) {
            return Err(OverlayError::SizeMismatch {
                expected_w: overlay.width,
                expected_h: overlay.height,
                actual_w: background.width(),
                actual_h: background.height(),
            });
        }
        let layer = self.rasterize(overlay);
        let mut out = background.clone();
        imageops::overlay(&mut out, &layer, 0, 0);
        Ok(out)
    }

    fn apply(&self, img: &mut RgbaImage, op: &DrawOp) {
        match op {
            DrawOp::Clear => {
                for px in img.pixels_mut() {
                    *px = Rgba([0, 0, 0, 0]);
                }
            }
            DrawOp::StrokeRect {
                rect,
                color,
                line_width,
            } => stroke_rect(img, rect, rgba(*color), *line_width),
            DrawOp::FillRect { rect, color } => {
                let (x, y) = (rect.x.round() as i32, rect.y.round() as i32);
                if let Some(r) = to_rect(img.dimensions(), x, y, rect.w, rect.h) {
                    draw_filled_rect_mut(img, r, rgba(*color));
                }
            }
            DrawOp::FillText {
                x,
                y,
                text,
                color,
                size_px,
            } => match &self.font {
                Some(font) => {
                    let (x, y) = (x.round() as i32, y.round() as i32);
                    if text_may_show(img.dimensions(), x, y) {
                        draw_text_mut(img, rgba(*color), x, y, PxScale::from(*size_px), font, text);
                    }
                }
                None => debug!("No overlay font loaded, skipping label text"),
            },
        }
    }
}

/// Stroke centred on the rectangle edge, like a canvas `strokeRect`.
fn stroke_rect(img: &mut RgbaImage, rect: &RectF, color: Rgba<u8>, line_width: f32) {
    let lw = line_width.round().max(1.0) as i32;
    let half = lw / 2;
    let (x, y) = (rect.x.round() as i32, rect.y.round() as i32);

    for k in 0..lw {
        let grow = (half - k) as f32;
        let offset = k - half;
        let r = to_rect(
            img.dimensions(),
            x.saturating_add(offset),
            y.saturating_add(offset),
            rect.w + 2.0 * grow,
            rect.h + 2.0 * grow,
        );
        if let Some(r) = r {
            draw_hollow_rect_mut(img, r, color);
        }
    }
}

/// Labels anchored further left or above than this are skipped.
const MAX_TEXT_REACH: i32 = 1 << 16;

fn text_may_show((img_w, img_h): (u32, u32), x: i32, y: i32) -> bool {
    let (w, h) = (img_w.min(i32::MAX as u32) as i32, img_h.min(i32::MAX as u32) as i32);
    (-MAX_TEXT_REACH..w).contains(&x) && (-MAX_TEXT_REACH..h).contains(&y)
}

/// Integer rectangle clipped to one pixel beyond the image on each side.
///
/// Edges outside the image stay outside, so hollow rectangles never gain
/// a false edge, and far-off coordinates cannot overflow.
fn to_rect((img_w, img_h): (u32, u32), x: i32, y: i32, w: f32, h: f32) -> Option<Rect> {
    let (w, h) = (w.round(), h.round());
    if w < 1.0 || h < 1.0 {
        return None;
    }
    let (left, top) = (i64::from(x), i64::from(y));
    let right = left.saturating_add(w as i64 - 1).min(i64::from(img_w));
    let bottom = top.saturating_add(h as i64 - 1).min(i64::from(img_h));
    let (left, top) = (left.max(-1), top.max(-1));
    if left > right || top > bottom {
        return None;
    }
    Some(Rect::at(left as i32, top as i32).of_size((right - left + 1) as u32, (bottom - top + 1) as u32))
}
