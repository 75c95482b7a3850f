//! Overlay renderer.

use std::sync::Arc;

use falcon_models::{ClassCatalog, Color, Detection, DetectionBatch};

use crate::display::{DrawOp, Overlay, RectF};
use crate::measure::{FixedAdvance, TextMeasure};

/// Label geometry, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelStyle {
    pub font_px: f32,
    pub text_height: f32,
    pub padding: f32,
    pub line_width: f32,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            font_px: 18.0,
            text_height: 24.0,
            padding: 8.0,
            line_width: 4.0,
        }
    }
}

/// Label text: emoji, spaced class name and confidence to one decimal.
pub fn label_for(detection: &Detection) -> String {
    format!(
        "{} {} {:.1}%",
        ClassCatalog::emoji(&detection.class_label),
        detection.class_label.replace('_', " "),
        detection.confidence * 100.0
    )
}

/// Draws detection boxes and labels.
#[derive(Clone)]
pub struct OverlayRenderer {
    measure: Arc<dyn TextMeasure>,
    style: LabelStyle,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(Arc::new(FixedAdvance::default()))
    }
}

impl OverlayRenderer {
    pub fn new(measure: Arc<dyn TextMeasure>) -> Self {
        Self {
            measure,
            style: LabelStyle::default(),
        }
    }

    pub fn with_style(mut self, style: LabelStyle) -> Self {
        self.style = style;
        self
    }

    pub fn style(&self) -> &LabelStyle {
        &self.style
    }

    /// Render a batch onto a surface of the video's native size.
    ///
    /// The surface is cleared first; boxes are drawn in batch order with no
    /// z-sorting. Label backgrounds sit directly above each box and are not
    /// clamped to the surface, so boxes touching the top edge get a label
    /// that is partly or fully off-canvas.
    pub fn render(&self, batch: &DetectionBatch, target_width: u32, target_height: u32) -> Overlay {
        let mut ops = Vec::with_capacity(1 + batch.len() * 3);
        ops.push(DrawOp::Clear);

        for detection in batch {
            self.draw_detection(detection, &mut ops);
        }

        Overlay {
            width: target_width,
            height: target_height,
            ops,
        }
    }

    fn draw_detection(&self, detection: &Detection, ops: &mut Vec<DrawOp>) {
        let s = &self.style;
        let color = ClassCatalog::color_for(detection.class_id);
        let bbox = &detection.bbox;
        let (x1, y1) = (bbox.x1 as f32, bbox.y1 as f32);

        ops.push(DrawOp::StrokeRect {
            rect: RectF::new(x1, y1, bbox.width() as f32, bbox.height() as f32),
            color,
            line_width: s.line_width,
        });

        let label = label_for(detection);
        let text_width = self.measure.text_width(&label, s.font_px);
        let label_top = y1 - s.text_height - s.padding;

        ops.push(DrawOp::FillRect {
            rect: RectF::new(
                x1,
                label_top,
                text_width + s.padding * 2.0,
                s.text_height + s.padding,
            ),
            color,
        });

        ops.push(DrawOp::FillText {
            x: x1 + s.padding,
            y: label_top + 4.0,
            text: label,
            color: Color::WHITE,
            size_px: s.font_px,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use falcon_models::{BoundingBox, SafetyClass};

    fn det(label: &str, class_id: i64, confidence: f64, bbox: BoundingBox) -> Detection {
        Detection::new(label, class_id, confidence, bbox)
    }

    fn sample_batch() -> DetectionBatch {
        DetectionBatch::new(vec![
            det("Fire_Extinguisher", 6, 0.8734, BoundingBox::new(100.0, 120.0, 200.0, 320.0)),
            det("Oxygen_Tank", 0, 0.5, BoundingBox::new(10.0, 5.0, 60.0, 90.0)),
        ])
    }

    #[test]
    fn test_label_format() {
        let d = det("Fire_Extinguisher", 6, 0.8734, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(label_for(&d), "🧯 Fire Extinguisher 87.3%");
    }

    #[test]
    fn test_label_unknown_class() {
        let d = det("Space_Helmet", 12, 0.25, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(label_for(&d), "🎯 Space Helmet 25.0%");
    }

    #[test]
    fn test_render_is_idempotent() {
        let renderer = OverlayRenderer::default();
        let batch = sample_batch();
        assert_eq!(renderer.render(&batch, 640, 480), renderer.render(&batch, 640, 480));
    }

    #[test]
    fn test_surface_matches_native_size() {
        let overlay = OverlayRenderer::default().render(&sample_batch(), 1920, 1080);
        assert_eq!((overlay.width, overlay.height), (1920, 1080));
        assert_eq!(overlay.ops[0], DrawOp::Clear);
    }

    #[test]
    fn test_draw_order_follows_batch_order() {
        let overlay = OverlayRenderer::default().render(&sample_batch(), 640, 480);
        assert_eq!(overlay.box_count(), 2);
        let labels = overlay.labels();
        assert!(labels[0].contains("Fire Extinguisher"));
        assert!(labels[1].contains("Oxygen Tank"));
    }

    #[test]
    fn test_box_geometry_and_color() {
        let overlay = OverlayRenderer::default().render(&sample_batch(), 640, 480);
        match &overlay.ops[1] {
            DrawOp::StrokeRect { rect, color, line_width } => {
                assert_eq!(*rect, RectF::new(100.0, 120.0, 100.0, 200.0));
                assert_eq!(*color, SafetyClass::FireExtinguisher.color());
                assert_eq!(*line_width, 4.0);
            }
            other => panic!("expected stroke, got {:?}", other),
        }
    }

    #[test]
    fn test_label_background_sized_to_text_and_not_clamped() {
        let renderer = OverlayRenderer::default();
        let overlay = renderer.render(&sample_batch(), 640, 480);
        let label = label_for(&sample_batch().as_slice()[1]);
        let expected_w = FixedAdvance::default().text_width(&label, 18.0) + 16.0;

        // Second detection has y1 = 5, so its label starts above the canvas.
        match &overlay.ops[5] {
            DrawOp::FillRect { rect, .. } => {
                assert_eq!(rect.x, 10.0);
                assert_eq!(rect.y, 5.0 - 24.0 - 8.0);
                assert!(rect.y < 0.0);
                assert_eq!(rect.w, expected_w);
                assert_eq!(rect.h, 32.0);
            }
            other => panic!("expected fill, got {:?}", other),
        }
        match &overlay.ops[6] {
            DrawOp::FillText { x, y, color, .. } => {
                assert_eq!(*x, 18.0);
                assert_eq!(*y, 5.0 - 32.0 + 4.0);
                assert_eq!(*color, Color::WHITE);
            }
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_class_id_wraps() {
        let batch = DetectionBatch::new(vec![det(
            "Class_9",
            9,
            0.4,
            BoundingBox::new(0.0, 40.0, 10.0, 50.0),
        )]);
        let overlay = OverlayRenderer::default().render(&batch, 100, 100);
        match &overlay.ops[1] {
            DrawOp::StrokeRect { color, .. } => assert_eq!(*color, ClassCatalog::color_for(2)),
            other => panic!("expected stroke, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_batch_only_clears() {
        let overlay = OverlayRenderer::default().render(&DetectionBatch::empty(), 64, 48);
        assert_eq!(overlay, Overlay::blank(64, 48));
    }
}
