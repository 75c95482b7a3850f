//! Display list produced by the renderer.
//!
//! Rendering is pure: the same batch and target size always produce the
//! same list, which is what makes overlays comparable in tests and cheap to
//! hand across the live snapshot channel.

use falcon_models::Color;
use serde::Serialize;

/// Rectangle in surface pixels; may extend past the surface edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl RectF {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }
}

/// One drawing instruction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    Clear,
    StrokeRect {
        rect: RectF,
        color: Color,
        line_width: f32,
    },
    FillRect {
        rect: RectF,
        color: Color,
    },
    /// Text with its top-left corner at (x, y).
    FillText {
        x: f32,
        y: f32,
        text: String,
        color: Color,
        size_px: f32,
    },
}

/// A drawing surface's full content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub width: u32,
    pub height: u32,
    pub ops: Vec<DrawOp>,
}

impl Overlay {
    /// Blank surface of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: vec![DrawOp::Clear],
        }
    }

    /// Number of boxes drawn.
    pub fn box_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::StrokeRect { .. }))
            .count()
    }

    /// Label texts in draw order.
    pub fn labels(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::FillText { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}
