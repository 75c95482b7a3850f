//! Detection overlay rendering.
//!
//! This crate provides:
//! - `OverlayRenderer`: turns a detection batch into a display list sized to
//!   the source video's native resolution
//! - Text measuring (font-backed or fixed-advance)
//! - A rasteriser that replays display lists onto RGBA images

pub mod display;
pub mod error;
pub mod measure;
pub mod raster;
pub mod renderer;

pub use display::{DrawOp, Overlay, RectF};
pub use error::{OverlayError, OverlayResult};
pub use measure::{FixedAdvance, FontMeasure, TextMeasure};
pub use raster::Rasterizer;
pub use renderer::{label_for, LabelStyle, OverlayRenderer};
