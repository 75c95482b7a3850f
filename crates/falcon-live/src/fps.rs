//! Frames-per-second measurement.

/// Counts captures between measurement ticks.
///
/// The reported value is the number of frames captured in the last window,
/// not an average, so it only makes sense with a one-second window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FpsMeter {
    frame_counter: u32,
    fps: u32,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one captured frame.
    pub fn record_frame(&mut self) {
        self.frame_counter = self.frame_counter.saturating_add(1);
    }

    /// Close the current window: publish the count and start over.
    pub fn measure(&mut self) -> u32 {
        self.fps = self.frame_counter;
        self.frame_counter = 0;
        self.fps
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
