use crate::color::DriverColor;

/// Addressable LED strip. Pixels keep their color until overwritten; there
/// is no read-back.
pub trait LedDriver {
    fn start(&mut self);
    fn set_pixel(&mut self, index: usize, color: DriverColor);
    /// Pushes the current frame out to the LEDs
    fn show(&mut self);
    fn led_count(&self) -> usize;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    Background,
    Lightning,
}

/// Point-in-time button reads
pub trait InputSource {
    /// Refreshes the button states
    fn poll(&mut self);
    fn is_pressed(&self, button: Button) -> bool;
}

/// Single pixel telling whether lightning is running
pub trait StatusIndicator {
    fn set(&mut self, color: DriverColor);
}

/// Indicator for setups without one
pub struct NoIndicator;

impl StatusIndicator for NoIndicator {
    fn set(&mut self, _: DriverColor) {}
}
