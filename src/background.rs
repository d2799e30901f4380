use rand::Rng;

use crate::color::{Color, Variance};
use crate::hardware::LedDriver;

/// Cyclic background palette
pub struct Background {
    palette: Vec<Color>,
    cursor: usize,
}

impl Background {
    pub fn new(palette: Vec<Color>) -> Result<Background, String> {
        if palette.is_empty() {
            return Err("Background palette is empty".to_string());
        }

        Ok(Background { palette, cursor: 0 })
    }

    pub fn cycle(&mut self) -> Color {
        self.cursor = (self.cursor + 1) % self.palette.len();
        self.current()
    }

    pub fn current(&self) -> Color {
        self.palette[self.cursor]
    }

    pub fn index(&self) -> usize {
        self.cursor
    }

    pub fn palette(&self) -> &[Color] {
        &self.palette
    }

    /// Paints every LED in `leds` with its own varied copy of the current
    /// color so the field reads as textured rather than flat
    pub fn paint<R: Rng + ?Sized>(
        &self,
        driver: &mut dyn LedDriver,
        leds: &[usize],
        variance: &Variance,
        rng: &mut R,
    ) {
        let color = self.current();
        for &led in leds {
            driver.set_pixel(led, color.apply_variance(variance, rng).to_driver_units());
        }
    }
}
