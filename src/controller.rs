use std::time::Duration;

use rand::RngCore;

use crate::background::Background;
use crate::color::{Color, ColorSpace, DriverColor, Variance};
use crate::config::Config;
use crate::effects::lightning::LightningSimulator;
use crate::effects::{Flow, LightingEffect, Stage};
use crate::grid::Grid;
use crate::hardware::{Button, InputSource, LedDriver, StatusIndicator};

/// Top-level state machine of the cloud.
///
/// Owns the strip and the buttons. `tick` is called by the main loop; a
/// rising edge on the background button cycles the palette, one on the
/// lightning button starts or stops the storm.
pub struct EffectController<D: LedDriver, I: InputSource, R: RngCore> {
    driver: D,
    input: I,
    indicator: Box<dyn StatusIndicator>,
    rng: R,

    grid: Grid,
    space: ColorSpace,
    background: Background,
    variance: Variance,
    lightning: LightningSimulator,

    driver_palette: Vec<DriverColor>,
    indicator_active: DriverColor,
    indicator_idle: DriverColor,

    active: bool,
    background_was_pressed: bool,
    lightning_was_pressed: bool,
}

impl<D: LedDriver, I: InputSource, R: RngCore> EffectController<D, I, R> {
    pub fn new(
        config: &Config,
        driver: D,
        input: I,
        indicator: Box<dyn StatusIndicator>,
        rng: R,
    ) -> Result<Self, String> {
        config.validate()?;
        let grid = config.grid()?;
        if driver.led_count() < grid.led_count() {
            return Err(format!(
                "The grid maps {} LEDs but the strip only has {}",
                grid.led_count(),
                driver.led_count()
            ));
        }

        let background = Background::new(config.palette.clone())?;
        let driver_palette = background
            .palette()
            .iter()
            .map(|color| color.to_driver_units())
            .collect();

        Ok(EffectController {
            driver,
            input,
            indicator,
            rng,
            grid,
            space: config.color_space,
            background,
            variance: config.variance,
            lightning: LightningSimulator::new(
                config.lightning.clone(),
                config.jitter,
                config.color_space,
            ),
            driver_palette,
            indicator_active: config.indicator_active.to_driver_units(),
            indicator_idle: config.indicator_idle.to_driver_units(),
            active: false,
            background_was_pressed: false,
            lightning_was_pressed: false,
        })
    }

    /// Starts the strip dark
    pub fn startup(&mut self) {
        self.driver.start();
        let blank = Color::blank(self.space).to_driver_units();
        for led in 0..self.driver.led_count() {
            self.driver.set_pixel(led, blank);
        }
        self.driver.show();
        self.indicator.set(self.indicator_idle);

        log::info!(
            "Cloud started: {} LEDs in {} rows of up to {}, {} background colors",
            self.grid.led_count(),
            self.grid.row_count(),
            self.grid.max_row_len(),
            self.driver_palette.len()
        );
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn background_index(&self) -> usize {
        self.background.index()
    }

    pub fn cycle_background(&mut self) {
        if self.active {
            log::info!("Lightning owns the strip, not changing the background");
            return;
        }

        let color = self.background.cycle();
        log::info!(
            "Background {} of {}: {:?}",
            self.background_index() + 1,
            self.background.palette().len(),
            color
        );

        let everything = self.grid.all_leds();
        self.background
            .paint(&mut self.driver, &everything, &self.variance, &mut self.rng);
        self.driver.show();
    }

    pub fn toggle_lightning(&mut self) {
        if self.active {
            log::info!("Stopping lightning");
            self.active = false;
            self.lightning.request_stop();
            self.indicator.set(self.indicator_idle);
        } else {
            log::info!("Starting lightning");
            self.active = true;
            self.lightning.start();
            self.indicator.set(self.indicator_active);
        }
    }

    /// Polls the buttons, then lets the lightning run for `elapsed`
    pub fn tick(&mut self, elapsed: Duration) {
        self.input.poll();

        let background = self.input.is_pressed(Button::Background);
        if background && !self.background_was_pressed {
            self.cycle_background();
        }
        self.background_was_pressed = background;

        let lightning = self.input.is_pressed(Button::Lightning);
        if lightning && !self.lightning_was_pressed {
            self.toggle_lightning();
        }
        self.lightning_was_pressed = lightning;

        if !self.lightning.is_engaged() {
            return;
        }

        let restore = self.driver_palette[self.background.index()];
        let mut stage = Stage {
            driver: &mut self.driver,
            grid: &self.grid,
            background: &self.background,
            variance: &self.variance,
            restore,
            rng: &mut self.rng,
        };
        if self.lightning.advance(elapsed, &mut stage) == Flow::Stop {
            self.active = false;
        }
    }

    /// Leaves the strip and the indicator dark
    pub fn shutdown(&mut self) {
        if self.active {
            self.active = false;
            self.lightning.request_stop();
        }

        let blank = Color::blank(self.space).to_driver_units();
        for led in 0..self.driver.led_count() {
            self.driver.set_pixel(led, blank);
        }
        self.driver.show();
        self.indicator.set(blank);
        log::info!("Cloud is dark after {} strike(s)", self.lightning.strikes());
    }

    #[cfg(test)]
    pub(crate) fn driver(&self) -> &D {
        &self.driver
    }
}
