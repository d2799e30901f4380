use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::bounds::Bounds;
use crate::color::{Color, ColorSpace, DriverColor};
use crate::effects::{Flow, LightingEffect, Stage};
use crate::grid::{Coord, Grid, Jitter};

/// Tunables of the lightning effect. Durations ending in `_ms` are
/// milliseconds, `lightning_delay` is seconds.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LightningConfig {
    pub prefer_localized: bool,
    /// A strike draws from `1..=full_grid_odds`; drawing `full_grid_trigger`
    /// lights the whole sky instead of a local cluster
    pub full_grid_odds: u32,
    pub full_grid_trigger: u32,
    pub flash_count: Bounds<u32>,
    pub brightness: Bounds<f32>,
    pub duration_ms: Bounds<u64>,
    pub next_delay_ms: Bounds<u64>,
    pub radius: Bounds<usize>,
    pub extra_strikes: Bounds<u32>,
    pub max_extra_distance: usize,
    pub extra_strike_delay_ms: Bounds<u64>,
    pub lightning_delay: Bounds<f32>,
}

impl Default for LightningConfig {
    fn default() -> Self {
        LightningConfig::for_space(ColorSpace::default())
    }
}

impl LightningConfig {
    /// Defaults with the flash brightness on the scale of `space`
    pub fn for_space(space: ColorSpace) -> LightningConfig {
        let brightness = match space {
            ColorSpace::Rgb => Bounds::new(180.0, 255.0),
            ColorSpace::Hsv => Bounds::new(70.0, 100.0),
        };
        LightningConfig {
            prefer_localized: true,
            full_grid_odds: 20,
            full_grid_trigger: 10,
            flash_count: Bounds::new(1, 4),
            brightness,
            duration_ms: Bounds::new(20, 80),
            next_delay_ms: Bounds::new(30, 150),
            radius: Bounds::new(0, 2),
            extra_strikes: Bounds::new(0, 3),
            max_extra_distance: 4,
            extra_strike_delay_ms: Bounds::new(50, 300),
            lightning_delay: Bounds::new(2.0, 9.0),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let ordered = [
            ("flash_count", self.flash_count.is_ordered()),
            ("brightness", self.brightness.is_ordered()),
            ("duration_ms", self.duration_ms.is_ordered()),
            ("next_delay_ms", self.next_delay_ms.is_ordered()),
            ("radius", self.radius.is_ordered()),
            ("extra_strikes", self.extra_strikes.is_ordered()),
            ("extra_strike_delay_ms", self.extra_strike_delay_ms.is_ordered()),
            ("lightning_delay", self.lightning_delay.is_ordered()),
        ];
        if let Some((name, _)) = ordered.iter().find(|(_, ok)| !ok) {
            return Err(format!("lightning.{} has min > max", name));
        }

        if self.lightning_delay.min < 0.0 {
            return Err("lightning.lightning_delay must not be negative".to_string());
        }
        if !(1..=self.full_grid_odds).contains(&self.full_grid_trigger) {
            return Err(format!(
                "lightning.full_grid_trigger {} is not within 1..={}",
                self.full_grid_trigger, self.full_grid_odds
            ));
        }
        if self.extra_strikes.max > 0 && self.max_extra_distance == 0 {
            return Err("lightning.max_extra_distance must be at least 1".to_string());
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StrikeMode {
    Localized,
    FullGrid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Running,
    Stopping,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Fill {
    Flash(DriverColor),
    Background,
    VariedBackground,
}

#[derive(Clone, Debug)]
enum Step {
    Paint {
        leds: Rc<[usize]>,
        fill: Fill,
        hold: Duration,
    },
    Pause(Duration),
}

/// Stochastic lightning over a grid of LEDs.
///
/// Each strike is planned up front as a queue of timed steps. `advance`
/// replays the queue as time passes and plans the next strike once it runs
/// dry, so the caller can stop it between any two ticks.
pub struct LightningSimulator {
    config: LightningConfig,
    jitter: Jitter,
    space: ColorSpace,
    state: State,
    plan: VecDeque<Step>,
    remaining: Duration,
    strikes: u64,
}

impl LightningSimulator {
    pub fn new(config: LightningConfig, jitter: Jitter, space: ColorSpace) -> LightningSimulator {
        LightningSimulator {
            config,
            jitter,
            space,
            state: State::Idle,
            plan: VecDeque::new(),
            remaining: Duration::ZERO,
            strikes: 0,
        }
    }

    pub fn start(&mut self) {
        self.plan.clear();
        self.remaining = Duration::ZERO;
        self.state = State::Running;
    }

    /// Stops on the next tick
    pub fn request_stop(&mut self) {
        if self.state == State::Running {
            self.state = State::Stopping;
        }
    }

    pub fn is_engaged(&self) -> bool {
        self.state != State::Idle
    }

    pub fn strikes(&self) -> u64 {
        self.strikes
    }

    fn choose_mode<R: Rng + ?Sized>(&self, rng: &mut R) -> StrikeMode {
        if !self.config.prefer_localized {
            return StrikeMode::FullGrid;
        }

        if rng.gen_range(1..=self.config.full_grid_odds) == self.config.full_grid_trigger {
            StrikeMode::FullGrid
        } else {
            StrikeMode::Localized
        }
    }

    /// Random walk of strike origins. Every extra origin moves away from its
    /// predecessor before being clamped onto the grid.
    fn origins<R: Rng + ?Sized>(&self, grid: &Grid, rng: &mut R) -> Vec<Coord> {
        let mut origins = vec![grid.random_coord(rng)];
        let reach = self.config.max_extra_distance as isize;
        if reach == 0 {
            return origins;
        }

        let extra = self.config.extra_strikes.sample(rng);
        for _ in 0..extra {
            let previous = origins[origins.len() - 1];
            let (d_row, d_col) = loop {
                let offset = (rng.gen_range(-reach..=reach), rng.gen_range(-reach..=reach));
                if offset != (0, 0) {
                    break offset;
                }
            };
            origins.push(grid.clamp(
                previous.row as isize + d_row,
                previous.col as isize + d_col,
            ));
        }
        origins
    }

    fn plan_strike(&mut self, stage: &mut Stage) {
        let mode = self.choose_mode(&mut *stage.rng);
        self.strikes += 1;

        match mode {
            StrikeMode::Localized => self.plan_localized(stage),
            StrikeMode::FullGrid => {
                let everything: Rc<[usize]> = stage.grid.all_leds().into();
                log::debug!("Strike {}: full sky", self.strikes);
                self.plan_burst(everything, &mut *stage.rng);
            }
        }

        let rest = self.config.lightning_delay.sample_secs(&mut *stage.rng);
        log::trace!("Next strike in {:?}", rest);
        self.plan.push_back(Step::Pause(rest));
    }

    fn plan_localized(&mut self, stage: &mut Stage) {
        let rng = &mut *stage.rng;
        let origins = self.origins(stage.grid, rng);
        log::debug!("Strike {}: {} origin(s)", self.strikes, origins.len());

        for (i, origin) in origins.into_iter().enumerate() {
            if i > 0 {
                let pause = self.config.extra_strike_delay_ms.sample_millis(rng);
                self.plan.push_back(Step::Pause(pause));
            }

            let radius = self.config.radius.sample(rng);
            let (min, max) = stage.grid.area_bounds(origin, radius);
            let leds = stage.grid.leds_in_area(min, max, &self.jitter, rng);
            log::debug!(
                "  origin ({}, {}) radius {}: {} LEDs",
                origin.row,
                origin.col,
                radius,
                leds.len()
            );
            self.plan_burst(leds.into(), rng);
        }
    }

    /// Flash, restore, repeat, then settle into a freshly varied background
    fn plan_burst<R: Rng + ?Sized>(&mut self, leds: Rc<[usize]>, rng: &mut R) {
        let count = self.config.flash_count.sample(rng);
        for _ in 0..count {
            let brightness = self.config.brightness.sample(rng);
            self.plan.push_back(Step::Paint {
                leds: Rc::clone(&leds),
                fill: Fill::Flash(Color::flash(self.space, brightness).to_driver_units()),
                hold: self.config.duration_ms.sample_millis(rng),
            });
            self.plan.push_back(Step::Paint {
                leds: Rc::clone(&leds),
                fill: Fill::Background,
                hold: self.config.next_delay_ms.sample_millis(rng),
            });
        }
        self.plan.push_back(Step::Paint {
            leds,
            fill: Fill::VariedBackground,
            hold: Duration::ZERO,
        });
    }

    fn execute(step: Step, stage: &mut Stage) -> Duration {
        match step {
            Step::Pause(pause) => pause,
            Step::Paint { leds, fill, hold } => {
                log::trace!("{:?} on {} LEDs for {:?}", fill, leds.len(), hold);
                match fill {
                    Fill::Flash(color) => {
                        for &led in leds.iter() {
                            stage.driver.set_pixel(led, color);
                        }
                    }
                    Fill::Background => {
                        for &led in leds.iter() {
                            stage.driver.set_pixel(led, stage.restore);
                        }
                    }
                    Fill::VariedBackground => {
                        stage
                            .background
                            .paint(&mut *stage.driver, &leds, stage.variance, &mut *stage.rng);
                    }
                }
                stage.driver.show();
                hold
            }
        }
    }

    /// Drops whatever was planned and repaints the whole strip, so no LED is
    /// left frozen mid-flash
    fn settle(&mut self, stage: &mut Stage) {
        self.plan.clear();
        self.remaining = Duration::ZERO;
        let everything = stage.grid.all_leds();
        stage
            .background
            .paint(&mut *stage.driver, &everything, stage.variance, &mut *stage.rng);
        stage.driver.show();
    }
}

impl LightingEffect for LightningSimulator {
    fn advance(&mut self, elapsed: Duration, stage: &mut Stage) -> Flow {
        match self.state {
            State::Idle => return Flow::Stop,
            State::Stopping => {
                self.settle(stage);
                self.state = State::Idle;
                log::info!("Lightning stopped after {} strike(s)", self.strikes);
                return Flow::Stop;
            }
            State::Running => {}
        }

        // Time past the end of a running step counts towards the next one
        let mut overshoot = if self.remaining.is_zero() {
            Duration::ZERO
        } else {
            elapsed.saturating_sub(self.remaining)
        };
        self.remaining = self.remaining.saturating_sub(elapsed);

        // At most one strike is planned per tick, so an all-zero timing
        // configuration cannot spin here forever
        let mut planned = false;
        while self.remaining.is_zero() {
            match self.plan.pop_front() {
                Some(step) => {
                    let hold = Self::execute(step, stage);
                    self.remaining = hold.saturating_sub(overshoot);
                    overshoot = overshoot.saturating_sub(hold);
                }
                None if planned => break,
                None => {
                    self.plan_strike(stage);
                    planned = true;
                }
            }
        }

        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::background::Background;
    use crate::color::Variance;
    use crate::hardware::testing::RecordingStrip;

    const BACKGROUND: Color = Color::rgb(40, 0, 60);

    struct Rig {
        strip: RecordingStrip,
        grid: Grid,
        background: Background,
        variance: Variance,
        rng: StdRng,
    }

    impl Rig {
        fn new(seed: u64) -> Rig {
            Rig {
                strip: RecordingStrip::new(50),
                grid: Grid::cloud(),
                background: Background::new(vec![BACKGROUND]).unwrap(),
                variance: Variance::default(),
                rng: StdRng::seed_from_u64(seed),
            }
        }

        fn advance(&mut self, lightning: &mut LightningSimulator, elapsed: Duration) -> Flow {
            let mut stage = Stage {
                driver: &mut self.strip,
                grid: &self.grid,
                background: &self.background,
                variance: &self.variance,
                restore: BACKGROUND.to_driver_units(),
                rng: &mut self.rng,
            };
            lightning.advance(elapsed, &mut stage)
        }
    }

    fn single_full_flash() -> LightningConfig {
        LightningConfig {
            prefer_localized: false,
            flash_count: Bounds::new(1, 1),
            brightness: Bounds::new(200.0, 200.0),
            duration_ms: Bounds::new(50, 50),
            next_delay_ms: Bounds::new(100, 100),
            lightning_delay: Bounds::new(3.0, 3.0),
            ..LightningConfig::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(LightningConfig::default().validate(), Ok(()));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let inverted = LightningConfig {
            radius: Bounds::new(3, 1),
            ..LightningConfig::default()
        };
        assert!(inverted.validate().unwrap_err().contains("radius"));

        let trigger = LightningConfig {
            full_grid_trigger: 21,
            ..LightningConfig::default()
        };
        assert!(trigger.validate().is_err());

        let stuck = LightningConfig {
            max_extra_distance: 0,
            ..LightningConfig::default()
        };
        assert!(stuck.validate().is_err());
    }

    #[test]
    fn full_grid_flash_then_restore() {
        let mut rig = Rig::new(1);
        let mut lightning =
            LightningSimulator::new(single_full_flash(), Jitter::default(), ColorSpace::Rgb);
        lightning.start();

        assert_eq!(rig.advance(&mut lightning, Duration::ZERO), Flow::Continue);
        assert_eq!(rig.strip.frames.len(), 1);
        let flash = Some(DriverColor::Rgb([200, 200, 200]));
        assert!(rig.strip.frames[0].iter().all(|p| *p == flash));

        // Still holding the flash
        rig.advance(&mut lightning, Duration::from_millis(40));
        assert_eq!(rig.strip.frames.len(), 1);

        rig.advance(&mut lightning, Duration::from_millis(10));
        assert_eq!(rig.strip.frames.len(), 2);
        let restore = Some(BACKGROUND.to_driver_units());
        assert!(rig.strip.frames[1].iter().all(|p| *p == restore));

        // After the delay the flashed area settles into a varied background
        rig.advance(&mut lightning, Duration::from_millis(100));
        assert_eq!(rig.strip.frames.len(), 3);
        assert!(rig.strip.frames[2].iter().all(|p| *p != flash));
        assert_eq!(
            rig.strip.frames.iter().filter(|f| f.contains(&flash)).count(),
            1
        );

        // Then nothing happens until the inter-strike delay is over
        rig.advance(&mut lightning, Duration::from_millis(2_900));
        assert_eq!(rig.strip.frames.len(), 3);
        rig.advance(&mut lightning, Duration::from_millis(100));
        assert_eq!(rig.strip.frames.len(), 4);
        assert_eq!(lightning.strikes(), 2);
    }

    #[test]
    fn localized_strikes_stay_local() {
        let mut rig = Rig::new(7);
        let config = LightningConfig {
            full_grid_odds: 1_000_000,
            full_grid_trigger: 1,
            radius: Bounds::new(0, 0),
            extra_strikes: Bounds::new(0, 0),
            flash_count: Bounds::new(1, 1),
            brightness: Bounds::new(255.0, 255.0),
            ..LightningConfig::default()
        };
        let mut lightning = LightningSimulator::new(config, Jitter::default(), ColorSpace::Rgb);
        lightning.start();

        rig.advance(&mut lightning, Duration::ZERO);
        let flash = Some(DriverColor::Rgb([255, 255, 255]));
        let lit = rig.strip.frames[0].iter().filter(|p| **p == flash).count();
        assert_eq!(lit, 1);
    }

    /// Ticks `lightning` with a fixed period and returns the times, in
    /// milliseconds, at which a frame was shown
    fn show_times(
        rig: &mut Rig,
        lightning: &mut LightningSimulator,
        period_ms: u64,
        ticks: u64,
    ) -> Vec<u64> {
        let mut times = vec![];
        for tick in 0..ticks {
            let elapsed = if tick == 0 { 0 } else { period_ms };
            let before = rig.strip.frames.len();
            rig.advance(lightning, Duration::from_millis(elapsed));
            let shown = rig.strip.frames.len() - before;
            assert!(shown <= 1, "{} frames in one tick", shown);
            if shown == 1 {
                times.push(tick * period_ms);
            }
        }
        times
    }

    #[test]
    fn extra_origins_flash_one_after_another() {
        let mut rig = Rig::new(19);
        let config = LightningConfig {
            full_grid_odds: 1_000_000,
            full_grid_trigger: 1,
            radius: Bounds::new(0, 0),
            extra_strikes: Bounds::new(2, 2),
            flash_count: Bounds::new(1, 1),
            brightness: Bounds::new(255.0, 255.0),
            duration_ms: Bounds::new(20, 20),
            next_delay_ms: Bounds::new(30, 30),
            extra_strike_delay_ms: Bounds::new(50, 50),
            lightning_delay: Bounds::new(3.0, 3.0),
            ..LightningConfig::default()
        };
        let mut lightning = LightningSimulator::new(config, Jitter::default(), ColorSpace::Rgb);
        lightning.start();

        // Per origin: flash, restore after 20 ms, varied background 30 ms
        // later, then 50 ms until the next origin flashes
        let times = show_times(&mut rig, &mut lightning, 10, 40);
        assert_eq!(times, vec![0, 20, 50, 100, 120, 150, 200, 220, 250]);
        assert_eq!(lightning.strikes(), 1);

        let flash = Some(DriverColor::Rgb([255, 255, 255]));
        let restore = Some(BACKGROUND.to_driver_units());
        let frames = &rig.strip.frames;
        for burst in frames.chunks(3) {
            let lit: Vec<usize> = (0..50).filter(|&led| burst[0][led] == flash).collect();
            assert_eq!(lit.len(), 1, "{:?}", lit);
            let led = lit[0];

            assert_eq!(burst[1][led], restore);
            assert!(burst[1].iter().all(|p| *p != flash));

            // The varied reset only touches the LED that flashed
            for other in (0..50).filter(|&other| other != led) {
                assert_eq!(burst[2][other], burst[1][other]);
            }
            assert!(burst[2][led].is_some() && burst[2][led] != flash);
        }
    }

    #[test]
    fn tick_overshoot_carries_into_the_next_step() {
        let mut rig = Rig::new(23);
        let config = LightningConfig {
            flash_count: Bounds::new(3, 3),
            duration_ms: Bounds::new(20, 20),
            next_delay_ms: Bounds::new(20, 20),
            ..single_full_flash()
        };
        let mut lightning = LightningSimulator::new(config, Jitter::default(), ColorSpace::Rgb);
        lightning.start();

        // Steps are due at 0, 20, 40, 60, 80, 100 and 120 ms. With 15 ms
        // ticks each shows on the first tick at or after its due time.
        let times = show_times(&mut rig, &mut lightning, 15, 10);
        assert_eq!(times, vec![0, 30, 45, 60, 90, 105, 120]);
    }

    #[test]
    fn hsv_defaults_stay_on_the_value_scale() {
        let config = LightningConfig::for_space(ColorSpace::Hsv);
        assert_eq!(config.brightness, Bounds::new(70.0, 100.0));
        assert_eq!(
            LightningConfig::default().brightness,
            Bounds::new(180.0, 255.0)
        );
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn extra_origins_move_and_stay_on_grid() {
        let grid = Grid::cloud();
        let mut rng = StdRng::seed_from_u64(31);
        let config = LightningConfig {
            extra_strikes: Bounds::new(3, 3),
            max_extra_distance: 2,
            ..LightningConfig::default()
        };
        let lightning = LightningSimulator::new(config, Jitter::default(), ColorSpace::Rgb);

        for _ in 0..200 {
            let origins = lightning.origins(&grid, &mut rng);
            assert_eq!(origins.len(), 4);
            for pair in origins.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                assert!(grid.led_at(b).is_some());
                assert!(a.row.abs_diff(b.row) <= 2);
                assert!(a.col.abs_diff(b.col) <= 2);
            }
        }
    }

    #[test]
    fn mode_selection_follows_the_trigger() {
        let mut rng = StdRng::seed_from_u64(3);
        let full_only = LightningSimulator::new(
            LightningConfig {
                prefer_localized: false,
                ..LightningConfig::default()
            },
            Jitter::default(),
            ColorSpace::Rgb,
        );
        assert!((0..100).all(|_| full_only.choose_mode(&mut rng) == StrikeMode::FullGrid));

        let always_trigger = LightningSimulator::new(
            LightningConfig {
                full_grid_odds: 1,
                full_grid_trigger: 1,
                ..LightningConfig::default()
            },
            Jitter::default(),
            ColorSpace::Rgb,
        );
        assert_eq!(always_trigger.choose_mode(&mut rng), StrikeMode::FullGrid);

        let default = LightningSimulator::new(
            LightningConfig::default(),
            Jitter::default(),
            ColorSpace::Rgb,
        );
        let full = (0..20_000)
            .filter(|_| default.choose_mode(&mut rng) == StrikeMode::FullGrid)
            .count();
        // One in twenty, give or take
        assert!((700..1300).contains(&full), "{} full-grid strikes", full);
    }

    #[test]
    fn stop_settles_the_strip_on_the_next_tick() {
        let mut rig = Rig::new(11);
        let mut lightning =
            LightningSimulator::new(single_full_flash(), Jitter::default(), ColorSpace::Rgb);
        lightning.start();
        rig.advance(&mut lightning, Duration::ZERO);
        assert!(lightning.is_engaged());

        lightning.request_stop();
        assert_eq!(
            rig.advance(&mut lightning, Duration::from_millis(10)),
            Flow::Stop
        );
        assert!(!lightning.is_engaged());

        let flash = Some(DriverColor::Rgb([200, 200, 200]));
        let last = rig.strip.frames.last().unwrap();
        assert!(last.iter().all(|p| p.is_some() && *p != flash));

        let frames = rig.strip.frames.len();
        assert_eq!(rig.advance(&mut lightning, Duration::from_secs(10)), Flow::Stop);
        assert_eq!(rig.strip.frames.len(), frames);
    }

    #[test]
    fn zero_timings_do_not_hang() {
        let mut rig = Rig::new(13);
        let config = LightningConfig {
            duration_ms: Bounds::new(0, 0),
            next_delay_ms: Bounds::new(0, 0),
            extra_strike_delay_ms: Bounds::new(0, 0),
            lightning_delay: Bounds::new(0.0, 0.0),
            ..LightningConfig::default()
        };
        let mut lightning = LightningSimulator::new(config, Jitter::default(), ColorSpace::Rgb);
        lightning.start();
        for _ in 0..10 {
            assert_eq!(rig.advance(&mut lightning, Duration::ZERO), Flow::Continue);
        }
        assert_eq!(lightning.strikes(), 10);
    }

    #[test]
    fn hsv_flashes_use_the_value_channel() {
        let mut rig = Rig::new(17);
        let mut lightning = LightningSimulator::new(
            LightningConfig {
                brightness: Bounds::new(80.0, 80.0),
                ..single_full_flash()
            },
            Jitter::default(),
            ColorSpace::Hsv,
        );
        lightning.start();
        rig.advance(&mut lightning, Duration::ZERO);
        let flash = Some(DriverColor::Hsv([0.0, 0.0, 0.8]));
        assert!(rig.strip.frames[0].iter().all(|p| *p == flash));
    }
}
