use std::path::Path;

use config_file::FromConfigFile;
use serde::Deserialize;

use crate::bounds::Bounds;
use crate::color::{Color, ColorSpace, Variance};
use crate::effects::lightning::LightningConfig;
use crate::grid::{Grid, Jitter};

/// Everything tunable about the cloud. Every field has a default, so an
/// empty file is a valid configuration. Colors, variance and flash
/// brightness default to values on the scale of the configured color space.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "ConfigFile")]
pub struct Config {
    pub color_space: ColorSpace,
    /// Background colors in cycle order. The first one is shown at startup.
    pub palette: Vec<Color>,
    pub variance: Variance,
    pub jitter: Jitter,
    pub lightning: LightningConfig,
    /// Custom LED layout, rows of strip indices. Defaults to the cloud.
    pub layout: Option<Vec<Vec<usize>>>,
    pub tick_ms: u64,
    pub indicator_active: Color,
    pub indicator_idle: Color,
}

/// The file as written. Keys whose default depends on `color_space` stay
/// unset until the space is known.
#[derive(Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    color_space: ColorSpace,
    palette: Option<Vec<Color>>,
    variance: VarianceFile,
    jitter: Jitter,
    lightning: LightningFile,
    layout: Option<Vec<Vec<usize>>>,
    tick_ms: Option<u64>,
    indicator_active: Option<Color>,
    indicator_idle: Option<Color>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct VarianceFile {
    range: Option<Bounds<f32>>,
    darken_damping: Option<f32>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct LightningFile {
    brightness: Option<Bounds<f32>>,
    #[serde(flatten)]
    rest: LightningConfig,
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        let defaults = Config::for_space(file.color_space);
        Config {
            color_space: file.color_space,
            palette: file.palette.unwrap_or(defaults.palette),
            variance: Variance {
                range: file.variance.range.unwrap_or(defaults.variance.range),
                darken_damping: file
                    .variance
                    .darken_damping
                    .unwrap_or(defaults.variance.darken_damping),
            },
            jitter: file.jitter,
            lightning: LightningConfig {
                brightness: file
                    .lightning
                    .brightness
                    .unwrap_or(defaults.lightning.brightness),
                ..file.lightning.rest
            },
            layout: file.layout,
            tick_ms: file.tick_ms.unwrap_or(defaults.tick_ms),
            indicator_active: file.indicator_active.unwrap_or(defaults.indicator_active),
            indicator_idle: file.indicator_idle.unwrap_or(defaults.indicator_idle),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::for_space(ColorSpace::default())
    }
}

impl Config {
    pub fn for_space(space: ColorSpace) -> Config {
        let (palette, indicator_active, indicator_idle) = match space {
            ColorSpace::Rgb => (
                vec![
                    Color::rgb(0, 0, 0),
                    Color::rgb(48, 0, 96),
                    Color::rgb(8, 16, 72),
                    Color::rgb(120, 36, 0),
                    Color::rgb(0, 64, 16),
                ],
                Color::rgb(0, 0, 64),
                Color::rgb(0, 16, 0),
            ),
            ColorSpace::Hsv => (
                vec![
                    Color::hsv(0.0, 0.0, 0.0),
                    Color::hsv(275.0, 100.0, 35.0),
                    Color::hsv(225.0, 90.0, 25.0),
                    Color::hsv(25.0, 100.0, 45.0),
                    Color::hsv(135.0, 100.0, 25.0),
                ],
                Color::hsv(240.0, 100.0, 25.0),
                Color::hsv(120.0, 100.0, 6.0),
            ),
        };

        Config {
            color_space: space,
            palette,
            variance: Variance::for_space(space),
            jitter: Jitter::default(),
            lightning: LightningConfig::for_space(space),
            layout: None,
            tick_ms: 10,
            indicator_active,
            indicator_idle,
        }
    }

    pub fn load(path: &Path) -> Result<Config, String> {
        let config = match Config::from_config_file(path) {
            Ok(config) => config,
            Err(err) => return Err(format!("Cannot read {}: {}", path.display(), err)),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.palette.is_empty() {
            return Err("palette must contain at least one color".to_string());
        }

        let colors = self
            .palette
            .iter()
            .chain([&self.indicator_active, &self.indicator_idle]);
        for color in colors {
            if color.space() != self.color_space {
                return Err(format!(
                    "{:?} is not in the configured color space {:?}",
                    color, self.color_space
                ));
            }
            if !color.is_in_domain() {
                return Err(format!("{:?} is out of range", color));
            }
        }

        if !self.variance.range.is_ordered() || self.variance.range.min < 0.0 {
            return Err("variance.range must satisfy 0 <= min <= max".to_string());
        }
        if !(0.0..=1.0).contains(&self.variance.darken_damping) {
            return Err("variance.darken_damping must be within 0..=1".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter.keep_threshold) {
            return Err("jitter.keep_threshold must be within 0..=1".to_string());
        }
        if !(1..=100).contains(&self.tick_ms) {
            return Err("tick_ms must be within 1..=100".to_string());
        }

        let brightness = self.lightning.brightness;
        let ceiling = self.color_space.brightness_max();
        if brightness.min < 0.0 || brightness.max > ceiling {
            return Err(format!(
                "lightning.brightness must be within 0..={} for {:?}",
                ceiling, self.color_space
            ));
        }

        self.lightning.validate()?;
        self.grid()?;
        Ok(())
    }

    pub fn grid(&self) -> Result<Grid, String> {
        match &self.layout {
            Some(rows) => Grid::new(rows.clone()),
            None => Ok(Grid::cloud()),
        }
    }
}
