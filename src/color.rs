use palette::FromColor;
use rand::Rng;
use serde::Deserialize;

use crate::bounds::Bounds;

pub const RGB_CHANNEL_MAX: f32 = 255.0;
pub const HUE_MAX: f32 = 360.0;
pub const HSV_CHANNEL_MAX: f32 = 100.0;

/// Numeric convention the LED driver is configured for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Rgb,
    Hsv,
}

impl ColorSpace {
    /// Upper end of the brightness scale: the byte range for RGB, the value
    /// channel for HSV
    pub fn brightness_max(self) -> f32 {
        match self {
            ColorSpace::Rgb => RGB_CHANNEL_MAX,
            ColorSpace::Hsv => HSV_CHANNEL_MAX,
        }
    }
}

/// Canonical color value.
///
/// RGB channels are bytes. HSV uses degrees for the hue and percent for
/// saturation and value.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Rgb { red: u8, green: u8, blue: u8 },
    Hsv { hue: f32, saturation: f32, value: f32 },
}

/// Color in the units the LED driver consumes: RGB bytes, or HSV with every
/// component as a fraction of 1.0
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DriverColor {
    Rgb([u8; 3]),
    Hsv([f32; 3]),
}

/// Brightness jitter applied to background pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Variance {
    pub range: Bounds<f32>,
    /// Scales the magnitude when the drawn sign darkens the color
    pub darken_damping: f32,
}

impl Variance {
    pub fn for_space(space: ColorSpace) -> Variance {
        let range = match space {
            ColorSpace::Rgb => Bounds::new(0.0, 20.0),
            ColorSpace::Hsv => Bounds::new(0.0, 8.0),
        };
        Variance {
            range,
            darken_damping: 0.75,
        }
    }
}

impl Default for Variance {
    fn default() -> Self {
        Variance::for_space(ColorSpace::default())
    }
}

pub fn clamp_channel(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        return min;
    }
    value.clamp(min, max)
}

fn shift_byte(channel: u8, delta: f32) -> u8 {
    clamp_channel(f32::from(channel) + delta, 0.0, RGB_CHANNEL_MAX).round() as u8
}

impl Color {
    pub const fn rgb(red: u8, green: u8, blue: u8) -> Color {
        Color::Rgb { red, green, blue }
    }

    pub fn hsv(hue: f32, saturation: f32, value: f32) -> Color {
        Color::Hsv {
            hue: clamp_channel(hue, 0.0, HUE_MAX),
            saturation: clamp_channel(saturation, 0.0, HSV_CHANNEL_MAX),
            value: clamp_channel(value, 0.0, HSV_CHANNEL_MAX),
        }
    }

    /// The "off" color of a color space
    pub fn blank(space: ColorSpace) -> Color {
        match space {
            ColorSpace::Rgb => Color::rgb(0, 0, 0),
            ColorSpace::Hsv => Color::hsv(0.0, 0.0, 0.0),
        }
    }

    /// Brightness-only, near-white color used for lightning flashes
    pub fn flash(space: ColorSpace, brightness: f32) -> Color {
        match space {
            ColorSpace::Rgb => {
                let level = clamp_channel(brightness, 0.0, RGB_CHANNEL_MAX).round() as u8;
                Color::rgb(level, level, level)
            }
            ColorSpace::Hsv => Color::hsv(0.0, 0.0, brightness),
        }
    }

    pub fn space(&self) -> ColorSpace {
        match self {
            Color::Rgb { .. } => ColorSpace::Rgb,
            Color::Hsv { .. } => ColorSpace::Hsv,
        }
    }

    pub fn is_blank(&self) -> bool {
        match *self {
            Color::Rgb { red, green, blue } => red == 0 && green == 0 && blue == 0,
            Color::Hsv {
                hue,
                saturation,
                value,
            } => hue == 0.0 && saturation == 0.0 && value == 0.0,
        }
    }

    /// True if every channel lies inside its domain
    pub fn is_in_domain(&self) -> bool {
        match *self {
            // u8 channels cannot leave 0..=255
            Color::Rgb { .. } => true,
            Color::Hsv {
                hue,
                saturation,
                value,
            } => {
                (0.0..=HUE_MAX).contains(&hue)
                    && (0.0..=HSV_CHANNEL_MAX).contains(&saturation)
                    && (0.0..=HSV_CHANNEL_MAX).contains(&value)
            }
        }
    }

    /// Adds `delta` to the brightness and clamps.
    ///
    /// HSV only touches the value channel. RGB has no dedicated brightness
    /// channel, so the delta is added to all three channels.
    pub fn shifted(self, delta: f32) -> Color {
        match self {
            Color::Rgb { red, green, blue } => Color::Rgb {
                red: shift_byte(red, delta),
                green: shift_byte(green, delta),
                blue: shift_byte(blue, delta),
            },
            Color::Hsv {
                hue,
                saturation,
                value,
            } => Color::Hsv {
                hue,
                saturation,
                value: clamp_channel(value + delta, 0.0, HSV_CHANNEL_MAX),
            },
        }
    }

    /// Randomly brightens or darkens the color.
    ///
    /// A magnitude is drawn from the variance range, then a sign. Darkening
    /// is damped so the field drifts brighter rather than muddier. The blank
    /// color stays blank.
    pub fn apply_variance<R: Rng + ?Sized>(self, variance: &Variance, rng: &mut R) -> Color {
        if self.is_blank() {
            return self;
        }

        let magnitude = variance.range.sample(rng);
        let delta = if rng.gen_bool(0.5) {
            magnitude
        } else {
            -magnitude * variance.darken_damping
        };

        self.shifted(delta)
    }

    pub fn to_driver_units(self) -> DriverColor {
        match self {
            Color::Rgb { red, green, blue } => DriverColor::Rgb([red, green, blue]),
            Color::Hsv {
                hue,
                saturation,
                value,
            } => DriverColor::Hsv([
                hue / HUE_MAX,
                saturation / HSV_CHANNEL_MAX,
                value / HSV_CHANNEL_MAX,
            ]),
        }
    }

    pub fn from_driver_units(color: DriverColor) -> Color {
        match color {
            DriverColor::Rgb([red, green, blue]) => Color::rgb(red, green, blue),
            DriverColor::Hsv([h, s, v]) => {
                Color::hsv(h * HUE_MAX, s * HSV_CHANNEL_MAX, v * HSV_CHANNEL_MAX)
            }
        }
    }
}

impl DriverColor {
    /// Resolves the color to the byte triple written onto the wire
    pub fn to_rgb8(self) -> [u8; 3] {
        match self {
            DriverColor::Rgb(rgb) => rgb,
            DriverColor::Hsv([h, s, v]) => {
                let hsv = palette::Hsv::new(h * HUE_MAX, s.clamp(0.0, 1.0), v.clamp(0.0, 1.0));
                let rgb: palette::Srgb<u8> = palette::Srgb::from_color(hsv).into_format();
                let (red, green, blue) = rgb.into_components();
                [red, green, blue]
            }
        }
    }

    pub fn to_unit_rgb(self) -> [f32; 3] {
        self.to_rgb8().map(|c| f32::from(c) / RGB_CHANNEL_MAX)
    }
}
