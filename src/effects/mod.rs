pub(crate) mod lightning;

use std::time::Duration;

use rand::RngCore;

use crate::background::Background;
use crate::color::{DriverColor, Variance};
use crate::grid::Grid;
use crate::hardware::LedDriver;

/// Whether a running effect wants more ticks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Everything an effect may read or paint during one tick
pub struct Stage<'a> {
    pub driver: &'a mut dyn LedDriver,
    pub grid: &'a Grid,
    pub background: &'a Background,
    pub variance: &'a Variance,
    /// Current background color in driver units, used for flat restores
    pub restore: DriverColor,
    pub rng: &'a mut dyn RngCore,
}

pub trait LightingEffect {
    /// Moves the effect forward by `elapsed`. Waiting is expressed by
    /// returning early, never by sleeping.
    fn advance(&mut self, elapsed: Duration, stage: &mut Stage) -> Flow;
}
