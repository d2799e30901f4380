use std::time::Duration;

use rand::distributions::uniform::SampleUniform;
use rand::Rng;
use serde::Deserialize;

/// Inclusive `min..=max` range of a tunable, sampled uniformly
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
}

impl<T> Bounds<T>
where
    T: SampleUniform + PartialOrd + Copy,
{
    pub const fn new(min: T, max: T) -> Bounds<T> {
        Bounds { min, max }
    }

    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        rng.gen_range(self.min..=self.max)
    }
}

impl Bounds<u64> {
    /// Samples a millisecond duration
    pub fn sample_millis<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(self.sample(rng))
    }
}

impl Bounds<f32> {
    /// Samples a duration given in (fractional) seconds
    pub fn sample_secs<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_secs_f32(self.sample(rng).max(0.0))
    }
}
