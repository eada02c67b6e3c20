//! Periodic sampling tick.
//!
//! Once per tick: advance the simulated heart rate, refresh the
//! magnetometer axes, then publish every sampled signal. A failed
//! magnetometer read keeps the previous axes and the tick still publishes.

use crate::config::{HEART_RATE_MAX, HEART_RATE_MIN};
use crate::error::SensorError;
use crate::publisher::{Publisher, Transport};
use crate::sensors::{SensorSnapshot, Signal};

/// 3-axis magnetometer driver.
pub trait Magnetometer {
    /// Read raw X/Y/Z.
    fn read_axes(&mut self) -> Result<[i16; 3], SensorError>;
}

impl<M: Magnetometer + ?Sized> Magnetometer for &mut M {
    fn read_axes(&mut self) -> Result<[i16; 3], SensorError> {
        (**self).read_axes()
    }
}

/// Next simulated heart rate: +1, wrapping into `[60, 110)`.
pub fn next_heart_rate(bpm: u8) -> u8 {
    let next = bpm.saturating_add(1);
    if (HEART_RATE_MIN..HEART_RATE_MAX).contains(&next) {
        next
    } else {
        HEART_RATE_MIN
    }
}

/// Result of one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    /// The magnetometer read failed and the cached axes were reused.
    pub stale_magneto: bool,
    /// Number of signals whose publish failed.
    pub publish_failures: usize,
}

pub struct Sampler<M> {
    magnetometer: M,
    ticks: u32,
}

impl<M: Magnetometer> Sampler<M> {
    pub fn new(magnetometer: M) -> Self {
        Self {
            magnetometer,
            ticks: 0,
        }
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Run one sampling tick against `snapshot` and publish through
    /// `publisher`. Never fails; problems are logged and reported.
    pub fn tick<T: Transport>(
        &mut self,
        snapshot: &mut SensorSnapshot,
        publisher: &mut Publisher<T>,
    ) -> TickReport {
        self.ticks = self.ticks.wrapping_add(1);

        snapshot.set_heart_rate(next_heart_rate(snapshot.heart_rate()));

        let stale_magneto = match self.magnetometer.read_axes() {
            Ok(axes) => {
                snapshot.set_magneto(axes);
                false
            }
            Err(e) => {
                warn!("magnetometer read failed, keeping last sample: {}", e);
                true
            }
        };

        let publish_failures = publisher.publish_from(snapshot, &Signal::SAMPLED);

        debug!(
            "tick {}: hr={} mag={}",
            self.ticks,
            snapshot.heart_rate(),
            snapshot.magneto()
        );

        TickReport {
            stale_magneto,
            publish_failures,
        }
    }

    pub fn magnetometer_mut(&mut self) -> &mut M {
        &mut self.magnetometer
    }
}
