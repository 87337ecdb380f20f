//! Ambient light sample sources
//!
//! The light sensor driver is outside this crate; the scheduler only needs
//! something it can ask for one reading per capture. Drivers report "not
//! ready" with a negative raw value, which `SampleReading::from_raw` maps to
//! `SampleReading::NotReady`.

use rand_core::RngCore;
use rand_core::SeedableRng;
use rand_wyrand::WyRand;

/// One capture attempt from a sample source
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum SampleReading {
    Ready(u16),
    NotReady,
}

impl SampleReading {
    /// Converts a raw driver value, where negative values are the not-ready sentinel
    ///
    /// Values above `u16::MAX` saturate.
    pub fn from_raw(raw: i32) -> Self {
        if raw < 0 {
            SampleReading::NotReady
        } else {
            SampleReading::Ready(raw.min(u16::MAX as i32) as u16)
        }
    }
}

/// Source of brightness samples
pub trait SampleSource {
    fn read(&mut self) -> SampleReading;
}

/// Percentage (0-100) of reads the simulated sensor reports as not ready
const SIMULATED_NOT_READY_PERCENT: u32 = 5;

/// Pseudo-random light sensor for simulation and demos
///
/// Produces a slowly drifting brightness value and, now and then, a
/// not-ready result the way a real sensor does while converting.
/// Never produces a zero reading, since zero is the empty-slot sentinel of
/// the sample buffers.
pub struct SimulatedLightSensor {
    level: u16,
    rng: WyRand,
}

impl SimulatedLightSensor {
    pub fn new(initial_level: u16, rng_seed: u64) -> Self {
        SimulatedLightSensor {
            level: initial_level.max(1),
            rng: WyRand::seed_from_u64(rng_seed),
        }
    }
}

impl SampleSource for SimulatedLightSensor {
    fn read(&mut self) -> SampleReading {
        if self.rng.next_u32() % 100 < SIMULATED_NOT_READY_PERCENT {
            return SampleReading::NotReady;
        }
        // Drift by -8..=8 per read
        let step = (self.rng.next_u32() % 17) as i32 - 8;
        let next = (self.level as i32 + step).clamp(1, u16::MAX as i32);
        self.level = next as u16;
        SampleReading::Ready(self.level)
    }
}
