//! Simulation time.

use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Simulated time in integer nanoseconds since the start of the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);
    pub const MAX: SimTime = SimTime(u64::MAX);

    pub const fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos)
    }

    pub const fn from_micros(micros: u64) -> Self {
        SimTime(micros * 1_000)
    }

    pub const fn from_secs(secs: u64) -> Self {
        SimTime(secs * 1_000_000_000)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        SimTime((secs.max(0.0) * 1e9).round() as u64)
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1e9
    }

    pub fn saturating_sub(self, other: SimTime) -> SimTime {
        SimTime(self.0.saturating_sub(other.0))
    }

    /// Time to push `bytes` onto a link running at `bps`, rounded up to the nanosecond
    pub fn transmission(bytes: u32, bps: u64) -> SimTime {
        if bps == 0 {
            return SimTime(u64::MAX / 4);
        }
        let bits = u128::from(bytes) * 8;
        let nanos = (bits * 1_000_000_000 + (u128::from(bps) - 1)) / u128::from(bps);
        SimTime(nanos.min(u128::from(u64::MAX)) as u64)
    }
}

impl From<Duration> for SimTime {
    fn from(d: Duration) -> Self {
        SimTime(d.as_nanos().min(u128::from(u64::MAX)) as u64)
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        self.saturating_sub(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.9}", self.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transmission_time() {
        // 576 bytes at 10 Gbps is 460.8 ns, rounded up
        assert_eq!(SimTime::transmission(576, 10_000_000_000), SimTime(461));
        assert_eq!(SimTime::transmission(125, 1_000_000), SimTime::from_micros(1000));
        assert!(SimTime::transmission(1, 0) > SimTime::from_secs(1_000_000));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(SimTime::from(Duration::from_millis(1500)), SimTime(1_500_000_000));
        assert_eq!(SimTime::from_secs_f64(2.0), SimTime::from_secs(2));
        assert_eq!(SimTime::from_secs(10).as_secs_f64(), 10.0);
        assert_eq!(SimTime(5) - SimTime(9), SimTime::ZERO);
    }
}
