//! Data rate parsing utilities.
//!
//! Link speeds in scenario files are written the way people say them
//! ("10Gbps", "100Mbps", "54 Mb/s"). This module turns those strings into a
//! [`DataRate`] measured in bits per second.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Compiled pattern for data rate strings: a number followed by an optional unit
fn rate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*([kKmMgG]?)(bps|b/s|bit/s|Bps|B/s)?\s*$")
            .expect("Invalid data rate regex")
    })
}

/// A link data rate in bits per second
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataRate(u64);

impl DataRate {
    pub const fn from_bps(bps: u64) -> Self {
        DataRate(bps)
    }

    pub const fn from_mbps(mbps: u64) -> Self {
        DataRate(mbps * 1_000_000)
    }

    pub const fn from_gbps(gbps: u64) -> Self {
        DataRate(gbps * 1_000_000_000)
    }

    pub fn bps(&self) -> u64 {
        self.0
    }

    /// Parse a data rate string such as "10Gbps", "100 Mbps", "1.5Mb/s" or "8000".
    ///
    /// A bare number is interpreted as bits per second. Byte units ("Bps", "B/s")
    /// are multiplied by eight.
    pub fn parse(value: &str) -> Result<Self, String> {
        let caps = rate_pattern()
            .captures(value)
            .ok_or_else(|| format!("Invalid data rate format: {}", value))?;

        let number: f64 = caps[1]
            .parse()
            .map_err(|_| format!("Invalid data rate number: {}", value))?;
        let multiplier = match &caps[2] {
            "k" | "K" => 1e3,
            "m" | "M" => 1e6,
            "g" | "G" => 1e9,
            _ => 1.0,
        };
        let bytes = matches!(caps.get(3).map(|m| m.as_str()), Some("Bps") | Some("B/s"));
        let bps = number * multiplier * if bytes { 8.0 } else { 1.0 };

        if bps < 1.0 {
            return Err(format!("Data rate must be positive: {}", value));
        }
        Ok(DataRate(bps.round() as u64))
    }
}

impl TryFrom<String> for DataRate {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DataRate::parse(&value)
    }
}

impl From<DataRate> for String {
    fn from(rate: DataRate) -> Self {
        rate.to_string()
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bps = self.0;
        if bps % 1_000_000_000 == 0 {
            write!(f, "{}Gbps", bps / 1_000_000_000)
        } else if bps % 1_000_000 == 0 {
            write!(f, "{}Mbps", bps / 1_000_000)
        } else if bps % 1_000 == 0 {
            write!(f, "{}Kbps", bps / 1_000)
        } else {
            write!(f, "{}bps", bps)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_rate() {
        assert_eq!(DataRate::parse("10Gbps"), Ok(DataRate::from_gbps(10)));
        assert_eq!(DataRate::parse("100Mbps"), Ok(DataRate::from_mbps(100)));
        assert_eq!(DataRate::parse("100 Mbps"), Ok(DataRate::from_mbps(100)));
        assert_eq!(DataRate::parse("1.5Mb/s"), Ok(DataRate::from_bps(1_500_000)));
        assert_eq!(DataRate::parse("64kbps"), Ok(DataRate::from_bps(64_000)));
        assert_eq!(DataRate::parse("8000"), Ok(DataRate::from_bps(8000)));
        assert_eq!(DataRate::parse("1MBps"), Ok(DataRate::from_bps(8_000_000)));

        assert!(DataRate::parse("").is_err());
        assert!(DataRate::parse("fast").is_err());
        assert!(DataRate::parse("10Tbps").is_err());
        assert!(DataRate::parse("0bps").is_err());
    }

    #[test]
    fn test_display_round_trips_common_rates() {
        assert_eq!(DataRate::from_gbps(10).to_string(), "10Gbps");
        assert_eq!(DataRate::from_mbps(54).to_string(), "54Mbps");
        assert_eq!(DataRate::from_bps(1500).to_string(), "1500bps");
    }
}
