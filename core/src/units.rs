/*!
# Units Module

Parsing and conversion of user-supplied magnitudes.

Storage sizes are normalized to binary gigabytes (GiB) and durations to
minutes. Both grammars are case-insensitive:

- storage: `<number>[k|m|g|t|p][i][b]`, unit optional (defaults to GiB).
  Decimal prefixes are converted through bytes, so `1GB` is ~0.9313 GiB,
  while binary prefixes scale by exact powers of 1024.
- duration: `<number>[d|h|m|s]`, unit optional (defaults to minutes).

The reverse direction, [`TimeSpan`], promotes a minute count into hours
or days for presentation.
*/

use crate::error::{CrystalBallError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

const STORAGE_PATTERN: &str = r"(?i)^(\d+(?:\.\d+)?)(?:([kmgtp])(i)?b?)?$";
const DURATION_PATTERN: &str = r"(?i)^(\d+(?:\.\d+)?)([dhms])?$";

const BYTES_PER_GIB: f64 = 1_073_741_824.0;

/// Threshold above which a minute or hour count is promoted to the next unit
const PROMOTION_THRESHOLD: f64 = 100.0;

/// A parsed magnitude together with the unit it was given in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity<U> {
    pub magnitude: f64,
    pub unit: U,
}

/// Storage units accepted on input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageUnit {
    Kilo,
    Mega,
    Giga,
    Tera,
    Peta,
    Kibi,
    Mebi,
    Gibi,
    Tebi,
    Pebi,
}

impl StorageUnit {
    fn from_prefix(prefix: char, binary: bool) -> Option<Self> {
        let unit = match (prefix.to_ascii_lowercase(), binary) {
            ('k', false) => Self::Kilo,
            ('m', false) => Self::Mega,
            ('g', false) => Self::Giga,
            ('t', false) => Self::Tera,
            ('p', false) => Self::Peta,
            ('k', true) => Self::Kibi,
            ('m', true) => Self::Mebi,
            ('g', true) => Self::Gibi,
            ('t', true) => Self::Tebi,
            ('p', true) => Self::Pebi,
            _ => return None,
        };
        Some(unit)
    }

    /// Number of bytes in one unit
    pub fn bytes(self) -> f64 {
        match self {
            Self::Kilo => 1e3,
            Self::Mega => 1e6,
            Self::Giga => 1e9,
            Self::Tera => 1e12,
            Self::Peta => 1e15,
            Self::Kibi => 1024.0,
            Self::Mebi => 1024.0_f64.powi(2),
            Self::Gibi => 1024.0_f64.powi(3),
            Self::Tebi => 1024.0_f64.powi(4),
            Self::Pebi => 1024.0_f64.powi(5),
        }
    }

    /// Convert a magnitude in this unit to GiB
    pub fn to_gib(self, magnitude: f64) -> f64 {
        magnitude * self.bytes() / BYTES_PER_GIB
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Kilo => "KB",
            Self::Mega => "MB",
            Self::Giga => "GB",
            Self::Tera => "TB",
            Self::Peta => "PB",
            Self::Kibi => "KiB",
            Self::Mebi => "MiB",
            Self::Gibi => "GiB",
            Self::Tebi => "TiB",
            Self::Pebi => "PiB",
        }
    }
}

impl fmt::Display for StorageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Duration units accepted on input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl DurationUnit {
    /// Convert a magnitude in this unit to minutes
    pub fn to_minutes(self, magnitude: f64) -> f64 {
        match self {
            Self::Days => magnitude * 1440.0,
            Self::Hours => magnitude * 60.0,
            Self::Minutes => magnitude,
            Self::Seconds => magnitude / 60.0,
        }
    }
}

/// Strip whitespace, so `10 GB` and `10GB` parse alike
fn compact(input: &str) -> String {
    input.chars().filter(|c| !c.is_whitespace()).collect()
}

fn parse_magnitude(digits: &str, input: &str, err: fn(String) -> CrystalBallError) -> Result<f64> {
    digits.parse::<f64>().map_err(|_| err(input.to_string()))
}

/// Split a storage string like `10GB` or `512MiB` into magnitude and unit
pub fn parse_storage(input: &str) -> Result<Quantity<StorageUnit>> {
    let value = compact(input);
    let pattern = Regex::new(STORAGE_PATTERN).map_err(anyhow::Error::from)?;
    let caps = pattern
        .captures(&value)
        .ok_or_else(|| CrystalBallError::InvalidStorage(input.to_string()))?;

    let magnitude = parse_magnitude(&caps[1], input, CrystalBallError::InvalidStorage)?;
    let unit = match caps.get(2) {
        Some(prefix) => {
            let prefix = prefix.as_str().chars().next().unwrap_or('g');
            StorageUnit::from_prefix(prefix, caps.get(3).is_some())
                .ok_or_else(|| CrystalBallError::InvalidStorage(input.to_string()))?
        }
        None => StorageUnit::Gibi,
    };

    Ok(Quantity { magnitude, unit })
}

/// Parse a storage string and convert it to GiB
pub fn storage_to_gib(input: &str) -> Result<f64> {
    let quantity = parse_storage(input)?;
    Ok(quantity.unit.to_gib(quantity.magnitude))
}

/// Split a duration string like `15m` or `2h` into magnitude and unit
pub fn parse_duration(input: &str) -> Result<Quantity<DurationUnit>> {
    let value = compact(input);
    let pattern = Regex::new(DURATION_PATTERN).map_err(anyhow::Error::from)?;
    let caps = pattern
        .captures(&value)
        .ok_or_else(|| CrystalBallError::InvalidDuration(input.to_string()))?;

    let magnitude = parse_magnitude(&caps[1], input, CrystalBallError::InvalidDuration)?;
    let unit = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(u) if u == "d" => DurationUnit::Days,
        Some(u) if u == "h" => DurationUnit::Hours,
        Some(u) if u == "s" => DurationUnit::Seconds,
        // An unsuffixed duration has always meant minutes
        _ => DurationUnit::Minutes,
    };

    Ok(Quantity { magnitude, unit })
}

/// Parse a duration string and convert it to minutes
pub fn duration_to_minutes(input: &str) -> Result<f64> {
    let quantity = parse_duration(input)?;
    Ok(quantity.unit.to_minutes(quantity.magnitude))
}

fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Convert a disk size reported in KiB to GiB, rounded to two decimals
pub fn kib_to_gib(size: f64) -> f64 {
    round_hundredths(size / 1_048_576.0)
}

/// Convert a memory size reported in MiB to GiB, rounded to two decimals
pub fn mib_to_gib(size: f64) -> f64 {
    round_hundredths(size / 1024.0)
}

/// Unit of a [`TimeSpan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub fn label(self) -> &'static str {
        match self {
            Self::Minutes => "min",
            Self::Hours => "h",
            Self::Days => "d",
        }
    }
}

/// A duration expressed in the largest convenient unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub value: f64,
    pub unit: TimeUnit,
}

impl TimeSpan {
    /// Express a minute count for display.
    ///
    /// Over 100 minutes becomes hours; over 100 hours becomes days. Each
    /// promotion rounds to the nearest whole unit.
    pub fn from_minutes(minutes: f64) -> Self {
        if minutes <= PROMOTION_THRESHOLD {
            return Self {
                value: minutes,
                unit: TimeUnit::Minutes,
            };
        }

        let hours = (minutes / 60.0).round();
        if hours <= PROMOTION_THRESHOLD {
            return Self {
                value: hours,
                unit: TimeUnit::Hours,
            };
        }

        Self {
            value: (hours / 24.0).round(),
            unit: TimeUnit::Days,
        }
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.fract() == 0.0 {
            write!(f, "{:.0} {}", self.value, self.unit.label())
        } else {
            write!(f, "{:.2} {}", self.value, self.unit.label())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn storage_defaults_to_gib() {
        let q = parse_storage("20").unwrap();
        assert_eq!(q.magnitude, 20.0);
        assert_eq!(q.unit, StorageUnit::Gibi);
    }

    #[test]
    fn storage_prefixes_are_case_insensitive() {
        assert_eq!(parse_storage("20GB").unwrap().unit, StorageUnit::Giga);
        assert_eq!(parse_storage("20gb").unwrap().unit, StorageUnit::Giga);
        assert_eq!(parse_storage("20g").unwrap().unit, StorageUnit::Giga);
        assert_eq!(parse_storage("20GiB").unwrap().unit, StorageUnit::Gibi);
        assert_eq!(parse_storage("20gi").unwrap().unit, StorageUnit::Gibi);
        assert_eq!(parse_storage("3 TiB").unwrap().unit, StorageUnit::Tebi);
        assert_eq!(parse_storage("512mib").unwrap().unit, StorageUnit::Mebi);
    }

    #[test]
    fn storage_rejects_malformed_units() {
        for bad in ["20iGB", "20GBt", "20GB3", "GB", "20xb", "20b", "", "-5GB"] {
            assert!(
                matches!(parse_storage(bad), Err(CrystalBallError::InvalidStorage(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn decimal_gigabyte_is_downshifted() {
        assert!((storage_to_gib("1GB").unwrap() - 0.9313).abs() < 1e-4);
        assert!(close(storage_to_gib("10GiB").unwrap(), 10.0));
        assert!(close(storage_to_gib("1TiB").unwrap(), 1024.0));
        assert!(close(storage_to_gib("1024MiB").unwrap(), 1.0));
        assert!(close(storage_to_gib("1048576KiB").unwrap(), 1.0));
        assert!(close(storage_to_gib("1PiB").unwrap(), 1_048_576.0));
    }

    #[test]
    fn duration_defaults_to_minutes() {
        let q = parse_duration("20").unwrap();
        assert_eq!(q.unit, DurationUnit::Minutes);
        assert!(close(duration_to_minutes("20").unwrap(), 20.0));
    }

    #[test]
    fn duration_conversions() {
        assert!(close(duration_to_minutes("10h").unwrap(), 600.0));
        assert!(close(duration_to_minutes("1D").unwrap(), 1440.0));
        assert!(close(duration_to_minutes("10m").unwrap(), 10.0));
        assert!(duration_to_minutes("10s").unwrap() <= 0.17);
    }

    #[test]
    fn duration_rejects_malformed_units() {
        for bad in ["20min", "20imn", "20mint", "20hs", "h", ""] {
            assert!(
                matches!(parse_duration(bad), Err(CrystalBallError::InvalidDuration(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn native_sizes_round_to_hundredths() {
        assert_eq!(mib_to_gib(1024.0), 1.0);
        assert_eq!(mib_to_gib(500_000.0), 488.28);
        assert_eq!(kib_to_gib(1_048_576.0 * 10.0), 10.0);
        assert_eq!(kib_to_gib(287_530_000.0), 274.21);
    }

    #[test]
    fn time_span_promotion_thresholds_are_exclusive() {
        assert_eq!(TimeSpan::from_minutes(100.0).unit, TimeUnit::Minutes);

        let hours = TimeSpan::from_minutes(195.0);
        assert_eq!(hours.unit, TimeUnit::Hours);
        assert_eq!(hours.value, 3.0);

        // 6000 minutes is exactly 100 hours
        assert_eq!(TimeSpan::from_minutes(6000.0).unit, TimeUnit::Hours);

        let days = TimeSpan::from_minutes(6060.0);
        assert_eq!(days.unit, TimeUnit::Days);
        assert_eq!(days.value, 4.0);
    }

    #[test]
    fn time_span_display() {
        assert_eq!(TimeSpan::from_minutes(15.0).to_string(), "15 min");
        assert_eq!(TimeSpan::from_minutes(0.5).to_string(), "0.50 min");
        assert_eq!(TimeSpan::from_minutes(195.0).to_string(), "3 h");
    }
}
