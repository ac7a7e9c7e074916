//! Trace gases, per-gas pollution thresholds and severity classification.
//!
//! The thresholds table is shared by ingestion (severity at insert time)
//! and by analysis endpoints, so it lives here and nowhere else.

use serde::{Deserialize, Serialize};

/// Satellite-observed trace gases ingested on the hourly cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GasType {
    #[serde(rename = "NO2")]
    No2,
    #[serde(rename = "CH2O")]
    Ch2o,
    #[serde(rename = "AI")]
    Ai,
    #[serde(rename = "PM")]
    Pm,
    #[serde(rename = "O3")]
    O3,
}

/// All gases, in ingestion order.
pub const ALL_GASES: [GasType; 5] = [
    GasType::No2,
    GasType::Ch2o,
    GasType::Ai,
    GasType::Pm,
    GasType::O3,
];

/// Band minimums for one gas. Values below `moderate` are "good".
#[derive(Debug, Clone, Copy)]
pub struct GasThresholds {
    pub moderate: f64,
    pub unhealthy: f64,
    pub very_unhealthy: f64,
    pub hazardous: f64,
}

impl GasType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GasType::No2 => "NO2",
            GasType::Ch2o => "CH2O",
            GasType::Ai => "AI",
            GasType::Pm => "PM",
            GasType::O3 => "O3",
        }
    }

    pub fn parse(s: &str) -> Option<GasType> {
        match s.trim().to_uppercase().as_str() {
            "NO2" => Some(GasType::No2),
            "CH2O" | "HCHO" => Some(GasType::Ch2o),
            "AI" => Some(GasType::Ai),
            "PM" => Some(GasType::Pm),
            "O3" => Some(GasType::O3),
            _ => None,
        }
    }

    pub fn thresholds(&self) -> GasThresholds {
        match self {
            GasType::No2 => GasThresholds {
                moderate: 5.0e15,
                unhealthy: 1.0e16,
                very_unhealthy: 2.0e16,
                hazardous: 3.0e16,
            },
            GasType::Ch2o => GasThresholds {
                moderate: 8.0e15,
                unhealthy: 1.6e16,
                very_unhealthy: 3.2e16,
                hazardous: 6.4e16,
            },
            GasType::Ai => GasThresholds {
                moderate: 1.0,
                unhealthy: 2.0,
                very_unhealthy: 4.0,
                hazardous: 7.0,
            },
            GasType::Pm => GasThresholds {
                moderate: 0.2,
                unhealthy: 0.5,
                very_unhealthy: 1.0,
                hazardous: 2.0,
            },
            GasType::O3 => GasThresholds {
                moderate: 220.0,
                unhealthy: 280.0,
                very_unhealthy: 400.0,
                hazardous: 500.0,
            },
        }
    }

    /// Physical unit of the raw pollution value for this gas.
    pub fn unit(&self) -> &'static str {
        match self {
            GasType::No2 | GasType::Ch2o => "molecules/cm²",
            GasType::Ai => "index",
            GasType::Pm => "dimensionless",
            GasType::O3 => "Dobson Units",
        }
    }
}

/// Classify a raw pollution value into (band label, severity 0..=4).
///
/// A value exactly equal to a band minimum belongs to that band.
/// NaN reads as "no_data" with severity 0.
pub fn classify_pollution_level(value: f64, gas: GasType) -> (&'static str, i64) {
    if value.is_nan() {
        return ("no_data", 0);
    }
    let t = gas.thresholds();
    if value >= t.hazardous {
        ("hazardous", 4)
    } else if value >= t.very_unhealthy {
        ("very_unhealthy", 3)
    } else if value >= t.unhealthy {
        ("unhealthy", 2)
    } else if value >= t.moderate {
        ("moderate", 1)
    } else {
        ("good", 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_moderate_is_good() {
        let (label, severity) = classify_pollution_level(1.0e15, GasType::No2);
        assert_eq!(label, "good");
        assert_eq!(severity, 0);
    }

    #[test]
    fn test_exact_band_minimum_enters_band() {
        assert_eq!(classify_pollution_level(5.0e15, GasType::No2).1, 1);
        assert_eq!(classify_pollution_level(1.0e16, GasType::No2).1, 2);
        assert_eq!(classify_pollution_level(2.0e16, GasType::No2).1, 3);
        assert_eq!(classify_pollution_level(3.0e16, GasType::No2).1, 4);
    }

    #[test]
    fn test_above_hazardous_is_severity_4() {
        assert_eq!(classify_pollution_level(9.9e17, GasType::No2).1, 4);
        assert_eq!(classify_pollution_level(700.0, GasType::O3).1, 4);
    }

    #[test]
    fn test_nan_is_no_data() {
        let (label, severity) = classify_pollution_level(f64::NAN, GasType::Pm);
        assert_eq!(label, "no_data");
        assert_eq!(severity, 0);
    }

    #[test]
    fn test_gas_roundtrip_names() {
        for gas in ALL_GASES {
            assert_eq!(GasType::parse(gas.as_str()), Some(gas));
        }
        assert_eq!(GasType::parse(" no2 "), Some(GasType::No2));
        assert_eq!(GasType::parse("XY"), None);
    }
}
