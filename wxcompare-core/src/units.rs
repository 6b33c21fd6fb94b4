//! Unit systems, the unit-display table and conversions.
//!
//! Providers store every magnitude in one canonical metric system
//! (°C, km/h, hPa, km, mm). Conversion to the user's display system happens
//! only when a value is formatted, so stored data is never converted twice.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::WeatherError;

const KM_PER_MILE: f64 = 1.609_344;
const HPA_PER_INHG: f64 = 33.863_9;
const MM_PER_INCH: f64 = 25.4;

/// Unit system used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Imperial,
    Metric,
}

impl UnitSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Imperial => "imperial",
            UnitSystem::Metric => "metric",
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitSystem {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "imperial" => Ok(UnitSystem::Imperial),
            "metric" => Ok(UnitSystem::Metric),
            _ => Err(anyhow::anyhow!("Unknown unit system '{s}'. Use 'imperial' or 'metric'.")),
        }
    }
}

/// What a numeric value measures. Decides its unit symbol and conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementKind {
    Temperature,
    Speed,
    Pressure,
    Distance,
    Precipitation,
    Percent,
    Degree,
    Index,
}

struct UnitEntry {
    key: &'static str,
    imperial: &'static str,
    metric: &'static str,
    imperial_long: &'static str,
    metric_long: &'static str,
}

// Row order follows the `MeasurementKind` discriminants.
const UNIT_TABLE: [UnitEntry; 8] = [
    UnitEntry {
        key: "temperature",
        imperial: "°F",
        metric: "°C",
        imperial_long: "degrees Fahrenheit",
        metric_long: "degrees Celsius",
    },
    UnitEntry {
        key: "speed",
        imperial: "mph",
        metric: "km/h",
        imperial_long: "miles per hour",
        metric_long: "kilometers per hour",
    },
    UnitEntry {
        key: "pressure",
        imperial: "inHg",
        metric: "hPa",
        imperial_long: "inches of mercury",
        metric_long: "hectopascals",
    },
    UnitEntry {
        key: "distance",
        imperial: "mi",
        metric: "km",
        imperial_long: "miles",
        metric_long: "kilometers",
    },
    UnitEntry {
        key: "precipitation",
        imperial: "in",
        metric: "mm",
        imperial_long: "inches",
        metric_long: "millimeters",
    },
    UnitEntry {
        key: "percent",
        imperial: "%",
        metric: "%",
        imperial_long: "percent",
        metric_long: "percent",
    },
    UnitEntry {
        key: "degree",
        imperial: "°",
        metric: "°",
        imperial_long: "degrees",
        metric_long: "degrees",
    },
    UnitEntry { key: "index", imperial: "", metric: "", imperial_long: "index", metric_long: "index" },
];

impl MeasurementKind {
    pub const fn all() -> &'static [MeasurementKind] {
        &[
            MeasurementKind::Temperature,
            MeasurementKind::Speed,
            MeasurementKind::Pressure,
            MeasurementKind::Distance,
            MeasurementKind::Precipitation,
            MeasurementKind::Percent,
            MeasurementKind::Degree,
            MeasurementKind::Index,
        ]
    }

    fn entry(self) -> &'static UnitEntry {
        &UNIT_TABLE[self as usize]
    }

    pub fn key(self) -> &'static str {
        self.entry().key
    }

    /// Short unit suffix, e.g. "°F".
    pub fn symbol(self, system: UnitSystem) -> &'static str {
        match system {
            UnitSystem::Imperial => self.entry().imperial,
            UnitSystem::Metric => self.entry().metric,
        }
    }

    /// Long unit name, e.g. "degrees Fahrenheit".
    pub fn long_name(self, system: UnitSystem) -> &'static str {
        match system {
            UnitSystem::Imperial => self.entry().imperial_long,
            UnitSystem::Metric => self.entry().metric_long,
        }
    }

    fn precision(self, system: UnitSystem) -> usize {
        match (self, system) {
            (MeasurementKind::Pressure | MeasurementKind::Precipitation, UnitSystem::Imperial) => 2,
            (MeasurementKind::Percent | MeasurementKind::Degree, _) => 0,
            _ => 1,
        }
    }
}

impl FromStr for MeasurementKind {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        let alias = match key.as_str() {
            "temp" => "temperature",
            "precip" => "precipitation",
            "uv" => "index",
            other => other,
        };

        MeasurementKind::all()
            .iter()
            .copied()
            .find(|kind| kind.key() == alias)
            .ok_or_else(|| WeatherError::UnknownKind(s.to_string()))
    }
}

/// Long-form description of the unit `system` uses for `kind`.
pub fn format_unit_description_full(kind: &str, system: UnitSystem) -> Result<String, WeatherError> {
    let kind: MeasurementKind = kind.parse()?;
    Ok(kind.long_name(system).to_string())
}

/// One-line summary of a unit system, e.g. "imperial (°F, mph, inHg, mi)".
pub fn describe_unit_system(system: UnitSystem) -> String {
    format!(
        "{system} ({}, {}, {}, {})",
        MeasurementKind::Temperature.symbol(system),
        MeasurementKind::Speed.symbol(system),
        MeasurementKind::Pressure.symbol(system),
        MeasurementKind::Distance.symbol(system),
    )
}

/// Convert a canonical (metric) value into `system` for display.
pub fn to_display(kind: MeasurementKind, canonical: f64, system: UnitSystem) -> f64 {
    if system == UnitSystem::Metric {
        return canonical;
    }

    match kind {
        MeasurementKind::Temperature => canonical * 9.0 / 5.0 + 32.0,
        MeasurementKind::Speed | MeasurementKind::Distance => canonical / KM_PER_MILE,
        MeasurementKind::Pressure => canonical / HPA_PER_INHG,
        MeasurementKind::Precipitation => canonical / MM_PER_INCH,
        MeasurementKind::Percent | MeasurementKind::Degree | MeasurementKind::Index => canonical,
    }
}

/// Render a canonical value in `system` with its unit suffix, e.g. "72.5°F".
pub fn format_measurement(kind: MeasurementKind, canonical: f64, system: UnitSystem) -> String {
    let value = to_display(kind, canonical, system);
    format!("{:.*}{}", kind.precision(system), value, kind.symbol(system))
}

/// Convert a value tagged with a WMO unit code (as NWS reports them,
/// e.g. "wmoUnit:degF") into the canonical unit for its dimension.
///
/// Returns `None` for codes outside the table.
pub fn to_canonical(value: f64, unit_code: &str) -> Option<f64> {
    let code = unit_code.strip_prefix("wmoUnit:").unwrap_or(unit_code);

    let converted = match code {
        "degC" | "km_h-1" | "hPa" | "km" | "mm" | "percent" | "degree_(angle)" => value,
        "degF" => (value - 32.0) * 5.0 / 9.0,
        "K" => value - 273.15,
        "m_s-1" => value * 3.6,
        "mph" | "mi_h-1" => value * KM_PER_MILE,
        "kt" => value * 1.852,
        "Pa" => value / 100.0,
        "inHg" => value * HPA_PER_INHG,
        "m" => value / 1000.0,
        "mi" => value * KM_PER_MILE,
        "in" => value * MM_PER_INCH,
        _ => return None,
    };

    Some(converted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn table_rows_line_up_with_kinds() {
        for kind in MeasurementKind::all() {
            let parsed: MeasurementKind = kind.key().parse().expect("key should parse");
            assert_eq!(parsed, *kind);
        }
    }

    #[test]
    fn full_description_for_imperial_temperature() {
        let desc = format_unit_description_full("temperature", UnitSystem::Imperial).unwrap();
        assert_eq!(desc, "degrees Fahrenheit");

        let desc = format_unit_description_full("temp", UnitSystem::Metric).unwrap();
        assert_eq!(desc, "degrees Celsius");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = format_unit_description_full("luminosity", UnitSystem::Metric).unwrap_err();
        assert!(matches!(err, WeatherError::UnknownKind(ref k) if k == "luminosity"));
    }

    #[test]
    fn unit_system_parses_case_insensitively() {
        assert_eq!("Metric".parse::<UnitSystem>().unwrap(), UnitSystem::Metric);
        assert_eq!(" imperial ".parse::<UnitSystem>().unwrap(), UnitSystem::Imperial);
        assert!("kelvin".parse::<UnitSystem>().is_err());
    }

    #[test]
    fn display_conversion_only_touches_imperial() {
        assert!(close(to_display(MeasurementKind::Temperature, 20.0, UnitSystem::Metric), 20.0));
        assert!(close(to_display(MeasurementKind::Temperature, 20.0, UnitSystem::Imperial), 68.0));
        assert!(close(to_display(MeasurementKind::Speed, 16.09344, UnitSystem::Imperial), 10.0));
        assert!(close(to_display(MeasurementKind::Pressure, 1013.25, UnitSystem::Imperial), 29.92));
        assert!(close(to_display(MeasurementKind::Precipitation, 25.4, UnitSystem::Imperial), 1.0));
        assert!(close(to_display(MeasurementKind::Percent, 55.0, UnitSystem::Imperial), 55.0));
    }

    #[test]
    fn formats_with_symbol_and_precision() {
        assert_eq!(format_measurement(MeasurementKind::Temperature, 22.5, UnitSystem::Imperial), "72.5°F");
        assert_eq!(format_measurement(MeasurementKind::Pressure, 1013.3, UnitSystem::Metric), "1013.3hPa");
        assert_eq!(format_measurement(MeasurementKind::Percent, 64.4, UnitSystem::Metric), "64%");
        assert_eq!(format_measurement(MeasurementKind::Index, 3.0, UnitSystem::Imperial), "3.0");
    }

    #[test]
    fn describes_unit_system() {
        assert_eq!(describe_unit_system(UnitSystem::Imperial), "imperial (°F, mph, inHg, mi)");
        assert_eq!(describe_unit_system(UnitSystem::Metric), "metric (°C, km/h, hPa, km)");
    }

    #[test]
    fn wmo_unit_codes_convert_to_canonical() {
        assert!(close(to_canonical(50.0, "wmoUnit:degF").unwrap(), 10.0));
        assert!(close(to_canonical(10.0, "wmoUnit:m_s-1").unwrap(), 36.0));
        assert!(close(to_canonical(101_325.0, "wmoUnit:Pa").unwrap(), 1013.25));
        assert!(close(to_canonical(16_093.44, "wmoUnit:m").unwrap(), 16.09344));
        assert!(close(to_canonical(7.0, "wmoUnit:degC").unwrap(), 7.0));
        assert_eq!(to_canonical(1.0, "wmoUnit:furlong"), None);
    }
}
