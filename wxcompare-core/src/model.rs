use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    compass::{degrees_to_direction, sectors_apart},
    location::Location,
    units::UnitSystem,
};

/// What a caller asks a provider for.
#[derive(Debug, Clone)]
pub struct WeatherRequest {
    pub location: Location,
    /// Display units. Providers still store canonical metric values.
    pub units: UnitSystem,
    /// Upper bound for one provider's whole fetch; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl WeatherRequest {
    pub fn new(location: Location, units: UnitSystem) -> Self {
        Self { location, units, timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Weather conditions at one instant, observed or forecast.
///
/// Magnitudes are canonical metric: °C, km/h, hPa, km, mm, percent, degrees.
/// `None` means the source did not provide the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub temperature: Option<f64>,
    /// Daily low. Only daily entries carry it; their `temperature` is the high.
    pub temperature_min: Option<f64>,
    pub feels_like: Option<f64>,
    pub wind_chill: Option<f64>,
    pub heat_index: Option<f64>,
    pub dew_point: Option<f64>,

    pub wind_speed: Option<f64>,
    pub wind_degree: Option<f64>,
    pub wind_direction: Option<String>,
    pub wind_gust: Option<f64>,

    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub precipitation: Option<f64>,
    pub visibility: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub uv: Option<f64>,

    pub icon: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Vendor's own condition payload, kept as-is.
    pub condition: Option<serde_json::Value>,
    pub condition_str: Option<String>,
}

impl WeatherData {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            temperature: None,
            temperature_min: None,
            feels_like: None,
            wind_chill: None,
            heat_index: None,
            dew_point: None,
            wind_speed: None,
            wind_degree: None,
            wind_direction: None,
            wind_gust: None,
            humidity: None,
            pressure: None,
            precipitation: None,
            visibility: None,
            cloud_cover: None,
            uv: None,
            icon: None,
            timestamp,
            condition: None,
            condition_str: None,
        }
    }

    /// Record wind direction. The degree is authoritative: when it is finite the
    /// label is derived from it and `vendor_label` is ignored.
    pub fn set_wind(&mut self, degree: Option<f64>, vendor_label: Option<String>) {
        let degree = degree.filter(|d| d.is_finite());
        self.wind_degree = degree;
        self.wind_direction = match degree.and_then(degrees_to_direction) {
            Some(label) => Some(label.to_string()),
            None => vendor_label.filter(|l| !l.trim().is_empty()),
        };
    }

    /// Degree and label agree to within one compass sector (or one of them is absent).
    pub fn wind_is_consistent(&self) -> bool {
        match (self.wind_degree, self.wind_direction.as_deref()) {
            (Some(deg), Some(label)) => degrees_to_direction(deg)
                .and_then(|derived| sectors_apart(derived, label))
                .is_some_and(|n| n <= 1),
            _ => true,
        }
    }

    /// Best label for the condition: `condition_str`, else a `text`/`description`
    /// field of the structured payload (object or first array element).
    pub fn condition_label(&self) -> Option<String> {
        if let Some(label) = self.condition_str.as_deref().filter(|s| !s.is_empty()) {
            return Some(label.to_string());
        }

        let condition = self.condition.as_ref()?;
        let object = match condition {
            serde_json::Value::Array(items) => items.first()?,
            other => other,
        };
        ["text", "description"]
            .iter()
            .find_map(|key| object.get(key).and_then(|v| v.as_str()))
            .map(str::to_string)
    }
}

/// Sun and moon times as the vendor reported them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Astronomy {
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub moonrise: Option<String>,
    pub moonset: Option<String>,
    pub moon_phase: Option<String>,
}

impl Astronomy {
    pub fn is_empty(&self) -> bool {
        self == &Astronomy::default()
    }
}

/// An active weather alert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub event: String,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub severity: Option<String>,
    pub effective: Option<String>,
    pub expires: Option<String>,
    pub area: Option<String>,
}

impl Alert {
    /// True when `expires` is an RFC 3339 time before `now`. Unparseable or missing
    /// expiry counts as still active.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .is_some_and(|expires| expires < now)
    }
}

/// One source's normalized payload for one location.
///
/// Built once by a provider and read-only afterwards. Hourly and daily series
/// are kept sorted by timestamp with no duplicate instants.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherReport {
    source: String,
    location: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    fetched_at: DateTime<Utc>,
    current: WeatherData,
    hourly: Option<Vec<WeatherData>>,
    daily: Option<Vec<WeatherData>>,
    astronomy: Option<Astronomy>,
    alerts: Option<Vec<Alert>>,
}

impl WeatherReport {
    pub fn new(
        source: impl Into<String>,
        location: impl Into<String>,
        fetched_at: DateTime<Utc>,
        current: WeatherData,
    ) -> Self {
        Self {
            source: source.into(),
            location: location.into(),
            latitude: None,
            longitude: None,
            fetched_at,
            current,
            hourly: None,
            daily: None,
            astronomy: None,
            alerts: None,
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// Attach an hourly series. Entries are sorted; later duplicates of a timestamp are dropped.
    pub fn with_hourly(mut self, hourly: Vec<WeatherData>) -> Self {
        self.hourly = Some(normalize_series(hourly));
        self
    }

    /// Attach a daily series. Same ordering rules as [`WeatherReport::with_hourly`].
    pub fn with_daily(mut self, daily: Vec<WeatherData>) -> Self {
        self.daily = Some(normalize_series(daily));
        self
    }

    pub fn with_astronomy(mut self, astronomy: Astronomy) -> Self {
        self.astronomy = (!astronomy.is_empty()).then_some(astronomy);
        self
    }

    pub fn with_alerts(mut self, alerts: Vec<Alert>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn latitude(&self) -> Option<f64> {
        self.latitude
    }

    pub fn longitude(&self) -> Option<f64> {
        self.longitude
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn current(&self) -> &WeatherData {
        &self.current
    }

    pub fn hourly(&self) -> Option<&[WeatherData]> {
        self.hourly.as_deref()
    }

    pub fn daily(&self) -> Option<&[WeatherData]> {
        self.daily.as_deref()
    }

    pub fn astronomy(&self) -> Option<&Astronomy> {
        self.astronomy.as_ref()
    }

    pub fn alerts(&self) -> Option<&[Alert]> {
        self.alerts.as_deref()
    }
}

fn normalize_series(mut series: Vec<WeatherData>) -> Vec<WeatherData> {
    // stable sort keeps the first of equal timestamps in front for dedup
    series.sort_by_key(|d| d.timestamp);
    series.dedup_by_key(|d| d.timestamp);
    series
}
