use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    error::WeatherError,
    location::Location,
    model::{Astronomy, WeatherData, WeatherReport, WeatherRequest},
    wmo::describe_wmo_code,
};

use super::{ProviderId, WeatherProvider, geocode::Geocoder, get_json, parse_local};

pub const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com/v1";

const HOURLY_FIELDS: &[&str] = &[
    "temperature_2m",
    "apparent_temperature",
    "relative_humidity_2m",
    "dewpoint_2m",
    "precipitation",
    "weathercode",
    "cloudcover",
    "visibility",
    "surface_pressure",
    "windspeed_10m",
    "winddirection_10m",
    "windgusts_10m",
    "uv_index",
];

const DAILY_FIELDS: &[&str] = &[
    "weathercode",
    "temperature_2m_max",
    "temperature_2m_min",
    "apparent_temperature_max",
    "precipitation_sum",
    "windspeed_10m_max",
    "winddirection_10m_dominant",
    "windgusts_10m_max",
    "uv_index_max",
    "sunrise",
    "sunset",
];

#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    http: Client,
    base_url: String,
    geocoder: Geocoder,
    forecast_days: u8,
}

impl OpenMeteoProvider {
    pub fn new(http: Client) -> Self {
        Self {
            geocoder: Geocoder::new(http.clone()),
            http,
            base_url: OPEN_METEO_BASE_URL.to_string(),
            forecast_days: 7,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_geocoder(mut self, geocoder: Geocoder) -> Self {
        self.geocoder = geocoder;
        self
    }

    /// Open-Meteo serves 1 to 16 days.
    pub fn with_forecast_days(mut self, days: u8) -> Self {
        self.forecast_days = days.clamp(1, 16);
        self
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    #[instrument(skip(self, request), fields(location = %request.location))]
    async fn get_weather(&self, request: &WeatherRequest) -> Result<WeatherReport, WeatherError> {
        let (latitude, longitude) = self.geocoder.resolve(self.id(), &request.location).await?;

        let url = format!("{}/forecast", self.base_url);
        let query = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current_weather", "true".to_string()),
            ("hourly", HOURLY_FIELDS.join(",")),
            ("daily", DAILY_FIELDS.join(",")),
            ("temperature_unit", "celsius".to_string()),
            ("windspeed_unit", "kmh".to_string()),
            ("precipitation_unit", "mm".to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", self.forecast_days.to_string()),
        ];

        let parsed: OmResponse = get_json(&self.http, self.id(), &url, &query).await?;
        let fetched_at = Utc::now();

        let current = parsed.current_weather.as_ref().ok_or_else(|| {
            WeatherError::malformed(self.id().as_str(), "response has no current_weather block")
        })?;

        // all times come back as local wall-clock times at the location
        let offset = FixedOffset::east_opt(parsed.utc_offset_seconds).ok_or_else(|| {
            WeatherError::malformed(
                self.id().as_str(),
                format!("utc_offset_seconds {} is out of range", parsed.utc_offset_seconds),
            )
        })?;

        let hourly = parsed.hourly.as_ref().map(|b| hourly_series(b, offset)).unwrap_or_default();
        let daily = parsed.daily.as_ref().map(|b| daily_series(b, offset)).unwrap_or_default();

        let mut current = current_conditions(current, offset, fetched_at);
        fill_from_hour(&mut current, &hourly);

        let location = match &request.location {
            Location::Place { .. } => request.location.to_string(),
            Location::Coordinates { .. } => format!("{},{}", parsed.latitude, parsed.longitude),
        };

        debug!(hours = hourly.len(), days = daily.len(), "Open-Meteo forecast parsed");

        let mut report = WeatherReport::new(self.id().as_str(), location, fetched_at, current)
            .with_coordinates(parsed.latitude, parsed.longitude);
        if let Some(daily_block) = &parsed.daily {
            report = report.with_astronomy(first_day_astronomy(daily_block, offset));
        }
        if !hourly.is_empty() {
            report = report.with_hourly(hourly);
        }
        if !daily.is_empty() {
            report = report.with_daily(daily);
        }

        Ok(report)
    }
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    utc_offset_seconds: i32,
    current_weather: Option<OmCurrent>,
    hourly: Option<OmHourly>,
    daily: Option<OmDaily>,
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    time: String,
    temperature: Option<f64>,
    windspeed: Option<f64>,
    winddirection: Option<f64>,
    weathercode: Option<u16>,
}

type Column = Option<Vec<Option<f64>>>;

#[derive(Debug, Default, Deserialize)]
struct OmHourly {
    #[serde(default)]
    time: Vec<String>,
    temperature_2m: Column,
    apparent_temperature: Column,
    relative_humidity_2m: Column,
    dewpoint_2m: Column,
    precipitation: Column,
    weathercode: Column,
    cloudcover: Column,
    visibility: Column,
    surface_pressure: Column,
    windspeed_10m: Column,
    winddirection_10m: Column,
    windgusts_10m: Column,
    uv_index: Column,
}

#[derive(Debug, Default, Deserialize)]
struct OmDaily {
    #[serde(default)]
    time: Vec<String>,
    weathercode: Column,
    temperature_2m_max: Column,
    temperature_2m_min: Column,
    apparent_temperature_max: Column,
    precipitation_sum: Column,
    windspeed_10m_max: Column,
    winddirection_10m_dominant: Column,
    windgusts_10m_max: Column,
    uv_index_max: Column,
    #[serde(default)]
    sunrise: Vec<String>,
    #[serde(default)]
    sunset: Vec<String>,
}

fn at(column: &Column, i: usize) -> Option<f64> {
    column.as_ref().and_then(|values| values.get(i).copied().flatten())
}

fn apply_code(data: &mut WeatherData, code: Option<f64>) {
    if let Some(code) = code.filter(|c| c.is_finite() && *c >= 0.0) {
        let code = code as u16;
        data.condition = Some(serde_json::json!({ "weathercode": code }));
        data.condition_str = Some(describe_wmo_code(code).to_string());
    }
}

fn local_to_utc(s: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    parse_local(s, offset).map(|dt| dt.with_timezone(&Utc))
}

fn current_conditions(current: &OmCurrent, offset: FixedOffset, fetched_at: DateTime<Utc>) -> WeatherData {
    let mut data = WeatherData::new(local_to_utc(&current.time, offset).unwrap_or(fetched_at));
    data.temperature = current.temperature;
    data.wind_speed = current.windspeed;
    data.set_wind(current.winddirection, None);
    apply_code(&mut data, current.weathercode.map(f64::from));
    data
}

/// `current_weather` only carries temperature, wind and code; the rest comes
/// from the hourly entry covering the same hour.
fn fill_from_hour(current: &mut WeatherData, hourly: &[WeatherData]) {
    let Some(hour) = hourly.iter().find(|h| {
        h.timestamp <= current.timestamp && current.timestamp - h.timestamp < Duration::hours(1)
    }) else {
        return;
    };

    current.feels_like = current.feels_like.or(hour.feels_like);
    current.humidity = current.humidity.or(hour.humidity);
    current.dew_point = current.dew_point.or(hour.dew_point);
    current.precipitation = current.precipitation.or(hour.precipitation);
    current.cloud_cover = current.cloud_cover.or(hour.cloud_cover);
    current.visibility = current.visibility.or(hour.visibility);
    current.pressure = current.pressure.or(hour.pressure);
    current.wind_gust = current.wind_gust.or(hour.wind_gust);
    current.uv = current.uv.or(hour.uv);
}

fn hourly_series(block: &OmHourly, offset: FixedOffset) -> Vec<WeatherData> {
    block
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, time)| {
            let mut data = WeatherData::new(local_to_utc(time, offset)?);
            data.temperature = at(&block.temperature_2m, i);
            data.feels_like = at(&block.apparent_temperature, i);
            data.humidity = at(&block.relative_humidity_2m, i);
            data.dew_point = at(&block.dewpoint_2m, i);
            data.precipitation = at(&block.precipitation, i);
            data.cloud_cover = at(&block.cloudcover, i);
            // metres
            data.visibility = at(&block.visibility, i).map(|m| m / 1000.0);
            data.pressure = at(&block.surface_pressure, i);
            data.wind_speed = at(&block.windspeed_10m, i);
            data.wind_gust = at(&block.windgusts_10m, i);
            data.uv = at(&block.uv_index, i);
            data.set_wind(at(&block.winddirection_10m, i), None);
            apply_code(&mut data, at(&block.weathercode, i));
            Some(data)
        })
        .collect()
}

/// Days are keyed by local midnight at the location.
fn daily_series(block: &OmDaily, offset: FixedOffset) -> Vec<WeatherData> {
    block
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, day)| {
            let mut data = WeatherData::new(local_to_utc(day, offset)?);
            data.temperature = at(&block.temperature_2m_max, i);
            data.feels_like = at(&block.apparent_temperature_max, i);
            data.precipitation = at(&block.precipitation_sum, i);
            data.wind_speed = at(&block.windspeed_10m_max, i);
            data.wind_gust = at(&block.windgusts_10m_max, i);
            data.uv = at(&block.uv_index_max, i);
            data.set_wind(at(&block.winddirection_10m_dominant, i), None);
            apply_code(&mut data, at(&block.weathercode, i));
            data.temperature_min = at(&block.temperature_2m_min, i);
            Some(data)
        })
        .collect()
}

/// Sunrise and sunset as RFC 3339 with the location's offset, like the other sources.
fn first_day_astronomy(block: &OmDaily, offset: FixedOffset) -> Astronomy {
    let stamp = |times: &[String]| {
        let raw = times.first()?;
        Some(parse_local(raw, offset).map(|dt| dt.to_rfc3339()).unwrap_or_else(|| raw.clone()))
    };

    Astronomy {
        sunrise: stamp(block.sunrise.as_slice()),
        sunset: stamp(block.sunset.as_slice()),
        ..Default::default()
    }
}
