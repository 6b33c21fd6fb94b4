use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    error::WeatherError,
    location::Location,
    model::{Alert, Astronomy, WeatherData, WeatherReport, WeatherRequest},
};

use super::{ProviderId, WeatherProvider, get_json, parse_local, unix_to_utc};

pub const WEATHERAPI_BASE_URL: &str = "https://api.weatherapi.com/v1";

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    http: Client,
    base_url: String,
    forecast_days: u8,
}

impl WeatherApiProvider {
    pub fn new(api_key: String, http: Client) -> Self {
        Self { api_key, http, base_url: WEATHERAPI_BASE_URL.to_string(), forecast_days: 3 }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// WeatherAPI.com serves 1 to 14 days; free keys are capped at 3 upstream.
    pub fn with_forecast_days(mut self, days: u8) -> Self {
        self.forecast_days = days.clamp(1, 14);
        self
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
    }

    #[instrument(skip(self, request), fields(location = %request.location))]
    async fn get_weather(&self, request: &WeatherRequest) -> Result<WeatherReport, WeatherError> {
        let url = format!("{}/forecast.json", self.base_url);
        let query = [
            ("key", self.api_key.clone()),
            ("q", request.location.query()),
            ("days", self.forecast_days.to_string()),
            ("alerts", "yes".to_string()),
            ("aqi", "no".to_string()),
            ("lang", "en".to_string()),
        ];

        let parsed: WaResponse = get_json(&self.http, self.id(), &url, &query).await?;
        let fetched_at = Utc::now();

        let current = parsed.current.as_ref().ok_or_else(|| {
            WeatherError::malformed(self.id().as_str(), "response has no current conditions")
        })?;
        let current = conditions(current, fetched_at);

        // forecast dates are local to the location
        let offset = parsed.location.utc_offset().unwrap_or(Utc.fix());
        let days = parsed.forecast.map(|f| f.forecastday).unwrap_or_default();
        let hourly: Vec<WeatherData> = days
            .iter()
            .flat_map(|day| day.hour.iter())
            .filter(|hour| hour.epoch.is_some())
            .map(|hour| conditions(hour, fetched_at))
            .collect();
        let daily: Vec<WeatherData> = days.iter().filter_map(|day| day_summary(day, offset)).collect();

        let alerts: Vec<Alert> = parsed
            .alerts
            .map(|a| a.alert)
            .unwrap_or_default()
            .into_iter()
            .map(Alert::from)
            .filter(|alert| !alert.is_expired(fetched_at))
            .collect();

        let location = match &request.location {
            Location::Place { .. } => request.location.to_string(),
            Location::Coordinates { .. } => format!("{},{}", parsed.location.lat, parsed.location.lon),
        };

        debug!(
            hours = hourly.len(),
            days = daily.len(),
            alerts = alerts.len(),
            "WeatherAPI forecast parsed"
        );

        let mut report = WeatherReport::new(self.id().as_str(), location, fetched_at, current)
            .with_coordinates(parsed.location.lat, parsed.location.lon)
            .with_alerts(alerts);
        if let Some(astro) = days.first().and_then(|day| day.astro.clone()) {
            report = report.with_astronomy(astro.into());
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
struct WaResponse {
    location: WaLocation,
    current: Option<WaConditions>,
    forecast: Option<WaForecast>,
    alerts: Option<WaAlerts>,
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    lat: f64,
    lon: f64,
    localtime_epoch: Option<i64>,
    localtime: Option<String>,
}

impl WaLocation {
    /// Distance between the local wall clock and `localtime_epoch`, to the quarter hour.
    fn utc_offset(&self) -> Option<FixedOffset> {
        let local = NaiveDateTime::parse_from_str(self.localtime.as_deref()?, "%Y-%m-%d %H:%M").ok()?;
        let seconds = local.and_utc().timestamp() - self.localtime_epoch?;
        let quarters = (seconds as f64 / 900.0).round() as i32;
        FixedOffset::east_opt(quarters * 900)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct WaCondition {
    text: Option<String>,
    icon: Option<String>,
    code: Option<i64>,
}

/// The shape shared by `current` and each `forecastday[].hour[]` entry.
#[derive(Debug, Deserialize)]
struct WaConditions {
    #[serde(alias = "last_updated_epoch", alias = "time_epoch")]
    epoch: Option<i64>,
    temp_c: Option<f64>,
    feelslike_c: Option<f64>,
    windchill_c: Option<f64>,
    heatindex_c: Option<f64>,
    dewpoint_c: Option<f64>,
    wind_kph: Option<f64>,
    wind_degree: Option<f64>,
    wind_dir: Option<String>,
    gust_kph: Option<f64>,
    humidity: Option<f64>,
    pressure_mb: Option<f64>,
    precip_mm: Option<f64>,
    vis_km: Option<f64>,
    cloud: Option<f64>,
    uv: Option<f64>,
    condition: Option<WaCondition>,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    #[serde(default)]
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date: String,
    day: Option<WaDay>,
    astro: Option<WaAstro>,
    #[serde(default)]
    hour: Vec<WaConditions>,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    maxtemp_c: Option<f64>,
    mintemp_c: Option<f64>,
    maxwind_kph: Option<f64>,
    totalprecip_mm: Option<f64>,
    avgvis_km: Option<f64>,
    avghumidity: Option<f64>,
    uv: Option<f64>,
    condition: Option<WaCondition>,
}

#[derive(Debug, Clone, Deserialize)]
struct WaAstro {
    sunrise: Option<String>,
    sunset: Option<String>,
    moonrise: Option<String>,
    moonset: Option<String>,
    moon_phase: Option<String>,
}

impl From<WaAstro> for Astronomy {
    fn from(astro: WaAstro) -> Self {
        Astronomy {
            sunrise: astro.sunrise,
            sunset: astro.sunset,
            moonrise: astro.moonrise,
            moonset: astro.moonset,
            moon_phase: astro.moon_phase,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WaAlerts {
    #[serde(default)]
    alert: Vec<WaAlert>,
}

#[derive(Debug, Deserialize)]
struct WaAlert {
    event: Option<String>,
    headline: Option<String>,
    desc: Option<String>,
    instruction: Option<String>,
    severity: Option<String>,
    effective: Option<String>,
    expires: Option<String>,
    areas: Option<String>,
}

impl From<WaAlert> for Alert {
    fn from(a: WaAlert) -> Self {
        let event = a
            .event
            .or_else(|| a.headline.clone())
            .unwrap_or_else(|| "Weather alert".to_string());
        Alert {
            event,
            headline: a.headline,
            description: a.desc,
            instruction: a.instruction,
            severity: a.severity,
            effective: a.effective,
            expires: a.expires,
            area: a.areas,
        }
    }
}

fn apply_condition(data: &mut WeatherData, condition: Option<&WaCondition>) {
    let Some(condition) = condition else {
        return;
    };
    // icons come protocol-relative: "//cdn.weatherapi.com/..."
    data.icon = condition.icon.as_deref().map(|icon| {
        if icon.starts_with("//") { format!("https:{icon}") } else { icon.to_string() }
    });
    data.condition_str = condition.text.clone();
    data.condition = Some(serde_json::json!({
        "text": condition.text,
        "code": condition.code,
    }));
}

fn conditions(c: &WaConditions, fallback: DateTime<Utc>) -> WeatherData {
    let timestamp = c.epoch.and_then(unix_to_utc).unwrap_or(fallback);
    let mut data = WeatherData::new(timestamp);
    data.temperature = c.temp_c;
    data.feels_like = c.feelslike_c;
    data.wind_chill = c.windchill_c;
    data.heat_index = c.heatindex_c;
    data.dew_point = c.dewpoint_c;
    data.wind_speed = c.wind_kph;
    data.wind_gust = c.gust_kph;
    data.set_wind(c.wind_degree, c.wind_dir.clone());
    data.humidity = c.humidity;
    data.pressure = c.pressure_mb;
    data.precipitation = c.precip_mm;
    data.visibility = c.vis_km;
    data.cloud_cover = c.cloud;
    data.uv = c.uv;
    apply_condition(&mut data, c.condition.as_ref());
    data
}

fn day_summary(day: &WaForecastDay, offset: FixedOffset) -> Option<WeatherData> {
    let mut data = WeatherData::new(parse_local(&day.date, offset)?.with_timezone(&Utc));
    let Some(summary) = &day.day else {
        return Some(data);
    };

    data.temperature = summary.maxtemp_c;
    data.wind_speed = summary.maxwind_kph;
    data.precipitation = summary.totalprecip_mm;
    data.visibility = summary.avgvis_km;
    data.humidity = summary.avghumidity;
    data.uv = summary.uv;
    data.temperature_min = summary.mintemp_c;
    apply_condition(&mut data, summary.condition.as_ref());
    Some(data)
}
