//! US National Weather Service (api.weather.gov).
//!
//! A lookup is a chain: `points/{lat},{lon}` names the gridpoint forecast URLs
//! and the observation-station list; current conditions come from the nearest
//! station's latest observation. Only the observation is required. Forecast,
//! hourly and alert failures are logged and leave those parts empty.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::{
    error::WeatherError,
    location::Location,
    model::{Alert, WeatherData, WeatherReport, WeatherRequest},
    units::to_canonical,
};

use super::{ProviderId, WeatherProvider, geocode::Geocoder, get_json, parse_utc};

pub const NWS_BASE_URL: &str = "https://api.weather.gov";

#[derive(Debug, Clone)]
pub struct NwsProvider {
    http: Client,
    base_url: String,
    geocoder: Geocoder,
}

impl NwsProvider {
    pub fn new(http: Client) -> Self {
        Self { geocoder: Geocoder::new(http.clone()), http, base_url: NWS_BASE_URL.to_string() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_geocoder(mut self, geocoder: Geocoder) -> Self {
        self.geocoder = geocoder;
        self
    }

    async fn latest_observation(
        &self,
        points: &NwsPoint,
        fetched_at: DateTime<Utc>,
    ) -> Result<WeatherData, WeatherError> {
        let stations: NwsStations =
            get_json(&self.http, self.id(), &points.observation_stations, &[]).await?;
        let station = stations.features.first().ok_or_else(|| {
            WeatherError::malformed(self.id().as_str(), "no observation stations near this point")
        })?;

        let url = format!("{}/observations/latest", station.id.trim_end_matches('/'));
        let observation: NwsFeature<NwsObservation> =
            get_json(&self.http, self.id(), &url, &[]).await?;

        debug!(station = %station.id, "NWS observation received");
        Ok(observation_data(&observation.properties, fetched_at))
    }

    async fn periods(&self, url: Option<&str>) -> Result<Vec<NwsPeriod>, WeatherError> {
        let Some(url) = url else {
            return Ok(Vec::new());
        };
        let forecast: NwsFeature<NwsForecast> = get_json(&self.http, self.id(), url, &[]).await?;
        Ok(forecast.properties.periods)
    }

    async fn active_alerts(&self, point: &str) -> Result<Vec<Alert>, WeatherError> {
        let url = format!("{}/alerts/active", self.base_url);
        let collection: NwsAlertCollection =
            get_json(&self.http, self.id(), &url, &[("point", point.to_string())]).await?;
        Ok(collection.features.into_iter().map(|f| f.properties.into()).collect())
    }
}

#[async_trait]
impl WeatherProvider for NwsProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Nws
    }

    #[instrument(skip(self, request), fields(location = %request.location))]
    async fn get_weather(&self, request: &WeatherRequest) -> Result<WeatherReport, WeatherError> {
        let (latitude, longitude) = self.geocoder.resolve(self.id(), &request.location).await?;
        // NWS redirects anything more precise than four decimals
        let point = format!("{latitude:.4},{longitude:.4}");

        let url = format!("{}/points/{point}", self.base_url);
        let points: NwsFeature<NwsPoint> = get_json(&self.http, self.id(), &url, &[]).await?;
        let points = points.properties;
        let fetched_at = Utc::now();

        let (current, daily, hourly, alerts) = tokio::join!(
            self.latest_observation(&points, fetched_at),
            self.periods(points.forecast.as_deref()),
            self.periods(points.forecast_hourly.as_deref()),
            self.active_alerts(&point),
        );
        let current = current?;

        let location = match &request.location {
            Location::Place { .. } => request.location.to_string(),
            Location::Coordinates { .. } => points
                .relative_location
                .as_ref()
                .and_then(|rel| rel.properties.label())
                .unwrap_or_else(|| point.clone()),
        };

        let mut report = WeatherReport::new(self.id().as_str(), location, fetched_at, current)
            .with_coordinates(latitude, longitude);

        if let Some(periods) = optional("forecast", daily) {
            report = report.with_daily(daily_series(&periods));
        }
        if let Some(periods) = optional("hourly forecast", hourly) {
            report = report.with_hourly(periods.iter().filter_map(period_data).collect());
        }
        if let Some(alerts) = optional("alerts", alerts) {
            report = report
                .with_alerts(alerts.into_iter().filter(|a| !a.is_expired(fetched_at)).collect());
        }

        Ok(report)
    }
}

fn optional<T>(what: &str, result: Result<T, WeatherError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(error = %err, "NWS {what} unavailable");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct NwsFeature<T> {
    properties: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsPoint {
    forecast: Option<String>,
    forecast_hourly: Option<String>,
    observation_stations: String,
    relative_location: Option<NwsFeature<NwsRelativeLocation>>,
}

#[derive(Debug, Deserialize)]
struct NwsRelativeLocation {
    city: Option<String>,
    state: Option<String>,
}

impl NwsRelativeLocation {
    fn label(&self) -> Option<String> {
        match (&self.city, &self.state) {
            (Some(city), Some(state)) => Some(format!("{city}, {state}")),
            (Some(city), None) => Some(city.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NwsStations {
    #[serde(default)]
    features: Vec<NwsStation>,
}

#[derive(Debug, Deserialize)]
struct NwsStation {
    id: String,
}

/// A value tagged with a WMO unit code, e.g. `{"value": 12.2, "unitCode": "wmoUnit:degC"}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsQuantity {
    value: Option<f64>,
    unit_code: Option<String>,
}

impl NwsQuantity {
    fn canonical(&self) -> Option<f64> {
        to_canonical(self.value?, self.unit_code.as_deref().unwrap_or_default())
    }
}

fn canonical(quantity: &Option<NwsQuantity>) -> Option<f64> {
    quantity.as_ref().and_then(NwsQuantity::canonical)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsObservation {
    timestamp: Option<String>,
    text_description: Option<String>,
    icon: Option<String>,
    temperature: Option<NwsQuantity>,
    dewpoint: Option<NwsQuantity>,
    wind_direction: Option<NwsQuantity>,
    wind_speed: Option<NwsQuantity>,
    wind_gust: Option<NwsQuantity>,
    barometric_pressure: Option<NwsQuantity>,
    visibility: Option<NwsQuantity>,
    precipitation_last_hour: Option<NwsQuantity>,
    relative_humidity: Option<NwsQuantity>,
    wind_chill: Option<NwsQuantity>,
    heat_index: Option<NwsQuantity>,
    #[serde(default)]
    cloud_layers: Vec<NwsCloudLayer>,
}

#[derive(Debug, Deserialize)]
struct NwsCloudLayer {
    amount: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NwsForecast {
    #[serde(default)]
    periods: Vec<NwsPeriod>,
}

/// Newer gridpoint responses send temperature as a quantity instead of a bare number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NwsTemperature {
    Plain(f64),
    Quantity(NwsQuantity),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsPeriod {
    name: Option<String>,
    start_time: String,
    #[serde(default)]
    is_daytime: bool,
    temperature: Option<NwsTemperature>,
    temperature_unit: Option<String>,
    wind_speed: Option<String>,
    wind_direction: Option<String>,
    icon: Option<String>,
    short_forecast: Option<String>,
    detailed_forecast: Option<String>,
    probability_of_precipitation: Option<NwsQuantity>,
    relative_humidity: Option<NwsQuantity>,
    dewpoint: Option<NwsQuantity>,
}

impl NwsPeriod {
    fn temperature(&self) -> Option<f64> {
        match self.temperature.as_ref()? {
            NwsTemperature::Plain(value) => match self.temperature_unit.as_deref() {
                Some("C") => Some(*value),
                _ => to_canonical(*value, "degF"),
            },
            NwsTemperature::Quantity(quantity) => quantity.canonical(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NwsAlertCollection {
    #[serde(default)]
    features: Vec<NwsFeature<NwsAlertProperties>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsAlertProperties {
    event: Option<String>,
    headline: Option<String>,
    description: Option<String>,
    instruction: Option<String>,
    severity: Option<String>,
    effective: Option<String>,
    expires: Option<String>,
    area_desc: Option<String>,
}

impl From<NwsAlertProperties> for Alert {
    fn from(p: NwsAlertProperties) -> Self {
        Alert {
            event: p.event.unwrap_or_else(|| "Weather alert".to_string()),
            headline: p.headline,
            description: p.description,
            instruction: p.instruction,
            severity: p.severity,
            effective: p.effective,
            expires: p.expires,
            area: p.area_desc,
        }
    }
}

fn observation_data(obs: &NwsObservation, fetched_at: DateTime<Utc>) -> WeatherData {
    let timestamp = obs.timestamp.as_deref().and_then(parse_utc).unwrap_or(fetched_at);
    let mut data = WeatherData::new(timestamp);

    data.temperature = canonical(&obs.temperature);
    data.dew_point = canonical(&obs.dewpoint);
    data.wind_chill = canonical(&obs.wind_chill);
    data.heat_index = canonical(&obs.heat_index);
    data.wind_speed = canonical(&obs.wind_speed);
    data.wind_gust = canonical(&obs.wind_gust);
    data.set_wind(obs.wind_direction.as_ref().and_then(|q| q.value), None);
    data.humidity = canonical(&obs.relative_humidity);
    data.pressure = canonical(&obs.barometric_pressure);
    data.visibility = canonical(&obs.visibility);
    data.precipitation = canonical(&obs.precipitation_last_hour);
    data.cloud_cover = cloud_cover(&obs.cloud_layers);
    data.icon = obs.icon.clone();
    data.condition_str = obs.text_description.clone().filter(|s| !s.is_empty());
    data
}

/// Highest coverage over all reported layers, in percent.
fn cloud_cover(layers: &[NwsCloudLayer]) -> Option<f64> {
    layers
        .iter()
        .filter_map(|layer| match layer.amount.as_deref()?.to_ascii_uppercase().as_str() {
            "SKC" | "CLR" => Some(0.0),
            "FEW" => Some(12.5),
            "SCT" => Some(37.5),
            "BKN" => Some(75.0),
            "OVC" => Some(100.0),
            _ => None,
        })
        .reduce(f64::max)
}

/// "10 mph", "5 to 15 mph" or "20 km/h" to km/h; ranges take the upper bound.
fn parse_wind_speed(text: &str) -> Option<f64> {
    let mut tokens = text.split_whitespace().peekable();
    let mut highest: Option<f64> = None;
    let mut unit = None;

    while let Some(token) = tokens.next() {
        if let Ok(value) = token.parse::<f64>() {
            highest = Some(highest.map_or(value, |h| h.max(value)));
        } else if tokens.peek().is_none() {
            unit = Some(token);
        }
    }

    let value = highest?;
    match unit? {
        "mph" => to_canonical(value, "mph"),
        "km/h" | "kmh" => Some(value),
        "kt" | "kts" => to_canonical(value, "kt"),
        _ => None,
    }
}

fn period_data(period: &NwsPeriod) -> Option<WeatherData> {
    let mut data = WeatherData::new(parse_utc(&period.start_time)?);
    data.temperature = period.temperature();
    data.wind_speed = period.wind_speed.as_deref().and_then(parse_wind_speed);
    data.set_wind(None, period.wind_direction.clone());
    data.humidity = canonical(&period.relative_humidity);
    data.dew_point = canonical(&period.dewpoint);
    data.icon = period.icon.clone();
    data.condition_str = period.short_forecast.clone();
    data.condition = Some(serde_json::json!({
        "name": period.name,
        "detailedForecast": period.detailed_forecast,
        "probabilityOfPrecipitation": period.probability_of_precipitation.as_ref().and_then(|q| q.value),
    }));
    Some(data)
}

/// Forecast periods alternate day and night. Each daytime period becomes a day
/// whose temperature is the high; the night after it supplies the low. A night
/// with no preceding day (an evening request) stands on its own.
fn daily_series(periods: &[NwsPeriod]) -> Vec<WeatherData> {
    let mut days: Vec<WeatherData> = Vec::new();
    let mut last_was_day = false;

    for period in periods {
        if !period.is_daytime && last_was_day {
            if let Some(day) = days.last_mut() {
                day.temperature_min = period.temperature();
            }
            last_was_day = false;
            continue;
        }
        if let Some(data) = period_data(period) {
            days.push(data);
            last_was_day = period.is_daytime;
        }
    }

    days
}
