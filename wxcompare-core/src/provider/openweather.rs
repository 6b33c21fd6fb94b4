use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::{
    error::WeatherError,
    location::Location,
    model::{Astronomy, WeatherData, WeatherReport, WeatherRequest},
};

use super::{ProviderId, WeatherProvider, get_json, unix_to_utc};

pub const OPEN_WEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    http: Client,
    base_url: String,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, http: Client) -> Self {
        Self { api_key, http, base_url: OPEN_WEATHER_BASE_URL.to_string() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn query(&self, location: &Location) -> Vec<(&'static str, String)> {
        let mut query = vec![("appid", self.api_key.clone()), ("units", "metric".to_string())];
        match location {
            Location::Coordinates { latitude, longitude } => {
                query.push(("lat", latitude.to_string()));
                query.push(("lon", longitude.to_string()));
            }
            // state codes are only understood together with a country code
            Location::Place { city, state: Some(state) } => {
                query.push(("q", format!("{city},{state},US")));
            }
            Location::Place { city, state: None } => query.push(("q", city.clone())),
        }
        query
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    #[instrument(skip(self, request), fields(location = %request.location))]
    async fn get_weather(&self, request: &WeatherRequest) -> Result<WeatherReport, WeatherError> {
        let query = self.query(&request.location);
        let current_url = format!("{}/weather", self.base_url);
        let forecast_url = format!("{}/forecast", self.base_url);

        let (current, forecast) = tokio::join!(
            get_json::<OwCurrentResponse>(&self.http, self.id(), &current_url, &query),
            get_json::<OwForecastResponse>(&self.http, self.id(), &forecast_url, &query),
        );
        let parsed = current?;
        let fetched_at = Utc::now();

        if parsed.entry.main.is_none() {
            return Err(WeatherError::malformed(self.id().as_str(), "response has no main block"));
        }
        let current = entry_data(&parsed.entry, fetched_at);

        let location = match (&request.location, &parsed.coord) {
            (Location::Coordinates { .. }, Some(coord)) => format!("{},{}", coord.lat, coord.lon),
            _ => request.location.to_string(),
        };

        let astronomy = parsed.sys.as_ref().map(|sys| Astronomy {
            sunrise: sys.sunrise.and_then(unix_to_utc).map(|t| t.to_rfc3339()),
            sunset: sys.sunset.and_then(unix_to_utc).map(|t| t.to_rfc3339()),
            ..Default::default()
        });

        let mut report = WeatherReport::new(self.id().as_str(), location, fetched_at, current);
        if let Some(coord) = &parsed.coord {
            report = report.with_coordinates(coord.lat, coord.lon);
        }
        if let Some(astronomy) = astronomy {
            report = report.with_astronomy(astronomy);
        }

        match forecast {
            Ok(forecast) => {
                let hourly: Vec<WeatherData> = forecast
                    .list
                    .iter()
                    .filter(|entry| entry.dt.is_some())
                    .map(|entry| entry_data(entry, fetched_at))
                    .collect();
                report = report.with_hourly(hourly);
            }
            Err(err) => warn!(error = %err, "OpenWeather forecast unavailable"),
        }

        Ok(report)
    }
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    coord: Option<OwCoord>,
    sys: Option<OwSys>,
    #[serde(flatten)]
    entry: OwEntry,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    list: Vec<OwEntry>,
}

/// Fields shared by `/weather` and each `/forecast` list entry.
#[derive(Debug, Deserialize)]
struct OwEntry {
    dt: Option<i64>,
    main: Option<OwMain>,
    #[serde(default)]
    weather: Vec<serde_json::Value>,
    wind: Option<OwWind>,
    clouds: Option<OwClouds>,
    visibility: Option<f64>,
    rain: Option<OwPrecip>,
    snow: Option<OwPrecip>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: Option<f64>,
    feels_like: Option<f64>,
    pressure: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: Option<f64>,
    deg: Option<f64>,
    gust: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwClouds {
    all: Option<f64>,
}

/// Current conditions report the last hour, forecast entries the last three.
#[derive(Debug, Deserialize)]
struct OwPrecip {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

impl OwPrecip {
    fn amount(&self) -> Option<f64> {
        self.one_hour.or(self.three_hours)
    }
}

fn entry_data(entry: &OwEntry, fallback: DateTime<Utc>) -> WeatherData {
    let mut data = WeatherData::new(entry.dt.and_then(unix_to_utc).unwrap_or(fallback));

    if let Some(main) = &entry.main {
        data.temperature = main.temp;
        data.feels_like = main.feels_like;
        data.pressure = main.pressure;
        data.humidity = main.humidity;
    }
    if let Some(wind) = &entry.wind {
        // m/s with units=metric
        data.wind_speed = wind.speed.map(|v| v * 3.6);
        data.wind_gust = wind.gust.map(|v| v * 3.6);
        data.set_wind(wind.deg, None);
    }
    data.cloud_cover = entry.clouds.as_ref().and_then(|c| c.all);
    data.visibility = entry.visibility.map(|m| m / 1000.0);

    let rain = entry.rain.as_ref().and_then(OwPrecip::amount);
    let snow = entry.snow.as_ref().and_then(OwPrecip::amount);
    data.precipitation = match (rain, snow) {
        (None, None) => None,
        (rain, snow) => Some(rain.unwrap_or_default() + snow.unwrap_or_default()),
    };

    if let Some(first) = entry.weather.first() {
        data.condition_str =
            first.get("description").and_then(|d| d.as_str()).map(capitalize_first);
        data.icon = first
            .get("icon")
            .and_then(|i| i.as_str())
            .map(|icon| format!("https://openweathermap.org/img/wn/{icon}@2x.png"));
    }
    if !entry.weather.is_empty() {
        data.condition = Some(serde_json::Value::Array(entry.weather.clone()));
    }

    data
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
