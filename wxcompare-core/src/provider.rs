use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::{convert::TryFrom, fmt::Debug, time::Duration};
use tracing::debug;

use crate::{
    Config, WeatherReport, WeatherRequest,
    error::WeatherError,
    provider::{
        nws::NwsProvider, open_meteo::OpenMeteoProvider, openweather::OpenWeatherProvider,
        weatherapi::WeatherApiProvider,
    },
};

pub mod geocode;
pub mod nws;
pub mod open_meteo;
pub mod openweather;
pub mod weatherapi;

pub const USER_AGENT: &str = concat!("wxcompare/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenMeteo,
    WeatherApi,
    Nws,
    OpenWeather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "open_meteo",
            ProviderId::WeatherApi => "weatherapi",
            ProviderId::Nws => "nws",
            ProviderId::OpenWeather => "open_weather",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenMeteo, ProviderId::WeatherApi, ProviderId::Nws, ProviderId::OpenWeather]
    }

    pub fn requires_api_key(&self) -> bool {
        self.api_key_env().is_some()
    }

    /// Environment variable that may carry this provider's API key.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderId::WeatherApi => Some("WEATHERAPI_API_KEY"),
            ProviderId::OpenWeather => Some("OPENWEATHERMAP_API_KEY"),
            ProviderId::OpenMeteo | ProviderId::Nws => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "Open-Meteo: free global forecasts, no key required",
            ProviderId::WeatherApi => "WeatherAPI.com: current, 3-day forecast, astronomy, alerts (key)",
            ProviderId::Nws => "US National Weather Service: station observations and alerts, US only",
            ProviderId::OpenWeather => "OpenWeatherMap: current conditions and 3-hourly forecast (key)",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.trim().to_lowercase().replace('-', "_");

        match lower.as_str() {
            "open_meteo" | "openmeteo" => Ok(ProviderId::OpenMeteo),
            "weatherapi" | "weather_api" => Ok(ProviderId::WeatherApi),
            "nws" | "national_weather_service" | "weather.gov" => Ok(ProviderId::Nws),
            "open_weather" | "openweather" | "openweathermap" | "owm" => {
                Ok(ProviderId::OpenWeather)
            }
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: open_meteo, weatherapi, nws, open_weather."
            )),
        }
    }
}

/// A weather source. Implementations fetch vendor data and normalize it into
/// a [`WeatherReport`] holding canonical metric values.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn get_weather(&self, request: &WeatherRequest) -> Result<WeatherReport, WeatherError>;
}

/// HTTP client shared by all providers of one run.
pub fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
    http: Client,
) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = || {
        config.provider_api_key(id).map(str::to_owned).ok_or_else(|| {
            anyhow::anyhow!(
                "No API key configured for provider '{id}'.\n\
                 Hint: run `wxcompare configure {id}` and enter your API key."
            )
        })
    };

    let boxed: Box<dyn WeatherProvider> = match id {
        ProviderId::OpenMeteo => {
            Box::new(OpenMeteoProvider::new(http).with_forecast_days(config.forecast_days))
        }
        ProviderId::WeatherApi => Box::new(
            WeatherApiProvider::new(api_key()?, http).with_forecast_days(config.forecast_days),
        ),
        ProviderId::Nws => Box::new(NwsProvider::new(http)),
        ProviderId::OpenWeather => Box::new(OpenWeatherProvider::new(api_key()?, http)),
    };

    Ok(boxed)
}

/// Construct every provider in `ids`, in order.
pub fn providers_from_config(
    ids: &[ProviderId],
    config: &Config,
) -> anyhow::Result<Vec<Box<dyn WeatherProvider>>> {
    let http = http_client(Duration::from_secs(config.timeout_secs.max(1)))?;
    ids.iter().map(|id| provider_from_config(*id, config, http.clone())).collect()
}

/// GET `url` and decode the JSON body.
///
/// Transport failures and non-2xx statuses are `SourceUnavailable`;
/// an undecodable body is `MalformedResponse`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &Client,
    provider: ProviderId,
    url: &str,
    query: &[(&str, String)],
) -> Result<T, WeatherError> {
    debug!(%provider, url, "Sending request");

    let res = http
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| WeatherError::unavailable(provider.as_str(), format!("request failed: {e}")))?;

    let status = res.status();
    let body = res.text().await.map_err(|e| {
        WeatherError::unavailable(provider.as_str(), format!("failed to read response body: {e}"))
    })?;

    if !status.is_success() {
        return Err(WeatherError::unavailable(
            provider.as_str(),
            format!("request failed with status {status}: {}", truncate_body(&body)),
        ));
    }

    serde_json::from_str(&body)
        .map_err(|e| WeatherError::malformed(provider.as_str(), format!("failed to parse JSON: {e}")))
}

pub(crate) fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

/// Parse vendor timestamps: RFC 3339, or naive ISO 8601 (minutes or seconds,
/// or a bare date) taken as UTC.
pub(crate) fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    parse_naive(s).map(|dt| dt.and_utc())
}

/// Parse a zone-less wall-clock time (or bare date, at midnight) observed at `offset`.
pub(crate) fn parse_local(s: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    offset.from_local_datetime(&parse_naive(s)?).single()
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
