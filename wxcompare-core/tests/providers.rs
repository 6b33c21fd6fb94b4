//! Provider tests against mocked vendor APIs.
//!
//! Every vendor is served by a WireMock server; providers are pointed at it
//! through their `with_base_url` builders.

use reqwest::Client;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};
use wxcompare_core::{
    Location, UnitSystem, ViewConfig, WeatherError, WeatherProvider, WeatherRequest, WeatherView,
    fetch_reports,
    provider::{
        geocode::Geocoder, nws::NwsProvider, open_meteo::OpenMeteoProvider,
        openweather::OpenWeatherProvider, weatherapi::WeatherApiProvider,
    },
};

// =============================================================================
// Test Helpers
// =============================================================================

fn coordinates() -> WeatherRequest {
    WeatherRequest::new(
        Location::Coordinates { latitude: 38.58, longitude: -121.49 },
        UnitSystem::Imperial,
    )
}

fn place(city: &str, state: &str) -> WeatherRequest {
    WeatherRequest::new(
        Location::Place { city: city.into(), state: Some(state.into()) },
        UnitSystem::Imperial,
    )
}

fn open_meteo_forecast() -> serde_json::Value {
    json!({
        "latitude": 38.58,
        "longitude": -121.49,
        "timezone": "America/Los_Angeles",
        "utc_offset_seconds": -28800,
        "current_weather": {
            "time": "2025-11-12T10:00",
            "temperature": 16.4,
            "windspeed": 9.7,
            "winddirection": 315,
            "weathercode": 0
        },
        "hourly": {
            "time": ["2025-11-12T11:00", "2025-11-12T10:00"],
            "temperature_2m": [17.0, 16.4],
            "relative_humidity_2m": [50, 55],
            "weathercode": [1, 0]
        },
        "daily": {
            "time": ["2025-11-12", "2025-11-13"],
            "temperature_2m_max": [19.0, 21.0],
            "temperature_2m_min": [7.0, 8.5],
            "weathercode": [0, 3],
            "sunrise": ["2025-11-12T06:45", "2025-11-13T06:46"],
            "sunset": ["2025-11-12T16:55", "2025-11-13T16:54"]
        }
    })
}

fn sacramento_geocode() -> serde_json::Value {
    json!({
        "results": [
            { "name": "Sacramento", "latitude": 36.0, "longitude": -100.0,
              "country_code": "US", "admin1": "Kentucky", "feature_code": "PPL" },
            { "name": "Sacramento", "latitude": 38.58, "longitude": -121.49,
              "country_code": "US", "admin1": "California", "feature_code": "PPLA" }
        ]
    })
}

fn weatherapi_forecast() -> serde_json::Value {
    json!({
        "location": { "name": "Sacramento", "region": "California", "lat": 38.58, "lon": -121.49,
                      "localtime_epoch": 1_762_970_400, "localtime": "2025-11-12 10:00" },
        "current": {
            "last_updated_epoch": 1_762_970_400,
            "temp_c": 15.0,
            "feelslike_c": 14.2,
            "wind_kph": 11.2,
            "wind_degree": 90,
            "wind_dir": "E",
            "humidity": 60,
            "pressure_mb": 1018.0,
            "precip_mm": 0.0,
            "vis_km": 16.0,
            "uv": 3.0,
            "condition": { "text": "Partly cloudy", "icon": "//cdn.weatherapi.com/weather/64x64/day/116.png", "code": 1003 }
        },
        "forecast": {
            "forecastday": [{
                "date": "2025-11-12",
                "day": { "maxtemp_c": 19.0, "mintemp_c": 6.0, "condition": { "text": "Sunny" } },
                "astro": { "sunrise": "06:45 AM", "sunset": "04:58 PM", "moonrise": "11:02 PM",
                           "moonset": "01:11 PM", "moon_phase": "Waning Crescent" },
                "hour": [
                    { "time_epoch": 1_762_974_000, "temp_c": 16.0 },
                    { "time_epoch": 1_762_970_400, "temp_c": 15.0 }
                ]
            }]
        },
        "alerts": {
            "alert": [
                { "event": "Frost Advisory", "headline": "Frost Advisory issued", "severity": "Minor",
                  "expires": "2999-01-01T00:00:00-08:00", "areas": "Sacramento Valley" },
                { "event": "Wind Advisory", "expires": "2000-01-01T00:00:00-08:00" }
            ]
        }
    })
}

fn openweather_current() -> serde_json::Value {
    json!({
        "coord": { "lat": 38.58, "lon": -121.49 },
        "weather": [{ "id": 800, "main": "Clear", "description": "clear sky", "icon": "01d" }],
        "main": { "temp": 18.0, "feels_like": 17.0, "pressure": 1017, "humidity": 40 },
        "visibility": 10000,
        "wind": { "speed": 5.0, "deg": 180 },
        "clouds": { "all": 0 },
        "dt": 1_762_970_400,
        "sys": { "sunrise": 1_762_958_700, "sunset": 1_762_995_300 },
        "name": "Sacramento"
    })
}

async fn mount_nws(server: &MockServer) {
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/points/38.5800,-121.4900"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {
                "forecast": format!("{uri}/gridpoints/STO/47,69/forecast"),
                "forecastHourly": format!("{uri}/gridpoints/STO/47,69/forecast/hourly"),
                "observationStations": format!("{uri}/gridpoints/STO/47,69/stations"),
                "relativeLocation": { "properties": { "city": "Sacramento", "state": "CA" } }
            }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gridpoints/STO/47,69/stations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "features": [{ "id": format!("{uri}/stations/KSAC") }]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/stations/KSAC/observations/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {
                "timestamp": "2025-11-12T17:53:00+00:00",
                "textDescription": "Clear",
                "temperature": { "value": 16.1, "unitCode": "wmoUnit:degC" },
                "windSpeed": { "value": 9.36, "unitCode": "wmoUnit:km_h-1" },
                "windDirection": { "value": 330, "unitCode": "wmoUnit:degree_(angle)" },
                "barometricPressure": { "value": 101_800, "unitCode": "wmoUnit:Pa" },
                "cloudLayers": [{ "amount": "CLR" }]
            }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gridpoints/STO/47,69/forecast/hourly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": { "periods": [
                { "startTime": "2025-11-12T11:00:00-08:00", "isDaytime": true, "temperature": 62,
                  "temperatureUnit": "F", "windSpeed": "5 mph", "windDirection": "NW",
                  "shortForecast": "Sunny" }
            ]}
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/alerts/active"))
        .and(query_param("point", "38.5800,-121.4900"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "features": [{ "properties": {
                "event": "Dense Fog Advisory",
                "headline": "Dense Fog Advisory until 10 AM",
                "severity": "Moderate",
                "expires": "2999-01-01T10:00:00-08:00",
                "areaDesc": "Sacramento Valley"
            }}]
        })))
        .mount(server)
        .await;
}

// =============================================================================
// Open-Meteo
// =============================================================================

mod open_meteo_tests {
    use super::*;

    #[tokio::test]
    async fn maps_current_series_and_astronomy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("current_weather", "true"))
            .and(query_param("temperature_unit", "celsius"))
            .and(query_param("timezone", "auto"))
            .respond_with(ResponseTemplate::new(200).set_body_json(open_meteo_forecast()))
            .mount(&server)
            .await;

        let provider = OpenMeteoProvider::new(Client::new()).with_base_url(server.uri());
        let report = provider.get_weather(&coordinates()).await.unwrap();

        assert_eq!(report.source(), "open_meteo");
        assert_eq!(report.location(), "38.58,-121.49");
        let current = report.current();
        assert_eq!(current.timestamp.to_rfc3339(), "2025-11-12T18:00:00+00:00");
        assert_eq!(current.temperature, Some(16.4));
        assert_eq!(current.condition_str.as_deref(), Some("Clear sky"));
        assert_eq!(current.wind_direction.as_deref(), Some("NW"));
        assert_eq!(current.humidity, Some(55.0));

        let hourly = report.hourly().unwrap();
        assert!(hourly.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(hourly[1].condition_str.as_deref(), Some("Mainly clear"));

        let daily = report.daily().unwrap();
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].timestamp.to_rfc3339(), "2025-11-12T08:00:00+00:00");
        assert_eq!(daily[1].temperature, Some(21.0));
        assert_eq!(daily[1].temperature_min, Some(8.5));

        let astronomy = report.astronomy().unwrap();
        assert_eq!(astronomy.sunrise.as_deref(), Some("2025-11-12T06:45:00-08:00"));
        assert_eq!(astronomy.sunset.as_deref(), Some("2025-11-12T16:55:00-08:00"));
    }

    #[tokio::test]
    async fn geocodes_place_names_before_fetching() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("name", "Sacramento"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sacramento_geocode()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("latitude", "38.58"))
            .respond_with(ResponseTemplate::new(200).set_body_json(open_meteo_forecast()))
            .expect(1)
            .mount(&server)
            .await;

        let http = Client::new();
        let provider = OpenMeteoProvider::new(http.clone())
            .with_base_url(server.uri())
            .with_geocoder(Geocoder::new(http).with_base_url(server.uri()));

        let report = provider.get_weather(&place("Sacramento", "CA")).await.unwrap();
        assert_eq!(report.location(), "Sacramento, CA");
        assert_eq!(report.latitude(), Some(38.58));
    }

    #[tokio::test]
    async fn unknown_place_is_invalid_location() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let http = Client::new();
        let provider = OpenMeteoProvider::new(http.clone())
            .with_base_url(server.uri())
            .with_geocoder(Geocoder::new(http).with_base_url(server.uri()));

        let err = provider.get_weather(&place("Atlantis", "CA")).await.unwrap_err();
        assert!(matches!(err, WeatherError::InvalidLocation(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_current_weather_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "latitude": 38.58, "longitude": -121.49 })),
            )
            .mount(&server)
            .await;

        let provider = OpenMeteoProvider::new(Client::new()).with_base_url(server.uri());
        let err = provider.get_weather(&coordinates()).await.unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse { .. }), "got {err:?}");
    }
}

// =============================================================================
// WeatherAPI.com
// =============================================================================

mod weatherapi_tests {
    use super::*;

    #[tokio::test]
    async fn maps_forecast_astronomy_and_active_alerts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .and(query_param("key", "KEY"))
            .and(query_param("q", "38.58,-121.49"))
            .and(query_param("alerts", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(weatherapi_forecast()))
            .mount(&server)
            .await;

        let provider = WeatherApiProvider::new("KEY".into(), Client::new()).with_base_url(server.uri());
        let report = provider.get_weather(&coordinates()).await.unwrap();

        assert_eq!(report.source(), "weatherapi");
        let current = report.current();
        assert_eq!(current.temperature, Some(15.0));
        assert_eq!(current.wind_direction.as_deref(), Some("E"));
        assert_eq!(
            current.icon.as_deref(),
            Some("https://cdn.weatherapi.com/weather/64x64/day/116.png")
        );

        let hourly = report.hourly().unwrap();
        assert_eq!(hourly.len(), 2);
        assert_eq!(hourly[0].temperature, Some(15.0));

        let daily = report.daily().unwrap();
        assert_eq!(daily[0].condition_str.as_deref(), Some("Sunny"));
        assert_eq!(daily[0].temperature_min, Some(6.0));
        assert_eq!(daily[0].timestamp.to_rfc3339(), "2025-11-12T08:00:00+00:00");

        assert_eq!(report.astronomy().unwrap().moon_phase.as_deref(), Some("Waning Crescent"));

        let alerts = report.alerts().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].event, "Frost Advisory");
        assert_eq!(alerts[0].area.as_deref(), Some("Sacramento Valley"));
    }

    #[tokio::test]
    async fn rejected_key_is_source_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "code": 2006, "message": "API key is invalid." }
            })))
            .mount(&server)
            .await;

        let provider = WeatherApiProvider::new("BAD".into(), Client::new()).with_base_url(server.uri());
        let err = provider.get_weather(&coordinates()).await.unwrap_err();
        match err {
            WeatherError::SourceUnavailable { provider, reason } => {
                assert_eq!(provider, "weatherapi");
                assert!(reason.contains("401"));
                assert!(reason.contains("API key is invalid"));
            }
            other => panic!("expected SourceUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let provider = WeatherApiProvider::new("KEY".into(), Client::new()).with_base_url(server.uri());
        let err = provider.get_weather(&coordinates()).await.unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse { .. }), "got {err:?}");
    }
}

// =============================================================================
// National Weather Service
// =============================================================================

mod nws_tests {
    use super::*;

    #[tokio::test]
    async fn follows_points_to_the_latest_observation() {
        let server = MockServer::start().await;
        mount_nws(&server).await;

        let provider = NwsProvider::new(Client::new()).with_base_url(server.uri());
        let report = provider.get_weather(&coordinates()).await.unwrap();

        assert_eq!(report.source(), "nws");
        assert_eq!(report.location(), "Sacramento, CA");
        let current = report.current();
        assert_eq!(current.temperature, Some(16.1));
        assert_eq!(current.pressure, Some(1018.0));
        assert_eq!(current.cloud_cover, Some(0.0));
        assert_eq!(current.wind_direction.as_deref(), Some("NNW"));

        let hourly = report.hourly().unwrap();
        assert_eq!(hourly[0].condition_str.as_deref(), Some("Sunny"));

        let alerts = report.alerts().unwrap();
        assert_eq!(alerts[0].event, "Dense Fog Advisory");
        assert_eq!(alerts[0].area.as_deref(), Some("Sacramento Valley"));
    }

    #[tokio::test]
    async fn forecast_failure_leaves_daily_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gridpoints/STO/47,69/forecast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_nws(&server).await;

        let provider = NwsProvider::new(Client::new()).with_base_url(server.uri());
        let report = provider.get_weather(&coordinates()).await.unwrap();

        assert!(report.daily().is_none());
        assert!(report.hourly().is_some());
    }

    #[tokio::test]
    async fn points_outside_coverage_are_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/points/51.5000,-0.1200"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "title": "Data Unavailable For Requested Point"
            })))
            .mount(&server)
            .await;

        let provider = NwsProvider::new(Client::new()).with_base_url(server.uri());
        let request = WeatherRequest::new(
            Location::Coordinates { latitude: 51.5, longitude: -0.12 },
            UnitSystem::Metric,
        );
        let err = provider.get_weather(&request).await.unwrap_err();
        assert!(matches!(err, WeatherError::SourceUnavailable { .. }), "got {err:?}");
    }
}

// =============================================================================
// OpenWeatherMap
// =============================================================================

mod openweather_tests {
    use super::*;

    #[tokio::test]
    async fn current_conditions_are_metric_and_forecast_is_optional() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("appid", "KEY"))
            .and(query_param("units", "metric"))
            .and(query_param("lat", "38.58"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openweather_current()))
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::new("KEY".into(), Client::new()).with_base_url(server.uri());
        let report = provider.get_weather(&coordinates()).await.unwrap();

        assert_eq!(report.source(), "open_weather");
        let current = report.current();
        assert_eq!(current.temperature, Some(18.0));
        assert_eq!(current.wind_speed, Some(18.0));
        assert_eq!(current.wind_direction.as_deref(), Some("S"));
        assert_eq!(current.visibility, Some(10.0));
        assert_eq!(current.condition_str.as_deref(), Some("Clear sky"));
        assert!(report.astronomy().unwrap().sunrise.is_some());
        // no /forecast mock: the 404 is tolerated
        assert!(report.hourly().is_none());
    }

    #[tokio::test]
    async fn missing_main_block_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cod": 200 })))
            .mount(&server)
            .await;

        let provider = OpenWeatherProvider::new("KEY".into(), Client::new()).with_base_url(server.uri());
        let err = provider.get_weather(&coordinates()).await.unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse { .. }), "got {err:?}");
    }
}

// =============================================================================
// Aggregation
// =============================================================================

#[tokio::test]
async fn view_keeps_responding_sources_and_notes_the_rest() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(open_meteo_forecast()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forecast.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let http = Client::new();
    let providers: Vec<Box<dyn WeatherProvider>> = vec![
        Box::new(OpenMeteoProvider::new(http.clone()).with_base_url(server.uri())),
        Box::new(WeatherApiProvider::new("KEY".into(), http).with_base_url(server.uri())),
    ];

    let outcomes = fetch_reports(&providers, &coordinates()).await;
    let view = WeatherView::from_outcomes(&ViewConfig::new(UnitSystem::Imperial), outcomes);

    assert_eq!(view.reports.len(), 1);
    assert_eq!(view.reports[0].source(), "open_meteo");
    assert_eq!(view.failures.len(), 1);
    assert_eq!(view.failures[0].source, "weatherapi");
    assert!(view.summary.starts_with("Clear sky, "));
    assert!(view.summary.ends_with("(1 of 2 sources responded)"));
}
