//! Place-name lookup through the Open-Meteo geocoding API.
//!
//! Open-Meteo and NWS both need coordinates; this resolves "City, State"
//! input for them. Results are filtered instead of trusting API ordering:
//! only populated places in the US whose state matches are accepted.

use reqwest::Client;
use serde::Deserialize;

use crate::{error::WeatherError, location::Location, provider::ProviderId};

use super::get_json;

pub const GEOCODE_BASE_URL: &str = "https://geocoding-api.open-meteo.com/v1";

const US_STATES: [(&str, &str); 51] = [
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("DC", "District of Columbia"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeoPlace {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub admin1: Option<String>,
    #[serde(default)]
    pub feature_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeoSearchResponse {
    #[serde(default)]
    results: Vec<GeoPlace>,
}

#[derive(Debug, Clone)]
pub struct Geocoder {
    http: Client,
    base_url: String,
}

impl Geocoder {
    pub fn new(http: Client) -> Self {
        Self { http, base_url: GEOCODE_BASE_URL.to_string() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Coordinates for `location`; place names are looked up, errors are
    /// attributed to `provider`.
    pub async fn resolve(
        &self,
        provider: ProviderId,
        location: &Location,
    ) -> Result<(f64, f64), WeatherError> {
        match location {
            Location::Coordinates { latitude, longitude } => Ok((*latitude, *longitude)),
            Location::Place { city, state } => {
                let place = self.search(provider, city, state.as_deref()).await?;
                Ok((place.latitude, place.longitude))
            }
        }
    }

    pub async fn search(
        &self,
        provider: ProviderId,
        city: &str,
        state: Option<&str>,
    ) -> Result<GeoPlace, WeatherError> {
        let url = format!("{}/search", self.base_url);
        let query = [
            ("name", city.to_string()),
            ("count", "10".to_string()),
            ("language", "en".to_string()),
            ("format", "json".to_string()),
        ];

        let parsed: GeoSearchResponse = get_json(&self.http, provider, &url, &query).await?;

        pick_place(parsed.results, state).ok_or_else(|| {
            let wanted = match state {
                Some(state) => format!("{city}, {state}"),
                None => city.to_string(),
            };
            WeatherError::InvalidLocation(format!("no populated place matches '{wanted}'"))
        })
    }
}

fn pick_place(results: Vec<GeoPlace>, state: Option<&str>) -> Option<GeoPlace> {
    results.into_iter().find(|place| {
        let populated = place.feature_code.as_deref().is_some_and(|code| code.starts_with("PPL"));
        let state_ok = match state {
            None => true,
            Some(state) => {
                place.country_code.as_deref() == Some("US")
                    && place.admin1.as_deref().is_some_and(|admin1| state_matches(admin1, state))
            }
        };
        populated && state_ok
    })
}

/// `wanted` may be the full state name or its postal abbreviation.
fn state_matches(admin1: &str, wanted: &str) -> bool {
    let wanted = wanted.trim();
    if admin1.eq_ignore_ascii_case(wanted) {
        return true;
    }
    US_STATES
        .iter()
        .find(|(abbr, _)| abbr.eq_ignore_ascii_case(wanted))
        .is_some_and(|(_, name)| name.eq_ignore_ascii_case(admin1))
}
