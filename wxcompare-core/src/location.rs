use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::WeatherError;

/// A location as the user typed it: either coordinates or a place name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    Coordinates { latitude: f64, longitude: f64 },
    Place { city: String, state: Option<String> },
}

impl Location {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match self {
            Location::Coordinates { latitude, longitude } => Some((*latitude, *longitude)),
            Location::Place { .. } => None,
        }
    }

    /// "lat,lon" or "City,State" as most vendor `q=` parameters expect it.
    pub fn query(&self) -> String {
        match self {
            Location::Coordinates { latitude, longitude } => format!("{latitude},{longitude}"),
            Location::Place { city, state: Some(state) } => format!("{city},{state}"),
            Location::Place { city, state: None } => city.clone(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Coordinates { latitude, longitude } => write!(f, "{latitude},{longitude}"),
            Location::Place { city, state: Some(state) } => write!(f, "{city}, {state}"),
            Location::Place { city, state: None } => f.write_str(city),
        }
    }
}

/// Parse "lat,lon" or "City, State" (the state part is optional).
///
/// A numeric pair is tried first; anything else is a place name.
pub fn parse_location(location: &str) -> Result<Location, WeatherError> {
    let invalid = || {
        WeatherError::InvalidLocation(format!("'{location}' (expected 'lat,lon' or 'City, State')"))
    };

    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let (head, tail) = match trimmed.split_once(',') {
        Some((head, tail)) => (head.trim(), Some(tail.trim())),
        None => (trimmed, None),
    };

    let pair = tail.map(|tail| (head.parse::<f64>(), tail.parse::<f64>()));
    if let Some((Ok(latitude), Ok(longitude))) = pair {
        let in_range = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        if !in_range {
            return Err(invalid());
        }
        return Ok(Location::Coordinates { latitude, longitude });
    }

    if head.is_empty() {
        return Err(invalid());
    }

    Ok(Location::Place {
        city: head.to_string(),
        state: tail.filter(|s| !s.is_empty()).map(str::to_string),
    })
}
