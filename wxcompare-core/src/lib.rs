//! Core library for the `wxcompare` CLI.
//!
//! This crate defines:
//! - Configuration, saved locations and credentials
//! - The normalized weather model shared by every source
//! - Lookup tables (units, WMO condition codes) and conversion helpers
//! - Provider implementations and partial-failure tolerant aggregation
//!
//! Values are stored in metric; unit conversion happens only at display time.

pub mod aggregate;
pub mod compass;
pub mod config;
pub mod error;
pub mod location;
pub mod model;
pub mod provider;
pub mod units;
pub mod view;
pub mod wmo;

pub use aggregate::{SourceOutcome, fetch_reports};
pub use compass::degrees_to_direction;
pub use config::{Config, ProviderConfig};
pub use error::WeatherError;
pub use location::{Location, parse_location};
pub use model::{Alert, Astronomy, WeatherData, WeatherReport, WeatherRequest};
pub use provider::{ProviderId, WeatherProvider};
pub use units::{MeasurementKind, UnitSystem, format_unit_description_full};
pub use view::{SourceFailure, ViewConfig, WeatherView};
pub use wmo::describe_wmo_code;
