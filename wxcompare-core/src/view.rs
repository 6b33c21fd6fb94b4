use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::debug;

use crate::{
    aggregate::SourceOutcome,
    model::WeatherReport,
    units::{MeasurementKind, UnitSystem, format_measurement},
};

pub const NO_DATA_SUMMARY: &str = "No weather data available";

/// Display settings that apply to a whole view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    pub app_name: String,
    pub app_version: String,
    pub units: UnitSystem,
    pub timezone: String,
}

impl ViewConfig {
    /// This crate's name and version, shown in the local UTC offset.
    pub fn new(units: UnitSystem) -> Self {
        Self {
            app_name: "wxcompare".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            units,
            timezone: format!("UTC{}", Local::now().offset()),
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }
}

/// A source that was asked but left out of the view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub reason: String,
}

/// Everything one render needs: the reports in display order plus metadata.
///
/// Reports keep their canonical metric values; `units` is applied by whoever
/// formats them.
#[derive(Debug, Serialize)]
pub struct WeatherView {
    pub app_name: String,
    pub app_version: String,
    pub units: UnitSystem,
    pub generated_at: DateTime<Utc>,
    pub timezone: String,
    pub summary: String,
    pub reports: Vec<WeatherReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<SourceFailure>,
}

impl WeatherView {
    pub fn assemble(config: &ViewConfig, reports: Vec<WeatherReport>) -> Self {
        let summary = summarize(reports.first(), config.units);
        Self {
            app_name: config.app_name.clone(),
            app_version: config.app_version.clone(),
            units: config.units,
            generated_at: Utc::now(),
            timezone: config.timezone.clone(),
            summary,
            reports,
            failures: Vec::new(),
        }
    }

    /// Assemble from per-source outcomes. Failed sources are recorded in
    /// `failures` and noted in the summary; they never fail the view.
    pub fn from_outcomes(config: &ViewConfig, outcomes: Vec<SourceOutcome>) -> Self {
        let requested = outcomes.len();
        let mut reports = Vec::with_capacity(requested);
        let mut failures = Vec::new();

        for outcome in outcomes {
            match outcome.result {
                Ok(report) => reports.push(report),
                Err(err) => {
                    debug!(source = %outcome.source, error = %err, "leaving source out of view");
                    failures.push(SourceFailure { source: outcome.source, reason: err.to_string() });
                }
            }
        }

        let mut view = Self::assemble(config, reports);
        if view.reports.len() < requested {
            view.summary
                .push_str(&format!(" ({} of {requested} sources responded)", view.reports.len()));
        }
        view.failures = failures;
        view
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

/// "<condition>, <temperature><unit>" over the first report's current conditions.
fn summarize(first: Option<&WeatherReport>, units: UnitSystem) -> String {
    let Some(report) = first else {
        return NO_DATA_SUMMARY.to_string();
    };

    let current = report.current();
    let condition = current.condition_label();
    let temperature = current
        .temperature
        .map(|t| format_measurement(MeasurementKind::Temperature, t, units));

    match (condition, temperature) {
        (Some(condition), Some(temperature)) => format!("{condition}, {temperature}"),
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => format!("No current conditions from {}", report.source()),
    }
}
