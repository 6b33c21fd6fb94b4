//! Plain-text rendering of a [`WeatherView`].

use anyhow::anyhow;
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use std::{fmt::Write as _, str::FromStr};
use wxcompare_core::{
    MeasurementKind, UnitSystem, WeatherData, WeatherReport, WeatherView, units::format_measurement,
};

const COLUMN_WIDTH: usize = 16;
const MISSING: &str = "--";

/// A row group of the comparison table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Temperature,
    FeelsLike,
    DewPoint,
    Wind,
    Humidity,
    Pressure,
    Precipitation,
    Visibility,
    Clouds,
    Uv,
}

impl Field {
    pub const fn all() -> &'static [Field] {
        &[
            Field::Temperature,
            Field::FeelsLike,
            Field::DewPoint,
            Field::Wind,
            Field::Humidity,
            Field::Pressure,
            Field::Precipitation,
            Field::Visibility,
            Field::Clouds,
            Field::Uv,
        ]
    }

    pub fn key(self) -> &'static str {
        match self {
            Field::Temperature => "temp",
            Field::FeelsLike => "feels",
            Field::DewPoint => "dewpoint",
            Field::Wind => "wind",
            Field::Humidity => "humidity",
            Field::Pressure => "pressure",
            Field::Precipitation => "precip",
            Field::Visibility => "visibility",
            Field::Clouds => "clouds",
            Field::Uv => "uv",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Field::Temperature => "Temperature",
            Field::FeelsLike => "Feels like",
            Field::DewPoint => "Dew point",
            Field::Wind => "Wind",
            Field::Humidity => "Humidity",
            Field::Pressure => "Pressure",
            Field::Precipitation => "Precipitation",
            Field::Visibility => "Visibility",
            Field::Clouds => "Cloud cover",
            Field::Uv => "UV index",
        }
    }

    fn value(self, data: &WeatherData, units: UnitSystem) -> Option<String> {
        let fmt = |kind, value: Option<f64>| value.map(|v| format_measurement(kind, v, units));

        match self {
            Field::Temperature => fmt(MeasurementKind::Temperature, data.temperature),
            Field::FeelsLike => fmt(
                MeasurementKind::Temperature,
                data.feels_like.or(data.wind_chill).or(data.heat_index),
            ),
            Field::DewPoint => fmt(MeasurementKind::Temperature, data.dew_point),
            Field::Wind => wind(data, units),
            Field::Humidity => fmt(MeasurementKind::Percent, data.humidity),
            Field::Pressure => fmt(MeasurementKind::Pressure, data.pressure),
            Field::Precipitation => fmt(MeasurementKind::Precipitation, data.precipitation),
            Field::Visibility => fmt(MeasurementKind::Distance, data.visibility),
            Field::Clouds => fmt(MeasurementKind::Percent, data.cloud_cover),
            Field::Uv => fmt(MeasurementKind::Index, data.uv),
        }
    }
}

impl FromStr for Field {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        let key = match key.as_str() {
            "temperature" => "temp",
            "feels_like" | "feelslike" => "feels",
            "dew_point" => "dewpoint",
            "precipitation" => "precip",
            "cloud_cover" | "cloud" => "clouds",
            other => other,
        };

        Field::all().iter().copied().find(|f| f.key() == key).ok_or_else(|| {
            let known: Vec<_> = Field::all().iter().map(|f| f.key()).collect();
            anyhow!("Unknown field '{s}'. Known fields: {}", known.join(", "))
        })
    }
}

/// Parse `--show` names; an empty list selects every field.
pub fn parse_fields(names: &[String]) -> anyhow::Result<Vec<Field>> {
    let names: Vec<_> = names.iter().filter(|n| !n.trim().is_empty()).collect();
    if names.is_empty() {
        return Ok(Field::all().to_vec());
    }
    names.into_iter().map(|n| n.parse()).collect()
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub fields: Vec<Field>,
    pub forecast_hours: usize,
    pub forecast_days: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { fields: Field::all().to_vec(), forecast_hours: 0, forecast_days: 0 }
    }
}

pub fn render_view(view: &WeatherView, options: &RenderOptions) -> String {
    let mut out = String::new();

    let place = view.reports.first().map(WeatherReport::location).unwrap_or("unknown location");
    let _ = writeln!(
        out,
        "{} {} | {place} | {} | {} {}",
        view.app_name,
        view.app_version,
        view.units,
        view.generated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        view.timezone,
    );
    let _ = writeln!(out, "{}", view.summary);

    if !view.reports.is_empty() {
        out.push('\n');
        render_table(&mut out, view, &options.fields);
        render_extras(&mut out, view);
    }

    if !view.failures.is_empty() {
        out.push('\n');
        for failure in &view.failures {
            let _ = writeln!(out, "Omitted {}: {}", failure.source, failure.reason);
        }
    }

    if options.forecast_hours > 0 {
        render_hourly(&mut out, view, options.forecast_hours);
    }
    if options.forecast_days > 0 {
        render_daily(&mut out, view, options.forecast_days);
    }

    out
}

fn cell(text: &str) -> String {
    // keep one space between columns
    let text: String = text.chars().take(COLUMN_WIDTH - 1).collect();
    format!("{text:<COLUMN_WIDTH$}")
}

fn render_table(out: &mut String, view: &WeatherView, fields: &[Field]) {
    let mut header = cell("");
    for report in &view.reports {
        header.push_str(&cell(report.source()));
    }
    let _ = writeln!(out, "{}", header.trim_end());

    for field in fields {
        let mut row = cell(field.label());
        for report in &view.reports {
            let value = field.value(report.current(), view.units);
            row.push_str(&cell(value.as_deref().unwrap_or(MISSING)));
        }
        let _ = writeln!(out, "{}", row.trim_end());
    }
}

fn wind(data: &WeatherData, units: UnitSystem) -> Option<String> {
    let speed = data.wind_speed.map(|s| format_measurement(MeasurementKind::Speed, s, units));
    let mut text = match (speed, data.wind_direction.as_deref()) {
        (Some(speed), Some(dir)) => format!("{speed} {dir}"),
        (Some(speed), None) => speed,
        (None, Some(dir)) => dir.to_string(),
        (None, None) => return None,
    };
    if let Some(gust) = data.wind_gust {
        let _ = write!(text, " G{}", format_measurement(MeasurementKind::Speed, gust, units));
    }
    Some(text)
}

fn render_extras(out: &mut String, view: &WeatherView) {
    for report in &view.reports {
        let mut lines = Vec::new();

        if let Some(condition) = report.current().condition_label() {
            lines.push(condition);
        }
        if let Some(astro) = report.astronomy().filter(|a| !a.is_empty()) {
            let parts: Vec<_> = [
                ("Sunrise", &astro.sunrise),
                ("Sunset", &astro.sunset),
                ("Moonrise", &astro.moonrise),
                ("Moonset", &astro.moonset),
                ("Moon", &astro.moon_phase),
            ]
            .into_iter()
            .filter_map(|(label, value)| value.as_ref().map(|v| format!("{label} {v}")))
            .collect();
            lines.push(parts.join(", "));
        }
        for alert in report.alerts().unwrap_or_default() {
            let mut line = format!("Alert: {}", alert.event);
            if let Some(severity) = &alert.severity {
                let _ = write!(line, " ({severity})");
            }
            if let Some(expires) = &alert.expires {
                let _ = write!(line, " until {expires}");
            }
            lines.push(line);
        }

        if lines.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{}:", report.source());
        for line in lines {
            let _ = writeln!(out, "  {line}");
        }
    }
}

fn render_hourly(out: &mut String, view: &WeatherView, hours: usize) {
    let cutoff = view.generated_at - Duration::hours(1);

    for report in &view.reports {
        let Some(hourly) = report.hourly() else {
            continue;
        };
        let upcoming: Vec<_> = hourly.iter().filter(|h| h.timestamp > cutoff).take(hours).collect();
        if upcoming.is_empty() {
            continue;
        }

        let _ = writeln!(out, "\nHourly forecast ({}):", report.source());
        for hour in upcoming {
            let _ = writeln!(
                out,
                "  {}  {}  {}",
                local_time(hour.timestamp, "%a %H:%M"),
                cell(&or_missing(Field::Temperature.value(hour, view.units))),
                hour.condition_label().as_deref().unwrap_or(MISSING),
            );
        }
    }
}

fn render_daily(out: &mut String, view: &WeatherView, days: usize) {
    let today = local_date(view.generated_at);

    for report in &view.reports {
        let Some(daily) = report.daily() else {
            continue;
        };
        let upcoming: Vec<_> =
            daily.iter().filter(|d| local_date(d.timestamp) >= today).take(days).collect();
        if upcoming.is_empty() {
            continue;
        }

        let _ = writeln!(out, "\nDaily forecast ({}):", report.source());
        for day in upcoming {
            let high = Field::Temperature.value(day, view.units);
            let low = day
                .temperature_min
                .map(|low| format_measurement(MeasurementKind::Temperature, low, view.units));
            let _ = writeln!(
                out,
                "  {}  High {}Low {}{}",
                local_time(day.timestamp, "%a %m-%d"),
                cell(&or_missing(high)),
                cell(&or_missing(low)),
                day.condition_label().as_deref().unwrap_or(MISSING),
            );
        }
    }
}

fn local_time(at: DateTime<Utc>, format: &str) -> String {
    at.with_timezone(&Local).format(format).to_string()
}

fn local_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

fn or_missing(value: Option<String>) -> String {
    value.unwrap_or_else(|| MISSING.to_string())
}
