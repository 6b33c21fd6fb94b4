use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    location::{Location, parse_location},
    provider::ProviderId,
    units::UnitSystem,
};

pub const HOME_CITY_ENV: &str = "HOME_CITY";
pub const HOME_LATITUDE_ENV: &str = "HOME_LATITUDE";
pub const HOME_LONGITUDE_ENV: &str = "HOME_LONGITUDE";

/// Configuration for a single provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Explicit on/off switch. When absent the provider is on if it can run
    /// (keyless, or a key is configured).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// units = "metric"
/// default_location = "home"
///
/// [locations]
/// home = "Sacramento, California"
///
/// [providers.weatherapi]
/// api_key = "..."
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub units: UnitSystem,

    /// Field groups shown by default; empty means all of them.
    pub show: Vec<String>,

    /// Per-source timeout in seconds.
    pub timeout_secs: u64,

    /// Days of forecast requested from each vendor.
    pub forecast_days: u8,

    /// Hourly and daily forecast rows printed by `show`; 0 hides the section.
    pub hourly_rows: usize,
    pub daily_rows: usize,

    /// Alias into `locations`.
    pub default_location: Option<String>,

    pub locations: BTreeMap<String, String>,

    pub providers: BTreeMap<String, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            units: UnitSystem::Imperial,
            show: Vec::new(),
            timeout_secs: 10,
            forecast_days: 7,
            hourly_rows: 0,
            daily_rows: 0,
            default_location: None,
            locations: BTreeMap::new(),
            providers: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "wxcompare", "wxcompare")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Set/replace a provider API key.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.entry(provider_id.as_str().to_string()).or_default().api_key = Some(api_key);
    }

    pub fn set_provider_enabled(&mut self, provider_id: ProviderId, enabled: bool) {
        self.providers.entry(provider_id.as_str().to_string()).or_default().enabled = Some(enabled);
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id)
            .and_then(|cfg| cfg.api_key.as_deref())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn is_provider_enabled(&self, provider_id: ProviderId) -> bool {
        let runnable = !provider_id.requires_api_key() || self.provider_api_key(provider_id).is_some();
        self.provider_config(provider_id).and_then(|cfg| cfg.enabled).unwrap_or(runnable)
    }

    /// Enabled providers in display order.
    pub fn enabled_provider_ids(&self) -> Vec<ProviderId> {
        ProviderId::all().iter().copied().filter(|id| self.is_provider_enabled(*id)).collect()
    }

    /// Fill API keys missing from the file from the environment
    /// (`WEATHERAPI_API_KEY`, `OPENWEATHERMAP_API_KEY`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for id in ProviderId::all() {
            let Some(var) = id.api_key_env() else { continue };
            if self.provider_api_key(*id).is_some() {
                continue;
            }
            if let Some(key) = lookup(var).filter(|k| !k.trim().is_empty()) {
                self.upsert_provider_api_key(*id, key);
            }
        }
    }

    /// Add or replace a named location. The first alias becomes the default.
    pub fn add_location(&mut self, alias: &str, value: &str) -> Result<()> {
        parse_location(value)?;
        self.locations.insert(alias.to_string(), value.trim().to_string());
        if self.default_location.is_none() {
            self.default_location = Some(alias.to_string());
        }
        Ok(())
    }

    /// Remove a named location; returns false when the alias is unknown.
    pub fn remove_location(&mut self, alias: &str) -> bool {
        let removed = self.locations.remove(alias).is_some();
        if removed && self.default_location.as_deref() == Some(alias) {
            self.default_location = None;
        }
        removed
    }

    pub fn set_default_location(&mut self, alias: &str) -> Result<()> {
        if !self.locations.contains_key(alias) {
            return Err(anyhow!(
                "Unknown location alias '{alias}'.\n\
                 Hint: run `wxcompare location add {alias} \"City, State\"` first."
            ));
        }
        self.default_location = Some(alias.to_string());
        Ok(())
    }

    /// Pick the location to report on.
    ///
    /// Order: the explicit argument (an alias or a literal location), the
    /// default alias, then `HOME_LATITUDE`/`HOME_LONGITUDE`, then `HOME_CITY`.
    pub fn resolve_location<F>(&self, explicit: Option<&str>, lookup: F) -> Result<Location>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(arg) = explicit {
            let value = self.locations.get(arg).map(String::as_str).unwrap_or(arg);
            return Ok(parse_location(value)?);
        }

        if let Some(value) = self.default_location.as_ref().and_then(|a| self.locations.get(a)) {
            return Ok(parse_location(value)?);
        }

        if let (Some(lat), Some(lon)) = (lookup(HOME_LATITUDE_ENV), lookup(HOME_LONGITUDE_ENV)) {
            return parse_location(&format!("{lat},{lon}")).with_context(|| {
                format!("{HOME_LATITUDE_ENV}/{HOME_LONGITUDE_ENV} do not form a valid coordinate pair")
            });
        }

        if let Some(city) = lookup(HOME_CITY_ENV) {
            return parse_location(&city)
                .with_context(|| format!("{HOME_CITY_ENV} is not a valid location"));
        }

        Err(anyhow!(
            "No location given.\n\
             Hint: pass one (e.g. `wxcompare show \"Sacramento, CA\"`), run \
             `wxcompare location add home \"City, State\"`, or set {HOME_CITY_ENV}."
        ))
    }
}
