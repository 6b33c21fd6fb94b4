use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use inquire::{Confirm, Password, PasswordDisplayMode};
use std::{convert::TryFrom, path::PathBuf, time::Duration};
use tracing::debug;
use wxcompare_core::{
    Config, ProviderId, UnitSystem, ViewConfig, WeatherRequest, WeatherView, fetch_reports,
    provider::providers_from_config, units::describe_unit_system,
};

use crate::render::{Field, RenderOptions, parse_fields, render_view};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "wxcompare", version, about = "Compare weather across providers")]
pub struct Cli {
    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Read and write settings at this path instead of the platform default.
    #[arg(long, value_name = "PATH", global = true, conflicts_with = "no_config")]
    pub config: Option<PathBuf>,

    /// Ignore the settings file and run on defaults plus environment.
    #[arg(long, global = true)]
    pub no_config: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "weatherapi" or "open_weather".
        provider: String,
    },

    /// Show current weather side by side for every enabled provider.
    Show(ShowArgs),

    /// Manage saved locations.
    Location {
        #[command(subcommand)]
        action: LocationAction,
    },

    /// Set the default unit system.
    Units {
        /// "imperial" or "metric".
        system: String,
    },

    /// Set the rows `show` prints by default. No names restores every row.
    Fields {
        /// Comma-separated rows, e.g. "temp,wind,humidity".
        #[arg(value_delimiter = ',')]
        fields: Vec<String>,
    },

    /// Set how many forecast rows `show` prints by default.
    Forecast {
        /// Hourly rows per source.
        #[arg(long)]
        hours: Option<usize>,

        /// Daily rows per source.
        #[arg(long)]
        days: Option<usize>,

        /// Hide both forecast sections.
        #[arg(long, conflicts_with_all = ["hours", "days"])]
        off: bool,
    },
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// "lat,lon", "City, State" or a saved alias. Defaults to the saved default.
    pub location: Option<String>,

    /// Same as the positional LOCATION.
    #[arg(short = 'l', long = "location", value_name = "LOCATION", conflicts_with = "location")]
    pub location_flag: Option<String>,

    /// "imperial" or "metric"; overrides the configured units.
    #[arg(short, long)]
    pub units: Option<String>,

    /// Comma-separated rows to show, e.g. "temp,wind,humidity".
    #[arg(long, value_delimiter = ',')]
    pub show: Vec<String>,

    /// Comma-separated providers to ask instead of the enabled ones.
    #[arg(long, value_delimiter = ',')]
    pub apis: Vec<String>,

    /// Hourly forecast rows per source; overrides the configured count.
    #[arg(long)]
    pub forecast_hours: Option<usize>,

    /// Daily forecast rows per source; overrides the configured count.
    #[arg(long)]
    pub forecast_days: Option<usize>,

    /// Per-source timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print the assembled view as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum LocationAction {
    /// Save a location under an alias.
    Add {
        alias: String,
        /// "lat,lon" or "City, State".
        location: String,
    },
    /// Forget a saved location.
    Remove { alias: String },
    /// Make a saved location the default.
    Default { alias: String },
    /// List saved locations.
    List,
}

/// Where settings come from and go to for this run.
#[derive(Debug, Clone, PartialEq)]
enum ConfigStore {
    Platform,
    File(PathBuf),
    Disabled,
}

impl ConfigStore {
    fn load(&self) -> anyhow::Result<Config> {
        match self {
            ConfigStore::Platform => Config::load(),
            ConfigStore::File(path) => Config::load_from(path),
            ConfigStore::Disabled => Ok(Config::default()),
        }
    }

    fn save(&self, config: &Config) -> anyhow::Result<PathBuf> {
        match self {
            ConfigStore::Platform => config.save(),
            ConfigStore::File(path) => {
                config.save_to(path)?;
                Ok(path.clone())
            }
            ConfigStore::Disabled => bail!(
                "Settings were not saved because --no-config is set.\n\
                 Hint: drop --no-config, or pass --config <PATH> to write elsewhere."
            ),
        }
    }
}

impl Cli {
    fn store(&self) -> ConfigStore {
        match (&self.config, self.no_config) {
            (_, true) => ConfigStore::Disabled,
            (Some(path), false) => ConfigStore::File(path.clone()),
            (None, false) => ConfigStore::Platform,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let store = self.store();

        match self.command {
            Command::Configure { provider } => configure(&store, &provider),
            Command::Show(args) => show(&store, args).await,
            Command::Location { action } => location(&store, action),
            Command::Units { system } => {
                let system: UnitSystem = system.parse()?;
                let mut config = store.load()?;
                config.units = system;
                let path = store.save(&config)?;
                println!("Default units set to {}", describe_unit_system(system));
                debug!(path = %path.display(), "config saved");
                Ok(())
            }
            Command::Fields { fields } => {
                let selected = parse_fields(&fields)?;
                let mut config = store.load()?;
                config.show = if fields.is_empty() {
                    Vec::new()
                } else {
                    selected.iter().map(|f| f.key().to_string()).collect()
                };
                store.save(&config)?;

                let keys: Vec<_> = selected.iter().map(|f| f.key()).collect();
                println!("Showing: {}", keys.join(", "));
                Ok(())
            }
            Command::Forecast { hours, days, off } => {
                let mut config = store.load()?;
                if off {
                    config.hourly_rows = 0;
                    config.daily_rows = 0;
                }
                if let Some(hours) = hours {
                    config.hourly_rows = hours;
                }
                if let Some(days) = days {
                    config.daily_rows = days;
                }
                if off || hours.is_some() || days.is_some() {
                    store.save(&config)?;
                }
                println!(
                    "Forecast rows: {} hourly, {} daily",
                    config.hourly_rows, config.daily_rows
                );
                Ok(())
            }
        }
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

async fn show(store: &ConfigStore, args: ShowArgs) -> anyhow::Result<()> {
    let mut config = store.load()?;
    config.apply_env(env_lookup);

    let units = match &args.units {
        Some(units) => units.parse()?,
        None => config.units,
    };
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }

    let fields: Vec<Field> =
        if args.show.is_empty() { parse_fields(&config.show)? } else { parse_fields(&args.show)? };

    let explicit = args.location.as_deref().or(args.location_flag.as_deref());
    let location = config.resolve_location(explicit, env_lookup)?;

    let ids = if args.apis.is_empty() {
        config.enabled_provider_ids()
    } else {
        args.apis
            .iter()
            .map(|name| ProviderId::try_from(name.as_str()))
            .collect::<anyhow::Result<Vec<_>>>()?
    };
    if ids.is_empty() {
        bail!(
            "No providers are enabled.\n\
             Hint: run `wxcompare configure <provider>` or pass --apis open_meteo,nws."
        );
    }

    let providers = providers_from_config(&ids, &config)?;
    let request = WeatherRequest::new(location, units)
        .with_timeout(Duration::from_secs(config.timeout_secs.max(1)));

    let outcomes = fetch_reports(&providers, &request).await;
    let view = WeatherView::from_outcomes(&ViewConfig::new(units), outcomes);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view).context("Failed to encode view as JSON")?);
    } else {
        let options = RenderOptions {
            fields,
            forecast_hours: args.forecast_hours.unwrap_or(config.hourly_rows),
            forecast_days: args.forecast_days.unwrap_or(config.daily_rows),
        };
        print!("{}", render_view(&view, &options));
    }

    if view.is_empty() {
        bail!("No weather source responded for {}", request.location);
    }
    Ok(())
}

fn configure(store: &ConfigStore, provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = store.load()?;

    println!("{}", id.description());

    if id.requires_api_key() {
        let existing = config.provider_api_key(id).is_some();
        let prompt = if existing {
            format!("{id} API key (leave empty to keep the current one):")
        } else {
            format!("{id} API key:")
        };

        let key = Password::new(&prompt)
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .prompt()
            .context("Failed to read API key")?;

        let key = key.trim();
        if !key.is_empty() {
            config.upsert_provider_api_key(id, key.to_string());
        } else if !existing {
            bail!("An API key is required for {id}");
        }
    }

    let enabled = Confirm::new(&format!("Query {id} when showing weather?"))
        .with_default(config.is_provider_enabled(id) || config.provider_config(id).is_none())
        .prompt()
        .context("Failed to read answer")?;
    config.set_provider_enabled(id, enabled);

    let path = store.save(&config)?;
    println!("Saved {id} settings to {}", path.display());
    Ok(())
}

fn location(store: &ConfigStore, action: LocationAction) -> anyhow::Result<()> {
    let mut config = store.load()?;

    match action {
        LocationAction::Add { alias, location } => {
            config.add_location(&alias, &location)?;
            store.save(&config)?;
            println!("Saved '{alias}' as {location}");
        }
        LocationAction::Remove { alias } => {
            if !config.remove_location(&alias) {
                bail!("Unknown location alias '{alias}'");
            }
            store.save(&config)?;
            println!("Removed '{alias}'");
        }
        LocationAction::Default { alias } => {
            config.set_default_location(&alias)?;
            store.save(&config)?;
            println!("Default location is now '{alias}'");
        }
        LocationAction::List => {
            if config.locations.is_empty() {
                println!("No saved locations. Add one with `wxcompare location add <alias> \"City, State\"`.");
            }
            for (alias, value) in &config.locations {
                let marker = if config.default_location.as_deref() == Some(alias) { "*" } else { " " };
                println!("{marker} {alias:<12} {value}");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_accepts_comma_separated_lists() {
        let cli = Cli::parse_from([
            "wxcompare",
            "show",
            "Sacramento, CA",
            "--apis",
            "open_meteo,nws",
            "--show",
            "temp,wind",
            "--forecast-hours",
            "6",
        ]);

        let Command::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert_eq!(args.location.as_deref(), Some("Sacramento, CA"));
        assert_eq!(args.apis, vec!["open_meteo", "nws"]);
        assert_eq!(args.show, vec!["temp", "wind"]);
        assert_eq!(args.forecast_hours, Some(6));
        assert_eq!(args.forecast_days, None);
        assert!(!args.json);
    }

    #[test]
    fn location_may_be_given_as_a_flag() {
        let cli = Cli::parse_from(["wxcompare", "-v", "show", "--location", "38.58,-121.49", "--json"]);
        let Command::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert_eq!(cli.verbose, 1);
        assert_eq!(args.location_flag.as_deref(), Some("38.58,-121.49"));
        assert!(args.json);
    }

    #[test]
    fn positional_and_flag_location_conflict() {
        let result =
            Cli::try_parse_from(["wxcompare", "show", "home", "--location", "38.58,-121.49"]);
        assert!(result.is_err());
    }

    #[test]
    fn location_subcommands_parse() {
        let cli = Cli::parse_from(["wxcompare", "location", "add", "home", "Sacramento, CA"]);
        assert!(matches!(
            cli.command,
            Command::Location { action: LocationAction::Add { ref alias, .. } } if alias == "home"
        ));
    }

    #[test]
    fn config_path_is_global() {
        let cli = Cli::parse_from(["wxcompare", "show", "home", "--config", "/tmp/wx.toml"]);
        assert_eq!(cli.store(), ConfigStore::File(PathBuf::from("/tmp/wx.toml")));

        let cli = Cli::parse_from(["wxcompare", "--no-config", "show", "38.58,-121.49"]);
        assert_eq!(cli.store(), ConfigStore::Disabled);

        let cli = Cli::parse_from(["wxcompare", "units", "metric"]);
        assert_eq!(cli.store(), ConfigStore::Platform);
    }

    #[test]
    fn config_path_and_no_config_conflict() {
        let result =
            Cli::try_parse_from(["wxcompare", "--config", "/tmp/wx.toml", "--no-config", "show"]);
        assert!(result.is_err());
    }

    #[test]
    fn disabled_store_loads_defaults_and_refuses_to_save() {
        let store = ConfigStore::Disabled;
        let config = store.load().unwrap();
        assert_eq!(config, Config::default());

        let err = store.save(&config).unwrap_err();
        assert!(err.to_string().contains("--no-config"));
    }

    #[test]
    fn file_store_round_trips_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::File(dir.path().join("wx.toml"));

        let mut config = store.load().unwrap();
        config.daily_rows = 3;
        let path = store.save(&config).unwrap();

        assert_eq!(path, dir.path().join("wx.toml"));
        assert_eq!(store.load().unwrap().daily_rows, 3);
    }

    #[test]
    fn fields_and_forecast_subcommands_parse() {
        let cli = Cli::parse_from(["wxcompare", "fields", "temp,wind,uv"]);
        assert!(matches!(cli.command, Command::Fields { ref fields } if fields == &["temp", "wind", "uv"]));

        let cli = Cli::parse_from(["wxcompare", "fields"]);
        assert!(matches!(cli.command, Command::Fields { ref fields } if fields.is_empty()));

        let cli = Cli::parse_from(["wxcompare", "forecast", "--hours", "12"]);
        assert!(matches!(
            cli.command,
            Command::Forecast { hours: Some(12), days: None, off: false }
        ));

        assert!(Cli::try_parse_from(["wxcompare", "forecast", "--off", "--days", "2"]).is_err());
    }
}
