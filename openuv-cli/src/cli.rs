use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use inquire::{Confirm, CustomType, Text, validator::Validation};
use openuv_core::{
    Client, Config, Location, ReqwestSession,
    client::{DEFAULT_PROTECTION_HIGH, DEFAULT_PROTECTION_LOW},
    util::validate_api_key,
};
use tracing::info;

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "openuv", version, about = "OpenUV command-line client")]
pub struct Cli {
    /// Log request details (same as RUST_LOG=debug).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Per-invocation overrides of the stored configuration.
#[derive(Debug, Args)]
pub struct Overrides {
    /// API key; falls back to the configured one.
    #[arg(long, env = "OPENUV_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, global = true, allow_hyphen_values = true, requires = "lng")]
    pub lat: Option<f64>,

    #[arg(long, global = true, allow_hyphen_values = true, requires = "lat")]
    pub lng: Option<f64>,

    #[arg(long, global = true, allow_hyphen_values = true)]
    pub alt: Option<f64>,

    /// Check the API status before each request.
    #[arg(long, global = true)]
    pub check_status: bool,

    /// Disable retries of transient failures.
    #[arg(long, global = true)]
    pub no_retry: bool,

    /// Print the raw JSON payload instead of a summary.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store API key and location in the config file.
    Configure,

    /// Show the current UV index.
    Uv,

    /// Show today's hourly UV forecast.
    Forecast,

    /// Show when UV protection is needed.
    Protection {
        /// Low end of the UV index to monitor.
        #[arg(long, default_value_t = DEFAULT_PROTECTION_LOW)]
        low: f64,

        /// High end of the UV index to monitor.
        #[arg(long, default_value_t = DEFAULT_PROTECTION_HIGH)]
        high: f64,
    },

    /// Show API usage statistics.
    Stats,

    /// Show whether the API is up.
    Status,

    /// Check whether the API key is accepted.
    ValidateKey,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;

        let overrides = &self.overrides;
        let client = || overrides.client(&config);
        let json = overrides.json;

        match self.command {
            Command::Configure => configure(config.clone()),
            Command::ValidateKey => overrides.validate_key(&config).await,
            Command::Uv => output::uv_index(&client()?.uv_index().await?, json),
            Command::Forecast => output::forecast(&client()?.uv_forecast().await?, json),
            Command::Protection { low, high } => output::protection_window(
                &client()?.uv_protection_window(low, high).await?,
                json,
            ),
            Command::Stats => output::statistics(&client()?.api_statistics().await?, json),
            Command::Status => {
                let up = client()?.api_status().await?;
                println!("OpenUV API is {}", if up { "available" } else { "unavailable" });
                Ok(())
            }
        }
    }
}

impl Overrides {
    async fn validate_key(&self, config: &Config) -> anyhow::Result<()> {
        let api_key = match &self.api_key {
            Some(key) => key.as_str(),
            None => config.api_key()?,
        };
        let session = ReqwestSession::new(reqwest_client()?);
        let valid = validate_api_key(&session, api_key).await?;
        println!("API key is {}", if valid { "valid" } else { "NOT valid" });
        Ok(())
    }

    fn client(&self, config: &Config) -> anyhow::Result<Client> {
        let mut config = config.clone();

        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone());
        }
        if let (Some(latitude), Some(longitude)) = (self.lat, self.lng) {
            let altitude = self
                .alt
                .or(config.location.map(|l| l.altitude))
                .unwrap_or_default();
            config.location = Some(Location {
                latitude,
                longitude,
                altitude,
            });
        } else if let (Some(alt), Some(location)) = (self.alt, config.location.as_mut()) {
            location.altitude = alt;
        }
        if self.check_status {
            config.check_status_before_request = true;
        }

        let mut builder = config.client_builder()?.http_client(reqwest_client()?);
        if self.no_retry {
            builder = builder.retries_enabled(false);
        }

        Ok(builder.build())
    }
}

fn reqwest_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("openuv-cli/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let api_key = Text::new("OpenUV API key:")
        .with_default(config.api_key.as_deref().unwrap_or_default())
        .with_validator(|input: &str| {
            Ok(if input.trim().is_empty() {
                Validation::Invalid("API key must not be empty".into())
            } else {
                Validation::Valid
            })
        })
        .prompt()?;

    let current = config.location;
    let latitude = CustomType::<f64>::new("Latitude:")
        .with_starting_input(&current.map(|l| l.latitude.to_string()).unwrap_or_default())
        .prompt()?;
    let longitude = CustomType::<f64>::new("Longitude:")
        .with_starting_input(&current.map(|l| l.longitude.to_string()).unwrap_or_default())
        .prompt()?;
    let altitude = CustomType::<f64>::new("Altitude (meters):")
        .with_default(current.map(|l| l.altitude).unwrap_or_default())
        .prompt()?;
    let check_status = Confirm::new("Check API status before every request?")
        .with_default(config.check_status_before_request)
        .prompt()?;

    config.api_key = Some(api_key.trim().to_string());
    config.location = Some(Location {
        latitude,
        longitude,
        altitude,
    });
    config.check_status_before_request = check_status;
    config.save()?;

    info!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}
