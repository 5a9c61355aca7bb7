//! Audi CLI - Command-line tool for Audi Connect vehicle services
//!
//! Logs in with an Audi ID, caches the tokens and talks to the vehicle
//! services of the account.

mod commands;
mod config;
mod output;

use anyhow::{bail, Context, Result};
use audi_client::{AudiClient, HonkFlashMode, TokenProvider};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::remote::{ClimateAction, SourceArg};
use crate::config::{Args, Config, Credentials};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "audi-cli")]
#[command(author, version, about = "Audi Connect CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "AUDI_CONFIG")]
    config: Option<PathBuf>,

    /// Market country (e.g. DE)
    #[arg(long, env = "AUDI_COUNTRY")]
    country: Option<String>,

    /// Market language (e.g. de)
    #[arg(long, env = "AUDI_LANGUAGE")]
    language: Option<String>,

    /// Token cache location
    #[arg(long, env = "AUDI_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// Proxy URL for all requests
    #[arg(long, env = "AUDI_PROXY")]
    proxy: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with an Audi ID and cache the tokens
    Login {
        /// Audi ID (e-mail)
        #[arg(short, long, env = "AUDI_USER", requires = "password")]
        user: Option<String>,

        /// Password
        #[arg(short, long, env = "AUDI_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// JSON file with `user` and `pass`
        #[arg(long, conflicts_with = "user")]
        credentials: Option<PathBuf>,
    },

    /// Refresh the cached tokens
    Refresh,

    /// Show the logged-in user
    Whoami,

    /// List available markets (no login needed)
    Markets,

    /// List the vehicles of the account
    Vehicles,

    /// Show the vehicle status report
    Status {
        /// Vehicle identification number
        vin: String,

        /// Show the last report stored by the backend instead of asking the car
        #[arg(long)]
        stored: bool,
    },

    /// Lock the vehicle
    Lock {
        /// Vehicle identification number
        vin: String,

        /// Security PIN
        #[arg(long, env = "AUDI_PIN", hide_env_values = true)]
        pin: String,
    },

    /// Unlock the vehicle
    Unlock {
        /// Vehicle identification number
        vin: String,

        /// Security PIN
        #[arg(long, env = "AUDI_PIN", hide_env_values = true)]
        pin: String,
    },

    /// Start or stop pre-trip climatisation
    Climate {
        /// Vehicle identification number
        vin: String,

        /// Action
        #[arg(value_enum)]
        action: ClimateAction,

        /// Heater source
        #[arg(long, value_enum, default_value = "electric")]
        source: SourceArg,
    },

    /// Flash the lights
    Flash {
        /// Vehicle identification number
        vin: String,

        /// Duration in seconds
        #[arg(long, default_value = "10")]
        seconds: u32,
    },

    /// Honk and flash the lights
    Honk {
        /// Vehicle identification number
        vin: String,

        /// Duration in seconds
        #[arg(long, default_value = "10")]
        seconds: u32,
    },

    /// Show the latest trip statistic
    Trips {
        /// Vehicle identification number
        vin: String,

        /// Long-term statistic instead of the last trip
        #[arg(long)]
        long_term: bool,
    },

    /// Show the battery charger status (EV only)
    Charger {
        /// Vehicle identification number
        vin: String,
    },

    /// Show the parking position
    Position {
        /// Vehicle identification number
        vin: String,
    },

    /// List the services available for a vehicle
    Operations {
        /// Vehicle identification number
        vin: String,
    },

    /// Show the pairing status between account and vehicle
    Pairing {
        /// Vehicle identification number
        vin: String,
    },

    /// Register a push notification subscription
    PushRegister {
        /// Platform (e.g. google)
        platform: String,

        /// App ID
        app_id: String,

        /// Push token
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    if cli.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(&Args {
        country: cli.country.as_deref(),
        language: cli.language.as_deref(),
        token_file: cli.token_file.as_deref(),
        proxy: cli.proxy.as_deref(),
        output: cli.output.map(Into::into),
        no_color: cli.no_color,
    })?;

    let format = OutputFormat::from_str(&merged.output, true)
        .map_err(|e| anyhow::anyhow!("Invalid output format '{}': {}", merged.output, e))?;

    // Create output context
    let ctx = OutputContext::new(format, merged.no_color, cli.quiet);

    let client = AudiClient::new(merged.client).context("Failed to create Audi client")?;

    // Execute command
    match &cli.command {
        Commands::Login {
            user,
            password,
            credentials,
        } => {
            let (user, password) = match (user, password, credentials) {
                (_, _, Some(path)) => {
                    let credentials = Credentials::load_from(path)?;
                    (credentials.user, credentials.pass)
                }
                (Some(user), Some(password), None) => (user.clone(), password.clone()),
                _ => bail!("Either --user and --password or --credentials is required"),
            };
            commands::login(&client, &user, &password, &ctx).await?;
        }

        Commands::Markets => {
            commands::markets(&client, &ctx).await?;
        }

        Commands::Refresh => {
            // Expired access tokens are fine here, only the refresh tokens matter
            let path = &client.config().token_file;
            let tokens = TokenProvider::load(path)
                .context("Failed to read token cache")?
                .with_context(|| format!("No login in {}. Run `audi-cli login` first", path.display()))?;
            client.api().set_token_provider(tokens);
            commands::refresh(&client, &ctx).await?;
        }

        command => {
            restore_session(&client)?;
            run_logged_in(&client, command, &ctx).await?;
        }
    }

    Ok(())
}

/// Commands that need a cached login
async fn run_logged_in(client: &AudiClient, command: &Commands, ctx: &OutputContext) -> Result<()> {
    match command {
        Commands::Login { .. } | Commands::Markets | Commands::Refresh => {}

        Commands::Whoami => commands::whoami(client, ctx).await?,

        Commands::Vehicles => commands::vehicles(client, ctx).await?,

        Commands::Status { vin, stored } => commands::status(client, vin, *stored, ctx).await?,

        Commands::Lock { vin, pin } => commands::lock(client, vin, true, pin, ctx).await?,

        Commands::Unlock { vin, pin } => commands::lock(client, vin, false, pin, ctx).await?,

        Commands::Climate {
            vin,
            action,
            source,
        } => commands::climate(client, vin, *action, *source, ctx).await?,

        Commands::Flash { vin, seconds } => {
            commands::honk_flash(client, vin, HonkFlashMode::FlashOnly, *seconds, ctx).await?
        }

        Commands::Honk { vin, seconds } => {
            commands::honk_flash(client, vin, HonkFlashMode::HonkAndFlash, *seconds, ctx).await?
        }

        Commands::Trips { vin, long_term } => commands::trips(client, vin, *long_term, ctx).await?,

        Commands::Charger { vin } => commands::charger(client, vin, ctx).await?,

        Commands::Position { vin } => commands::position(client, vin, ctx).await?,

        Commands::Operations { vin } => commands::operations(client, vin, ctx).await?,

        Commands::Pairing { vin } => commands::pairing(client, vin, ctx).await?,

        Commands::PushRegister {
            platform,
            app_id,
            token,
        } => commands::push_register(client, platform, app_id, token, ctx).await?,
    }

    Ok(())
}

/// Restore the cached tokens or fail with a hint to log in
fn restore_session(client: &AudiClient) -> Result<()> {
    debug!("Restoring tokens from {}", client.config().token_file.display());
    let restored = client
        .restore_token()
        .context("Failed to read token cache")?;
    if !restored {
        bail!(
            "No valid login in {}. Run `audi-cli login` first",
            client.config().token_file.display()
        );
    }
    Ok(())
}

// Implement conversion for OutputFormat to string (for config merge)
impl From<OutputFormat> for &str {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}
