use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, TimeZone};
use clap::{Args, Parser, Subcommand, ValueEnum};

use incidentpulse::config::{ConfigProvider, ConfigState, FileConfigStore, ServiceNowConfig};
use incidentpulse::report::render_outcome;
use incidentpulse::server::{self, AppState};
use incidentpulse::source::{IncidentProvider, MockOptions, MockSource, ServiceNowSource, Source};
use incidentpulse::IncidentPulse;

#[derive(Parser)]
#[command(name = "incidentpulse", about = "ServiceNow incident status summary")]
struct Cli {
    /// Config file path (default: ~/.incidentpulse/servicenow.json)
    #[arg(long)]
    config: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceKind {
    /// Deterministic generated history
    Mock,
    /// ServiceNow table API using the saved configuration
    Servicenow,
}

#[derive(Args, Clone, Debug)]
struct SourceArgs {
    /// Where incidents come from
    #[arg(long, value_enum, default_value = "mock")]
    source: SourceKind,
    /// Seed for the mock generator
    #[arg(long, default_value_t = 123_456)]
    seed: u32,
    /// Days of mock history before today
    #[arg(long, default_value_t = 120)]
    days: u32,
    /// Query string for ServiceNow (overrides the saved default query)
    #[arg(long)]
    query: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and print the incident summary once
    Summary {
        #[command(flatten)]
        source: SourceArgs,
        /// Reference time (RFC 3339); defaults to now
        #[arg(long)]
        now: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-fetch and print the summary periodically until interrupted
    Watch {
        #[command(flatten)]
        source: SourceArgs,
        /// Seconds between refreshes
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },
    /// Serve the summary over HTTP
    Serve {
        #[command(flatten)]
        source: SourceArgs,
        /// Listen address
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
    },
    /// Print the raw incident list as JSON
    Incidents {
        #[command(flatten)]
        source: SourceArgs,
        /// Reference time (RFC 3339); defaults to now
        #[arg(long)]
        now: Option<String>,
    },
    /// Manage ServiceNow connection settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the saved settings (token masked)
    Get,
    /// Save settings
    Set {
        /// API endpoint, e.g. https://instance.service-now.com/api/now/table/incident
        #[arg(long)]
        base_url: String,
        /// Bearer token
        #[arg(long)]
        token: String,
        /// Query string appended when none is given per request
        #[arg(long)]
        default_query: Option<String>,
    },
    /// Remove saved settings
    Clear,
    /// Print the settings file location
    Path,
}

fn parse_now(now: Option<&str>) -> incidentpulse::Result<Option<DateTime<FixedOffset>>> {
    now.map(|s| {
        DateTime::parse_from_rfc3339(s.trim())
            .map_err(|e| incidentpulse::Error::InvalidTimestamp(format!("{s}: {e}")))
    })
    .transpose()
}

fn build_source<Tz: TimeZone>(
    args: &SourceArgs,
    store: &FileConfigStore,
    now: &DateTime<Tz>,
) -> incidentpulse::Result<Source> {
    match args.source {
        SourceKind::Mock => {
            let options = MockOptions {
                days_back: args.days,
                seed: args.seed,
            };
            Ok(Source::Mock(MockSource::generate_at(options, now)))
        }
        SourceKind::Servicenow => Ok(Source::ServiceNow(ServiceNowSource::new(store)?)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let store = Arc::new(match &cli.config {
        Some(path) => FileConfigStore::at(path),
        None => FileConfigStore::open()?,
    });

    match cli.command {
        Commands::Summary { source, now, json } => match parse_now(now.as_deref())? {
            Some(now) => handle_summary(&source, &store, &now, json).await?,
            None => handle_summary(&source, &store, &Local::now(), json).await?,
        },
        Commands::Incidents { source, now } => match parse_now(now.as_deref())? {
            Some(now) => handle_incidents(&source, &store, &now).await?,
            None => handle_incidents(&source, &store, &Local::now()).await?,
        },
        Commands::Watch { source, interval } => {
            let provider = build_source(&source, &store, &Local::now())?;
            handle_watch(IncidentPulse::new(provider), source.query, interval).await?;
        }
        Commands::Serve { source, addr } => {
            let provider = build_source(&source, &store, &Local::now())?;
            log::info!("Serving {} incidents", provider.name());
            server::run(AppState::new(provider, store.clone()), &addr).await?;
        }
        Commands::Config { action } => {
            handle_config(store.as_ref(), action)?;
        }
    }

    Ok(())
}

async fn handle_summary<Tz: TimeZone>(
    args: &SourceArgs,
    store: &FileConfigStore,
    now: &DateTime<Tz>,
    json: bool,
) -> anyhow::Result<()> {
    let pulse = IncidentPulse::new(build_source(args, store, now)?);
    let outcome = pulse.summary_at(args.query.clone(), now).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome?.response)?);
        return Ok(());
    }
    print!("{}", render_outcome(&outcome));
    if outcome.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

async fn handle_incidents<Tz: TimeZone>(
    args: &SourceArgs,
    store: &FileConfigStore,
    now: &DateTime<Tz>,
) -> anyhow::Result<()> {
    let provider = build_source(args, store, now)?;
    let incidents = provider.incidents(args.query.clone()).await?;
    println!("{}", serde_json::to_string_pretty(&incidents)?);
    Ok(())
}

async fn handle_watch<P: IncidentProvider>(
    pulse: IncidentPulse<P>,
    query: Option<String>,
    interval: u64,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let outcome = pulse.summary(query.clone()).await;
                print!("{}", render_outcome(&outcome));
                println!();
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Stopping watch");
                return Ok(());
            }
        }
    }
}

fn handle_config(store: &FileConfigStore, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get => match store.load()? {
            ConfigState::Configured(config) => {
                println!("base_url      = {}", config.base_url);
                println!("token         = {}", config.masked_token());
                println!(
                    "default_query = {}",
                    config.default_query.as_deref().unwrap_or("")
                );
            }
            ConfigState::Missing => println!("ServiceNow is not configured."),
        },
        ConfigAction::Set {
            base_url,
            token,
            default_query,
        } => {
            store.save(&ServiceNowConfig {
                base_url,
                token,
                default_query: default_query.filter(|q| !q.trim().is_empty()),
            })?;
            println!("Config updated.");
        }
        ConfigAction::Clear => {
            store.clear()?;
            println!("Config cleared.");
        }
        ConfigAction::Path => {
            println!("{}", store.path().display());
        }
    }
    Ok(())
}
