//! dsclient Probe - Command-Line Access to a Datasource
//!
//! Runs one client call against a configured server and prints the JSON
//! result to stdout.
//!
//! # Usage
//!
//! ```bash
//! # Health probe and pass/fail summary
//! dsclient-probe health
//! dsclient-probe test
//!
//! # Run a batch or an annotation from a JSON file
//! dsclient-probe query --file batch.json
//! dsclient-probe annotations --file annotation.json
//!
//! # Plugin resources
//! dsclient-probe resource labels --param match=up
//! dsclient-probe resource rules --post body.json
//!
//! # Override the config file, server or datasource
//! dsclient-probe -c ./client.toml -u http://grafana:3000 -d 7 health
//!
//! # Token from the command line instead of the file or DSCLIENT_API_TOKEN
//! dsclient-probe --api-token glsa_xxx health
//!
//! # Verbose logging
//! RUST_LOG=debug dsclient-probe query --file batch.json
//! ```
//!
//! # Exit Status
//!
//! `0` when the call succeeded, `1` when it could not run or produced a
//! failed result (an error result, a non-`OK` health status), `2` for usage
//! errors.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use dsclient_core::{
    load_config, load_config_from_path, ClientConfigFile, ConfigOverrides, DataSourceClient,
    HttpTransport,
};

/// dsclient Probe - run datasource queries from the command line
#[derive(Parser, Debug)]
#[command(name = "dsclient-probe")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "DSCLIENT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Server base URL
    #[arg(short = 'u', long, value_name = "URL")]
    base_url: Option<String>,

    /// Datasource id to act for
    #[arg(short = 'd', long, value_name = "ID")]
    datasource_id: Option<i64>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Bearer token, overriding the config file and `DSCLIENT_API_TOKEN`
    #[arg(long, value_name = "TOKEN")]
    api_token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "DSCLIENT_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Print JSON on one line
    #[arg(long)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

/// Client call to run
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the datasource health endpoint
    Health,

    /// Summarize the health probe as success or fail
    Test,

    /// Run a query batch
    Query {
        /// Batch request JSON
        #[arg(short = 'f', long, value_name = "FILE")]
        file: PathBuf,
    },

    /// Evaluate an annotation
    Annotations {
        /// Annotation request JSON
        #[arg(short = 'f', long, value_name = "FILE")]
        file: PathBuf,
    },

    /// Fetch or post to a plugin resource
    Resource {
        /// Resource path below the datasource
        path: String,

        /// Query parameter as `key=value` (repeatable)
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// POST this JSON file instead of sending a GET
        #[arg(long, value_name = "FILE")]
        post: Option<PathBuf>,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw}"))
}

/// Initialize logging with the specified level
///
/// Logs go to stderr so stdout only carries the JSON result.
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("dsclient_probe={level},dsclient_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Load the configuration file and apply command-line overrides
fn load(args: &Args) -> Result<ClientConfigFile> {
    let mut config = match args.config {
        Some(ref path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            load_config_from_path(Some(path.clone()))
        }
        None => load_config(),
    }
    .context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(ref url) = args.base_url {
        overrides = overrides.with_base_url(url);
    }
    if let Some(id) = args.datasource_id {
        overrides = overrides.with_datasource_id(id);
    }
    if let Some(secs) = args.timeout_secs {
        overrides = overrides.with_timeout_secs(secs);
    }
    if let Some(ref token) = args.api_token {
        overrides = overrides.with_api_token(token);
    }
    overrides.apply(&mut config);
    config
        .validate()
        .context("Invalid command-line overrides")?;

    info!(
        source = %config.source(),
        base_url = %config.client.base_url,
        datasource_id = config.instance.id,
        "Configuration loaded"
    );
    Ok(config)
}

/// Build a client over HTTP from the loaded configuration
fn connect(config: ClientConfigFile) -> Result<DataSourceClient> {
    if config.instance.id == 0 {
        warn!("No datasource id configured; calls will target datasource 0");
    }

    let mut transport =
        HttpTransport::new(&config.client).context("Failed to create HTTP transport")?;
    if config.client.send_org_header {
        transport = transport.with_org_id(config.runtime.org_id);
    }

    Ok(DataSourceClient::new(
        config.instance,
        config.runtime,
        Arc::new(transport),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let client = connect(load(&args)?)?;
    let outcome = commands::run(&client, &args.command).await?;

    let rendered = if args.compact {
        serde_json::to_string(&outcome.body)?
    } else {
        serde_json::to_string_pretty(&outcome.body)?
    };
    println!("{rendered}");

    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}
