use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use restbarrel::config::Config;
use restbarrel::{CacheStore, RawResponse, RestClientBuilder, StaticConnectivity};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "restbarrel")]
#[command(about = "Fetch JSON from a REST API through a local offline cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/restbarrel/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Base URL, overriding the configured one
  #[arg(long, global = true)]
  base_url: Option<String>,

  /// Treat the network as unreachable and serve cached data only
  #[arg(long, global = true)]
  offline: bool,

  /// Disable the local cache for this run
  #[arg(long, global = true)]
  no_cache: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch a resource, using the cache when possible
  Get {
    resource: String,
    /// Cache duration in hours; 0 or less always asks the network
    #[arg(long, allow_negative_numbers = true)]
    hours: Option<i64>,
  },
  /// Create a resource (POST)
  Post {
    resource: String,
    /// JSON payload, or @path to read it from a file
    #[arg(short, long)]
    data: String,
  },
  /// Replace a resource (PUT)
  Put {
    resource: String,
    /// JSON payload, or @path to read it from a file
    #[arg(short, long)]
    data: String,
  },
  /// Delete a resource
  Delete { resource: String },
  /// Remove expired cache entries
  Purge {
    /// Remove every entry, not just expired ones
    #[arg(long)]
    all: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _guard = init_tracing();

  let args = Args::parse();
  let config = load_config(&args)?;

  let mut builder = RestClientBuilder::from_config(&config)?;
  if args.offline {
    builder = builder.connectivity(Arc::new(StaticConnectivity::offline()));
  }
  let client = builder.build()?;

  match args.command {
    Command::Get { resource, hours } => {
      let hours = hours.unwrap_or(config.cache.default_hours);
      let fetched = client.fetch_with_source::<Value>(&resource, hours).await?;
      info!(source = ?fetched.source, cached_at = ?fetched.cached_at, "fetched {}", resource);
      print_json(&fetched.data)?;
    }
    Command::Post { resource, data } => {
      let response = client.create(&resource, &read_payload(&data)?).await?;
      print_response(&response)?;
    }
    Command::Put { resource, data } => {
      let response = client.replace(&resource, &read_payload(&data)?).await?;
      print_response(&response)?;
    }
    Command::Delete { resource } => {
      let response = client.remove(&resource).await?;
      print_response(&response)?;
    }
    Command::Purge { all } => {
      let cache = client
        .cache()
        .ok_or_else(|| eyre!("The cache is disabled, nothing to purge"))?;
      let removed = if all {
        cache.empty_all()?
      } else {
        cache.empty_expired()?
      };
      info!("removed {} cache entries", removed);
    }
  }

  Ok(())
}

/// Logs go to stderr so stdout carries only response bodies.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
  let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
  let env_filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("restbarrel=info"));

  tracing_subscriber::registry()
    .with(env_filter)
    .with(
      fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(writer),
    )
    .init();

  guard
}

fn load_config(args: &Args) -> Result<Config> {
  let mut config = match (&args.config, &args.base_url) {
    (None, Some(url)) => Config::discover()?.unwrap_or_else(|| Config::from_base_url(url.clone())),
    (path, _) => Config::load(path.as_deref())?,
  };

  if let Some(url) = &args.base_url {
    config.api.base_url = url.clone();
  }
  if args.no_cache {
    config.cache.enabled = false;
  }

  Ok(config)
}

fn read_payload(data: &str) -> Result<Value> {
  let text = match data.strip_prefix('@') {
    Some(path) => std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read payload file {}: {}", path, e))?,
    None => data.to_string(),
  };

  serde_json::from_str(&text).map_err(|e| eyre!("Payload is not valid JSON: {}", e))
}

fn print_response(response: &RawResponse) -> Result<()> {
  info!(status = %response.status(), "request succeeded");

  if response.body().is_empty() {
    return Ok(());
  }

  match response.json::<Value>() {
    Ok(value) => print_json(&value),
    Err(_) => {
      println!("{}", response.text());
      Ok(())
    }
  }
}

fn print_json(value: &Value) -> Result<()> {
  let pretty = serde_json::to_string_pretty(value)?;
  println!("{}", pretty);
  Ok(())
}
