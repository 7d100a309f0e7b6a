//! lexi server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the Lexi JSON API over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use lexi_api::ApiState;
use lexi_core::entitlement::PlanPolicy;
use lexi_store_sqlite::SqliteStore;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Lexi API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

/// Runtime server configuration, deserialised from `config.toml`.
///
/// Every field can also be supplied through the environment with a `LEXI_`
/// prefix, e.g. `LEXI_WEBHOOK_SECRET`.
#[derive(Deserialize, Clone)]
struct ServerConfig {
  host:       String,
  port:       u16,
  store_path: PathBuf,
  /// Shared secret for billing webhook signature verification.
  webhook_secret: String,
  #[serde(default = "default_free_limit")]
  free_monthly_limit: u32,
  #[serde(default = "default_plus_limit")]
  plus_monthly_limit: u32,
}

fn default_free_limit() -> u32 {
  PlanPolicy::default().free_monthly_limit
}
fn default_plus_limit() -> u32 {
  PlanPolicy::default().plus_monthly_limit
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("LEXI"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let policy = PlanPolicy {
    free_monthly_limit: server_cfg.free_monthly_limit,
    plus_monthly_limit: server_cfg.plus_monthly_limit,
  };

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path, policy)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let state = ApiState {
    store:          Arc::new(store),
    webhook_secret: server_cfg.webhook_secret.clone(),
  };

  let app = lexi_api::api_router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~/` using `$HOME`.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
