//! rdfsub hub server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered under
//! `RDFSUB_*` environment variables, opens the SQLite graph store, and serves
//! the hub over HTTP.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use rdfsub_hub::{AppState, HubConfig, admission::restore_triggers};
use rdfsub_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "RDF publish/subscribe hub")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("RDFSUB"))
    .build()
    .context("failed to read config file")?;

  let hub_cfg: HubConfig = settings
    .try_deserialize()
    .context("failed to deserialise HubConfig")?;

  let store = if hub_cfg.store_path.as_os_str() == ":memory:" {
    SqliteStore::open_in_memory()
      .await
      .context("failed to open in-memory store")?
  } else {
    let store_path = expand_tilde(&hub_cfg.store_path);
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?
  };

  let address = format!("{}:{}", hub_cfg.host, hub_cfg.port);
  let state = AppState::new(store, hub_cfg).context("failed to build HTTP client")?;

  // Subscriptions only outlive a restart when the registry graph is pinned.
  if state.config.registry_graph.is_some() {
    let restored = restore_triggers(&state)
      .await
      .context("failed to read registered subscriptions")?;
    tracing::info!(restored, "restored subscription triggers");
  }

  let app = rdfsub_hub::router(state);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
