//! repnet node binary.
//!
//! Reads `repnet.toml` (or the path given with `--config`), opens the SQLite
//! store, indexes its statements, and serves the lookup API over HTTP.
//!
//! # Key generation
//!
//! To create a signing key and the matching `signer` entity:
//!
//! ```text
//! cargo run -p repnet-node -- --generate-key
//! ```
//!
//! Put the printed `own_key` line into the config to let the node accept
//! `POST /api/statements` and sign its opinion on them.

mod config;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use clap::Parser;
use ed25519_dalek::SigningKey;
use rand_core::OsRng;
use repnet_api::AppState;
use repnet_core::{
  record::NewStatement,
  signing::{OwnKey, PublicKey},
  store::StatementWriter as _,
};
use repnet_engine::Engine;
use repnet_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::NodeConfig;

#[derive(Parser)]
#[command(author, version, about = "repnet reputation node")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "repnet.toml")]
  config: PathBuf,

  /// Print a freshly generated signing key and its public key, then exit.
  #[arg(long)]
  generate_key: bool,
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

  if cli.generate_key {
    let key = SigningKey::generate(&mut OsRng);
    println!("own_key = \"{}\"", STANDARD.encode(key.to_bytes()));
    println!("# signer: {}", PublicKey::from(&key));
    return Ok(());
  }

  let settings = ::config::Config::builder()
    .add_source(::config::File::from(cli.config).required(false))
    .add_source(::config::Environment::with_prefix("REPNET"))
    .build()
    .context("failed to read config file")?;

  let node_cfg: NodeConfig = settings
    .try_deserialize()
    .context("failed to deserialise NodeConfig")?;

  let store_path = expand_tilde(&node_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let trust = node_cfg.trust_table()?;
  tracing::info!(signers = trust.len(), default = node_cfg.default_trust, "loaded trust table");

  let engine = Engine::open(
    Arc::clone(&store),
    Arc::clone(&store),
    Arc::new(trust),
    node_cfg.engine_config(),
  )
  .await
  .context("failed to index statements")?;

  let mut state = AppState::new(engine);
  if let Some(key) = node_cfg.signing_key()? {
    let signer = store
      .insert_statement(NewStatement::signer(PublicKey::from(&key)))
      .await
      .context("failed to store own signer statement")?;
    state.engine.statement_added(&signer);
    let own = OwnKey::new(key, signer.id.as_signer());
    tracing::info!(signer = %own.signer(), key = %own.public_key(), "signing as own key");
    state = state.with_own_key(own);
  } else {
    tracing::info!("no own_key configured; submissions are disabled");
  }

  let app = repnet_api::api_router(Arc::new(state)).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", node_cfg.host, node_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
    })
    .await
    .context("server error")?;

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
