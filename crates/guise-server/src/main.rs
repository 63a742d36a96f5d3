//! guise-server binary.
//!
//! Reads `guise.toml` (or the path given with `--config`), opens the SQLite
//! identity store, and either serves the JSON API or runs a one-shot
//! resolution.
//!
//! ```text
//! guise-server serve
//! guise-server resolve --target <uuid> --context Work
//! guise-server bench --target <uuid> --iterations 500
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use guise_core::resolution::ResolveRequest;
use guise_engine::ResolutionEngine;
use guise_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Guise name-resolution server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "guise.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API (the default).
  Serve,
  /// Resolve one name, print the result as JSON, and exit.
  Resolve(RequestArgs),
  /// Time repeated resolutions of one request.
  Bench {
    #[command(flatten)]
    request:    RequestArgs,
    #[arg(short = 'n', long, default_value_t = 100)]
    iterations: u32,
  },
}

#[derive(Args)]
struct RequestArgs {
  /// The user whose name is being disclosed.
  #[arg(long)]
  target:    Uuid,
  /// The user asking for the name.
  #[arg(long)]
  requester: Option<Uuid>,
  /// The audience context to resolve for.
  #[arg(long)]
  context:   Option<String>,
}

impl From<RequestArgs> for ResolveRequest {
  fn from(args: RequestArgs) -> Self {
    Self {
      target_user_id:    args.target,
      requester_user_id: args.requester,
      context_name:      args.context,
    }
  }
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
  let cfg = ServerConfig::load(&cli.config)?;

  if let Some(parent) = cfg.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;
  let store = Arc::new(store);

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(&cfg, store).await,
    Command::Resolve(args) => {
      let engine = ResolutionEngine::new(store);
      let resolution = engine.resolve_name_with_audit(&args.into()).await;
      println!("{}", serde_json::to_string_pretty(&resolution)?);
      Ok(())
    }
    Command::Bench { request, iterations } => {
      let engine = ResolutionEngine::new(store);
      let report = engine.benchmark(&request.into(), iterations).await;
      println!("{}", serde_json::to_string_pretty(&report)?);
      Ok(())
    }
  }
}

async fn serve(cfg: &ServerConfig, store: Arc<SqliteStore>) -> anyhow::Result<()> {
  let app = axum::Router::new()
    .nest("/api", guise_api::api_router(store))
    .layer(TraceLayer::new_for_http());
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
