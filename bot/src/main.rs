use blacksky_db::legacy;
use blacksky_lib::{
    commands::REGISTRY,
    config::{Config, Secrets},
    data::RawAppState,
    janitor, server,
};
use blacksky_traits::ForwardRefToTracing;
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use dotenvy::dotenv;
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::util::SubscriberInitExt;

/// The cli arguments for the bot
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Load everything, then exit without serving
    #[arg(short, long, default_value = "false")]
    pub dry_run: bool,

    /// Path to the config file
    #[arg(short, long, default_value_t = String::from("config.toml"))]
    pub config: String,

    /// Import an old `store.json` into the database before starting
    #[arg(long)]
    pub import_json: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_file = dotenv();
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .finish()
        .init();

    env_file.trace_warn_ok("no .env file loaded, using the process environment");

    let Args {
        dry_run,
        config: config_path,
        import_json,
    } = Args::parse();
    let config = Config::create_from_file(&config_path).wrap_err("Failed to load config")?;
    let secrets = Secrets::from_env();

    if secrets.bridge_secret.is_none() {
        tracing::warn!("BRIDGE_SECRET is not set, webhooks accept unauthenticated requests");
    }

    let state = Arc::new(RawAppState::new(config, config_path, secrets)?);
    tracing::info!("loaded {} commands, {} known users", REGISTRY.len(), state.users.len());

    if let Some(path) = import_json {
        let report = legacy::import_json_file(&state.db, &path, chrono::Utc::now())
            .wrap_err_with(|| format!("Failed to import {}", path.display()))?;
        tracing::info!("imported {}: {report}", path.display());
    }

    if dry_run {
        println!("Bot setup worked, dry run enabled, exiting");
        return Ok(());
    }

    let janitor = tokio::spawn(janitor(Arc::clone(&state)));

    tracing::info!("Starting bot");
    let served = server::serve(Arc::clone(&state), shutdown_signal()).await;

    janitor.abort();
    let flushed = state.db.flush().await.wrap_err("Failed to flush the database")?;
    tracing::info!("flushed {flushed} bytes, bye");

    served
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .trace_warn_ok("failed to listen for Ctrl-C");
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutting down");
}
