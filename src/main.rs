//! Graph Tutorial - interactive Microsoft Graph sample
//!
//! Signs in with the device code flow, then offers a small menu for reading
//! the inbox and sending mail through Microsoft Graph.

#![deny(clippy::all)]

mod auth;
mod config;
mod error;
mod graph;
mod menu;

use anyhow::{Context, Result};
use std::io;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::AppError;
use graph::GraphClient;

fn main() {
    // Load .env file (if present) before anything else
    if let Err(e) = dotenvy::dotenv() {
        // .env file is optional - only warn if it exists but could not be read
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            eprintln!("\nSet clientId and tenantId in config.dev.toml, or the environment variables:");
            eprintln!("  AZURE_CLIENT_ID=<your-app-registration-client-id>");
            eprintln!("  AZURE_TENANT_ID=<your-tenant-id or common>");
            std::process::exit(1);
        }
    };

    init_logging(&config.logging.level);

    info!("Starting Graph Tutorial v{}", env!("CARGO_PKG_VERSION"));
    if !config.sources.is_empty() {
        info!("Configuration layered from {:?}", config.sources);
    }

    // One request in flight at a time, so a single-threaded runtime is enough
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config)) {
        error!("Exiting after error: {:#}", e);
        if let Some(app_error) = e.downcast_ref::<AppError>() {
            eprintln!("{}", app_error.user_message());
        }
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging.
///
/// Logs go to stderr so they never interleave with the menu on stdout.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

async fn run(config: Config) -> Result<()> {
    println!("Rust Graph Tutorial\n");

    let graph = GraphClient::new(&config).context("Failed to create Graph client")?;

    let mut stdout = io::stdout();
    menu::greet_user(&graph, &mut stdout).await?;

    let stdin = io::stdin();
    let mut input = stdin.lock();
    menu::run(&graph, &mut input, &mut stdout).await?;

    Ok(())
}
