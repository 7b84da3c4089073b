//! sitecache - command-line client for a personal site's cached data.

mod cli;
mod commands;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sitecache_core::{Config, SiteContext};

use cli::Cli;

/// Daily-rolling log file name prefix inside the cache directory.
const LOG_FILE_PREFIX: &str = "sitecache.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr and, when a cache directory is available, to a daily
/// log file under it. The returned guard flushes the file writer on drop.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Cli::parse();

    let mut config = Config::load()?;
    if let Some(url) = args.api_url {
        config.api_url = url;
    }

    let log_dir = config.cache_dir().ok();
    if let Some(dir) = &log_dir {
        let _ = std::fs::create_dir_all(dir);
    }
    let _guard = init_tracing(log_dir.as_deref());
    info!(api = %config.api_url, "sitecache starting");

    let ctx = SiteContext::start(config).await?;
    let result = commands::run(&ctx, args.command).await;

    // Let background reconciliation finish before exiting
    ctx.shutdown().await;
    debug!("sitecache finished");
    result
}
