use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use sitecache_server::config::ServerConfig;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let config = ServerConfig::load()?;
    sitecache_server::run(config).await
}
