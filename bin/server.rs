// SAT Padrón - Web Server
// HTML pages, bulk RFC check and JSON API with Axum

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use sat_padron::logging;
use sat_padron::web::{build_router, AppState};
use sat_padron::{create_pool, AccessMode, AppConfig};

#[derive(Parser, Debug)]
#[clap(name = "sat-server", version)]
#[clap(about = "Web interface over the SAT taxpayer-status tables")]
struct Args {
    /// Configuration file (defaults to ./sat.toml when present)
    #[clap(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen address, overrides [server] bind
    #[clap(long, env = "SAT_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    println!("🌐 SAT Padrón - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if !config.database.path.exists() {
        // Requests answer 500 until the database shows up
        eprintln!("⚠️  Database not found at {:?}", config.database.path);
        eprintln!("   Run: sat-padron init --setup");
    }

    std::fs::create_dir_all(&config.server.report_dir)
        .with_context(|| format!("creating {}", config.server.report_dir.display()))?;

    let pool = create_pool(&config.database, AccessMode::ReadOnly);
    let state = AppState::new(pool, config.server.report_dir.clone());
    let app = build_router(state, config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;

    info!("Database: {}", config.database.path.display());
    info!("Reports:  {}", config.server.report_dir.display());
    println!("\n🚀 Server running on http://{}", config.server.bind);
    println!("   API: http://{}/api/health", config.server.bind);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
