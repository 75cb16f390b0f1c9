// SAT Padrón - command line: bulk CSV import and offline RFC checks

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use sat_padron::logging;
use sat_padron::{
    create_pool, acquire, load_all, run_bulk_check, setup_database,
    AccessMode, AppConfig, LoadOutcome,
};

/// SAT taxpayer-status tables: import and reconciliation
#[derive(Parser, Debug)]
#[clap(name = "sat-padron", version)]
struct Args {
    /// Configuration file (defaults to ./sat.toml when present)
    #[clap(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the configured CSV files into their tables
    Init {
        /// Create the default schema for missing tables first
        #[clap(long)]
        setup: bool,
    },
    /// Check a file of RFCs against every table and write the xlsx report
    Check {
        /// Text file with one RFC per line
        file: PathBuf,
        /// Report name (without extension)
        #[clap(long)]
        name: Option<String>,
    },
}

fn main() -> Result<()> {
    logging::init_tracing();

    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;

    match args.command {
        Command::Init { setup } => run_init(&config, setup),
        Command::Check { file, name } => run_check(&config, &file, name.as_deref()),
    }
}

fn run_init(config: &AppConfig, setup: bool) -> Result<()> {
    println!("🗄️  SAT Padrón - CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut db_config = config.database.clone();
    db_config.pool_size = 1;
    let pool = create_pool(&db_config, AccessMode::ReadWrite);
    let mut conn = acquire(&pool)
        .with_context(|| format!("opening database {}", config.database.path.display()))?;

    if setup {
        println!("\n🔧 Setting up database...");
        setup_database(&conn)?;
        println!("✓ Tables ready in {}", config.database.path.display());
    }

    let sources = config.import.sources()?;
    if sources.is_empty() {
        println!("\n⚠️  No files configured under [import.files]");
        return Ok(());
    }

    println!("\n📂 Loading {} file(s)...", sources.len());
    let summary = load_all(&mut conn, &sources, config.import.skip_rows);

    for file in &summary.files {
        match &file.outcome {
            LoadOutcome::Loaded { rows } => {
                println!("✓ {} → {}: {} registros", file.path.display(), file.table, rows)
            }
            LoadOutcome::SkippedEmpty => {
                println!("⚠️  {} → {}: archivo vacío", file.path.display(), file.table)
            }
            LoadOutcome::Failed { reason } => {
                println!("❌ {} → {}: {}", file.path.display(), file.table, reason)
            }
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Total de registros insertados: {}", summary.total_inserted());
    if summary.failed() > 0 {
        println!("❌ Archivos con error: {}", summary.failed());
    }

    Ok(())
}

fn run_check(config: &AppConfig, file: &std::path::Path, name: Option<&str>) -> Result<()> {
    let pool = create_pool(&config.database, AccessMode::ReadOnly);
    let report = run_bulk_check(file, name, &pool, &config.server.report_dir)
        .with_context(|| format!("checking {}", file.display()))?;

    info!("Report written to {}", report.path.display());
    println!("📊 {}", report.path.display());
    println!("   Total RFCs:       {}", report.summary.total);
    println!("   Encontrados:      {}", report.summary.found);
    println!("   No encontrados:   {}", report.summary.not_found);
    println!("   Tasa de éxito:    {}", report.summary.success_rate());
    if !report.failures.is_empty() {
        println!("   ⚠️  Consultas fallidas: {}", report.failures.len());
    }

    Ok(())
}
