// SAT Padrón - Core Library
// Taxpayer-status tables: loading, querying, reconciliation reports and the web layer

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod loader;
pub mod logging;
pub mod pagination;
pub mod queries;
pub mod reconciliation; // RFC list vs. the five SAT tables
pub mod report;         // xlsx output for reconciliation
pub mod tables;

#[cfg(feature = "server")]
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{
    DbPool, AccessMode, RowSet, LoadRecord,
    create_pool, acquire, setup_database, get_load_history,
};
pub use error::{Result, SatError};
pub use loader::{load_all, load_csv, FileLoad, LoadOutcome, LoadSummary};
pub use reconciliation::{
    ReconciliationEngine, ReconciliationReport, ReconciliationSummary,
    RfcCheck, LookupOutcome, LookupFailure, GeneratedReport,
    normalize_rfcs, run_bulk_check,
};
pub use tables::SatTable;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
