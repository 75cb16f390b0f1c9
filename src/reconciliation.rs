// ⚖️ Reconciliation Engine - Bulk RFC check against all SAT lists
//
// Input:  a text file, one RFC per line
// Output: per-RFC found/not-found classification, totals, and a
//         multi-sheet spreadsheet report
//
// A single RFC may legitimately appear in zero, one or several lists at
// once; surfacing that is the whole point of the report.

use crate::db::{self, DbPool};
use crate::error::{Result, SatError};
use crate::report;
use crate::tables::SatTable;
use chrono::{DateTime, Local};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Lines shorter than this (after trimming) are not RFCs
pub const MIN_RFC_LEN: usize = 10;

pub const FOUND_LABEL: &str = "SÍ";
pub const NOT_FOUND_LABEL: &str = "NO";
pub const NO_TABLES_LABEL: &str = "NO ENCONTRADO";

// ============================================================================
// INPUT NORMALIZATION
// ============================================================================

/// Trim, upper-case, drop short lines, dedupe keeping first-seen order
pub fn normalize_rfcs<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();

    lines
        .into_iter()
        .map(|line| line.as_ref().trim().to_uppercase())
        .filter(|rfc| rfc.chars().count() >= MIN_RFC_LEN)
        .filter(|rfc| seen.insert(rfc.clone()))
        .collect()
}

/// Read an uploaded RFC list. Bytes that are not valid UTF-8 are dropped.
pub fn read_rfc_file(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path)?;
    let text: String = String::from_utf8_lossy(&bytes)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect();

    Ok(normalize_rfcs(text.split(|c| c == '\n' || c == '\r')))
}

// ============================================================================
// LOOKUP
// ============================================================================

/// Outcome of checking one RFC against one table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LookupOutcome {
    Found,
    NotFound,
    Failed { reason: String },
}

/// Source of per-table RFC matches
pub trait RfcLookup {
    /// Whether `rfc` appears in `table` (exact, case-insensitive)
    fn contains(&self, table: SatTable, rfc: &str) -> Result<bool>;

    fn lookup(&self, table: SatTable, rfc: &str) -> LookupOutcome {
        match self.contains(table, rfc) {
            Ok(true) => LookupOutcome::Found,
            Ok(false) => LookupOutcome::NotFound,
            Err(e) => LookupOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

impl RfcLookup for Connection {
    fn contains(&self, table: SatTable, rfc: &str) -> Result<bool> {
        let count: i64 = self.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {}(rfc) = ?1",
                table.name(),
                db::RFC_UPPER_FN
            ),
            params![rfc.to_uppercase()],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// One input RFC and the tables it was found in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfcCheck {
    pub rfc: String,
    pub tables: Vec<SatTable>,
}

impl RfcCheck {
    pub fn is_found(&self) -> bool {
        !self.tables.is_empty()
    }

    /// `SÍ` / `NO`
    pub fn found_label(&self) -> &'static str {
        if self.is_found() {
            FOUND_LABEL
        } else {
            NOT_FOUND_LABEL
        }
    }

    /// Matching tables joined in fixed table order, or `NO ENCONTRADO`
    pub fn tables_label(&self) -> String {
        if self.tables.is_empty() {
            NO_TABLES_LABEL.to_string()
        } else {
            self.tables
                .iter()
                .map(|t| t.name())
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

/// A lookup that could not be answered; the RFC is still classified from the other tables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupFailure {
    pub rfc: String,
    pub table: SatTable,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    pub total: usize,
    pub found: usize,
    pub not_found: usize,
}

impl ReconciliationSummary {
    /// found/total×100 with two decimals, or `0%` for an empty run
    pub fn success_rate(&self) -> String {
        if self.total == 0 {
            "0%".to_string()
        } else {
            format!("{:.2}%", self.found as f64 / self.total as f64 * 100.0)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub checks: Vec<RfcCheck>,
    pub failures: Vec<LookupFailure>,
    pub reconciled_at: DateTime<Local>,
}

impl ReconciliationReport {
    pub fn summary(&self) -> ReconciliationSummary {
        let found = self.checks.iter().filter(|c| c.is_found()).count();
        ReconciliationSummary {
            total: self.checks.len(),
            found,
            not_found: self.checks.len() - found,
        }
    }

    pub fn found_checks(&self) -> impl Iterator<Item = &RfcCheck> {
        self.checks.iter().filter(|c| c.is_found())
    }

    pub fn not_found_checks(&self) -> impl Iterator<Item = &RfcCheck> {
        self.checks.iter().filter(|c| !c.is_found())
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    /// Tables checked, in report order
    pub tables: &'static [SatTable],
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine {
            tables: SatTable::ALL,
        }
    }

    /// Check one RFC against every table; failures are collected, not raised
    pub fn check_rfc<L: RfcLookup + ?Sized>(&self, lookup: &L, rfc: &str) -> (RfcCheck, Vec<LookupFailure>) {
        let mut tables = Vec::new();
        let mut failures = Vec::new();

        for table in self.tables {
            match lookup.lookup(*table, rfc) {
                LookupOutcome::Found => tables.push(*table),
                LookupOutcome::NotFound => {}
                LookupOutcome::Failed { reason } => {
                    warn!("Error buscando RFC {} en tabla {}: {}", rfc, table, reason);
                    failures.push(LookupFailure {
                        rfc: rfc.to_string(),
                        table: *table,
                        reason,
                    });
                }
            }
        }

        (
            RfcCheck {
                rfc: rfc.to_string(),
                tables,
            },
            failures,
        )
    }

    /// Classify every RFC, preserving input order
    pub fn reconcile<L: RfcLookup + ?Sized>(&self, rfcs: &[String], lookup: &L) -> ReconciliationReport {
        let mut checks = Vec::with_capacity(rfcs.len());
        let mut failures = Vec::new();

        for rfc in rfcs {
            let (check, mut check_failures) = self.check_rfc(lookup, rfc);
            checks.push(check);
            failures.append(&mut check_failures);
        }

        ReconciliationReport {
            checks,
            failures,
            reconciled_at: Local::now(),
        }
    }
}

// ============================================================================
// BATCH JOB
// ============================================================================

/// A report written to disk
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    /// Where this job's workbook was saved; never shared with another job
    pub path: PathBuf,
    /// Name offered for download (`<report_name>.xlsx`)
    pub file_name: String,
    /// The workbook bytes, as saved at `path`
    pub content: Vec<u8>,
    pub summary: ReconciliationSummary,
    pub failures: Vec<LookupFailure>,
}

/// Read `input`, check every RFC, and save the workbook into `output_dir`.
///
/// The file is `<report_name>.xlsx`, or a numbered variant when another job
/// already took that name. Fails with `EmptyInput` before touching the store,
/// and with `Connection` when no connection can be borrowed.
pub fn run_bulk_check(
    input: &Path,
    report_name: Option<&str>,
    pool: &DbPool,
    output_dir: &Path,
) -> Result<GeneratedReport> {
    let rfcs = read_rfc_file(input)?;
    if rfcs.is_empty() {
        return Err(SatError::EmptyInput);
    }

    let report = {
        let conn = db::acquire(pool)?;
        ReconciliationEngine::new().reconcile(&rfcs, &*conn)
    };

    let stem = report::resolve_report_name(report_name, report.reconciled_at);
    let file_name = format!("{}.xlsx", stem);
    let content = report::render_report(&report)?;
    let path = report::save_report(output_dir, &stem, &content)?;

    let summary = report.summary();
    info!(
        "Reporte {}: {} RFCs, {} encontrados, {} no encontrados ({}), {} fallas de consulta",
        path.display(),
        summary.total,
        summary.found,
        summary.not_found,
        summary.success_rate(),
        report.failures.len()
    );

    Ok(GeneratedReport {
        path,
        file_name,
        content,
        summary,
        failures: report.failures,
    })
}

// ============================================================================
// TESTS
// ============================================================================
