// 📊 Reconciliation report - spreadsheet output and file naming

use crate::error::{Result, SatError};
use crate::reconciliation::{ReconciliationReport, RfcCheck};
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SHEET_RESULTS: &str = "Resultados";
pub const SHEET_SUMMARY: &str = "Resumen";
pub const SHEET_NOT_FOUND: &str = "No Encontrados";
pub const SHEET_FOUND: &str = "Encontrados";
pub const SHEET_DIAGNOSTICS: &str = "Diagnóstico";

const MAX_NAME_ATTEMPTS: u32 = 10_000;

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// ============================================================================
// NAMING
// ============================================================================

/// Default report name: `reporte_rfcs_YYYYmmdd_HHMMSS`
pub fn default_report_name(at: DateTime<Local>) -> String {
    format!("reporte_rfcs_{}", at.format("%Y%m%d_%H%M%S"))
}

/// Caller-supplied name made filesystem-safe, or the default when nothing usable remains
pub fn resolve_report_name(requested: Option<&str>, at: DateTime<Local>) -> String {
    requested
        .map(sanitize_report_name)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| default_report_name(at))
}

/// Reduce a name to `[A-Za-z0-9_.-]`.
///
/// Spanish accented letters fold to ASCII, whitespace and path separators
/// become `_`, anything else is dropped, and leading/trailing `.`/`_` are
/// trimmed so the result can never escape the report directory.
pub fn sanitize_report_name(name: &str) -> String {
    let folded: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .filter_map(fold_to_ascii)
        .collect();

    let joined = folded.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

fn fold_to_ascii(c: char) -> Option<char> {
    if c.is_ascii() {
        return Some(c);
    }
    if c.is_whitespace() {
        return Some(' ');
    }
    let folded = match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'Á' | 'À' | 'Ä' | 'Â' | 'Ã' => 'A',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'É' | 'È' | 'Ë' | 'Ê' => 'E',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'Ó' | 'Ò' | 'Ö' | 'Ô' | 'Õ' => 'O',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ç' => 'c',
        'Ç' => 'C',
        _ => return None,
    };
    Some(folded)
}

// ============================================================================
// SPREADSHEET
// ============================================================================

/// Sheets written for a report, in workbook order
pub fn sheet_names(report: &ReconciliationReport) -> Vec<&'static str> {
    let summary = report.summary();
    let mut sheets = vec![SHEET_RESULTS, SHEET_SUMMARY];

    if summary.not_found > 0 {
        sheets.push(SHEET_NOT_FOUND);
    }
    if summary.found > 0 {
        sheets.push(SHEET_FOUND);
    }
    if !report.failures.is_empty() {
        sheets.push(SHEET_DIAGNOSTICS);
    }

    sheets
}

/// Render the multi-sheet workbook in memory
pub fn render_report(report: &ReconciliationReport) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let summary = report.summary();

    for name in sheet_names(report) {
        let sheet = workbook.add_worksheet();
        sheet.set_name(name)?;

        match name {
            SHEET_RESULTS => write_checks(sheet, &header, report.checks.iter())?,
            SHEET_NOT_FOUND => write_checks(sheet, &header, report.not_found_checks())?,
            SHEET_FOUND => write_checks(sheet, &header, report.found_checks())?,
            SHEET_SUMMARY => {
                sheet.write_string_with_format(0, 0, "ESTADÍSTICA", &header)?;
                sheet.write_string_with_format(0, 1, "VALOR", &header)?;
                sheet.write_string(1, 0, "Total RFCs Procesados")?;
                sheet.write_number(1, 1, summary.total as f64)?;
                sheet.write_string(2, 0, "RFCs Encontrados")?;
                sheet.write_number(2, 1, summary.found as f64)?;
                sheet.write_string(3, 0, "RFCs No Encontrados")?;
                sheet.write_number(3, 1, summary.not_found as f64)?;
                sheet.write_string(4, 0, "Porcentaje de Éxito")?;
                sheet.write_string(4, 1, summary.success_rate())?;
                sheet.set_column_width(0, 26)?;
                sheet.set_column_width(1, 12)?;
            }
            SHEET_DIAGNOSTICS => {
                sheet.write_string_with_format(0, 0, "RFC", &header)?;
                sheet.write_string_with_format(0, 1, "TABLA", &header)?;
                sheet.write_string_with_format(0, 2, "ERROR", &header)?;
                for (i, failure) in report.failures.iter().enumerate() {
                    let row = (i + 1) as u32;
                    sheet.write_string(row, 0, failure.rfc.as_str())?;
                    sheet.write_string(row, 1, failure.table.name())?;
                    sheet.write_string(row, 2, failure.reason.as_str())?;
                }
                sheet.set_column_width(0, 18)?;
                sheet.set_column_width(1, 24)?;
                sheet.set_column_width(2, 60)?;
            }
            _ => {}
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Persist `content` as `<stem>.xlsx` in `dir`, or `<stem>_2.xlsx`, `<stem>_3.xlsx`, ...
/// when that name is taken.
///
/// Files are created with `create_new`, so concurrent jobs sharing a name
/// never write to the same path.
pub fn save_report(dir: &Path, stem: &str, content: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let file_name = if attempt == 1 {
            format!("{}.xlsx", stem)
        } else {
            format!("{}_{}.xlsx", stem, attempt)
        };
        let path = dir.join(file_name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(content)?;
                debug!("Workbook written to {}", path.display());
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(SatError::Internal(format!(
        "no free report name for {} in {}",
        stem,
        dir.display()
    )))
}

fn write_checks<'a>(
    sheet: &mut Worksheet,
    header: &Format,
    checks: impl Iterator<Item = &'a RfcCheck>,
) -> Result<()> {
    sheet.write_string_with_format(0, 0, "RFC", header)?;
    sheet.write_string_with_format(0, 1, "ENCONTRADO", header)?;
    sheet.write_string_with_format(0, 2, "TABLAS", header)?;

    for (i, check) in checks.enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, check.rfc.as_str())?;
        sheet.write_string(row, 1, check.found_label())?;
        sheet.write_string(row, 2, check.tables_label())?;
    }

    sheet.set_column_width(0, 18)?;
    sheet.set_column_width(1, 12)?;
    sheet.set_column_width(2, 50)?;
    Ok(())
}
