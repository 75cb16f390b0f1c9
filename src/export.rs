// 📤 CSV export of a whole table

use crate::db::RowSet;
use crate::error::{Result, SatError};
use chrono::NaiveDate;
use serde_json::Value;

pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// `<slug>_YYYYmmdd.csv`
pub fn export_file_name(slug: &str, date: NaiveDate) -> String {
    format!("{}_{}.csv", slug, date.format("%Y%m%d"))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Serialize rows as UTF-8 CSV.
///
/// The header is only written when there is at least one row, so an empty
/// table exports as an empty file.
pub fn rows_to_csv(rows: &RowSet) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    if !rows.is_empty() {
        writer.write_record(&rows.columns)?;
    }

    for row in &rows.rows {
        writer.write_record(row.iter().map(cell_text))?;
    }

    writer
        .into_inner()
        .map_err(|e| SatError::Internal(format!("CSV buffer: {}", e)))
}
