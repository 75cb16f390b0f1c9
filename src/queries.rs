// 🔎 Read-only queries behind the dashboard, search, statistics and table views

use crate::db::{self, RowSet};
use crate::error::Result;
use crate::pagination::{calculate_pagination, Pagination, PAGE_SIZE};
use crate::tables::SatTable;
use rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Per-table row cap for partial name searches
pub const NAME_SEARCH_LIMIT: i64 = 100;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: SatTable,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SituationCount {
    pub situacion_contribuyente: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableUpdate {
    pub table: SatTable,
    pub fecha_actualizacion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableUpdateStats {
    pub table: SatTable,
    pub ultima_actualizacion: Option<String>,
    pub total_registros: i64,
}

/// A row from one of the SAT tables, tagged with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct TaxpayerRecord {
    pub table: SatTable,
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl TaxpayerRecord {
    /// Look up a column value by name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// JSON object in column order with `tabla_origen` appended
    pub fn to_json(&self) -> Value {
        let mut object: Map<String, Value> = self
            .columns
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect();
        object.insert("tabla_origen".to_string(), Value::from(self.table.name()));
        Value::Object(object)
    }
}

impl Serialize for TaxpayerRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Rfc,
    Nombre,
}

impl SearchKind {
    /// Unknown kinds yield `None`, which searches nothing
    pub fn parse(value: &str) -> Option<SearchKind> {
        match value {
            "rfc" => Some(SearchKind::Rfc),
            "nombre" => Some(SearchKind::Nombre),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePage {
    pub table: SatTable,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub total: i64,
    #[serde(skip)]
    pub pagination: Pagination,
}

// ============================================================================
// COUNTS & STATISTICS
// ============================================================================

/// Row count of every table, in fixed table order
pub fn table_counts(conn: &Connection) -> Result<Vec<TableCount>> {
    SatTable::ALL
        .iter()
        .map(|table| {
            Ok(TableCount {
                table: *table,
                count: db::count_rows(conn, *table)?,
            })
        })
        .collect()
}

/// Situations in the 69-B listing, most frequent first
pub fn situation_counts(conn: &Connection) -> Result<Vec<SituationCount>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT situacion_contribuyente, COUNT(*) AS count
         FROM {}
         GROUP BY situacion_contribuyente
         ORDER BY count DESC",
        SatTable::ListadoCompleto69B.name()
    ))?;

    let situations = stmt
        .query_map([], |row| {
            Ok(SituationCount {
                situacion_contribuyente: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(situations)
}

fn last_update(conn: &Connection, table: SatTable) -> Result<Option<String>> {
    let value = conn.query_row(
        &format!("SELECT MAX(fecha_actualizacion) FROM {}", table.name()),
        [],
        |row| row.get_ref(0).map(db::value_to_json),
    )?;

    Ok(match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Latest `fecha_actualizacion` per table, most recent first (tables without data last)
pub fn last_updates(conn: &Connection) -> Result<Vec<TableUpdate>> {
    let mut updates = SatTable::ALL
        .iter()
        .map(|table| {
            Ok(TableUpdate {
                table: *table,
                fecha_actualizacion: last_update(conn, *table)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    updates.sort_by(|a, b| match (&a.fecha_actualizacion, &b.fecha_actualizacion) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    Ok(updates)
}

/// Latest update and row total per table, ordered by table name
pub fn update_stats(conn: &Connection) -> Result<Vec<TableUpdateStats>> {
    let mut stats = SatTable::ALL
        .iter()
        .map(|table| {
            Ok(TableUpdateStats {
                table: *table,
                ultima_actualizacion: last_update(conn, *table)?,
                total_registros: db::count_rows(conn, *table)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    stats.sort_by(|a, b| a.table.name().cmp(b.table.name()));
    Ok(stats)
}

/// Number of distinct non-null RFCs that appear more than once in `table`
pub fn duplicate_count(conn: &Connection, table: SatTable) -> Result<i64> {
    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM (
                SELECT rfc, COUNT(*) AS count
                FROM {}
                WHERE rfc IS NOT NULL
                GROUP BY rfc
                HAVING COUNT(*) > 1
            ) AS dups",
            table.name()
        ),
        [],
        |row| row.get(0),
    )?;

    Ok(count)
}

pub fn duplicate_counts(conn: &Connection) -> Result<Vec<TableCount>> {
    SatTable::ALL
        .iter()
        .map(|table| {
            Ok(TableCount {
                table: *table,
                count: duplicate_count(conn, *table)?,
            })
        })
        .collect()
}

// ============================================================================
// SEARCH
// ============================================================================

fn tag_rows(table: SatTable, rows: RowSet) -> Vec<TaxpayerRecord> {
    let RowSet { columns, rows } = rows;
    rows.into_iter()
        .map(|values| TaxpayerRecord {
            table,
            columns: columns.clone(),
            values,
        })
        .collect()
}

/// Exact RFC match (case-insensitive) across all tables, ordered by `numero` within each table
pub fn search_by_rfc(conn: &Connection, rfc: &str) -> Result<Vec<TaxpayerRecord>> {
    let needle = rfc.trim().to_uppercase();
    let mut results = Vec::new();

    for table in SatTable::ALL {
        let rows = db::query_rows(
            conn,
            &format!(
                "SELECT * FROM {} WHERE {}(rfc) = ?1 ORDER BY numero",
                table.name(),
                db::RFC_UPPER_FN
            ),
            params![needle],
        )?;
        results.extend(tag_rows(*table, rows));
    }

    Ok(results)
}

/// Partial name match across all tables, at most [`NAME_SEARCH_LIMIT`] rows per table
pub fn search_by_name(conn: &Connection, name: &str) -> Result<Vec<TaxpayerRecord>> {
    let pattern = format!("%{}%", name.trim());
    let mut results = Vec::new();

    for table in SatTable::ALL {
        let rows = db::query_rows(
            conn,
            &format!(
                "SELECT * FROM {} WHERE nombre_contribuyente LIKE ?1 ORDER BY numero LIMIT ?2",
                table.name()
            ),
            params![pattern, NAME_SEARCH_LIMIT],
        )?;
        results.extend(tag_rows(*table, rows));
    }

    Ok(results)
}

pub fn search(conn: &Connection, query: &str, kind: Option<&SearchKind>) -> Result<Vec<TaxpayerRecord>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    match kind {
        Some(SearchKind::Rfc) => search_by_rfc(conn, query),
        Some(SearchKind::Nombre) => search_by_name(conn, query),
        None => Ok(Vec::new()),
    }
}

// ============================================================================
// TABLE BROWSING
// ============================================================================

/// One page of a table ordered by `numero`, with the schema's column list
pub fn table_page(conn: &Connection, table: SatTable, requested_page: i64) -> Result<TablePage> {
    let total = db::count_rows(conn, table)?;
    let pagination = calculate_pagination(total, requested_page);

    let rows = db::query_rows(
        conn,
        &format!("SELECT * FROM {} ORDER BY numero LIMIT ?1 OFFSET ?2", table.name()),
        params![PAGE_SIZE, pagination.offset],
    )?;

    Ok(TablePage {
        table,
        columns: db::table_columns(conn, table)?,
        rows: rows.rows,
        total,
        pagination,
    })
}

/// Every row of a table ordered by `numero`
pub fn all_rows(conn: &Connection, table: SatTable) -> Result<RowSet> {
    db::query_rows(conn, &format!("SELECT * FROM {} ORDER BY numero", table.name()), [])
}
