use crate::config::DatabaseConfig;
use crate::error::{Result, SatError};
use crate::tables::{SatTable, HISTORY_TABLE};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Shared connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Connection borrowed from the pool; returned when dropped
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

/// How pooled connections open the database file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Web layer: never writes, never creates the file
    ReadOnly,
    /// Loader: creates the file and tables when missing
    ReadWrite,
}

// ============================================================================
// POOL
// ============================================================================

/// Build a connection pool without opening any connection yet.
///
/// Connection failures surface per request from [`acquire`], so a store that
/// is down at startup does not keep the server from starting.
pub fn create_pool(config: &DatabaseConfig, mode: AccessMode) -> DbPool {
    let flags = match mode {
        AccessMode::ReadOnly => {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
        }
        AccessMode::ReadWrite => {
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
        }
    };

    let manager = SqliteConnectionManager::file(&config.path)
        .with_flags(flags)
        .with_init(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            register_functions(conn)
        });

    info!(
        "Database pool: {} ({:?}, max {} connections)",
        config.path.display(),
        mode,
        config.pool_size
    );

    Pool::builder()
        .max_size(config.pool_size.max(1))
        .min_idle(Some(0))
        .connection_timeout(config.connect_timeout())
        .build_unchecked(manager)
}

/// Unicode-aware upper-casing for RFC comparison.
///
/// SQLite's built-in `UPPER()` folds ASCII only, so `ñ` would never match `Ñ`.
pub const RFC_UPPER_FN: &str = "rfc_upper";

/// Register the SQL functions every query connection relies on
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        RFC_UPPER_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let upper = match ctx.get_raw(0) {
                ValueRef::Null => None,
                ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).to_uppercase()),
                ValueRef::Integer(i) => Some(i.to_string()),
                ValueRef::Real(f) => Some(f.to_string()),
                ValueRef::Blob(bytes) => Some(String::from_utf8_lossy(bytes).to_uppercase()),
            };
            Ok(upper)
        },
    )
}

/// Borrow a connection for the duration of one request or job
pub fn acquire(pool: &DbPool) -> Result<PooledConn> {
    pool.get().map_err(|e| SatError::Connection(e.to_string()))
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Create the default schema for tables that do not exist yet.
///
/// Existing tables are never altered: their columns are whatever the
/// operator defined, and the loader adapts to them.
pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL so the web layer can read while the loader writes
    conn.pragma_update(None, "journal_mode", "WAL")?;

    for table in SatTable::ALL {
        let situation = if table.has_situation() {
            "situacion_contribuyente TEXT,\n            "
        } else {
            ""
        };

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {name} (
            numero INTEGER,
            rfc TEXT,
            nombre_contribuyente TEXT,
            {situation}fecha_actualizacion TEXT DEFAULT CURRENT_TIMESTAMP
        )",
                name = table.name(),
                situation = situation,
            ),
            [],
        )?;

        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{slug}_rfc ON {name}(UPPER(rfc))",
                slug = table.slug(),
                name = table.name(),
            ),
            [],
        )?;
    }

    // ==========================================================================
    // Historial_Cargas (append-only audit trail of CSV imports)
    // ==========================================================================
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre_archivo TEXT NOT NULL,
            tabla TEXT NOT NULL,
            registros INTEGER NOT NULL,
            fecha_carga TEXT DEFAULT CURRENT_TIMESTAMP
        )",
            HISTORY_TABLE
        ),
        [],
    )?;

    debug!("Schema ready");
    Ok(())
}

/// Column names of a table, in declaration order
pub fn table_columns(conn: &Connection, table: SatTable) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table.name()))?;

    // PRAGMA table_info returns: (cid, name, type, notnull, dflt_value, pk)
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(columns)
}

pub fn count_rows(conn: &Connection, table: SatTable) -> Result<i64> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table.name()), [], |row| {
        row.get(0)
    })?;

    Ok(count)
}

// ============================================================================
// GENERIC ROWS
// ============================================================================

/// Rows of a table whose schema is only known at runtime
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

pub fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Run a query and keep every column as a JSON value
pub fn query_rows<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<RowSet> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let rows = stmt
        .query_map(params, |row| {
            (0..width)
                .map(|i| row.get_ref(i).map(value_to_json))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(RowSet { columns, rows })
}

// ============================================================================
// LOAD HISTORY (audit trail)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadRecord {
    pub id: i64,
    pub nombre_archivo: String,
    pub tabla: String,
    pub registros: i64,
    pub fecha_carga: Option<String>,
}

/// Append one audit row for a finished CSV import
pub fn insert_load_history(conn: &Connection, source_file: &str, table: SatTable, rows: usize) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {} (nombre_archivo, tabla, registros) VALUES (?1, ?2, ?3)",
            HISTORY_TABLE
        ),
        params![source_file, table.name(), rows as i64],
    )?;

    Ok(())
}

/// Most recent imports first
pub fn get_load_history(conn: &Connection, limit: usize) -> Result<Vec<LoadRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, nombre_archivo, tabla, registros, fecha_carga
         FROM {}
         ORDER BY id DESC
         LIMIT ?1",
        HISTORY_TABLE
    ))?;

    let records = stmt
        .query_map(params![limit as i64], |row| {
            Ok(LoadRecord {
                id: row.get(0)?,
                nombre_archivo: row.get(1)?,
                tabla: row.get(2)?,
                registros: row.get(3)?,
                fecha_carga: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}

// ============================================================================
// TEST SUPPORT
// ============================================================================
