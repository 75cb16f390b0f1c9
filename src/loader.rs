// 📥 CSV Bulk Loader - SAT source files → SQLite tables
//
// For each configured (table, file) pair:
//   1. Decode the file as Latin-1 and drop the configured preamble lines
//   2. Parse the CSV, skipping malformed records
//   3. Keep only columns that exist in the destination table
//   4. Insert every row plus one Historial_Cargas row in a single transaction

use crate::db;
use crate::error::{Result, SatError};
use crate::tables::SatTable;
use rusqlite::{Connection, DropBehavior};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Cell values treated as missing, matching the usual spreadsheet/CSV conventions
pub const NULL_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

// ============================================================================
// PARSING
// ============================================================================

/// Parsed CSV: header plus rows with nulls already normalized
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvFrame {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    /// Records dropped as malformed
    pub skipped_records: usize,
}

impl CsvFrame {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// ISO-8859-1: every byte maps to the code point of the same value
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn skip_lines(text: &str, count: usize) -> &str {
    let mut rest = text;
    for _ in 0..count {
        match rest.find('\n') {
            Some(i) => rest = &rest[i + 1..],
            None => return "",
        }
    }
    rest
}

fn normalize_cell(cell: &str) -> Option<String> {
    if NULL_MARKERS.contains(&cell) {
        None
    } else {
        Some(cell.to_string())
    }
}

/// Parse CSV text whose first line is the header.
///
/// Records with more fields than the header are skipped; records with fewer
/// are padded with nulls.
pub fn parse_csv(text: &str) -> Result<CsvFrame> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr.headers()?.iter().map(String::from).collect();
    let width = headers.len();
    let mut frame = CsvFrame {
        headers,
        ..CsvFrame::default()
    };

    for (index, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Registro {} ilegible, se omite: {}", index + 1, e);
                frame.skipped_records += 1;
                continue;
            }
        };

        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }

        if record.len() > width {
            warn!(
                "Registro {}: {} campos, se esperaban {}; se omite",
                index + 1,
                record.len(),
                width
            );
            frame.skipped_records += 1;
            continue;
        }

        let mut row: Vec<Option<String>> = record.iter().map(normalize_cell).collect();
        row.resize(width, None);
        frame.rows.push(row);
    }

    Ok(frame)
}

/// Read a Latin-1 CSV file, dropping `skip_rows` leading lines before the header
pub fn read_csv_frame(path: &Path, skip_rows: usize) -> Result<CsvFrame> {
    let bytes = std::fs::read(path)?;
    let text = decode_latin1(&bytes);
    let body = skip_lines(&text, skip_rows);

    if body.trim().is_empty() {
        return Ok(CsvFrame::default());
    }

    parse_csv(body)
}

// ============================================================================
// LOADING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LoadOutcome {
    Loaded { rows: usize },
    SkippedEmpty,
    Failed { reason: String },
}

impl LoadOutcome {
    pub fn inserted(&self) -> usize {
        match self {
            LoadOutcome::Loaded { rows } => *rows,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileLoad {
    pub table: SatTable,
    pub path: PathBuf,
    pub outcome: LoadOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    pub files: Vec<FileLoad>,
}

impl LoadSummary {
    /// Grand total of inserted rows across all files
    pub fn total_inserted(&self) -> usize {
        self.files.iter().map(|f| f.outcome.inserted()).sum()
    }

    pub fn failed(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, LoadOutcome::Failed { .. }))
            .count()
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Load one CSV file into `table`.
///
/// Returns `SkippedEmpty` for a file without data rows. Fails with
/// `NoMatchingColumns` when the header shares no column with the table; any
/// insert failure rolls the whole file back.
pub fn load_csv(conn: &mut Connection, table: SatTable, path: &Path, skip_rows: usize) -> Result<LoadOutcome> {
    info!("📄 Procesando: {} → Tabla: {}", path.display(), table);

    let frame = read_csv_frame(path, skip_rows)?;
    if frame.is_empty() {
        warn!("⚠️ CSV vacío, se omite: {}", path.display());
        return Ok(LoadOutcome::SkippedEmpty);
    }

    let table_columns = db::table_columns(conn, table)?;

    // Exact, case-sensitive match; first occurrence wins for repeated headers
    let mut selected: Vec<(usize, &str)> = Vec::new();
    for (index, header) in frame.headers.iter().enumerate() {
        if table_columns.iter().any(|c| c == header) && !selected.iter().any(|(_, h)| *h == header.as_str()) {
            selected.push((index, header.as_str()));
        }
    }

    if selected.is_empty() {
        return Err(SatError::NoMatchingColumns(table.name().to_string()));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.name(),
        selected.iter().map(|(_, h)| quote_ident(h)).collect::<Vec<_>>().join(", "),
        (1..=selected.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", "),
    );

    let mut tx = conn.transaction()?;
    tx.set_drop_behavior(DropBehavior::Rollback);

    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(&sql)?;
        for row in &frame.rows {
            let values = selected.iter().map(|(index, _)| row[*index].as_deref());
            inserted += stmt.execute(rusqlite::params_from_iter(values))?;
        }
    }

    db::insert_load_history(&tx, &path.display().to_string(), table, inserted)?;
    tx.commit()?;

    if frame.skipped_records > 0 {
        warn!("{} registros malformados omitidos en {}", frame.skipped_records, path.display());
    }
    info!("✅ {} registros insertados en {}", inserted, table);

    Ok(LoadOutcome::Loaded { rows: inserted })
}

/// Load every configured source; a failing file contributes zero rows and the rest continue
pub fn load_all(conn: &mut Connection, sources: &[(SatTable, PathBuf)], skip_rows: usize) -> LoadSummary {
    let mut summary = LoadSummary::default();

    for (table, path) in sources {
        let outcome = match load_csv(conn, *table, path, skip_rows) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("❌ Error procesando {} → {}: {}", path.display(), table, e);
                LoadOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        summary.files.push(FileLoad {
            table: *table,
            path: path.clone(),
            outcome,
        });
    }

    info!("📊 Total de registros insertados: {}", summary.total_inserted());
    summary
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_rows, get_load_history, setup_database};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("sat.db")).unwrap();
        setup_database(&conn).unwrap();
        (dir, conn)
    }

    fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode_latin1(&[0x4E, 0xD1, 0x41, 0xE9]), "NÑAé");
    }

    #[test]
    fn test_parse_csv_skips_long_records_and_pads_short_ones() {
        let frame = parse_csv("numero,rfc,nombre_contribuyente\n1,AAA010101AAA,ACME\n2,BBB020202BBB,X,EXTRA\n3,CCC030303CCC\n").unwrap();

        assert_eq!(frame.rows.len(), 2);
        assert_eq!(frame.skipped_records, 1);
        assert_eq!(frame.rows[1], vec![Some("3".into()), Some("CCC030303CCC".into()), None]);
    }

    #[test]
    fn test_null_markers_become_none() {
        let frame = parse_csv("a,b,c,d\nNA,,null,valor\n").unwrap();
        assert_eq!(frame.rows[0], vec![None, None, None, Some("valor".into())]);
    }

    #[test]
    fn test_load_csv_latin1_with_preamble() {
        let (dir, mut conn) = setup();
        let mut bytes = b"Informacion actualizada al 30 de junio\nListado 69-B\n".to_vec();
        bytes.extend_from_slice(b"numero,rfc,nombre_contribuyente,situacion_contribuyente,columna_extra\n");
        bytes.extend_from_slice(b"1,AAA010101AAA,PE\xd1A AZUL SA,Definitivo,x\n");
        bytes.extend_from_slice(b"2,BBB020202BBB,N/A,Presunto,y\n");
        let path = write_file(&dir, "69b.csv", &bytes);

        let outcome = load_csv(&mut conn, SatTable::ListadoCompleto69B, &path, 2).unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded { rows: 2 });

        let nombre: String = conn
            .query_row("SELECT nombre_contribuyente FROM Listado_Completo_69_B WHERE numero = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(nombre, "PEÑA AZUL SA");

        let missing: Option<String> = conn
            .query_row("SELECT nombre_contribuyente FROM Listado_Completo_69_B WHERE numero = 2", [], |r| r.get(0))
            .unwrap();
        assert_eq!(missing, None);

        let history = get_load_history(&conn, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].tabla, "Listado_Completo_69_B");
        assert_eq!(history[0].registros, 2);
        assert_eq!(history[0].nombre_archivo, path.display().to_string());
    }

    #[test]
    fn test_no_matching_columns_inserts_nothing() {
        let (dir, mut conn) = setup();
        // Header case differs from the table columns
        let path = write_file(&dir, "def.csv", b"RFC,Nombre\nAAA010101AAA,ACME\n");

        let result = load_csv(&mut conn, SatTable::Definitivos, &path, 0);
        assert!(matches!(result, Err(SatError::NoMatchingColumns(_))));
        assert_eq!(count_rows(&conn, SatTable::Definitivos).unwrap(), 0);
        assert!(get_load_history(&conn, 10).unwrap().is_empty());
    }

    #[test]
    fn test_empty_csv_is_skipped() {
        let (dir, mut conn) = setup();
        let header_only = write_file(&dir, "vacio.csv", b"numero,rfc\n");
        let blank = write_file(&dir, "blanco.csv", b"");

        assert_eq!(
            load_csv(&mut conn, SatTable::Presuntos, &header_only, 0).unwrap(),
            LoadOutcome::SkippedEmpty
        );
        assert_eq!(
            load_csv(&mut conn, SatTable::Presuntos, &blank, 0).unwrap(),
            LoadOutcome::SkippedEmpty
        );
    }

    #[test]
    fn test_insert_failure_rolls_back_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = Connection::open(dir.path().join("sat.db")).unwrap();
        conn.execute(
            "CREATE TABLE Presuntos (numero INTEGER, rfc TEXT NOT NULL, nombre_contribuyente TEXT, fecha_actualizacion TEXT)",
            [],
        )
        .unwrap();
        setup_database(&conn).unwrap();
        let path = write_file(&dir, "pres.csv", b"numero,rfc\n1,AAA010101AAA\n2,\n3,CCC030303CCC\n");

        let result = load_csv(&mut conn, SatTable::Presuntos, &path, 0);
        assert!(matches!(result, Err(SatError::Database(_))));
        assert_eq!(count_rows(&conn, SatTable::Presuntos).unwrap(), 0);
        assert!(get_load_history(&conn, 10).unwrap().is_empty());
    }

    #[test]
    fn test_load_all_continues_after_failures() {
        let (dir, mut conn) = setup();
        let good = write_file(&dir, "def.csv", b"numero,rfc,nombre_contribuyente\n1,AAA010101AAA,ACME\n2,DDD040404DDD,DELTA\n");
        let bad = write_file(&dir, "des.csv", b"foo,bar\n1,2\n");
        let missing = dir.path().join("no_existe.csv");
        let other = write_file(&dir, "pre.csv", b"rfc\nBBB020202BBB\n");

        let sources = vec![
            (SatTable::Definitivos, good),
            (SatTable::Desvirtuados, bad),
            (SatTable::Presuntos, missing),
            (SatTable::SentenciasFavorables, other),
        ];
        let summary = load_all(&mut conn, &sources, 0);

        assert_eq!(summary.total_inserted(), 3);
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.files[0].outcome, LoadOutcome::Loaded { rows: 2 });
        assert!(matches!(summary.files[1].outcome, LoadOutcome::Failed { .. }));
        assert_eq!(summary.files[3].outcome, LoadOutcome::Loaded { rows: 1 });
        assert_eq!(get_load_history(&conn, 10).unwrap().len(), 2);
    }
}
