//! Bulk RFC check: upload form and spreadsheet download

use axum::{
    extract::{Multipart, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use super::error::status_and_message;
use super::html::{escape, layout};
use super::AppState;
use crate::error::{Result, SatError};
use crate::reconciliation::{self, GeneratedReport};
use crate::report::XLSX_CONTENT_TYPE;

pub const NO_FILE_MESSAGE: &str = "No se seleccionó ningún archivo";
pub const BAD_EXTENSION_MESSAGE: &str = "Solo se permiten archivos .txt";

/// Header carrying how many per-table lookups failed while building the report
pub const LOOKUP_FAILURES_HEADER: &str = "x-lookup-failures";

const TITLE: &str = "Carga masiva de RFCs";

fn render_form(message: Option<&str>) -> Html<String> {
    let alert = message
        .map(|m| format!("        <p class=\"alert alert-danger\">{}</p>\n", escape(m)))
        .unwrap_or_default();

    layout(
        TITLE,
        &format!(
            r#"{alert}        <p>Sube un archivo .txt con un RFC por línea. Se genera un reporte Excel
        indicando en qué tablas del SAT aparece cada RFC.</p>
        <form method="post" action="/carga_masiva" enctype="multipart/form-data">
            <p><input type="file" name="archivo" accept=".txt"></p>
            <p><input type="text" name="nombre_reporte" placeholder="Nombre del reporte (opcional)"></p>
            <button type="submit">Generar reporte</button>
        </form>
"#
        ),
    )
}

/// Whether a client-supplied file name has the `.txt` extension
pub fn is_allowed_file(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.eq_ignore_ascii_case("txt"))
        .unwrap_or(false)
}

/// GET /carga_masiva
pub async fn form() -> Html<String> {
    render_form(None)
}

struct UploadForm {
    file_name: Option<String>,
    content: Vec<u8>,
    report_name: Option<String>,
}

/// POST /carga_masiva
pub async fn submit(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut upload = UploadForm {
        file_name: None,
        content: Vec::new(),
        report_name: None,
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            // Oversized or malformed bodies keep the framework's status
            Err(e) => return e.into_response(),
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("archivo") => {
                upload.file_name = field.file_name().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => upload.content = bytes.to_vec(),
                    Err(e) => return e.into_response(),
                }
            }
            Some("nombre_reporte") => match field.text().await {
                Ok(text) => upload.report_name = Some(text),
                Err(e) => return e.into_response(),
            },
            _ => {}
        }
    }

    match process_upload(&state, upload).await {
        Ok(report) => download_response(report),
        Err(err) => {
            let (status, message) = status_and_message(&err);
            if status.is_client_error() {
                warn!("Carga masiva rechazada: {}", message);
            }
            (status, render_form(Some(&message))).into_response()
        }
    }
}

async fn process_upload(state: &AppState, upload: UploadForm) -> Result<GeneratedReport> {
    let file_name = match upload.file_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return Err(SatError::Validation(NO_FILE_MESSAGE.to_string())),
    };
    if !is_allowed_file(&file_name) {
        return Err(SatError::Validation(BAD_EXTENSION_MESSAGE.to_string()));
    }

    info!("Carga masiva: {} ({} bytes)", file_name, upload.content.len());

    let pool = state.pool.clone();
    let report_dir = state.report_dir.clone();
    let report_name = upload.report_name;
    let content = upload.content;

    tokio::task::spawn_blocking(move || -> Result<GeneratedReport> {
        std::fs::create_dir_all(&report_dir)?;
        // Removed when dropped, on every exit path
        let mut staged = NamedTempFile::new_in(&report_dir)?;
        staged.write_all(&content)?;
        staged.flush()?;

        reconciliation::run_bulk_check(staged.path(), report_name.as_deref(), &pool, &report_dir)
    })
    .await
    .map_err(|e| SatError::Internal(format!("upload task failed: {}", e)))?
}

/// The workbook this job rendered, never re-read from the shared report directory
fn download_response(report: GeneratedReport) -> Response {
    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", report.file_name),
            ),
        ],
        report.content,
    )
        .into_response();

    response
        .headers_mut()
        .insert(LOOKUP_FAILURES_HEADER, HeaderValue::from(report.failures.len()));

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_allowed_file() {
        assert!(is_allowed_file("rfcs.txt"));
        assert!(is_allowed_file("RFCS.TXT"));
        assert!(is_allowed_file("lote.2024.txt"));
        assert!(!is_allowed_file("rfcs.csv"));
        assert!(!is_allowed_file("txt"));
        assert!(!is_allowed_file("rfcs.txt.xlsx"));
    }

    #[test]
    fn test_form_shows_escaped_message() {
        let Html(page) = render_form(Some("<falla>"));
        assert!(page.contains("&lt;falla&gt;"));
        assert!(page.contains("name=\"archivo\""));
        assert!(page.contains("name=\"nombre_reporte\""));
    }
}
