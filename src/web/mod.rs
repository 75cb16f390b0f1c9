// 🌐 Web layer - router, shared state and handlers

mod api;
mod error;
mod html;
mod pages;
mod upload;

pub use api::ApiResponse;
pub use error::ApiError;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use rusqlite::Connection;
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::{self, DbPool};
use crate::error::{Result, SatError};
use crate::tables::SatTable;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    /// Upload staging and generated reports
    pub report_dir: PathBuf,
    /// Tables reachable through the routes, in display order
    pub tables: &'static [SatTable],
}

impl AppState {
    pub fn new(pool: DbPool, report_dir: PathBuf) -> Self {
        Self {
            pool,
            report_dir,
            tables: SatTable::ALL,
        }
    }

    /// Resolve a route segment against the served tables
    pub fn resolve_table(&self, name: &str) -> Result<SatTable> {
        let table = SatTable::from_slug(name)?;
        if self.tables.contains(&table) {
            Ok(table)
        } else {
            Err(SatError::InvalidTable(name.to_string()))
        }
    }

    /// Run `f` on a pooled connection off the async runtime.
    ///
    /// The connection goes back to the pool when `f` returns, error or not.
    pub async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db::acquire(&pool)?;
            f(&*conn)
        })
        .await
        .map_err(|e| SatError::Internal(format!("blocking task failed: {}", e)))?
    }
}

/// Build the full router: HTML pages, uploads, JSON API and the stylesheet
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let api_routes = Router::new()
        .route("/health", get(api::health_check))
        .route("/contribuyente/:rfc", get(api::taxpayer))
        .route("/historial", get(api::load_history));

    Router::new()
        .route("/", get(pages::dashboard))
        .route("/search", get(pages::search))
        .route("/estadisticas", get(pages::statistics))
        .route("/tablas", get(pages::tables))
        .route("/tabla/:nombre", get(pages::table_view))
        .route("/exportar/:nombre", get(pages::export_table))
        .route("/carga_masiva", get(upload::form).post(upload::submit))
        .route("/static/style.css", get(html::serve_css))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{fixture_db, pool_for};
    use crate::db::AccessMode;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use std::path::Path;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "sat-padron-test-boundary";

    fn fixture_router() -> (TempDir, TempDir, Router) {
        let (db_dir, path) = fixture_db();
        let reports = tempfile::tempdir().unwrap();
        let state = AppState::new(pool_for(&path, AccessMode::ReadOnly), reports.path().to_path_buf());
        (db_dir, reports, build_router(state, 1024 * 1024))
    }

    fn unreachable_router() -> (TempDir, Router) {
        let reports = tempfile::tempdir().unwrap();
        let pool = pool_for(Path::new("/nonexistent-dir/sat.db"), AccessMode::ReadOnly);
        let state = AppState::new(pool, reports.path().to_path_buf());
        (reports, build_router(state, 1024 * 1024))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn upload_request(file_name: &str, content: &str, report_name: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"archivo\"; filename=\"{f}\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             {c}\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"nombre_reporte\"\r\n\r\n\
             {n}\r\n\
             --{b}--\r\n",
            b = BOUNDARY,
            f = file_name,
            c = content,
            n = report_name,
        );

        Request::builder()
            .method("POST")
            .uri("/carga_masiva")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_table_rejected_before_any_query() {
        // The pool cannot connect, so a 400 proves nothing was queried
        let (_reports, app) = unreachable_router();

        let response = app.clone().oneshot(get("/tabla/usuarios")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("Tabla no válida"));

        let response = app.oneshot(get("/exportar/sqlite_master")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_export_empty_table_is_empty_file() {
        let (_db, _reports, app) = fixture_router();

        let response = app.oneshot(get("/exportar/SentenciasFavorables")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.starts_with("attachment; filename=\"sentenciasfavorables_"));
        assert!(disposition.ends_with(".csv\""));
        assert_eq!(body_text(response).await, "");
    }

    #[tokio::test]
    async fn test_export_writes_header_and_rows() {
        let (_db, _reports, app) = fixture_router();

        let response = app.oneshot(get("/exportar/desvirtuados")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");

        let csv = body_text(response).await;
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("numero,rfc,nombre_contribuyente,fecha_actualizacion")
        );
        assert!(lines.next().unwrap().contains("CCC030303CCC"));
        assert_eq!(lines.next(), None);
    }

    #[tokio::test]
    async fn test_api_taxpayer_tags_origin_table() {
        let (_db, _reports, app) = fixture_router();

        let response = app.oneshot(get("/api/contribuyente/aaa010101aaa")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["tabla_origen"], "Definitivos");
        assert_eq!(rows[1]["tabla_origen"], "Listado_Completo_69_B");
        assert_eq!(rows[1]["situacion_contribuyente"], "Definitivo");
    }

    #[tokio::test]
    async fn test_api_unreachable_store_is_json_500() {
        let (_reports, app) = unreachable_router();

        let response = app.oneshot(get("/api/contribuyente/AAA010101AAA")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["error"], "Error de conexión a la base de datos");
    }

    #[tokio::test]
    async fn test_health_and_history() {
        let (_db, _reports, app) = fixture_router();

        let response = app.clone().oneshot(get("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], "OK");

        let response = app.oneshot(get("/api/historial?limit=5")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["data"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_dashboard() {
        let (_db, _reports, app) = fixture_router();

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let page = body_text(response).await;
        assert!(page.contains(r#"Total<div class="value">8</div>"#));
        assert!(page.contains("Presunto"));
    }

    #[tokio::test]
    async fn test_dashboard_unreachable_store() {
        let (_reports, app) = unreachable_router();

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("Error de conexión a la base de datos"));
    }

    #[tokio::test]
    async fn test_statistics_page() {
        let (_db, _reports, app) = fixture_router();

        let response = app.oneshot(get("/estadisticas")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_text(response).await;
        assert!(page.contains("RFC duplicados"));
        assert!(page.contains("SentenciasFavorables"));
    }

    #[tokio::test]
    async fn test_table_view_with_bad_page_falls_back() {
        let (_db, _reports, app) = fixture_router();

        let response = app.oneshot(get("/tabla/presuntos?page=abc")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let page = body_text(response).await;
        assert!(page.contains("BODEGAS DEL BAJIO"));
        assert!(page.contains("Página 1 de 1"));
    }

    #[tokio::test]
    async fn test_search_by_name_and_empty_query() {
        let (_db, _reports, app) = fixture_router();

        let response = app.oneshot(get("/search?q=bodegas&type=nombre")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_text(response).await;
        assert!(page.contains("2 resultado(s)"));
        assert!(page.contains("/api/contribuyente/BBB020202BBB"));

        // An empty query renders the form without touching the store
        let (_reports, app) = unreachable_router();
        let response = app.oneshot(get("/search?q=%20%20")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stylesheet_served() {
        let (_reports, app) = unreachable_router();

        let response = app.oneshot(get("/static/style.css")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css; charset=utf-8");
    }

    #[tokio::test]
    async fn test_upload_rejects_other_extensions() {
        let (_reports, app) = unreachable_router();

        let response = app
            .oneshot(upload_request("rfcs.csv", "AAA010101AAA", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("Solo se permiten archivos .txt"));
    }

    #[tokio::test]
    async fn test_upload_without_file_name() {
        let (_reports, app) = unreachable_router();

        let response = app.oneshot(upload_request("", "", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("No se seleccionó ningún archivo"));
    }

    #[tokio::test]
    async fn test_upload_without_valid_rfcs() {
        let (_reports, app) = unreachable_router();

        let response = app
            .oneshot(upload_request("rfcs.txt", "ABC\nshort\n\n", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("no contiene RFCs válidos"));
    }

    #[tokio::test]
    async fn test_upload_returns_report_and_cleans_staging() {
        let (_db, reports, app) = fixture_router();

        let response = app
            .oneshot(upload_request(
                "lote.TXT",
                "aaa010101aaa\r\nZZZ999999ZZZ\r\nAAA010101AAA\r\n",
                "Revisión Junio",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            crate::report::XLSX_CONTENT_TYPE
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Revision_Junio.xlsx\""
        );
        assert_eq!(response.headers()[upload::LOOKUP_FAILURES_HEADER], "0");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        // xlsx files are zip archives
        assert_eq!(&bytes[..2], b"PK");

        let mut files: Vec<String> = std::fs::read_dir(reports.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        assert_eq!(files, vec!["Revision_Junio.xlsx".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_uploads_with_same_name_get_their_own_report() {
        let (_db, reports, app) = fixture_router();

        let (a, b) = tokio::join!(
            app.clone().oneshot(upload_request("a.txt", "AAA010101AAA\n", "lote")),
            app.clone().oneshot(upload_request("b.txt", "ZZZ999999ZZZ\nYYY888888YYY\n", "lote")),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.status(), StatusCode::OK);
        assert_eq!(b.status(), StatusCode::OK);
        assert_eq!(a.headers()[header::CONTENT_DISPOSITION], "attachment; filename=\"lote.xlsx\"");
        assert_eq!(b.headers()[header::CONTENT_DISPOSITION], "attachment; filename=\"lote.xlsx\"");

        let a = to_bytes(a.into_body(), usize::MAX).await.unwrap();
        let b = to_bytes(b.into_body(), usize::MAX).await.unwrap();
        assert_ne!(a, b);

        // Each saved workbook matches exactly one of the downloads
        let mut saved: Vec<Vec<u8>> = std::fs::read_dir(reports.path())
            .unwrap()
            .map(|entry| std::fs::read(entry.unwrap().path()).unwrap())
            .collect();
        assert_eq!(saved.len(), 2);
        saved.sort();
        let mut downloaded = vec![a.to_vec(), b.to_vec()];
        downloaded.sort();
        assert_eq!(saved, downloaded);
    }
}
