//! HTML rendering helpers shared by the page handlers

use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde_json::Value;

const STYLE_CSS: &str = include_str!("../../web/style.css");

pub const APP_NAME: &str = "Sistema SAT";

/// Escape text for HTML element content and attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Display text of a database value (nulls render empty)
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => escape(s),
        other => escape(&other.to_string()),
    }
}

pub fn opt_text(value: Option<&str>) -> String {
    value.map(escape).unwrap_or_else(|| "—".to_string())
}

/// Wrap a page body in the common layout
pub fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} · {app}</title>
    <link rel="stylesheet" href="/static/style.css">
</head>
<body>
    <header>
        <nav>
            <a class="brand" href="/">{app}</a>
            <a href="/search">Buscar</a>
            <a href="/tablas">Tablas</a>
            <a href="/estadisticas">Estadísticas</a>
            <a href="/carga_masiva">Carga masiva</a>
        </nav>
    </header>
    <main>
        <h1>{title}</h1>
{body}
    </main>
    <footer>{app} v{version} · {now}</footer>
</body>
</html>"#,
        title = escape(title),
        app = APP_NAME,
        body = body,
        version = env!("CARGO_PKG_VERSION"),
        now = chrono::Local::now().format("%Y-%m-%d %H:%M"),
    ))
}

pub fn error_page(status: StatusCode, message: &str) -> Html<String> {
    layout(
        &format!("Error {}", status.as_u16()),
        &format!(r#"        <p class="alert alert-danger">{}</p>"#, escape(message)),
    )
}

/// Table header row
pub fn header_row<S: AsRef<str>>(columns: &[S]) -> String {
    let cells: String = columns
        .iter()
        .map(|c| format!("<th>{}</th>", escape(c.as_ref())))
        .collect();
    format!("<tr>{}</tr>", cells)
}

/// GET /static/style.css
pub async fn serve_css() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLE_CSS,
    )
        .into_response()
}
