//! HTML page handlers: dashboard, search, statistics, table listing/browse, export

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use std::fmt::Write as _;

use super::html::{escape, header_row, layout, opt_text, value_text};
use super::AppState;
use crate::error::Result;
use crate::export::{export_file_name, rows_to_csv, CSV_CONTENT_TYPE};
use crate::queries::{self, SearchKind, TaxpayerRecord};
use crate::tables::SatTable;

// ============================================================================
// DASHBOARD
// ============================================================================

/// GET /
pub async fn dashboard(State(state): State<AppState>) -> Result<Html<String>> {
    let (counts, situations, updates) = state
        .with_conn(|conn| {
            Ok((
                queries::table_counts(conn)?,
                queries::situation_counts(conn)?,
                queries::last_updates(conn)?,
            ))
        })
        .await?;

    let total: i64 = counts.iter().map(|c| c.count).sum();

    let mut body = String::from("        <div class=\"cards\">\n");
    for count in &counts {
        let _ = writeln!(
            body,
            r#"            <div class="card"><a href="/tabla/{slug}">{name}</a><div class="value">{count}</div></div>"#,
            slug = count.table.slug(),
            name = count.table.display_name(),
            count = count.count,
        );
    }
    let _ = writeln!(
        body,
        r#"            <div class="card">Total<div class="value">{}</div></div>
        </div>"#,
        total
    );

    body.push_str("        <h2>Situaciones en Listado Completo 69-B</h2>\n        <table>\n");
    body.push_str(&header_row(&["Situación", "Contribuyentes"]));
    for situation in &situations {
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td></tr>",
            opt_text(situation.situacion_contribuyente.as_deref()),
            situation.count
        );
    }
    body.push_str("\n        </table>\n");

    body.push_str("        <h2>Últimas actualizaciones</h2>\n        <table>\n");
    body.push_str(&header_row(&["Tabla", "Fecha de actualización"]));
    for update in &updates {
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td></tr>",
            update.table.display_name(),
            opt_text(update.fecha_actualizacion.as_deref())
        );
    }
    body.push_str("\n        </table>\n");

    Ok(layout("Panel principal", &body))
}

// ============================================================================
// SEARCH
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

fn search_form(query: &str, kind: &str) -> String {
    let selected = |value: &str| if value == kind { " selected" } else { "" };
    format!(
        r#"        <form class="inline" method="get" action="/search">
            <input type="text" name="q" value="{q}" placeholder="RFC o nombre">
            <select name="type">
                <option value="rfc"{rfc}>RFC exacto</option>
                <option value="nombre"{nombre}>Nombre (parcial)</option>
            </select>
            <button type="submit">Buscar</button>
        </form>
"#,
        q = escape(query),
        rfc = selected("rfc"),
        nombre = selected("nombre"),
    )
}

fn render_records(records: &[TaxpayerRecord]) -> String {
    let mut body = String::new();

    for table in SatTable::ALL {
        let rows: Vec<&TaxpayerRecord> = records.iter().filter(|r| r.table == *table).collect();
        let Some(first) = rows.first() else {
            continue;
        };

        let _ = writeln!(body, "        <h2>{} ({})</h2>\n        <table>", table.display_name(), rows.len());
        body.push_str(&header_row(&first.columns));
        for record in &rows {
            body.push_str("<tr>");
            for (column, value) in record.columns.iter().zip(&record.values) {
                match (column.as_str(), value.as_str()) {
                    ("rfc", Some(rfc)) => {
                        let _ = write!(
                            body,
                            r#"<td><a href="/api/contribuyente/{}">{}</a></td>"#,
                            urlencoding::encode(rfc),
                            escape(rfc)
                        );
                    }
                    _ => {
                        let _ = write!(body, "<td>{}</td>", value_text(value));
                    }
                }
            }
            body.push_str("</tr>");
        }
        body.push_str("\n        </table>\n");
    }

    body
}

/// GET /search?q=&type=rfc|nombre
pub async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Html<String>> {
    let query = params.q.unwrap_or_default().trim().to_string();
    let kind_name = params.kind.unwrap_or_else(|| "rfc".to_string());

    let mut body = search_form(&query, &kind_name);
    if query.is_empty() {
        return Ok(layout("Búsqueda de contribuyentes", &body));
    }

    let kind = SearchKind::parse(&kind_name);
    let needle = query.clone();
    let results = state
        .with_conn(move |conn| queries::search(conn, &needle, kind.as_ref()))
        .await?;

    let _ = writeln!(
        body,
        r#"        <p class="alert alert-info">{} resultado(s) para "{}"</p>"#,
        results.len(),
        escape(&query)
    );
    body.push_str(&render_records(&results));

    Ok(layout("Búsqueda de contribuyentes", &body))
}

// ============================================================================
// STATISTICS
// ============================================================================

/// GET /estadisticas
pub async fn statistics(State(state): State<AppState>) -> Result<Html<String>> {
    let (counts, duplicates, situations, updates) = state
        .with_conn(|conn| {
            Ok((
                queries::table_counts(conn)?,
                queries::duplicate_counts(conn)?,
                queries::situation_counts(conn)?,
                queries::update_stats(conn)?,
            ))
        })
        .await?;

    let mut body = String::from("        <h2>Registros y RFC duplicados por tabla</h2>\n        <table>\n");
    body.push_str(&header_row(&["Tabla", "Registros", "RFC duplicados"]));
    for (count, dups) in counts.iter().zip(&duplicates) {
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            count.table.display_name(),
            count.count,
            dups.count
        );
    }
    body.push_str("\n        </table>\n");

    body.push_str("        <h2>Situaciones en Listado Completo 69-B</h2>\n        <table>\n");
    body.push_str(&header_row(&["Situación", "Contribuyentes"]));
    for situation in &situations {
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td></tr>",
            opt_text(situation.situacion_contribuyente.as_deref()),
            situation.count
        );
    }
    body.push_str("\n        </table>\n");

    body.push_str("        <h2>Actualizaciones</h2>\n        <table>\n");
    body.push_str(&header_row(&["Tabla", "Última actualización", "Total de registros"]));
    for update in &updates {
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            update.table.name(),
            opt_text(update.ultima_actualizacion.as_deref()),
            update.total_registros
        );
    }
    body.push_str("\n        </table>\n");

    Ok(layout("Estadísticas", &body))
}

// ============================================================================
// TABLES
// ============================================================================

/// GET /tablas
pub async fn tables(State(state): State<AppState>) -> Html<String> {
    let mut body = String::from("        <div class=\"cards\">\n");
    for table in state.tables {
        let _ = writeln!(
            body,
            r#"            <div class="card" data-icon="{icon}">
                <h3>{name}</h3>
                <p>{description}</p>
                <a href="/tabla/{slug}">Ver registros</a> · <a href="/exportar/{slug}">Exportar CSV</a>
            </div>"#,
            icon = table.icon(),
            name = table.display_name(),
            description = table.description(),
            slug = table.slug(),
        );
    }
    body.push_str("        </div>\n");

    layout("Tablas disponibles", &body)
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
}

/// GET /tabla/:nombre?page=
pub async fn table_view(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Html<String>> {
    let table = state.resolve_table(&name)?;
    // Non-numeric pages fall back to the first page
    let requested = params
        .page
        .as_deref()
        .and_then(|p| p.trim().parse::<i64>().ok())
        .unwrap_or(1);

    let page = state
        .with_conn(move |conn| queries::table_page(conn, table, requested))
        .await?;

    let mut body = format!(
        r#"        <p>{description} · {total} registros · <a href="/exportar/{slug}">Exportar CSV</a></p>
        <table>
"#,
        description = table.description(),
        total = page.total,
        slug = table.slug(),
    );
    body.push_str(&header_row(&page.columns));
    for row in &page.rows {
        body.push_str("<tr>");
        for value in row {
            let _ = write!(body, "<td>{}</td>", value_text(value));
        }
        body.push_str("</tr>");
    }
    body.push_str("\n        </table>\n        <div class=\"pager\">");

    let p = page.pagination;
    if p.has_previous() {
        let _ = write!(body, r#"<a href="/tabla/{}?page={}">« Anterior</a>"#, table.slug(), p.page - 1);
    }
    let _ = write!(body, "<span>Página {} de {}</span>", p.page, p.total_pages.max(1));
    if p.has_next() {
        let _ = write!(body, r#"<a href="/tabla/{}?page={}">Siguiente »</a>"#, table.slug(), p.page + 1);
    }
    body.push_str("</div>\n");

    Ok(layout(table.display_name(), &body))
}

/// GET /exportar/:nombre
pub async fn export_table(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response> {
    let table = state.resolve_table(&name)?;

    let csv = state
        .with_conn(move |conn| rows_to_csv(&queries::all_rows(conn, table)?))
        .await?;

    let file_name = export_file_name(table.slug(), chrono::Local::now().date_naive());
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        csv,
    )
        .into_response())
}
