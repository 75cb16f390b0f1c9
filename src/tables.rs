// 🗂️ SAT Tables - Fixed allow-list of taxpayer-status lists
// Every SQL statement that names a table gets it from here, never from user input

use crate::error::{Result, SatError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CORE TYPES
// ============================================================================

/// SatTable - One of the five SAT taxpayer-status lists
///
/// Declaration order is the fixed iteration order used by searches,
/// statistics and the reconciliation report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SatTable {
    Definitivos,
    Desvirtuados,
    Presuntos,
    SentenciasFavorables,
    #[serde(rename = "Listado_Completo_69_B")]
    ListadoCompleto69B,
}

/// Audit table written by the CSV loader
pub const HISTORY_TABLE: &str = "Historial_Cargas";

impl SatTable {
    /// All tables in fixed iteration order
    pub const ALL: &'static [SatTable] = &[
        SatTable::Definitivos,
        SatTable::Desvirtuados,
        SatTable::Presuntos,
        SatTable::SentenciasFavorables,
        SatTable::ListadoCompleto69B,
    ];

    /// Canonical SQL table name
    pub fn name(&self) -> &'static str {
        match self {
            SatTable::Definitivos => "Definitivos",
            SatTable::Desvirtuados => "Desvirtuados",
            SatTable::Presuntos => "Presuntos",
            SatTable::SentenciasFavorables => "SentenciasFavorables",
            SatTable::ListadoCompleto69B => "Listado_Completo_69_B",
        }
    }

    /// Lowercase route segment (`/tabla/<slug>`)
    pub fn slug(&self) -> &'static str {
        match self {
            SatTable::Definitivos => "definitivos",
            SatTable::Desvirtuados => "desvirtuados",
            SatTable::Presuntos => "presuntos",
            SatTable::SentenciasFavorables => "sentenciasfavorables",
            SatTable::ListadoCompleto69B => "listado_completo_69_b",
        }
    }

    /// Human-readable name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            SatTable::Definitivos => "Definitivos",
            SatTable::Desvirtuados => "Desvirtuados",
            SatTable::Presuntos => "Presuntos",
            SatTable::SentenciasFavorables => "Sentencias Favorables",
            SatTable::ListadoCompleto69B => "Listado Completo 69-B",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SatTable::Definitivos => "Contribuyentes con situación definitiva en el SAT",
            SatTable::Desvirtuados => "Contribuyentes desvirtuados del padrón",
            SatTable::Presuntos => "Contribuyentes presuntos en el padrón",
            SatTable::SentenciasFavorables => "Sentencias favorables a contribuyentes",
            SatTable::ListadoCompleto69B => "Listado completo del artículo 69-B",
        }
    }

    /// Icon name used by the table listing page
    pub fn icon(&self) -> &'static str {
        match self {
            SatTable::Definitivos => "check-circle",
            SatTable::Desvirtuados => "times-circle",
            SatTable::Presuntos => "question-circle",
            SatTable::SentenciasFavorables => "gavel",
            SatTable::ListadoCompleto69B => "list-alt",
        }
    }

    /// Only the 69-B listing carries a taxpayer situation column
    pub fn has_situation(&self) -> bool {
        matches!(self, SatTable::ListadoCompleto69B)
    }

    /// Resolve a route segment or table name (case-insensitive) against the allow-list
    pub fn from_slug(value: &str) -> Result<SatTable> {
        SatTable::ALL
            .iter()
            .copied()
            .find(|table| table.name().eq_ignore_ascii_case(value))
            .ok_or_else(|| SatError::InvalidTable(value.to_string()))
    }
}

impl fmt::Display for SatTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// TESTS
// ============================================================================
