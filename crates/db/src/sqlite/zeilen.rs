//! Hilfsfunktionen zum Parsen von SQLite-Zeilen

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row as _;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::DbResult;

/// Zeitstempel-Format fuer die Speicherung
///
/// Feste Mikrosekunden-Breite, damit die Text-Sortierung der zeitlichen
/// Reihenfolge entspricht.
pub(crate) fn zeit_text(zeit: &DateTime<Utc>) -> String {
    zeit.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn opt_zeit_text(zeit: &Option<DateTime<Utc>>) -> Option<String> {
    zeit.as_ref().map(zeit_text)
}

pub(crate) fn uuid_spalte(row: &SqliteRow, spalte: &str) -> DbResult<Uuid> {
    let s: String = row.try_get(spalte)?;
    Uuid::parse_str(&s).map_err(|e| DbError::intern(format!("Ungueltige UUID '{s}': {e}")))
}

pub(crate) fn zeit_spalte(row: &SqliteRow, spalte: &str) -> DbResult<DateTime<Utc>> {
    let s: String = row.try_get(spalte)?;
    zeit_parsen(spalte, &s)
}

pub(crate) fn opt_zeit_spalte(row: &SqliteRow, spalte: &str) -> DbResult<Option<DateTime<Utc>>> {
    let s: Option<String> = row.try_get(spalte)?;
    s.as_deref().map(|v| zeit_parsen(spalte, v)).transpose()
}

fn zeit_parsen(spalte: &str, s: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::intern(format!("Ungueltige {spalte} '{s}': {e}")))
}

/// Bildet Eindeutigkeitsverletzungen auf `DbError::Eindeutigkeit` ab
pub(crate) fn eindeutigkeit_abbilden(e: sqlx::Error, kontext: impl FnOnce() -> String) -> DbError {
    if e
        .as_database_error()
        .is_some_and(|d| d.is_unique_violation())
    {
        DbError::Eindeutigkeit(kontext())
    } else {
        DbError::Sqlx(e)
    }
}
