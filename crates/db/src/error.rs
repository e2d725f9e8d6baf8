//! Fehlertypen fuer das Datenbank-Crate

use thiserror::Error;

/// Datenbank-Fehlertypen
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Datensatz nicht gefunden: {0}")]
    NichtGefunden(String),

    #[error("Eindeutigkeitsverletzung: {0}")]
    Eindeutigkeit(String),

    #[error("Ungueltige Daten: {0}")]
    UngueltigeDaten(String),

    #[error("Speicher nicht erreichbar: {0}")]
    NichtVerfuegbar(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("SQLx-Fehler: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration-Fehler: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "cassandra")]
    #[error("Cassandra-Fehler: {0}")]
    Cassandra(String),

    #[error("Interner DB-Fehler: {0}")]
    Intern(String),
}

impl DbError {
    pub fn nicht_gefunden(msg: impl Into<String>) -> Self {
        Self::NichtGefunden(msg.into())
    }

    pub fn eindeutigkeit(msg: impl Into<String>) -> Self {
        Self::Eindeutigkeit(msg.into())
    }

    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn es sich um einen Eindeutigkeitsfehler handelt
    pub fn ist_eindeutigkeit(&self) -> bool {
        matches!(self, Self::Eindeutigkeit(_))
            || matches!(self, Self::Sqlx(e) if e
                .as_database_error()
                .is_some_and(|d| d.is_unique_violation()))
    }

    /// Gibt true zurueck wenn der Datensatz fehlt
    pub fn ist_nicht_gefunden(&self) -> bool {
        matches!(self, Self::NichtGefunden(_) | Self::Sqlx(sqlx::Error::RowNotFound))
    }

    /// Gibt true zurueck wenn der Speicher (voruebergehend) nicht erreichbar ist
    pub fn ist_nicht_verfuegbar(&self) -> bool {
        matches!(
            self,
            Self::NichtVerfuegbar(_)
                | Self::Sqlx(sqlx::Error::PoolTimedOut)
                | Self::Sqlx(sqlx::Error::PoolClosed)
                | Self::Sqlx(sqlx::Error::Io(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kategorien_erkennen() {
        assert!(DbError::eindeutigkeit("email").ist_eindeutigkeit());
        assert!(DbError::nicht_gefunden("user").ist_nicht_gefunden());
        assert!(DbError::Sqlx(sqlx::Error::RowNotFound).ist_nicht_gefunden());
        assert!(DbError::Sqlx(sqlx::Error::PoolTimedOut).ist_nicht_verfuegbar());
        assert!(!DbError::intern("x").ist_nicht_verfuegbar());
    }
}
