//! Auswahl und Start des konfigurierten Speicher-Providers

use std::sync::Arc;

use tracing::info;

use crate::error::DbError;
use crate::repository::{DatabaseBackend, DatabaseConfig, DbResult, Provider};
use crate::speicher::SpeicherDb;
use crate::sqlite::SqliteDb;

/// Oeffnet den konfigurierten Provider und stellt das Schema sicher
///
/// Fehler beim Start sind fatal; der Aufrufer bricht den Prozessstart ab.
pub async fn provider_oeffnen(config: &DatabaseConfig) -> DbResult<Arc<dyn Provider>> {
    config_pruefen(config)?;

    let provider: Arc<dyn Provider> = match config.backend {
        DatabaseBackend::Sqlite => Arc::new(SqliteDb::oeffnen(config).await?),
        DatabaseBackend::Speicher => Arc::new(SpeicherDb::oeffnen(config)?),
        #[cfg(feature = "cassandra")]
        DatabaseBackend::Cassandra => Arc::new(crate::cassandra::CassandraDb::oeffnen(config).await?),
        #[cfg(not(feature = "cassandra"))]
        DatabaseBackend::Cassandra => {
            return Err(DbError::Konfiguration(
                "Cassandra-Unterstuetzung nicht einkompiliert (Feature 'cassandra')".into(),
            ))
        }
    };

    info!(backend = %provider.backend(), name = %config.name, "Speicher-Provider bereit");
    Ok(provider)
}

/// Prueft die Konfiguration vor dem Verbindungsaufbau
pub fn config_pruefen(config: &DatabaseConfig) -> DbResult<()> {
    match config.backend {
        DatabaseBackend::Sqlite | DatabaseBackend::Cassandra if config.ziel().is_empty() => {
            Err(DbError::Konfiguration(
                "datenbank.url oder datenbank.host muss gesetzt sein".into(),
            ))
        }
        DatabaseBackend::Cassandra => bezeichner_pruefen(&config.name),
        _ => Ok(()),
    }
}

/// Keyspace- und Tabellennamen werden in DDL eingesetzt und muessen
/// deshalb einfache Bezeichner sein
pub fn bezeichner_pruefen(name: &str) -> DbResult<()> {
    let mut zeichen = name.chars();
    let gueltig = zeichen.next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.len() <= 48
        && zeichen.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if gueltig {
        Ok(())
    } else {
        Err(DbError::Konfiguration(format!(
            "Ungueltiger Bezeichner '{name}' (erlaubt: Buchstabe gefolgt von bis zu 47 \
             Buchstaben, Ziffern oder '_')"
        )))
    }
}
