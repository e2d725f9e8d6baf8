//! Cassandra-Implementierung des EnvRepository

use async_trait::async_trait;

use super::zeilen::{millis, EnvZeile, ENV_SPALTEN};
use super::CassandraDb;
use crate::error::DbError;
use crate::models::{jetzt, EnvRecord, NeuesEnv};
use crate::repository::{DbResult, EnvRepository};

#[async_trait]
impl EnvRepository for CassandraDb {
    async fn create_env(&self, data: NeuesEnv) -> DbResult<EnvRecord> {
        let record = data.in_record(jetzt());
        self.ausfuehren(
            format!(
                "INSERT INTO {} ({ENV_SPALTEN}) VALUES (?, ?, ?, ?, ?)",
                self.tabelle("env")
            ),
            EnvZeile::from(&record),
        )
        .await?;
        Ok(record)
    }

    async fn get_env(&self) -> DbResult<EnvRecord> {
        let zeilen: Vec<EnvZeile> = self
            .zeilen(format!("SELECT {ENV_SPALTEN} FROM {}", self.tabelle("env")), ())
            .await?;
        zeilen
            .into_iter()
            .min_by_key(|z| z.created_at)
            .ok_or_else(|| DbError::nicht_gefunden("Env-Datensatz"))?
            .try_into()
    }

    async fn update_env(&self, env: EnvRecord) -> DbResult<EnvRecord> {
        let record = EnvRecord {
            updated_at: jetzt(),
            ..env
        };
        let aktualisiert = self
            .bedingt(
                format!(
                    "UPDATE {} SET env = ?, hash = ?, updated_at = ? WHERE id = ? IF EXISTS",
                    self.tabelle("env")
                ),
                (
                    &record.env,
                    &record.hash,
                    millis(&record.updated_at),
                    record.id.to_string(),
                ),
            )
            .await?;
        if !aktualisiert {
            return Err(DbError::nicht_gefunden(format!("Env {}", record.id)));
        }
        Ok(record)
    }
}
