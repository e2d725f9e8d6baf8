//! Speicher-Implementierung des EnvRepository

use async_trait::async_trait;

use super::{aus_dokument, dokument, SpeicherDb, ENV};
use crate::error::DbError;
use crate::models::{jetzt, EnvRecord, NeuesEnv};
use crate::repository::{DbResult, EnvRepository};

#[async_trait]
impl EnvRepository for SpeicherDb {
    async fn create_env(&self, data: NeuesEnv) -> DbResult<EnvRecord> {
        let record = data.in_record(jetzt());
        let dok = dokument(&record)?;
        self.mutieren(|db| db.sammlung_mut(ENV)?.einfuegen(record.id.to_string(), dok))?;
        Ok(record)
    }

    async fn get_env(&self) -> DbResult<EnvRecord> {
        self.lesen(|db| {
            let mut alle = db
                .sammlung(ENV)?
                .alle()
                .map(aus_dokument::<EnvRecord>)
                .collect::<DbResult<Vec<_>>>()?;
            alle.sort_by_key(|e| e.created_at);
            alle.into_iter()
                .next()
                .ok_or_else(|| DbError::nicht_gefunden("Env-Datensatz"))
        })
    }

    async fn update_env(&self, env: EnvRecord) -> DbResult<EnvRecord> {
        let record = EnvRecord {
            updated_at: jetzt(),
            ..env
        };
        let dok = dokument(&record)?;
        self.mutieren(|db| db.sammlung_mut(ENV)?.ersetzen(&record.id.to_string(), dok))?;
        Ok(record)
    }
}
