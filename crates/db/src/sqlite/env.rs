//! SQLite-Implementierung des EnvRepository

use async_trait::async_trait;
use sqlx::Row as _;

use crate::error::DbError;
use crate::models::{jetzt, EnvRecord, NeuesEnv};
use crate::repository::{DbResult, EnvRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::zeilen::{uuid_spalte, zeit_spalte, zeit_text};

#[async_trait]
impl EnvRepository for SqliteDb {
    async fn create_env(&self, data: NeuesEnv) -> DbResult<EnvRecord> {
        let record = data.in_record(jetzt());

        sqlx::query(
            "INSERT INTO env (id, env, hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&record.env)
        .bind(&record.hash)
        .bind(zeit_text(&record.created_at))
        .bind(zeit_text(&record.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_env(&self) -> DbResult<EnvRecord> {
        let row = sqlx::query(
            "SELECT id, env, hash, created_at, updated_at FROM env
             ORDER BY created_at LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::nicht_gefunden("Env-Datensatz"))?;

        Ok(EnvRecord {
            id: uuid_spalte(&row, "id")?,
            env: row.try_get("env")?,
            hash: row.try_get("hash")?,
            created_at: zeit_spalte(&row, "created_at")?,
            updated_at: zeit_spalte(&row, "updated_at")?,
        })
    }

    async fn update_env(&self, env: EnvRecord) -> DbResult<EnvRecord> {
        let updated_at = jetzt();
        let affected = sqlx::query("UPDATE env SET env = ?, hash = ?, updated_at = ? WHERE id = ?")
            .bind(&env.env)
            .bind(&env.hash)
            .bind(zeit_text(&updated_at))
            .bind(env.id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Env {}", env.id)));
        }
        Ok(EnvRecord { updated_at, ..env })
    }
}
