//! SQLite-Implementierung des SessionRepository

use async_trait::async_trait;
use sqlx::Row as _;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{jetzt, NeueSession, SessionRecord};
use crate::repository::{DbResult, SessionRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::zeilen::{uuid_spalte, zeit_spalte, zeit_text};

#[async_trait]
impl SessionRepository for SqliteDb {
    async fn create_session(&self, data: NeueSession) -> DbResult<SessionRecord> {
        let record = data.in_record(jetzt());

        sqlx::query(
            "INSERT INTO sessions (id, user_id, user_agent, ip, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.user_id.to_string())
        .bind(&record.user_agent)
        .bind(&record.ip)
        .bind(zeit_text(&record.created_at))
        .bind(zeit_text(&record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e
                .as_database_error()
                .is_some_and(|d| d.is_foreign_key_violation())
            {
                DbError::nicht_gefunden(format!("User {}", record.user_id))
            } else {
                DbError::Sqlx(e)
            }
        })?;

        Ok(record)
    }

    async fn get_session(&self, id: Uuid) -> DbResult<SessionRecord> {
        let row = sqlx::query(
            "SELECT id, user_id, user_agent, ip, created_at, updated_at
             FROM sessions WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::nicht_gefunden(format!("Session {id}")))?;

        row_to_session(&row)
    }

    async fn list_sessions_for_user(&self, user_id: Uuid) -> DbResult<Vec<SessionRecord>> {
        let rows = sqlx::query(
            "SELECT id, user_id, user_agent, ip, created_at, updated_at
             FROM sessions WHERE user_id = ?
             ORDER BY created_at DESC, id",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_session).collect()
    }

    async fn touch_session(&self, id: Uuid) -> DbResult<SessionRecord> {
        let affected = sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(zeit_text(&jetzt()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Session {id}")));
        }
        self.get_session(id).await
    }

    async fn delete_sessions_for_user(&self, user_id: Uuid) -> DbResult<u64> {
        let affected = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> DbResult<SessionRecord> {
    Ok(SessionRecord {
        id: uuid_spalte(row, "id")?,
        user_id: uuid_spalte(row, "user_id")?,
        user_agent: row.try_get("user_agent")?,
        ip: row.try_get("ip")?,
        created_at: zeit_spalte(row, "created_at")?,
        updated_at: zeit_spalte(row, "updated_at")?,
    })
}
