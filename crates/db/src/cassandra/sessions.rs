//! Cassandra-Implementierung des SessionRepository

use std::cmp::Reverse;

use async_trait::async_trait;
use uuid::Uuid;

use super::zeilen::{millis, SessionZeile, SESSION_SPALTEN};
use super::CassandraDb;
use crate::error::DbError;
use crate::models::{jetzt, NeueSession, SessionRecord};
use crate::repository::{DbResult, SessionRepository, UserRepository};

#[async_trait]
impl SessionRepository for CassandraDb {
    async fn create_session(&self, data: NeueSession) -> DbResult<SessionRecord> {
        // Keine Fremdschluessel in Cassandra: Benutzer vorher pruefen
        self.get_user(data.user_id).await?;

        let record = data.in_record(jetzt());
        self.ausfuehren(
            format!(
                "INSERT INTO {} ({SESSION_SPALTEN}) VALUES (?, ?, ?, ?, ?, ?)",
                self.tabelle("sessions")
            ),
            SessionZeile::from(&record),
        )
        .await?;
        Ok(record)
    }

    async fn get_session(&self, id: Uuid) -> DbResult<SessionRecord> {
        let zeile: Option<SessionZeile> = self
            .erste_zeile(
                format!("SELECT {SESSION_SPALTEN} FROM {} WHERE id = ?", self.tabelle("sessions")),
                (id.to_string(),),
            )
            .await?;
        zeile
            .ok_or_else(|| DbError::nicht_gefunden(format!("Session {id}")))?
            .try_into()
    }

    async fn list_sessions_for_user(&self, user_id: Uuid) -> DbResult<Vec<SessionRecord>> {
        let zeilen: Vec<SessionZeile> = self
            .zeilen(
                format!(
                    "SELECT {SESSION_SPALTEN} FROM {} WHERE user_id = ?",
                    self.tabelle("sessions")
                ),
                (user_id.to_string(),),
            )
            .await?;

        let mut sessions = zeilen
            .into_iter()
            .map(SessionRecord::try_from)
            .collect::<DbResult<Vec<_>>>()?;
        sessions.sort_by_key(|s| (Reverse(s.created_at), s.id));
        Ok(sessions)
    }

    async fn touch_session(&self, id: Uuid) -> DbResult<SessionRecord> {
        let mut session = self.get_session(id).await?;
        session.updated_at = jetzt();
        self.ausfuehren(
            format!("UPDATE {} SET updated_at = ? WHERE id = ?", self.tabelle("sessions")),
            (millis(&session.updated_at), id.to_string()),
        )
        .await?;
        Ok(session)
    }

    async fn delete_sessions_for_user(&self, user_id: Uuid) -> DbResult<u64> {
        // Loeschen nur ueber den Primaerschluessel moeglich
        let ids: Vec<(String,)> = self
            .zeilen(
                format!("SELECT id FROM {} WHERE user_id = ?", self.tabelle("sessions")),
                (user_id.to_string(),),
            )
            .await?;

        for (id,) in &ids {
            self.ausfuehren(
                format!("DELETE FROM {} WHERE id = ?", self.tabelle("sessions")),
                (id,),
            )
            .await?;
        }
        Ok(ids.len() as u64)
    }
}
