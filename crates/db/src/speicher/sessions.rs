//! Speicher-Implementierung des SessionRepository

use std::cmp::Reverse;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use super::{aus_dokument, dokument, SpeicherDb, SESSIONS, USERS};
use crate::error::DbError;
use crate::models::{jetzt, NeueSession, SessionRecord};
use crate::repository::{DbResult, SessionRepository};

#[async_trait]
impl SessionRepository for SpeicherDb {
    async fn create_session(&self, data: NeueSession) -> DbResult<SessionRecord> {
        let record = data.in_record(jetzt());
        let dok = dokument(&record)?;

        self.mutieren(|db| {
            if db.sammlung(USERS)?.holen(&record.user_id.to_string()).is_none() {
                return Err(DbError::nicht_gefunden(format!("User {}", record.user_id)));
            }
            db.sammlung_mut(SESSIONS)?
                .einfuegen(record.id.to_string(), dok)
        })?;

        Ok(record)
    }

    async fn get_session(&self, id: Uuid) -> DbResult<SessionRecord> {
        self.lesen(|db| {
            let dok = db
                .sammlung(SESSIONS)?
                .holen(&id.to_string())
                .ok_or_else(|| DbError::nicht_gefunden(format!("Session {id}")))?;
            aus_dokument(dok)
        })
    }

    async fn list_sessions_for_user(&self, user_id: Uuid) -> DbResult<Vec<SessionRecord>> {
        self.lesen(|db| {
            let mut sessions = db
                .sammlung(SESSIONS)?
                .finden(&[("user_id", json!(user_id.to_string()))])
                .into_iter()
                .map(aus_dokument::<SessionRecord>)
                .collect::<DbResult<Vec<_>>>()?;
            sessions.sort_by_key(|s| (Reverse(s.created_at), s.id));
            Ok(sessions)
        })
    }

    async fn touch_session(&self, id: Uuid) -> DbResult<SessionRecord> {
        self.mutieren(|db| {
            let sessions = db.sammlung_mut(SESSIONS)?;
            let key = id.to_string();
            let mut session: SessionRecord = aus_dokument(
                sessions
                    .holen(&key)
                    .ok_or_else(|| DbError::nicht_gefunden(format!("Session {id}")))?,
            )?;
            session.updated_at = jetzt();
            sessions.ersetzen(&key, dokument(&session)?)?;
            Ok(session)
        })
    }

    async fn delete_sessions_for_user(&self, user_id: Uuid) -> DbResult<u64> {
        self.mutieren(|db| {
            Ok(db
                .sammlung_mut(SESSIONS)?
                .loeschen_wo(&[("user_id", json!(user_id.to_string()))]))
        })
    }
}
