//! Token-Session-Store
//!
//! Haelt die aktiven Access-Tokens im Speicher (HashMap mit TTL) und
//! ordnet sie Benutzer und Refresh-Token zu. Die persistierten
//! Session-Metadaten liegen zusaetzlich im Provider.
//! Ein Hintergrund-Task bereinigt abgelaufene Eintraege.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Intervall fuer den automatischen Cleanup-Task: 15 Minuten
const CLEANUP_INTERVALL: Duration = Duration::from_secs(15 * 60);

/// Eine aktive Token-Session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSession {
    pub user_id: Uuid,
    /// ID der persistierten Session-Metadaten
    pub session_id: Uuid,
    pub refresh_token: String,
    pub nonce: String,
    pub erstellt_am: DateTime<Utc>,
    /// Ablauf des Access-Tokens
    pub laeuft_ab_am: DateTime<Utc>,
}

impl TokenSession {
    pub fn ist_gueltig(&self) -> bool {
        Utc::now() < self.laeuft_ab_am
    }
}

/// In-Memory Store: Access-Token -> Session
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, TokenSession>>,
}

impl SessionStore {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Startet den Cleanup-Task fuer einen bestehenden Store
    pub fn neu_mit_cleanup(store: Arc<Self>) -> Arc<Self> {
        let store_klon = Arc::clone(&store);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(CLEANUP_INTERVALL).await;
                let entfernt = store_klon.cleanup_abgelaufene().await;
                if entfernt > 0 {
                    tracing::debug!(anzahl = entfernt, "Abgelaufene Token-Sessions bereinigt");
                }
            }
        });
        store
    }

    /// Registriert ein ausgestelltes Access-Token
    pub async fn setzen(&self, access_token: String, session: TokenSession) {
        tracing::debug!(user_id = %session.user_id, "Token-Session gesetzt");
        self.sessions.write().await.insert(access_token, session);
    }

    pub async fn validieren(&self, access_token: &str) -> AuthResult<TokenSession> {
        let sessions = self.sessions.read().await;
        match sessions.get(access_token) {
            None => Err(AuthError::TokenUngueltig),
            Some(session) if !session.ist_gueltig() => {
                Err(AuthError::Abgelaufen("session expired".into()))
            }
            Some(session) => Ok(session.clone()),
        }
    }

    /// Entfernt ein einzelnes Token; `true` wenn es existierte
    pub async fn invalidieren(&self, access_token: &str) -> bool {
        self.sessions.write().await.remove(access_token).is_some()
    }

    /// Invalidiert alle Sessions eines Benutzers (Logout, Widerruf, Passwort-Reset)
    pub async fn alle_invalidieren(&self, user_id: Uuid) -> usize {
        let mut sessions = self.sessions.write().await;
        let vorher = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        let entfernt = vorher - sessions.len();
        if entfernt > 0 {
            tracing::debug!(user_id = %user_id, anzahl = entfernt, "Alle Token-Sessions invalidiert");
        }
        entfernt
    }

    pub async fn cleanup_abgelaufene(&self) -> usize {
        let jetzt = Utc::now();
        let mut sessions = self.sessions.write().await;
        let vorher = sessions.len();
        sessions.retain(|_, s| s.laeuft_ab_am > jetzt);
        vorher - sessions.len()
    }

    pub async fn anzahl_aktive(&self) -> usize {
        let jetzt = Utc::now();
        let sessions = self.sessions.read().await;
        sessions.values().filter(|s| s.laeuft_ab_am > jetzt).count()
    }
}
