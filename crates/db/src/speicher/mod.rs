//! Fluechtiger In-Process-Speicher fuer Tests und Entwicklung
//!
//! Jede Sammlung haelt JSON-Dokumente und deklariert eindeutige Indizes.
//! Alle Schreibzugriffe laufen unter einer einzigen Schreibsperre, damit
//! Pruefung und Schreiben eines Dokuments atomar sind. Der Inhalt lebt
//! nur so lange wie der Prozess; der Server oeffnet dieses Backend nur
//! mit `datenbank.fluechtig_erlaubt = true`.

mod env;
mod sammlung;
mod sessions;
mod users;
mod verifications;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::repository::{DatabaseBackend, DatabaseConfig, DbResult, Provider};
use sammlung::Datenbank;

pub(crate) const USERS: &str = "users";
pub(crate) const SESSIONS: &str = "sessions";
pub(crate) const VERIFICATION_REQUESTS: &str = "verification_requests";
pub(crate) const ENV: &str = "env";

/// Fluechtiger Speicher mit geteiltem Zustand
#[derive(Debug, Clone, Default)]
pub struct SpeicherDb {
    inner: Arc<RwLock<Datenbank>>,
}

impl SpeicherDb {
    /// Oeffnet den Speicher und stellt alle Sammlungen sicher
    pub fn oeffnen(config: &DatabaseConfig) -> DbResult<Self> {
        let db = Self::neu();
        warn!(
            name = %config.name,
            "Fluechtiger Speicher geoeffnet, alle Daten gehen beim Beenden verloren"
        );
        Ok(db)
    }

    /// Leerer Speicher mit angelegten Sammlungen (auch fuer Tests)
    pub fn neu() -> Self {
        let db = Self::default();
        db.sammlungen_sicherstellen();
        db
    }

    /// Legt fehlende Sammlungen und Indizes an (idempotent)
    pub fn sammlungen_sicherstellen(&self) {
        let mut db = self.inner.write();
        for (name, eindeutig) in [
            (USERS, &[&["email"][..]][..]),
            (SESSIONS, &[][..]),
            (VERIFICATION_REQUESTS, &[&["email", "identifier"][..]][..]),
            (ENV, &[][..]),
        ] {
            if db.sammlung_sicherstellen(name, eindeutig) {
                debug!(sammlung = name, "Sammlung angelegt");
            }
        }
    }

    /// Lesezugriff auf den Speicher
    pub(crate) fn lesen<T>(&self, f: impl FnOnce(&Datenbank) -> DbResult<T>) -> DbResult<T> {
        f(&self.inner.read())
    }

    /// Atomarer Schreibzugriff; alle Aenderungen in `f` sind nach aussen
    /// erst nach Rueckkehr sichtbar
    pub(crate) fn mutieren<T>(
        &self,
        f: impl FnOnce(&mut Datenbank) -> DbResult<T>,
    ) -> DbResult<T> {
        f(&mut self.inner.write())
    }
}

pub(crate) fn dokument<T: Serialize>(wert: &T) -> DbResult<Value> {
    Ok(serde_json::to_value(wert)?)
}

pub(crate) fn aus_dokument<T: DeserializeOwned>(dok: &Value) -> DbResult<T> {
    Ok(serde_json::from_value(dok.clone())?)
}

#[async_trait]
impl Provider for SpeicherDb {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Speicher
    }

    async fn pruefen(&self) -> DbResult<()> {
        self.lesen(|db| db.sammlung(USERS).map(|_| ()))
    }
}
