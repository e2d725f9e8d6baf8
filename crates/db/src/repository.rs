//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt die Geschaeftslogik von der konkreten
//! Datenbank. Jedes Backend implementiert alle vier Entitaets-Traits und
//! damit den Sammel-Trait [`Provider`], der zur Laufzeit als
//! `Arc<dyn Provider>` ausgewaehlt wird.
//!
//! Gemeinsame Semantik aller Backends:
//! - `create_*` vergibt eine ID wenn keine gesetzt ist und stempelt
//!   `created_at`/`updated_at`
//! - `get_*` liefert `DbError::NichtGefunden` wenn der Datensatz fehlt
//! - `list_*` sortiert nach `created_at` absteigend und liefert die
//!   Gesamtanzahl mit
//! - `update_*` ersetzt den kompletten Datensatz und stempelt `updated_at`
//! - explizite Einzel-Loeschungen schlagen bei fehlendem Datensatz fehl,
//!   `delete_sessions_for_user` ist idempotent

use async_trait::async_trait;
use uuid::Uuid;

use authwerk_core::types::{Paginierung, Seite, VerifizierungsZweck};

use crate::error::DbError;
use crate::models::{
    BenutzerRecord, EnvRecord, NeueSession, NeueVerifizierung, NeuerBenutzer, NeuesEnv,
    SessionRecord, VerifizierungRecord,
};

/// Result-Alias fuer das Datenbank-Crate
pub type DbResult<T> = Result<T, DbError>;

/// Unterstuetzte Speicher-Backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    /// SQLite ueber sqlx – relationale Familie
    Sqlite,
    /// Fluechtiger In-Process-Speicher, nur Tests und Entwicklung
    Speicher,
    /// Cassandra/ScyllaDB – Wide-Column-Familie
    Cassandra,
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "SQLite"),
            Self::Speicher => write!(f, "Speicher (fluechtig)"),
            Self::Cassandra => write!(f, "Cassandra"),
        }
    }
}

impl std::str::FromStr for DatabaseBackend {
    type Err = DbError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "speicher" | "memory" | "dokument" => Ok(Self::Speicher),
            "cassandra" | "cassandradb" | "scylladb" => Ok(Self::Cassandra),
            other => Err(DbError::Konfiguration(format!(
                "Unbekannter Datenbank-Typ: {other}"
            ))),
        }
    }
}

/// Verschluesseltes TLS-Material (Base64, AES-256-GCM)
#[derive(Debug, Clone, Default)]
pub struct VerschluesselteTls {
    pub zertifikat: String,
    pub schluessel: String,
    pub ca_zertifikat: String,
}

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Ausgewaehltes Backend
    pub backend: DatabaseBackend,
    /// Verbindungs-URL; bei Clustern kommagetrennte Knotenliste
    pub url: String,
    /// Alternativ zur URL: Host und Port
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Datenbank- bzw. Keyspace-Name
    pub name: String,
    pub benutzername: Option<String>,
    pub passwort: Option<String>,
    /// TLS-Material (nur wenn alle drei Teile gesetzt sind)
    pub tls: Option<VerschluesselteTls>,
    /// Base64-kodierter 256-Bit-Schluessel zum Entschluesseln des TLS-Materials
    pub geheimnis: Option<String>,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
    /// Verbindungsversuche beim Start (transiente Fehler)
    pub verbindungsversuche: u32,
    /// Replikationsfaktor beim Anlegen eines Keyspaces
    pub replikationsfaktor: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Sqlite,
            url: "sqlite://authwerk.db".into(),
            host: None,
            port: None,
            name: "authwerk".into(),
            benutzername: None,
            passwort: None,
            tls: None,
            geheimnis: None,
            max_verbindungen: 5,
            sqlite_wal: true,
            verbindungsversuche: 3,
            replikationsfaktor: 1,
        }
    }
}

impl DatabaseConfig {
    /// Verbindungsziel: URL, sonst `host[:port]`
    pub fn ziel(&self) -> String {
        if !self.url.trim().is_empty() {
            return self.url.trim().to_string();
        }
        match (&self.host, self.port) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.clone(),
            _ => String::new(),
        }
    }

    /// Knotenliste fuer Cluster-Backends (kommagetrennt im Ziel)
    pub fn knoten(&self) -> Vec<String> {
        self.ziel()
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Zugangsdaten nur wenn Benutzername und Passwort gesetzt sind
    pub fn zugangsdaten(&self) -> Option<(&str, &str)> {
        match (self.benutzername.as_deref(), self.passwort.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }
}

/// Repository fuer Benutzer
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Legt einen Benutzer an; doppelte E-Mail ergibt `Eindeutigkeit`
    async fn create_user(&self, data: NeuerBenutzer) -> DbResult<BenutzerRecord>;

    async fn get_user(&self, id: Uuid) -> DbResult<BenutzerRecord>;

    /// Sucht per normalisierter E-Mail
    async fn get_user_by_email(&self, email: &str) -> DbResult<BenutzerRecord>;

    async fn list_users(&self, paginierung: Paginierung) -> DbResult<Seite<BenutzerRecord>>;

    /// Ersetzt den kompletten Datensatz (ausser `created_at`)
    ///
    /// Ein gesetztes `email_verified_at` bleibt erhalten, wenn der neue
    /// Datensatz `None` traegt.
    async fn update_user(&self, benutzer: BenutzerRecord) -> DbResult<BenutzerRecord>;

    /// Loescht den Benutzer samt seiner Sessions
    async fn delete_user(&self, id: Uuid) -> DbResult<()>;
}

/// Repository fuer persistierte Session-Metadaten
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Legt eine Session an; der Benutzer muss existieren
    async fn create_session(&self, data: NeueSession) -> DbResult<SessionRecord>;

    async fn get_session(&self, id: Uuid) -> DbResult<SessionRecord>;

    async fn list_sessions_for_user(&self, user_id: Uuid) -> DbResult<Vec<SessionRecord>>;

    /// Frischt `updated_at` auf
    async fn touch_session(&self, id: Uuid) -> DbResult<SessionRecord>;

    /// Loescht alle Sessions eines Benutzers, gibt die Anzahl zurueck
    async fn delete_sessions_for_user(&self, user_id: Uuid) -> DbResult<u64>;
}

/// Repository fuer Verifizierungsanfragen
#[async_trait]
pub trait VerificationRepository: Send + Sync {
    /// Legt eine Anfrage an oder ersetzt die bestehende fuer (email, identifier)
    async fn upsert_verification(&self, data: NeueVerifizierung)
        -> DbResult<VerifizierungRecord>;

    async fn get_verification(&self, id: Uuid) -> DbResult<VerifizierungRecord>;

    async fn get_verification_by_token(&self, token: &str) -> DbResult<VerifizierungRecord>;

    async fn get_verification_by_email(
        &self,
        email: &str,
        identifier: VerifizierungsZweck,
    ) -> DbResult<VerifizierungRecord>;

    async fn list_verifications(
        &self,
        paginierung: Paginierung,
    ) -> DbResult<Seite<VerifizierungRecord>>;

    /// Verbraucht eine Anfrage; fehlt sie, gibt es `NichtGefunden`
    async fn delete_verification(&self, id: Uuid) -> DbResult<()>;
}

/// Repository fuer den Env-Datensatz
#[async_trait]
pub trait EnvRepository: Send + Sync {
    async fn create_env(&self, data: NeuesEnv) -> DbResult<EnvRecord>;

    /// Liefert den (einzigen) Env-Datensatz
    async fn get_env(&self) -> DbResult<EnvRecord>;

    async fn update_env(&self, env: EnvRecord) -> DbResult<EnvRecord>;
}

/// Vollstaendige Provider-Schnittstelle eines Backends
#[async_trait]
pub trait Provider: UserRepository + SessionRepository + VerificationRepository + EnvRepository {
    fn backend(&self) -> DatabaseBackend;

    /// Leichte Erreichbarkeitspruefung (Health-Check)
    async fn pruefen(&self) -> DbResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_config_standard() {
        let cfg = DatabaseConfig::default();
        assert_eq!(cfg.backend, DatabaseBackend::Sqlite);
        assert!(cfg.sqlite_wal);
        assert_eq!(cfg.max_verbindungen, 5);
        assert_eq!(cfg.verbindungsversuche, 3);
    }

    #[test]
    fn backend_anzeige_und_parsen() {
        assert_eq!(DatabaseBackend::Sqlite.to_string(), "SQLite");
        assert_eq!(
            "ScyllaDB".parse::<DatabaseBackend>().unwrap(),
            DatabaseBackend::Cassandra
        );
        assert_eq!(
            "memory".parse::<DatabaseBackend>().unwrap(),
            DatabaseBackend::Speicher
        );
        assert!("oracle".parse::<DatabaseBackend>().is_err());
    }

    #[test]
    fn ziel_aus_host_und_port() {
        let cfg = DatabaseConfig {
            url: String::new(),
            host: Some("db.intern".into()),
            port: Some(9042),
            ..Default::default()
        };
        assert_eq!(cfg.ziel(), "db.intern:9042");
    }

    #[test]
    fn knoten_aus_kommaliste() {
        let cfg = DatabaseConfig {
            url: "10.0.0.1:9042, 10.0.0.2:9042,".into(),
            ..Default::default()
        };
        assert_eq!(cfg.knoten(), vec!["10.0.0.1:9042", "10.0.0.2:9042"]);
    }

    #[test]
    fn zugangsdaten_nur_vollstaendig() {
        let mut cfg = DatabaseConfig {
            benutzername: Some("cassandra".into()),
            ..Default::default()
        };
        assert!(cfg.zugangsdaten().is_none());
        cfg.passwort = Some("geheim".into());
        assert_eq!(cfg.zugangsdaten(), Some(("cassandra", "geheim")));
    }
}
