//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist (SQLite-Datei im Arbeitsverzeichnis).

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use authwerk_auth::AuthEinstellungen;
use authwerk_core::error::AuthwerkError;
use authwerk_db::{DatabaseBackend, DatabaseConfig, VerschluesselteTls};

/// Umgebungsvariable mit dem Pfad der Konfigurationsdatei
pub const ENV_CONFIG: &str = "AUTHWERK_CONFIG";
pub const STANDARD_CONFIG_PFAD: &str = "config.toml";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Speicher-Backend
    pub datenbank: DatenbankEinstellungen,
    /// Credential-Lebenszyklus
    pub auth: AuthEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename der Instanz (nur fuer Logs)
    pub name: String,
    /// Bind-Adresse fuer alle Listener
    pub bind_adresse: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Authwerk".into(),
            bind_adresse: "0.0.0.0".into(),
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Datenbank-Typ: "sqlite", "speicher" oder "cassandra"
    pub typ: String,
    /// Verbindungs-URL bzw. kommagetrennte Knotenliste
    pub url: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Datenbank- bzw. Keyspace-Name
    pub name: String,
    pub benutzername: Option<String>,
    pub passwort: Option<String>,
    /// Verschluesseltes TLS-Material (Base64, AES-256-GCM)
    pub tls_zertifikat: Option<String>,
    pub tls_schluessel: Option<String>,
    pub tls_ca_zertifikat: Option<String>,
    /// Base64-kodierter Schluessel fuer das TLS-Material
    pub geheimnis: Option<String>,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    pub sqlite_wal: bool,
    pub verbindungsversuche: u32,
    pub replikationsfaktor: u32,
    /// Erlaubt `typ = "speicher"` (Daten gehen beim Beenden verloren)
    pub fluechtig_erlaubt: bool,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        let standard = DatabaseConfig::default();
        Self {
            typ: "sqlite".into(),
            url: standard.url,
            host: None,
            port: None,
            name: standard.name,
            benutzername: None,
            passwort: None,
            tls_zertifikat: None,
            tls_schluessel: None,
            tls_ca_zertifikat: None,
            geheimnis: None,
            max_verbindungen: standard.max_verbindungen,
            sqlite_wal: standard.sqlite_wal,
            verbindungsversuche: standard.verbindungsversuche,
            replikationsfaktor: standard.replikationsfaktor,
            fluechtig_erlaubt: false,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level bzw. Filter-Direktive: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
    /// Abstand der Datenbank-Erreichbarkeitspruefung in Sekunden
    pub health_intervall_sekunden: u64,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
            health_intervall_sekunden: 15,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Pfad aus `AUTHWERK_CONFIG`, sonst `config.toml`
    pub fn pfad_aus_env() -> String {
        std::env::var(ENV_CONFIG).unwrap_or_else(|_| STANDARD_CONFIG_PFAD.into())
    }

    /// Uebersetzt die `[datenbank]`-Sektion fuer `provider_oeffnen`
    pub fn datenbank_config(&self) -> Result<DatabaseConfig, AuthwerkError> {
        let d = &self.datenbank;
        let backend: DatabaseBackend = d
            .typ
            .parse()
            .map_err(|e| AuthwerkError::Konfiguration(format!("{e}")))?;
        if backend == DatabaseBackend::Speicher && !d.fluechtig_erlaubt {
            return Err(AuthwerkError::Konfiguration(
                "datenbank.typ = \"speicher\" ist fluechtig und nur mit datenbank.fluechtig_erlaubt = true zulaessig".into(),
            ));
        }

        let tls = match (&d.tls_zertifikat, &d.tls_schluessel, &d.tls_ca_zertifikat) {
            (Some(zertifikat), Some(schluessel), Some(ca)) => Some(VerschluesselteTls {
                zertifikat: zertifikat.clone(),
                schluessel: schluessel.clone(),
                ca_zertifikat: ca.clone(),
            }),
            (None, None, None) => None,
            _ => {
                return Err(AuthwerkError::Konfiguration(
                    "datenbank.tls_zertifikat, tls_schluessel und tls_ca_zertifikat nur gemeinsam"
                        .into(),
                ))
            }
        };

        Ok(DatabaseConfig {
            backend,
            url: d.url.clone(),
            host: d.host.clone(),
            port: d.port,
            name: d.name.clone(),
            benutzername: d.benutzername.clone(),
            passwort: d.passwort.clone(),
            tls,
            geheimnis: d.geheimnis.clone(),
            max_verbindungen: d.max_verbindungen,
            sqlite_wal: d.sqlite_wal,
            verbindungsversuche: d.verbindungsversuche,
            replikationsfaktor: d.replikationsfaktor,
        })
    }

    /// Erzeugt ein zufaelliges JWT-Geheimnis wenn keines konfiguriert ist
    ///
    /// Tokens aus einem solchen Lauf sind nach einem Neustart ungueltig.
    /// Gibt `true` zurueck wenn ein Geheimnis erzeugt wurde.
    pub fn jwt_geheimnis_sicherstellen(&mut self) -> bool {
        if !self.auth.jwt_geheimnis.trim().is_empty() {
            return false;
        }
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        self.auth.jwt_geheimnis = URL_SAFE_NO_PAD.encode(bytes);
        tracing::warn!(
            "auth.jwt_geheimnis nicht gesetzt, verwende ephemeres Geheimnis (Tokens ueberleben keinen Neustart)"
        );
        true
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.server.bind_adresse, self.observability.port)
    }

    pub fn health_intervall(&self) -> Duration {
        Duration::from_secs(self.observability.health_intervall_sekunden.max(1))
    }
}
