//! Datenbankmodelle fuer Authwerk
//!
//! Diese Typen repraesentieren Datensaetze aus dem Speicher. Sie sind reine
//! Datenuebertragungsobjekte; das Verhalten liegt im Auth-Crate.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use authwerk_core::types::{rollen_teilen, VerifizierungsZweck};

/// Aktueller Zeitpunkt in Speicher-Genauigkeit (Millisekunden)
///
/// Alle Backends speichern mindestens Millisekunden; damit sind gelesene
/// und geschriebene Datensaetze direkt vergleichbar.
pub fn jetzt() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Normalisiert eine E-Mail-Adresse fuer Speicherung und Suche
pub fn email_normalisieren(email: &str) -> String {
    email.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Benutzer
// ---------------------------------------------------------------------------

/// Optionale Profilfelder eines Benutzers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenutzerProfil {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub middle_name: Option<String>,
    pub nickname: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<String>,
    pub phone_number: Option<String>,
    pub picture: Option<String>,
}

/// Benutzer-Datensatz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenutzerRecord {
    pub id: Uuid,
    pub email: String,
    pub email_verified_at: Option<DateTime<Utc>>,
    /// Argon2id-PHC-String (None bei passwortlosen Konten)
    pub password: Option<String>,
    /// Kommagetrennte Signup-Methoden (z.B. "basic_auth")
    pub signup_methods: String,
    #[serde(flatten)]
    pub profil: BenutzerProfil,
    pub phone_number_verified_at: Option<DateTime<Utc>>,
    /// Kommagetrennte Rollenliste
    pub roles: String,
    pub revoked_timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BenutzerRecord {
    pub fn ist_verifiziert(&self) -> bool {
        self.email_verified_at.is_some()
    }

    pub fn ist_widerrufen(&self) -> bool {
        self.revoked_timestamp.is_some()
    }

    pub fn rollen(&self) -> Vec<String> {
        rollen_teilen(&self.roles)
    }
}

/// Daten zum Erstellen eines neuen Benutzers
#[derive(Debug, Clone, Default)]
pub struct NeuerBenutzer {
    /// Wird vom Provider vergeben wenn leer
    pub id: Option<Uuid>,
    pub email: String,
    pub password: Option<String>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub signup_methods: String,
    pub profil: BenutzerProfil,
    pub roles: String,
}

impl NeuerBenutzer {
    /// Baut den vollstaendigen Datensatz mit vergebener ID und Zeitstempeln
    pub fn in_record(self, jetzt: DateTime<Utc>) -> BenutzerRecord {
        BenutzerRecord {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            email: email_normalisieren(&self.email),
            email_verified_at: self.email_verified_at,
            password: self.password,
            signup_methods: self.signup_methods,
            profil: self.profil,
            phone_number_verified_at: None,
            roles: self.roles,
            revoked_timestamp: None,
            created_at: jetzt,
            updated_at: jetzt,
        }
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Persistierte Session-Metadaten (nicht der Token selbst)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_agent: String,
    pub ip: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Daten zum Anlegen einer Session
#[derive(Debug, Clone)]
pub struct NeueSession {
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub user_agent: String,
    pub ip: String,
}

impl NeueSession {
    pub fn in_record(self, jetzt: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            user_id: self.user_id,
            user_agent: self.user_agent,
            ip: self.ip,
            created_at: jetzt,
            updated_at: jetzt,
        }
    }
}

// ---------------------------------------------------------------------------
// Verifizierungsanfragen
// ---------------------------------------------------------------------------

/// Einmal einloesbare, ablaufende Verifizierungsanfrage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifizierungRecord {
    pub id: Uuid,
    pub token: String,
    pub identifier: VerifizierungsZweck,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub nonce: String,
    pub redirect_uri: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerifizierungRecord {
    /// Abgelaufen sobald `expires_at` erreicht ist
    pub fn ist_abgelaufen(&self, jetzt: DateTime<Utc>) -> bool {
        jetzt >= self.expires_at
    }
}

/// Daten zum Anlegen (bzw. Ersetzen) einer Verifizierungsanfrage
#[derive(Debug, Clone)]
pub struct NeueVerifizierung {
    pub id: Option<Uuid>,
    pub token: String,
    pub identifier: VerifizierungsZweck,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub nonce: String,
    pub redirect_uri: Option<String>,
}

impl NeueVerifizierung {
    pub fn in_record(self, jetzt: DateTime<Utc>) -> VerifizierungRecord {
        VerifizierungRecord {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            token: self.token,
            identifier: self.identifier,
            email: email_normalisieren(&self.email),
            expires_at: self.expires_at.trunc_subsecs(3),
            nonce: self.nonce,
            redirect_uri: self.redirect_uri,
            created_at: jetzt,
            updated_at: jetzt,
        }
    }
}

// ---------------------------------------------------------------------------
// Env (persistierte, verschluesselte Konfiguration)
// ---------------------------------------------------------------------------

/// Verschluesselter Konfigurations-Blob samt Pruefsumme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvRecord {
    pub id: Uuid,
    pub env: String,
    pub hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Daten zum Anlegen des Env-Datensatzes
#[derive(Debug, Clone)]
pub struct NeuesEnv {
    pub id: Option<Uuid>,
    pub env: String,
    pub hash: String,
}

impl NeuesEnv {
    pub fn in_record(self, jetzt: DateTime<Utc>) -> EnvRecord {
        EnvRecord {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            env: self.env,
            hash: self.hash,
            created_at: jetzt,
            updated_at: jetzt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn jetzt_hat_millisekunden_genauigkeit() {
        assert_eq!(jetzt().timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn neuer_benutzer_normalisiert_email_und_vergibt_id() {
        let jetzt = Utc::now();
        let record = NeuerBenutzer {
            email: "  Alice@Example.COM ".into(),
            roles: "user".into(),
            ..Default::default()
        }
        .in_record(jetzt);

        assert_eq!(record.email, "alice@example.com");
        assert_eq!(record.created_at, jetzt);
        assert_eq!(record.updated_at, jetzt);
        assert!(!record.ist_verifiziert());
        assert!(!record.ist_widerrufen());
    }

    #[test]
    fn vorgegebene_id_bleibt_erhalten() {
        let id = Uuid::new_v4();
        let record = NeueSession {
            id: Some(id),
            user_id: Uuid::new_v4(),
            user_agent: "curl".into(),
            ip: "127.0.0.1".into(),
        }
        .in_record(Utc::now());
        assert_eq!(record.id, id);
    }

    #[test]
    fn verifizierung_ablauf_grenze() {
        let jetzt = Utc::now();
        let record = NeueVerifizierung {
            id: None,
            token: "t".into(),
            identifier: VerifizierungsZweck::BasicSignup,
            email: "a@b.com".into(),
            expires_at: jetzt + Duration::minutes(30),
            nonce: "n".into(),
            redirect_uri: None,
        }
        .in_record(jetzt);

        assert!(!record.ist_abgelaufen(jetzt));
        assert!(record.ist_abgelaufen(jetzt + Duration::minutes(30)));
    }

    #[test]
    fn benutzer_json_flacht_profil_ab() {
        let record = NeuerBenutzer {
            email: "a@b.com".into(),
            profil: BenutzerProfil {
                given_name: Some("Ada".into()),
                ..Default::default()
            },
            ..Default::default()
        }
        .in_record(Utc::now());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["given_name"], "Ada");
        let zurueck: BenutzerRecord = serde_json::from_value(json).unwrap();
        assert_eq!(zurueck, record);
    }
}
