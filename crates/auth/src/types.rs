//! Ein- und Ausgabetypen an der Transportgrenze

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use authwerk_core::types::VerifizierungsZweck;
use authwerk_db::models::{BenutzerProfil, BenutzerRecord};

/// Kontext einer einzelnen Anfrage
#[derive(Debug, Clone, Default)]
pub struct AnfrageKontext {
    pub user_agent: String,
    pub ip: String,
    /// Frist fuer alle Speicherzugriffe dieser Anfrage (sonst Standard aus den Einstellungen)
    pub frist: Option<Duration>,
}

impl AnfrageKontext {
    pub fn neu(user_agent: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ip: ip.into(),
            frist: None,
        }
    }

    pub fn mit_frist(mut self, frist: Duration) -> Self {
        self.frist = Some(frist);
        self
    }
}

// ---------------------------------------------------------------------------
// Eingaben
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrierungsEingabe {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(flatten)]
    pub profil: BenutzerProfil,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifizierungsEingabe {
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnmeldeEingabe {
    pub email: String,
    pub password: String,
    /// Muss eine Teilmenge der Rollen des Benutzers sein
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbmeldeEingabe {
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErneutSendenEingabe {
    pub email: String,
    pub identifier: VerifizierungsZweck,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswortVergessenEingabe {
    pub email: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswortZuruecksetzenEingabe {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ZugriffEingabe {
    pub user_id: Uuid,
}

// ---------------------------------------------------------------------------
// Ausgaben
// ---------------------------------------------------------------------------

/// Oeffentliche Sicht auf einen Benutzer (ohne Passwort-Hash)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenutzerAntwort {
    pub id: Uuid,
    pub email: String,
    pub email_verified: bool,
    pub signup_methods: String,
    #[serde(flatten)]
    pub profil: BenutzerProfil,
    pub roles: Vec<String>,
    pub revoked_timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&BenutzerRecord> for BenutzerAntwort {
    fn from(b: &BenutzerRecord) -> Self {
        Self {
            id: b.id,
            email: b.email.clone(),
            email_verified: b.ist_verifiziert(),
            signup_methods: b.signup_methods.clone(),
            profil: b.profil.clone(),
            roles: b.rollen(),
            revoked_timestamp: b.revoked_timestamp,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

/// Antwort von Registrierung, Verifizierung und Anmeldung
#[derive(Debug, Clone, Serialize)]
pub struct AuthAntwort {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Ablauf des Access-Tokens (Unix-Sekunden)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub user: Option<BenutzerAntwort>,
}

impl AuthAntwort {
    pub fn nur_meldung(message: impl Into<String>, user: Option<BenutzerAntwort>) -> Self {
        Self {
            message: message.into(),
            access_token: None,
            refresh_token: None,
            expires_at: None,
            user,
        }
    }

    pub fn hat_tokens(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Reine Statusmeldung
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meldung {
    pub message: String,
}

impl Meldung {
    pub fn neu(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authwerk_db::models::NeuerBenutzer;

    #[test]
    fn registrierung_aus_json_mit_profil() {
        let eingabe: RegistrierungsEingabe = serde_json::from_str(
            r#"{"email":"a@example.com","password":"x","confirm_password":"x","given_name":"Ada"}"#,
        )
        .unwrap();
        assert_eq!(eingabe.profil.given_name.as_deref(), Some("Ada"));
        assert!(eingabe.roles.is_none());
    }

    #[test]
    fn benutzer_antwort_ohne_passwort() {
        let record = NeuerBenutzer {
            email: "a@example.com".into(),
            password: Some("$argon2id$geheim".into()),
            roles: "user,admin".into(),
            ..Default::default()
        }
        .in_record(Utc::now());

        let json = serde_json::to_value(BenutzerAntwort::from(&record)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["roles"], serde_json::json!(["user", "admin"]));
        assert_eq!(json["email_verified"], false);
    }

    #[test]
    fn antwort_ohne_tokens_laesst_felder_weg() {
        let json = serde_json::to_value(AuthAntwort::nur_meldung("ok", None)).unwrap();
        assert!(json.get("access_token").is_none());
        assert_eq!(json["message"], "ok");
    }
}
