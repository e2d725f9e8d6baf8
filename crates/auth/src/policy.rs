//! Token- und Session-Richtlinien
//!
//! Feste Ablauffrist fuer Verifizierungsanfragen, Nonce-Erzeugung,
//! E-Mail-Syntax und Rollen-Allowlist.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use uuid::Uuid;

/// Gueltigkeit einer Verifizierungsanfrage
pub const VERIFIZIERUNG_GUELTIGKEIT_MINUTEN: i64 = 30;

/// Ablaufzeitpunkt einer neu ausgestellten Verifizierungsanfrage
pub fn verifizierung_ablauf(jetzt: DateTime<Utc>) -> DateTime<Utc> {
    jetzt + Duration::minutes(VERIFIZIERUNG_GUELTIGKEIT_MINUTEN)
}

/// Zufaellige Nonce (UUID v4)
pub fn nonce_erzeugen() -> String {
    Uuid::new_v4().to_string()
}

fn email_muster() -> Option<&'static Regex> {
    static MUSTER: OnceLock<Option<Regex>> = OnceLock::new();
    MUSTER
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]{2,}$").ok())
        .as_ref()
}

/// Prueft die Syntax einer (bereits normalisierten) E-Mail-Adresse
pub fn email_gueltig(email: &str) -> bool {
    email.len() <= 254 && email_muster().is_some_and(|re| re.is_match(email))
}

/// Alle angefragten Rollen muessen in der Allowlist stehen
pub fn rollen_erlaubt<S: AsRef<str>>(angefragt: &[S], erlaubt: &[String]) -> bool {
    angefragt
        .iter()
        .all(|r| erlaubt.iter().any(|e| e == r.as_ref()))
}
