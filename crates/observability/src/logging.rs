//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `AW_LOG_LEVEL`: Log-Level bzw. Filter-Direktive, Standard aus der Konfiguration
//! - `AW_LOG_FORMAT`: Format (text/json), Standard aus der Konfiguration
//!
//! Die Umgebung hat Vorrang vor der Konfigurationsdatei.

use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "AW_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "AW_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// Ein zweiter Aufruf im selben Prozess ist wirkungslos und liefert `false`.
pub fn logging_initialisieren(level: &str, format: &str) -> bool {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = std::env::var(ENV_LOG_FORMAT).unwrap_or_else(|_| format.to_string());

    let ergebnis = match format.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init(),
        _ => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.is_ok()
}

/// Log-Level aus der Umgebung, sonst der uebergebene Standard
pub fn log_level_aus_env(standard: &str) -> String {
    std::env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| standard.to_string())
}

/// Log-Format aus der Umgebung, sonst der uebergebene Standard
pub fn log_format_aus_env(standard: &str) -> String {
    std::env::var(ENV_LOG_FORMAT).unwrap_or_else(|_| standard.to_string())
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_werte() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(log_level_gueltig(level));
        }
        assert!(!log_level_gueltig("verbose"));
        assert!(!log_level_gueltig("INFO"));
        assert!(!log_level_gueltig(""));
    }

    #[test]
    fn log_format_werte() {
        assert!(log_format_gueltig("text"));
        assert!(log_format_gueltig("json"));
        assert!(!log_format_gueltig("xml"));
        assert!(!log_format_gueltig("JSON"));
    }

    // Ein Test fuer beide Variablen, damit parallele Tests sich nicht
    // gegenseitig die Umgebung veraendern
    #[test]
    fn umgebung_hat_vorrang_vor_standard() {
        std::env::remove_var(ENV_LOG_LEVEL);
        std::env::remove_var(ENV_LOG_FORMAT);
        assert_eq!(log_level_aus_env("warn"), "warn");
        assert_eq!(log_format_aus_env("text"), "text");

        std::env::set_var(ENV_LOG_LEVEL, "debug");
        std::env::set_var(ENV_LOG_FORMAT, "json");
        assert_eq!(log_level_aus_env("warn"), "debug");
        assert_eq!(log_format_aus_env("text"), "json");

        std::env::remove_var(ENV_LOG_LEVEL);
        std::env::remove_var(ENV_LOG_FORMAT);
    }

    #[test]
    fn zweite_initialisierung_ist_wirkungslos() {
        logging_initialisieren("info", "text");
        assert!(!logging_initialisieren("debug", "json"));
    }
}
