//! Authwerk Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use anyhow::Result;
use authwerk_observability::logging::{log_format_aus_env, log_level_aus_env};
use authwerk_observability::logging_initialisieren;
use authwerk_server::{config::ServerConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = ServerConfig::pfad_aus_env();

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = ServerConfig::laden(&config_pfad)?;

    logging_initialisieren(
        &log_level_aus_env(&config.logging.level),
        &log_format_aus_env(&config.logging.format),
    );

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Authwerk Server wird initialisiert"
    );

    Server::neu(config).starten().await
}
