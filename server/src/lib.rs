//! authwerk-server – Bibliotheks-Root
//!
//! Baut aus der Konfiguration den laufenden Zustand zusammen (Provider,
//! Auth-Service, Metriken, Health) und stellt den oeffentlichen
//! Einstiegspunkt fuer Integrationstests und eingebettete Transporte bereit.

pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use authwerk_auth::{AuthService, MailDispatcher, ProtokollMailer, SessionStore};
use authwerk_db::{provider_oeffnen, Provider};
use authwerk_observability::{observability_server_starten, AuthwerkMetrics, HealthState};
use config::ServerConfig;

/// Aufgebauter Laufzeitzustand
///
/// Ein Transport (HTTP, gRPC, ...) haelt `dienst` und ruft die
/// Lebenszyklus-Operationen darauf auf.
pub struct Laufzeit {
    pub dienst: Arc<AuthService>,
    pub provider: Arc<dyn Provider>,
    pub metriken: AuthwerkMetrics,
    pub health: HealthState,
    mail_worker: JoinHandle<()>,
}

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Oeffnet den Provider und baut den Auth-Service auf
    ///
    /// Fehler beim Oeffnen oder Provisionieren des Speichers sind fatal.
    pub async fn aufbauen(&mut self) -> Result<Laufzeit> {
        self.config.jwt_geheimnis_sicherstellen();

        let db_config = self.config.datenbank_config()?;
        let provider = provider_oeffnen(&db_config)
            .await
            .with_context(|| format!("Speicher-Provider '{}' nicht verfuegbar", db_config.backend))?;

        let metriken = AuthwerkMetrics::neu()?;
        let health = HealthState::neu();
        health.db_status_setzen(true);

        let auth = &self.config.auth;
        let (mail, mail_worker) = MailDispatcher::starten(
            Arc::new(ProtokollMailer),
            auth.mail_warteschlange,
            auth.mail_frist(),
            Some(metriken.clone()),
        );

        let dienst = AuthService::neu(Arc::clone(&provider), auth.clone(), mail)
            .context("Auth-Konfiguration ungueltig")?
            .mit_session_store(SessionStore::neu_mit_cleanup(SessionStore::neu()))
            .mit_metriken(metriken.clone());

        tracing::info!(
            backend = %provider.backend(),
            email_verifizierung = !auth.email_verifizierung_deaktiviert,
            basic_auth = !auth.basic_auth_deaktiviert,
            "Auth-Service bereit"
        );

        Ok(Laufzeit {
            dienst: Arc::new(dienst),
            provider,
            metriken,
            health,
            mail_worker,
        })
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Speicher-Provider oeffnen und provisionieren
    /// 2. Auth-Service, Mail-Worker und Session-Cleanup starten
    /// 3. Health-Pruefung und Observability-Server starten
    /// 4. Auf Ctrl-C warten
    pub async fn starten(mut self) -> Result<()> {
        tracing::info!(server_name = %self.config.server.name, "Server startet");

        let laufzeit = self.aufbauen().await?;
        let (stopp_tx, stopp_rx) = watch::channel(false);

        let health_task = health_pruefung_starten(
            Arc::clone(&laufzeit.provider),
            laufzeit.health.clone(),
            self.config.health_intervall(),
            stopp_rx.clone(),
        );

        let observability_task = if self.config.observability.aktiviert {
            let addr: SocketAddr = self
                .config
                .observability_bind_adresse()
                .parse()
                .context("Ungueltige Observability-Adresse")?;
            let mut stopp = stopp_rx.clone();
            let herunterfahren = async move {
                let _ = stopp.wait_for(|s| *s).await;
            };
            Some(tokio::spawn(observability_server_starten(
                addr,
                laufzeit.metriken.clone(),
                laufzeit.health.clone(),
                herunterfahren,
            )))
        } else {
            None
        };

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        let _ = stopp_tx.send(true);
        if let Some(task) = observability_task {
            match task.await {
                Ok(Err(e)) => tracing::error!(fehler = %e, "Observability-Server beendet mit Fehler"),
                Err(e) => tracing::error!(fehler = %e, "Observability-Task abgebrochen"),
                Ok(Ok(())) => {}
            }
        }
        let _ = health_task.await;
        laufzeit.beenden().await;
        Ok(())
    }
}

impl Laufzeit {
    /// Gibt den Service frei und wartet bis der Mail-Worker leer ist
    pub async fn beenden(self) {
        let Laufzeit {
            dienst, mail_worker, ..
        } = self;
        drop(dienst);
        if let Err(e) = mail_worker.await {
            tracing::warn!(fehler = %e, "Mail-Worker abgebrochen");
        }
    }
}

/// Prueft die Erreichbarkeit des Speichers in festem Abstand
pub fn health_pruefung_starten(
    provider: Arc<dyn Provider>,
    health: HealthState,
    intervall: std::time::Duration,
    mut stopp: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut takt = tokio::time::interval(intervall);
        loop {
            tokio::select! {
                _ = takt.tick() => {}
                _ = stopp.wait_for(|s| *s) => break,
            }
            let verbunden = match provider.pruefen().await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(fehler = %e, "Speicher nicht erreichbar");
                    false
                }
            };
            if verbunden != health.db_verbunden() {
                tracing::info!(verbunden, "Speicherstatus geaendert");
            }
            health.db_status_setzen(verbunden);
        }
    })
}
