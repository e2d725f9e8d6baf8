//! Prometheus-kompatible Metriken fuer Authwerk
//!
//! Registrierte Metriken:
//! - `authwerk_signups_total` – Counter: Registrierungen (ergebnis)
//! - `authwerk_logins_total` – Counter: Anmeldungen (ergebnis)
//! - `authwerk_verifications_total` – Counter: Einloesungen von Verifizierungsanfragen (zweck, ergebnis)
//! - `authwerk_mail_failures_total` – Counter: Fehlgeschlagene oder verworfene Mails
//! - `authwerk_sessions_active` – Gauge: Aktive Token-Sessions
//! - `authwerk_storage_duration_seconds` – Histogram: Dauer der Speicherzugriffe (operation)

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Alle Authwerk-Prometheus-Metriken
#[derive(Clone)]
pub struct AuthwerkMetrics {
    pub registry: Arc<Registry>,

    // Lebenszyklus
    pub signups_total: IntCounterVec,
    pub logins_total: IntCounterVec,
    pub verifications_total: IntCounterVec,
    pub mail_failures_total: IntCounter,
    pub sessions_active: IntGauge,

    // Speicher
    pub storage_duration_seconds: HistogramVec,
}

impl AuthwerkMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let signups_total = IntCounterVec::new(
            Opts::new("authwerk_signups_total", "Registrierungen nach Ergebnis"),
            &["ergebnis"],
        )?;
        registry.register(Box::new(signups_total.clone()))?;

        let logins_total = IntCounterVec::new(
            Opts::new("authwerk_logins_total", "Anmeldungen nach Ergebnis"),
            &["ergebnis"],
        )?;
        registry.register(Box::new(logins_total.clone()))?;

        let verifications_total = IntCounterVec::new(
            Opts::new(
                "authwerk_verifications_total",
                "Eingeloeste Verifizierungsanfragen nach Zweck und Ergebnis",
            ),
            &["zweck", "ergebnis"],
        )?;
        registry.register(Box::new(verifications_total.clone()))?;

        let mail_failures_total = IntCounter::with_opts(Opts::new(
            "authwerk_mail_failures_total",
            "Fehlgeschlagene oder verworfene Mails",
        ))?;
        registry.register(Box::new(mail_failures_total.clone()))?;

        let sessions_active = IntGauge::with_opts(Opts::new(
            "authwerk_sessions_active",
            "Aktive Token-Sessions",
        ))?;
        registry.register(Box::new(sessions_active.clone()))?;

        let storage_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "authwerk_storage_duration_seconds",
                "Dauer der Speicherzugriffe in Sekunden",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
            &["operation"],
        )?;
        registry.register(Box::new(storage_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            signups_total,
            logins_total,
            verifications_total,
            mail_failures_total,
            sessions_active,
            storage_duration_seconds,
        })
    }

    pub fn signup_zaehlen(&self, ergebnis: &str) {
        self.signups_total.with_label_values(&[ergebnis]).inc();
    }

    pub fn login_zaehlen(&self, ergebnis: &str) {
        self.logins_total.with_label_values(&[ergebnis]).inc();
    }

    pub fn verifizierung_zaehlen(&self, zweck: &str, ergebnis: &str) {
        self.verifications_total
            .with_label_values(&[zweck, ergebnis])
            .inc();
    }

    pub fn speicherzugriff_beobachten(&self, operation: &str, sekunden: f64) {
        self.storage_duration_seconds
            .with_label_values(&[operation])
            .observe(sekunden);
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: AuthwerkMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<AuthwerkMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
