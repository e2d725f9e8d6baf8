//! # authwerk-observability
//!
//! Observability-Crate fuer Authwerk:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging via tracing-subscriber (Text oder JSON)

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::{health_router, HealthResponse, HealthState, HealthStatus};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, AuthwerkMetrics};

use anyhow::Result;
use std::future::Future;
use std::net::SocketAddr;

/// Router mit allen Observability-Endpunkten
pub fn observability_router(metriken: AuthwerkMetrics, health: HealthState) -> axum::Router {
    axum::Router::new()
        .merge(metrics_router(metriken))
        .merge(health_router(health))
}

/// Startet den Observability-HTTP-Server (Metriken + Health)
///
/// Endpunkte:
/// - `GET /metrics` – Prometheus scrape format
/// - `GET /health`  – Health-Check JSON
///
/// Laeuft bis `herunterfahren` abgeschlossen ist.
pub async fn observability_server_starten(
    bind_addr: SocketAddr,
    metriken: AuthwerkMetrics,
    health: HealthState,
    herunterfahren: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = observability_router(metriken, health);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Observability-Server gestartet");

    axum::serve(listener, app)
        .with_graceful_shutdown(herunterfahren)
        .await?;
    Ok(())
}
