//! Integration-Tests fuer den Server-Aufbau

use std::sync::Arc;
use std::time::Duration;

use authwerk_auth::{AnfrageKontext, AnmeldeEingabe, RegistrierungsEingabe};
use authwerk_db::{DatabaseBackend, SpeicherDb};
use authwerk_observability::HealthState;
use authwerk_server::{config::ServerConfig, health_pruefung_starten, Server};

fn speicher_config() -> ServerConfig {
    let mut cfg = ServerConfig::default();
    cfg.datenbank.typ = "speicher".into();
    cfg.datenbank.fluechtig_erlaubt = true;
    cfg.auth.email_verifizierung_deaktiviert = true;
    cfg.observability.aktiviert = false;
    cfg
}

#[tokio::test]
async fn aufbau_mit_fluechtigem_speicher() {
    let mut server = Server::neu(speicher_config());
    let laufzeit = server.aufbauen().await.unwrap();

    assert_eq!(laufzeit.provider.backend(), DatabaseBackend::Speicher);
    assert!(laufzeit.health.db_verbunden());
    // ohne konfiguriertes Geheimnis wurde ein ephemeres erzeugt
    assert!(!server.config.auth.jwt_geheimnis.is_empty());

    let kontext = AnfrageKontext::neu("curl/8", "127.0.0.1");
    let antwort = laufzeit
        .dienst
        .registrieren(
            RegistrierungsEingabe {
                email: "start@example.com".into(),
                password: "pw".into(),
                confirm_password: "pw".into(),
                ..Default::default()
            },
            &kontext,
        )
        .await
        .unwrap();
    assert!(antwort.access_token.is_some());

    laufzeit
        .dienst
        .anmelden(
            AnmeldeEingabe {
                email: "start@example.com".into(),
                password: "pw".into(),
                roles: None,
            },
            &kontext,
        )
        .await
        .unwrap();

    let export = laufzeit.metriken.exportieren().unwrap();
    assert!(export.contains("authwerk_signups_total"));
    assert!(export.contains("authwerk_logins_total"));

    laufzeit.beenden().await;
}

#[tokio::test]
async fn aufbau_mit_sqlite_in_memory() {
    let mut cfg = speicher_config();
    cfg.datenbank.typ = "sqlite".into();
    cfg.datenbank.url = "sqlite::memory:".into();
    cfg.datenbank.sqlite_wal = false;
    cfg.datenbank.max_verbindungen = 1;
    cfg.auth.jwt_geheimnis = "fest".into();

    let mut server = Server::neu(cfg);
    let laufzeit = server.aufbauen().await.unwrap();
    assert_eq!(laufzeit.provider.backend(), DatabaseBackend::Sqlite);
    assert_eq!(server.config.auth.jwt_geheimnis, "fest");
    laufzeit.beenden().await;
}

#[tokio::test]
async fn ungueltige_auth_konfiguration_bricht_start_ab() {
    let mut cfg = speicher_config();
    cfg.auth.standard_rollen = vec!["gast".into()];
    assert!(Server::neu(cfg).aufbauen().await.is_err());
}

#[tokio::test]
async fn fluechtiger_speicher_ohne_freigabe_bricht_start_ab() {
    let mut cfg = speicher_config();
    cfg.datenbank.fluechtig_erlaubt = false;
    let fehler = match Server::neu(cfg).aufbauen().await {
        Ok(_) => panic!("fluechtiger Speicher ohne Freigabe gestartet"),
        Err(e) => e,
    };
    assert!(fehler.to_string().contains("fluechtig"));
}

#[tokio::test]
async fn unbekanntes_backend_bricht_start_ab() {
    let mut cfg = speicher_config();
    cfg.datenbank.typ = "mongodb".into();
    assert!(Server::neu(cfg).aufbauen().await.is_err());
}

#[tokio::test]
async fn health_pruefung_endet_mit_stopp_signal() {
    let health = HealthState::neu();
    health.db_status_setzen(false);
    let (stopp_tx, stopp_rx) = tokio::sync::watch::channel(false);
    let handle = health_pruefung_starten(
        Arc::new(SpeicherDb::neu()),
        health.clone(),
        Duration::from_millis(10),
        stopp_rx,
    );

    for _ in 0..100 {
        if health.db_verbunden() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(health.db_verbunden());

    stopp_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("Health-Task endet")
        .unwrap();
}
