//! Integration-Tests gegen einen echten Cassandra/ScyllaDB-Knoten
//!
//! Laufen nur mit Feature `cassandra` und gesetztem `AW_CASSANDRA_URL`
//! (z.B. `127.0.0.1:9042`). Jeder Test arbeitet in einem eigenen Keyspace.

#![cfg(feature = "cassandra")]

use std::sync::Arc;
use std::time::Duration;

use authwerk_core::types::{Paginierung, VerifizierungsZweck};
use authwerk_db::{
    models::{jetzt, BenutzerRecord, NeueSession, NeueVerifizierung, NeuerBenutzer, NeuesEnv},
    provider_oeffnen, DatabaseBackend, DatabaseConfig, Provider,
};
use chrono::Utc;
use uuid::Uuid;

const ENV_URL: &str = "AW_CASSANDRA_URL";

fn config(keyspace: &str) -> Option<DatabaseConfig> {
    let url = match std::env::var(ENV_URL) {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            eprintln!("{ENV_URL} nicht gesetzt, Cassandra-Test uebersprungen");
            return None;
        }
    };
    Some(DatabaseConfig {
        backend: DatabaseBackend::Cassandra,
        url,
        name: keyspace.into(),
        replikationsfaktor: 1,
        ..Default::default()
    })
}

fn keyspace() -> String {
    format!("aw_test_{}", Uuid::new_v4().simple())
}

async fn oeffnen() -> Option<Arc<dyn Provider>> {
    let cfg = config(&keyspace())?;
    Some(provider_oeffnen(&cfg).await.expect("Cassandra nicht erreichbar"))
}

fn benutzer(email: &str) -> NeuerBenutzer {
    NeuerBenutzer {
        email: email.into(),
        password: Some("hash".into()),
        signup_methods: "basic_auth".into(),
        roles: "user".into(),
        ..Default::default()
    }
}

fn anfrage(email: &str, zweck: VerifizierungsZweck, token: &str) -> NeueVerifizierung {
    NeueVerifizierung {
        id: None,
        token: token.into(),
        identifier: zweck,
        email: email.into(),
        expires_at: Utc::now() + chrono::Duration::minutes(30),
        nonce: Uuid::new_v4().to_string(),
        redirect_uri: None,
    }
}

#[tokio::test]
async fn benutzer_lebenszyklus() {
    let Some(db) = oeffnen().await else { return };
    assert_eq!(db.backend(), DatabaseBackend::Cassandra);
    db.pruefen().await.unwrap();

    let user = db.create_user(benutzer(" Carla@Example.com")).await.unwrap();
    assert_eq!(user.email, "carla@example.com");
    assert_eq!(db.get_user(user.id).await.unwrap().id, user.id);
    assert_eq!(
        db.get_user_by_email("CARLA@example.com").await.unwrap().id,
        user.id
    );

    let umbenannt = db
        .update_user(BenutzerRecord {
            email: "carla.neu@example.com".into(),
            ..user.clone()
        })
        .await
        .unwrap();
    assert_eq!(umbenannt.created_at, user.created_at);
    // alte Adresse ist wieder frei
    db.create_user(benutzer("carla@example.com")).await.unwrap();

    db.create_session(NeueSession {
        id: None,
        user_id: user.id,
        user_agent: "test".into(),
        ip: "127.0.0.1".into(),
    })
    .await
    .unwrap();
    db.delete_user(user.id).await.unwrap();
    assert!(db.get_user(user.id).await.unwrap_err().ist_nicht_gefunden());
    assert!(db.list_sessions_for_user(user.id).await.unwrap().is_empty());
    assert!(db.delete_user(user.id).await.unwrap_err().ist_nicht_gefunden());
    db.create_user(benutzer("carla.neu@example.com")).await.unwrap();
}

#[tokio::test]
async fn doppelte_email_ist_konflikt() {
    let Some(db) = oeffnen().await else { return };
    let erster = db.create_user(benutzer("dora@example.com")).await.unwrap();
    let zweiter = db.create_user(benutzer("otto@example.com")).await.unwrap();

    assert!(db
        .create_user(benutzer("DORA@example.com"))
        .await
        .unwrap_err()
        .ist_eindeutigkeit());
    assert!(db
        .update_user(BenutzerRecord {
            email: erster.email.clone(),
            ..zweiter
        })
        .await
        .unwrap_err()
        .ist_eindeutigkeit());
}

#[tokio::test]
async fn gleichzeitige_registrierung_genau_einer_gewinnt() {
    let Some(db) = oeffnen().await else { return };
    let mut handles = Vec::new();
    for _ in 0..8 {
        let db = Arc::clone(&db);
        handles.push(tokio::spawn(async move {
            db.create_user(benutzer("race@example.com")).await
        }));
    }

    let mut erfolge = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => erfolge += 1,
            Err(e) => assert!(e.ist_eindeutigkeit(), "unerwarteter Fehler: {e}"),
        }
    }
    assert_eq!(erfolge, 1);
    assert_eq!(db.list_users(Paginierung::default()).await.unwrap().gesamt, 1);
}

#[tokio::test]
async fn verifizierung_bleibt_bei_aktualisierung_erhalten() {
    let Some(db) = oeffnen().await else { return };
    let user = db
        .create_user(NeuerBenutzer {
            email_verified_at: Some(jetzt()),
            ..benutzer("vera@example.com")
        })
        .await
        .unwrap();

    db.update_user(BenutzerRecord {
        email_verified_at: None,
        ..user.clone()
    })
    .await
    .unwrap();
    assert_eq!(
        db.get_user(user.id).await.unwrap().email_verified_at,
        user.email_verified_at
    );
}

#[tokio::test]
async fn offset_jenseits_des_bestands() {
    let Some(db) = oeffnen().await else { return };
    db.create_user(benutzer("ida@example.com")).await.unwrap();
    db.create_user(benutzer("jan@example.com")).await.unwrap();

    let seite = db
        .list_users(Paginierung {
            limit: 10,
            offset: u64::MAX,
        })
        .await
        .unwrap();
    assert!(seite.eintraege.is_empty());
    assert_eq!(seite.gesamt, 2);
}

#[tokio::test]
async fn verifizierung_upsert_ersetzt() {
    let Some(db) = oeffnen().await else { return };
    let erste = db
        .upsert_verification(anfrage("b@example.com", VerifizierungsZweck::BasicSignup, "alt"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let zweite = db
        .upsert_verification(anfrage("B@example.com", VerifizierungsZweck::BasicSignup, "neu"))
        .await
        .unwrap();

    assert_eq!(zweite.id, erste.id);
    assert_eq!(zweite.token, "neu");
    assert!(db
        .get_verification_by_token("alt")
        .await
        .unwrap_err()
        .ist_nicht_gefunden());

    db.upsert_verification(anfrage("b@example.com", VerifizierungsZweck::ForgotPassword, "f"))
        .await
        .unwrap();
    assert_eq!(db.list_verifications(Paginierung::default()).await.unwrap().gesamt, 2);
}

#[tokio::test]
async fn gleichzeitiges_einloesen_genau_ein_gewinner() {
    let Some(db) = oeffnen().await else { return };
    let v = db
        .upsert_verification(anfrage("e@example.com", VerifizierungsZweck::BasicSignup, "t"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let db = Arc::clone(&db);
        handles.push(tokio::spawn(async move { db.delete_verification(v.id).await }));
    }

    let mut gewinner = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(()) => gewinner += 1,
            Err(e) => assert!(e.ist_nicht_gefunden(), "unerwarteter Fehler: {e}"),
        }
    }
    assert_eq!(gewinner, 1);
    // nach dem Einloesen ist der Schluessel wieder frei
    db.upsert_verification(anfrage("e@example.com", VerifizierungsZweck::BasicSignup, "t2"))
        .await
        .unwrap();
}

#[tokio::test]
async fn provisionierung_zweimal_ist_idempotent() {
    let ks = keyspace();
    let Some(cfg) = config(&ks) else { return };

    let erster = provider_oeffnen(&cfg).await.unwrap();
    let user = erster.create_user(benutzer("paul@example.com")).await.unwrap();
    erster
        .create_env(NeuesEnv {
            id: None,
            env: "{}".into(),
            hash: "h1".into(),
        })
        .await
        .unwrap();

    let zweiter = provider_oeffnen(&cfg).await.unwrap();
    assert_eq!(zweiter.get_user(user.id).await.unwrap().email, "paul@example.com");
    assert_eq!(zweiter.get_env().await.unwrap().hash, "h1");
    assert!(zweiter
        .create_user(benutzer("paul@example.com"))
        .await
        .unwrap_err()
        .ist_eindeutigkeit());
}
