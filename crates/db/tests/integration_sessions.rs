//! Integration-Tests fuer SessionRepository

use std::sync::Arc;
use std::time::Duration;

use authwerk_db::{
    models::{NeueSession, NeuerBenutzer},
    Provider, SpeicherDb, SqliteDb,
};
use uuid::Uuid;

async fn backends() -> Vec<Arc<dyn Provider>> {
    vec![
        Arc::new(SqliteDb::in_memory().await.unwrap()),
        Arc::new(SpeicherDb::neu()),
    ]
}

async fn benutzer_anlegen(db: &dyn Provider, email: &str) -> Uuid {
    db.create_user(NeuerBenutzer {
        email: email.into(),
        roles: "user".into(),
        ..Default::default()
    })
    .await
    .unwrap()
    .id
}

fn session(user_id: Uuid, agent: &str) -> NeueSession {
    NeueSession {
        id: None,
        user_id,
        user_agent: agent.into(),
        ip: "10.0.0.1".into(),
    }
}

#[tokio::test]
async fn session_erstellen_und_laden() {
    for db in backends().await {
        let user_id = benutzer_anlegen(db.as_ref(), "a@example.com").await;
        let s = db.create_session(session(user_id, "Firefox")).await.unwrap();

        let geladen = db.get_session(s.id).await.unwrap();
        assert_eq!(geladen, s, "Backend {}", db.backend());
        assert_eq!(geladen.user_agent, "Firefox");
    }
}

#[tokio::test]
async fn session_fuer_unbekannten_benutzer_schlaegt_fehl() {
    for db in backends().await {
        let fehler = db
            .create_session(session(Uuid::new_v4(), "curl"))
            .await
            .unwrap_err();
        assert!(fehler.ist_nicht_gefunden(), "Backend {}: {fehler}", db.backend());
    }
}

#[tokio::test]
async fn sessions_pro_benutzer_auflisten() {
    for db in backends().await {
        let a = benutzer_anlegen(db.as_ref(), "a@example.com").await;
        let b = benutzer_anlegen(db.as_ref(), "b@example.com").await;

        db.create_session(session(a, "eins")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        db.create_session(session(a, "zwei")).await.unwrap();
        db.create_session(session(b, "fremd")).await.unwrap();

        let liste = db.list_sessions_for_user(a).await.unwrap();
        assert_eq!(liste.len(), 2);
        assert_eq!(liste[0].user_agent, "zwei");
        assert_eq!(liste[1].user_agent, "eins");
    }
}

#[tokio::test]
async fn session_auffrischen() {
    for db in backends().await {
        let user_id = benutzer_anlegen(db.as_ref(), "a@example.com").await;
        let s = db.create_session(session(user_id, "x")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let frisch = db.touch_session(s.id).await.unwrap();
        assert!(frisch.updated_at > s.updated_at);
        assert_eq!(frisch.created_at, s.created_at);

        assert!(db
            .touch_session(Uuid::new_v4())
            .await
            .unwrap_err()
            .ist_nicht_gefunden());
    }
}

#[tokio::test]
async fn sessions_loeschen_ist_idempotent() {
    for db in backends().await {
        let user_id = benutzer_anlegen(db.as_ref(), "a@example.com").await;
        db.create_session(session(user_id, "x")).await.unwrap();
        db.create_session(session(user_id, "y")).await.unwrap();

        assert_eq!(db.delete_sessions_for_user(user_id).await.unwrap(), 2);
        assert_eq!(db.delete_sessions_for_user(user_id).await.unwrap(), 0);
        assert_eq!(db.delete_sessions_for_user(Uuid::new_v4()).await.unwrap(), 0);
        assert!(db.list_sessions_for_user(user_id).await.unwrap().is_empty());
    }
}
