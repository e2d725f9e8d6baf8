//! Integration-Tests fuer EnvRepository und Provider-Start

use std::sync::Arc;

use authwerk_db::{
    models::NeuesEnv, provider_oeffnen, DatabaseBackend, DatabaseConfig, EnvRepository, Provider,
    SpeicherDb, SqliteDb,
};
use uuid::Uuid;

async fn backends() -> Vec<Arc<dyn Provider>> {
    vec![
        Arc::new(SqliteDb::in_memory().await.unwrap()),
        Arc::new(SpeicherDb::neu()),
    ]
}

#[tokio::test]
async fn env_anlegen_laden_aktualisieren() {
    for db in backends().await {
        assert!(db.get_env().await.unwrap_err().ist_nicht_gefunden());

        let env = db
            .create_env(NeuesEnv {
                id: None,
                env: "verschluesselt".into(),
                hash: "abc".into(),
            })
            .await
            .unwrap();
        assert_eq!(db.get_env().await.unwrap(), env, "Backend {}", db.backend());

        let neu = db
            .update_env(authwerk_db::models::EnvRecord {
                env: "neu".into(),
                ..env.clone()
            })
            .await
            .unwrap();
        assert_eq!(neu.env, "neu");
        assert_eq!(db.get_env().await.unwrap().env, "neu");
    }
}

#[tokio::test]
async fn unbekanntes_env_aktualisieren_schlaegt_fehl() {
    for db in backends().await {
        let fehler = db
            .update_env(authwerk_db::models::EnvRecord {
                id: Uuid::new_v4(),
                env: "x".into(),
                hash: "y".into(),
                created_at: authwerk_db::models::jetzt(),
                updated_at: authwerk_db::models::jetzt(),
            })
            .await
            .unwrap_err();
        assert!(fehler.ist_nicht_gefunden());
    }
}

#[tokio::test]
async fn sqlite_datei_start_ist_idempotent() {
    let dir = std::env::temp_dir().join(format!("authwerk-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.join("auth.db").display()),
        ..Default::default()
    };

    let erster = provider_oeffnen(&config).await.unwrap();
    erster
        .create_user(authwerk_db::models::NeuerBenutzer {
            email: "bleibt@example.com".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    drop(erster);

    // zweiter Start gegen bestehendes Schema: keine Fehler, Daten bleiben
    let zweiter = provider_oeffnen(&config).await.unwrap();
    assert_eq!(zweiter.backend(), DatabaseBackend::Sqlite);
    assert!(zweiter.get_user_by_email("bleibt@example.com").await.is_ok());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn speicher_sammlungen_sicherstellen_ist_idempotent() {
    let db = SpeicherDb::neu();
    db.create_env(NeuesEnv {
        id: None,
        env: "e".into(),
        hash: "h".into(),
    })
    .await
    .unwrap();

    db.sammlungen_sicherstellen();
    assert!(db.get_env().await.is_ok());
}
