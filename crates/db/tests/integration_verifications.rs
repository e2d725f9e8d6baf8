//! Integration-Tests fuer VerificationRepository

use std::sync::Arc;
use std::time::Duration;

use authwerk_core::types::{Paginierung, VerifizierungsZweck};
use authwerk_db::{models::NeueVerifizierung, Provider, SpeicherDb, SqliteDb};
use chrono::Utc;
use uuid::Uuid;

async fn backends() -> Vec<Arc<dyn Provider>> {
    vec![
        Arc::new(SqliteDb::in_memory().await.unwrap()),
        Arc::new(SpeicherDb::neu()),
    ]
}

fn anfrage(email: &str, zweck: VerifizierungsZweck, token: &str) -> NeueVerifizierung {
    NeueVerifizierung {
        id: None,
        token: token.into(),
        identifier: zweck,
        email: email.into(),
        expires_at: Utc::now() + chrono::Duration::minutes(30),
        nonce: Uuid::new_v4().to_string(),
        redirect_uri: Some("https://app.example.com".into()),
    }
}

#[tokio::test]
async fn anfrage_anlegen_und_per_token_laden() {
    for db in backends().await {
        let v = db
            .upsert_verification(anfrage("a@example.com", VerifizierungsZweck::BasicSignup, "tok-1"))
            .await
            .unwrap();

        let per_token = db.get_verification_by_token("tok-1").await.unwrap();
        assert_eq!(per_token, v, "Backend {}", db.backend());

        let per_id = db.get_verification(v.id).await.unwrap();
        assert_eq!(per_id.token, "tok-1");

        let per_email = db
            .get_verification_by_email("A@Example.com", VerifizierungsZweck::BasicSignup)
            .await
            .unwrap();
        assert_eq!(per_email.id, v.id);
    }
}

#[tokio::test]
async fn erneutes_anlegen_ersetzt_statt_anzuhaengen() {
    for db in backends().await {
        let erste = db
            .upsert_verification(anfrage("b@example.com", VerifizierungsZweck::BasicSignup, "alt"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let zweite = db
            .upsert_verification(anfrage("b@example.com", VerifizierungsZweck::BasicSignup, "neu"))
            .await
            .unwrap();

        assert_eq!(zweite.id, erste.id, "Backend {}", db.backend());
        assert_eq!(zweite.created_at, erste.created_at);
        assert_eq!(zweite.token, "neu");

        let seite = db.list_verifications(Paginierung::default()).await.unwrap();
        assert_eq!(seite.gesamt, 1);
        assert!(db
            .get_verification_by_token("alt")
            .await
            .unwrap_err()
            .ist_nicht_gefunden());
    }
}

#[tokio::test]
async fn verschiedene_zwecke_sind_getrennt() {
    for db in backends().await {
        db.upsert_verification(anfrage("c@example.com", VerifizierungsZweck::BasicSignup, "s"))
            .await
            .unwrap();
        db.upsert_verification(anfrage("c@example.com", VerifizierungsZweck::ForgotPassword, "f"))
            .await
            .unwrap();

        let seite = db.list_verifications(Paginierung::default()).await.unwrap();
        assert_eq!(seite.gesamt, 2);
        assert_eq!(
            db.get_verification_by_email("c@example.com", VerifizierungsZweck::ForgotPassword)
                .await
                .unwrap()
                .token,
            "f"
        );
    }
}

#[tokio::test]
async fn loeschen_verbraucht_genau_einmal() {
    for db in backends().await {
        let v = db
            .upsert_verification(anfrage("d@example.com", VerifizierungsZweck::BasicSignup, "t"))
            .await
            .unwrap();

        db.delete_verification(v.id).await.unwrap();
        assert!(db.delete_verification(v.id).await.unwrap_err().ist_nicht_gefunden());
        assert!(db.get_verification(v.id).await.unwrap_err().ist_nicht_gefunden());

        // nach dem Verbrauchen kann eine neue Anfrage angelegt werden
        db.upsert_verification(anfrage("d@example.com", VerifizierungsZweck::BasicSignup, "t2"))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn gleichzeitiges_loeschen_genau_ein_gewinner() {
    for db in backends().await {
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
                Err(e) => assert!(e.ist_nicht_gefunden()),
            }
        }
        assert_eq!(gewinner, 1, "Backend {}", db.backend());
    }
}

#[tokio::test]
async fn liste_paginiert_neueste_zuerst() {
    for db in backends().await {
        for i in 0..3 {
            db.upsert_verification(anfrage(
                &format!("u{i}@example.com"),
                VerifizierungsZweck::BasicSignup,
                &format!("t{i}"),
            ))
            .await
            .unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let seite = db.list_verifications(Paginierung::neu(2, 0)).await.unwrap();
        assert_eq!(seite.gesamt, 3);
        assert_eq!(seite.eintraege[0].email, "u2@example.com");
        assert_eq!(seite.eintraege[1].email, "u1@example.com");

        let jenseits = db
            .list_verifications(Paginierung {
                limit: 10,
                offset: u64::MAX,
            })
            .await
            .unwrap();
        assert!(jenseits.eintraege.is_empty(), "Backend {}", db.backend());
        assert_eq!(jenseits.gesamt, 3);
    }
}
