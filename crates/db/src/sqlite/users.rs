//! SQLite-Implementierung des UserRepository

use async_trait::async_trait;
use sqlx::Row as _;
use uuid::Uuid;

use authwerk_core::types::{Paginierung, Seite};

use crate::error::DbError;
use crate::models::{
    email_normalisieren, jetzt, BenutzerProfil, BenutzerRecord, NeuerBenutzer,
};
use crate::repository::{DbResult, UserRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::zeilen::{
    eindeutigkeit_abbilden, opt_zeit_spalte, opt_zeit_text, uuid_spalte, zeit_spalte, zeit_text,
};

const SPALTEN: &str = "id, email, email_verified_at, password, signup_methods, given_name, \
     family_name, middle_name, nickname, gender, birthdate, phone_number, \
     phone_number_verified_at, picture, roles, revoked_timestamp, created_at, updated_at";

#[async_trait]
impl UserRepository for SqliteDb {
    async fn create_user(&self, data: NeuerBenutzer) -> DbResult<BenutzerRecord> {
        let record = data.in_record(jetzt());

        sqlx::query(&format!(
            "INSERT INTO users ({SPALTEN}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(record.id.to_string())
        .bind(&record.email)
        .bind(opt_zeit_text(&record.email_verified_at))
        .bind(&record.password)
        .bind(&record.signup_methods)
        .bind(&record.profil.given_name)
        .bind(&record.profil.family_name)
        .bind(&record.profil.middle_name)
        .bind(&record.profil.nickname)
        .bind(&record.profil.gender)
        .bind(&record.profil.birthdate)
        .bind(&record.profil.phone_number)
        .bind(opt_zeit_text(&record.phone_number_verified_at))
        .bind(&record.profil.picture)
        .bind(&record.roles)
        .bind(opt_zeit_text(&record.revoked_timestamp))
        .bind(zeit_text(&record.created_at))
        .bind(zeit_text(&record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            eindeutigkeit_abbilden(e, || format!("E-Mail '{}' bereits registriert", record.email))
        })?;

        Ok(record)
    }

    async fn get_user(&self, id: Uuid) -> DbResult<BenutzerRecord> {
        let row = sqlx::query(&format!("SELECT {SPALTEN} FROM users WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::nicht_gefunden(format!("User {id}")))?;

        row_to_benutzer(&row)
    }

    async fn get_user_by_email(&self, email: &str) -> DbResult<BenutzerRecord> {
        let email = email_normalisieren(email);
        let row = sqlx::query(&format!("SELECT {SPALTEN} FROM users WHERE email = ?"))
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::nicht_gefunden(format!("User mit E-Mail '{email}'")))?;

        row_to_benutzer(&row)
    }

    async fn list_users(&self, paginierung: Paginierung) -> DbResult<Seite<BenutzerRecord>> {
        let paginierung = paginierung.begrenzt();

        let gesamt: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {SPALTEN} FROM users ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        ))
        .bind(paginierung.limit as i64)
        .bind(paginierung.offset_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(Seite {
            eintraege: rows.iter().map(row_to_benutzer).collect::<DbResult<_>>()?,
            gesamt: gesamt as u64,
            paginierung,
        })
    }

    async fn update_user(&self, benutzer: BenutzerRecord) -> DbResult<BenutzerRecord> {
        let email = email_normalisieren(&benutzer.email);
        let affected = sqlx::query(
            // email_verified_at geht nur von NULL auf gesetzt, nie zurueck
            "UPDATE users SET email = ?, email_verified_at = COALESCE(?, email_verified_at),
                 password = ?, signup_methods = ?,
                 given_name = ?, family_name = ?, middle_name = ?, nickname = ?, gender = ?,
                 birthdate = ?, phone_number = ?, phone_number_verified_at = ?, picture = ?,
                 roles = ?, revoked_timestamp = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&email)
        .bind(opt_zeit_text(&benutzer.email_verified_at))
        .bind(&benutzer.password)
        .bind(&benutzer.signup_methods)
        .bind(&benutzer.profil.given_name)
        .bind(&benutzer.profil.family_name)
        .bind(&benutzer.profil.middle_name)
        .bind(&benutzer.profil.nickname)
        .bind(&benutzer.profil.gender)
        .bind(&benutzer.profil.birthdate)
        .bind(&benutzer.profil.phone_number)
        .bind(opt_zeit_text(&benutzer.phone_number_verified_at))
        .bind(&benutzer.profil.picture)
        .bind(&benutzer.roles)
        .bind(opt_zeit_text(&benutzer.revoked_timestamp))
        .bind(zeit_text(&jetzt()))
        .bind(benutzer.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| eindeutigkeit_abbilden(e, || format!("E-Mail '{email}' bereits registriert")))?
        .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("User {}", benutzer.id)));
        }

        self.get_user(benutzer.id).await
    }

    async fn delete_user(&self, id: Uuid) -> DbResult<()> {
        // Sessions werden per ON DELETE CASCADE mitgeloescht
        let affected = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("User {id}")));
        }
        Ok(())
    }
}

fn row_to_benutzer(row: &sqlx::sqlite::SqliteRow) -> DbResult<BenutzerRecord> {
    Ok(BenutzerRecord {
        id: uuid_spalte(row, "id")?,
        email: row.try_get("email")?,
        email_verified_at: opt_zeit_spalte(row, "email_verified_at")?,
        password: row.try_get("password")?,
        signup_methods: row.try_get("signup_methods")?,
        profil: BenutzerProfil {
            given_name: row.try_get("given_name")?,
            family_name: row.try_get("family_name")?,
            middle_name: row.try_get("middle_name")?,
            nickname: row.try_get("nickname")?,
            gender: row.try_get("gender")?,
            birthdate: row.try_get("birthdate")?,
            phone_number: row.try_get("phone_number")?,
            picture: row.try_get("picture")?,
        },
        phone_number_verified_at: opt_zeit_spalte(row, "phone_number_verified_at")?,
        roles: row.try_get("roles")?,
        revoked_timestamp: opt_zeit_spalte(row, "revoked_timestamp")?,
        created_at: zeit_spalte(row, "created_at")?,
        updated_at: zeit_spalte(row, "updated_at")?,
    })
}
