//! Zeilen-Typen fuer Cassandra und deren Abbildung auf die Modelle
//!
//! Zeitstempel werden als `bigint` Millisekunden gespeichert, IDs als Text.

use chrono::{DateTime, Utc};
use scylla::{DeserializeRow, SerializeRow};
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{BenutzerProfil, BenutzerRecord, EnvRecord, SessionRecord, VerifizierungRecord};
use crate::repository::DbResult;

pub(crate) fn millis(zeit: &DateTime<Utc>) -> i64 {
    zeit.timestamp_millis()
}

fn aus_millis(ms: i64) -> DbResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| DbError::intern(format!("Ungueltiger Zeitstempel {ms}")))
}

fn uuid(s: &str) -> DbResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DbError::intern(format!("Ungueltige UUID '{s}': {e}")))
}

#[derive(Debug, SerializeRow, DeserializeRow)]
pub(crate) struct BenutzerZeile {
    pub id: String,
    pub email: String,
    pub email_verified_at: Option<i64>,
    pub password: Option<String>,
    pub signup_methods: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub middle_name: Option<String>,
    pub nickname: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<String>,
    pub phone_number: Option<String>,
    pub phone_number_verified_at: Option<i64>,
    pub picture: Option<String>,
    pub roles: Option<String>,
    pub revoked_timestamp: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub(crate) const BENUTZER_SPALTEN: &str = "id, email, email_verified_at, password, \
     signup_methods, given_name, family_name, middle_name, nickname, gender, birthdate, \
     phone_number, phone_number_verified_at, picture, roles, revoked_timestamp, \
     created_at, updated_at";

impl From<&BenutzerRecord> for BenutzerZeile {
    fn from(b: &BenutzerRecord) -> Self {
        Self {
            id: b.id.to_string(),
            email: b.email.clone(),
            email_verified_at: b.email_verified_at.as_ref().map(millis),
            password: b.password.clone(),
            signup_methods: Some(b.signup_methods.clone()),
            given_name: b.profil.given_name.clone(),
            family_name: b.profil.family_name.clone(),
            middle_name: b.profil.middle_name.clone(),
            nickname: b.profil.nickname.clone(),
            gender: b.profil.gender.clone(),
            birthdate: b.profil.birthdate.clone(),
            phone_number: b.profil.phone_number.clone(),
            phone_number_verified_at: b.phone_number_verified_at.as_ref().map(millis),
            picture: b.profil.picture.clone(),
            roles: Some(b.roles.clone()),
            revoked_timestamp: b.revoked_timestamp.as_ref().map(millis),
            created_at: millis(&b.created_at),
            updated_at: millis(&b.updated_at),
        }
    }
}

impl TryFrom<BenutzerZeile> for BenutzerRecord {
    type Error = DbError;
    fn try_from(z: BenutzerZeile) -> DbResult<Self> {
        Ok(Self {
            id: uuid(&z.id)?,
            email: z.email,
            email_verified_at: z.email_verified_at.map(aus_millis).transpose()?,
            password: z.password,
            signup_methods: z.signup_methods.unwrap_or_default(),
            profil: BenutzerProfil {
                given_name: z.given_name,
                family_name: z.family_name,
                middle_name: z.middle_name,
                nickname: z.nickname,
                gender: z.gender,
                birthdate: z.birthdate,
                phone_number: z.phone_number,
                picture: z.picture,
            },
            phone_number_verified_at: z.phone_number_verified_at.map(aus_millis).transpose()?,
            roles: z.roles.unwrap_or_default(),
            revoked_timestamp: z.revoked_timestamp.map(aus_millis).transpose()?,
            created_at: aus_millis(z.created_at)?,
            updated_at: aus_millis(z.updated_at)?,
        })
    }
}

#[derive(Debug, SerializeRow, DeserializeRow)]
pub(crate) struct SessionZeile {
    pub id: String,
    pub user_id: String,
    pub user_agent: String,
    pub ip: String,
    pub created_at: i64,
    pub updated_at: i64,
}

pub(crate) const SESSION_SPALTEN: &str = "id, user_id, user_agent, ip, created_at, updated_at";

impl From<&SessionRecord> for SessionZeile {
    fn from(s: &SessionRecord) -> Self {
        Self {
            id: s.id.to_string(),
            user_id: s.user_id.to_string(),
            user_agent: s.user_agent.clone(),
            ip: s.ip.clone(),
            created_at: millis(&s.created_at),
            updated_at: millis(&s.updated_at),
        }
    }
}

impl TryFrom<SessionZeile> for SessionRecord {
    type Error = DbError;
    fn try_from(z: SessionZeile) -> DbResult<Self> {
        Ok(Self {
            id: uuid(&z.id)?,
            user_id: uuid(&z.user_id)?,
            user_agent: z.user_agent,
            ip: z.ip,
            created_at: aus_millis(z.created_at)?,
            updated_at: aus_millis(z.updated_at)?,
        })
    }
}

#[derive(Debug, SerializeRow, DeserializeRow)]
pub(crate) struct VerifizierungZeile {
    pub id: String,
    pub jwt_token: String,
    pub identifier: String,
    pub email: String,
    pub expires_at: i64,
    pub nonce: String,
    pub redirect_uri: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub(crate) const VERIFIZIERUNG_SPALTEN: &str = "id, jwt_token, identifier, email, expires_at, \
     nonce, redirect_uri, created_at, updated_at";

impl From<&VerifizierungRecord> for VerifizierungZeile {
    fn from(v: &VerifizierungRecord) -> Self {
        Self {
            id: v.id.to_string(),
            jwt_token: v.token.clone(),
            identifier: v.identifier.als_str().to_string(),
            email: v.email.clone(),
            expires_at: millis(&v.expires_at),
            nonce: v.nonce.clone(),
            redirect_uri: v.redirect_uri.clone(),
            created_at: millis(&v.created_at),
            updated_at: millis(&v.updated_at),
        }
    }
}

impl TryFrom<VerifizierungZeile> for VerifizierungRecord {
    type Error = DbError;
    fn try_from(z: VerifizierungZeile) -> DbResult<Self> {
        Ok(Self {
            id: uuid(&z.id)?,
            token: z.jwt_token,
            identifier: z.identifier.parse().map_err(DbError::UngueltigeDaten)?,
            email: z.email,
            expires_at: aus_millis(z.expires_at)?,
            nonce: z.nonce,
            redirect_uri: z.redirect_uri,
            created_at: aus_millis(z.created_at)?,
            updated_at: aus_millis(z.updated_at)?,
        })
    }
}

#[derive(Debug, SerializeRow, DeserializeRow)]
pub(crate) struct EnvZeile {
    pub id: String,
    pub env: String,
    pub hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

pub(crate) const ENV_SPALTEN: &str = "id, env, hash, created_at, updated_at";

impl From<&EnvRecord> for EnvZeile {
    fn from(e: &EnvRecord) -> Self {
        Self {
            id: e.id.to_string(),
            env: e.env.clone(),
            hash: e.hash.clone(),
            created_at: millis(&e.created_at),
            updated_at: millis(&e.updated_at),
        }
    }
}

impl TryFrom<EnvZeile> for EnvRecord {
    type Error = DbError;
    fn try_from(z: EnvZeile) -> DbResult<Self> {
        Ok(Self {
            id: uuid(&z.id)?,
            env: z.env,
            hash: z.hash,
            created_at: aus_millis(z.created_at)?,
            updated_at: aus_millis(z.updated_at)?,
        })
    }
}
