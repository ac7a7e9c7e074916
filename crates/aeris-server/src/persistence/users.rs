//! User persistence operations.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use aeris_core::User;

use super::{decode_ts, encode_ts};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
    notification_preferences: Option<String>,
    exposure_sensitivity_level: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            notification_preferences: row
                .notification_preferences
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok()),
            exposure_sensitivity_level: row.exposure_sensitivity_level,
            created_at: decode_ts(&row.created_at),
            updated_at: decode_ts(&row.updated_at),
        }
    }
}

const SELECT_FIELDS: &str = "id, email, password_hash, notification_preferences, \
                             exposure_sensitivity_level, created_at, updated_at";

/// Insert a new user. Returns `None` when the email is already taken.
pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    password_hash: &str,
) -> Result<Option<User>> {
    let now = encode_ts(Utc::now());
    let result = sqlx::query(
        "INSERT INTO users (email, password_hash, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?3)",
    )
    .bind(email)
    .bind(password_hash)
    .bind(&now)
    .execute(pool)
    .await;

    match result {
        Ok(done) => {
            let id = done.last_insert_rowid();
            Ok(find_by_id(pool, id).await?)
        }
        Err(error) => {
            if error.to_string().contains("UNIQUE") {
                return Ok(None);
            }
            Err(error.into())
        }
    }
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {SELECT_FIELDS} FROM users WHERE email = ?1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(User::from))
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {SELECT_FIELDS} FROM users WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(User::from))
}

/// Patch notification preferences and/or sensitivity level; `None` fields
/// are left unchanged.
pub async fn update_profile(
    pool: &SqlitePool,
    id: i64,
    notification_preferences: Option<&serde_json::Value>,
    exposure_sensitivity_level: Option<i64>,
) -> Result<Option<User>> {
    let now = encode_ts(Utc::now());
    if let Some(prefs) = notification_preferences {
        sqlx::query("UPDATE users SET notification_preferences = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(serde_json::to_string(prefs)?)
            .bind(&now)
            .bind(id)
            .execute(pool)
            .await?;
    }
    if let Some(level) = exposure_sensitivity_level {
        sqlx::query("UPDATE users SET exposure_sensitivity_level = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(level)
            .bind(&now)
            .bind(id)
            .execute(pool)
            .await?;
    }
    find_by_id(pool, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;

    #[tokio::test]
    async fn test_create_and_duplicate_email() {
        let db = init_database("sqlite::memory:", 1).await.unwrap();
        let user = create_user(db.pool(), "a@example.com", "hash")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.email, "a@example.com");

        let duplicate = create_user(db.pool(), "a@example.com", "hash2").await.unwrap();
        assert!(duplicate.is_none());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let db = init_database("sqlite::memory:", 1).await.unwrap();
        let user = create_user(db.pool(), "b@example.com", "hash")
            .await
            .unwrap()
            .unwrap();

        let prefs = serde_json::json!({"email": true, "push": false, "in_app": true});
        let updated = update_profile(db.pool(), user.id, Some(&prefs), Some(4))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.exposure_sensitivity_level, Some(4));
        assert_eq!(updated.notification_preferences.unwrap()["email"], true);
    }
}
