//! Saved route persistence operations.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use aeris_core::SavedRoute;

use super::{decode_ts, decode_ts_opt, encode_ts};

#[derive(sqlx::FromRow)]
struct SavedRouteRow {
    id: i64,
    user_id: i64,
    origin_lat: f64,
    origin_lon: f64,
    dest_lat: f64,
    dest_lon: f64,
    activity_type: Option<String>,
    last_upes_score: Option<f64>,
    last_upes_updated_at: Option<String>,
    created_at: String,
}

impl From<SavedRouteRow> for SavedRoute {
    fn from(row: SavedRouteRow) -> Self {
        SavedRoute {
            id: row.id,
            user_id: row.user_id,
            origin_lat: row.origin_lat,
            origin_lon: row.origin_lon,
            dest_lat: row.dest_lat,
            dest_lon: row.dest_lon,
            activity_type: row.activity_type,
            last_upes_score: row.last_upes_score,
            last_upes_updated_at: decode_ts_opt(row.last_upes_updated_at.as_deref()),
            created_at: decode_ts(&row.created_at),
        }
    }
}

const SELECT_FIELDS: &str = "id, user_id, origin_lat, origin_lon, dest_lat, dest_lon, \
                             activity_type, last_upes_score, last_upes_updated_at, created_at";

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &SqlitePool,
    user_id: i64,
    origin_lat: f64,
    origin_lon: f64,
    dest_lat: f64,
    dest_lon: f64,
    activity_type: Option<&str>,
) -> Result<SavedRoute> {
    let now = encode_ts(Utc::now());
    let done = sqlx::query(
        "INSERT INTO saved_routes \
         (user_id, origin_lat, origin_lon, dest_lat, dest_lon, activity_type, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(user_id)
    .bind(origin_lat)
    .bind(origin_lon)
    .bind(dest_lat)
    .bind(dest_lon)
    .bind(activity_type)
    .bind(&now)
    .execute(pool)
    .await?;

    let row = sqlx::query_as::<_, SavedRouteRow>(&format!(
        "SELECT {SELECT_FIELDS} FROM saved_routes WHERE id = ?1"
    ))
    .bind(done.last_insert_rowid())
    .fetch_one(pool)
    .await?;
    Ok(row.into())
}

pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<SavedRoute>> {
    let rows = sqlx::query_as::<_, SavedRouteRow>(&format!(
        "SELECT {SELECT_FIELDS} FROM saved_routes WHERE user_id = ?1 ORDER BY id"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(SavedRoute::from).collect())
}

/// Fetch one route scoped to its owner; other users' routes read as absent.
pub async fn get_for_user(pool: &SqlitePool, id: i64, user_id: i64) -> Result<Option<SavedRoute>> {
    let row = sqlx::query_as::<_, SavedRouteRow>(&format!(
        "SELECT {SELECT_FIELDS} FROM saved_routes WHERE id = ?1 AND user_id = ?2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(SavedRoute::from))
}

pub async fn delete_for_user(pool: &SqlitePool, id: i64, user_id: i64) -> Result<bool> {
    let done = sqlx::query("DELETE FROM saved_routes WHERE id = ?1 AND user_id = ?2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<SavedRoute>> {
    let rows = sqlx::query_as::<_, SavedRouteRow>(&format!(
        "SELECT {SELECT_FIELDS} FROM saved_routes ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(SavedRoute::from).collect())
}

/// Denormalize the latest exposure score onto the route row.
pub async fn update_exposure(
    pool: &SqlitePool,
    route_id: i64,
    score: f64,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE saved_routes SET last_upes_score = ?1, last_upes_updated_at = ?2 WHERE id = ?3",
    )
    .bind(score)
    .bind(encode_ts(at))
    .bind(route_id)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{init_database, users};

    #[tokio::test]
    async fn test_crud_scoped_to_owner() {
        let db = init_database("sqlite::memory:", 1).await.unwrap();
        let owner = users::create_user(db.pool(), "owner@example.com", "h")
            .await
            .unwrap()
            .unwrap();
        let other = users::create_user(db.pool(), "other@example.com", "h")
            .await
            .unwrap()
            .unwrap();

        let route = create(db.pool(), owner.id, 34.0, -118.2, 34.1, -118.1, Some("jogger"))
            .await
            .unwrap();
        assert_eq!(route.activity_type.as_deref(), Some("jogger"));

        // Opaque to other users.
        assert!(get_for_user(db.pool(), route.id, other.id).await.unwrap().is_none());
        assert!(!delete_for_user(db.pool(), route.id, other.id).await.unwrap());

        assert!(get_for_user(db.pool(), route.id, owner.id).await.unwrap().is_some());
        assert!(delete_for_user(db.pool(), route.id, owner.id).await.unwrap());
        assert!(list_for_user(db.pool(), owner.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_exposure_denormalization() {
        let db = init_database("sqlite::memory:", 1).await.unwrap();
        let owner = users::create_user(db.pool(), "o@example.com", "h")
            .await
            .unwrap()
            .unwrap();
        let route = create(db.pool(), owner.id, 34.0, -118.2, 34.1, -118.1, None)
            .await
            .unwrap();

        let now = Utc::now();
        update_exposure(db.pool(), route.id, 0.42, now).await.unwrap();
        let reloaded = get_for_user(db.pool(), route.id, owner.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.last_upes_score, Some(0.42));
        assert!(reloaded.last_upes_updated_at.is_some());
    }
}
