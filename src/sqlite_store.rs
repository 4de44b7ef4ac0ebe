//! SQLite-backed [`FavoriteStore`] implementation.
//!
//! Favorites live in the `favorites` table created by [`crate::migrate`].
//! Rows are unique per `(server_id, url)`; the autoincrement id doubles as
//! the insertion order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use cmis_explorer_core::error::StoreError;
use cmis_explorer_core::models::{Favorite, NewFavorite};
use cmis_explorer_core::store::FavoriteStore;

/// SQLite implementation of the [`FavoriteStore`] trait.
pub struct SqliteFavoriteStore {
    pool: SqlitePool,
}

impl SqliteFavoriteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn storage_failure(e: sqlx::Error) -> StoreError {
    StoreError::StorageFailure(e.to_string())
}

fn row_to_favorite(row: &SqliteRow) -> Result<Favorite, StoreError> {
    let created_at: i64 = row.try_get("created_at").map_err(storage_failure)?;
    Ok(Favorite {
        id: row.try_get("id").map_err(storage_failure)?,
        server_id: row.try_get("server_id").map_err(storage_failure)?,
        url: row.try_get("url").map_err(storage_failure)?,
        display_name: row.try_get("display_name").map_err(storage_failure)?,
        mimetype: row.try_get("mimetype").map_err(storage_failure)?,
        created_at: DateTime::<Utc>::from_timestamp(created_at, 0).unwrap_or_default(),
    })
}

#[async_trait]
impl FavoriteStore for SqliteFavoriteStore {
    async fn add(&self, favorite: &NewFavorite) -> Result<Favorite, StoreError> {
        let mut tx = self.pool.begin().await.map_err(storage_failure)?;

        let row = sqlx::query(
            r#"
            INSERT INTO favorites (server_id, url, display_name, mimetype, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(server_id, url) DO UPDATE SET
                display_name = excluded.display_name,
                mimetype = excluded.mimetype
            RETURNING id, server_id, url, display_name, mimetype, created_at
            "#,
        )
        .bind(&favorite.server_id)
        .bind(&favorite.url)
        .bind(&favorite.display_name)
        .bind(&favorite.mimetype)
        .bind(Utc::now().timestamp())
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_failure)?;

        let stored = row_to_favorite(&row)?;
        tx.commit().await.map_err(storage_failure)?;
        Ok(stored)
    }

    async fn find_all(&self, server_id: &str) -> Result<Vec<Favorite>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, server_id, url, display_name, mimetype, created_at
             FROM favorites WHERE server_id = ? ORDER BY id ASC",
        )
        .bind(server_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_failure)?;

        rows.iter().map(row_to_favorite).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<Favorite>, StoreError> {
        let row = sqlx::query(
            "SELECT id, server_id, url, display_name, mimetype, created_at
             FROM favorites WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_failure)?;

        row.as_ref().map(row_to_favorite).transpose()
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM favorites WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_failure)?;
        Ok(result.rows_affected() > 0)
    }
}
