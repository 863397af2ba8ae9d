use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{debug, info};

use model::Watch;

use crate::error::StoreError;
use crate::schema;

/// Handle to the SQLite store. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the store at `path` and bootstrap the
    /// schema.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        schema::ensure_schema(&pool).await?;
        info!(path = %path.display(), "store opened");

        Ok(Self { pool })
    }

    /// Open a private in-memory store. Used by tests.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        // A single connection keeps every query on the same in-memory
        // database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        schema::ensure_schema(&pool).await?;

        Ok(Self { pool })
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ----- watches -----

    /// Persist a new active watch and return it.
    pub async fn create_watch(
        &self,
        user_id: &str,
        provider: &str,
        campground_id: &str,
        checkin: NaiveDate,
        checkout: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Watch, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO watches (user_id, provider, campground_id, checkin, checkout, created_at, active)
            VALUES (?, ?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(campground_id)
        .bind(checkin)
        .bind(checkout)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Watch {
            id: result.last_insert_rowid(),
            user_id: user_id.to_string(),
            provider: provider.to_string(),
            campground_id: campground_id.to_string(),
            checkin,
            checkout,
            created_at: now,
            active: true,
        })
    }

    /// Fetch one watch by id, active or not.
    pub async fn get_watch(&self, watch_id: i64) -> Result<Option<Watch>, StoreError> {
        let watch = sqlx::query_as::<_, Watch>(
            r#"
            SELECT id, user_id, provider, campground_id, checkin, checkout, created_at, active
            FROM watches
            WHERE id = ?
            "#,
        )
        .bind(watch_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(watch)
    }

    /// Every active watch, across all users and providers.
    pub async fn list_active_watches(&self) -> Result<Vec<Watch>, StoreError> {
        let watches = sqlx::query_as::<_, Watch>(
            r#"
            SELECT id, user_id, provider, campground_id, checkin, checkout, created_at, active
            FROM watches
            WHERE active = 1
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(watches)
    }

    /// One user's active watches.
    pub async fn list_active_watches_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Watch>, StoreError> {
        let watches = sqlx::query_as::<_, Watch>(
            r#"
            SELECT id, user_id, provider, campground_id, checkin, checkout, created_at, active
            FROM watches
            WHERE active = 1 AND user_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(watches)
    }

    /// Deactivate one watch. Returns whether a row changed.
    pub async fn deactivate_watch(&self, watch_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE watches SET active = 0 WHERE id = ? AND active = 1")
            .bind(watch_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deactivate every watch whose checkout has passed. A watch checking
    /// out today is still live for last-night cancellations.
    pub async fn deactivate_expired(&self, today: NaiveDate) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE watches SET active = 0 WHERE active = 1 AND checkout < ?")
            .bind(today)
            .execute(&self.pool)
            .await?;

        let expired = result.rows_affected();
        if expired > 0 {
            debug!(expired, "deactivated expired watches");
        }
        Ok(expired)
    }

    // ----- campground catalogue -----

    /// Insert or refresh a catalogue entry.
    pub async fn upsert_campground(
        &self,
        provider: &str,
        campground_id: &str,
        name: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO campgrounds (provider, campground_id, name)
            VALUES (?, ?, ?)
            ON CONFLICT (provider, campground_id)
            DO UPDATE SET name = COALESCE(excluded.name, campgrounds.name)
            "#,
        )
        .bind(provider)
        .bind(campground_id)
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Whether the catalogue knows this campground.
    pub async fn campground_known(
        &self,
        provider: &str,
        campground_id: &str,
    ) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM campgrounds WHERE provider = ? AND campground_id = ?",
        )
        .bind(provider)
        .bind(campground_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Display name for a campground, when the catalogue has one.
    pub async fn campground_name(
        &self,
        provider: &str,
        campground_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let name: Option<Option<String>> = sqlx::query_scalar(
            "SELECT name FROM campgrounds WHERE provider = ? AND campground_id = ?",
        )
        .bind(provider)
        .bind(campground_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(name.flatten())
    }
}
