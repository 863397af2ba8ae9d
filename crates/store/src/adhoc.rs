use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use tracing::debug;

use model::{AdhocRequest, AdhocStatus};

use crate::error::StoreError;
use crate::store::Store;

#[derive(Debug, FromRow)]
struct AdhocRow {
    id: i64,
    provider: String,
    campground_id: String,
    user_id: String,
    requested_at: DateTime<Utc>,
    status: String,
    completed_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl TryFrom<AdhocRow> for AdhocRequest {
    type Error = StoreError;

    fn try_from(row: AdhocRow) -> Result<Self, Self::Error> {
        let status = AdhocStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("adhoc status {:?}", row.status)))?;

        Ok(AdhocRequest {
            id: row.id,
            provider: row.provider,
            campground_id: row.campground_id,
            user_id: row.user_id,
            requested_at: row.requested_at,
            status,
            completed_at: row.completed_at,
            error: row.error,
        })
    }
}

impl Store {
    /// Enqueue a one-off scrape of a `(provider, campground)`. A pending
    /// request for the same target inside the debounce window is reused
    /// across users; the returned flag says whether that happened.
    pub async fn enqueue_adhoc(
        &self,
        provider: &str,
        campground_id: &str,
        user_id: &str,
        debounce_window: Duration,
        now: DateTime<Utc>,
    ) -> Result<(i64, bool), StoreError> {
        let pending = sqlx::query_as::<_, AdhocRow>(
            r#"
            SELECT id, provider, campground_id, user_id, requested_at, status, completed_at, error
            FROM adhoc_requests
            WHERE provider = ? AND campground_id = ? AND status = 'pending'
            ORDER BY id DESC
            "#,
        )
        .bind(provider)
        .bind(campground_id)
        .fetch_all(self.pool())
        .await?;

        if let Some(existing) = pending
            .iter()
            .find(|row| now - row.requested_at <= debounce_window)
        {
            debug!(req_id = existing.id, provider, campground_id, "adhoc request debounced");
            return Ok((existing.id, true));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO adhoc_requests (provider, campground_id, user_id, requested_at, status)
            VALUES (?, ?, ?, ?, 'pending')
            "#,
        )
        .bind(provider)
        .bind(campground_id)
        .bind(user_id)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok((result.last_insert_rowid(), false))
    }

    /// Pending scrape requests, oldest first.
    pub async fn list_pending_adhoc(&self) -> Result<Vec<AdhocRequest>, StoreError> {
        let rows = sqlx::query_as::<_, AdhocRow>(
            r#"
            SELECT id, provider, campground_id, user_id, requested_at, status, completed_at, error
            FROM adhoc_requests
            WHERE status = 'pending'
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Move one request out of `pending`, capturing the failure text when
    /// the adapter call failed.
    pub async fn update_adhoc_status(
        &self,
        req_id: i64,
        status: AdhocStatus,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE adhoc_requests
            SET status = ?, completed_at = ?, error = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(error)
        .bind(req_id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Fetch one request by id.
    pub async fn get_adhoc(&self, req_id: i64) -> Result<Option<AdhocRequest>, StoreError> {
        let row = sqlx::query_as::<_, AdhocRow>(
            r#"
            SELECT id, provider, campground_id, user_id, requested_at, status, completed_at, error
            FROM adhoc_requests
            WHERE id = ?
            "#,
        )
        .bind(req_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}
