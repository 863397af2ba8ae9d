use chrono::{DateTime, NaiveDate, Utc};
use tracing::instrument;
use uuid::Uuid;

use model::{NotificationRow, SiteState, StateChange, Watch};

use crate::error::StoreError;
use crate::store::Store;

/// Which state changes a watch may be notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeScope {
    /// Only changes recorded after the watch was created. Keeps a
    /// reactivated or late-created watch from replaying history.
    SinceWatchCreation,
    /// Any unnotified change inside the watch window.
    All,
}

/// One notification row about to be written, before ids are assigned.
#[derive(Debug, Clone)]
pub struct NewNotification {
    /// Watch the change is attributed to
    pub watch_id: i64,
    /// Owner of that watch
    pub user_id: String,
    /// Provider storage key
    pub provider: String,
    /// Provider-scoped campground identifier
    pub campground_id: String,
    /// Provider-scoped campsite identifier
    pub campsite_id: String,
    /// The night the change applies to
    pub date: NaiveDate,
    /// State reported to the user
    pub state: SiteState,
    /// The state change this notification covers
    pub state_change_id: i64,
}

impl Store {
    /// For each watch, every state change that matches its
    /// `(provider, campground)` target, falls inside its
    /// `[checkin, checkout)` window, and has no notification row yet for
    /// that `(watch, change)` pair. Ordered by `changed_at` ascending.
    #[instrument(skip(self, watches), fields(watch_count = watches.len()))]
    pub async fn unnotified_changes_for_watches(
        &self,
        watches: &[Watch],
        scope: ChangeScope,
    ) -> Result<Vec<(i64, StateChange)>, StoreError> {
        let mut attributed = Vec::new();

        for watch in watches {
            let changes = sqlx::query_as::<_, StateChange>(
                r#"
                SELECT sc.id, sc.provider, sc.campground_id, sc.campsite_id,
                       sc.date, sc.new_available, sc.changed_at
                FROM state_changes sc
                WHERE sc.provider = ? AND sc.campground_id = ?
                  AND sc.date >= ? AND sc.date < ?
                  AND NOT EXISTS (
                      SELECT 1 FROM notifications n
                      WHERE n.watch_id = ? AND n.state_change_id = sc.id
                  )
                ORDER BY sc.changed_at ASC, sc.id ASC
                "#,
            )
            .bind(&watch.provider)
            .bind(&watch.campground_id)
            .bind(watch.checkin)
            .bind(watch.checkout)
            .bind(watch.id)
            .fetch_all(self.pool())
            .await?;

            for change in changes {
                if scope == ChangeScope::SinceWatchCreation
                    && change.changed_at < watch.created_at
                {
                    continue;
                }
                attributed.push((watch.id, change));
            }
        }

        Ok(attributed)
    }

    /// Atomically append a set of notification rows sharing `batch_id`
    /// and `sent_at` (the dispatcher calls this once per watch within a
    /// pass). A duplicate `(watch, state_change)` pair violates the
    /// unique constraint and fails the whole batch; that is a programmer
    /// error, not a runtime condition.
    #[instrument(skip(self, rows), fields(row_count = rows.len()))]
    pub async fn insert_notifications_batch(
        &self,
        rows: &[NewNotification],
        batch_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let batch_key = batch_id.to_string();
        let mut tx = self.pool().begin().await?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO notifications
                    (batch_id, watch_id, user_id, provider, campground_id,
                     campsite_id, date, state, state_change_id, sent_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&batch_key)
            .bind(row.watch_id)
            .bind(&row.user_id)
            .bind(&row.provider)
            .bind(&row.campground_id)
            .bind(&row.campsite_id)
            .bind(row.date)
            .bind(row.state.as_str())
            .bind(row.state_change_id)
            .bind(sent_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(rows.len() as u64)
    }

    /// Every notification row, oldest first. Used by tests and reports.
    pub async fn list_notifications(&self) -> Result<Vec<NotificationRow>, StoreError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, batch_id, watch_id, user_id, provider, campground_id,
                   campsite_id, date, state, state_change_id, sent_at
            FROM notifications
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }
}
