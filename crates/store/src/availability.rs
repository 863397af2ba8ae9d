use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::instrument;

use model::day::DateWindow;
use model::{LookupRecord, Observation, SiteDate};

use crate::error::StoreError;
use crate::store::Store;

/// Counters for the operator summary, aggregated over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryStats {
    /// Adapter calls attempted
    pub lookups: i64,
    /// Adapter calls that failed
    pub failed_lookups: i64,
    /// Observations ingested
    pub observations: i64,
    /// State transitions recorded
    pub state_changes: i64,
    /// Notification rows written
    pub notifications: i64,
    /// Watches currently active
    pub active_watches: i64,
}

impl Store {
    /// Ingest one poll batch for a `(provider, campground)` group and
    /// detect state transitions against the persisted baseline.
    ///
    /// The whole batch commits or rolls back as one transaction: a
    /// state-change row exists iff the current row was just overwritten
    /// with the corresponding value. Duplicate observations for the same
    /// `(campsite, date)` within the batch resolve last-writer-wins before
    /// anything touches the database, so a batch yields at most one change
    /// row per key. Returns the number of state changes recorded.
    #[instrument(skip(self, batch), fields(batch_len = batch.len()))]
    pub async fn upsert_observations_and_detect(
        &self,
        provider: &str,
        campground_id: &str,
        batch: &[Observation],
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut latest: HashMap<(&str, NaiveDate), bool> = HashMap::new();
        for obs in batch {
            latest.insert((obs.campsite_id.as_str(), obs.date), obs.available);
        }

        let mut changes = 0u64;
        let mut tx = self.pool().begin().await?;

        for ((campsite_id, date), available) in latest {
            let prior: Option<bool> = sqlx::query_scalar(
                r#"
                SELECT available FROM current_availability
                WHERE provider = ? AND campground_id = ? AND campsite_id = ? AND date = ?
                "#,
            )
            .bind(provider)
            .bind(campground_id)
            .bind(campsite_id)
            .bind(date)
            .fetch_optional(&mut *tx)
            .await?;

            // First sightings that are already booked carry no change value.
            let record = match prior {
                None => available,
                Some(prior) => prior != available,
            };

            sqlx::query(
                r#"
                INSERT INTO current_availability
                    (provider, campground_id, campsite_id, date, available, last_checked)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT (provider, campground_id, campsite_id, date)
                DO UPDATE SET
                    available = excluded.available,
                    last_checked = excluded.last_checked
                "#,
            )
            .bind(provider)
            .bind(campground_id)
            .bind(campsite_id)
            .bind(date)
            .bind(available)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if record {
                sqlx::query(
                    r#"
                    INSERT INTO state_changes
                        (provider, campground_id, campsite_id, date, new_available, changed_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(provider)
                .bind(campground_id)
                .bind(campsite_id)
                .bind(date)
                .bind(available)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                changes += 1;
            }
        }

        tx.commit().await?;

        Ok(changes)
    }

    /// Every night currently bookable for a campground inside `window`.
    /// Feeds the context rows of outgoing notifications.
    pub async fn current_available_in_range(
        &self,
        provider: &str,
        campground_id: &str,
        window: DateWindow,
    ) -> Result<Vec<SiteDate>, StoreError> {
        let rows = sqlx::query_as::<_, SiteDate>(
            r#"
            SELECT campsite_id, date FROM current_availability
            WHERE provider = ? AND campground_id = ?
              AND available = 1
              AND date >= ? AND date < ?
            ORDER BY date ASC, campsite_id ASC
            "#,
        )
        .bind(provider)
        .bind(campground_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// Append one lookup-log row. Recorded whether the adapter call
    /// succeeded or failed, outside the observation transaction.
    pub async fn record_lookup(&self, record: &LookupRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO lookup_log
                (provider, campground_id, start_date, end_date, checked_at, success, error, observation_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.provider)
        .bind(&record.campground_id)
        .bind(record.start)
        .bind(record.end)
        .bind(record.checked_at)
        .bind(record.success)
        .bind(&record.error)
        .bind(record.observation_count)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Recent lookup attempts for a campground, newest first. Operator
    /// visibility into repeated semantic failures.
    pub async fn recent_lookups(
        &self,
        provider: &str,
        campground_id: &str,
        limit: i64,
    ) -> Result<Vec<LookupRecord>, StoreError> {
        let rows = sqlx::query_as::<_, LookupRecord>(
            r#"
            SELECT provider, campground_id, start_date AS "start", end_date AS "end",
                   checked_at, success, error, observation_count
            FROM lookup_log
            WHERE provider = ? AND campground_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(provider)
        .bind(campground_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// Aggregate counters since `since` for the daily operator summary.
    pub async fn summary_stats_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<SummaryStats, StoreError> {
        let lookups: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM lookup_log WHERE checked_at >= ?")
                .bind(since)
                .fetch_one(self.pool())
                .await?;

        let failed_lookups: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lookup_log WHERE checked_at >= ? AND success = 0",
        )
        .bind(since)
        .fetch_one(self.pool())
        .await?;

        let observations: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(observation_count), 0) FROM lookup_log WHERE checked_at >= ?",
        )
        .bind(since)
        .fetch_one(self.pool())
        .await?;

        let state_changes: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM state_changes WHERE changed_at >= ?")
                .bind(since)
                .fetch_one(self.pool())
                .await?;

        let notifications: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE sent_at >= ?")
                .bind(since)
                .fetch_one(self.pool())
                .await?;

        let active_watches: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM watches WHERE active = 1")
                .fetch_one(self.pool())
                .await?;

        Ok(SummaryStats {
            lookups,
            failed_lookups,
            observations,
            state_changes,
            notifications,
            active_watches,
        })
    }
}
