use sqlx::SqlitePool;

use crate::error::StoreError;

/// Idempotent schema bootstrap, run once at store open.
pub(crate) async fn ensure_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::raw_sql(
        r#"
        CREATE TABLE IF NOT EXISTS watches (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id       TEXT    NOT NULL,
            provider      TEXT    NOT NULL,
            campground_id TEXT    NOT NULL,
            checkin       DATE    NOT NULL,
            checkout      DATE    NOT NULL,
            created_at    TEXT    NOT NULL,
            active        INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS campgrounds (
            provider      TEXT NOT NULL,
            campground_id TEXT NOT NULL,
            name          TEXT,
            PRIMARY KEY (provider, campground_id)
        );

        CREATE TABLE IF NOT EXISTS current_availability (
            provider      TEXT    NOT NULL,
            campground_id TEXT    NOT NULL,
            campsite_id   TEXT    NOT NULL,
            date          DATE    NOT NULL,
            available     INTEGER NOT NULL,
            last_checked  TEXT    NOT NULL,
            PRIMARY KEY (provider, campground_id, campsite_id, date)
        );

        CREATE TABLE IF NOT EXISTS state_changes (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            provider      TEXT    NOT NULL,
            campground_id TEXT    NOT NULL,
            campsite_id   TEXT    NOT NULL,
            date          DATE    NOT NULL,
            new_available INTEGER NOT NULL,
            changed_at    TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_state_changes_target
            ON state_changes (provider, campground_id, date);

        CREATE TABLE IF NOT EXISTS lookup_log (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            provider          TEXT    NOT NULL,
            campground_id     TEXT    NOT NULL,
            start_date        DATE    NOT NULL,
            end_date          DATE    NOT NULL,
            checked_at        TEXT    NOT NULL,
            success           INTEGER NOT NULL,
            error             TEXT,
            observation_count INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS notifications (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id        TEXT    NOT NULL,
            watch_id        INTEGER NOT NULL,
            user_id         TEXT    NOT NULL,
            provider        TEXT    NOT NULL,
            campground_id   TEXT    NOT NULL,
            campsite_id     TEXT    NOT NULL,
            date            DATE    NOT NULL,
            state           TEXT    NOT NULL,
            state_change_id INTEGER NOT NULL,
            sent_at         TEXT    NOT NULL,
            UNIQUE (watch_id, state_change_id)
        );

        CREATE TABLE IF NOT EXISTS adhoc_requests (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            provider      TEXT NOT NULL,
            campground_id TEXT NOT NULL,
            user_id       TEXT NOT NULL,
            requested_at  TEXT NOT NULL,
            status        TEXT NOT NULL DEFAULT 'pending',
            completed_at  TEXT,
            error         TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
