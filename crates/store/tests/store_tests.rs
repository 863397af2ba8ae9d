use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use model::day::DateWindow;
use model::{AdhocStatus, Observation, SiteState, Watch};
use store::{ChangeScope, NewNotification, Store};

const PROVIDER: &str = "recgov";
const CAMPGROUND: &str = "232447";

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

/// Fixed base instant so created-at scoping is deterministic.
fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn obs(campsite_id: &str, date: &str, available: bool) -> Observation {
    Observation {
        campsite_id: campsite_id.to_string(),
        date: d(date),
        available,
    }
}

async fn store() -> Store {
    Store::open_in_memory().await.expect("open in-memory store")
}

async fn watch(store: &Store, user: &str, checkin: &str, checkout: &str, at: DateTime<Utc>) -> Watch {
    store
        .create_watch(user, PROVIDER, CAMPGROUND, d(checkin), d(checkout), at)
        .await
        .expect("create watch")
}

fn notification_for(watch: &Watch, change_id: i64, site: &str, date: &str, state: SiteState) -> NewNotification {
    NewNotification {
        watch_id: watch.id,
        user_id: watch.user_id.clone(),
        provider: watch.provider.clone(),
        campground_id: watch.campground_id.clone(),
        campsite_id: site.to_string(),
        date: d(date),
        state,
        state_change_id: change_id,
    }
}

// ----- change detection -----

#[tokio::test]
async fn first_sighting_of_availability_records_one_change() {
    let store = store().await;

    let changes = store
        .upsert_observations_and_detect(PROVIDER, CAMPGROUND, &[obs("A", "2025-06-01", true)], t(0))
        .await
        .unwrap();

    assert_eq!(changes, 1);
}

#[tokio::test]
async fn first_sighting_already_booked_is_not_a_change() {
    let store = store().await;

    let changes = store
        .upsert_observations_and_detect(PROVIDER, CAMPGROUND, &[obs("A", "2025-06-01", false)], t(0))
        .await
        .unwrap();

    assert_eq!(changes, 0);

    // The current row still exists so a later opening is a transition.
    let changes = store
        .upsert_observations_and_detect(PROVIDER, CAMPGROUND, &[obs("A", "2025-06-01", true)], t(1))
        .await
        .unwrap();
    assert_eq!(changes, 1);
}

#[tokio::test]
async fn identical_batch_is_idempotent() {
    let store = store().await;
    let batch = vec![obs("A", "2025-06-01", true), obs("B", "2025-06-02", false)];

    let first = store
        .upsert_observations_and_detect(PROVIDER, CAMPGROUND, &batch, t(0))
        .await
        .unwrap();
    let second = store
        .upsert_observations_and_detect(PROVIDER, CAMPGROUND, &batch, t(1))
        .await
        .unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 0, "re-submitting an identical batch records nothing");
}

#[tokio::test]
async fn flip_to_unavailable_records_booked_change() {
    let store = store().await;

    store
        .upsert_observations_and_detect(PROVIDER, CAMPGROUND, &[obs("A", "2025-06-01", true)], t(0))
        .await
        .unwrap();
    let changes = store
        .upsert_observations_and_detect(PROVIDER, CAMPGROUND, &[obs("A", "2025-06-01", false)], t(5))
        .await
        .unwrap();

    assert_eq!(changes, 1);

    let w = watch(&store, "u1", "2025-06-01", "2025-06-03", t(0)).await;
    let attributed = store
        .unnotified_changes_for_watches(&[w], ChangeScope::SinceWatchCreation)
        .await
        .unwrap();

    assert_eq!(attributed.len(), 2);
    // Ordered by changed_at ascending: the opening, then the booking.
    assert!(attributed[0].1.new_available);
    assert!(!attributed[1].1.new_available);
}

#[tokio::test]
async fn intra_batch_duplicates_resolve_last_writer_wins() {
    let store = store().await;

    // Same key twice; the later value (false) wins, so no change row on a
    // first sighting.
    let changes = store
        .upsert_observations_and_detect(
            PROVIDER,
            CAMPGROUND,
            &[obs("A", "2025-06-01", true), obs("A", "2025-06-01", false)],
            t(0),
        )
        .await
        .unwrap();

    assert_eq!(changes, 0);

    let current = store
        .current_available_in_range(
            PROVIDER,
            CAMPGROUND,
            DateWindow::new(d("2025-06-01"), d("2025-06-02")),
        )
        .await
        .unwrap();
    assert!(current.is_empty(), "last writer marked the night booked");
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let store = store().await;
    let changes = store
        .upsert_observations_and_detect(PROVIDER, CAMPGROUND, &[], t(0))
        .await
        .unwrap();
    assert_eq!(changes, 0);
}

#[tokio::test]
async fn current_available_in_range_filters_and_orders() {
    let store = store().await;

    store
        .upsert_observations_and_detect(
            PROVIDER,
            CAMPGROUND,
            &[
                obs("B", "2025-06-01", true),
                obs("A", "2025-06-01", true),
                obs("A", "2025-06-02", false),
                obs("A", "2025-06-05", true),
            ],
            t(0),
        )
        .await
        .unwrap();

    let current = store
        .current_available_in_range(
            PROVIDER,
            CAMPGROUND,
            DateWindow::new(d("2025-06-01"), d("2025-06-03")),
        )
        .await
        .unwrap();

    let pairs: Vec<(String, NaiveDate)> = current
        .into_iter()
        .map(|s| (s.campsite_id, s.date))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("A".to_string(), d("2025-06-01")),
            ("B".to_string(), d("2025-06-01")),
        ]
    );
}

// ----- attribution and notification dedup -----

#[tokio::test]
async fn out_of_window_change_is_not_attributed() {
    let store = store().await;
    let w = watch(&store, "u2", "2025-07-01", "2025-07-05", t(0)).await;

    store
        .upsert_observations_and_detect(PROVIDER, CAMPGROUND, &[obs("A", "2025-06-30", true)], t(1))
        .await
        .unwrap();

    let attributed = store
        .unnotified_changes_for_watches(&[w], ChangeScope::SinceWatchCreation)
        .await
        .unwrap();
    assert!(attributed.is_empty());
}

#[tokio::test]
async fn checkout_day_is_outside_the_window() {
    let store = store().await;
    let w = watch(&store, "u1", "2025-06-01", "2025-06-02", t(0)).await;

    store
        .upsert_observations_and_detect(
            PROVIDER,
            CAMPGROUND,
            &[obs("A", "2025-06-01", true), obs("A", "2025-06-02", true)],
            t(1),
        )
        .await
        .unwrap();

    let attributed = store
        .unnotified_changes_for_watches(&[w], ChangeScope::SinceWatchCreation)
        .await
        .unwrap();

    assert_eq!(attributed.len(), 1, "one-night watch covers exactly one night");
    assert_eq!(attributed[0].1.date, d("2025-06-01"));
}

#[tokio::test]
async fn overlapping_watches_each_get_the_change() {
    let store = store().await;
    let w3 = watch(&store, "u3", "2025-06-01", "2025-06-03", t(0)).await;
    let w4 = watch(&store, "u4", "2025-06-02", "2025-06-04", t(0)).await;

    store
        .upsert_observations_and_detect(PROVIDER, CAMPGROUND, &[obs("A", "2025-06-02", true)], t(1))
        .await
        .unwrap();

    let attributed = store
        .unnotified_changes_for_watches(&[w3.clone(), w4.clone()], ChangeScope::SinceWatchCreation)
        .await
        .unwrap();

    let mut watch_ids: Vec<i64> = attributed.iter().map(|(id, _)| *id).collect();
    watch_ids.sort();
    assert_eq!(watch_ids, vec![w3.id, w4.id]);
}

#[tokio::test]
async fn notified_changes_drop_out_of_the_anti_join() {
    let store = store().await;
    let w = watch(&store, "u1", "2025-06-01", "2025-06-03", t(0)).await;

    store
        .upsert_observations_and_detect(PROVIDER, CAMPGROUND, &[obs("A", "2025-06-01", true)], t(1))
        .await
        .unwrap();

    let attributed = store
        .unnotified_changes_for_watches(&[w.clone()], ChangeScope::SinceWatchCreation)
        .await
        .unwrap();
    assert_eq!(attributed.len(), 1);
    let change = &attributed[0].1;

    store
        .insert_notifications_batch(
            &[notification_for(&w, change.id, "A", "2025-06-01", SiteState::Available)],
            Uuid::new_v4(),
            t(2),
        )
        .await
        .unwrap();

    let again = store
        .unnotified_changes_for_watches(&[w], ChangeScope::SinceWatchCreation)
        .await
        .unwrap();
    assert!(again.is_empty(), "a recorded notification is never re-attributed");
}

#[tokio::test]
async fn duplicate_watch_change_pair_violates_the_constraint() {
    let store = store().await;
    let w = watch(&store, "u1", "2025-06-01", "2025-06-03", t(0)).await;

    store
        .upsert_observations_and_detect(PROVIDER, CAMPGROUND, &[obs("A", "2025-06-01", true)], t(1))
        .await
        .unwrap();
    let attributed = store
        .unnotified_changes_for_watches(&[w.clone()], ChangeScope::SinceWatchCreation)
        .await
        .unwrap();
    let change_id = attributed[0].1.id;

    let row = notification_for(&w, change_id, "A", "2025-06-01", SiteState::Available);
    store
        .insert_notifications_batch(&[row.clone()], Uuid::new_v4(), t(2))
        .await
        .unwrap();

    let err = store
        .insert_notifications_batch(&[row], Uuid::new_v4(), t(3))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("database error"));
}

#[tokio::test]
async fn batch_failure_rolls_back_every_row() {
    let store = store().await;
    let w = watch(&store, "u1", "2025-06-01", "2025-06-04", t(0)).await;

    store
        .upsert_observations_and_detect(
            PROVIDER,
            CAMPGROUND,
            &[obs("A", "2025-06-01", true), obs("B", "2025-06-02", true)],
            t(1),
        )
        .await
        .unwrap();
    let attributed = store
        .unnotified_changes_for_watches(&[w.clone()], ChangeScope::SinceWatchCreation)
        .await
        .unwrap();
    assert_eq!(attributed.len(), 2);

    let first = notification_for(&w, attributed[0].1.id, "A", "2025-06-01", SiteState::Available);
    store
        .insert_notifications_batch(&[first.clone()], Uuid::new_v4(), t(2))
        .await
        .unwrap();

    // A batch containing one fresh row and one duplicate must write neither.
    let fresh = notification_for(&w, attributed[1].1.id, "B", "2025-06-02", SiteState::Available);
    let result = store
        .insert_notifications_batch(&[fresh, first], Uuid::new_v4(), t(3))
        .await;
    assert!(result.is_err());

    assert_eq!(store.list_notifications().await.unwrap().len(), 1);
}

#[tokio::test]
async fn changes_before_watch_creation_are_scoped_out_by_default() {
    let store = store().await;

    store
        .upsert_observations_and_detect(PROVIDER, CAMPGROUND, &[obs("A", "2025-06-01", true)], t(0))
        .await
        .unwrap();

    // Watch created after the change landed.
    let w = watch(&store, "u1", "2025-06-01", "2025-06-03", t(10)).await;

    let scoped = store
        .unnotified_changes_for_watches(&[w.clone()], ChangeScope::SinceWatchCreation)
        .await
        .unwrap();
    assert!(scoped.is_empty(), "history does not replay into new watches");

    let unscoped = store
        .unnotified_changes_for_watches(&[w], ChangeScope::All)
        .await
        .unwrap();
    assert_eq!(unscoped.len(), 1);
}

// ----- watch lifecycle -----

#[tokio::test]
async fn expiry_runs_at_the_utc_day_boundary() {
    let store = store().await;
    let ends_today = watch(&store, "u1", "2025-06-01", "2025-06-10", t(0)).await;
    let ended = watch(&store, "u1", "2025-06-01", "2025-06-09", t(0)).await;

    let expired = store.deactivate_expired(d("2025-06-10")).await.unwrap();
    assert_eq!(expired, 1);

    let active = store.list_active_watches().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, ends_today.id);

    let gone = store.get_watch(ended.id).await.unwrap().unwrap();
    assert!(!gone.active);
}

#[tokio::test]
async fn deactivate_watch_is_scoped_to_the_row() {
    let store = store().await;
    let w1 = watch(&store, "u1", "2025-06-01", "2025-06-03", t(0)).await;
    let w2 = watch(&store, "u2", "2025-06-01", "2025-06-03", t(0)).await;

    assert!(store.deactivate_watch(w1.id).await.unwrap());
    assert!(!store.deactivate_watch(w1.id).await.unwrap(), "already inactive");

    let active = store.list_active_watches().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, w2.id);
}

#[tokio::test]
async fn user_listing_only_shows_their_watches() {
    let store = store().await;
    watch(&store, "u1", "2025-06-01", "2025-06-03", t(0)).await;
    watch(&store, "u2", "2025-06-01", "2025-06-03", t(0)).await;

    let mine = store.list_active_watches_for_user("u1").await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].user_id, "u1");
}

// ----- adhoc queue -----

#[tokio::test]
async fn adhoc_debounce_collapses_within_the_window_across_users() {
    let store = store().await;
    let window = Duration::minutes(5);

    let (id1, deduped1) = store
        .enqueue_adhoc(PROVIDER, CAMPGROUND, "u1", window, t(0))
        .await
        .unwrap();
    assert!(!deduped1);

    let (id2, deduped2) = store
        .enqueue_adhoc(PROVIDER, CAMPGROUND, "u2", window, t(2))
        .await
        .unwrap();
    assert!(deduped2);
    assert_eq!(id1, id2);

    // Outside the window a fresh pending row is created.
    let (id3, deduped3) = store
        .enqueue_adhoc(PROVIDER, CAMPGROUND, "u1", window, t(20))
        .await
        .unwrap();
    assert!(!deduped3);
    assert_ne!(id1, id3);
}

#[tokio::test]
async fn adhoc_completion_leaves_the_pending_list() {
    let store = store().await;
    let window = Duration::minutes(5);

    let (id, _) = store
        .enqueue_adhoc(PROVIDER, CAMPGROUND, "u1", window, t(0))
        .await
        .unwrap();
    let (other, _) = store
        .enqueue_adhoc(PROVIDER, "118005", "u1", window, t(0))
        .await
        .unwrap();

    store
        .update_adhoc_status(id, AdhocStatus::Completed, None, t(1))
        .await
        .unwrap();

    let pending = store.list_pending_adhoc().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, other);

    let done = store.get_adhoc(id).await.unwrap().unwrap();
    assert_eq!(done.status, AdhocStatus::Completed);
    assert!(done.completed_at.is_some());

    // A completed row no longer debounces new requests.
    let (id2, deduped) = store
        .enqueue_adhoc(PROVIDER, CAMPGROUND, "u1", window, t(2))
        .await
        .unwrap();
    assert!(!deduped);
    assert_ne!(id, id2);
}

#[tokio::test]
async fn adhoc_failure_captures_the_error() {
    let store = store().await;
    let (id, _) = store
        .enqueue_adhoc(PROVIDER, CAMPGROUND, "u1", Duration::minutes(5), t(0))
        .await
        .unwrap();

    store
        .update_adhoc_status(id, AdhocStatus::Failed, Some("HTTP 404"), t(1))
        .await
        .unwrap();

    let failed = store.get_adhoc(id).await.unwrap().unwrap();
    assert_eq!(failed.status, AdhocStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("HTTP 404"));
}

// ----- audit and summary -----

#[tokio::test]
async fn lookups_record_success_and_failure() {
    let store = store().await;

    store
        .record_lookup(&model::LookupRecord {
            provider: PROVIDER.to_string(),
            campground_id: CAMPGROUND.to_string(),
            start: d("2025-06-01"),
            end: d("2025-07-01"),
            checked_at: t(0),
            success: true,
            error: None,
            observation_count: 42,
        })
        .await
        .unwrap();
    store
        .record_lookup(&model::LookupRecord {
            provider: PROVIDER.to_string(),
            campground_id: CAMPGROUND.to_string(),
            start: d("2025-06-01"),
            end: d("2025-07-01"),
            checked_at: t(1),
            success: false,
            error: Some("rate limited by provider".to_string()),
            observation_count: 0,
        })
        .await
        .unwrap();

    let recent = store.recent_lookups(PROVIDER, CAMPGROUND, 10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert!(!recent[0].success, "newest first");
    assert_eq!(recent[1].observation_count, 42);

    let stats = store.summary_stats_since(t(-60)).await.unwrap();
    assert_eq!(stats.lookups, 2);
    assert_eq!(stats.failed_lookups, 1);
    assert_eq!(stats.observations, 42);
}

#[tokio::test]
async fn campground_catalogue_upserts_and_answers() {
    let store = store().await;

    assert!(!store.campground_known(PROVIDER, CAMPGROUND).await.unwrap());

    store
        .upsert_campground(PROVIDER, CAMPGROUND, Some("Kirk Creek"))
        .await
        .unwrap();
    assert!(store.campground_known(PROVIDER, CAMPGROUND).await.unwrap());
    assert_eq!(
        store.campground_name(PROVIDER, CAMPGROUND).await.unwrap().as_deref(),
        Some("Kirk Creek")
    );

    // A nameless refresh keeps the existing name.
    store.upsert_campground(PROVIDER, CAMPGROUND, None).await.unwrap();
    assert_eq!(
        store.campground_name(PROVIDER, CAMPGROUND).await.unwrap().as_deref(),
        Some("Kirk Creek")
    );
}
