use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use model::day::DateWindow;
use model::{ChangeReport, SiteDate, SiteState, StateChange, Watch};
use store::{ChangeScope, NewNotification, Store};

use crate::error::EngineError;
use crate::notify::Notifier;

/// Outcome of one dispatcher pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Watches that received a change report
    pub watches_notified: usize,
    /// Notification rows recorded
    pub rows_recorded: u64,
}

/// Attributes unnotified state changes to watches, builds per-watch change
/// reports, hands them to the delivery sink, and records the batch.
pub struct Dispatcher {
    store: Store,
    notifier: Arc<dyn Notifier>,
    scope: ChangeScope,
}

impl Dispatcher {
    /// Build a dispatcher over the shared store and sink.
    pub fn new(store: Store, notifier: Arc<dyn Notifier>, scope: ChangeScope) -> Self {
        Self {
            store,
            notifier,
            scope,
        }
    }

    /// Run one pass over the given watches (the caller has already
    /// filtered them to its provider and to active ones).
    ///
    /// Every row recorded by the pass shares one `batch_id` and one
    /// `sent_at`, but each watch's rows commit as their own batch: a
    /// duplicate `(watch, change)` pair is a programmer-error signal for
    /// that watch alone and must not roll back its tick-mates' records.
    /// Delivery outcome is logged but never gates the record: the
    /// state-change log plus the notification log define "considered
    /// delivered", otherwise a persistently broken sink would re-notify
    /// forever.
    #[instrument(skip(self, watches), fields(watch_count = watches.len()))]
    pub async fn dispatch(&self, watches: &[Watch]) -> Result<DispatchOutcome, EngineError> {
        let attributed = self
            .store
            .unnotified_changes_for_watches(watches, self.scope)
            .await?;

        if attributed.is_empty() {
            return Ok(DispatchOutcome::default());
        }

        let mut by_watch: BTreeMap<i64, Vec<StateChange>> = BTreeMap::new();
        for (watch_id, change) in attributed {
            by_watch.entry(watch_id).or_default().push(change);
        }

        let batch_id = Uuid::new_v4();
        let sent_at = Utc::now();
        let mut rows_recorded = 0u64;
        let mut watches_notified = 0usize;

        for watch in watches {
            let Some(changes) = by_watch.get(&watch.id) else {
                continue;
            };

            let newly_available: Vec<SiteDate> = changes
                .iter()
                .filter(|c| c.new_available)
                .map(|c| SiteDate {
                    campsite_id: c.campsite_id.clone(),
                    date: c.date,
                })
                .collect();
            let newly_booked: Vec<SiteDate> = changes
                .iter()
                .filter(|c| !c.new_available)
                .map(|c| SiteDate {
                    campsite_id: c.campsite_id.clone(),
                    date: c.date,
                })
                .collect();

            if newly_available.is_empty() && newly_booked.is_empty() {
                continue;
            }

            // The user sees the whole current picture, not just the delta.
            let current_available = self
                .store
                .current_available_in_range(
                    &watch.provider,
                    &watch.campground_id,
                    DateWindow::new(watch.checkin, watch.checkout),
                )
                .await?;

            let report = ChangeReport {
                watch: watch.clone(),
                current_available,
                newly_available,
                newly_booked,
            };

            if let Err(e) = self.notifier.deliver_change(&watch.user_id, &report).await {
                warn!(watch_id = watch.id, error = %e, "delivery failed; recording anyway");
            }

            let rows: Vec<NewNotification> = changes
                .iter()
                .map(|change| NewNotification {
                    watch_id: watch.id,
                    user_id: watch.user_id.clone(),
                    provider: change.provider.clone(),
                    campground_id: change.campground_id.clone(),
                    campsite_id: change.campsite_id.clone(),
                    date: change.date,
                    state: SiteState::from(change.new_available),
                    state_change_id: change.id,
                })
                .collect();

            match self
                .store
                .insert_notifications_batch(&rows, batch_id, sent_at)
                .await
            {
                Ok(recorded) => rows_recorded += recorded,
                Err(e) => error!(
                    watch_id = watch.id,
                    error = %e,
                    "failed to record notification batch"
                ),
            }
            watches_notified += 1;
        }

        debug!(watches_notified, rows_recorded, "dispatch pass complete");

        Ok(DispatchOutcome {
            watches_notified,
            rows_recorded,
        })
    }
}
