use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use model::day::today_utc;
use model::{LookupRecord, Observation, Watch};
use providers::Provider;
use store::{ChangeScope, Store};

use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::EngineError;
use crate::notify::Notifier;
use crate::planner::plan_provider_work;

/// Scheduling knobs for one provider's poll loop.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Interval floor; the loop returns here after any clean tick
    pub min_interval: Duration,
    /// Added to the interval on each rate-limited tick
    pub backoff_step: Duration,
    /// Channel operator messages go to
    pub summary_channel: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(10),
            backoff_step: Duration::from_secs(10),
            summary_channel: "operators".to_string(),
        }
    }
}

/// What one tick did. Mostly of interest to tests and logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickOutcome {
    /// Campground groups polled
    pub groups_polled: usize,
    /// State changes detected across all groups
    pub changes_detected: u64,
    /// Whether any adapter call reported rate limiting
    pub rate_limited: bool,
    /// What the dispatcher pass at the end of the tick did
    pub dispatched: DispatchOutcome,
}

/// One provider's cooperative polling loop.
///
/// Owns the provider's interval state exclusively: additive backoff on a
/// rate-limited tick, reset to the floor on any tick without one, so
/// recovery is predictable. Other providers' pollers are unaffected.
pub struct Poller {
    store: Store,
    provider: Arc<dyn Provider>,
    notifier: Arc<dyn Notifier>,
    dispatcher: Dispatcher,
    config: PollerConfig,
    interval: Duration,
}

impl Poller {
    /// Build the poller for one provider.
    pub fn new(
        store: Store,
        provider: Arc<dyn Provider>,
        notifier: Arc<dyn Notifier>,
        scope: ChangeScope,
        config: PollerConfig,
    ) -> Self {
        let dispatcher = Dispatcher::new(store.clone(), notifier.clone(), scope);
        let interval = config.min_interval;
        Self {
            store,
            provider,
            notifier,
            dispatcher,
            config,
            interval,
        }
    }

    /// The interval the loop will sleep before its next tick.
    pub fn current_interval(&self) -> Duration {
        self.interval
    }

    /// Poll until the shutdown token fires. Ticks that fail (store
    /// errors) are logged and retried on the next tick; the loop itself
    /// only exits on cancellation.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(provider = self.provider.name(), "poller started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.run_tick() => {
                    if let Err(e) = result {
                        error!(provider = self.provider.name(), error = %e, "poll tick failed");
                    }
                }
            }

            // Spread co-scheduled providers a little so their upstream
            // calls do not align.
            let jitter = Duration::from_millis(rand::rng().random_range(0..500));
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(self.interval + jitter) => {}
            }
        }

        info!(provider = self.provider.name(), "poller stopped");
    }

    /// One tick: expire watches, plan, fetch, detect, dispatch, adjust
    /// the interval. Public so tests can drive the loop body directly.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn run_tick(&mut self) -> Result<TickOutcome, EngineError> {
        self.store.deactivate_expired(today_utc()).await?;

        let watches: Vec<Watch> = self
            .store
            .list_active_watches()
            .await?
            .into_iter()
            .filter(|w| w.provider == self.provider.name())
            .collect();

        if watches.is_empty() {
            self.interval = self.config.min_interval;
            return Ok(TickOutcome::default());
        }

        let plans = plan_provider_work(self.provider.as_ref(), &watches);
        let mut rate_limited = false;
        let mut changes_detected = 0u64;

        for plan in &plans {
            // All successful buckets for one campground accumulate into a
            // single detect batch; a partial group commit is forbidden.
            let mut group: Vec<Observation> = Vec::new();

            for window in &plan.windows {
                let checked_at = Utc::now();
                match self
                    .provider
                    .fetch_availability(&plan.campground_id, *window)
                    .await
                {
                    Ok(observations) => {
                        self.store
                            .record_lookup(&LookupRecord {
                                provider: self.provider.name().to_string(),
                                campground_id: plan.campground_id.clone(),
                                start: window.start,
                                end: window.end,
                                checked_at,
                                success: true,
                                error: None,
                                observation_count: observations.len() as i64,
                            })
                            .await?;
                        group.extend(observations);
                    }
                    Err(e) => {
                        if e.is_rate_limited() {
                            rate_limited = true;
                        }
                        warn!(
                            campground_id = %plan.campground_id,
                            window = %window,
                            error = %e,
                            "availability lookup failed"
                        );
                        self.store
                            .record_lookup(&LookupRecord {
                                provider: self.provider.name().to_string(),
                                campground_id: plan.campground_id.clone(),
                                start: window.start,
                                end: window.end,
                                checked_at,
                                success: false,
                                error: Some(e.to_string()),
                                observation_count: 0,
                            })
                            .await?;
                    }
                }
            }

            changes_detected += self
                .store
                .upsert_observations_and_detect(
                    self.provider.name(),
                    &plan.campground_id,
                    &group,
                    Utc::now(),
                )
                .await?;
        }

        let dispatched = self.dispatcher.dispatch(&watches).await?;

        let previous = self.interval;
        self.interval = next_interval(
            self.interval,
            self.config.min_interval,
            self.config.backoff_step,
            rate_limited,
        );

        if rate_limited {
            let message = format!(
                "{}: upstream rate limit hit; poll interval {}s -> {}s",
                self.provider.name(),
                previous.as_secs(),
                self.interval.as_secs()
            );
            warn!("{message}");
            if let Err(e) = self
                .notifier
                .deliver_summary(&self.config.summary_channel, &message)
                .await
            {
                warn!(error = %e, "failed to deliver backoff message");
            }
        }

        Ok(TickOutcome {
            groups_polled: plans.len(),
            changes_detected,
            rate_limited,
            dispatched,
        })
    }
}

/// Interval state machine: additive step up while rate limited, straight
/// back to the floor on the first clean tick.
fn next_interval(
    current: Duration,
    floor: Duration,
    step: Duration,
    rate_limited: bool,
) -> Duration {
    if rate_limited { current + step } else { floor }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_additive_and_recovery_is_total() {
        let floor = Duration::from_secs(10);
        let step = Duration::from_secs(10);

        let backed_once = next_interval(floor, floor, step, true);
        assert_eq!(backed_once, Duration::from_secs(20));

        let backed_twice = next_interval(backed_once, floor, step, true);
        assert_eq!(backed_twice, Duration::from_secs(30));

        // One clean tick resets all the way to the floor.
        assert_eq!(next_interval(backed_twice, floor, step, false), floor);
    }
}
