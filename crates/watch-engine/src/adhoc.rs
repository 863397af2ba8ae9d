use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use model::day::{days_between, today_utc};
use model::{AdhocRequest, AdhocStatus, LookupRecord, Observation};
use providers::Provider;
use store::{ChangeScope, Store};

use crate::dispatcher::Dispatcher;
use crate::error::EngineError;
use crate::notify::Notifier;

/// Knobs for the adhoc scrape worker.
#[derive(Debug, Clone)]
pub struct AdhocWorkerConfig {
    /// How often the worker wakes to claim pending requests
    pub scan_interval: Duration,
    /// How far forward an adhoc scrape looks
    pub forward_window_days: i64,
}

impl Default for AdhocWorkerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(20),
            forward_window_days: 60,
        }
    }
}

/// Shared worker for user-driven one-off scrapes. Claims pending queue
/// rows, runs them through the same adapter path the poller uses, and
/// feeds the results into the same detect/notify pipeline.
pub struct AdhocWorker {
    store: Store,
    providers: HashMap<&'static str, Arc<dyn Provider>>,
    dispatcher: Dispatcher,
    config: AdhocWorkerConfig,
}

impl AdhocWorker {
    /// Build the worker over every active provider.
    pub fn new(
        store: Store,
        providers: Vec<Arc<dyn Provider>>,
        notifier: Arc<dyn Notifier>,
        scope: ChangeScope,
        config: AdhocWorkerConfig,
    ) -> Self {
        let dispatcher = Dispatcher::new(store.clone(), notifier, scope);
        let providers = providers.into_iter().map(|p| (p.name(), p)).collect();
        Self {
            store,
            providers,
            dispatcher,
            config,
        }
    }

    /// Scan for pending requests until the shutdown token fires.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            "adhoc worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(self.config.scan_interval) => {}
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.process_pending() => {
                    if let Err(e) = result {
                        error!(error = %e, "adhoc scan failed");
                    }
                }
            }
        }

        info!("adhoc worker stopped");
    }

    /// Claim and execute every pending request, then run one dispatcher
    /// pass per provider that got fresh observations. Public so tests can
    /// drive the worker without the scan loop.
    #[instrument(skip(self))]
    pub async fn process_pending(&self) -> Result<usize, EngineError> {
        let pending = self.store.list_pending_adhoc().await?;
        if pending.is_empty() {
            return Ok(0);
        }

        debug!(count = pending.len(), "processing adhoc requests");
        let mut touched_providers: BTreeSet<&'static str> = BTreeSet::new();

        for request in &pending {
            match self.providers.get(request.provider.as_str()) {
                Some(provider) => {
                    self.execute_request(provider.as_ref(), request).await?;
                    touched_providers.insert(provider.name());
                }
                None => {
                    warn!(
                        req_id = request.id,
                        provider = %request.provider,
                        "adhoc request for inactive provider"
                    );
                    self.store
                        .update_adhoc_status(
                            request.id,
                            AdhocStatus::Failed,
                            Some(&format!("provider not active: {}", request.provider)),
                            Utc::now(),
                        )
                        .await?;
                }
            }
        }

        // Adhoc results participate in the same notification path as
        // polled ones.
        if !touched_providers.is_empty() {
            let watches = self.store.list_active_watches().await?;
            for name in touched_providers {
                let provider_watches: Vec<_> = watches
                    .iter()
                    .filter(|w| w.provider == name)
                    .cloned()
                    .collect();
                self.dispatcher.dispatch(&provider_watches).await?;
            }
        }

        Ok(pending.len())
    }

    /// Scrape one request over the fixed forward window.
    async fn execute_request(
        &self,
        provider: &dyn Provider,
        request: &AdhocRequest,
    ) -> Result<(), EngineError> {
        let today = today_utc();
        let horizon = today + chrono::Duration::days(self.config.forward_window_days);
        let days: BTreeSet<_> = days_between(today, horizon).into_iter().collect();

        let mut batch: Vec<Observation> = Vec::new();
        let mut first_error: Option<String> = None;

        for window in provider.plan_buckets(&days) {
            let checked_at = Utc::now();
            match provider
                .fetch_availability(&request.campground_id, window)
                .await
            {
                Ok(observations) => {
                    self.store
                        .record_lookup(&LookupRecord {
                            provider: provider.name().to_string(),
                            campground_id: request.campground_id.clone(),
                            start: window.start,
                            end: window.end,
                            checked_at,
                            success: true,
                            error: None,
                            observation_count: observations.len() as i64,
                        })
                        .await?;
                    batch.extend(observations);
                }
                Err(e) => {
                    warn!(
                        req_id = request.id,
                        campground_id = %request.campground_id,
                        error = %e,
                        "adhoc lookup failed"
                    );
                    self.store
                        .record_lookup(&LookupRecord {
                            provider: provider.name().to_string(),
                            campground_id: request.campground_id.clone(),
                            start: window.start,
                            end: window.end,
                            checked_at,
                            success: false,
                            error: Some(e.to_string()),
                            observation_count: 0,
                        })
                        .await?;
                    first_error.get_or_insert(e.to_string());
                }
            }
        }

        self.store
            .upsert_observations_and_detect(
                provider.name(),
                &request.campground_id,
                &batch,
                Utc::now(),
            )
            .await?;

        match first_error {
            None => {
                // A ground someone scraped by hand is worth knowing about.
                self.store
                    .upsert_campground(provider.name(), &request.campground_id, None)
                    .await?;
                self.store
                    .update_adhoc_status(request.id, AdhocStatus::Completed, None, Utc::now())
                    .await?;
            }
            Some(error) => {
                self.store
                    .update_adhoc_status(request.id, AdhocStatus::Failed, Some(&error), Utc::now())
                    .await?;
            }
        }

        Ok(())
    }
}
