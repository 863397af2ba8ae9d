use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use store::{Store, SummaryStats};

use crate::notify::Notifier;

/// When and where the daily summary fires.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// Timezone the local hour is interpreted in
    pub timezone: Tz,
    /// Local hour of day (0-23) the summary fires at
    pub local_hour: u32,
    /// Channel the summary goes to
    pub channel: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            local_hour: 8,
            channel: "operators".to_string(),
        }
    }
}

/// Once-a-day operator digest of what the pipeline did in the trailing
/// 24 hours.
pub struct SummaryTask {
    store: Store,
    notifier: Arc<dyn Notifier>,
    config: SummaryConfig,
}

impl SummaryTask {
    /// Build the task.
    pub fn new(store: Store, notifier: Arc<dyn Notifier>, config: SummaryConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Fire at the configured local hour until the shutdown token fires.
    /// A failed delivery is logged and the task waits for the next day.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            timezone = %self.config.timezone,
            local_hour = self.config.local_hour,
            "summary task started"
        );

        loop {
            let at = next_firing(Utc::now(), self.config.timezone, self.config.local_hour);
            let wait = (at - Utc::now()).to_std().unwrap_or(StdDuration::ZERO);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(wait) => {}
            }

            match self.store.summary_stats_since(Utc::now() - Duration::hours(24)).await {
                Ok(stats) => {
                    let message = format_summary(&stats);
                    if let Err(e) = self
                        .notifier
                        .deliver_summary(&self.config.channel, &message)
                        .await
                    {
                        warn!(error = %e, "failed to deliver daily summary");
                    }
                }
                Err(e) => error!(error = %e, "failed to assemble daily summary"),
            }
        }

        info!("summary task stopped");
    }
}

/// The next instant the configured local hour occurs, in UTC. Skips
/// DST-gapped local times forward to the next day.
fn next_firing(now: DateTime<Utc>, tz: Tz, local_hour: u32) -> DateTime<Utc> {
    let local_now = now.with_timezone(&tz);
    let mut day = local_now.date_naive();

    for _ in 0..3 {
        if let Some(candidate) = tz
            .with_ymd_and_hms(day.year(), day.month(), day.day(), local_hour, 0, 0)
            .earliest()
        {
            if candidate > local_now {
                return candidate.with_timezone(&Utc);
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    now + Duration::days(1)
}

/// Render the trailing-24h counters into one operator line.
fn format_summary(stats: &SummaryStats) -> String {
    format!(
        "daily summary: {} active watches; {} lookups ({} failed); {} observations ingested; {} availability changes; {} notifications sent",
        stats.active_watches,
        stats.lookups,
        stats.failed_lookups,
        stats.observations,
        stats.state_changes,
        stats.notifications,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fires_later_today_when_the_hour_is_ahead() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let at = next_firing(now, chrono_tz::UTC, 18);
        assert_eq!(at, Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap());
    }

    #[test]
    fn fires_tomorrow_when_the_hour_has_passed() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 20, 0, 0).unwrap();
        let at = next_firing(now, chrono_tz::UTC, 18);
        assert_eq!(at, Utc.with_ymd_and_hms(2025, 6, 2, 18, 0, 0).unwrap());
    }

    #[test]
    fn local_hour_is_interpreted_in_the_configured_zone() {
        // 8am America/Los_Angeles in June is 15:00 UTC (PDT, UTC-7).
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let at = next_firing(now, chrono_tz::America::Los_Angeles, 8);
        assert_eq!(at, Utc.with_ymd_and_hms(2025, 6, 1, 15, 0, 0).unwrap());
    }

    #[test]
    fn summary_line_carries_every_counter() {
        let line = format_summary(&SummaryStats {
            lookups: 12,
            failed_lookups: 2,
            observations: 340,
            state_changes: 5,
            notifications: 3,
            active_watches: 7,
        });
        assert!(line.contains("7 active watches"));
        assert!(line.contains("12 lookups (2 failed)"));
        assert!(line.contains("5 availability changes"));
        assert!(line.contains("3 notifications sent"));
    }
}
