//! Operator configuration, read from `CAMPWATCH_*` environment variables
//! (optionally via a `.env` file).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono_tz::Tz;

const ENV_PREFIX: &str = "CAMPWATCH_";

/// Everything the daemon needs to come up.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite file path
    pub db_path: PathBuf,
    /// Poll interval floor per provider
    pub min_poll_interval: Duration,
    /// Additive backoff step on rate-limited ticks
    pub poll_backoff_step: Duration,
    /// Window inside which equivalent adhoc requests collapse
    pub adhoc_debounce: chrono::Duration,
    /// Adhoc worker wake period
    pub adhoc_scan_interval: Duration,
    /// Timezone the summary hour is interpreted in
    pub summary_timezone: Tz,
    /// Local hour (0-23) the daily summary fires
    pub summary_local_hour: u32,
    /// Channel operator messages go to
    pub summary_channel: String,
    /// Provider names to activate
    pub providers: Vec<String>,
    /// Attribute changes that predate a watch's creation
    pub notify_preexisting_changes: bool,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration from any name → value source. Split out so
    /// parsing is testable without touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

        let db_path = PathBuf::from(get("DB_PATH").unwrap_or_else(|| "campwatch.db".to_string()));

        let min_poll_interval = parse_secs(get("MIN_POLL_INTERVAL_SECS"), 10)
            .context("CAMPWATCH_MIN_POLL_INTERVAL_SECS")?;
        let poll_backoff_step = parse_secs(get("POLL_BACKOFF_STEP_SECS"), 10)
            .context("CAMPWATCH_POLL_BACKOFF_STEP_SECS")?;
        let adhoc_scan_interval = parse_secs(get("ADHOC_SCAN_INTERVAL_SECS"), 20)
            .context("CAMPWATCH_ADHOC_SCAN_INTERVAL_SECS")?;

        let debounce_secs = match get("ADHOC_DEBOUNCE_SECS") {
            Some(raw) => raw
                .parse::<i64>()
                .context("CAMPWATCH_ADHOC_DEBOUNCE_SECS")?,
            None => 300,
        };
        let adhoc_debounce = chrono::Duration::seconds(debounce_secs);

        let summary_timezone = match get("SUMMARY_TIMEZONE") {
            Some(raw) => raw
                .parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("CAMPWATCH_SUMMARY_TIMEZONE: {e}"))?,
            None => chrono_tz::UTC,
        };

        let summary_local_hour = match get("SUMMARY_LOCAL_HOUR") {
            Some(raw) => raw.parse::<u32>().context("CAMPWATCH_SUMMARY_LOCAL_HOUR")?,
            None => 8,
        };
        if summary_local_hour > 23 {
            bail!("CAMPWATCH_SUMMARY_LOCAL_HOUR must be 0-23");
        }

        let summary_channel = get("SUMMARY_CHANNEL").unwrap_or_else(|| "operators".to_string());

        let providers: Vec<String> = get("PROVIDERS")
            .unwrap_or_else(|| "recgov,reservecalifornia".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if providers.is_empty() {
            bail!("CAMPWATCH_PROVIDERS lists no providers");
        }

        let notify_preexisting_changes = match get("NOTIFY_PREEXISTING_CHANGES") {
            Some(raw) => raw
                .parse::<bool>()
                .context("CAMPWATCH_NOTIFY_PREEXISTING_CHANGES")?,
            None => false,
        };

        Ok(Self {
            db_path,
            min_poll_interval,
            poll_backoff_step,
            adhoc_debounce,
            adhoc_scan_interval,
            summary_timezone,
            summary_local_hour,
            summary_channel,
            providers,
            notify_preexisting_changes,
        })
    }
}

fn parse_secs(raw: Option<String>, default: u64) -> Result<Duration> {
    let secs = match raw {
        Some(raw) => raw.parse::<u64>()?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}
