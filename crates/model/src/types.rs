use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A user's standing interest in a `(provider, campground, date range)`
/// tuple. Only active watches drive polling.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Watch {
    /// Unique identifier for the watch
    pub id: i64,
    /// Opaque user identifier supplied by the command layer
    pub user_id: String,
    /// Provider storage key (e.g. "recgov")
    pub provider: String,
    /// Provider-scoped campground identifier
    pub campground_id: String,
    /// Check-in day (UTC, inclusive)
    pub checkin: NaiveDate,
    /// Check-out day (UTC, exclusive)
    pub checkout: NaiveDate,
    /// When the watch was created
    pub created_at: DateTime<Utc>,
    /// Whether the watch still drives polling
    pub active: bool,
}

impl Watch {
    /// Whether a night falls inside the watch's `[checkin, checkout)` window.
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.checkin <= day && day < self.checkout
    }

    /// Number of nights the watch spans.
    pub fn nights(&self) -> i64 {
        (self.checkout - self.checkin).num_days()
    }
}

/// A single `(campsite, date, available)` datum returned by one adapter
/// call. The provider and campground are carried by the surrounding call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Provider-scoped campsite identifier
    pub campsite_id: String,
    /// The night observed
    pub date: NaiveDate,
    /// Whether the site can currently be booked for that night
    pub available: bool,
}

/// The latest persisted availability for one `(campsite, date)`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CurrentAvailability {
    /// Provider storage key
    pub provider: String,
    /// Provider-scoped campground identifier
    pub campground_id: String,
    /// Provider-scoped campsite identifier
    pub campsite_id: String,
    /// The night this row describes
    pub date: NaiveDate,
    /// Latest observed bookability
    pub available: bool,
    /// When the row was last overwritten by an observation
    pub last_checked: DateTime<Utc>,
}

/// A recorded availability transition for a `(campsite, date)`.
/// Append-only; the notification log references rows by id.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StateChange {
    /// Unique identifier for the change
    pub id: i64,
    /// Provider storage key
    pub provider: String,
    /// Provider-scoped campground identifier
    pub campground_id: String,
    /// Provider-scoped campsite identifier
    pub campsite_id: String,
    /// The night whose availability flipped
    pub date: NaiveDate,
    /// The availability the site transitioned to
    pub new_available: bool,
    /// When the transition was recorded
    pub changed_at: DateTime<Utc>,
}

/// Audit row for one adapter call attempt, success or failure.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LookupRecord {
    /// Provider storage key
    pub provider: String,
    /// Provider-scoped campground identifier
    pub campground_id: String,
    /// First day of the requested window
    pub start: NaiveDate,
    /// First day past the requested window
    pub end: NaiveDate,
    /// When the call was attempted
    pub checked_at: DateTime<Utc>,
    /// Whether the call returned observations
    pub success: bool,
    /// Error text for failed calls
    pub error: Option<String>,
    /// Number of observations the call produced
    pub observation_count: i64,
}

/// The availability state a notification reports for a site/night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteState {
    /// The night opened up
    Available,
    /// The night was booked out
    Unavailable,
}

impl SiteState {
    /// Storage key for the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteState::Available => "available",
            SiteState::Unavailable => "unavailable",
        }
    }
}

impl From<bool> for SiteState {
    fn from(available: bool) -> Self {
        if available {
            SiteState::Available
        } else {
            SiteState::Unavailable
        }
    }
}

/// One delivered (or recorded-as-delivered) notification row. The
/// `(watch_id, state_change_id)` pair is unique; a `batch_id` groups the
/// rows written by one dispatcher pass.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NotificationRow {
    /// Unique identifier for the notification
    pub id: i64,
    /// Dispatcher pass this row was written in
    pub batch_id: String,
    /// Watch the change was attributed to
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
    /// State reported to the user ("available" / "unavailable")
    pub state: String,
    /// The state change this notification covers
    pub state_change_id: i64,
    /// When the dispatcher pass ran
    pub sent_at: DateTime<Utc>,
}

/// Lifecycle of a user-driven one-off scrape request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdhocStatus {
    /// Waiting for the adhoc worker
    Pending,
    /// Scrape ran and its observations were ingested
    Completed,
    /// Adapter call failed; error captured on the row
    Failed,
}

impl AdhocStatus {
    /// Storage key for the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdhocStatus::Pending => "pending",
            AdhocStatus::Completed => "completed",
            AdhocStatus::Failed => "failed",
        }
    }

    /// Parse a storage key back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AdhocStatus::Pending),
            "completed" => Some(AdhocStatus::Completed),
            "failed" => Some(AdhocStatus::Failed),
            _ => None,
        }
    }
}

/// A queued one-off scrape of a `(provider, campground)`.
#[derive(Debug, Clone, Serialize)]
pub struct AdhocRequest {
    /// Unique identifier for the request
    pub id: i64,
    /// Provider storage key
    pub provider: String,
    /// Provider-scoped campground identifier
    pub campground_id: String,
    /// User who asked for the scrape
    pub user_id: String,
    /// When the request was enqueued
    pub requested_at: DateTime<Utc>,
    /// Current lifecycle state
    pub status: AdhocStatus,
    /// When the worker finished with the request
    pub completed_at: Option<DateTime<Utc>>,
    /// Error text for failed requests
    pub error: Option<String>,
}

/// A `(campsite, night)` pair, the unit the deltas and context sets in a
/// change report are made of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SiteDate {
    /// Provider-scoped campsite identifier
    pub campsite_id: String,
    /// The night
    pub date: NaiveDate,
}

/// What one watch owner is told after a dispatcher pass: the full current
/// picture for their window plus the two delta sets that triggered it.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeReport {
    /// The watch the report is for
    pub watch: Watch,
    /// Every night currently bookable inside the watch window
    pub current_available: Vec<SiteDate>,
    /// Nights that just opened up
    pub newly_available: Vec<SiteDate>,
    /// Nights that were just booked out
    pub newly_booked: Vec<SiteDate>,
}
