use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use thiserror::Error;
use tracing::info;

use model::Watch;
use model::day::today_utc;
use providers::Provider;
use store::{Store, StoreError};

/// Failures the command layer relays back to users.
#[derive(Debug, Error)]
pub enum CommandError {
    /// `checkin` does not precede `checkout`
    #[error("check-out must come after check-in")]
    InvalidDateRange,

    /// The whole window is already in the past
    #[error("the requested window has already passed")]
    WindowInPast,

    /// No active adapter under that name
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// The catalogue has never seen this campground
    #[error("unknown campground {campground_id} for provider {provider}")]
    UnknownCampground {
        /// Provider storage key
        provider: String,
        /// The id that failed to resolve
        campground_id: String,
    },

    /// The watch exists but belongs to someone else
    #[error("watch is owned by another user")]
    NotOwner,

    /// No such watch
    #[error("watch not found")]
    WatchNotFound,

    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The watch-management command surface. The external command layer (a
/// chat bot in practice) calls these with an opaque user identifier; all
/// validation lives here.
pub struct WatchManager {
    store: Store,
    providers: HashMap<&'static str, Arc<dyn Provider>>,
    adhoc_debounce: Duration,
}

impl WatchManager {
    /// Build the manager over the active providers.
    pub fn new(store: Store, providers: Vec<Arc<dyn Provider>>, adhoc_debounce: Duration) -> Self {
        let providers = providers.into_iter().map(|p| (p.name(), p)).collect();
        Self {
            store,
            providers,
            adhoc_debounce,
        }
    }

    /// Create a watch. Rejects inverted windows, windows that already
    /// ended, unknown providers, and campgrounds the catalogue has never
    /// seen.
    pub async fn add_watch(
        &self,
        user_id: &str,
        provider: &str,
        campground_id: &str,
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> Result<Watch, CommandError> {
        if checkin >= checkout {
            return Err(CommandError::InvalidDateRange);
        }
        if checkout < today_utc() {
            return Err(CommandError::WindowInPast);
        }
        if !self.providers.contains_key(provider) {
            return Err(CommandError::UnknownProvider(provider.to_string()));
        }
        if !self.store.campground_known(provider, campground_id).await? {
            return Err(CommandError::UnknownCampground {
                provider: provider.to_string(),
                campground_id: campground_id.to_string(),
            });
        }

        let watch = self
            .store
            .create_watch(user_id, provider, campground_id, checkin, checkout, Utc::now())
            .await?;

        info!(
            watch_id = watch.id,
            user_id,
            provider,
            campground_id,
            %checkin,
            %checkout,
            "watch created"
        );

        Ok(watch)
    }

    /// Deactivate a watch, owner only.
    pub async fn remove_watch(
        &self,
        watch_id: i64,
        requesting_user_id: &str,
    ) -> Result<(), CommandError> {
        let watch = self
            .store
            .get_watch(watch_id)
            .await?
            .ok_or(CommandError::WatchNotFound)?;

        if watch.user_id != requesting_user_id {
            return Err(CommandError::NotOwner);
        }

        self.store.deactivate_watch(watch_id).await?;
        info!(watch_id, user_id = requesting_user_id, "watch removed");
        Ok(())
    }

    /// The caller's active watches.
    pub async fn list_watches(&self, user_id: &str) -> Result<Vec<Watch>, CommandError> {
        Ok(self.store.list_active_watches_for_user(user_id).await?)
    }

    /// Queue a one-off scrape of a campground, debounced against
    /// equivalent pending requests. Returns the request id and whether an
    /// existing request absorbed this one.
    pub async fn request_scrape(
        &self,
        provider: &str,
        campground_id: &str,
        user_id: &str,
    ) -> Result<(i64, bool), CommandError> {
        if !self.providers.contains_key(provider) {
            return Err(CommandError::UnknownProvider(provider.to_string()));
        }

        let (req_id, deduped) = self
            .store
            .enqueue_adhoc(provider, campground_id, user_id, self.adhoc_debounce, Utc::now())
            .await?;

        info!(req_id, deduped, provider, campground_id, user_id, "adhoc scrape requested");
        Ok((req_id, deduped))
    }

    /// Booking page for a campground, for the command layer to echo back.
    pub fn campground_url(&self, provider: &str, campground_id: &str) -> Option<String> {
        self.providers
            .get(provider)
            .map(|p| p.campground_url(campground_id))
    }

    /// Booking page for a campsite.
    pub fn campsite_url(
        &self,
        provider: &str,
        campground_id: &str,
        campsite_id: &str,
    ) -> Option<String> {
        self.providers
            .get(provider)
            .map(|p| p.campsite_url(campground_id, campsite_id))
    }
}
