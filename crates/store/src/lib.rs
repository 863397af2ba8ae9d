//! # Store
//!
//! Durable state for campwatch, backed by a single SQLite file. The store
//! exclusively owns persistence of watches, current availability, the
//! state-change log, the lookup log, the notification log, the adhoc
//! scrape queue, and the campground catalogue; every other component goes
//! through its typed operations.
//!
//! The change detector lives here: [`Store::upsert_observations_and_detect`]
//! compares each incoming observation to the latest persisted state and
//! appends state-change rows in the same transaction that overwrites the
//! current rows, so the pair stays consistent under any crash.

/// Store errors
mod error;
pub use error::*;

/// Schema bootstrap
mod schema;

/// Store handle, open paths, watch and catalogue operations
mod store;
pub use store::*;

/// Observation ingestion, change detection, lookup log, summary counters
mod availability;
pub use availability::*;

/// Change attribution and the notification log
mod notifications;
pub use notifications::*;

/// Adhoc scrape queue
mod adhoc;
