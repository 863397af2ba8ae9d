//! # Watch engine
//!
//! The polling, reconciliation, and notification pipeline: coalesce active
//! watches into the fewest upstream calls, ingest the observations through
//! the store's change detector, attribute the resulting transitions back to
//! the watches they affect, and hand per-watch change reports to the
//! delivery sink. Also home to the adhoc scrape worker, the daily operator
//! summary, and the watch-management command surface.

/// Engine errors
mod error;
pub use error::*;

/// Delivery-sink capability set and the shipped sinks
mod notify;
pub use notify::*;

/// Watch coalescing into per-campground work plans
mod planner;
pub use planner::*;

/// Per-provider polling loop with adaptive backoff
mod poller;
pub use poller::*;

/// Change attribution and notification batches
mod dispatcher;
pub use dispatcher::*;

/// Adhoc scrape queue worker
mod adhoc;
pub use adhoc::*;

/// Daily operator summary task
mod summary;
pub use summary::*;

/// Watch-management command surface
mod manager;
pub use manager::*;
