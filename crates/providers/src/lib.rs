//! # Providers
//!
//! Adapters for the external campground-reservation systems campwatch
//! polls. Each adapter turns a `(campground, date window)` query into
//! availability observations and knows how to decompose a set of wanted
//! days into the minimum number of upstream calls its API shape allows.

/// The provider capability set and its error type
mod adapter;
pub use adapter::*;

/// Provider errors
mod error;
pub use error::*;

/// recreation.gov adapter (month-granular availability API)
mod recgov;
pub use recgov::*;

/// ReserveCalifornia adapter (UseDirect grid API)
mod reserve_ca;
pub use reserve_ca::*;

/// Name → adapter resolution
mod registry;
pub use registry::*;
