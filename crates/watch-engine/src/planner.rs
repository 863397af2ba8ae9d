use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use model::Watch;
use model::day::{DateWindow, days_between};
use providers::Provider;

/// One campground's coalesced poll plan: the fewest adapter windows that
/// cover every night any of its watches cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampgroundPlan {
    /// Provider-scoped campground identifier
    pub campground_id: String,
    /// Query windows, in adapter order
    pub windows: Vec<DateWindow>,
}

/// Coalesce one provider's active watches into per-campground plans.
///
/// Watches are grouped by campground, the nights of each group's
/// `[checkin, checkout)` ranges are unioned, and the adapter buckets the
/// union into windows. Tie-breaking between equally valid bucket sets is
/// the adapter's business; the planner only guarantees every wanted night
/// ends up inside at least one window.
pub fn plan_provider_work(provider: &dyn Provider, watches: &[Watch]) -> Vec<CampgroundPlan> {
    let mut days_by_campground: BTreeMap<&str, BTreeSet<NaiveDate>> = BTreeMap::new();

    for watch in watches {
        if watch.provider != provider.name() {
            continue;
        }
        days_by_campground
            .entry(watch.campground_id.as_str())
            .or_default()
            .extend(days_between(watch.checkin, watch.checkout));
    }

    days_by_campground
        .into_iter()
        .filter(|(_, days)| !days.is_empty())
        .map(|(campground_id, days)| CampgroundPlan {
            campground_id: campground_id.to_string(),
            windows: provider.plan_buckets(&days),
        })
        .collect()
}
