use std::collections::BTreeSet;

use chrono::NaiveDate;

use model::Observation;
use model::day::DateWindow;

use crate::error::ProviderError;

/// The capability set every reservation provider exposes to the core.
///
/// Adapters are stateless beyond their HTTP client; one instance is shared
/// by the poller and the adhoc worker for its provider.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier used as the storage key for everything this
    /// provider produces.
    fn name(&self) -> &'static str;

    /// Decompose a sorted set of wanted days into the minimum sequence of
    /// query windows the provider's API granularity allows. Windows may
    /// cover more than the requested days but every requested day must be
    /// inside at least one window.
    fn plan_buckets(&self, days: &BTreeSet<NaiveDate>) -> Vec<DateWindow>;

    /// Fetch availability for one campground over one planned window.
    async fn fetch_availability(
        &self,
        campground_id: &str,
        window: DateWindow,
    ) -> Result<Vec<Observation>, ProviderError>;

    /// Human booking page for a campsite.
    fn campsite_url(&self, campground_id: &str, campsite_id: &str) -> String;

    /// Human booking page for a campground.
    fn campground_url(&self, campground_id: &str) -> String;
}

/// Shared plan for range-granular APIs: merge the wanted days into
/// contiguous runs, bridge gaps smaller than `gap_tolerance` nights into
/// the same call, and split any window longer than `max_nights`.
pub(crate) fn plan_contiguous_windows(
    days: &BTreeSet<NaiveDate>,
    gap_tolerance: i64,
    max_nights: i64,
) -> Vec<DateWindow> {
    let mut windows = Vec::new();
    // Runs are tracked as (start, exclusive end) so no day ever needs a
    // successor computed after the fact.
    let mut run: Option<(NaiveDate, NaiveDate)> = None;

    for &day in days {
        // A day with no successor cannot sit inside a half-open window;
        // it only shows up from a mis-encoded upstream date.
        let Some(day_end) = day.succ_opt() else {
            continue;
        };

        run = match run {
            Some((start, end)) => {
                let gap = (day - end).num_days() + 1;
                if gap <= gap_tolerance && (day - start).num_days() < max_nights {
                    Some((start, day_end))
                } else {
                    windows.push(DateWindow::new(start, end));
                    Some((day, day_end))
                }
            }
            None => Some((day, day_end)),
        };
    }

    if let Some((start, end)) = run {
        windows.push(DateWindow::new(start, end));
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn days(strs: &[&str]) -> BTreeSet<NaiveDate> {
        strs.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn contiguous_days_make_one_window() {
        let w = plan_contiguous_windows(&days(&["2025-06-01", "2025-06-02", "2025-06-03"]), 2, 30);
        assert_eq!(w, vec![DateWindow::new(d("2025-06-01"), d("2025-06-04"))]);
    }

    #[test]
    fn small_gaps_are_bridged_large_gaps_split() {
        let w = plan_contiguous_windows(&days(&["2025-06-01", "2025-06-03", "2025-06-20"]), 2, 30);
        assert_eq!(
            w,
            vec![
                DateWindow::new(d("2025-06-01"), d("2025-06-04")),
                DateWindow::new(d("2025-06-20"), d("2025-06-21")),
            ]
        );
    }

    #[test]
    fn long_runs_split_at_max_nights() {
        let all: BTreeSet<NaiveDate> =
            model::day::days_between(d("2025-06-01"), d("2025-07-15")).into_iter().collect();
        let w = plan_contiguous_windows(&all, 2, 30);
        assert!(w.len() >= 2);
        for win in &w {
            assert!(win.nights() <= 30);
        }
        // Every requested day is still covered.
        for day in &all {
            assert!(w.iter().any(|win| win.contains(*day)));
        }
    }

    #[test]
    fn empty_set_plans_nothing() {
        assert!(plan_contiguous_windows(&BTreeSet::new(), 2, 30).is_empty());
    }
}
