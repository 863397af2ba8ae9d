use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use model::Observation;
use model::day::DateWindow;

use crate::adapter::Provider;
use crate::error::ProviderError;

const BASE_URL: &str = "https://www.recreation.gov/api";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Adapter for recreation.gov. The availability API is month-granular:
/// one call returns every campsite's per-day status for one calendar
/// month, so bucket planning emits one window per month touched.
pub struct RecGov {
    client: Client,
    base_url: String,
}

/// Response from the month availability endpoint.
#[derive(Debug, Deserialize)]
pub struct RecGovMonthResponse {
    /// Per-campsite availability, keyed by campsite id
    pub campsites: HashMap<String, RecGovCampsite>,
}

/// One campsite's slice of a month response.
#[derive(Debug, Deserialize)]
pub struct RecGovCampsite {
    /// Date string → status string ("Available", "Reserved", ...)
    pub availabilities: HashMap<String, String>,
    #[serde(rename = "campsite_type")]
    /// Site type as reported upstream
    pub campsite_type: Option<String>,
    #[serde(rename = "loop")]
    /// Loop the site belongs to
    pub campsite_loop: Option<String>,
}

impl RecGov {
    /// Stable storage key for this adapter.
    pub const NAME: &'static str = "recgov";

    /// Build the adapter with its own HTTP client.
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
        })
    }

    fn month_start(window: DateWindow) -> NaiveDate {
        NaiveDate::from_ymd_opt(window.start.year(), window.start.month(), 1)
            .unwrap_or(window.start)
    }
}

#[async_trait::async_trait]
impl Provider for RecGov {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn plan_buckets(&self, days: &BTreeSet<NaiveDate>) -> Vec<DateWindow> {
        let mut months: BTreeSet<(i32, u32)> = BTreeSet::new();
        for day in days {
            months.insert((day.year(), day.month()));
        }

        months
            .into_iter()
            .filter_map(|(year, month)| {
                let start = NaiveDate::from_ymd_opt(year, month, 1)?;
                let end = if month == 12 {
                    NaiveDate::from_ymd_opt(year + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(year, month + 1, 1)?
                };
                Some(DateWindow::new(start, end))
            })
            .collect()
    }

    async fn fetch_availability(
        &self,
        campground_id: &str,
        window: DateWindow,
    ) -> Result<Vec<Observation>, ProviderError> {
        let url = format!(
            "{}/camps/availability/campground/{}/month",
            self.base_url,
            urlencoding::encode(campground_id)
        );
        let start_date = format!("{}T00:00:00.000Z", Self::month_start(window).format("%Y-%m-%d"));

        debug!(campground_id, %window, "fetching recgov month availability");

        let response = self
            .client
            .get(&url)
            .query(&[("start_date", start_date.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 => ProviderError::RateLimited,
                code => ProviderError::Status {
                    status: code,
                    body: body.chars().take(200).collect(),
                },
            });
        }

        let month: RecGovMonthResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(month_observations(month, window))
    }

    fn campsite_url(&self, _campground_id: &str, campsite_id: &str) -> String {
        format!(
            "https://www.recreation.gov/camping/campsites/{}",
            urlencoding::encode(campsite_id)
        )
    }

    fn campground_url(&self, campground_id: &str) -> String {
        format!(
            "https://www.recreation.gov/camping/campgrounds/{}",
            urlencoding::encode(campground_id)
        )
    }
}

/// Flatten a month response into observations inside `window`.
fn month_observations(month: RecGovMonthResponse, window: DateWindow) -> Vec<Observation> {
    let mut observations = Vec::new();

    for (campsite_id, campsite) in month.campsites {
        for (date_str, status) in &campsite.availabilities {
            // Dates come back as "2025-06-01T00:00:00Z".
            let Some(day_part) = date_str.get(..10) else {
                warn!(date_str, "short availability date");
                continue;
            };
            let date = match NaiveDate::parse_from_str(day_part, "%Y-%m-%d") {
                Ok(date) => date,
                Err(_) => {
                    warn!(date_str, "unparseable availability date");
                    continue;
                }
            };

            if !window.contains(date) {
                continue;
            }

            observations.push(Observation {
                campsite_id: campsite_id.clone(),
                date,
                available: parse_status(status),
            });
        }
    }

    observations
}

/// Map an upstream status string to bookability.
fn parse_status(status: &str) -> bool {
    match status {
        "Available" => true,
        "Reserved" | "Not Available" | "Not Reservable" | "Walk-up" => false,
        // Price strings mean the night is open at that rate.
        s if s.starts_with('$') => true,
        other => {
            debug!(status = other, "unknown availability status");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn days(strs: &[&str]) -> BTreeSet<NaiveDate> {
        strs.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn buckets_are_one_per_calendar_month() {
        let adapter = RecGov::new().unwrap();
        let buckets = adapter.plan_buckets(&days(&["2025-06-02", "2025-06-28", "2025-07-01"]));
        assert_eq!(
            buckets,
            vec![
                DateWindow::new(d("2025-06-01"), d("2025-07-01")),
                DateWindow::new(d("2025-07-01"), d("2025-08-01")),
            ]
        );
    }

    #[test]
    fn december_bucket_crosses_the_year() {
        let adapter = RecGov::new().unwrap();
        let buckets = adapter.plan_buckets(&days(&["2025-12-30"]));
        assert_eq!(buckets, vec![DateWindow::new(d("2025-12-01"), d("2026-01-01"))]);
    }

    #[test]
    fn status_strings_map_to_bookability() {
        assert!(parse_status("Available"));
        assert!(parse_status("$35.00"));
        assert!(!parse_status("Reserved"));
        assert!(!parse_status("Not Available"));
        assert!(!parse_status("Not Reservable"));
        assert!(!parse_status("Walk-up"));
        assert!(!parse_status("something else"));
    }

    #[test]
    fn month_response_flattens_to_observations() {
        let raw = serde_json::json!({
            "campsites": {
                "100": {
                    "availabilities": {
                        "2025-06-01T00:00:00Z": "Available",
                        "2025-06-02T00:00:00Z": "Reserved",
                        "2025-07-01T00:00:00Z": "Available"
                    },
                    "campsite_type": "STANDARD NONELECTRIC",
                    "loop": "A"
                }
            }
        });
        let month: RecGovMonthResponse = serde_json::from_value(raw).unwrap();
        let window = DateWindow::new(d("2025-06-01"), d("2025-07-01"));
        let mut obs = month_observations(month, window);
        obs.sort_by_key(|o| o.date);

        assert_eq!(obs.len(), 2, "july date is outside the window");
        assert_eq!(obs[0].date, d("2025-06-01"));
        assert!(obs[0].available);
        assert_eq!(obs[1].date, d("2025-06-02"));
        assert!(!obs[1].available);
    }

    #[test]
    fn urls_point_at_booking_pages() {
        let adapter = RecGov::new().unwrap();
        assert_eq!(
            adapter.campground_url("232447"),
            "https://www.recreation.gov/camping/campgrounds/232447"
        );
        assert_eq!(
            adapter.campsite_url("232447", "100"),
            "https://www.recreation.gov/camping/campsites/100"
        );
    }
}
