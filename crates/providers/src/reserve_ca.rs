use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use model::Observation;
use model::day::DateWindow;

use crate::adapter::{Provider, plan_contiguous_windows};
use crate::error::ProviderError;

const BASE_URL: &str = "https://calirdr.usedirect.com/rdr/rdr";

/// Nights of gap worth bridging into one grid call rather than paying for
/// a second request.
const GAP_TOLERANCE_NIGHTS: i64 = 3;
/// Longest grid the upstream answers reliably.
const MAX_WINDOW_NIGHTS: i64 = 30;

/// Adapter for ReserveCalifornia (UseDirect). The grid API takes an
/// arbitrary contiguous date range, so bucket planning merges wanted days
/// into runs instead of snapping to months.
pub struct ReserveCalifornia {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct GridRequest<'a> {
    #[serde(rename = "FacilityId")]
    facility_id: &'a str,
    #[serde(rename = "StartDate")]
    start_date: String,
    #[serde(rename = "EndDate")]
    end_date: String,
    #[serde(rename = "InSeasonOnly")]
    in_season_only: bool,
}

/// Response from the grid search endpoint.
#[derive(Debug, Deserialize)]
pub struct GridResponse {
    #[serde(rename = "Facility")]
    /// The queried facility with its units
    pub facility: GridFacility,
}

/// Facility slice of a grid response.
#[derive(Debug, Deserialize)]
pub struct GridFacility {
    #[serde(rename = "Units")]
    /// Per-unit night grids, keyed by unit id; absent when the facility
    /// has nothing bookable in the range
    pub units: Option<HashMap<String, GridUnit>>,
}

/// One bookable unit's night grid.
#[derive(Debug, Deserialize)]
pub struct GridUnit {
    #[serde(rename = "Slices")]
    /// Per-night slices keyed by a timestamp string
    pub slices: HashMap<String, GridSlice>,
}

/// One night of one unit.
#[derive(Debug, Deserialize)]
pub struct GridSlice {
    #[serde(rename = "Date")]
    /// The night
    pub date: NaiveDate,
    #[serde(rename = "IsFree")]
    /// Whether the night is bookable
    pub is_free: bool,
}

impl ReserveCalifornia {
    /// Stable storage key for this adapter.
    pub const NAME: &'static str = "reservecalifornia";

    /// Build the adapter with its own HTTP client.
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Provider for ReserveCalifornia {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn plan_buckets(&self, days: &BTreeSet<NaiveDate>) -> Vec<DateWindow> {
        plan_contiguous_windows(days, GAP_TOLERANCE_NIGHTS, MAX_WINDOW_NIGHTS)
    }

    async fn fetch_availability(
        &self,
        campground_id: &str,
        window: DateWindow,
    ) -> Result<Vec<Observation>, ProviderError> {
        let url = format!("{}/search/grid", self.base_url);
        // The grid takes an inclusive end date.
        let last_night = window.end.pred_opt().unwrap_or(window.start);
        let body = GridRequest {
            facility_id: campground_id,
            start_date: window.start.format("%Y-%m-%d").to_string(),
            end_date: last_night.format("%Y-%m-%d").to_string(),
            in_season_only: false,
        };

        debug!(campground_id, %window, "fetching reservecalifornia grid");

        let response = self.client.post(&url).json(&body).send().await?;

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

        let grid: GridResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(grid_observations(grid, window))
    }

    fn campsite_url(&self, campground_id: &str, campsite_id: &str) -> String {
        format!(
            "https://www.reservecalifornia.com/Web/Default.aspx#!park/{}/{}",
            urlencoding::encode(campground_id),
            urlencoding::encode(campsite_id)
        )
    }

    fn campground_url(&self, campground_id: &str) -> String {
        format!(
            "https://www.reservecalifornia.com/Web/Default.aspx#!park/{}",
            urlencoding::encode(campground_id)
        )
    }
}

/// Flatten a grid response into observations inside `window`.
fn grid_observations(grid: GridResponse, window: DateWindow) -> Vec<Observation> {
    let mut observations = Vec::new();

    let Some(units) = grid.facility.units else {
        return observations;
    };

    for (unit_id, unit) in units {
        for slice in unit.slices.into_values() {
            if !window.contains(slice.date) {
                continue;
            }
            observations.push(Observation {
                campsite_id: unit_id.clone(),
                date: slice.date,
                available: slice.is_free,
            });
        }
    }

    observations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn nearby_watches_share_one_grid_call() {
        let adapter = ReserveCalifornia::new().unwrap();
        let days: BTreeSet<NaiveDate> = ["2025-06-01", "2025-06-02", "2025-06-05"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let buckets = adapter.plan_buckets(&days);
        assert_eq!(buckets, vec![DateWindow::new(d("2025-06-01"), d("2025-06-06"))]);
    }

    #[test]
    fn grid_response_flattens_to_observations() {
        let raw = serde_json::json!({
            "Facility": {
                "Units": {
                    "5001": {
                        "Slices": {
                            "2025-06-01T00:00:00": { "Date": "2025-06-01", "IsFree": true },
                            "2025-06-02T00:00:00": { "Date": "2025-06-02", "IsFree": false },
                            "2025-06-09T00:00:00": { "Date": "2025-06-09", "IsFree": true }
                        }
                    }
                }
            }
        });
        let grid: GridResponse = serde_json::from_value(raw).unwrap();
        let window = DateWindow::new(d("2025-06-01"), d("2025-06-03"));
        let mut obs = grid_observations(grid, window);
        obs.sort_by_key(|o| o.date);

        assert_eq!(obs.len(), 2, "june 9 is outside the window");
        assert!(obs[0].available);
        assert!(!obs[1].available);
        assert_eq!(obs[0].campsite_id, "5001");
    }

    #[test]
    fn empty_facility_is_a_successful_zero_observation_call() {
        let raw = serde_json::json!({ "Facility": {} });
        let grid: GridResponse = serde_json::from_value(raw).unwrap();
        let obs = grid_observations(grid, DateWindow::new(d("2025-06-01"), d("2025-06-03")));
        assert!(obs.is_empty());
    }
}
