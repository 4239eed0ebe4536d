use std::time::Duration;
use log::{info, warn};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use crate::error::SyncError;

pub const BASE_URL: &str = "https://developer.nrel.gov/api/alt-fuel-stations/v1.json";

/// States requested from the API, in request order
pub const STATES: [&str; 51] = [
    "AK", "AL", "AR", "AZ", "CA", "CO", "CT", "DC", "DE", "FL", "GA", "HI", "IA", "ID", "IL", "IN",
    "KS", "KY", "LA", "MA", "MD", "ME", "MI", "MN", "MO", "MS", "MT", "NC", "ND", "NE", "NH", "NJ",
    "NM", "NV", "NY", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VA", "VT", "WA",
    "WI", "WV", "WY",
];

#[derive(Debug, Deserialize)]
struct FuelStationsResponse {
    fuel_stations: Vec<Value>,
}

/// Raw station records returned for one state
#[derive(Debug, Clone)]
pub struct StateRecords {
    pub state: String,
    pub records: Vec<Value>,
}

/// Client for the AFDC alternative fuel stations endpoint
#[derive(Debug, Clone)]
pub struct AfdcClient {
    http: reqwest::Client,
    base_url: String,
}

impl AfdcClient {
    /// Every request is bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Query predicates: electric stations of any status, optionally one state
    fn predicates<'a>(api_key: &'a str, state: Option<&'a str>, test: bool) -> Vec<(&'static str, &'a str)> {
        let mut predicates = vec![("api_key", api_key), ("status", "all"), ("fuel_type", "ELEC")];
        if test {
            predicates.push(("limit", "1"));
        }
        if let Some(state) = state {
            predicates.push(("state", state));
        }
        predicates
    }

    /// Check the key with a single-record request
    pub async fn test_api_key(&self, api_key: &str) -> Result<bool, SyncError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&Self::predicates(api_key, None, true))
            .send()
            .await?;
        Ok(response.status() == StatusCode::OK)
    }

    /// Fetch every electric station record of one state
    pub async fn fetch_state(&self, api_key: &str, state: &str) -> Result<Vec<Value>, SyncError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&Self::predicates(api_key, Some(state), false))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::ApiStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body: FuelStationsResponse = response.json().await?;
        Ok(body.fuel_stations)
    }

    /// Fetch all states in order
    ///
    /// A state that fails or returns no data is logged and skipped so the
    /// remaining states still load.
    pub async fn fetch_all(&self, api_key: &str) -> Vec<StateRecords> {
        info!("Performing API requests for {} states", STATES.len());
        let mut feed = Vec::with_capacity(STATES.len());

        for state in STATES {
            info!("Requesting data for {}", state);
            match self.fetch_state(api_key, state).await {
                Ok(records) => feed.push(StateRecords {
                    state: state.to_string(),
                    records,
                }),
                Err(SyncError::ApiStatus { status, body }) => {
                    warn!("State {} returned a bad status code {}: {}", state, status, body);
                }
                Err(e) => warn!("State {} returned no data: {}", state, e),
            }
        }

        feed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates_limit_to_one_record() {
        let predicates = AfdcClient::predicates("key", None, true);
        assert!(predicates.contains(&("limit", "1")));
        assert!(predicates.contains(&("fuel_type", "ELEC")));
        assert!(!predicates.iter().any(|(name, _)| *name == "state"));
    }

    #[test]
    fn state_predicates_have_no_limit() {
        let predicates = AfdcClient::predicates("key", Some("CA"), false);
        assert!(predicates.contains(&("state", "CA")));
        assert!(predicates.contains(&("status", "all")));
        assert!(!predicates.iter().any(|(name, _)| *name == "limit"));
    }

    #[test]
    fn states_include_dc_and_are_unique() {
        let mut states = STATES.to_vec();
        states.sort();
        states.dedup();
        assert_eq!(states.len(), 51);
        assert!(STATES.contains(&"DC"));
    }

    #[test]
    fn response_body_parses_fuel_stations() {
        let body: FuelStationsResponse =
            serde_json::from_str(r#"{"station_locator_url": "x", "total_results": 1, "fuel_stations": [{"id": 1}]}"#)
                .unwrap();
        assert_eq!(body.fuel_stations.len(), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_api_error() {
        let client = AfdcClient::new(Duration::from_secs(2))
            .unwrap()
            .with_base_url("http://127.0.0.1:1/v1.json");
        assert!(matches!(client.fetch_state("key", "CA").await, Err(SyncError::Api(_))));
    }
}
