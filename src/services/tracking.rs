//! Client for the courier-tracking provider.
//!
//! `GET {base}/carriers/{carrier}/tracks/{tracking_number}` returns the
//! shipment's current `state` plus a `progresses` history.

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use crate::errors::ServiceError;

const DELIVERED: &str = "delivered";

/// One physical shipment: carrier plus tracking number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackingKey {
    pub courier_code: String,
    pub tracking_number: String,
}

impl TrackingKey {
    pub fn new(courier_code: impl Into<String>, tracking_number: impl Into<String>) -> Self {
        Self {
            courier_code: courier_code.into(),
            tracking_number: tracking_number.into(),
        }
    }
}

impl fmt::Display for TrackingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.courier_code, self.tracking_number)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackStatus {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackProgress {
    #[serde(default)]
    pub status: Option<TrackStatus>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingResponse {
    #[serde(default)]
    pub state: Option<TrackStatus>,
    #[serde(default)]
    pub progresses: Vec<TrackProgress>,
}

impl TrackingResponse {
    /// Delivered when the top-level state says so, or when any progress
    /// entry does. Providers disagree on which field is authoritative.
    pub fn is_delivered(&self) -> bool {
        let state_delivered = self
            .state
            .as_ref()
            .and_then(|s| s.id.as_deref())
            .is_some_and(is_delivered_id);

        state_delivered
            || self.progresses.iter().any(|p| {
                p.status
                    .as_ref()
                    .and_then(|s| s.id.as_deref())
                    .is_some_and(is_delivered_id)
            })
    }
}

fn is_delivered_id(id: &str) -> bool {
    id.trim().eq_ignore_ascii_case(DELIVERED)
}

/// Anything that can report a shipment's delivery state.
#[async_trait]
pub trait TrackingProvider: Send + Sync {
    async fn track(&self, key: &TrackingKey) -> Result<TrackingResponse, ServiceError>;
}

/// `reqwest` implementation against the HTTP provider.
#[derive(Clone)]
pub struct HttpTrackingProvider {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpTrackingProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            ServiceError::ValidationError(format!("invalid provider url {}: {}", base_url, e))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn track_url(&self, key: &TrackingKey) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ServiceError::ValidationError(format!(
                    "provider url {} cannot take a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["carriers", &key.courier_code, "tracks", &key.tracking_number]);
        Ok(url)
    }
}

#[async_trait]
impl TrackingProvider for HttpTrackingProvider {
    #[instrument(skip(self), fields(shipment = %key))]
    async fn track(&self, key: &TrackingKey) -> Result<TrackingResponse, ServiceError> {
        let url = self.track_url(key)?;
        let started = Instant::now();

        let mut request = self.client.get(url);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            counter!("fulfillment_provider_failures_total", 1, "reason" => "transport");
            ServiceError::UpstreamError(format!("tracking {}: {}", key, e))
        })?;
        histogram!("fulfillment_provider_call_duration", started.elapsed());

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            counter!("fulfillment_provider_failures_total", 1, "reason" => "not_found");
            return Err(ServiceError::UpstreamError(format!(
                "tracking {}: unknown shipment",
                key
            )));
        }
        if !status.is_success() {
            counter!("fulfillment_provider_failures_total", 1, "reason" => "status");
            return Err(ServiceError::UpstreamError(format!(
                "tracking {}: provider returned {}",
                key, status
            )));
        }

        let body = response.json::<TrackingResponse>().await.map_err(|e| {
            counter!("fulfillment_provider_failures_total", 1, "reason" => "decode");
            ServiceError::UpstreamError(format!("tracking {}: bad payload: {}", key, e))
        })?;
        debug!(delivered = body.is_delivered(), "tracking fetched");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload(state: Option<&str>, progresses: &[&str]) -> TrackingResponse {
        serde_json::from_value(json!({
            "state": state.map(|id| json!({ "id": id, "text": id })),
            "progresses": progresses
                .iter()
                .map(|id| json!({ "status": { "id": id }, "time": "2024-03-01T10:00:00+09:00" }))
                .collect::<Vec<_>>(),
        }))
        .unwrap()
    }

    #[rstest]
    #[case(Some("delivered"), &[], true)]
    #[case(Some("in_transit"), &["at_pickup", "delivered"], true)]
    #[case(Some("delivered"), &["at_pickup", "in_transit"], true)]
    #[case(Some("in_transit"), &["at_pickup", "in_transit"], false)]
    #[case(None, &[], false)]
    #[case(None, &["DELIVERED"], true)]
    fn delivered_is_state_or_any_progress(
        #[case] state: Option<&str>,
        #[case] progresses: &[&str],
        #[case] expected: bool,
    ) {
        assert_eq!(payload(state, progresses).is_delivered(), expected);
    }

    #[test]
    fn tolerates_missing_fields() {
        let body: TrackingResponse = serde_json::from_value(json!({})).unwrap();
        assert!(!body.is_delivered());
        let body: TrackingResponse =
            serde_json::from_value(json!({ "progresses": [{ "description": "scanned" }] })).unwrap();
        assert!(!body.is_delivered());
    }

    #[tokio::test]
    async fn fetches_and_classifies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/carriers/kr.cjlogistics/tracks/111"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "state": { "id": "delivered", "text": "Delivered" },
                "progresses": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider =
            HttpTrackingProvider::new(&server.uri(), Some("secret".into()), Duration::from_secs(5))
                .unwrap();
        let body = provider
            .track(&TrackingKey::new("kr.cjlogistics", "111"))
            .await
            .unwrap();
        assert!(body.is_delivered());
    }

    #[tokio::test]
    async fn server_errors_are_upstream_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = HttpTrackingProvider::new(&server.uri(), None, Duration::from_secs(5)).unwrap();
        let result = provider.track(&TrackingKey::new("kr.epost", "222")).await;
        assert_matches!(result, Err(ServiceError::UpstreamError(_)));
    }

    #[tokio::test]
    async fn slow_provider_hits_client_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "state": { "id": "delivered" } }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let provider =
            HttpTrackingProvider::new(&server.uri(), None, Duration::from_millis(200)).unwrap();
        let result = provider.track(&TrackingKey::new("kr.cjlogistics", "333")).await;
        assert_matches!(result, Err(ServiceError::UpstreamError(_)));
    }

    #[test]
    fn builds_url_under_base_path() {
        let provider = HttpTrackingProvider::new(
            "https://tracker.example.com/api/v1/",
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        let url = provider
            .track_url(&TrackingKey::new("kr.cjlogistics", "111"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://tracker.example.com/api/v1/carriers/kr.cjlogistics/tracks/111"
        );
    }
}
