//! Request events consumed by the aggregation engine

use serde::{Deserialize, Serialize};

/// One completed or failed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEvent {
    /// Origin and path, without the query string
    pub url: String,
    /// Full URL including the (already redacted) query string
    pub url_with_query: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default)]
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
    pub resource_type: String,
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_title: Option<String>,
    /// Precomputed route group; derived by the engine when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_group: Option<String>,
    /// Request start time in epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl RequestEvent {
    /// Create a successful event with no attribution
    pub fn new(
        method: impl Into<String>,
        url_with_query: impl Into<String>,
        resource_type: impl Into<String>,
        duration_ms: f64,
    ) -> Self {
        let url_with_query = url_with_query.into();
        Self {
            url: crate::urls::strip_query(&url_with_query),
            url_with_query,
            method: method.into(),
            status: Some(200),
            failed: false,
            error_text: None,
            resource_type: resource_type.into(),
            duration_ms,
            spec_file: None,
            test_title: None,
            route_group: None,
            timestamp: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self.failed = !(200..300).contains(&status);
        self
    }

    pub fn with_failure(mut self, error_text: impl Into<String>) -> Self {
        self.failed = true;
        self.status = None;
        self.error_text = Some(error_text.into());
        self
    }

    pub fn with_test(
        mut self,
        spec_file: impl Into<String>,
        test_title: impl Into<String>,
    ) -> Self {
        self.spec_file = Some(spec_file.into());
        self.test_title = Some(test_title.into());
        self
    }

    pub fn with_spec(mut self, spec_file: impl Into<String>) -> Self {
        self.spec_file = Some(spec_file.into());
        self
    }

    pub fn with_route_group(mut self, group: impl Into<String>) -> Self {
        self.route_group = Some(group.into());
        self
    }

    /// Durations must be finite and non-negative to be aggregated
    pub fn has_valid_duration(&self) -> bool {
        self.duration_ms.is_finite() && self.duration_ms >= 0.0
    }
}

/// Per-worker persistence envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub events: Vec<RequestEvent>,
}

impl EventEnvelope {
    pub fn new(events: Vec<RequestEvent>) -> Self {
        Self { events }
    }
}
