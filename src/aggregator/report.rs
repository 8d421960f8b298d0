//! Report types produced by [`NetworkMetricsAggregator::export_report`]
//!
//! Field names are serialized in camelCase and are consumed verbatim by
//! downstream renderers.
//!
//! [`NetworkMetricsAggregator::export_report`]: super::NetworkMetricsAggregator::export_report

use serde::{Deserialize, Serialize};
use std::ops::Deref;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkTotals {
    pub total_requests: u64,
    pub total_duration_ms: f64,
    pub avg_request_duration_ms: f64,
    pub total_failed_requests: u64,
}

/// A test that contributed to an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReference {
    pub title: String,
    pub file: String,
    pub total_duration_ms: f64,
    pub count: u64,
}

/// A spec file that contributed to an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecReference {
    pub file: String,
    pub total_duration_ms: f64,
    pub count: u64,
}

/// A concrete URL that contributed to a route group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlReference {
    pub url: String,
    pub total_duration_ms: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub count: u64,
    pub total_duration_ms: f64,
    pub avg_duration_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub error_count: u64,
    pub top_tests: Vec<TestReference>,
    pub top_specs: Vec<SpecReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteGroupEntry {
    #[serde(flatten)]
    pub entry: AggregatedEntry,
    pub top_urls: Vec<UrlReference>,
}

impl Deref for RouteGroupEntry {
    type Target = AggregatedEntry;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}

/// Per-spec rollup, present for `spec` and `run+spec` scopes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecSummary {
    pub file: String,
    pub total_duration_ms: f64,
    pub total_requests: u64,
}

/// Per-test rollup, present for `test` and `run+test` scopes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub file: String,
    pub title: String,
    pub total_duration_ms: f64,
    pub total_requests: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMetricsReport {
    pub totals: NetworkTotals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specs: Option<Vec<SpecSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<TestSummary>>,
    pub endpoints_normalized: Vec<AggregatedEntry>,
    pub endpoints_exact_with_query: Vec<AggregatedEntry>,
    pub route_groups: Vec<RouteGroupEntry>,
    pub resource_types: Vec<AggregatedEntry>,
}

impl NetworkMetricsReport {
    /// True when no request was aggregated
    pub fn is_empty(&self) -> bool {
        self.totals.total_requests == 0
    }
}
