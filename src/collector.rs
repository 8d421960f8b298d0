//! Per-worker collection of raw request observations
//!
//! A collector turns what a browser driver reports about a request into a
//! [`RequestEvent`], feeds it into its own aggregator, and at the end of the
//! worker's run hands the event log and report to an [`EventStore`].

use crate::aggregator::{NetworkMetricsAggregator, NetworkMetricsReport};
use crate::config::NetworkMetricsConfig;
use crate::error::Result;
use crate::events::RequestEvent;
use crate::storage::EventStore;
use crate::urls::{redact, strip_query};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Resource timing in milliseconds relative to the request start; negative
/// values mean the browser did not measure that phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestTiming {
    /// Epoch milliseconds at which the request started
    pub start_time: f64,
    pub response_start: f64,
    pub response_end: f64,
}

impl RequestTiming {
    pub fn new(start_time: f64, response_start: f64, response_end: f64) -> Self {
        Self {
            start_time,
            response_start,
            response_end,
        }
    }

    /// Body download time, or `None` when either bound was not measured
    pub fn duration_ms(&self) -> Option<f64> {
        if self.response_start >= 0.0 && self.response_end >= 0.0 {
            let duration = self.response_end - self.response_start;
            (duration >= 0.0).then_some(duration)
        } else {
            None
        }
    }
}

/// What the driver knows about one finished or failed request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestObservation {
    pub url: String,
    pub method: String,
    pub resource_type: String,
    pub status: Option<u16>,
    pub failure_text: Option<String>,
    pub timing: RequestTiming,
    pub spec_file: Option<String>,
    pub test_title: Option<String>,
}

impl RequestObservation {
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        resource_type: impl Into<String>,
        timing: RequestTiming,
    ) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            resource_type: resource_type.into(),
            status: None,
            failure_text: None,
            timing,
            spec_file: None,
            test_title: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_failure(mut self, text: impl Into<String>) -> Self {
        self.failure_text = Some(text.into());
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

    fn is_failure(&self) -> bool {
        self.failure_text.is_some()
            || !matches!(self.status, Some(status) if (200..300).contains(&status))
    }
}

pub struct NetworkMetricsCollector {
    aggregator: NetworkMetricsAggregator,
}

impl NetworkMetricsCollector {
    pub fn new(config: NetworkMetricsConfig) -> Self {
        Self {
            aggregator: NetworkMetricsAggregator::new(config),
        }
    }

    /// Convert and record one observation.
    ///
    /// Returns `false` when the request had no measurable duration or the
    /// aggregator filtered it out.
    pub fn observe(&mut self, observation: RequestObservation) -> bool {
        let Some(duration_ms) = observation.timing.duration_ms() else {
            warn!(
                "Invalid duration for request {} {}, skipping",
                observation.method, observation.url
            );
            return false;
        };

        let failed = observation.is_failure();
        let url_with_query = redact(&observation.url, self.aggregator.config());
        let event = RequestEvent {
            url: strip_query(&url_with_query),
            url_with_query,
            method: observation.method,
            status: observation.status,
            failed,
            error_text: observation.failure_text,
            resource_type: observation.resource_type,
            duration_ms,
            spec_file: observation.spec_file,
            test_title: observation.test_title,
            route_group: None,
            timestamp: Some(observation.timing.start_time),
        };

        self.aggregator.record(event)
    }

    pub fn aggregator(&self) -> &NetworkMetricsAggregator {
        &self.aggregator
    }

    pub fn events(&self) -> Vec<RequestEvent> {
        self.aggregator.export_events()
    }

    pub fn report(&self) -> NetworkMetricsReport {
        self.aggregator.export_report()
    }

    /// Persist the event log and the worker-local report.
    ///
    /// Returns the paths of the events file and the report file.
    pub fn finish(self, store: &EventStore, worker_id: &str) -> Result<(PathBuf, PathBuf)> {
        let events_path = store.write_events(worker_id, &self.events())?;
        let report_path = store.write_report(worker_id, &self.report())?;
        debug!(
            "Worker {} finished with {} recorded requests",
            worker_id,
            self.aggregator.len()
        );
        Ok((events_path, report_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn observation(url: &str, start: f64, end: f64) -> RequestObservation {
        let timing = RequestTiming::new(1_700_000_000_000.0, start, end);
        RequestObservation::new("GET", url, "fetch", timing).with_status(200)
    }

    #[test]
    fn test_duration_from_timing() {
        assert_eq!(RequestTiming::new(0.0, 50.0, 100.0).duration_ms(), Some(50.0));
        assert_eq!(RequestTiming::new(0.0, -1.0, 100.0).duration_ms(), None);
        assert_eq!(RequestTiming::new(0.0, 50.0, -1.0).duration_ms(), None);
        assert_eq!(RequestTiming::new(0.0, 100.0, 50.0).duration_ms(), None);
    }

    #[test]
    fn test_observe_records_event() {
        let mut collector = NetworkMetricsCollector::new(NetworkMetricsConfig::default());
        assert!(collector.observe(
            observation("https://example.com/api/users?page=1", 50.0, 100.0)
                .with_test("users.spec.ts", "lists users")
        ));

        let events = collector.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.url, "https://example.com/api/users");
        assert_eq!(event.url_with_query, "https://example.com/api/users?page=1");
        assert_eq!(event.duration_ms, 50.0);
        assert_eq!(event.timestamp, Some(1_700_000_000_000.0));
        assert_eq!(event.test_title.as_deref(), Some("lists users"));
        assert!(!event.failed);
    }

    #[test]
    fn test_unmeasured_timing_dropped() {
        let mut collector = NetworkMetricsCollector::new(NetworkMetricsConfig::default());
        assert!(!collector.observe(observation("https://example.com/cached.js", -1.0, -1.0)));
        assert!(collector.events().is_empty());
        assert!(collector.report().is_empty());
    }

    #[test]
    fn test_failure_classification() {
        let mut collector = NetworkMetricsCollector::new(NetworkMetricsConfig::default());
        collector.observe(observation("https://example.com/a", 0.0, 1.0).with_status(503));
        collector.observe(RequestObservation::new(
            "GET",
            "https://example.com/b",
            "fetch",
            RequestTiming::new(0.0, 0.0, 1.0),
        ));
        collector.observe(
            observation("https://example.com/c", 0.0, 1.0).with_failure("net::ERR_ABORTED"),
        );
        collector.observe(observation("https://example.com/d", 0.0, 1.0).with_status(204));

        let failed: Vec<bool> = collector.events().iter().map(|e| e.failed).collect();
        assert_eq!(failed, vec![true, true, true, false]);
        assert_eq!(collector.report().totals.total_failed_requests, 3);
    }

    #[test]
    fn test_query_redacted_before_storage() {
        let config = NetworkMetricsConfig::default().with_redact_query_params(["apiKey"]);
        let mut collector = NetworkMetricsCollector::new(config);
        collector.observe(observation("https://example.com/q?apiKey=abc123&q=x", 0.0, 5.0));

        let event = &collector.events()[0];
        assert_eq!(event.url_with_query, "https://example.com/q?apiKey=[REDACTED]&q=x");
        assert!(!serde_json::to_string(event).unwrap().contains("abc123"));
    }

    #[test]
    fn test_finish_writes_both_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = EventStore::new(temp_dir.path());
        let mut collector = NetworkMetricsCollector::new(NetworkMetricsConfig::default());
        collector.observe(observation("https://example.com/a", 0.0, 10.0));

        let (events_path, report_path) = collector.finish(&store, "worker-3").unwrap();
        assert!(events_path.ends_with("worker-3.events.json"));
        assert!(report_path.ends_with("worker-3.report.json"));

        let report: NetworkMetricsReport =
            serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
        assert_eq!(report.totals.total_requests, 1);
    }
}
