//! Network metrics aggregation engine
//!
//! [`NetworkMetricsAggregator`] owns one [`DurationBucket`] per distinct key in
//! each of four independent groupings:
//!
//! - **normalized endpoint**: method, normalized URL and route group
//! - **exact URL**: method and the redacted URL including its query
//! - **route group**: the route group alone (method is not part of the key)
//! - **resource type**: the resource type, optionally combined with the domain
//!
//! Buckets are created lazily on the first event for a key and live as long
//! as the aggregator. The aggregator is single-owner: every mutation takes
//! `&mut self`, and cross-worker merging goes through [`export_events`] and
//! [`consume_events`] rather than shared state.
//!
//! [`export_events`]: NetworkMetricsAggregator::export_events
//! [`consume_events`]: NetworkMetricsAggregator::consume_events

use crate::config::NetworkMetricsConfig;
use crate::events::RequestEvent;
use crate::filter::should_track_event;
use crate::routes::derive_route_group;
use crate::urls::{domain, normalize, redact, strip_query};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

pub mod bucket;
pub mod report;

pub use bucket::{Attribution, BucketLabels, Contribution, DurationBucket};
pub use report::{
    AggregatedEntry, NetworkMetricsReport, NetworkTotals, RouteGroupEntry, SpecReference,
    SpecSummary, TestReference, TestSummary, UrlReference,
};

/// Domain label used when the resource-type key includes an unparsable URL
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// The four independent ways of keying an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grouping {
    NormalizedEndpoint,
    ExactUrl,
    RouteGroup,
    ResourceType,
}

#[derive(Debug, Clone, Default)]
struct RunningTotals {
    requests: u64,
    duration_ms: f64,
    failed: u64,
}

pub struct NetworkMetricsAggregator {
    config: NetworkMetricsConfig,
    normalized: HashMap<String, DurationBucket>,
    exact: HashMap<String, DurationBucket>,
    route_groups: HashMap<String, DurationBucket>,
    resource_types: HashMap<String, DurationBucket>,
    events: Vec<RequestEvent>,
    totals: RunningTotals,
    spec_totals: HashMap<String, Contribution>,
    test_totals: HashMap<(String, String), Contribution>,
}

impl NetworkMetricsAggregator {
    pub fn new(config: NetworkMetricsConfig) -> Self {
        Self {
            config,
            normalized: HashMap::new(),
            exact: HashMap::new(),
            route_groups: HashMap::new(),
            resource_types: HashMap::new(),
            events: Vec::new(),
            totals: RunningTotals::default(),
            spec_totals: HashMap::new(),
            test_totals: HashMap::new(),
        }
    }

    pub fn config(&self) -> &NetworkMetricsConfig {
        &self.config
    }

    /// Number of events recorded so far
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Record one event.
    ///
    /// Returns `false` when the event was dropped, either by the track filter
    /// or because its duration is not a finite non-negative number.
    pub fn record(&mut self, event: RequestEvent) -> bool {
        if !event.has_valid_duration() {
            warn!(
                "Dropping {} {} with invalid duration {}",
                event.method, event.url, event.duration_ms
            );
            return false;
        }
        if !should_track_event(&event, &self.config) {
            trace!("Filtered out {} {}", event.method, event.url_with_query);
            return false;
        }

        self.update_totals(&event);

        let config = &self.config;
        let max_samples = config.max_samples_per_key;
        let duration = event.duration_ms;
        let failed = event.failed;
        let attribution = Attribution {
            spec_file: event.spec_file.as_deref(),
            test_title: event.test_title.as_deref(),
            url: None,
        };

        let base_url = strip_query(&redact(&event.url, config));
        let route_group = event
            .route_group
            .clone()
            .unwrap_or_else(|| derive_route_group(&base_url, config));
        let normalized_url = match config.normalize_query {
            Some(_) => normalize(&event.url_with_query, config),
            None => base_url,
        };
        let redacted = redact(&event.url_with_query, config);

        let normalized_key = format!("{} {}::{}", event.method, normalized_url, route_group);
        self.normalized
            .entry(normalized_key)
            .or_insert_with(|| {
                DurationBucket::new(
                    BucketLabels {
                        key: normalized_url.clone(),
                        method: Some(event.method.clone()),
                        route_group: Some(route_group.clone()),
                        ..Default::default()
                    },
                    max_samples,
                    false,
                )
            })
            .update(duration, failed, attribution);

        let exact_key = format!("{} {}", event.method, redacted);
        self.exact
            .entry(exact_key)
            .or_insert_with(|| {
                DurationBucket::new(
                    BucketLabels {
                        key: redacted.clone(),
                        method: Some(event.method.clone()),
                        ..Default::default()
                    },
                    max_samples,
                    false,
                )
            })
            .update(duration, failed, attribution);

        self.route_groups
            .entry(route_group.clone())
            .or_insert_with(|| {
                DurationBucket::new(
                    BucketLabels {
                        key: route_group.clone(),
                        ..Default::default()
                    },
                    max_samples,
                    true,
                )
            })
            .update(
                duration,
                failed,
                Attribution {
                    url: Some(&redacted),
                    ..attribution
                },
            );

        let resource_domain = config.include_resource_type_by_domain.then(|| {
            domain(&event.url_with_query).unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
        });
        let resource_key = match &resource_domain {
            Some(d) => format!("{}::{}", event.resource_type, d),
            None => event.resource_type.clone(),
        };
        self.resource_types
            .entry(resource_key)
            .or_insert_with(|| {
                DurationBucket::new(
                    BucketLabels {
                        key: event.resource_type.clone(),
                        resource_type: Some(event.resource_type.clone()),
                        domain: resource_domain.clone(),
                        ..Default::default()
                    },
                    max_samples,
                    false,
                )
            })
            .update(duration, failed, attribution);

        trace!(
            "Recorded {} {} ({:.1}ms) in route group {}",
            event.method,
            redacted,
            duration,
            route_group
        );
        self.events.push(event);
        true
    }

    /// Record every event in order; returns how many were kept
    pub fn consume_events<I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = RequestEvent>,
    {
        let mut recorded = 0;
        let mut dropped = 0;
        for event in events {
            if self.record(event) {
                recorded += 1;
            } else {
                dropped += 1;
            }
        }
        debug!("Consumed {} events ({} dropped)", recorded, dropped);
        recorded
    }

    /// Detached snapshot of the current statistics; does not mutate any bucket
    pub fn export_report(&self) -> NetworkMetricsReport {
        let top_n = self.config.top_n;
        let scope = self.config.report_scope;

        let totals = NetworkTotals {
            total_requests: self.totals.requests,
            total_duration_ms: self.totals.duration_ms,
            avg_request_duration_ms: if self.totals.requests == 0 {
                0.0
            } else {
                self.totals.duration_ms / self.totals.requests as f64
            },
            total_failed_requests: self.totals.failed,
        };

        let specs = scope.includes_specs().then(|| {
            bucket::ranked(&self.spec_totals, usize::MAX)
                .into_iter()
                .map(|(file, c)| SpecSummary {
                    file: file.clone(),
                    total_duration_ms: c.total_duration_ms,
                    total_requests: c.count,
                })
                .collect()
        });

        let tests = scope.includes_tests().then(|| {
            bucket::ranked(&self.test_totals, usize::MAX)
                .into_iter()
                .map(|((file, title), c)| TestSummary {
                    file: file.clone(),
                    title: title.clone(),
                    total_duration_ms: c.total_duration_ms,
                    total_requests: c.count,
                })
                .collect()
        });

        let route_groups = sorted_by_duration(&self.route_groups, |b| RouteGroupEntry {
            entry: b.to_entry(top_n),
            top_urls: b.top_urls(top_n),
        });

        NetworkMetricsReport {
            totals,
            specs,
            tests,
            endpoints_normalized: sorted_by_duration(&self.normalized, |b| b.to_entry(top_n)),
            endpoints_exact_with_query: sorted_by_duration(&self.exact, |b| b.to_entry(top_n)),
            route_groups,
            resource_types: sorted_by_duration(&self.resource_types, |b| b.to_entry(top_n)),
        }
    }

    /// Detached copy of every recorded event, in input order
    pub fn export_events(&self) -> Vec<RequestEvent> {
        self.events.clone()
    }

    /// Bucket for an internal grouping key
    pub fn bucket(&self, grouping: Grouping, key: &str) -> Option<&DurationBucket> {
        self.buckets(grouping).get(key)
    }

    /// All buckets of one grouping, keyed by their internal key
    pub fn buckets(&self, grouping: Grouping) -> &HashMap<String, DurationBucket> {
        match grouping {
            Grouping::NormalizedEndpoint => &self.normalized,
            Grouping::ExactUrl => &self.exact,
            Grouping::RouteGroup => &self.route_groups,
            Grouping::ResourceType => &self.resource_types,
        }
    }

    fn update_totals(&mut self, event: &RequestEvent) {
        self.totals.requests += 1;
        self.totals.duration_ms += event.duration_ms;
        if event.failed {
            self.totals.failed += 1;
        }

        if let Some(spec) = &event.spec_file {
            self.spec_totals
                .entry(spec.clone())
                .or_default()
                .add(event.duration_ms);

            if let Some(title) = &event.test_title {
                self.test_totals
                    .entry((spec.clone(), title.clone()))
                    .or_default()
                    .add(event.duration_ms);
            }
        }
    }
}

impl Default for NetworkMetricsAggregator {
    fn default() -> Self {
        Self::new(NetworkMetricsConfig::default())
    }
}

/// Descending total duration, then ascending entry key, then internal key
fn sorted_by_duration<T, F>(map: &HashMap<String, DurationBucket>, to_entry: F) -> Vec<T>
where
    F: Fn(&DurationBucket) -> T,
{
    let mut rows: Vec<(&String, &DurationBucket)> = map.iter().collect();
    rows.sort_by(|(ka, a), (kb, b)| compare_buckets(a, b).then_with(|| ka.cmp(kb)));
    rows.into_iter().map(|(_, b)| to_entry(b)).collect()
}

fn compare_buckets(a: &DurationBucket, b: &DurationBucket) -> Ordering {
    b.total_duration_ms()
        .total_cmp(&a.total_duration_ms())
        .then_with(|| a.labels().key.cmp(&b.labels().key))
}
