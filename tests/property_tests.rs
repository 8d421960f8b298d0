//! Property tests for the aggregation engine and its pure helpers
//!
//! Verifies:
//! - Export idempotence and consume_events additivity for every grouping
//! - Redacted values never reach reports or event logs
//! - Route group derivation is deterministic
//! - Percentiles always return one of the samples, in order

use netmetrics::aggregator::AggregatedEntry;
use netmetrics::config::NetworkMetricsConfig;
use netmetrics::routes::derive_route_group;
use netmetrics::stats::percentile;
use netmetrics::{NetworkMetricsAggregator, RequestEvent};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

fn event_strategy() -> impl Strategy<Value = RequestEvent> {
    (
        prop::sample::select(vec!["GET", "POST", "DELETE"]),
        prop::sample::select(vec!["api.test", "cdn.test"]),
        prop::sample::select(vec!["users", "orders", "items"]),
        prop::sample::select(vec!["fetch", "xhr", "script"]),
        0u32..2000,
        0u16..5000,
        any::<bool>(),
        prop::option::of(0usize..3),
    )
        .prop_map(|(method, host, path, kind, id, duration, failed, test)| {
            let url = format!("https://{host}/{path}/{id}?page={}", id % 3);
            let mut event = RequestEvent::new(method, url, kind, f64::from(duration));
            if failed {
                event = event.with_status(500);
            }
            if let Some(t) = test {
                event = event.with_test(format!("spec_{t}.ts"), format!("test {t}"));
            }
            event
        })
}

/// Every entry of `whole` equals the merge of the entries with the same
/// identity in `a` and `b`, and no part entry is missing from `whole`.
fn check_additive<K, F>(
    whole: &[&AggregatedEntry],
    a: &[&AggregatedEntry],
    b: &[&AggregatedEntry],
    identity: F,
) -> Result<(), TestCaseError>
where
    K: PartialEq + std::fmt::Debug,
    F: Fn(&AggregatedEntry) -> K,
{
    for &entry in whole {
        let id = identity(entry);
        let parts: Vec<&AggregatedEntry> = a
            .iter()
            .chain(b.iter())
            .filter(|&&p| identity(p) == id)
            .copied()
            .collect();
        prop_assert!(!parts.is_empty() && parts.len() <= 2, "{:?}", id);

        prop_assert_eq!(entry.count, parts.iter().map(|p| p.count).sum::<u64>());
        prop_assert_eq!(entry.error_count, parts.iter().map(|p| p.error_count).sum::<u64>());
        prop_assert_eq!(
            entry.total_duration_ms,
            parts.iter().map(|p| p.total_duration_ms).sum::<f64>()
        );
        prop_assert_eq!(
            entry.min_duration_ms,
            parts.iter().map(|p| p.min_duration_ms).fold(f64::INFINITY, f64::min)
        );
        prop_assert_eq!(
            entry.max_duration_ms,
            parts.iter().map(|p| p.max_duration_ms).fold(0.0, f64::max)
        );
    }
    for &part in a.iter().chain(b.iter()) {
        let id = identity(part);
        prop_assert!(whole.iter().any(|&e| identity(e) == id), "{:?}", id);
    }
    Ok(())
}

fn entries(list: &[AggregatedEntry]) -> Vec<&AggregatedEntry> {
    list.iter().collect()
}

fn by_domain() -> NetworkMetricsConfig {
    let mut config = NetworkMetricsConfig::default();
    config.include_resource_type_by_domain = true;
    config
}

proptest! {
    #[test]
    fn prop_export_is_idempotent(events in prop::collection::vec(event_strategy(), 0..60)) {
        let mut aggregator = NetworkMetricsAggregator::default();
        aggregator.consume_events(events);
        prop_assert_eq!(aggregator.export_report(), aggregator.export_report());
    }

    #[test]
    fn prop_split_consumption_is_additive(
        events in prop::collection::vec(event_strategy(), 1..60),
        split in 0usize..60,
    ) {
        let split = split.min(events.len());
        let (left, right) = events.split_at(split);

        let mut whole = NetworkMetricsAggregator::new(by_domain());
        whole.consume_events(events.clone());

        let mut a = NetworkMetricsAggregator::new(by_domain());
        a.consume_events(left.to_vec());
        let mut b = NetworkMetricsAggregator::new(by_domain());
        b.consume_events(right.to_vec());

        let (whole, a, b) = (whole.export_report(), a.export_report(), b.export_report());
        prop_assert_eq!(
            whole.totals.total_requests,
            a.totals.total_requests + b.totals.total_requests
        );
        prop_assert_eq!(
            whole.totals.total_duration_ms,
            a.totals.total_duration_ms + b.totals.total_duration_ms
        );
        prop_assert_eq!(
            whole.totals.total_failed_requests,
            a.totals.total_failed_requests + b.totals.total_failed_requests
        );

        check_additive(
            &entries(&whole.endpoints_normalized),
            &entries(&a.endpoints_normalized),
            &entries(&b.endpoints_normalized),
            |e| (e.key.clone(), e.method.clone(), e.route_group.clone()),
        )?;
        check_additive(
            &entries(&whole.endpoints_exact_with_query),
            &entries(&a.endpoints_exact_with_query),
            &entries(&b.endpoints_exact_with_query),
            |e| (e.key.clone(), e.method.clone()),
        )?;
        check_additive(
            &entries(&whole.resource_types),
            &entries(&a.resource_types),
            &entries(&b.resource_types),
            |e| (e.key.clone(), e.domain.clone()),
        )?;

        let groups = |r: &netmetrics::NetworkMetricsReport| -> Vec<AggregatedEntry> {
            r.route_groups.iter().map(|g| g.entry.clone()).collect()
        };
        let (gw, ga, gb) = (groups(&whole), groups(&a), groups(&b));
        check_additive(&entries(&gw), &entries(&ga), &entries(&gb), |e| e.key.clone())?;
    }

    #[test]
    fn prop_redacted_values_never_exported(
        secret in "[A-Z]{4}[0-9]{6}",
        events in prop::collection::vec(event_strategy(), 0..20),
    ) {
        let config = NetworkMetricsConfig::default().with_redact_query_params(["token"]);
        let mut aggregator = NetworkMetricsAggregator::new(config);
        aggregator.consume_events(events);
        aggregator.record(RequestEvent::new(
            "GET",
            format!("https://api.test/auth/session?token={secret}&lang=en"),
            "fetch",
            12.0,
        ));

        let report = serde_json::to_string(&aggregator.export_report()).unwrap();
        prop_assert!(!report.contains(&secret));
        prop_assert!(report.contains("token=[REDACTED]"));
    }

    #[test]
    fn prop_route_group_is_deterministic(path in "(/[a-z0-9-]{1,12}){0,6}") {
        let config = NetworkMetricsConfig::default();
        let url = format!("https://app.test{path}");
        let first = derive_route_group(&url, &config);
        prop_assert_eq!(&first, &derive_route_group(&url, &config));
        prop_assert!(first.starts_with('/'));
    }

    #[test]
    fn prop_percentile_is_a_sample(
        samples in prop::collection::vec(0u32..100_000, 1..200),
        p in 0.0f64..=100.0,
    ) {
        let values: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
        let value = percentile(&values, p);
        prop_assert!(values.contains(&value));
        prop_assert!(percentile(&values, 0.0) <= value);
        prop_assert!(value <= percentile(&values, 100.0));
    }
}
