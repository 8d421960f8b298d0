//! Running statistics for one grouping key

use super::report::{AggregatedEntry, SpecReference, TestReference, UrlReference};
use crate::stats::SampleWindow;
use std::collections::HashMap;

/// Accumulated duration and count for one contributor
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Contribution {
    pub total_duration_ms: f64,
    pub count: u64,
}

impl Contribution {
    pub fn add(&mut self, duration_ms: f64) {
        self.total_duration_ms += duration_ms;
        self.count += 1;
    }
}

/// Dimension fields copied onto the exported entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketLabels {
    pub key: String,
    pub method: Option<String>,
    pub route_group: Option<String>,
    pub resource_type: Option<String>,
    pub domain: Option<String>,
}

/// Attribution data for one recorded event
#[derive(Debug, Clone, Copy, Default)]
pub struct Attribution<'a> {
    pub spec_file: Option<&'a str>,
    pub test_title: Option<&'a str>,
    pub url: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct DurationBucket {
    labels: BucketLabels,
    count: u64,
    total_duration_ms: f64,
    min_duration_ms: f64,
    max_duration_ms: f64,
    error_count: u64,
    samples: SampleWindow,
    tests: HashMap<(String, String), Contribution>,
    specs: HashMap<String, Contribution>,
    urls: Option<HashMap<String, Contribution>>,
}

impl DurationBucket {
    /// `track_urls` enables the per-URL breakdown used by route groups
    pub fn new(labels: BucketLabels, max_samples: Option<usize>, track_urls: bool) -> Self {
        Self {
            labels,
            count: 0,
            total_duration_ms: 0.0,
            min_duration_ms: f64::INFINITY,
            max_duration_ms: 0.0,
            error_count: 0,
            samples: SampleWindow::new(max_samples),
            tests: HashMap::new(),
            specs: HashMap::new(),
            urls: track_urls.then(HashMap::new),
        }
    }

    pub fn update(&mut self, duration_ms: f64, failed: bool, attribution: Attribution<'_>) {
        self.count += 1;
        self.total_duration_ms += duration_ms;
        self.min_duration_ms = self.min_duration_ms.min(duration_ms);
        self.max_duration_ms = self.max_duration_ms.max(duration_ms);
        if failed {
            self.error_count += 1;
        }
        self.samples.push(duration_ms);

        if let (Some(spec), Some(title)) = (attribution.spec_file, attribution.test_title) {
            self.tests
                .entry((spec.to_string(), title.to_string()))
                .or_default()
                .add(duration_ms);
        }
        if let Some(spec) = attribution.spec_file {
            self.specs.entry(spec.to_string()).or_default().add(duration_ms);
        }
        if let (Some(urls), Some(url)) = (self.urls.as_mut(), attribution.url) {
            urls.entry(url.to_string()).or_default().add(duration_ms);
        }
    }

    pub fn labels(&self) -> &BucketLabels {
        &self.labels
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn total_duration_ms(&self) -> f64 {
        self.total_duration_ms
    }

    pub fn min_duration_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.min_duration_ms
        }
    }

    pub fn max_duration_ms(&self) -> f64 {
        self.max_duration_ms
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    pub fn samples(&self) -> &SampleWindow {
        &self.samples
    }

    /// Snapshot as a report entry with the top `top_n` tests and specs
    pub fn to_entry(&self, top_n: usize) -> AggregatedEntry {
        let percentiles = self.samples.percentiles();
        let avg = if self.count == 0 {
            0.0
        } else {
            self.total_duration_ms / self.count as f64
        };

        AggregatedEntry {
            key: self.labels.key.clone(),
            method: self.labels.method.clone(),
            route_group: self.labels.route_group.clone(),
            resource_type: self.labels.resource_type.clone(),
            domain: self.labels.domain.clone(),
            count: self.count,
            total_duration_ms: self.total_duration_ms,
            avg_duration_ms: avg,
            min_duration_ms: self.min_duration_ms(),
            max_duration_ms: self.max_duration_ms,
            p50: percentiles.p50,
            p90: percentiles.p90,
            p95: percentiles.p95,
            p99: percentiles.p99,
            error_count: self.error_count,
            top_tests: ranked(&self.tests, top_n)
                .into_iter()
                .map(|((file, title), c)| TestReference {
                    title: title.clone(),
                    file: file.clone(),
                    total_duration_ms: c.total_duration_ms,
                    count: c.count,
                })
                .collect(),
            top_specs: ranked(&self.specs, top_n)
                .into_iter()
                .map(|(file, c)| SpecReference {
                    file: file.clone(),
                    total_duration_ms: c.total_duration_ms,
                    count: c.count,
                })
                .collect(),
        }
    }

    /// Top contributing URLs; empty unless URL tracking was enabled
    pub fn top_urls(&self, top_n: usize) -> Vec<UrlReference> {
        let Some(urls) = &self.urls else {
            return Vec::new();
        };
        ranked(urls, top_n)
            .into_iter()
            .map(|(url, c)| UrlReference {
                url: url.clone(),
                total_duration_ms: c.total_duration_ms,
                count: c.count,
            })
            .collect()
    }
}

/// Highest accumulated duration first, ties by key
pub(crate) fn ranked<K: Ord>(
    map: &HashMap<K, Contribution>,
    top_n: usize,
) -> Vec<(&K, &Contribution)> {
    let mut rows: Vec<_> = map.iter().collect();
    rows.sort_by(|(ka, a), (kb, b)| {
        b.total_duration_ms
            .total_cmp(&a.total_duration_ms)
            .then_with(|| ka.cmp(kb))
    });
    rows.truncate(top_n);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(max_samples: Option<usize>, track_urls: bool) -> DurationBucket {
        DurationBucket::new(
            BucketLabels {
                key: "k".into(),
                ..Default::default()
            },
            max_samples,
            track_urls,
        )
    }

    fn attributed<'a>(spec: &'a str, title: &'a str) -> Attribution<'a> {
        Attribution {
            spec_file: Some(spec),
            test_title: Some(title),
            url: None,
        }
    }

    #[test]
    fn test_empty_bucket_entry() {
        let entry = bucket(None, false).to_entry(5);
        assert_eq!(entry.count, 0);
        assert_eq!(entry.avg_duration_ms, 0.0);
        assert_eq!(entry.min_duration_ms, 0.0);
        assert_eq!(entry.max_duration_ms, 0.0);
        assert_eq!(entry.p99, 0.0);
    }

    #[test]
    fn test_running_stats() {
        let mut b = bucket(None, false);
        b.update(30.0, false, Attribution::default());
        b.update(10.0, true, Attribution::default());
        b.update(20.0, false, Attribution::default());

        assert_eq!(b.count(), 3);
        assert_eq!(b.total_duration_ms(), 60.0);
        assert_eq!(b.min_duration_ms(), 10.0);
        assert_eq!(b.max_duration_ms(), 30.0);
        assert_eq!(b.error_count(), 1);

        let entry = b.to_entry(5);
        assert_eq!(entry.avg_duration_ms, 20.0);
        assert_eq!(entry.p50, 20.0);
    }

    #[test]
    fn test_sample_cap_does_not_affect_totals() {
        let mut b = bucket(Some(2), false);
        for d in [1.0, 2.0, 3.0, 4.0] {
            b.update(d, false, Attribution::default());
        }
        assert_eq!(b.samples().len(), 2);
        assert_eq!(b.count(), 4);
        assert_eq!(b.min_duration_ms(), 1.0);
        assert_eq!(b.to_entry(5).p50, 3.0);
    }

    #[test]
    fn test_test_attribution_requires_title() {
        let mut b = bucket(None, false);
        b.update(
            5.0,
            false,
            Attribution {
                spec_file: Some("a.spec.ts"),
                test_title: None,
                url: None,
            },
        );
        let entry = b.to_entry(5);
        assert!(entry.top_tests.is_empty());
        assert_eq!(entry.top_specs.len(), 1);
        assert_eq!(entry.top_specs[0].file, "a.spec.ts");
    }

    #[test]
    fn test_top_n_sorted_and_truncated() {
        let mut b = bucket(None, false);
        b.update(10.0, false, attributed("a.spec.ts", "one"));
        b.update(50.0, false, attributed("b.spec.ts", "two"));
        b.update(30.0, false, attributed("c.spec.ts", "three"));
        b.update(30.0, false, attributed("a.spec.ts", "one"));

        let entry = b.to_entry(2);
        let titles: Vec<_> = entry.top_tests.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["two", "one"]);
        assert_eq!(entry.top_tests[1].total_duration_ms, 40.0);
        assert_eq!(entry.top_tests[1].count, 2);

        let specs: Vec<_> = entry.top_specs.iter().map(|s| s.file.as_str()).collect();
        assert_eq!(specs, vec!["b.spec.ts", "a.spec.ts"]);
    }

    #[test]
    fn test_ties_broken_by_name() {
        let mut b = bucket(None, false);
        b.update(10.0, false, attributed("z.spec.ts", "t"));
        b.update(10.0, false, attributed("a.spec.ts", "t"));
        let entry = b.to_entry(5);
        assert_eq!(entry.top_specs[0].file, "a.spec.ts");
        assert_eq!(entry.top_specs[1].file, "z.spec.ts");
    }

    #[test]
    fn test_url_tracking() {
        let mut tracked = bucket(None, true);
        let mut untracked = bucket(None, false);
        for b in [&mut tracked, &mut untracked] {
            b.update(
                5.0,
                false,
                Attribution {
                    url: Some("https://x.test/users/1"),
                    ..Default::default()
                },
            );
        }
        assert_eq!(tracked.top_urls(5).len(), 1);
        assert_eq!(tracked.top_urls(5)[0].url, "https://x.test/users/1");
        assert!(untracked.top_urls(5).is_empty());
    }
}
