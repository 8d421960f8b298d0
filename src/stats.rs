//! Duration samples and nearest-rank percentiles
//!
//! Percentiles are computed from a bounded window of samples per bucket. When
//! a bucket sees more events than its cap, the oldest samples are evicted and
//! tail percentiles become estimates. Exact percentiles would need unbounded
//! memory per key; the cap keeps memory per bucket constant for any run
//! length.

use std::collections::VecDeque;

/// Nearest-rank percentile of unsorted samples; `0.0` for an empty slice
pub fn percentile(samples: &[f64], p: f64) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, p)
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let rank = (p / 100.0 * n as f64).ceil() as i64 - 1;
    let idx = rank.clamp(0, n as i64 - 1) as usize;
    sorted[idx]
}

/// The percentiles carried by every report entry
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Percentiles {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Percentiles {
    /// Compute all four percentiles with a single sort
    pub fn from_samples<'a, I>(samples: I) -> Self
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let mut sorted: Vec<f64> = samples.into_iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        Self {
            p50: percentile_sorted(&sorted, 50.0),
            p90: percentile_sorted(&sorted, 90.0),
            p95: percentile_sorted(&sorted, 95.0),
            p99: percentile_sorted(&sorted, 99.0),
        }
    }
}

/// Insertion-ordered sample buffer that evicts its oldest entry when full
#[derive(Debug, Clone, Default)]
pub struct SampleWindow {
    samples: VecDeque<f64>,
    cap: Option<usize>,
}

impl SampleWindow {
    /// `None` keeps every sample
    pub fn new(cap: Option<usize>) -> Self {
        Self {
            samples: VecDeque::new(),
            cap,
        }
    }

    pub fn push(&mut self, value: f64) {
        if let Some(cap) = self.cap {
            if cap == 0 {
                return;
            }
            while self.samples.len() >= cap {
                self.samples.pop_front();
            }
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }

    pub fn percentiles(&self) -> Percentiles {
        Percentiles::from_samples(self.samples.iter())
    }
}
