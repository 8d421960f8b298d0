//! # netmetrics
//!
//! Network request metrics for browser test runs: each worker aggregates the
//! requests it observes, persists its event log, and a merge step replays all
//! logs into one consolidated report.
//!
//! ## Usage
//!
//! ```bash
//! netmetrics merge --input network-metrics-results [--scope run+test] [--top-n 10]
//! netmetrics check-config netmetrics.toml
//! ```
//!
//! ## Modules
//!
//! - `aggregator` - Aggregation engine with four independent groupings
//! - `collector` - Per-worker conversion of raw observations into events
//! - `config` - Configuration types, hooks, file loader and env overrides
//! - `error` - Crate error type
//! - `events` - Request events and persistence envelopes
//! - `filter` - Allow/deny tracking decisions
//! - `matcher` - Glob, regex and predicate matchers
//! - `routes` - Route group derivation
//! - `stats` - Sample windows and nearest-rank percentiles
//! - `storage` - Atomic JSON handoff between workers and the merge step
//! - `urls` - URL redaction and normalization
pub mod aggregator;
pub mod collector;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod matcher;
pub mod routes;
pub mod stats;
pub mod storage;
pub mod urls;

pub use aggregator::{NetworkMetricsAggregator, NetworkMetricsReport};
pub use collector::{NetworkMetricsCollector, RequestObservation, RequestTiming};
pub use config::{NetworkMetricsConfig, ReportScope};
pub use error::{MetricsError, Result};
pub use events::{EventEnvelope, RequestEvent};
pub use storage::{EventStore, MergeSummary};
