//! File handoff between worker collectors and the consolidation step
//!
//! Each worker writes one `<worker>.events.json` envelope. The merge step
//! reads every envelope in the directory in filename order and replays it into
//! a fresh aggregator, so the consolidated report does not depend on which
//! worker finished first.

use crate::aggregator::{NetworkMetricsAggregator, NetworkMetricsReport};
use crate::error::{MetricsError, Result};
use crate::events::{EventEnvelope, RequestEvent};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Suffix identifying per-worker event envelopes
pub const EVENTS_SUFFIX: &str = ".events.json";
/// Suffix used for report files
pub const REPORT_SUFFIX: &str = ".report.json";

/// Outcome of replaying a directory of envelopes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    pub files_read: usize,
    pub files_skipped: usize,
    pub events_consumed: usize,
}

/// Envelopes found in a store directory
#[derive(Debug, Default)]
pub struct EnvelopeScan {
    /// Parsed envelopes with their source file, in filename order
    pub envelopes: Vec<(PathBuf, EventEnvelope)>,
    /// Files that could not be read or parsed
    pub skipped: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct EventStore {
    dir: PathBuf,
}

impl EventStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the envelope written for `worker_id`
    pub fn events_path(&self, worker_id: &str) -> PathBuf {
        self.dir.join(format!("{worker_id}{EVENTS_SUFFIX}"))
    }

    /// Path of the report written under `name`
    pub fn report_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{REPORT_SUFFIX}"))
    }

    pub fn write_events(&self, worker_id: &str, events: &[RequestEvent]) -> Result<PathBuf> {
        let path = self.events_path(worker_id);
        let envelope = EventEnvelope::new(events.to_vec());
        self.write_json(&path, &envelope)?;
        debug!("Wrote {} events to {}", events.len(), path.display());
        Ok(path)
    }

    pub fn write_report(&self, name: &str, report: &NetworkMetricsReport) -> Result<PathBuf> {
        let path = self.report_path(name);
        self.write_json(&path, report)?;
        debug!("Wrote report to {}", path.display());
        Ok(path)
    }

    /// Serialize `value` to `path` through a temporary file in the same
    /// directory, so readers never observe a partial file.
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let parent = path.parent().unwrap_or(self.dir.as_path());
        fs::create_dir_all(parent)?;

        let json = serde_json::to_string_pretty(value)?;
        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(json.as_bytes())?;
        temp.flush()?;
        temp.persist(path).map_err(|e| MetricsError::persist(path, e.error))?;
        Ok(())
    }

    /// Read every `*.events.json` file, sorted by file name.
    ///
    /// Files that cannot be read or parsed are logged and reported in
    /// [`EnvelopeScan::skipped`]; they never fail the scan.
    pub fn read_envelopes(&self) -> Result<EnvelopeScan> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", self.dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            let is_envelope = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(EVENTS_SUFFIX));
            if is_envelope && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut scan = EnvelopeScan::default();
        for path in paths {
            match read_envelope(&path) {
                Ok(envelope) => scan.envelopes.push((path, envelope)),
                Err(e) => {
                    warn!("Skipping unreadable event file {}: {}", path.display(), e);
                    scan.skipped.push(path);
                }
            }
        }
        Ok(scan)
    }

    /// Replay every stored envelope into `aggregator`
    pub fn load_into(&self, aggregator: &mut NetworkMetricsAggregator) -> Result<MergeSummary> {
        let scan = self.read_envelopes()?;
        let mut summary = MergeSummary {
            files_skipped: scan.skipped.len(),
            ..Default::default()
        };

        for (path, envelope) in scan.envelopes {
            let events = envelope.events.len();
            let consumed = aggregator.consume_events(envelope.events);
            debug!(
                "Consumed {}/{} events from {}",
                consumed,
                events,
                path.display()
            );
            summary.files_read += 1;
            summary.events_consumed += consumed;
        }

        info!(
            "Merged {} event files ({} skipped, {} events)",
            summary.files_read, summary.files_skipped, summary.events_consumed
        );
        Ok(summary)
    }
}

fn read_envelope(path: &Path) -> Result<EventEnvelope> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
