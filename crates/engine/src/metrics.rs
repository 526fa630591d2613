use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::{info, warn};

/// Process-wide counters, updated lock-free from workers and stages.
#[derive(Debug, Default)]
pub(crate) struct Metrics {
    connections_accepted: AtomicU64,
    requests_ok: AtomicU64,
    requests_err: AtomicU64,
    jobs_completed: AtomicU64,
    replies_failed: AtomicU64,
}

impl Metrics {
    pub(crate) fn connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn request_ok(&self) {
        self.requests_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn request_err(&self) {
        self.requests_err.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reply_failed(&self) {
        self.replies_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            requests_ok: self.requests_ok.load(Ordering::Relaxed),
            requests_err: self.requests_err.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            replies_failed: self.replies_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the server counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Connections accepted since startup.
    pub connections_accepted: u64,
    /// Requests that got a reply (including in-pipeline error strings).
    pub requests_ok: u64,
    /// Requests rejected before reaching the pipeline.
    pub requests_err: u64,
    /// Jobs that reached the aggregator.
    pub jobs_completed: u64,
    /// Replies that could not be written to the client.
    pub replies_failed: u64,
}

/// Logs a snapshot and, when configured, appends it as a JSON line.
pub(crate) fn flush(snapshot: &MetricsSnapshot, path: Option<&Path>) {
    let line = match serde_json::to_string(snapshot) {
        Ok(line) => line,
        Err(err) => {
            warn!("failed to serialize metrics snapshot: {err}");
            return;
        }
    };
    info!(metrics = %line, "metrics snapshot");
    if let Some(path) = path {
        if let Err(err) = append_line(path, &line) {
            warn!("failed to write metrics to {}: {err}", path.display());
        }
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{line}")
}

#[cfg(test)]
mod tests {
    use super::Metrics;

    #[test]
    fn snapshot_reflects_counters() {
        let m = Metrics::default();
        m.connection_accepted();
        m.request_ok();
        m.request_ok();
        m.request_err();
        m.job_completed();
        let snap = m.snapshot();
        assert_eq!(snap.connections_accepted, 1);
        assert_eq!(snap.requests_ok, 2);
        assert_eq!(snap.requests_err, 1);
        assert_eq!(snap.jobs_completed, 1);
        assert_eq!(snap.replies_failed, 0);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let m = Metrics::default();
        m.request_ok();
        let json = serde_json::to_string(&m.snapshot()).unwrap();
        assert!(json.contains("\"requests_ok\":1"));
    }
}
