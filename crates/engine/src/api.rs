//! Public API types for the `graphpipe` engine.

use std::path::PathBuf;
use std::time::Duration;

pub use crate::metrics::MetricsSnapshot;
pub use crate::server::{Server, ServerHandle};

/// Configuration for a [`Server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to bind on all interfaces. Port 0 picks an ephemeral port
    /// (useful for tests; see [`Server::local_addr`]).
    pub port: u16,

    /// Number of acceptor/worker threads. 0 sizes the pool from the CPU
    /// count, clamped to `[4, 8]`.
    pub workers: usize,

    /// How long the server may sit with zero connected clients before it
    /// shuts itself down.
    pub idle_timeout: Duration,

    /// Capacity of each pipeline stage queue. Pushers block when a bounded
    /// queue is full, which backpressures request admission. 0 means
    /// unbounded.
    pub queue_capacity: usize,

    /// When set, metrics snapshots are appended to this file (one JSON
    /// object per line) on every flush.
    pub metrics_output: Option<PathBuf>,
}

impl ServerConfig {
    /// Default listening port.
    pub const DEFAULT_PORT: u16 = 9090;

    /// Default idle shutdown timeout.
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default per-stage queue capacity.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

    /// Pool size used when `workers == 0`: `max(4, min(8, cpu_count))`.
    pub fn default_workers() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .clamp(4, 8)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: Self::DEFAULT_PORT,
            workers: 0,
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
            queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
            metrics_output: None,
        }
    }
}
