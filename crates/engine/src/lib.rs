#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Concurrent execution engine for `graphpipe`: the Leader–Follower acceptor
//! pool, the blocking-queue algorithm pipeline, the wire codec, and the
//! idle/shutdown lifecycle.

/// Public API for the engine crate.
pub mod api;

mod handler;
mod job;
mod lifecycle;
mod metrics;
mod pipeline;
mod pool;
mod protocol;
mod queue;
mod server;

pub use api::{MetricsSnapshot, Server, ServerConfig, ServerHandle};
pub use queue::{BlockingQueue, Closed};
