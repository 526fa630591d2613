use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use socket2::{Domain, Socket, Type};
use tracing::{error, info};

use crate::api::ServerConfig;
use crate::lifecycle::{self, Shared};
use crate::metrics::{self, MetricsSnapshot};
use crate::pipeline::Pipeline;
use crate::pool;

const LISTEN_BACKLOG: i32 = 64;

/// A bound, not yet running, server.
pub struct Server {
    listener: Arc<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    shared: Arc<Shared>,
}

impl Server {
    /// Creates the listening socket and binds `0.0.0.0:port`.
    ///
    /// Errors here are fatal bootstrap errors; the binary maps them to exit
    /// code 1.
    pub fn bind(config: ServerConfig) -> anyhow::Result<Self> {
        let socket =
            Socket::new(Domain::IPV4, Type::STREAM, None).context("create listening socket")?;
        socket.set_reuse_address(true).context("set SO_REUSEADDR")?;
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
        socket
            .bind(&addr.into())
            .with_context(|| format!("bind {addr}"))?;
        socket.listen(LISTEN_BACKLOG).context("listen")?;

        let listener: TcpListener = socket.into();
        let local_addr = listener.local_addr().context("query bound address")?;
        let shared = Arc::new(Shared::new(local_addr.port(), config.idle_timeout));
        Ok(Self {
            listener: Arc::new(listener),
            local_addr,
            config,
            shared,
        })
    }

    /// The bound address. With `port: 0` this reports the ephemeral port the
    /// kernel picked.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A cloneable handle for external shutdown and metrics triggers
    /// (signal handlers, tests).
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shared: self.shared.clone(),
            metrics_output: self.config.metrics_output.clone(),
        }
    }

    /// Runs until shutdown (signal, SHUTDOWN request, or idle timeout),
    /// drains the pipeline, and returns.
    pub fn run(self) -> anyhow::Result<()> {
        let workers = if self.config.workers == 0 {
            ServerConfig::default_workers()
        } else {
            self.config.workers
        };
        info!(addr = %self.local_addr, workers, "server listening");

        let pipeline = Pipeline::start(self.config.queue_capacity, self.shared.clone())
            .context("start pipeline stages")?;
        let watchdog =
            lifecycle::spawn_watchdog(self.shared.clone()).context("start idle watchdog")?;
        let handles = pool::spawn_workers(
            self.listener.clone(),
            pipeline.queues(),
            self.shared.clone(),
            workers,
        )
        .context("start worker pool")?;

        for handle in handles {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
        pipeline.shutdown();
        if watchdog.join().is_err() {
            error!("watchdog thread panicked");
        }

        metrics::flush(
            &self.shared.metrics().snapshot(),
            self.config.metrics_output.as_deref(),
        );
        info!("server stopped");
        Ok(())
    }
}

/// Cloneable handle to a bound or running [`Server`].
#[derive(Clone)]
pub struct ServerHandle {
    shared: Arc<Shared>,
    metrics_output: Option<PathBuf>,
}

impl ServerHandle {
    /// Requests graceful shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.shared.trigger_shutdown("external shutdown request");
    }

    /// Whether shutdown has been initiated.
    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }

    /// Current counter snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics().snapshot()
    }

    /// Logs the current snapshot and appends it to the configured metrics
    /// file, if any.
    pub fn flush_metrics(&self) {
        metrics::flush(&self.metrics(), self.metrics_output.as_deref());
    }
}
