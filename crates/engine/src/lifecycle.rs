use std::collections::HashMap;
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::metrics::Metrics;

/// Pool state guarded by the pool mutex: who (if anyone) is currently the
/// leader blocked in `accept`.
#[derive(Debug, Default)]
pub(crate) struct PoolState {
    pub(crate) leader_present: bool,
}

/// Process-wide state shared by the pool, the pipeline, the watchdog, and
/// external shutdown triggers (signals, SHUTDOWN requests).
pub(crate) struct Shared {
    pub(crate) pool: Mutex<PoolState>,
    pub(crate) pool_cv: Condvar,
    metrics: Metrics,
    shutdown: AtomicBool,
    active_clients: AtomicUsize,
    last_activity: Mutex<Instant>,
    connections: Mutex<HashMap<u64, Arc<TcpStream>>>,
    next_conn_id: AtomicU64,
    idle_timeout: Duration,
    // Loopback address of the listener, used to unblock a leader stuck in
    // accept() at shutdown.
    wake_addr: SocketAddr,
}

impl Shared {
    pub(crate) fn new(listen_port: u16, idle_timeout: Duration) -> Self {
        Self {
            pool: Mutex::new(PoolState::default()),
            pool_cv: Condvar::new(),
            metrics: Metrics::default(),
            shutdown: AtomicBool::new(false),
            active_clients: AtomicUsize::new(0),
            last_activity: Mutex::new(Instant::now()),
            connections: Mutex::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
            idle_timeout,
            wake_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, listen_port)),
        }
    }

    pub(crate) fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Initiates graceful shutdown. Idempotent; only the first caller does
    /// any work.
    ///
    /// Wakes every follower waiting for leadership, unblocks the leader in
    /// `accept` with a loopback self-connect, and half-closes every
    /// registered client connection so blocked request reads return EOF.
    pub(crate) fn trigger_shutdown(&self, reason: &str) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(reason, "initiating shutdown");

        // Lock-then-notify so no worker checks the flag between our store
        // and the wakeup.
        drop(self.pool.lock());
        self.pool_cv.notify_all();

        match TcpStream::connect(self.wake_addr) {
            Ok(stream) => drop(stream),
            Err(err) => debug!("listener wake connect failed (already closed?): {err}"),
        }

        let connections = self.connections.lock();
        for (conn_id, conn) in connections.iter() {
            if let Err(err) = conn.shutdown(Shutdown::Both) {
                debug!(conn_id, "connection shutdown failed: {err}");
            }
        }
    }

    /// Records activity now (accept, request completion, disconnect).
    pub(crate) fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub(crate) fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    pub(crate) fn active_clients(&self) -> usize {
        self.active_clients.load(Ordering::Relaxed)
    }

    /// Registers a freshly accepted connection; returns its id.
    pub(crate) fn register_connection(&self, conn: Arc<TcpStream>) -> u64 {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        self.connections.lock().insert(conn_id, conn);
        self.active_clients.fetch_add(1, Ordering::Relaxed);
        self.touch();
        conn_id
    }

    pub(crate) fn deregister_connection(&self, conn_id: u64) {
        self.connections.lock().remove(&conn_id);
        self.active_clients.fetch_sub(1, Ordering::Relaxed);
        self.touch();
    }
}

/// How long the watchdog must see zero clients and no activity before it
/// shuts the server down is configured per server; the re-check delay after
/// a first idle observation is fixed.
const IDLE_RECHECK: Duration = Duration::from_millis(200);
const WATCHDOG_TICK: Duration = Duration::from_secs(1);

/// Spawns the idle watchdog thread.
pub(crate) fn spawn_watchdog(shared: Arc<Shared>) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("watchdog".to_string())
        .spawn(move || watchdog_loop(&shared))
}

fn watchdog_loop(shared: &Shared) {
    let timeout = shared.idle_timeout;
    loop {
        std::thread::sleep(WATCHDOG_TICK);
        if shared.is_shutdown() {
            return;
        }
        if shared.idle_for() < timeout || shared.active_clients() != 0 {
            continue;
        }
        // Looks idle; debounce against a client racing in right now.
        std::thread::sleep(IDLE_RECHECK);
        if shared.is_shutdown() {
            return;
        }
        if shared.idle_for() >= timeout && shared.active_clients() == 0 {
            warn!(timeout_secs = timeout.as_secs(), "no clients within idle timeout");
            shared.trigger_shutdown("idle timeout");
            return;
        }
    }
}
