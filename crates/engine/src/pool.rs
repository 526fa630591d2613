use std::io;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{error, info};

use crate::handler::handle_connection;
use crate::lifecycle::Shared;
use crate::pipeline::StageQueues;

/// Spawns the fixed-size Leader–Follower worker pool.
pub(crate) fn spawn_workers(
    listener: Arc<TcpListener>,
    queues: Arc<StageQueues>,
    shared: Arc<Shared>,
    count: usize,
) -> io::Result<Vec<JoinHandle<()>>> {
    let mut workers = Vec::with_capacity(count);
    for i in 0..count {
        let listener = listener.clone();
        let queues = queues.clone();
        let shared = shared.clone();
        let handle = std::thread::Builder::new()
            .name(format!("worker-{i}"))
            .spawn(move || worker_loop(&listener, &queues, &shared))?;
        workers.push(handle);
    }
    Ok(workers)
}

// Leader–Follower: exactly one worker at a time holds leadership and blocks
// in accept(); after accept returns it promotes a successor, then handles
// the accepted connection to completion before contending again. The pool
// mutex is never held across accept().
fn worker_loop(listener: &TcpListener, queues: &StageQueues, shared: &Shared) {
    loop {
        {
            let mut state = shared.pool.lock();
            while state.leader_present && !shared.is_shutdown() {
                shared.pool_cv.wait(&mut state);
            }
            if shared.is_shutdown() {
                return;
            }
            state.leader_present = true;
        }

        let accepted = listener.accept();

        {
            let mut state = shared.pool.lock();
            state.leader_present = false;
        }
        shared.pool_cv.notify_one();

        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                if shared.is_shutdown() {
                    return;
                }
                error!("accept failed: {err}");
                return;
            }
        };
        if shared.is_shutdown() {
            // The shutdown self-connect lands here; drop it and exit.
            return;
        }

        shared.metrics().connection_accepted();
        let conn = Arc::new(stream);
        let conn_id = shared.register_connection(conn.clone());
        info!(conn_id, peer = %peer, "client connected");

        handle_connection(&conn, conn_id, queues, shared);

        shared.deregister_connection(conn_id);
        info!(conn_id, "client disconnected");
    }
}
