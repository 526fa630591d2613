use std::net::TcpStream;
use std::sync::Arc;

use graphpipe_graph::{Algorithm, Graph, Params};
use parking_lot::{Condvar, Mutex};

/// What a request asks the pipeline to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobKind {
    /// Serialize the graph back to the client, no computation.
    Preview,
    /// Run all four algorithms in pipeline order and aggregate.
    All,
    /// Run exactly one algorithm, then aggregate.
    Single(Algorithm),
}

/// How a Job's reply ended, carried back to the connection handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReplyOutcome {
    /// Reply fully written; the peer's write half is still open.
    Sent,
    /// Reply written, but the peer has half-closed; the handler should
    /// close the connection instead of reading another request.
    PeerClosed,
    /// The reply could not be written (dead peer or shutdown drop).
    Failed,
}

/// One-shot completion latch attached to each Job.
///
/// Starts unsignaled, is signaled exactly once by the aggregator (the first
/// signal wins), and is awaited by the connection handler before it reads
/// the next request. Single writer, single reader.
#[derive(Debug, Default)]
pub(crate) struct Latch {
    state: Mutex<Option<ReplyOutcome>>,
    signaled: Condvar,
}

impl Latch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn signal(&self, outcome: ReplyOutcome) {
        let mut state = self.state.lock();
        if state.is_none() {
            *state = Some(outcome);
            self.signaled.notify_all();
        }
    }

    pub(crate) fn wait(&self) -> ReplyOutcome {
        let mut state = self.state.lock();
        while state.is_none() {
            self.signaled.wait(&mut state);
        }
        (*state).unwrap_or(ReplyOutcome::Failed)
    }
}

/// Per-stage result slots. A filled slot is either `RESULT <value>` or a
/// human-readable string starting with `Error:`.
#[derive(Debug, Default)]
pub(crate) struct ResultSlots {
    pub(crate) max_flow: Option<String>,
    pub(crate) scc: Option<String>,
    pub(crate) mst: Option<String>,
    pub(crate) cliques: Option<String>,
}

impl ResultSlots {
    pub(crate) fn set(&mut self, alg: Algorithm, value: String) {
        match alg {
            Algorithm::MaxFlow => self.max_flow = Some(value),
            Algorithm::Scc => self.scc = Some(value),
            Algorithm::Mst => self.mst = Some(value),
            Algorithm::Cliques => self.cliques = Some(value),
        }
    }

    pub(crate) fn get(&self, alg: Algorithm) -> Option<&str> {
        match alg {
            Algorithm::MaxFlow => self.max_flow.as_deref(),
            Algorithm::Scc => self.scc.as_deref(),
            Algorithm::Mst => self.mst.as_deref(),
            Algorithm::Cliques => self.cliques.as_deref(),
        }
    }
}

/// The unit of work flowing through the pipeline.
///
/// Owned by exactly one stage at a time; hand-off happens through the stage
/// queues. The connection is shared with the handler, but the pipeline
/// structure guarantees only the aggregator writes while the Job is in
/// flight.
#[derive(Debug)]
pub(crate) struct Job {
    pub(crate) conn: Arc<TcpStream>,
    pub(crate) conn_id: u64,
    pub(crate) kind: JobKind,
    pub(crate) directed: bool,
    pub(crate) graph: Graph,
    pub(crate) params: Params,
    pub(crate) results: ResultSlots,
    pub(crate) done: Arc<Latch>,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::{Latch, ReplyOutcome};

    #[test]
    fn latch_delivers_the_first_signal_only() {
        let latch = Latch::new();
        latch.signal(ReplyOutcome::Sent);
        latch.signal(ReplyOutcome::Failed);
        assert_eq!(latch.wait(), ReplyOutcome::Sent);
        // wait() after signal keeps returning the same outcome
        assert_eq!(latch.wait(), ReplyOutcome::Sent);
    }

    #[test]
    fn latch_wakes_a_blocked_waiter() {
        let latch = Arc::new(Latch::new());
        let waiter = {
            let latch = latch.clone();
            thread::spawn(move || latch.wait())
        };
        thread::sleep(Duration::from_millis(50));
        latch.signal(ReplyOutcome::PeerClosed);
        assert_eq!(waiter.join().unwrap(), ReplyOutcome::PeerClosed);
    }
}
