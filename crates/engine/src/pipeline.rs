use std::io::{self, Write};
use std::net::TcpStream;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use graphpipe_graph::Algorithm;
use tracing::{debug, error, warn};

use crate::job::{Job, JobKind, ReplyOutcome};
use crate::lifecycle::Shared;
use crate::protocol::{format_response, serialize_graph};
use crate::queue::{BlockingQueue, Closed};

/// The five stage queues. Jobs enter at the queue matching their kind and
/// always leave through `agg`.
pub(crate) struct StageQueues {
    max_flow: BlockingQueue<Job>,
    scc: BlockingQueue<Job>,
    mst: BlockingQueue<Job>,
    cliques: BlockingQueue<Job>,
    agg: BlockingQueue<Job>,
}

impl StageQueues {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            max_flow: BlockingQueue::bounded(capacity),
            scc: BlockingQueue::bounded(capacity),
            mst: BlockingQueue::bounded(capacity),
            cliques: BlockingQueue::bounded(capacity),
            agg: BlockingQueue::bounded(capacity),
        }
    }

    /// The entry queue for a job kind.
    pub(crate) fn entry(&self, kind: JobKind) -> &BlockingQueue<Job> {
        match kind {
            JobKind::Preview => &self.agg,
            JobKind::All => &self.max_flow,
            JobKind::Single(alg) => self.for_alg(alg),
        }
    }

    fn for_alg(&self, alg: Algorithm) -> &BlockingQueue<Job> {
        match alg {
            Algorithm::MaxFlow => &self.max_flow,
            Algorithm::Scc => &self.scc,
            Algorithm::Mst => &self.mst,
            Algorithm::Cliques => &self.cliques,
        }
    }
}

/// The running pipeline: four algorithm stages plus the aggregator, each a
/// dedicated long-lived thread.
pub(crate) struct Pipeline {
    queues: Arc<StageQueues>,
    algorithm_stages: Vec<(Algorithm, JoinHandle<()>)>,
    aggregator: JoinHandle<()>,
}

impl Pipeline {
    pub(crate) fn start(queue_capacity: usize, shared: Arc<Shared>) -> io::Result<Self> {
        let queues = Arc::new(StageQueues::with_capacity(queue_capacity));

        let mut algorithm_stages = Vec::with_capacity(Algorithm::ALL.len());
        for alg in Algorithm::ALL {
            let queues = queues.clone();
            let handle = std::thread::Builder::new()
                .name(format!("stage-{}", alg.name().to_ascii_lowercase()))
                .spawn(move || stage_loop(alg, &queues))?;
            algorithm_stages.push((alg, handle));
        }

        let aggregator = {
            let queues = queues.clone();
            std::thread::Builder::new()
                .name("stage-agg".to_string())
                .spawn(move || aggregator_loop(&queues, &shared))?
        };

        Ok(Self {
            queues,
            algorithm_stages,
            aggregator,
        })
    }

    pub(crate) fn queues(&self) -> Arc<StageQueues> {
        self.queues.clone()
    }

    /// Closes and joins the stages in topological order (entry stages first,
    /// aggregator last) so every in-flight job drains instead of being
    /// dropped.
    pub(crate) fn shutdown(self) {
        let Self {
            queues,
            algorithm_stages,
            aggregator,
        } = self;

        for (alg, handle) in algorithm_stages {
            queues.for_alg(alg).close();
            if handle.join().is_err() {
                error!("stage {} panicked", alg.name());
            }
        }
        queues.agg.close();
        if aggregator.join().is_err() {
            error!("aggregator stage panicked");
        }
    }
}

// One algorithm stage: pop, compute the stage's result slot, route onward.
// A panicking algorithm is contained to its job; the stage itself only exits
// when its queue closes and drains.
fn stage_loop(alg: Algorithm, queues: &StageQueues) {
    while let Some(mut job) = queues.for_alg(alg).pop() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            alg.run_or_error(&job.graph, &job.params, job.directed)
        }))
        .unwrap_or_else(|_| {
            warn!(conn_id = job.conn_id, "{} computation panicked", alg.name());
            format!("Error: internal error in {}", alg.name())
        });
        job.results.set(alg, result);

        let next = match (job.kind, alg) {
            (JobKind::Single(_), _) | (_, Algorithm::Cliques) => &queues.agg,
            (_, Algorithm::MaxFlow) => &queues.scc,
            (_, Algorithm::Scc) => &queues.mst,
            (_, Algorithm::Mst) => &queues.cliques,
        };
        if let Err(Closed(job)) = next.push(job) {
            warn!(conn_id = job.conn_id, "pipeline closing, dropping job");
            job.done.signal(ReplyOutcome::Failed);
        }
    }
    debug!("stage {} drained", alg.name());
}

// Terminal stage: format the reply for the job's kind, write it on the
// job's connection, probe for a half-closed peer, and fire the completion
// latch so the handler can read the next request (or close).
fn aggregator_loop(queues: &StageQueues, shared: &Shared) {
    while let Some(job) = queues.agg.pop() {
        let missing = "Error: result missing";
        let body = match job.kind {
            JobKind::Preview => serialize_graph(&job.graph),
            JobKind::Single(alg) => job.results.get(alg).unwrap_or(missing).to_string(),
            JobKind::All => {
                let mut body = String::new();
                for (label, alg) in [
                    ("MAX_FLOW", Algorithm::MaxFlow),
                    ("SCC_COUNT", Algorithm::Scc),
                    ("MST_WEIGHT", Algorithm::Mst),
                    ("CLIQUES", Algorithm::Cliques),
                ] {
                    body.push_str(&format!(
                        "RESULT {label}={}\n",
                        job.results.get(alg).unwrap_or(missing)
                    ));
                }
                body
            }
        };

        let reply = format_response(&body, true);
        let mut writer: &TcpStream = &job.conn;
        let outcome = match writer.write_all(reply.as_bytes()) {
            Ok(()) => {
                if peer_half_closed(&job.conn) {
                    ReplyOutcome::PeerClosed
                } else {
                    ReplyOutcome::Sent
                }
            }
            Err(err) => {
                debug!(conn_id = job.conn_id, "reply send failed: {err}");
                shared.metrics().reply_failed();
                ReplyOutcome::Failed
            }
        };
        shared.metrics().job_completed();
        shared.touch();
        job.done.signal(outcome);
    }
    debug!("aggregator drained");
}

/// Whether the peer has closed its write half: a non-blocking zero-length
/// peek. `WouldBlock` (no data, still open) and probe errors report open.
pub(crate) fn peer_half_closed(conn: &TcpStream) -> bool {
    if conn.set_nonblocking(true).is_err() {
        return false;
    }
    let mut probe = [0u8; 1];
    let result = conn.peek(&mut probe);
    let _ = conn.set_nonblocking(false);
    matches!(result, Ok(0))
}
