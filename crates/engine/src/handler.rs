use std::io::{self, Write};
use std::net::TcpStream;
use std::sync::Arc;

use graphpipe_graph::{Algorithm, Graph, generate};
use tracing::debug;

use crate::job::{Job, JobKind, Latch, ReplyOutcome, ResultSlots};
use crate::lifecycle::Shared;
use crate::pipeline::{StageQueues, peer_half_closed};
use crate::protocol::{self, ReadOutcome, Request, V_SAFE_MAX, format_response};

enum Step {
    Continue,
    Close,
}

/// Per-connection loop: one request at a time, each reply fully written (by
/// the aggregator) before the next request is read. Returning closes the
/// connection: the caller drops the last `Arc<TcpStream>` after
/// deregistering it.
pub(crate) fn handle_connection(
    conn: &Arc<TcpStream>,
    conn_id: u64,
    queues: &StageQueues,
    shared: &Shared,
) {
    loop {
        let mut reader: &TcpStream = conn;
        let buf = match protocol::read_request(&mut reader) {
            Ok(ReadOutcome::Request(buf)) => buf,
            Ok(ReadOutcome::Eof) => return,
            Ok(ReadOutcome::TooLarge) => {
                let _ = reply(conn, "Request too large", false);
                return;
            }
            Err(err) => {
                debug!(conn_id, "request read failed: {err}");
                return;
            }
        };

        if buf == "EXIT\n" || buf.contains("\nEXIT\n") {
            let _ = reply(conn, "BYE", true);
            return;
        }
        if buf
            .lines()
            .any(|line| line.strip_suffix('\r').unwrap_or(line) == "SHUTDOWN")
        {
            let _ = reply(conn, "SERVER_SHUTTING_DOWN", true);
            shared.trigger_shutdown("SHUTDOWN request");
            return;
        }

        let step = match protocol::parse_request(&buf) {
            Ok(request) => process_request(conn, conn_id, request, queues, shared),
            Err(err) => refuse(conn, shared, &err.to_string()),
        };
        match step {
            Step::Continue => {}
            Step::Close => return,
        }
    }
}

// Validate, build the graph, hand the job to the pipeline, and wait for the
// aggregator to finish the reply.
fn process_request(
    conn: &Arc<TcpStream>,
    conn_id: u64,
    request: Request,
    queues: &StageQueues,
    shared: &Shared,
) -> Step {
    let vertices = match request.vertices {
        Some(v) if v >= 1 => v,
        _ => return refuse(conn, shared, "Missing/invalid V"),
    };
    if vertices > V_SAFE_MAX {
        return refuse(conn, shared, "V too large");
    }
    let vertices = vertices as usize;

    if request.random && request.edges_declared.unwrap_or(0) < 0 {
        return refuse(conn, shared, "Missing/invalid E");
    }

    let graph = match build_graph(&request, vertices) {
        Ok(graph) => graph,
        Err(message) => return refuse(conn, shared, &message),
    };

    let kind = match request.alg.as_deref() {
        Some("PREVIEW") => JobKind::Preview,
        Some("ALL") => JobKind::All,
        Some(name) => match Algorithm::from_name(name) {
            Some(alg) => JobKind::Single(alg),
            None => return refuse(conn, shared, "Unsupported algorithm"),
        },
        None => return refuse(conn, shared, "Unsupported algorithm"),
    };

    let done = Arc::new(Latch::new());
    let job = Job {
        conn: conn.clone(),
        conn_id,
        kind,
        directed: request.directed,
        graph,
        params: request.params,
        results: ResultSlots::default(),
        done: done.clone(),
    };
    if queues.entry(kind).push(job).is_err() {
        // Pipeline is closing; the connection is being torn down anyway.
        debug!(conn_id, "pipeline closed, dropping request");
        return Step::Close;
    }

    // The aggregator owns the reply; block until it has been written so the
    // next read cannot overtake it.
    match done.wait() {
        ReplyOutcome::Sent => {
            shared.metrics().request_ok();
            shared.touch();
            Step::Continue
        }
        ReplyOutcome::PeerClosed | ReplyOutcome::Failed => Step::Close,
    }
}

// Build the graph from explicit EDGE lines, or the generator for RANDOM=1
// (edge count clamped to the orientation's maximum). Messages are wire
// bodies.
fn build_graph(request: &Request, vertices: usize) -> Result<Graph, String> {
    if request.random {
        let max_edges = if request.directed {
            vertices * (vertices - 1)
        } else {
            vertices * (vertices - 1) / 2
        };
        let edges = (request.edges_declared.unwrap_or(0).max(0) as usize).min(max_edges);
        return generate(
            vertices,
            edges,
            request.seed as u64,
            request.directed,
            request.wmin,
            request.wmax,
        )
        .map_err(|err| err.to_string());
    }

    // Validate every declared edge before touching the graph so the whole
    // request is rejected on the first bad edge.
    for edge in &request.edges {
        if edge.u < 0 || edge.v < 0 || edge.u >= vertices as i64 || edge.v >= vertices as i64 {
            return Err("Invalid EDGE vertex index".to_string());
        }
        if edge.w <= 0 {
            return Err("Invalid EDGE weight".to_string());
        }
    }
    let mut graph = Graph::new(vertices, request.directed).map_err(|err| err.to_string())?;
    for edge in &request.edges {
        graph
            .add_edge(edge.u as usize, edge.v as usize, edge.w)
            .map_err(|err| err.to_string())?;
    }
    Ok(graph)
}

// ERR reply that keeps the connection open unless the peer already
// half-closed or the write fails.
fn refuse(conn: &TcpStream, shared: &Shared, message: &str) -> Step {
    shared.metrics().request_err();
    if reply(conn, message, false).is_err() || peer_half_closed(conn) {
        Step::Close
    } else {
        Step::Continue
    }
}

fn reply(conn: &TcpStream, body: &str, ok: bool) -> io::Result<()> {
    let mut writer: &TcpStream = conn;
    writer.write_all(format_response(body, ok).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::build_graph;
    use crate::protocol::{EdgeSpec, Request};

    fn explicit(edges: Vec<EdgeSpec>) -> Request {
        Request {
            edges,
            ..Request::default()
        }
    }

    #[test]
    fn explicit_edges_are_validated_before_insertion() {
        let req = explicit(vec![
            EdgeSpec { u: 0, v: 1, w: 1 },
            EdgeSpec { u: 0, v: 9, w: 1 },
        ]);
        assert_eq!(
            build_graph(&req, 3),
            Err("Invalid EDGE vertex index".to_string())
        );

        let req = explicit(vec![EdgeSpec { u: 0, v: 1, w: 0 }]);
        assert_eq!(build_graph(&req, 3), Err("Invalid EDGE weight".to_string()));

        let req = explicit(vec![EdgeSpec { u: 0, v: -1, w: 1 }]);
        assert_eq!(
            build_graph(&req, 3),
            Err("Invalid EDGE vertex index".to_string())
        );
    }

    #[test]
    fn explicit_graph_is_built_as_declared() {
        let req = explicit(vec![
            EdgeSpec { u: 0, v: 1, w: 2 },
            EdgeSpec { u: 1, v: 2, w: 3 },
        ]);
        let graph = build_graph(&req, 3).unwrap();
        assert_eq!(graph.capacity(0, 1), 2);
        assert_eq!(graph.capacity(1, 2), 3);
    }

    #[test]
    fn random_edge_count_is_clamped() {
        let req = Request {
            random: true,
            edges_declared: Some(1_000),
            ..Request::default()
        };
        // 4 undirected vertices allow at most 6 edges.
        let graph = build_graph(&req, 4).unwrap();
        assert_eq!(graph.edges().len(), 6);
    }
}
