//! Algorithm selection and dispatch.
//!
//! The wire protocol names algorithms by string; [`Algorithm`] is the tagged
//! counterpart, and [`Algorithm::run_or_error`] is the single entry point the
//! pipeline stages call. It validates orientation and parameters and returns
//! either `RESULT <value>` or an `Error: ...` string, never panicking on bad
//! input.

mod cliques;
mod max_flow;
mod mst;
mod scc;

use crate::graph::Graph;

/// Optional algorithm parameters, present only when the request supplied
/// them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Params {
    /// Max-flow source vertex.
    pub src: Option<usize>,
    /// Max-flow sink vertex.
    pub sink: Option<usize>,
    /// Clique size.
    pub k: Option<usize>,
}

/// One of the four servable graph algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Edmonds–Karp maximum flow (directed).
    MaxFlow,
    /// Strongly connected component count (directed).
    Scc,
    /// Minimum spanning tree total weight (undirected).
    Mst,
    /// Number of k-cliques (undirected).
    Cliques,
}

impl Algorithm {
    /// All algorithms, in the order the ALL pipeline runs them.
    pub const ALL: [Algorithm; 4] = [
        Algorithm::MaxFlow,
        Algorithm::Scc,
        Algorithm::Mst,
        Algorithm::Cliques,
    ];

    /// Wire name of the algorithm.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::MaxFlow => "MAX_FLOW",
            Algorithm::Scc => "SCC",
            Algorithm::Mst => "MST",
            Algorithm::Cliques => "CLIQUES",
        }
    }

    /// Parses a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "MAX_FLOW" => Some(Algorithm::MaxFlow),
            "SCC" => Some(Algorithm::Scc),
            "MST" => Some(Algorithm::Mst),
            "CLIQUES" => Some(Algorithm::Cliques),
            _ => None,
        }
    }

    /// Whether the algorithm is defined on directed graphs.
    pub fn requires_directed(self) -> bool {
        matches!(self, Algorithm::MaxFlow | Algorithm::Scc)
    }

    /// Validates and runs the algorithm.
    ///
    /// `directed` is the orientation the client requested for the graph;
    /// algorithms that do not match it report a mismatch error instead of
    /// running. The result is either `RESULT <integer>` or a human-readable
    /// string starting with `Error:`.
    pub fn run_or_error(self, graph: &Graph, params: &Params, directed: bool) -> String {
        if directed != self.requires_directed() {
            return format!(
                "Error: cannot run {} on {} graph",
                self.name(),
                if directed { "directed" } else { "undirected" }
            );
        }

        let vertices = graph.vertex_count();
        match self {
            Algorithm::MaxFlow => {
                let (Some(src), Some(sink)) = (params.src, params.sink) else {
                    return "Error: missing SRC/SINK for MAX_FLOW".to_string();
                };
                if src >= vertices || sink >= vertices || src == sink {
                    return "Error: invalid SRC/SINK for MAX_FLOW".to_string();
                }
                format!("RESULT {}", max_flow::max_flow(graph, src, sink))
            }
            Algorithm::Scc => format!("RESULT {}", scc::scc_count(graph)),
            Algorithm::Mst => format!("RESULT {}", mst::mst_weight(graph)),
            Algorithm::Cliques => {
                let Some(k) = params.k else {
                    return "Error: missing K for CLIQUES".to_string();
                };
                if k < 2 || k > vertices {
                    return "Error: invalid K for CLIQUES".to_string();
                }
                format!("RESULT {}", cliques::count_cliques(graph, k))
            }
        }
    }
}
