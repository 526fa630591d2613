use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::graph::{Graph, GraphError};

/// Generates a random graph, deterministically for a given seed.
///
/// Edges are drawn by rejection sampling: self-loops and duplicate edges
/// (unordered pairs for undirected graphs) are skipped until `edges` distinct
/// edges exist. `edges` is clamped to the maximum possible for the vertex
/// count and orientation, and an inverted weight range is normalized.
pub fn generate(
    vertices: usize,
    edges: usize,
    seed: u64,
    directed: bool,
    wmin: i64,
    wmax: i64,
) -> Result<Graph, GraphError> {
    let mut g = Graph::new(vertices, directed)?;

    let max_edges = if directed {
        vertices * (vertices - 1)
    } else {
        vertices * (vertices - 1) / 2
    };
    let edges = edges.min(max_edges);
    let (wmin, wmax) = if wmax < wmin { (wmax, wmin) } else { (wmin, wmax) };

    let mut rng = StdRng::seed_from_u64(seed);
    let mut used: BTreeSet<(usize, usize)> = BTreeSet::new();

    while used.len() < edges {
        let u = rng.random_range(0..vertices);
        let v = rng.random_range(0..vertices);
        if u == v {
            continue;
        }
        let key = if directed || u < v { (u, v) } else { (v, u) };
        if !used.insert(key) {
            continue;
        }
        let w = rng.random_range(wmin..=wmax);
        g.add_edge(u, v, w)?;
    }

    Ok(g)
}
