use crate::graph::Graph;

// Counts k-cliques by enumerating ascending vertex combinations. Each new
// member is checked against the current partial clique, which prunes most
// branches early. Exponential in the worst case, as enumeration must be.
pub(crate) fn count_cliques(graph: &Graph, k: usize) -> u64 {
    let mut current = Vec::with_capacity(k);
    extend(graph, k, 0, &mut current)
}

fn extend(graph: &Graph, k: usize, start: usize, current: &mut Vec<usize>) -> u64 {
    if current.len() == k {
        return 1;
    }
    let mut count = 0;
    for v in start..graph.vertex_count() {
        if current.iter().all(|&u| graph.has_edge(u, v)) {
            current.push(v);
            count += extend(graph, k, v + 1, current);
            current.pop();
        }
    }
    count
}
