use std::collections::BTreeMap;

/// Errors from graph construction and mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A graph must have at least one vertex.
    #[error("number of vertices must be positive")]
    NoVertices,
    /// A vertex index was outside `[0, vertex_count)`.
    #[error("vertex index {index} out of range (graph has {vertices} vertices)")]
    VertexOutOfRange {
        /// The offending index.
        index: usize,
        /// The graph's vertex count.
        vertices: usize,
    },
    /// Edge capacities must be strictly positive.
    #[error("edge capacity must be positive (got {0})")]
    NonPositiveCapacity(i64),
}

/// A directed or undirected graph with positive per-edge capacities.
///
/// Capacities are stored sparsely (one ordered map per vertex) so large but
/// sparse graphs stay cheap. For undirected graphs every edge is stored
/// symmetrically, so `capacity(u, v) == capacity(v, u)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    directed: bool,
    edge_count: usize,
    cap: Vec<BTreeMap<usize, i64>>,
}

impl Graph {
    /// Creates a graph with `vertices` vertices and no edges.
    pub fn new(vertices: usize, directed: bool) -> Result<Self, GraphError> {
        if vertices == 0 {
            return Err(GraphError::NoVertices);
        }
        Ok(Self {
            directed,
            edge_count: 0,
            cap: vec![BTreeMap::new(); vertices],
        })
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.cap.len()
    }

    /// Number of distinct edges inserted so far.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Whether the graph is directed.
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Adds an edge `u -> v` with the given capacity.
    ///
    /// For undirected graphs the reverse direction is stored as well.
    /// Re-adding an existing edge overwrites its capacity.
    pub fn add_edge(&mut self, u: usize, v: usize, capacity: i64) -> Result<(), GraphError> {
        let vertices = self.cap.len();
        for index in [u, v] {
            if index >= vertices {
                return Err(GraphError::VertexOutOfRange { index, vertices });
            }
        }
        if capacity <= 0 {
            return Err(GraphError::NonPositiveCapacity(capacity));
        }

        let fresh = self.cap[u].insert(v, capacity).is_none();
        if !self.directed && u != v {
            self.cap[v].insert(u, capacity);
        }
        if fresh {
            self.edge_count += 1;
        }
        Ok(())
    }

    /// Capacity of the edge `u -> v`, or 0 when absent or out of range.
    pub fn capacity(&self, u: usize, v: usize) -> i64 {
        self.cap
            .get(u)
            .and_then(|row| row.get(&v))
            .copied()
            .unwrap_or(0)
    }

    /// Whether an edge `u -> v` exists.
    pub fn has_edge(&self, u: usize, v: usize) -> bool {
        self.capacity(u, v) > 0
    }

    /// Out-neighbors of `u` with their capacities, in ascending vertex order.
    pub fn neighbors(&self, u: usize) -> impl Iterator<Item = (usize, i64)> + '_ {
        self.cap
            .get(u)
            .into_iter()
            .flat_map(|row| row.iter().map(|(&v, &c)| (v, c)))
    }

    /// All edges in deterministic order.
    ///
    /// Directed graphs yield every stored `(u, v, capacity)`. Undirected
    /// graphs yield each unordered pair once as `(u, v)` with `u < v`, with
    /// the larger of the two stored capacities.
    pub fn edges(&self) -> Vec<(usize, usize, i64)> {
        let mut out = Vec::with_capacity(self.edge_count);
        if self.directed {
            for (u, row) in self.cap.iter().enumerate() {
                for (&v, &c) in row {
                    out.push((u, v, c));
                }
            }
        } else {
            for (u, row) in self.cap.iter().enumerate() {
                for (&v, &c) in row.range(u + 1..) {
                    out.push((u, v, c.max(self.capacity(v, u))));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{Graph, GraphError};

    #[test]
    fn rejects_empty_graph() {
        assert_eq!(Graph::new(0, false).unwrap_err(), GraphError::NoVertices);
    }

    #[test]
    fn undirected_edges_are_symmetric() {
        let mut g = Graph::new(3, false).unwrap();
        g.add_edge(0, 2, 7).unwrap();
        assert_eq!(g.capacity(0, 2), 7);
        assert_eq!(g.capacity(2, 0), 7);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.edges(), vec![(0, 2, 7)]);
    }

    #[test]
    fn directed_edges_are_one_way() {
        let mut g = Graph::new(2, true).unwrap();
        g.add_edge(0, 1, 4).unwrap();
        assert_eq!(g.capacity(0, 1), 4);
        assert_eq!(g.capacity(1, 0), 0);
        assert!(g.has_edge(0, 1));
        assert!(!g.has_edge(1, 0));
    }

    #[test]
    fn add_edge_validates_inputs() {
        let mut g = Graph::new(2, true).unwrap();
        assert!(matches!(
            g.add_edge(0, 5, 1),
            Err(GraphError::VertexOutOfRange { index: 5, .. })
        ));
        assert_eq!(
            g.add_edge(0, 1, 0),
            Err(GraphError::NonPositiveCapacity(0))
        );
    }

    #[test]
    fn readding_an_edge_overwrites_capacity() {
        let mut g = Graph::new(2, true).unwrap();
        g.add_edge(0, 1, 1).unwrap();
        g.add_edge(0, 1, 9).unwrap();
        assert_eq!(g.capacity(0, 1), 9);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn neighbors_are_sorted() {
        let mut g = Graph::new(4, true).unwrap();
        g.add_edge(0, 3, 1).unwrap();
        g.add_edge(0, 1, 2).unwrap();
        let n: Vec<_> = g.neighbors(0).collect();
        assert_eq!(n, vec![(1, 2), (3, 1)]);
    }
}
