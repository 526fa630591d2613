use crate::graph::Graph;

// Union–find with path compression and union by rank.
struct Dsu {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl Dsu {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn unite(&mut self, x: usize, y: usize) -> bool {
        let (xr, yr) = (self.find(x), self.find(y));
        if xr == yr {
            return false;
        }
        match self.rank[xr].cmp(&self.rank[yr]) {
            std::cmp::Ordering::Less => self.parent[xr] = yr,
            std::cmp::Ordering::Greater => self.parent[yr] = xr,
            std::cmp::Ordering::Equal => {
                self.parent[yr] = xr;
                self.rank[xr] += 1;
            }
        }
        true
    }
}

// Kruskal: sort edges by weight, add each edge that joins two components.
// On a disconnected graph this yields the weight of the spanning forest.
pub(crate) fn mst_weight(graph: &Graph) -> i64 {
    let vertices = graph.vertex_count();
    let mut edges = graph.edges();
    edges.sort_by_key(|&(_, _, w)| w);

    let mut dsu = Dsu::new(vertices);
    let mut weight = 0i64;
    let mut used = 0;
    for (u, v, w) in edges {
        if u == v {
            continue;
        }
        if dsu.unite(u, v) {
            weight += w;
            used += 1;
            if used == vertices - 1 {
                break;
            }
        }
    }
    weight
}
