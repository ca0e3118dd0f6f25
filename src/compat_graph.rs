//! Pairwise compatibility graph over a catalog.
//!
//! Built once per run when candidate pre-selection is requested. Each of the
//! n(n-1)/2 pairs is checked with the color model; rows are computed in
//! parallel.

use log::info;
use rayon::prelude::*;

use crate::index::Catalog;

/// Symmetric adjacency matrix indexed by catalog position
#[derive(Debug, Clone)]
pub struct CompatibilityGraph {
    n: usize,
    adjacency: Vec<bool>,
}

impl CompatibilityGraph {
    pub fn build(catalog: &Catalog) -> Self {
        let n = catalog.len();

        let rows: Vec<Vec<bool>> = (0..n)
            .into_par_iter()
            .map(|i| {
                (0..n)
                    .map(|j| i != j && catalog.is_compatible(&[i, j]))
                    .collect()
            })
            .collect();

        let adjacency: Vec<bool> = rows.into_iter().flatten().collect();
        let graph = CompatibilityGraph { n, adjacency };

        info!(
            "Compatibility graph: {} indexes, {} compatible pairs",
            n,
            graph.edge_count()
        );
        graph
    }

    pub fn node_count(&self) -> usize {
        self.n
    }

    pub fn compatible(&self, i: usize, j: usize) -> bool {
        self.adjacency[i * self.n + j]
    }

    /// Whether `candidate` is compatible with every member already chosen
    pub fn compatible_with_all(&self, candidate: usize, chosen: &[usize]) -> bool {
        chosen.iter().all(|&c| self.compatible(candidate, c))
    }

    pub fn degree(&self, i: usize) -> usize {
        self.adjacency[i * self.n..(i + 1) * self.n]
            .iter()
            .filter(|&&e| e)
            .count()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().filter(|&&e| e).count() / 2
    }
}
