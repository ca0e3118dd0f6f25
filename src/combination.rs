//! Candidate index combinations of a fixed size.
//!
//! Two strategies are offered. Small search spaces are enumerated
//! exhaustively in lexicographic order; large ones are sampled at random, one
//! k-subset per draw, for a bounded number of draws. When a compatibility
//! graph is attached, both strategies only build combinations whose members
//! are pairwise compatible, and every combination still passes the full
//! color check before it is yielded.

use rand::seq::{index, SliceRandom};
use rand::Rng;

use crate::compat_graph::CompatibilityGraph;
use crate::index::Catalog;

/// Largest number of k-subsets enumerated exhaustively
pub const DEFAULT_EXHAUSTIVE_LIMIT: u64 = 20_000;

/// Set of catalog positions, kept sorted so equal sets compare equal
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Combination(Vec<usize>);

impl Combination {
    pub fn new(mut members: Vec<usize>) -> Self {
        members.sort_unstable();
        members.dedup();
        Combination(members)
    }

    pub fn members(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, pos: usize) -> bool {
        self.0.binary_search(&pos).is_ok()
    }

    pub fn into_members(self) -> Vec<usize> {
        self.0
    }
}

/// Number of k-subsets of n items, saturating at `u64::MAX`
pub fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
        if acc > u64::MAX as u128 {
            return u64::MAX;
        }
    }
    acc as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Exhaustive,
    Sampled,
}

#[derive(Debug, Clone, Copy)]
pub struct CombinationGenerator<'a> {
    catalog: &'a Catalog,
    graph: Option<&'a CompatibilityGraph>,
    size: usize,
    exhaustive_limit: u64,
}

impl<'a> CombinationGenerator<'a> {
    pub fn new(catalog: &'a Catalog, size: usize) -> Self {
        CombinationGenerator {
            catalog,
            graph: None,
            size,
            exhaustive_limit: DEFAULT_EXHAUSTIVE_LIMIT,
        }
    }

    pub fn with_graph(mut self, graph: Option<&'a CompatibilityGraph>) -> Self {
        self.graph = graph;
        self
    }

    pub fn with_exhaustive_limit(mut self, limit: u64) -> Self {
        self.exhaustive_limit = limit;
        self
    }

    pub fn strategy(&self, candidate_count: usize) -> Strategy {
        if binomial(candidate_count, self.size) <= self.exhaustive_limit {
            Strategy::Exhaustive
        } else {
            Strategy::Sampled
        }
    }

    /// Graph pruning followed by the full color check
    pub fn is_valid(&self, members: &[usize]) -> bool {
        if let Some(graph) = self.graph {
            for (i, &a) in members.iter().enumerate() {
                if !graph.compatible_with_all(a, &members[i + 1..]) {
                    return false;
                }
            }
        }
        self.catalog.is_compatible(members)
    }

    /// Every compatible combination of the candidates, lexicographically
    pub fn exhaustive(&self, candidates: &[usize]) -> Exhaustive<'a> {
        let mut candidates = candidates.to_vec();
        candidates.sort_unstable();
        Exhaustive {
            done: self.size == 0 || self.size > candidates.len(),
            generator: *self,
            candidates,
            stack: Vec::with_capacity(self.size),
            chosen: Vec::with_capacity(self.size),
            next: 0,
        }
    }

    /// Random compatible combinations, at most one per draw
    pub fn sampled<'r, R: Rng>(
        &self,
        candidates: &[usize],
        rng: &'r mut R,
        max_draws: usize,
    ) -> Sampled<'a, 'r, R> {
        Sampled {
            generator: *self,
            candidates: candidates.to_vec(),
            rng,
            draws_left: if self.size == 0 || self.size > candidates.len() {
                0
            } else {
                max_draws
            },
        }
    }

    /// Lazy combination stream, choosing the strategy from the search space size
    pub fn generate<'r, R: Rng>(
        &self,
        candidates: &[usize],
        rng: &'r mut R,
        max_draws: usize,
    ) -> Box<dyn Iterator<Item = Combination> + 'r>
    where
        'a: 'r,
    {
        match self.strategy(candidates.len()) {
            Strategy::Exhaustive => Box::new(self.exhaustive(candidates)),
            Strategy::Sampled => Box::new(self.sampled(candidates, rng, max_draws)),
        }
    }
}

/// Depth-first enumeration of k-subsets with pairwise pruning
pub struct Exhaustive<'a> {
    generator: CombinationGenerator<'a>,
    candidates: Vec<usize>,
    // positions in `candidates` of the members chosen so far
    stack: Vec<usize>,
    chosen: Vec<usize>,
    next: usize,
    done: bool,
}

impl Exhaustive<'_> {
    fn backtrack(&mut self) {
        match self.stack.pop() {
            Some(i) => {
                self.chosen.pop();
                self.next = i + 1;
            }
            None => self.done = true,
        }
    }
}

impl Iterator for Exhaustive<'_> {
    type Item = Combination;

    fn next(&mut self) -> Option<Combination> {
        let size = self.generator.size;
        while !self.done {
            if self.chosen.len() == size {
                let members = self.chosen.clone();
                self.backtrack();
                if self.generator.catalog.is_compatible(&members) {
                    return Some(Combination(members));
                }
                continue;
            }

            if self.next + (size - self.chosen.len()) > self.candidates.len() {
                self.backtrack();
                continue;
            }

            let candidate = self.candidates[self.next];
            let fits = self
                .generator
                .graph
                .map_or(true, |g| g.compatible_with_all(candidate, &self.chosen));
            if fits {
                self.stack.push(self.next);
                self.chosen.push(candidate);
            }
            self.next += 1;
        }
        None
    }
}

/// Draw-bounded random sampling of k-subsets
pub struct Sampled<'a, 'r, R> {
    generator: CombinationGenerator<'a>,
    candidates: Vec<usize>,
    rng: &'r mut R,
    draws_left: usize,
}

impl<R: Rng> Sampled<'_, '_, R> {
    fn draw(&mut self) -> Option<Vec<usize>> {
        let size = self.generator.size;
        match self.generator.graph {
            None => Some(
                index::sample(&mut *self.rng, self.candidates.len(), size)
                    .into_iter()
                    .map(|i| self.candidates[i])
                    .collect(),
            ),
            Some(graph) => {
                // Grow a random clique of the compatibility graph
                self.candidates.shuffle(&mut *self.rng);
                let mut chosen = Vec::with_capacity(size);
                for &c in &self.candidates {
                    if graph.compatible_with_all(c, &chosen) {
                        chosen.push(c);
                        if chosen.len() == size {
                            return Some(chosen);
                        }
                    }
                }
                None
            }
        }
    }
}

impl<R: Rng> Iterator for Sampled<'_, '_, R> {
    type Item = Combination;

    fn next(&mut self) -> Option<Combination> {
        while self.draws_left > 0 {
            self.draws_left -= 1;
            if let Some(members) = self.draw() {
                if self.generator.catalog.is_compatible(&members) {
                    return Some(Combination::new(members));
                }
            }
        }
        None
    }
}
