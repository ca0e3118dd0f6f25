//! Trial-bounded assembly of lanes from one catalog.
//!
//! Each trial builds every lane from scratch with its own random stream and
//! its own uniqueness ledger. Trials are independent, so they run in rayon
//! batches; outcomes are fed in trial order into a small state machine and
//! the lowest-numbered successful trial wins. With a fixed seed the result
//! does not depend on the number of threads.
//!
//! Unless full lanes are requested, a trial first looks for small compatible
//! cores (two indexes, then three, ...) and pads every core with further
//! indexes. Padding can only add color coverage, so padded lanes stay
//! compatible. Padding honours the uniqueness rule: under `index` it draws
//! from indexes no lane holds yet, under `lane` the padded lanes must still
//! differ from one another.
//!
//! Under `index`, cores drawn from an enumerated candidate list are packed
//! with a bounded backtracking search, so a trial only fails when no set of
//! disjoint cores exists or the step budget runs out.

use std::collections::HashMap;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::combination::{Combination, CombinationGenerator, Strategy, DEFAULT_EXHAUSTIVE_LIMIT};
use crate::compat_graph::CompatibilityGraph;
use crate::error::{DesignError, Result};
use crate::index::Catalog;
use crate::ledger::{UniquenessConstraint, UniquenessLedger};

/// Smallest core tried before padding
pub const CORE_START: usize = 2;
pub const DEFAULT_DRAWS_PER_LANE: usize = 1000;
pub const DEFAULT_MAX_TRIALS: usize = 10;
/// Candidate visits allowed per core size when packing disjoint cores
pub const MAX_PACKING_STEPS: usize = 1_000_000;

/// Trial loop state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchState {
    Searching { trials: usize },
    Succeeded { lanes: Vec<Vec<usize>>, trial: usize },
    ExhaustedTrials { trials: usize },
}

impl SearchState {
    pub fn start() -> Self {
        SearchState::Searching { trials: 0 }
    }

    /// Feed the outcome of the next trial
    pub fn advance(self, outcome: Option<Vec<Vec<usize>>>, max_trials: usize) -> Self {
        match self {
            SearchState::Searching { trials } => {
                let trials = trials + 1;
                match outcome {
                    Some(lanes) => SearchState::Succeeded {
                        lanes,
                        trial: trials,
                    },
                    None if trials >= max_trials => SearchState::ExhaustedTrials { trials },
                    None => SearchState::Searching { trials },
                }
            }
            terminal => terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SearchState::Searching { .. })
    }
}

/// Lanes of a successful search, as catalog positions in sample order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledLanes {
    pub lanes: Vec<Vec<usize>>,
    pub trials: usize,
}

enum CandidateSource {
    Exhaustive(Vec<Combination>),
    Sampled,
}

/// Per-run, read-only view of where candidates of each size come from
struct SearchPlan {
    core_sizes: Vec<usize>,
    sources: HashMap<usize, CandidateSource>,
}

/// Mutable state of a single trial
pub struct SearchContext {
    pub ledger: UniquenessLedger,
    rng: StdRng,
    // shuffled visiting order and cursor over each exhaustive list
    orders: HashMap<usize, (Vec<usize>, usize)>,
}

impl SearchContext {
    pub fn new(constraint: UniquenessConstraint, seed: u64) -> Self {
        SearchContext {
            ledger: UniquenessLedger::new(constraint),
            rng: StdRng::seed_from_u64(seed),
            orders: HashMap::new(),
        }
    }

    fn reset(&mut self) {
        self.ledger.clear();
        self.orders.clear();
    }
}

fn trial_seed(seed: u64, trial: usize) -> u64 {
    seed ^ (trial as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Fail early when the catalog cannot hold the requested lanes
pub fn check_capacity(
    catalog: &Catalog,
    multiplexing_rate: usize,
    nb_lanes: usize,
    constraint: UniquenessConstraint,
) -> Result<()> {
    let required = match constraint {
        UniquenessConstraint::Index => multiplexing_rate * nb_lanes,
        UniquenessConstraint::None | UniquenessConstraint::Lane => multiplexing_rate,
    };
    if catalog.len() < required {
        return Err(DesignError::IncompatiblePoolTooSmall {
            chemistry: catalog.chemistry(),
            available: catalog.len(),
            required,
        });
    }
    Ok(())
}

pub struct LaneAssembler<'a> {
    catalog: &'a Catalog,
    graph: Option<&'a CompatibilityGraph>,
    multiplexing_rate: usize,
    nb_lanes: usize,
    constraint: UniquenessConstraint,
    complete_lane: bool,
    max_trials: usize,
    draws_per_lane: usize,
    exhaustive_limit: u64,
    seed: u64,
    batch_size: usize,
}

impl<'a> LaneAssembler<'a> {
    pub fn new(catalog: &'a Catalog, multiplexing_rate: usize, nb_lanes: usize) -> Self {
        LaneAssembler {
            catalog,
            graph: None,
            multiplexing_rate,
            nb_lanes,
            constraint: UniquenessConstraint::None,
            complete_lane: false,
            max_trials: DEFAULT_MAX_TRIALS,
            draws_per_lane: DEFAULT_DRAWS_PER_LANE,
            exhaustive_limit: DEFAULT_EXHAUSTIVE_LIMIT,
            seed: 0,
            batch_size: rayon::current_num_threads(),
        }
    }

    pub fn with_graph(mut self, graph: Option<&'a CompatibilityGraph>) -> Self {
        self.graph = graph;
        self
    }

    pub fn with_constraint(mut self, constraint: UniquenessConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    pub fn with_complete_lane(mut self, complete_lane: bool) -> Self {
        self.complete_lane = complete_lane;
        self
    }

    pub fn with_max_trials(mut self, max_trials: usize) -> Self {
        self.max_trials = max_trials;
        self
    }

    pub fn with_draws_per_lane(mut self, draws: usize) -> Self {
        self.draws_per_lane = draws;
        self
    }

    pub fn with_exhaustive_limit(mut self, limit: u64) -> Self {
        self.exhaustive_limit = limit;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of trials evaluated concurrently
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run trials until one yields a full set of lanes or the budget is spent
    pub fn assemble(&self) -> Result<AssembledLanes> {
        if self.multiplexing_rate == 0 || self.nb_lanes == 0 {
            return Err(DesignError::invalid_input(
                "Multiplexing rate and number of lanes must be positive",
            ));
        }
        if self.max_trials == 0 {
            return Err(DesignError::invalid_input(
                "At least one trial is required",
            ));
        }
        check_capacity(
            self.catalog,
            self.multiplexing_rate,
            self.nb_lanes,
            self.constraint,
        )?;

        let plan = self.plan();
        let mut state = SearchState::start();

        loop {
            let trials = match &state {
                SearchState::Searching { trials } => *trials,
                _ => break,
            };
            let end = (trials + self.batch_size).min(self.max_trials);
            let outcomes: Vec<Option<Vec<Vec<usize>>>> = (trials..end)
                .into_par_iter()
                .map(|trial| self.run_trial(&plan, trial))
                .collect();

            for outcome in outcomes {
                state = state.advance(outcome, self.max_trials);
                if state.is_terminal() {
                    break;
                }
            }
        }

        match state {
            SearchState::Succeeded { lanes, trial } => {
                info!(
                    "Found {} lanes of {} indexes at trial {}/{}",
                    lanes.len(),
                    self.multiplexing_rate,
                    trial,
                    self.max_trials
                );
                Ok(AssembledLanes {
                    lanes,
                    trials: trial,
                })
            }
            SearchState::ExhaustedTrials { trials } | SearchState::Searching { trials } => {
                Err(DesignError::NoSolutionFound { trials })
            }
        }
    }

    fn generator(&self, size: usize) -> CombinationGenerator<'a> {
        CombinationGenerator::new(self.catalog, size)
            .with_graph(self.graph)
            .with_exhaustive_limit(self.exhaustive_limit)
    }

    fn plan(&self) -> SearchPlan {
        let core_sizes: Vec<usize> =
            if self.complete_lane || self.multiplexing_rate <= CORE_START {
                vec![self.multiplexing_rate]
            } else {
                (CORE_START..=self.multiplexing_rate).collect()
            };

        let n = self.catalog.len();
        let candidates: Vec<usize> = (0..n).collect();
        let mut sources = HashMap::new();

        for &size in &core_sizes {
            let generator = self.generator(size);
            let source = match generator.strategy(n) {
                Strategy::Exhaustive => {
                    let all: Vec<Combination> = generator.exhaustive(&candidates).collect();
                    info!(
                        "Size {size}: {} compatible combinations among {} indexes",
                        all.len(),
                        n
                    );
                    CandidateSource::Exhaustive(all)
                }
                Strategy::Sampled => {
                    info!(
                        "Size {size}: search space too large to enumerate, sampling up to {} draws per lane",
                        self.draws_per_lane
                    );
                    CandidateSource::Sampled
                }
            };
            sources.insert(size, source);
        }

        SearchPlan {
            core_sizes,
            sources,
        }
    }

    fn run_trial(&self, plan: &SearchPlan, trial: usize) -> Option<Vec<Vec<usize>>> {
        let mut ctx = SearchContext::new(self.constraint, trial_seed(self.seed, trial));

        for &size in &plan.core_sizes {
            ctx.reset();
            let Some(cores) = self.assemble_cores(plan, size, &mut ctx) else {
                debug!("Trial {}: no lanes with cores of size {size}", trial + 1);
                continue;
            };

            let lanes = if size == self.multiplexing_rate {
                cores.into_iter().map(Combination::into_members).collect()
            } else {
                match self.complete(cores, size, &mut ctx) {
                    Some(lanes) => lanes,
                    None => {
                        debug!("Trial {}: could not pad cores of size {size}", trial + 1);
                        continue;
                    }
                }
            };

            // Sample order inside a lane carries no meaning
            let lanes = lanes
                .into_iter()
                .map(|mut lane| {
                    lane.shuffle(&mut ctx.rng);
                    lane
                })
                .collect();
            return Some(lanes);
        }
        None
    }

    fn assemble_cores(
        &self,
        plan: &SearchPlan,
        size: usize,
        ctx: &mut SearchContext,
    ) -> Option<Vec<Combination>> {
        if self.constraint == UniquenessConstraint::Index {
            if let Some(CandidateSource::Exhaustive(all)) = plan.sources.get(&size) {
                return self.pack_disjoint(all, ctx);
            }
        }

        let mut cores = Vec::with_capacity(self.nb_lanes);
        for _ in 0..self.nb_lanes {
            let core = self.draw_lane(plan, size, ctx)?;
            ctx.ledger.record(&core);
            cores.push(core);
        }
        Some(cores)
    }

    /// Backtracking search for `nb_lanes` pairwise disjoint cores.
    ///
    /// Candidates are visited in a per-trial shuffled order and each chosen
    /// core only looks at candidates after it, so every set of cores is
    /// reached at most once. Gives up after `MAX_PACKING_STEPS` visits.
    fn pack_disjoint(&self, all: &[Combination], ctx: &mut SearchContext) -> Option<Vec<Combination>> {
        let mut order: Vec<usize> = (0..all.len()).collect();
        order.shuffle(&mut ctx.rng);

        let mut taken = vec![false; self.catalog.len()];
        // positions in `order` of the cores chosen so far
        let mut chosen: Vec<usize> = Vec::with_capacity(self.nb_lanes);
        let mut next = 0;
        let mut steps = 0;

        while chosen.len() < self.nb_lanes {
            let mut found = None;
            while next < order.len() {
                if steps == MAX_PACKING_STEPS {
                    debug!("Gave up packing disjoint cores after {steps} steps");
                    return None;
                }
                steps += 1;
                if all[order[next]].members().iter().all(|&p| !taken[p]) {
                    found = Some(next);
                    break;
                }
                next += 1;
            }

            match found {
                Some(i) => {
                    for &p in all[order[i]].members() {
                        taken[p] = true;
                    }
                    chosen.push(i);
                    next = i + 1;
                }
                None => {
                    let i = chosen.pop()?;
                    for &p in all[order[i]].members() {
                        taken[p] = false;
                    }
                    next = i + 1;
                }
            }
        }

        let cores: Vec<Combination> = chosen.iter().map(|&i| all[order[i]].clone()).collect();
        for core in &cores {
            ctx.ledger.record(core);
        }
        Some(cores)
    }

    fn draw_lane(&self, plan: &SearchPlan, size: usize, ctx: &mut SearchContext) -> Option<Combination> {
        match plan.sources.get(&size) {
            Some(CandidateSource::Exhaustive(all)) => {
                if all.is_empty() {
                    return None;
                }
                if self.constraint == UniquenessConstraint::None {
                    return all.choose(&mut ctx.rng).cloned();
                }
                // Skipped entries stay inadmissible: the ledger only grows
                let rng = &mut ctx.rng;
                let (order, cursor) = ctx.orders.entry(size).or_insert_with(|| {
                    let mut order: Vec<usize> = (0..all.len()).collect();
                    order.shuffle(rng);
                    (order, 0)
                });
                while *cursor < order.len() {
                    let candidate = &all[order[*cursor]];
                    *cursor += 1;
                    if ctx.ledger.admits(candidate) {
                        return Some(candidate.clone());
                    }
                }
                None
            }
            Some(CandidateSource::Sampled) | None => {
                // Consumed indexes can bring the space back under the exhaustive limit
                let candidates = ctx.ledger.available(self.catalog.len());
                let ledger = &ctx.ledger;
                self.generator(size)
                    .generate(&candidates, &mut ctx.rng, self.draws_per_lane)
                    .find(|c| ledger.admits(c))
            }
        }
    }

    /// Pad every core up to the multiplexing rate
    fn complete(
        &self,
        cores: Vec<Combination>,
        core_size: usize,
        ctx: &mut SearchContext,
    ) -> Option<Vec<Vec<usize>>> {
        let extra = self.multiplexing_rate - core_size;
        let n = self.catalog.len();
        let mut lanes = Vec::with_capacity(cores.len());

        match self.constraint {
            UniquenessConstraint::Index => {
                let mut free = ctx.ledger.available(n);
                if free.len() < extra * cores.len() {
                    return None;
                }
                free.shuffle(&mut ctx.rng);
                for (core, padding) in cores.into_iter().zip(free.chunks(extra)) {
                    ctx.ledger.consume(padding);
                    let mut lane = core.into_members();
                    lane.extend_from_slice(padding);
                    lanes.push(lane);
                }
            }
            UniquenessConstraint::None | UniquenessConstraint::Lane => {
                let mut padded = UniquenessLedger::new(self.constraint);
                for core in cores {
                    let others: Vec<usize> = (0..n).filter(|&p| !core.contains(p)).collect();
                    let mut lane = None;
                    for _ in 0..self.draws_per_lane.max(1) {
                        let mut members = core.members().to_vec();
                        members.extend(others.choose_multiple(&mut ctx.rng, extra).copied());
                        let full = Combination::new(members);
                        if padded.admits(&full) {
                            padded.record(&full);
                            lane = Some(full.into_members());
                            break;
                        }
                    }
                    lanes.push(lane?);
                }
            }
        }

        debug_assert!(lanes.iter().all(|lane| self.catalog.is_compatible(lane)));
        Some(lanes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chemistry::Chemistry;
    use crate::index::IndexPool;
    use std::collections::HashSet;

    fn catalog(entries: &[(&str, &str)], chemistry: Chemistry) -> Catalog {
        IndexPool::new(entries.iter().copied())
            .unwrap()
            .usable_for(chemistry)
    }

    // Colors RRRRRR/GGGGGG and RRRGGG/GGGRRR complement in pairs
    const PAIRED: [(&str, &str); 8] = [
        ("p1", "ACACAC"),
        ("p2", "GTGTGT"),
        ("p3", "ACAGTG"),
        ("p4", "GTGACA"),
        ("p5", "CCAAGG"),
        ("p6", "TTGGCC"),
        ("p7", "AAGGCC"),
        ("p8", "GGCCTT"),
    ];

    #[test]
    fn test_state_machine() {
        let state = SearchState::start();
        let state = state.advance(None, 3);
        assert_eq!(state, SearchState::Searching { trials: 1 });
        let state = state.advance(Some(vec![vec![0]]), 3);
        assert_eq!(
            state,
            SearchState::Succeeded {
                lanes: vec![vec![0]],
                trial: 2
            }
        );
        // terminal states absorb further outcomes
        assert!(state.clone().advance(None, 3).is_terminal());

        let exhausted = SearchState::start().advance(None, 2).advance(None, 2);
        assert_eq!(exhausted, SearchState::ExhaustedTrials { trials: 2 });
    }

    #[test]
    fn test_index_constraint_partitions_pool() {
        let catalog = catalog(&PAIRED, Chemistry::FourChannel);
        let found = LaneAssembler::new(&catalog, 2, 4)
            .with_constraint(UniquenessConstraint::Index)
            .with_max_trials(20)
            .with_seed(11)
            .assemble()
            .unwrap();

        assert_eq!(found.lanes.len(), 4);
        let mut seen = HashSet::new();
        for lane in &found.lanes {
            assert_eq!(lane.len(), 2);
            assert!(catalog.is_compatible(lane));
            for &pos in lane {
                assert!(seen.insert(pos), "index used twice");
            }
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn test_index_constraint_finds_single_partition() {
        // No three disjoint compatible pairs exist, and the only split into
        // compatible triples is {0,2,4} {1,5,6} {3,7,8}
        let catalog = catalog(
            &[
                ("s1", "GGATCG"),
                ("s2", "AGCAGG"),
                ("s3", "AGATAA"),
                ("s4", "ACTACG"),
                ("s5", "ACTCTA"),
                ("s6", "GTCGCA"),
                ("s7", "CATCCC"),
                ("s8", "GAACAC"),
                ("s9", "ATCTGC"),
            ],
            Chemistry::FourChannel,
        );
        let expected: HashSet<Vec<usize>> =
            [vec![0, 2, 4], vec![1, 5, 6], vec![3, 7, 8]].into_iter().collect();

        for seed in 0..16 {
            let found = LaneAssembler::new(&catalog, 3, 3)
                .with_constraint(UniquenessConstraint::Index)
                .with_max_trials(1)
                .with_batch_size(1)
                .with_seed(seed)
                .assemble()
                .unwrap_or_else(|e| panic!("seed {seed}: {e}"));
            let lanes: HashSet<Vec<usize>> = found
                .lanes
                .into_iter()
                .map(|mut lane| {
                    lane.sort_unstable();
                    lane
                })
                .collect();
            assert_eq!(lanes, expected, "seed {seed}");
        }
    }

    #[test]
    fn test_index_constraint_sampled_path() {
        let catalog = catalog(&PAIRED, Chemistry::FourChannel);
        let found = LaneAssembler::new(&catalog, 2, 2)
            .with_complete_lane(true)
            .with_exhaustive_limit(0)
            .with_constraint(UniquenessConstraint::Index)
            .with_seed(8)
            .assemble()
            .unwrap();
        assert_eq!(found.lanes.len(), 2);
        let a: HashSet<_> = found.lanes[0].iter().collect();
        let b: HashSet<_> = found.lanes[1].iter().collect();
        assert!(a.is_disjoint(&b));
        assert!(found.lanes.iter().all(|lane| catalog.is_compatible(lane)));
    }

    #[test]
    fn test_core_padding_keeps_compatibility() {
        let catalog = catalog(&PAIRED, Chemistry::FourChannel);
        let found = LaneAssembler::new(&catalog, 4, 3)
            .with_max_trials(5)
            .with_seed(3)
            .assemble()
            .unwrap();
        for lane in &found.lanes {
            assert_eq!(lane.len(), 4);
            let distinct: HashSet<_> = lane.iter().collect();
            assert_eq!(distinct.len(), 4);
            assert!(catalog.is_compatible(lane));
        }
    }

    #[test]
    fn test_same_seed_same_lanes() {
        let catalog = catalog(&PAIRED, Chemistry::FourChannel);
        let run = |batch| {
            LaneAssembler::new(&catalog, 3, 4)
                .with_constraint(UniquenessConstraint::Lane)
                .with_seed(42)
                .with_batch_size(batch)
                .assemble()
                .unwrap()
        };
        assert_eq!(run(1), run(4));
    }

    #[test]
    fn test_no_solution_after_budget() {
        // All red: nothing is ever compatible under four-channel rules
        let catalog = catalog(
            &[("r1", "ACAC"), ("r2", "CACA"), ("r3", "AACC"), ("r4", "CCAA")],
            Chemistry::FourChannel,
        );
        let err = LaneAssembler::new(&catalog, 2, 1)
            .with_max_trials(3)
            .with_draws_per_lane(10)
            .assemble()
            .unwrap_err();
        assert!(matches!(err, DesignError::NoSolutionFound { trials: 3 }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_capacity_for_index_constraint() {
        let catalog = catalog(&PAIRED, Chemistry::FourChannel);
        let err = LaneAssembler::new(&catalog, 3, 3)
            .with_constraint(UniquenessConstraint::Index)
            .assemble()
            .unwrap_err();
        assert!(matches!(
            err,
            DesignError::IncompatiblePoolTooSmall {
                available: 8,
                required: 9,
                ..
            }
        ));
        // Without the index rule, one lane's worth is enough
        assert!(check_capacity(&catalog, 3, 3, UniquenessConstraint::Lane).is_ok());
    }

    #[test]
    fn test_sampled_path() {
        let catalog = catalog(&PAIRED, Chemistry::FourChannel);
        let found = LaneAssembler::new(&catalog, 3, 2)
            .with_complete_lane(true)
            .with_exhaustive_limit(0)
            .with_constraint(UniquenessConstraint::Lane)
            .with_seed(5)
            .assemble()
            .unwrap();
        assert_eq!(found.lanes.len(), 2);
        let a: HashSet<_> = found.lanes[0].iter().collect();
        let b: HashSet<_> = found.lanes[1].iter().collect();
        assert_ne!(a, b);
    }
}
