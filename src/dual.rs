//! Dual-index designs: independent i7 and i5 searches paired lane by lane.
//!
//! The sequencer reads each index separately, so each read only has to be
//! compatible on its own. Dual runs always search full lanes, without a
//! uniqueness rule and without the compatibility graph.

use log::info;

use crate::assembler::{LaneAssembler, DEFAULT_DRAWS_PER_LANE, DEFAULT_MAX_TRIALS};
use crate::design::Design;
use crate::error::{DesignError, Result};
use crate::index::Catalog;
use crate::ledger::UniquenessConstraint;

// Keeps the i5 random stream apart from the i7 one under a shared seed
const SECOND_POOL_SALT: u64 = 0x5BD1_E995_D6E8_FEB8;

pub struct DualIndexComposer<'a> {
    first: &'a Catalog,
    second: &'a Catalog,
    multiplexing_rate: usize,
    nb_lanes: usize,
    max_trials: usize,
    draws_per_lane: usize,
    seed: u64,
}

impl<'a> DualIndexComposer<'a> {
    pub fn new(
        first: &'a Catalog,
        second: &'a Catalog,
        multiplexing_rate: usize,
        nb_lanes: usize,
    ) -> Self {
        DualIndexComposer {
            first,
            second,
            multiplexing_rate,
            nb_lanes,
            max_trials: DEFAULT_MAX_TRIALS,
            draws_per_lane: DEFAULT_DRAWS_PER_LANE,
            seed: 0,
        }
    }

    pub fn with_max_trials(mut self, max_trials: usize) -> Self {
        self.max_trials = max_trials;
        self
    }

    pub fn with_draws_per_lane(mut self, draws: usize) -> Self {
        self.draws_per_lane = draws;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn assemble_one(&self, catalog: &Catalog, seed: u64) -> Result<Design> {
        let assembled = LaneAssembler::new(catalog, self.multiplexing_rate, self.nb_lanes)
            .with_constraint(UniquenessConstraint::None)
            .with_complete_lane(true)
            .with_graph(None)
            .with_max_trials(self.max_trials)
            .with_draws_per_lane(self.draws_per_lane)
            .with_seed(seed)
            .assemble()?;
        Ok(Design::from_lanes(catalog, &assembled))
    }

    pub fn compose(&self) -> Result<Design> {
        info!(
            "Dual indexing: searching {} full lanes per read, no unicity constraint",
            self.nb_lanes
        );
        let first = self.assemble_one(self.first, self.seed)?;
        let second = self.assemble_one(self.second, self.seed ^ SECOND_POOL_SALT)?;
        pair_designs(first, second)
    }
}

/// Pair lane i of `first` with lane i of `second`, slot by slot
pub fn pair_designs(first: Design, second: Design) -> Result<Design> {
    if first.nb_lanes() != second.nb_lanes() {
        return Err(DesignError::invalid_input(format!(
            "Cannot pair designs with {} and {} lanes",
            first.nb_lanes(),
            second.nb_lanes()
        )));
    }

    let mut paired = first;
    for (lane, other) in paired.lanes.iter_mut().zip(second.lanes) {
        if lane.assignments.len() != other.assignments.len() {
            return Err(DesignError::invalid_input(format!(
                "Lane {} holds {} i7 and {} i5 indexes",
                lane.number,
                lane.assignments.len(),
                other.assignments.len()
            )));
        }
        for (slot, o) in lane.assignments.iter_mut().zip(other.assignments) {
            slot.second = Some(o.index);
        }
    }
    Ok(paired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::AssembledLanes;
    use crate::chemistry::Chemistry;
    use crate::index::IndexPool;

    fn catalog(entries: &[(&str, &str)]) -> Catalog {
        IndexPool::new(entries.iter().copied())
            .unwrap()
            .usable_for(Chemistry::FourChannel)
    }

    #[test]
    fn test_pair_designs_positionally() {
        let i7 = catalog(&[("a", "ACAC"), ("b", "GTGT")]);
        let i5 = catalog(&[("x", "ACGT"), ("y", "GTAC")]);
        let lanes = AssembledLanes {
            lanes: vec![vec![0, 1]],
            trials: 1,
        };
        let paired = pair_designs(
            Design::from_lanes(&i7, &lanes),
            Design::from_lanes(&i5, &lanes),
        )
        .unwrap();

        assert!(paired.is_dual());
        let slots = &paired.lanes[0].assignments;
        assert_eq!(slots[0].index.id, "a");
        assert_eq!(slots[0].second.as_ref().unwrap().id, "x");
        assert_eq!(slots[1].second.as_ref().unwrap().id, "y");
    }

    #[test]
    fn test_pair_designs_rejects_mismatch() {
        let i7 = catalog(&[("a", "ACAC"), ("b", "GTGT")]);
        let one = Design::from_lanes(&i7, &AssembledLanes { lanes: vec![vec![0, 1]], trials: 1 });
        let two = Design::from_lanes(
            &i7,
            &AssembledLanes {
                lanes: vec![vec![0, 1], vec![1, 0]],
                trials: 1,
            },
        );
        assert!(pair_designs(one, two).is_err());
    }

    #[test]
    fn test_compose_small_pools() {
        let i7 = catalog(&[("a", "ACAC"), ("b", "GTGT"), ("c", "ACGT"), ("d", "GTAC")]);
        let i5 = catalog(&[("w", "CACA"), ("x", "TGTG"), ("y", "CATG"), ("z", "TGCA")]);
        let design = DualIndexComposer::new(&i7, &i5, 2, 2)
            .with_seed(9)
            .compose()
            .unwrap();
        assert_eq!(design.nb_lanes(), 2);
        assert!(design.is_valid(UniquenessConstraint::None));
        for lane in &design.lanes {
            assert_eq!(lane.second_ids().len(), 2);
        }
    }
}
