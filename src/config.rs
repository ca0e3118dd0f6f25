//! Run parameters and the top-level search entry point.

use log::{info, warn};

use crate::assembler::{
    check_capacity, LaneAssembler, DEFAULT_DRAWS_PER_LANE, DEFAULT_MAX_TRIALS,
};
use crate::chemistry::Chemistry;
use crate::compat_graph::CompatibilityGraph;
use crate::design::Design;
use crate::dual::DualIndexComposer;
use crate::error::{DesignError, Result};
use crate::index::IndexPool;
use crate::ledger::UniquenessConstraint;

/// Parameters of one design run
#[derive(Debug, Clone, PartialEq)]
pub struct DesignParams {
    pub nb_samples: usize,
    pub multiplexing_rate: usize,
    pub chemistry: Chemistry,
    pub constraint: UniquenessConstraint,
    /// Search full lanes directly instead of padding small cores
    pub complete_lane: bool,
    /// Precompute pairwise compatibility and restrict candidates to it
    pub select_compatible: bool,
    pub max_trials: usize,
    pub draws_per_lane: usize,
    pub seed: Option<u64>,
}

impl Default for DesignParams {
    fn default() -> Self {
        DesignParams {
            nb_samples: 0,
            multiplexing_rate: 0,
            chemistry: Chemistry::FourChannel,
            constraint: UniquenessConstraint::None,
            complete_lane: false,
            select_compatible: false,
            max_trials: DEFAULT_MAX_TRIALS,
            draws_per_lane: DEFAULT_DRAWS_PER_LANE,
            seed: None,
        }
    }
}

impl DesignParams {
    pub fn new(nb_samples: usize, multiplexing_rate: usize) -> Self {
        DesignParams {
            nb_samples,
            multiplexing_rate,
            ..Default::default()
        }
    }

    pub fn with_chemistry(mut self, chemistry: Chemistry) -> Self {
        self.chemistry = chemistry;
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

    pub fn with_select_compatible(mut self, select_compatible: bool) -> Self {
        self.select_compatible = select_compatible;
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

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn nb_lanes(&self) -> usize {
        if self.multiplexing_rate == 0 {
            0
        } else {
            self.nb_samples / self.multiplexing_rate
        }
    }

    /// Reject parameter combinations that can never produce a design
    pub fn validate(&self, first: &IndexPool, second: Option<&IndexPool>) -> Result<()> {
        if self.multiplexing_rate == 0 {
            return Err(DesignError::invalid_input(
                "Multiplexing rate must be at least 1",
            ));
        }
        if self.nb_samples == 0 {
            return Err(DesignError::invalid_input("Number of samples must be at least 1"));
        }
        if self.nb_samples % self.multiplexing_rate != 0 {
            return Err(DesignError::invalid_input(format!(
                "Number of samples ({}) must be a multiple of the multiplexing rate ({})",
                self.nb_samples, self.multiplexing_rate
            )));
        }
        if self.max_trials == 0 {
            return Err(DesignError::invalid_input(
                "Maximum number of trials must be at least 1",
            ));
        }
        if self.draws_per_lane == 0 {
            return Err(DesignError::invalid_input(
                "Draws per lane must be at least 1",
            ));
        }
        for (read, pool) in [("i7", Some(first)), ("i5", second)] {
            let Some(pool) = pool else { continue };
            if self.multiplexing_rate > pool.len() {
                return Err(DesignError::invalid_input(format!(
                    "Multiplexing rate ({}) exceeds the number of {read} indexes ({})",
                    self.multiplexing_rate,
                    pool.len()
                )));
            }
        }
        Ok(())
    }
}

/// Validate the inputs, then search for a design
pub fn design_indexes(
    first: &IndexPool,
    second: Option<&IndexPool>,
    params: &DesignParams,
) -> Result<Design> {
    params.validate(first, second)?;

    let seed = params.seed.unwrap_or_else(rand::random);
    let nb_lanes = params.nb_lanes();
    info!(
        "{} samples, {} per lane, {} lanes, {} chemistry, seed {}",
        params.nb_samples, params.multiplexing_rate, nb_lanes, params.chemistry, seed
    );

    let first_catalog = first.usable_for(params.chemistry);

    if let Some(second) = second {
        if params.constraint != UniquenessConstraint::None || params.select_compatible {
            warn!("Dual indexing ignores the unicity constraint and index pre-selection");
        }
        let second_catalog = second.usable_for(params.chemistry);
        for catalog in [&first_catalog, &second_catalog] {
            check_capacity(
                catalog,
                params.multiplexing_rate,
                nb_lanes,
                UniquenessConstraint::None,
            )?;
        }
        return DualIndexComposer::new(
            &first_catalog,
            &second_catalog,
            params.multiplexing_rate,
            nb_lanes,
        )
        .with_max_trials(params.max_trials)
        .with_draws_per_lane(params.draws_per_lane)
        .with_seed(seed)
        .compose();
    }

    check_capacity(
        &first_catalog,
        params.multiplexing_rate,
        nb_lanes,
        params.constraint,
    )?;

    let graph = params
        .select_compatible
        .then(|| CompatibilityGraph::build(&first_catalog));

    let assembled = LaneAssembler::new(&first_catalog, params.multiplexing_rate, nb_lanes)
        .with_graph(graph.as_ref())
        .with_constraint(params.constraint)
        .with_complete_lane(params.complete_lane)
        .with_max_trials(params.max_trials)
        .with_draws_per_lane(params.draws_per_lane)
        .with_seed(seed)
        .assemble()?;

    Ok(Design::from_lanes(&first_catalog, &assembled))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> IndexPool {
        IndexPool::new((0..n).map(|i| (format!("i{i}"), "ACGT".to_string()))).unwrap()
    }

    #[test]
    fn test_nb_lanes() {
        assert_eq!(DesignParams::new(12, 3).nb_lanes(), 4);
        assert_eq!(DesignParams::new(12, 0).nb_lanes(), 0);
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let p = pool(6);
        assert!(DesignParams::new(12, 3).validate(&p, None).is_ok());
        assert!(DesignParams::new(10, 3).validate(&p, None).is_err());
        assert!(DesignParams::new(12, 0).validate(&p, None).is_err());
        assert!(DesignParams::new(0, 3).validate(&p, None).is_err());
        assert!(DesignParams::new(14, 7).validate(&p, None).is_err());
        assert!(DesignParams::new(12, 3)
            .with_max_trials(0)
            .validate(&p, None)
            .is_err());
        assert!(DesignParams::new(12, 3)
            .validate(&p, Some(&pool(2)))
            .is_err());
    }

    #[test]
    fn test_gg_exclusion_leaves_too_few() {
        let p = IndexPool::new([("a", "GGAC"), ("b", "GGTA"), ("c", "ACTA")]).unwrap();
        let params = DesignParams::new(2, 2).with_chemistry(Chemistry::TwoChannel);
        let err = design_indexes(&p, None, &params).unwrap_err();
        assert!(matches!(
            err,
            DesignError::IncompatiblePoolTooSmall {
                available: 1,
                required: 2,
                chemistry: Chemistry::TwoChannel,
            }
        ));
    }
}
