//! Cross-lane uniqueness rules and the per-trial ledger that enforces them.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::combination::Combination;
use crate::error::DesignError;

/// What may not repeat between lanes of one design
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UniquenessConstraint {
    /// Indexes and whole combinations may repeat across lanes
    #[default]
    None,
    /// No two lanes carry the same set of indexes
    Lane,
    /// No index appears in more than one lane
    Index,
}

impl FromStr for UniquenessConstraint {
    type Err = DesignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(UniquenessConstraint::None),
            "lane" => Ok(UniquenessConstraint::Lane),
            "index" => Ok(UniquenessConstraint::Index),
            other => Err(DesignError::invalid_input(format!(
                "Unknown unicity constraint '{other}'. Use none, lane or index"
            ))),
        }
    }
}

impl fmt::Display for UniquenessConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniquenessConstraint::None => write!(f, "none"),
            UniquenessConstraint::Lane => write!(f, "lane"),
            UniquenessConstraint::Index => write!(f, "index"),
        }
    }
}

/// Indexes and combinations already handed out during one trial.
///
/// Never shared between trials.
#[derive(Debug, Clone)]
pub struct UniquenessLedger {
    constraint: UniquenessConstraint,
    consumed: HashSet<usize>,
    used: HashSet<Combination>,
}

impl UniquenessLedger {
    pub fn new(constraint: UniquenessConstraint) -> Self {
        UniquenessLedger {
            constraint,
            consumed: HashSet::new(),
            used: HashSet::new(),
        }
    }

    /// Whether a combination may become the next lane
    pub fn admits(&self, combination: &Combination) -> bool {
        match self.constraint {
            UniquenessConstraint::None => true,
            UniquenessConstraint::Lane => !self.used.contains(combination),
            UniquenessConstraint::Index => combination
                .members()
                .iter()
                .all(|pos| !self.consumed.contains(pos)),
        }
    }

    pub fn record(&mut self, combination: &Combination) {
        match self.constraint {
            UniquenessConstraint::None => {}
            UniquenessConstraint::Lane => {
                self.used.insert(combination.clone());
            }
            UniquenessConstraint::Index => self.consume(combination.members()),
        }
    }

    /// Mark positions as taken without registering a combination
    pub fn consume(&mut self, positions: &[usize]) {
        if self.constraint == UniquenessConstraint::Index {
            self.consumed.extend(positions.iter().copied());
        }
    }

    pub fn is_consumed(&self, pos: usize) -> bool {
        self.consumed.contains(&pos)
    }

    /// Catalog positions still available for new lanes, in ascending order
    pub fn available(&self, catalog_len: usize) -> Vec<usize> {
        (0..catalog_len).filter(|p| !self.is_consumed(*p)).collect()
    }

    pub fn clear(&mut self) {
        self.consumed.clear();
        self.used.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_constraint() {
        assert_eq!(
            "index".parse::<UniquenessConstraint>().unwrap(),
            UniquenessConstraint::Index
        );
        assert_eq!(
            "LANE".parse::<UniquenessConstraint>().unwrap(),
            UniquenessConstraint::Lane
        );
        assert!("sample".parse::<UniquenessConstraint>().is_err());
        assert_eq!(UniquenessConstraint::default().to_string(), "none");
    }

    #[test]
    fn test_index_ledger_blocks_overlaps() {
        let mut ledger = UniquenessLedger::new(UniquenessConstraint::Index);
        let a = Combination::new(vec![0, 1, 2]);
        ledger.record(&a);
        assert!(!ledger.admits(&Combination::new(vec![2, 3, 4])));
        assert!(ledger.admits(&Combination::new(vec![3, 4, 5])));
        assert_eq!(ledger.available(6), vec![3, 4, 5]);
    }

    #[test]
    fn test_lane_ledger_blocks_repeats() {
        let mut ledger = UniquenessLedger::new(UniquenessConstraint::Lane);
        ledger.record(&Combination::new(vec![0, 1, 2]));
        assert!(!ledger.admits(&Combination::new(vec![2, 1, 0])));
        assert!(ledger.admits(&Combination::new(vec![0, 1, 3])));
        // Positions are never consumed under the lane rule
        assert_eq!(ledger.available(4).len(), 4);
    }

    #[test]
    fn test_none_ledger_admits_everything() {
        let mut ledger = UniquenessLedger::new(UniquenessConstraint::None);
        let a = Combination::new(vec![0, 1]);
        ledger.record(&a);
        assert!(ledger.admits(&a));
    }

    #[test]
    fn test_clear() {
        let mut ledger = UniquenessLedger::new(UniquenessConstraint::Index);
        ledger.record(&Combination::new(vec![0, 1]));
        ledger.clear();
        assert!(ledger.admits(&Combination::new(vec![0, 1])));
    }
}
