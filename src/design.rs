//! Final multiplexing design: numbered lanes of sample-to-index assignments.

use std::collections::HashSet;
use std::io::{self, Write};

use crate::assembler::AssembledLanes;
use crate::chemistry::Chemistry;
use crate::index::{Catalog, Index};
use crate::ledger::UniquenessConstraint;

/// One sample slot of a lane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub sample: usize,
    pub index: Index,
    /// i5 index when dual-indexing
    pub second: Option<Index>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lane {
    pub number: usize,
    pub assignments: Vec<Assignment>,
}

impl Lane {
    pub fn ids(&self) -> HashSet<&str> {
        self.assignments.iter().map(|a| a.index.id.as_str()).collect()
    }

    pub fn second_ids(&self) -> HashSet<&str> {
        self.assignments
            .iter()
            .filter_map(|a| a.second.as_ref().map(|i| i.id.as_str()))
            .collect()
    }

    pub fn sequences(&self) -> Vec<&str> {
        self.assignments
            .iter()
            .map(|a| a.index.sequence.as_str())
            .collect()
    }

    pub fn second_sequences(&self) -> Vec<&str> {
        self.assignments
            .iter()
            .filter_map(|a| a.second.as_ref().map(|i| i.sequence.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Design {
    pub chemistry: Chemistry,
    pub lanes: Vec<Lane>,
}

impl Design {
    /// Number samples lane by lane, in the order the assembler left them
    pub fn from_lanes(catalog: &Catalog, assembled: &AssembledLanes) -> Self {
        let mut sample = 0;
        let lanes = assembled
            .lanes
            .iter()
            .enumerate()
            .map(|(i, positions)| Lane {
                number: i + 1,
                assignments: positions
                    .iter()
                    .map(|&pos| {
                        sample += 1;
                        Assignment {
                            sample,
                            index: catalog.index(pos).clone(),
                            second: None,
                        }
                    })
                    .collect(),
            })
            .collect();

        Design {
            chemistry: catalog.chemistry(),
            lanes,
        }
    }

    pub fn nb_lanes(&self) -> usize {
        self.lanes.len()
    }

    pub fn nb_samples(&self) -> usize {
        self.lanes.iter().map(|l| l.assignments.len()).sum()
    }

    pub fn is_dual(&self) -> bool {
        self.lanes
            .iter()
            .flat_map(|l| &l.assignments)
            .any(|a| a.second.is_some())
    }

    /// Everything wrong with this design under the given rule; empty when valid
    pub fn violations(&self, constraint: UniquenessConstraint) -> Vec<String> {
        let mut problems = Vec::new();

        for lane in &self.lanes {
            if lane.ids().len() != lane.assignments.len() {
                problems.push(format!("Lane {} repeats an index", lane.number));
            }
            if !self.chemistry.is_compatible(&lane.sequences()) {
                problems.push(format!(
                    "Lane {} is not {} compatible",
                    lane.number, self.chemistry
                ));
            }
            let second = lane.second_sequences();
            if !second.is_empty() && !self.chemistry.is_compatible(&second) {
                problems.push(format!(
                    "Lane {} second index read is not {} compatible",
                    lane.number, self.chemistry
                ));
            }
        }

        for (i, a) in self.lanes.iter().enumerate() {
            for b in &self.lanes[i + 1..] {
                let (ids_a, ids_b) = (a.ids(), b.ids());
                match constraint {
                    UniquenessConstraint::None => {}
                    UniquenessConstraint::Lane if ids_a == ids_b => problems.push(format!(
                        "Lanes {} and {} use the same indexes",
                        a.number, b.number
                    )),
                    UniquenessConstraint::Index if !ids_a.is_disjoint(&ids_b) => {
                        problems.push(format!(
                            "Lanes {} and {} share indexes",
                            a.number, b.number
                        ))
                    }
                    _ => {}
                }
            }
        }

        problems
    }

    pub fn is_valid(&self, constraint: UniquenessConstraint) -> bool {
        self.violations(constraint).is_empty()
    }

    /// Tab-delimited table, one row per sample
    pub fn write_tsv<W: Write>(&self, out: &mut W, with_colors: bool) -> io::Result<()> {
        let dual = self.is_dual();

        let mut header = vec!["sample", "lane", "id", "sequence"];
        if dual {
            header.extend(["id2", "sequence2"]);
        }
        if with_colors {
            header.push("colors");
            if dual {
                header.push("colors2");
            }
        }
        writeln!(out, "{}", header.join("\t"))?;

        for lane in &self.lanes {
            for a in &lane.assignments {
                let mut fields = vec![
                    a.sample.to_string(),
                    lane.number.to_string(),
                    a.index.id.clone(),
                    a.index.sequence.clone(),
                ];
                if dual {
                    let (id, seq) = a
                        .second
                        .as_ref()
                        .map(|i| (i.id.clone(), i.sequence.clone()))
                        .unwrap_or_default();
                    fields.push(id);
                    fields.push(seq);
                }
                if with_colors {
                    fields.push(self.chemistry.color_string(&a.index.sequence));
                    if dual {
                        fields.push(
                            a.second
                                .as_ref()
                                .map(|i| self.chemistry.color_string(&i.sequence))
                                .unwrap_or_default(),
                        );
                    }
                }
                writeln!(out, "{}", fields.join("\t"))?;
            }
        }
        Ok(())
    }
}
