//! Index barcodes, validated pools and chemistry-specific catalogs.

use indexmap::IndexMap;
use log::{debug, warn};

use crate::chemistry::{Chemistry, ColorMask};
use crate::error::{DesignError, Result};

/// A named index barcode
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Index {
    pub id: String,
    pub sequence: String,
}

impl Index {
    pub fn new(id: impl Into<String>, sequence: impl Into<String>) -> Self {
        Index {
            id: id.into(),
            sequence: sequence.into(),
        }
    }
}

/// Ordered catalog of barcodes for one index read, unique by id.
///
/// All sequences are uppercase ACGT and share one length.
#[derive(Debug, Clone)]
pub struct IndexPool {
    indexes: IndexMap<String, Index>,
    sequence_len: usize,
}

impl IndexPool {
    /// Build a pool from `(id, sequence)` pairs, in input order
    pub fn new<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut indexes: IndexMap<String, Index> = IndexMap::new();
        let mut sequence_len = None;

        for (id, sequence) in entries {
            let id = id.into().trim().to_string();
            let sequence = sequence.into().trim().to_ascii_uppercase();

            if id.is_empty() {
                return Err(DesignError::invalid_input("Index with an empty id"));
            }
            if sequence.is_empty() {
                return Err(DesignError::invalid_input(format!(
                    "Index '{id}' has an empty sequence"
                )));
            }
            if let Some(bad) = sequence.chars().find(|c| !matches!(c, 'A' | 'C' | 'G' | 'T')) {
                return Err(DesignError::invalid_input(format!(
                    "Index '{id}' contains invalid base '{bad}'"
                )));
            }
            match sequence_len {
                None => sequence_len = Some(sequence.len()),
                Some(len) if len != sequence.len() => {
                    return Err(DesignError::invalid_input(format!(
                        "Index '{id}' has length {}, expected {len}: all sequences must have the same length",
                        sequence.len()
                    )));
                }
                Some(_) => {}
            }
            if indexes.contains_key(&id) {
                return Err(DesignError::invalid_input(format!(
                    "Duplicate index id '{id}'"
                )));
            }
            indexes.insert(id.clone(), Index { id, sequence });
        }

        let Some(sequence_len) = sequence_len else {
            return Err(DesignError::invalid_input("Index pool is empty"));
        };

        Ok(IndexPool {
            indexes,
            sequence_len,
        })
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn sequence_len(&self) -> usize {
        self.sequence_len
    }

    pub fn get(&self, id: &str) -> Option<&Index> {
        self.indexes.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values()
    }

    /// Drop indexes the chemistry can never read and precompute color profiles
    pub fn usable_for(&self, chemistry: Chemistry) -> Catalog {
        let mut indexes = Vec::with_capacity(self.len());
        let mut excluded: Vec<&str> = Vec::new();

        for index in self.iter() {
            if chemistry.is_usable(&index.sequence) {
                indexes.push(index.clone());
            } else {
                excluded.push(&index.id);
            }
        }

        if !excluded.is_empty() {
            warn!(
                "{} indexes unusable with {} chemistry: {}",
                excluded.len(),
                chemistry,
                excluded.join(", ")
            );
        }
        debug!(
            "Catalog for {chemistry}: {} of {} indexes usable",
            indexes.len(),
            self.len()
        );

        let profiles = indexes
            .iter()
            .map(|index| chemistry.profile(&index.sequence))
            .collect();

        Catalog {
            chemistry,
            indexes,
            profiles,
        }
    }
}

/// Indexes of one pool that the chemistry can read, addressed by position
#[derive(Debug, Clone)]
pub struct Catalog {
    chemistry: Chemistry,
    indexes: Vec<Index>,
    profiles: Vec<Vec<ColorMask>>,
}

impl Catalog {
    pub fn chemistry(&self) -> Chemistry {
        self.chemistry
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn index(&self, pos: usize) -> &Index {
        &self.indexes[pos]
    }

    pub fn profile(&self, pos: usize) -> &[ColorMask] {
        &self.profiles[pos]
    }

    /// Full color check of a group of catalog positions
    pub fn is_compatible(&self, members: &[usize]) -> bool {
        self.chemistry
            .profiles_compatible(members.iter().map(|&pos| self.profile(pos)))
    }
}
