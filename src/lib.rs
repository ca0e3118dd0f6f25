// Library exports for plexdesign
pub mod assembler;
pub mod chemistry;
pub mod combination;
pub mod compat_graph;
pub mod config;
pub mod design;
pub mod dual;
pub mod error;
pub mod index;
pub mod index_table;
pub mod ledger;

pub use chemistry::Chemistry;
pub use config::{design_indexes, DesignParams};
pub use design::{Assignment, Design, Lane};
pub use error::{DesignError, Result};
pub use index::{Catalog, Index, IndexPool};
pub use ledger::UniquenessConstraint;
