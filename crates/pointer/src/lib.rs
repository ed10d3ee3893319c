//! Whole-program points-to and alias set analysis over Kestrel IR.
//!
//! The engine answers may-alias queries by partitioning the interesting
//! pointer values of a program into shared equivalence classes. Classes
//! are built on demand: the first query that reaches a function runs its
//! pairwise intraprocedural disambiguation, and global objects bridge the
//! classes across every function that touches them.

pub mod config;
pub mod engine;
pub mod info;
pub mod oracle;
pub mod report;
pub mod serialize;

pub use config::{default_heap_allocating_functions, AnalysisConfig};
pub use engine::{PointsToEngine, SetId};
pub use info::{AliasInfo, ValueSet};
pub use oracle::{AliasAnalysis, AliasResult, PointerAnalysisKind, UNKNOWN_SIZE};
pub use serialize::{traverse_values, LoadError};
