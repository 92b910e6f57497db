//! # Streamplan State
//!
//! Session state mutated by the search/sample loop: the append-only
//! evaluation store and the solution store.

pub mod evaluations;
pub mod solution;

pub use evaluations::{Evaluation, EvaluationSource, EvaluationStore};
pub use solution::{SolutionStore, SolveStatus};
