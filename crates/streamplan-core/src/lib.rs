//! # Streamplan Core
//!
//! Core primitives shared by every streamplan crate.
//!
//! This crate provides the fundamental building blocks:
//! - [`Value`], [`Term`], [`Fact`] - the fact language
//! - [`ObjectTable`] and [`Resolution`] - optimistic objects and their per-binding values
//! - [`PlanError`] - error taxonomy

pub mod error;
pub mod object;
pub mod types;
pub mod unify;

// Re-exports for convenience
pub use error::{PlanError, Result};
pub use object::{ObjectOrigin, ObjectTable, Resolution};
pub use types::*;
pub use unify::{instantiate, match_all, match_fact, Assignment, FactIndex};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{PlanError, Result};
    pub use crate::object::{ObjectTable, Resolution};
    pub use crate::types::{Fact, ObjectId, PlanAction, Term, Value};
}
