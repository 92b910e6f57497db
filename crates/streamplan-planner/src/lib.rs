//! # Streamplan Planner
//!
//! The symbolic planner boundary used by the search/sample loop, plus an
//! A* reference planner.

pub mod astar;
pub mod planner;

pub use astar::AStarPlanner;
pub use planner::{
    ActionSchema, Axiom, Domain, Literal, Planner, PlannerConfig, PlanningProblem,
};
