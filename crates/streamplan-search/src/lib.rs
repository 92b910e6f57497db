//! # Streamplan Search
//!
//! Plan skeletons, the skeleton queue that samples them, and the
//! search/sample loop that alternates the planner with sampling.
//!
//! Entry points:
//! - [`solve_focused`] - plan over optimistic stream results, then sample
//! - [`solve_incremental`] - sample everything applicable, then plan
//! - [`constraint_satisfaction`] - bind the free parameters of goal facts

pub mod config;
pub mod context;
pub mod disable;
pub mod encode;
pub mod focused;
pub mod incremental;
pub mod instantiate;
pub mod queue;
pub mod reorder;
pub mod retrace;
pub mod satisfaction;
pub mod search;
pub mod skeleton;

pub use config::SolveConfig;
pub use context::{Solution, SolveContext};
pub use disable::{
    disable_axiom, satisfiable_goal, CausalCluster, ClusterPolicy, ConnectedCluster, WholeSkeleton,
    UNSATISFIABLE,
};
pub use focused::{solve_focused, FocusedSolver, Problem};
pub use incremental::solve_incremental;
pub use instantiate::{instantiate_optimistic, sample_eager, sample_ready, Instantiation};
pub use queue::SkeletonQueue;
pub use reorder::reorder_stream_plan;
pub use retrace::retrace_results;
pub use satisfaction::{constraint_satisfaction, GoalTerm, SatisfactionSolution};
pub use search::{search_sample_loop, LoopStats, SearchOutcome, SkeletonSource};
pub use skeleton::{Binding, Skeleton, SkeletonCandidate, SkeletonState};
