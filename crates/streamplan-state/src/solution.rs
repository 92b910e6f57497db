//! Best plan found so far and the termination condition of a session.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use streamplan_core::PlanAction;
use tracing::info;

/// How a planning session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// A plan within the cost bound was found.
    Solved,
    /// No plan exists under the explored streams and limits.
    Infeasible,
    /// The deadline elapsed before a plan was found.
    BudgetExceeded,
}

impl SolveStatus {
    pub fn is_solved(&self) -> bool {
        matches!(self, SolveStatus::Solved)
    }
}

/// Tracks the best plan, its cost, and the deadline / target cost that
/// end the session.
#[derive(Debug, Clone)]
pub struct SolutionStore {
    best_plan: Option<Vec<PlanAction>>,
    best_cost: f64,
    started: Instant,
    max_time: Option<Duration>,
    success_cost: f64,
    max_cost: f64,
    solutions: usize,
}

impl SolutionStore {
    /// Create a store. `None` bounds are unbounded.
    pub fn new(max_time: Option<Duration>, success_cost: Option<f64>, max_cost: Option<f64>) -> Self {
        Self {
            best_plan: None,
            best_cost: f64::INFINITY,
            started: Instant::now(),
            max_time,
            success_cost: success_cost.unwrap_or(f64::INFINITY),
            max_cost: max_cost.unwrap_or(f64::INFINITY),
            solutions: 0,
        }
    }

    /// Offer a fully bound plan. It is adopted if it is cheaper than the
    /// current best and within the cost bound.
    pub fn add_plan(&mut self, plan: Vec<PlanAction>, cost: f64) -> bool {
        if cost >= self.best_cost || cost > self.max_cost {
            return false;
        }
        info!(
            "New best plan: {} actions, cost {:.3} after {:.3}s",
            plan.len(),
            cost,
            self.elapsed().as_secs_f64()
        );
        self.best_plan = Some(plan);
        self.best_cost = cost;
        self.solutions += 1;
        true
    }

    pub fn best_plan(&self) -> Option<&[PlanAction]> {
        self.best_plan.as_deref()
    }

    pub fn take_best_plan(&mut self) -> Option<Vec<PlanAction>> {
        self.best_plan.take()
    }

    /// Cost of the best plan, or infinity.
    pub fn best_cost(&self) -> f64 {
        self.best_cost
    }

    pub fn max_cost(&self) -> f64 {
        self.max_cost
    }

    pub fn has_solution(&self) -> bool {
        self.best_plan.is_some()
    }

    /// Number of plans adopted so far.
    pub fn num_solutions(&self) -> usize {
        self.solutions
    }

    /// True if a plan costing `cost` could still be adopted.
    pub fn could_improve(&self, cost: f64) -> bool {
        cost < self.best_cost && cost <= self.max_cost
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn max_time(&self) -> Option<Duration> {
        self.max_time
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.max_time
            .map(|limit| limit.saturating_sub(self.elapsed()))
    }

    pub fn is_timed_out(&self) -> bool {
        self.max_time.map_or(false, |limit| self.elapsed() >= limit)
    }

    /// True once a plan meets the target cost or the deadline has elapsed.
    pub fn is_terminated(&self) -> bool {
        (self.has_solution() && self.best_cost <= self.success_cost) || self.is_timed_out()
    }

    /// Classify the outcome of the session.
    pub fn status(&self) -> SolveStatus {
        if self.has_solution() {
            SolveStatus::Solved
        } else if self.is_timed_out() {
            SolveStatus::BudgetExceeded
        } else {
            SolveStatus::Infeasible
        }
    }
}
