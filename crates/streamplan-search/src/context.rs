//! Mutable state of one solving session.

use std::time::Duration;

use streamplan_core::{Fact, PlanAction, PlanError, Result};
use streamplan_state::{EvaluationStore, SolutionStore, SolveStatus};
use streamplan_stream::{Stream, StreamSession, StreamStatistics};

use crate::config::SolveConfig;

/// Streams, known facts and the best plan so far.
#[derive(Debug)]
pub struct SolveContext {
    pub session: StreamSession,
    pub evaluations: EvaluationStore,
    pub store: SolutionStore,
}

impl SolveContext {
    pub fn new(streams: Vec<Stream>, init: Vec<Fact>, config: &SolveConfig) -> Result<Self> {
        Ok(Self {
            session: StreamSession::new(streams)?,
            evaluations: EvaluationStore::from_init(init)?,
            store: config.solution_store(),
        })
    }

    /// Consume the session into its outcome.
    pub fn into_solution(mut self) -> Solution {
        let status = self.store.status();
        Solution {
            cost: self.store.best_cost(),
            plan: self.store.take_best_plan(),
            facts: self.evaluations.to_facts(),
            status,
            elapsed_ms: self.store.elapsed().as_millis() as u64,
            max_time_ms: self.store.max_time().map(|t| t.as_millis() as u64),
            statistics: self.session.statistics().clone(),
        }
    }
}

/// Outcome of a planning session.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Best plan found, if any.
    pub plan: Option<Vec<PlanAction>>,
    /// Its cost, infinite when there is no plan.
    pub cost: f64,
    /// Every fact known at the end of the session.
    pub facts: Vec<Fact>,
    pub status: SolveStatus,
    pub elapsed_ms: u64,
    pub max_time_ms: Option<u64>,
    pub statistics: StreamStatistics,
}

impl Solution {
    pub fn is_solved(&self) -> bool {
        self.status.is_solved()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// The plan and its cost, or the reason there is none.
    pub fn into_result(self) -> Result<(Vec<PlanAction>, f64)> {
        match (self.status, self.plan) {
            (SolveStatus::Solved, Some(plan)) => Ok((plan, self.cost)),
            (SolveStatus::BudgetExceeded, _) => Err(PlanError::BudgetExceeded {
                elapsed_ms: self.elapsed_ms,
                limit_ms: self.max_time_ms.unwrap_or(self.elapsed_ms),
            }),
            _ => Err(PlanError::InfeasibleGoal {
                message: format!("no plan found after {}ms", self.elapsed_ms),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(config: &SolveConfig) -> SolveContext {
        SolveContext::new(Vec::new(), vec![Fact::new("at", ["home"])], config).unwrap()
    }

    #[test]
    fn test_infeasible_solution() {
        let solution = context(&SolveConfig::default()).into_solution();
        assert_eq!(solution.status, SolveStatus::Infeasible);
        assert_eq!(solution.facts, vec![Fact::new("at", ["home"])]);
        assert!(matches!(solution.into_result(), Err(PlanError::InfeasibleGoal { .. })));
    }

    #[test]
    fn test_budget_exceeded_solution() {
        let config = SolveConfig::default().with_max_time(Duration::ZERO);
        let solution = context(&config).into_solution();
        assert_eq!(solution.status, SolveStatus::BudgetExceeded);
        assert!(matches!(
            solution.into_result(),
            Err(PlanError::BudgetExceeded { limit_ms: 0, .. })
        ));
    }

    #[test]
    fn test_solved_solution() {
        let mut ctx = context(&SolveConfig::default());
        ctx.store.add_plan(vec![PlanAction::new("go", ["work"])], 1.0);
        let (plan, cost) = ctx.into_solution().into_result().unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(cost, 1.0);
    }
}
