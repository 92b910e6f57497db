//! Incremental solving: sample every applicable stream, then plan over
//! real facts only.

use async_trait::async_trait;
use streamplan_core::{Result, StreamId};
use streamplan_planner::{Domain, Literal, Planner, PlanningProblem};
use tracing::debug;

use crate::config::SolveConfig;
use crate::context::{Solution, SolveContext};
use crate::encode::apply_unit_costs;
use crate::focused::Problem;
use crate::instantiate::sample_ready;
use crate::queue::SkeletonQueue;
use crate::search::{search_sample_loop, SearchOutcome, SkeletonSource};
use crate::skeleton::SkeletonCandidate;

pub async fn solve_incremental(problem: Problem, planner: &dyn Planner, config: &SolveConfig) -> Result<Solution> {
    problem.domain.validate()?;
    let mut ctx = SolveContext::new(problem.streams, problem.init, config)?;
    let mut queue = SkeletonQueue::new();
    let mut source = IncrementalSource {
        planner,
        domain: apply_unit_costs(problem.domain, config.unit_costs),
        goal: problem.goal,
    };
    search_sample_loop(&mut ctx, &mut queue, &mut source, config).await?;
    Ok(ctx.into_solution())
}

struct IncrementalSource<'a> {
    planner: &'a dyn Planner,
    domain: Domain,
    goal: Vec<Literal>,
}

#[async_trait]
impl SkeletonSource for IncrementalSource<'_> {
    async fn search(&mut self, ctx: &mut SolveContext, _queue: &SkeletonQueue) -> Result<SearchOutcome> {
        let problem = PlanningProblem::new(self.domain.clone(), ctx.evaluations.to_facts(), self.goal.clone());
        if let Some(plan) = self.planner.plan(&problem).await? {
            let cost = self.domain.plan_cost(&plan);
            if ctx.store.could_improve(cost) {
                return Ok(SearchOutcome::Found(SkeletonCandidate {
                    stream_plan: Vec::new(),
                    action_plan: plan,
                    cost,
                }));
            }
        }

        let streams: Vec<StreamId> = (0..ctx.session.streams().len()).map(StreamId).collect();
        let calls = sample_ready(&mut ctx.session, &mut ctx.evaluations, &streams)?;
        debug!(calls, evaluations = ctx.evaluations.len(), "Sampled ready instances");
        Ok(if calls == 0 {
            SearchOutcome::Exhausted
        } else {
            SearchOutcome::Retry
        })
    }

    fn complexity_limit(&self) -> usize {
        usize::MAX
    }
}
