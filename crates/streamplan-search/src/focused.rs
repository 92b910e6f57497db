//! Focused solving: plan over optimistic stream results, then sample the
//! skeletons the planner commits to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use streamplan_core::{Fact, Result};
use streamplan_planner::{Domain, Literal, Planner, PlanningProblem};
use streamplan_stream::Stream;
use tracing::debug;

use crate::config::SolveConfig;
use crate::context::{Solution, SolveContext};
use crate::disable::{satisfiable_goal, CausalCluster, ClusterPolicy};
use crate::encode::{apply_unit_costs, split_plan, stream_action};
use crate::instantiate::{instantiate_optimistic, sample_eager};
use crate::queue::SkeletonQueue;
use crate::reorder::reorder_stream_plan;
use crate::search::{search_sample_loop, SearchOutcome, SkeletonSource};
use crate::skeleton::SkeletonCandidate;

/// A planning problem with streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub domain: Domain,
    pub init: Vec<Fact>,
    pub goal: Vec<Literal>,
    #[serde(skip)]
    pub streams: Vec<Stream>,
}

impl Problem {
    pub fn new(domain: Domain, init: Vec<Fact>, goal: Vec<Literal>, streams: Vec<Stream>) -> Self {
        Self {
            domain,
            init,
            goal,
            streams,
        }
    }
}

/// Focused solver with a configurable disable-axiom policy.
pub struct FocusedSolver<'a> {
    planner: &'a dyn Planner,
    config: SolveConfig,
    policy: Box<dyn ClusterPolicy>,
}

impl<'a> FocusedSolver<'a> {
    pub fn new(planner: &'a dyn Planner, config: SolveConfig) -> Self {
        Self {
            planner,
            config,
            policy: Box::new(CausalCluster),
        }
    }

    /// Choose how failed skeletons are generalized into disable axioms.
    pub fn with_policy(mut self, policy: impl ClusterPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn config(&self) -> &SolveConfig {
        &self.config
    }

    pub async fn solve(&self, problem: Problem) -> Result<Solution> {
        problem.domain.validate()?;
        let mut ctx = SolveContext::new(problem.streams, problem.init, &self.config)?;
        let mut queue = SkeletonQueue::new();
        let mut source = FocusedSource {
            planner: self.planner,
            policy: self.policy.as_ref(),
            domain: apply_unit_costs(problem.domain, self.config.unit_costs),
            goal: problem.goal,
            level: self.config.complexity_limit,
            max_effort: self.config.max_effort,
            samples: self.config.sample_ratio() > 0.0,
        };
        search_sample_loop(&mut ctx, &mut queue, &mut source, &self.config).await?;
        Ok(ctx.into_solution())
    }
}

/// Solve `problem` with the default causal disable policy.
pub async fn solve_focused(problem: Problem, planner: &dyn Planner, config: &SolveConfig) -> Result<Solution> {
    FocusedSolver::new(planner, config.clone()).solve(problem).await
}

struct FocusedSource<'a> {
    planner: &'a dyn Planner,
    policy: &'a dyn ClusterPolicy,
    domain: Domain,
    goal: Vec<Literal>,
    level: usize,
    max_effort: Option<f64>,
    samples: bool,
}

impl FocusedSource<'_> {
    fn raise_level(&mut self) -> SearchOutcome {
        self.level += 1;
        debug!(level = self.level, "Raising instantiation level");
        SearchOutcome::Retry
    }
}

#[async_trait]
impl SkeletonSource for FocusedSource<'_> {
    async fn search(&mut self, ctx: &mut SolveContext, queue: &SkeletonQueue) -> Result<SearchOutcome> {
        sample_eager(&mut ctx.session, &mut ctx.evaluations)?;
        let instantiation = instantiate_optimistic(&mut ctx.session, &ctx.evaluations, self.level, self.max_effort);

        let mut domain = self.domain.clone();
        for &result in &instantiation.results {
            domain.actions.push(stream_action(ctx.session.result(result), false));
        }
        domain.axioms.extend(queue.disable_axioms(&ctx.session, self.policy));

        let mut goal = self.goal.clone();
        goal.push(satisfiable_goal());
        let problem = PlanningProblem::new(domain, ctx.evaluations.to_facts(), goal);

        let Some(plan) = self.planner.plan(&problem).await? else {
            return Ok(if instantiation.truncated {
                self.raise_level()
            } else {
                SearchOutcome::Exhausted
            });
        };

        let (stream_plan, action_plan) = split_plan(plan);
        let candidate = SkeletonCandidate {
            stream_plan: reorder_stream_plan(&ctx.session, &stream_plan),
            cost: self.domain.plan_cost(&action_plan),
            action_plan,
        };
        debug!(
            streams = candidate.stream_plan.len(),
            actions = candidate.action_plan.len(),
            cost = candidate.cost,
            "Planner proposed skeleton"
        );

        if queue.contains(&candidate) {
            // Without sampling the queue never changes, so the planner keeps
            // returning this skeleton.
            if !self.samples || (queue.is_empty() && !instantiation.truncated) {
                return Ok(SearchOutcome::Exhausted);
            }
            if instantiation.truncated || queue.num_deferred() == queue.len() {
                return Ok(self.raise_level());
            }
            return Ok(SearchOutcome::Retry);
        }
        Ok(SearchOutcome::Found(candidate))
    }

    fn complexity_limit(&self) -> usize {
        self.level
    }
}
