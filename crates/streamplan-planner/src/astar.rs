//! A* search-based planner implementation.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashSet};
use std::time::Instant;

use async_trait::async_trait;
use streamplan_core::{Fact, FactIndex, PlanAction, PlanError, Result};
use tracing::{debug, info, warn};

use crate::planner::{Literal, Planner, PlannerConfig, PlanningProblem};

/// A* search-based planner over fact-set states.
pub struct AStarPlanner {
    config: PlannerConfig,
}

/// Node in the A* search tree.
#[derive(Clone)]
struct SearchNode {
    /// Current state.
    state: BTreeSet<Fact>,
    /// Steps taken to reach this state.
    steps: Vec<PlanAction>,
    /// g(n): Actual cost from start.
    g_cost: f64,
    /// h(n): Heuristic estimate to goal.
    h_cost: f64,
    /// f(n) = g(n) + h(n).
    f_cost: f64,
    /// Insertion order, for FIFO tie-breaking.
    seq: u64,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for SearchNode {}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (lower f_cost = higher priority)
        other
            .f_cost
            .total_cmp(&self.f_cost)
            .then_with(|| other.h_cost.total_cmp(&self.h_cost))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl AStarPlanner {
    /// Create a new A* planner with default configuration.
    pub fn new() -> Self {
        Self {
            config: PlannerConfig::default(),
        }
    }

    /// Create a new A* planner with custom configuration.
    pub fn with_config(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Heuristic function: number of positive goal literals not yet true.
    fn heuristic(&self, facts: &FactIndex<'_>, goal: &[Literal]) -> f64 {
        goal.iter()
            .filter(|l| !l.negated && !facts.contains(&l.fact))
            .count() as f64
    }

    /// Check if the goal is satisfied.
    fn is_goal_reached(&self, facts: &FactIndex<'_>, goal: &[Literal]) -> bool {
        goal.iter().all(|l| l.holds(facts))
    }
}

impl Default for AStarPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Planner for AStarPlanner {
    async fn plan(&self, problem: &PlanningProblem) -> Result<Option<Vec<PlanAction>>> {
        let start_time = Instant::now();
        let domain = &problem.domain;
        domain.validate()?;
        if let Some(literal) = problem.goal.iter().find(|l| !l.fact.is_ground()) {
            return Err(PlanError::InvalidDomain {
                message: format!("goal literal {} is not ground", literal.fact),
            });
        }

        debug!(
            "Starting A* planning with {} actions, {} axioms, {} initial facts",
            domain.actions.len(),
            domain.axioms.len(),
            problem.init.len()
        );

        // Initialize open and closed sets
        let mut open_set: BinaryHeap<SearchNode> = BinaryHeap::new();
        let mut closed_set: HashSet<BTreeSet<Fact>> = HashSet::new();
        let mut states_explored = 0;
        let mut seq = 0u64;

        let initial_state: BTreeSet<Fact> = problem.init.iter().cloned().collect();
        let h_cost = {
            let derived = domain.derive(&initial_state);
            let index = FactIndex::new(initial_state.iter().chain(derived.iter()));
            self.heuristic(&index, &problem.goal)
        };
        open_set.push(SearchNode {
            state: initial_state,
            steps: Vec::new(),
            g_cost: 0.0,
            h_cost,
            f_cost: h_cost,
            seq,
        });

        while let Some(current) = open_set.pop() {
            // Skip if already visited
            if !closed_set.insert(current.state.clone()) {
                continue;
            }
            states_explored += 1;

            // Check resource limits
            if states_explored > self.config.max_states_explored {
                warn!("A* exceeded max states explored limit");
                return Ok(None);
            }

            let elapsed_ms = start_time.elapsed().as_millis() as u64;
            if elapsed_ms > self.config.max_planning_time_ms {
                warn!("A* exceeded max planning time");
                return Ok(None);
            }

            let derived = domain.derive(&current.state);
            let index = FactIndex::new(current.state.iter().chain(derived.iter()));

            // Check if goal reached
            if self.is_goal_reached(&index, &problem.goal) {
                info!(
                    "A* found plan with {} steps, explored {} states in {}ms",
                    current.steps.len(),
                    states_explored,
                    elapsed_ms
                );
                return Ok(Some(current.steps));
            }

            if current.steps.len() >= self.config.max_steps {
                continue;
            }

            // Expand neighbors (try each applicable grounding)
            for action in &domain.actions {
                for assignment in action.groundings(&index) {
                    let new_state = action.apply(&current.state, &assignment);
                    if closed_set.contains(&new_state) {
                        continue;
                    }

                    let mut new_steps = current.steps.clone();
                    new_steps.push(action.ground(&assignment));

                    // Calculate costs
                    let g_cost = current.g_cost + action.cost;
                    let h_cost = {
                        let derived = domain.derive(&new_state);
                        let next_index = FactIndex::new(new_state.iter().chain(derived.iter()));
                        self.heuristic(&next_index, &problem.goal)
                    };
                    seq += 1;

                    open_set.push(SearchNode {
                        state: new_state,
                        steps: new_steps,
                        g_cost,
                        h_cost,
                        f_cost: g_cost + h_cost,
                        seq,
                    });
                }
            }
        }

        // No plan found
        debug!("A* exhausted {} states without reaching the goal", states_explored);
        Ok(None)
    }

    async fn validate_plan(&self, problem: &PlanningProblem, plan: &[PlanAction]) -> Result<bool> {
        // Simulate execution of the plan
        let domain = &problem.domain;
        let mut state: BTreeSet<Fact> = problem.init.iter().cloned().collect();

        for step in plan {
            let Some(action) = domain.action(&step.name) else {
                debug!("Unknown action {} in plan validation", step.name);
                return Ok(false);
            };
            let Some(assignment) = action.assignment_for(step) else {
                return Ok(false);
            };
            let derived = domain.derive(&state);
            let index = FactIndex::new(state.iter().chain(derived.iter()));
            if !action.groundings(&index).contains(&assignment) {
                return Ok(false);
            }
            state = action.apply(&state, &assignment);
        }

        let derived = domain.derive(&state);
        let index = FactIndex::new(state.iter().chain(derived.iter()));
        Ok(self.is_goal_reached(&index, &problem.goal))
    }

    fn config(&self) -> &PlannerConfig {
        &self.config
    }

    fn set_config(&mut self, config: PlannerConfig) {
        self.config = config;
    }
}
