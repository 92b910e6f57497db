//! Constraint satisfaction: find values for the free parameters of a set of
//! existential goal facts, optionally minimizing function cost terms.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use streamplan_core::{Fact, ObjectId, ObjectTable, PlanAction, PlanError, Result, ResultId, StreamId, Term, Value};
use streamplan_planner::{ActionSchema, Domain, Literal, Planner, PlanningProblem};
use streamplan_state::SolveStatus;
use streamplan_stream::{Stream, StreamSession};
use tracing::{debug, info};

use crate::config::SolveConfig;
use crate::context::SolveContext;
use crate::disable::{satisfiable_goal, CausalCluster};
use crate::encode::{split_plan, stream_action};
use crate::queue::SkeletonQueue;
use crate::reorder::reorder_stream_plan;
use crate::retrace::retrace_results;
use crate::search::{search_sample_loop, SearchOutcome, SkeletonSource};
use crate::skeleton::SkeletonCandidate;

/// Name of the single action whose arguments carry the bound parameters.
pub const BINDINGS_ACTION: &str = "bindings";

/// One conjunct of a satisfaction problem. `?x` arguments are existentially
/// quantified and shared across terms by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalTerm {
    /// A fact that must hold.
    Fact(Fact),
    /// A function term whose value is added to the cost.
    Minimize(Fact),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatisfactionSolution {
    /// Value of every free parameter, `None` when no assignment was found.
    pub bindings: Option<BTreeMap<String, Value>>,
    pub cost: f64,
    pub facts: Vec<Fact>,
    pub status: SolveStatus,
}

impl SatisfactionSolution {
    pub fn is_solved(&self) -> bool {
        self.status.is_solved()
    }

    pub fn binding(&self, parameter: &str) -> Option<&Value> {
        self.bindings.as_ref()?.get(parameter)
    }
}

/// Replace `?x` parameters with one parameter object per name.
fn bind_parameters(fact: &Fact, objects: &mut ObjectTable, parameters: &mut BTreeMap<String, ObjectId>) -> Fact {
    fact.map_args(|arg| match arg {
        Term::Param(name) => Term::Object(
            *parameters
                .entry(name.clone())
                .or_insert_with(|| objects.create_parameter(name.clone())),
        ),
        other => other.clone(),
    })
}

/// The function stream a cost term evaluates.
fn function_stream(session: &StreamSession, term: &Fact) -> Result<StreamId> {
    let stream = session
        .stream_id(&term.predicate)
        .filter(|&id| session.stream(id).is_function())
        .ok_or_else(|| PlanError::UnknownExternal {
            name: term.predicate.clone(),
        })?;
    let arity = session.stream(stream).inputs.len();
    if arity != term.args.len() {
        return Err(PlanError::InvalidFact {
            message: format!("{} expects {} arguments", term.predicate, arity),
        });
    }
    Ok(stream)
}

/// Optimistic results of the function streams named by `terms`.
fn plan_functions(session: &mut StreamSession, terms: &[Fact]) -> Result<Vec<ResultId>> {
    let mut plan = Vec::new();
    for term in terms {
        let stream = function_stream(session, term)?;
        let instance = session.get_instance(stream, term.args.clone());
        let result = session.next_optimistic(instance);
        if !plan.contains(&result) {
            plan.push(result);
        }
    }
    Ok(plan)
}

/// Solve for the free parameters of `terms`.
pub async fn constraint_satisfaction(
    terms: Vec<GoalTerm>,
    init: Vec<Fact>,
    streams: Vec<Stream>,
    planner: &dyn Planner,
    config: &SolveConfig,
) -> Result<SatisfactionSolution> {
    if terms.is_empty() {
        return Ok(SatisfactionSolution {
            bindings: Some(BTreeMap::new()),
            cost: 0.0,
            facts: init,
            status: SolveStatus::Solved,
        });
    }

    let mut ctx = SolveContext::new(streams, init, config)?;
    let mut parameters: BTreeMap<String, ObjectId> = BTreeMap::new();
    let mut constraints: Vec<Fact> = Vec::new();
    let mut functions: Vec<Fact> = Vec::new();
    for term in &terms {
        match term {
            GoalTerm::Fact(fact) => {
                let fact = bind_parameters(fact, ctx.session.objects_mut(), &mut parameters);
                if !constraints.contains(&fact) {
                    constraints.push(fact);
                }
            }
            GoalTerm::Minimize(fact) if config.costs => {
                functions.push(bind_parameters(fact, ctx.session.objects_mut(), &mut parameters));
            }
            GoalTerm::Minimize(_) => {}
        }
    }
    for term in &functions {
        function_stream(&ctx.session, term)?;
    }

    let goal_facts: Vec<Fact> = constraints
        .into_iter()
        .filter(|fact| !ctx.evaluations.contains(fact))
        .collect();
    let goal_objects: HashSet<ObjectId> = goal_facts.iter().flat_map(|f| f.objects()).collect();
    let free: Vec<(String, ObjectId)> = parameters
        .into_iter()
        .filter(|(_, object)| goal_objects.contains(object))
        .collect();
    let free_objects: HashSet<ObjectId> = free.iter().map(|&(_, object)| object).collect();
    if let Some(term) = functions
        .iter()
        .find(|term| term.objects().any(|object| !free_objects.contains(&object)))
    {
        return Err(PlanError::InvalidFact {
            message: format!("{} uses a parameter no goal fact constrains", term.predicate),
        });
    }

    let results = retrace_results(&mut ctx.session, &ctx.evaluations, &goal_facts, &free_objects)?;
    let function_plan = plan_functions(&mut ctx.session, &functions)?;
    let cost: f64 = function_plan
        .iter()
        .filter_map(|&r| ctx.session.result(r).value)
        .sum();
    info!(
        parameters = free.len(),
        goal_facts = goal_facts.len(),
        results = results.len(),
        functions = function_plan.len(),
        cost,
        "Retraced satisfaction problem"
    );
    if config.max_cost.map_or(false, |max_cost| max_cost < cost) {
        return Ok(SatisfactionSolution {
            bindings: None,
            cost: f64::INFINITY,
            facts: ctx.evaluations.to_facts(),
            status: SolveStatus::Infeasible,
        });
    }

    let mut goal: Vec<Literal> = goal_facts.into_iter().map(Literal::pos).collect();
    goal.push(satisfiable_goal());
    let mut source = SatisfactionSource {
        planner,
        actions: results
            .iter()
            .map(|&r| stream_action(ctx.session.result(r), true))
            .collect(),
        init: ctx.evaluations.to_facts(),
        goal,
        function_plan,
        template: vec![PlanAction::new(
            BINDINGS_ACTION,
            free.iter().map(|&(_, object)| Term::Object(object)),
        )],
        cost,
    };
    let mut queue = SkeletonQueue::new();
    search_sample_loop(&mut ctx, &mut queue, &mut source, config).await?;

    let solution = ctx.into_solution();
    let bindings = solution.plan.as_ref().and_then(|plan| plan.first()).map(|action| {
        free.iter()
            .zip(&action.args)
            .filter_map(|((name, _), term)| Some((name.clone(), term.as_value()?.clone())))
            .collect::<BTreeMap<String, Value>>()
    });
    Ok(SatisfactionSolution {
        bindings,
        cost: solution.cost,
        facts: solution.facts,
        status: solution.status,
    })
}

struct SatisfactionSource<'a> {
    planner: &'a dyn Planner,
    actions: Vec<ActionSchema>,
    init: Vec<Fact>,
    goal: Vec<Literal>,
    function_plan: Vec<ResultId>,
    template: Vec<PlanAction>,
    cost: f64,
}

#[async_trait]
impl SkeletonSource for SatisfactionSource<'_> {
    async fn search(&mut self, ctx: &mut SolveContext, queue: &SkeletonQueue) -> Result<SearchOutcome> {
        let mut domain = Domain::new(self.actions.clone());
        domain.axioms = queue.disable_axioms(&ctx.session, &CausalCluster);
        let problem = PlanningProblem::new(domain, self.init.clone(), self.goal.clone());
        let Some(plan) = self.planner.plan(&problem).await? else {
            return Ok(SearchOutcome::Exhausted);
        };

        let (mut stream_plan, _) = split_plan(plan);
        stream_plan.extend(self.function_plan.iter().copied());
        let candidate = SkeletonCandidate {
            stream_plan: reorder_stream_plan(&ctx.session, &stream_plan),
            action_plan: self.template.clone(),
            cost: self.cost,
        };
        debug!(results = candidate.stream_plan.len(), "Satisfaction skeleton");
        if queue.contains(&candidate) {
            return Ok(if queue.is_empty() {
                SearchOutcome::Exhausted
            } else {
                SearchOutcome::Retry
            });
        }
        Ok(SearchOutcome::Found(candidate))
    }

    fn complexity_limit(&self) -> usize {
        usize::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamplan_planner::AStarPlanner;
    use streamplan_stream::{from_function, from_gen_fn, StreamInfo};

    fn conf_stream() -> Stream {
        Stream::builder("sample-conf")
            .inputs(["?r"])
            .domain(Fact::new("region", ["?r"]))
            .outputs(["?q"])
            .certified(Fact::new("conf", ["?r", "?q"]))
            .procedure(from_gen_fn(|_: &[Value]| (1..=3i64).map(|i| vec![Value::from(i)])))
            .build()
            .unwrap()
    }

    fn distance_stream() -> Stream {
        Stream::builder("distance")
            .inputs(["?q"])
            .domain(Fact::new("conf", ["kitchen", "?q"]))
            .procedure(from_function(|inputs: &[Value]| inputs[0].as_f64().unwrap_or(0.0)))
            .info(StreamInfo::default().with_opt_value(1.0))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_terms() {
        let planner = AStarPlanner::new();
        let solution = constraint_satisfaction(Vec::new(), vec![Fact::atom("x")], Vec::new(), &planner, &SolveConfig::default())
            .await
            .unwrap();
        assert_eq!(solution.bindings, Some(BTreeMap::new()));
        assert_eq!(solution.cost, 0.0);
        assert_eq!(solution.facts, vec![Fact::atom("x")]);
    }

    #[tokio::test]
    async fn test_binds_free_parameter() {
        let planner = AStarPlanner::new();
        let terms = vec![GoalTerm::Fact(Fact::new("conf", ["kitchen", "?q"]))];
        let solution = constraint_satisfaction(
            terms,
            vec![Fact::new("region", ["kitchen"])],
            vec![conf_stream()],
            &planner,
            &SolveConfig::default(),
        )
        .await
        .unwrap();
        assert!(solution.is_solved());
        assert_eq!(solution.binding("?q"), Some(&Value::from(1i64)));
        assert!(solution.facts.contains(&Fact::new("conf", [Term::from("kitchen"), Term::from(1i64)])));
    }

    #[tokio::test]
    async fn test_function_cost() {
        let planner = AStarPlanner::new();
        let terms = vec![
            GoalTerm::Fact(Fact::new("conf", ["kitchen", "?q"])),
            GoalTerm::Minimize(Fact::new("distance", ["?q"])),
        ];
        let solution = constraint_satisfaction(
            terms.clone(),
            vec![Fact::new("region", ["kitchen"])],
            vec![conf_stream(), distance_stream()],
            &planner,
            &SolveConfig::default(),
        )
        .await
        .unwrap();
        assert!(solution.is_solved());
        assert_eq!(solution.cost, 1.0);

        let without_costs = constraint_satisfaction(
            terms,
            vec![Fact::new("region", ["kitchen"])],
            vec![conf_stream(), distance_stream()],
            &planner,
            &SolveConfig::default().with_costs(false),
        )
        .await
        .unwrap();
        assert_eq!(without_costs.cost, 0.0);
    }

    #[tokio::test]
    async fn test_optimistic_cost_over_max_cost() {
        let planner = AStarPlanner::new();
        let terms = vec![
            GoalTerm::Fact(Fact::new("conf", ["kitchen", "?q"])),
            GoalTerm::Minimize(Fact::new("distance", ["?q"])),
        ];
        let solution = constraint_satisfaction(
            terms,
            vec![Fact::new("region", ["kitchen"])],
            vec![conf_stream(), distance_stream()],
            &planner,
            &SolveConfig::default().with_max_cost(0.5),
        )
        .await
        .unwrap();
        assert!(solution.bindings.is_none());
        assert_eq!(solution.cost, f64::INFINITY);
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let planner = AStarPlanner::new();
        let terms = vec![GoalTerm::Minimize(Fact::new("length", ["?q"]))];
        let err = constraint_satisfaction(terms, Vec::new(), vec![conf_stream()], &planner, &SolveConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::UnknownExternal { name } if name == "length"));
    }

    #[tokio::test]
    async fn test_cost_term_validation() {
        let planner = AStarPlanner::new();
        let unconstrained = vec![GoalTerm::Minimize(Fact::new("distance", ["?q"]))];
        let err = constraint_satisfaction(
            unconstrained,
            Vec::new(),
            vec![conf_stream(), distance_stream()],
            &planner,
            &SolveConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PlanError::InvalidFact { .. }));

        let wrong_arity = vec![
            GoalTerm::Fact(Fact::new("conf", ["kitchen", "?q"])),
            GoalTerm::Minimize(Fact::new("distance", ["?q", "?q"])),
        ];
        let err = constraint_satisfaction(
            wrong_arity,
            vec![Fact::new("region", ["kitchen"])],
            vec![conf_stream(), distance_stream()],
            &planner,
            &SolveConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PlanError::InvalidFact { message } if message.contains("expects 1")));
    }

    #[tokio::test]
    async fn test_unachievable_constraint() {
        let planner = AStarPlanner::new();
        let terms = vec![GoalTerm::Fact(Fact::new("conf", ["garage", "?q"]))];
        let solution = constraint_satisfaction(
            terms,
            vec![Fact::new("region", ["kitchen"])],
            vec![conf_stream()],
            &planner,
            &SolveConfig::default(),
        )
        .await
        .unwrap();
        assert!(!solution.is_solved());
        assert!(solution.bindings.is_none());
    }
}
