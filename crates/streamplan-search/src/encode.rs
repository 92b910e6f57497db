//! Encoding of stream results as planner actions.

use streamplan_core::{Fact, PlanAction, ResultId, Term};
use streamplan_planner::{ActionSchema, Domain};
use streamplan_stream::StreamResult;

/// Name prefix of actions standing in for stream results.
pub const STREAM_ACTION_PREFIX: &str = "_stream-";

/// Marks an optimistic object as bound by some result.
pub const BOUND_PREDICATE: &str = "_bound";

pub fn stream_action_name(result: ResultId) -> String {
    format!("{}{}", STREAM_ACTION_PREFIX, result.0)
}

/// The result a plan step stands for, if it is a stream action.
pub fn parse_stream_action(action: &PlanAction) -> Option<ResultId> {
    action
        .name
        .strip_prefix(STREAM_ACTION_PREFIX)?
        .parse()
        .ok()
        .map(ResultId)
}

/// Zero-parameter action applicable when the result's domain facts hold,
/// adding its certified facts and its stream fact. Costs the result's effort.
///
/// With `unique_binding`, each output object can be bound by one result only.
pub fn stream_action(result: &StreamResult, unique_binding: bool) -> ActionSchema {
    let mut action = ActionSchema::new(stream_action_name(result.id), Vec::<String>::new())
        .with_cost(result.effort);
    for fact in &result.domain {
        action = action.precondition(fact.clone());
    }
    if unique_binding {
        for object in result.output_objects() {
            let bound = Fact::new(BOUND_PREDICATE, [Term::Object(object)]);
            action = action.negative_precondition(bound.clone()).adds(bound);
        }
    }
    for fact in &result.certified {
        action = action.adds(fact.clone());
    }
    action.adds(result.stream_fact())
}

/// Separate a planner's plan into stream results and user actions.
pub fn split_plan(plan: Vec<PlanAction>) -> (Vec<ResultId>, Vec<PlanAction>) {
    let mut stream_plan = Vec::new();
    let mut action_plan = Vec::new();
    for step in plan {
        match parse_stream_action(&step) {
            Some(result) => stream_plan.push(result),
            None => action_plan.push(step),
        }
    }
    (stream_plan, action_plan)
}

/// The domain with every action costing 1 when `unit_costs` is set.
pub fn apply_unit_costs(mut domain: Domain, unit_costs: bool) -> Domain {
    if unit_costs {
        for action in &mut domain.actions {
            action.cost = 1.0;
        }
    }
    domain
}
