//! Planner trait, configuration, and the planning-domain model handed to it.

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use streamplan_core::{
    instantiate, match_all, Assignment, Fact, FactIndex, PlanAction, PlanError, Result,
};

/// Configuration for the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Maximum number of steps allowed in a plan.
    pub max_steps: usize,

    /// Maximum planning time in milliseconds.
    pub max_planning_time_ms: u64,

    /// Maximum number of states to explore.
    pub max_states_explored: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            max_planning_time_ms: 30_000,
            max_states_explored: 100_000,
        }
    }
}

/// A goal or precondition literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub fact: Fact,
    pub negated: bool,
}

impl Literal {
    pub fn pos(fact: Fact) -> Self {
        Self {
            fact,
            negated: false,
        }
    }

    pub fn neg(fact: Fact) -> Self {
        Self {
            fact,
            negated: true,
        }
    }

    /// Evaluate a ground literal against a set of true facts.
    pub fn holds(&self, facts: &FactIndex<'_>) -> bool {
        facts.contains(&self.fact) != self.negated
    }
}

/// Parameterized action with STRIPS-style preconditions and effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSchema {
    /// Name of the action.
    pub name: String,

    /// Parameter names, e.g. `?b`.
    pub parameters: Vec<String>,

    /// Preconditions that must hold.
    pub preconditions: Vec<Literal>,

    /// Facts made true.
    pub add_effects: Vec<Fact>,

    /// Facts made false.
    pub del_effects: Vec<Fact>,

    /// Cost of applying the action.
    pub cost: f64,
}

impl ActionSchema {
    pub fn new(name: impl Into<String>, parameters: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
            preconditions: Vec::new(),
            add_effects: Vec::new(),
            del_effects: Vec::new(),
            cost: 1.0,
        }
    }

    pub fn precondition(mut self, fact: Fact) -> Self {
        self.preconditions.push(Literal::pos(fact));
        self
    }

    pub fn negative_precondition(mut self, fact: Fact) -> Self {
        self.preconditions.push(Literal::neg(fact));
        self
    }

    pub fn adds(mut self, fact: Fact) -> Self {
        self.add_effects.push(fact);
        self
    }

    pub fn deletes(mut self, fact: Fact) -> Self {
        self.del_effects.push(fact);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Every parameter must be bound by a positive precondition, and no
    /// other parameter may appear anywhere in the schema.
    pub fn validate(&self) -> Result<()> {
        let declared: HashSet<&str> = self.parameters.iter().map(String::as_str).collect();
        let bound: HashSet<&str> = self
            .preconditions
            .iter()
            .filter(|l| !l.negated)
            .flat_map(|l| l.fact.params())
            .collect();
        if let Some(missing) = self.parameters.iter().find(|p| !bound.contains(p.as_str())) {
            return Err(PlanError::InvalidDomain {
                message: format!(
                    "parameter {} of {} is not bound by a positive precondition",
                    missing, self.name
                ),
            });
        }
        let mentioned = self
            .preconditions
            .iter()
            .map(|l| &l.fact)
            .chain(&self.add_effects)
            .chain(&self.del_effects)
            .flat_map(|f| f.params());
        for param in mentioned {
            if !declared.contains(param) {
                return Err(PlanError::InvalidDomain {
                    message: format!("{} mentions undeclared parameter {}", self.name, param),
                });
            }
        }
        Ok(())
    }

    /// All parameter assignments under which the preconditions hold.
    pub fn groundings(&self, facts: &FactIndex<'_>) -> Vec<Assignment> {
        let positive: Vec<Fact> = self
            .preconditions
            .iter()
            .filter(|l| !l.negated)
            .map(|l| l.fact.clone())
            .collect();
        match_all(&positive, facts, &Assignment::new())
            .into_iter()
            .filter(|assignment| {
                self.preconditions
                    .iter()
                    .filter(|l| l.negated)
                    .all(|l| !facts.contains(&instantiate(&l.fact, assignment)))
            })
            .collect()
    }

    /// The plan step for a grounding.
    pub fn ground(&self, assignment: &Assignment) -> PlanAction {
        PlanAction {
            name: self.name.clone(),
            args: self
                .parameters
                .iter()
                .map(|p| assignment[p].clone())
                .collect(),
        }
    }

    /// Successor state for a grounding. Deletes apply before adds.
    pub fn apply(&self, state: &BTreeSet<Fact>, assignment: &Assignment) -> BTreeSet<Fact> {
        let mut next = state.clone();
        for fact in &self.del_effects {
            next.remove(&instantiate(fact, assignment));
        }
        for fact in &self.add_effects {
            next.insert(instantiate(fact, assignment));
        }
        next
    }

    /// Bind parameters from a plan step.
    pub fn assignment_for(&self, action: &PlanAction) -> Option<Assignment> {
        if action.name != self.name || action.args.len() != self.parameters.len() {
            return None;
        }
        Some(
            self.parameters
                .iter()
                .cloned()
                .zip(action.args.iter().cloned())
                .collect(),
        )
    }
}

/// Derivation rule: `derived` holds whenever all `preconditions` hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axiom {
    pub parameters: Vec<String>,
    pub preconditions: Vec<Fact>,
    pub derived: Fact,
}

impl Axiom {
    pub fn new(parameters: Vec<String>, preconditions: Vec<Fact>, derived: Fact) -> Self {
        Self {
            parameters,
            preconditions,
            derived,
        }
    }
}

/// Actions and axioms available to the planner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Domain {
    pub actions: Vec<ActionSchema>,
    pub axioms: Vec<Axiom>,
}

impl Domain {
    pub fn new(actions: Vec<ActionSchema>) -> Self {
        Self {
            actions,
            axioms: Vec::new(),
        }
    }

    pub fn action(&self, name: &str) -> Option<&ActionSchema> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        self.actions.iter().try_for_each(ActionSchema::validate)
    }

    /// Facts derived by the axioms from `state`, computed to a fixed point.
    pub fn derive(&self, state: &BTreeSet<Fact>) -> HashSet<Fact> {
        let mut derived: HashSet<Fact> = HashSet::new();
        if self.axioms.is_empty() {
            return derived;
        }
        loop {
            let new_facts: Vec<Fact> = {
                let index = FactIndex::new(state.iter().chain(derived.iter()));
                self.axioms
                    .iter()
                    .flat_map(|axiom| {
                        match_all(&axiom.preconditions, &index, &Assignment::new())
                            .into_iter()
                            .map(move |a| instantiate(&axiom.derived, &a))
                    })
                    .filter(|f| f.is_ground() && !state.contains(f) && !derived.contains(f))
                    .collect()
            };
            if new_facts.is_empty() {
                return derived;
            }
            derived.extend(new_facts);
        }
    }

    /// Sum of action costs of `plan`; unknown actions cost nothing.
    pub fn plan_cost(&self, plan: &[PlanAction]) -> f64 {
        plan.iter()
            .filter_map(|step| self.action(&step.name))
            .map(|a| a.cost)
            .sum()
    }
}

/// Everything the planner needs for one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningProblem {
    pub domain: Domain,
    pub init: Vec<Fact>,
    pub goal: Vec<Literal>,
}

impl PlanningProblem {
    pub fn new(domain: Domain, init: Vec<Fact>, goal: Vec<Literal>) -> Self {
        Self { domain, init, goal }
    }
}

/// Trait for planning engines.
///
/// `plan` returns `Ok(None)` when no plan exists under the given facts and
/// axioms (or the planner gave up within its own limits).
#[async_trait]
pub trait Planner: Send + Sync {
    /// Generate a plan for the given problem.
    async fn plan(&self, problem: &PlanningProblem) -> Result<Option<Vec<PlanAction>>>;

    /// Check if a plan reaches the goal from the initial facts.
    async fn validate_plan(&self, problem: &PlanningProblem, plan: &[PlanAction]) -> Result<bool>;

    /// Get the planner configuration.
    fn config(&self) -> &PlannerConfig;

    /// Update the planner configuration.
    fn set_config(&mut self, config: PlannerConfig);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_validation() {
        let ok = ActionSchema::new("pick", ["?b"])
            .precondition(Fact::new("clear", ["?b"]))
            .adds(Fact::new("holding", ["?b"]));
        assert!(ok.validate().is_ok());

        let unbound = ActionSchema::new("pick", ["?b"]).adds(Fact::new("holding", ["?b"]));
        assert!(unbound.validate().is_err());

        let undeclared = ActionSchema::new("pick", ["?b"])
            .precondition(Fact::new("clear", ["?b"]))
            .adds(Fact::new("holding", ["?c"]));
        assert!(undeclared.validate().is_err());
    }

    #[test]
    fn test_groundings_honor_negative_preconditions() {
        let schema = ActionSchema::new("paint", ["?b"])
            .precondition(Fact::new("block", ["?b"]))
            .negative_precondition(Fact::new("painted", ["?b"]));
        let facts = vec![
            Fact::new("block", ["A"]),
            Fact::new("block", ["B"]),
            Fact::new("painted", ["A"]),
        ];
        let groundings = schema.groundings(&FactIndex::new(&facts));
        assert_eq!(groundings.len(), 1);
        assert_eq!(schema.ground(&groundings[0]), PlanAction::new("paint", ["B"]));
    }

    #[test]
    fn test_derive_fixed_point() {
        let mut domain = Domain::default();
        domain.axioms.push(Axiom::new(
            vec!["?x".into(), "?y".into()],
            vec![Fact::new("edge", ["?x", "?y"])],
            Fact::new("reach", ["?x", "?y"]),
        ));
        domain.axioms.push(Axiom::new(
            vec!["?x".into(), "?y".into(), "?z".into()],
            vec![Fact::new("reach", ["?x", "?y"]), Fact::new("edge", ["?y", "?z"])],
            Fact::new("reach", ["?x", "?z"]),
        ));
        let state: BTreeSet<Fact> = [Fact::new("edge", ["a", "b"]), Fact::new("edge", ["b", "c"])]
            .into_iter()
            .collect();
        let derived = domain.derive(&state);
        assert!(derived.contains(&Fact::new("reach", ["a", "c"])));
        assert_eq!(derived.len(), 3);
    }

    #[test]
    fn test_plan_cost() {
        let domain = Domain::new(vec![
            ActionSchema::new("move", Vec::<String>::new()).with_cost(2.5),
        ]);
        let plan = vec![
            PlanAction::new("move", Vec::<String>::new()),
            PlanAction::new("move", Vec::<String>::new()),
        ];
        assert_eq!(domain.plan_cost(&plan), 5.0);
    }
}
