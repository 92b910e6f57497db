//! Optimistic objects: placeholders for stream outputs that have not been
//! sampled yet.
//!
//! Objects live in a session-wide arena ([`ObjectTable`]) and are referred to
//! by [`ObjectId`] handles. Concrete values are never stored in the arena:
//! each binding owns its own [`Resolution`], so resolving an object in one
//! skeleton cannot leak into another skeleton that shares the same handle.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::types::{Fact, InstanceId, ObjectId, PlanAction, Term, Value};

/// Where an optimistic object came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectOrigin {
    /// Output `slot` of a stream instance.
    Stream { instance: InstanceId, slot: usize },
    /// A free parameter of a constraint-satisfaction goal, e.g. `?q`.
    Parameter { name: String },
}

/// Arena of optimistic objects for one planning session.
#[derive(Debug, Default, Clone)]
pub struct ObjectTable {
    origins: Vec<ObjectOrigin>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh placeholder for one output slot of a stream instance.
    pub fn create(&mut self, instance: InstanceId, slot: usize) -> ObjectId {
        self.push(ObjectOrigin::Stream { instance, slot })
    }

    /// Allocate a placeholder for a named goal parameter.
    pub fn create_parameter(&mut self, name: impl Into<String>) -> ObjectId {
        self.push(ObjectOrigin::Parameter { name: name.into() })
    }

    fn push(&mut self, origin: ObjectOrigin) -> ObjectId {
        let id = ObjectId(self.origins.len());
        self.origins.push(origin);
        id
    }

    pub fn origin(&self, id: ObjectId) -> Option<&ObjectOrigin> {
        self.origins.get(id.0)
    }

    /// The parameter name for parameter objects.
    pub fn parameter_name(&self, id: ObjectId) -> Option<&str> {
        match self.origin(id) {
            Some(ObjectOrigin::Parameter { name }) => Some(name),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

/// Concrete values assigned to optimistic objects by one binding.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    values: HashMap<ObjectId, Value>,
}

impl Resolution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `object` to `value`. Each object is resolved at most once.
    pub fn resolve(&mut self, object: ObjectId, value: Value) -> Result<()> {
        if self.values.contains_key(&object) {
            return Err(PlanError::ObjectAlreadyResolved { object });
        }
        self.values.insert(object, value);
        Ok(())
    }

    pub fn is_resolved(&self, object: ObjectId) -> bool {
        self.values.contains_key(&object)
    }

    /// The value of a resolved object.
    pub fn value(&self, object: ObjectId) -> Result<&Value> {
        self.values
            .get(&object)
            .ok_or(PlanError::UnboundObject { object })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replace resolved objects in `term`, leaving everything else untouched.
    pub fn apply_term(&self, term: &Term) -> Term {
        match term {
            Term::Object(id) => self
                .values
                .get(id)
                .map(|v| Term::Value(v.clone()))
                .unwrap_or_else(|| term.clone()),
            other => other.clone(),
        }
    }

    pub fn apply_fact(&self, fact: &Fact) -> Fact {
        fact.map_args(|arg| self.apply_term(arg))
    }

    /// Fully concrete value of `term`; fails on unresolved objects.
    pub fn ground_term(&self, term: &Term) -> Result<Value> {
        match term {
            Term::Value(v) => Ok(v.clone()),
            Term::Object(id) => self.value(*id).cloned(),
            Term::Param(name) => Err(PlanError::InvalidFact {
                message: format!("parameter {} cannot be grounded", name),
            }),
        }
    }

    pub fn ground_terms(&self, terms: &[Term]) -> Result<Vec<Value>> {
        terms.iter().map(|t| self.ground_term(t)).collect()
    }

    pub fn ground_fact(&self, fact: &Fact) -> Result<Fact> {
        let args = self
            .ground_terms(&fact.args)?
            .into_iter()
            .map(Term::Value)
            .collect();
        Ok(Fact {
            predicate: fact.predicate.clone(),
            args,
        })
    }

    pub fn ground_action(&self, action: &PlanAction) -> Result<PlanAction> {
        let args = self
            .ground_terms(&action.args)?
            .into_iter()
            .map(Term::Value)
            .collect();
        Ok(PlanAction {
            name: action.name.clone(),
            args,
        })
    }
}
