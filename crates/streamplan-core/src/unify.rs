//! Matching of templated facts against ground facts.

use std::collections::{HashMap, HashSet};

use crate::types::{Fact, Term};

/// Parameter name to term assignment produced by matching.
pub type Assignment = HashMap<String, Term>;

/// Facts grouped by predicate for fast matching.
#[derive(Debug, Default)]
pub struct FactIndex<'a> {
    by_predicate: HashMap<&'a str, Vec<&'a Fact>>,
    all: HashSet<&'a Fact>,
}

impl<'a> FactIndex<'a> {
    pub fn new(facts: impl IntoIterator<Item = &'a Fact>) -> Self {
        let mut index = Self::default();
        for fact in facts {
            index.insert(fact);
        }
        index
    }

    pub fn insert(&mut self, fact: &'a Fact) {
        if self.all.insert(fact) {
            self.by_predicate
                .entry(fact.predicate.as_str())
                .or_default()
                .push(fact);
        }
    }

    pub fn contains(&self, fact: &Fact) -> bool {
        self.all.contains(fact)
    }

    pub fn with_predicate(&self, predicate: &str) -> &[&'a Fact] {
        self.by_predicate
            .get(predicate)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Substitute assigned parameters into `pattern`; unassigned parameters stay.
pub fn instantiate(pattern: &Fact, assignment: &Assignment) -> Fact {
    pattern.map_args(|arg| match arg {
        Term::Param(name) => assignment.get(name).cloned().unwrap_or_else(|| arg.clone()),
        other => other.clone(),
    })
}

/// Extend `assignment` so that `pattern` equals `fact`, or return `None`.
pub fn match_fact(pattern: &Fact, fact: &Fact, assignment: &Assignment) -> Option<Assignment> {
    if pattern.predicate != fact.predicate || pattern.args.len() != fact.args.len() {
        return None;
    }
    let mut extended = assignment.clone();
    for (expected, actual) in pattern.args.iter().zip(&fact.args) {
        match expected {
            Term::Param(name) => match extended.get(name) {
                Some(bound) if bound != actual => return None,
                Some(_) => {}
                None => {
                    extended.insert(name.clone(), actual.clone());
                }
            },
            other if other != actual => return None,
            _ => {}
        }
    }
    Some(extended)
}

/// Every extension of `assignment` under which all `patterns` are in `index`.
pub fn match_all(patterns: &[Fact], index: &FactIndex<'_>, assignment: &Assignment) -> Vec<Assignment> {
    let mut frontier = vec![assignment.clone()];
    for pattern in patterns {
        let mut next = Vec::new();
        for partial in &frontier {
            let bound = instantiate(pattern, partial);
            if bound.is_ground() {
                if index.contains(&bound) {
                    next.push(partial.clone());
                }
                continue;
            }
            for fact in index.with_predicate(&bound.predicate) {
                if let Some(extended) = match_fact(&bound, fact, partial) {
                    next.push(extended);
                }
            }
        }
        if next.is_empty() {
            return next;
        }
        frontier = next;
    }
    frontier
}
