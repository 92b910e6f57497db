//! Append-only store of facts known to be true.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use streamplan_core::{Fact, FactIndex, PlanError, Result, ResultId};

/// Why a fact is known to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvaluationSource {
    /// Given in the initial state.
    Initial,
    /// Certified by a sampled stream result.
    Certified { result: ResultId },
    /// Discovered by a stream beyond its declared certified facts.
    Wild { result: ResultId },
}

/// A fact known to be true, tagged with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// The concrete fact.
    pub fact: Fact,

    /// What produced it.
    pub source: EvaluationSource,

    /// Insertion order (monotonically increasing).
    pub version: u64,
}

/// Canonical set of real evaluations for one planning session.
///
/// The store only grows: facts are never retracted, and adding a fact twice
/// keeps the first provenance.
#[derive(Debug, Default, Clone)]
pub struct EvaluationStore {
    entries: Vec<Evaluation>,
    index: HashMap<Fact, usize>,
}

impl EvaluationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the initial facts.
    pub fn from_init(init: impl IntoIterator<Item = Fact>) -> Result<Self> {
        let mut store = Self::new();
        for fact in init {
            store.add(fact, EvaluationSource::Initial)?;
        }
        Ok(store)
    }

    /// Record a fact. Returns true if it was not known before.
    pub fn add(&mut self, fact: Fact, source: EvaluationSource) -> Result<bool> {
        if !fact.is_concrete() {
            return Err(PlanError::InvalidFact {
                message: format!("evaluation {} is not concrete", fact),
            });
        }
        if self.index.contains_key(&fact) {
            return Ok(false);
        }
        let version = self.entries.len() as u64 + 1;
        self.index.insert(fact.clone(), self.entries.len());
        self.entries.push(Evaluation {
            fact,
            source,
            version,
        });
        Ok(true)
    }

    pub fn contains(&self, fact: &Fact) -> bool {
        self.index.contains_key(fact)
    }

    pub fn get(&self, fact: &Fact) -> Option<&Evaluation> {
        self.index.get(fact).map(|&i| &self.entries[i])
    }

    /// All evaluations in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Evaluation> {
        self.entries.iter()
    }

    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.entries.iter().map(|e| &e.fact)
    }

    /// Owned copy of every fact, in insertion order.
    pub fn to_facts(&self) -> Vec<Fact> {
        self.facts().cloned().collect()
    }

    /// Index of the current facts for matching.
    pub fn fact_index(&self) -> FactIndex<'_> {
        FactIndex::new(self.facts())
    }

    /// Facts produced by a given stream result.
    pub fn from_result(&self, result: ResultId) -> Vec<&Fact> {
        self.entries
            .iter()
            .filter(|e| match e.source {
                EvaluationSource::Certified { result: r } | EvaluationSource::Wild { result: r } => {
                    r == result
                }
                EvaluationSource::Initial => false,
            })
            .map(|e| &e.fact)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current version of the store.
    pub fn version(&self) -> u64 {
        self.entries.len() as u64
    }
}
