//! Stream results: one output tuple of an instance, optimistic or real.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use streamplan_core::{Fact, InstanceId, ObjectId, ResultId, StreamId, Term, Value};

use crate::stream::StreamKind;

/// One output tuple of a stream instance together with the facts it certifies.
///
/// Optimistic results carry optimistic objects as outputs and are only ever
/// used for planning. Real results carry concrete values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamResult {
    pub id: ResultId,
    pub instance: InstanceId,
    pub stream: StreamId,
    pub stream_name: String,
    pub kind: StreamKind,
    pub inputs: Vec<Term>,
    pub outputs: Vec<Term>,
    /// Domain facts instantiated with the inputs.
    pub domain: Vec<Fact>,
    /// Certified facts instantiated with inputs and outputs.
    pub certified: Vec<Fact>,
    /// Extra facts reported by the procedure.
    pub wild: Vec<Fact>,
    pub optimistic: bool,
    /// Function value (real, or the stream's optimistic value).
    pub value: Option<f64>,
    pub effort: f64,
}

impl StreamResult {
    /// Fact naming this exact result, `_<stream>(inputs.., outputs..)`.
    pub fn stream_fact(&self) -> Fact {
        Fact::new(
            format!("_{}", self.stream_name),
            self.inputs.iter().chain(&self.outputs).cloned(),
        )
    }

    /// The evaluation recorded for a function result: `name(inputs.., value)`.
    pub fn function_fact(&self) -> Option<Fact> {
        let value = self.value?;
        Some(Fact::new(
            self.stream_name.clone(),
            self.inputs
                .iter()
                .cloned()
                .chain(std::iter::once(Term::Value(Value::Float(value)))),
        ))
    }

    pub fn is_function(&self) -> bool {
        self.kind == StreamKind::Function
    }

    pub fn input_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.inputs.iter().filter_map(Term::as_object)
    }

    pub fn output_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.outputs.iter().filter_map(Term::as_object)
    }

    /// True if `other` must be realized first: it produces one of our input
    /// objects or certifies one of our domain facts.
    pub fn depends_on(&self, other: &StreamResult) -> bool {
        let produced: HashSet<ObjectId> = other.output_objects().collect();
        self.input_objects().any(|o| produced.contains(&o))
            || self.domain.iter().any(|fact| other.certified.contains(fact))
    }
}
