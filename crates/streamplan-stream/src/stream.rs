//! Stream declarations: a named procedure with typed inputs/outputs and the
//! domain and certified facts it relates.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use streamplan_core::{Fact, PlanError, Result, Term, Value};

use crate::procedure::Procedure;

/// Outputs served for one input tuple without invoking the procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedOutputs {
    pub inputs: Vec<Value>,
    pub outputs: Vec<Vec<Value>>,
}

/// Per-stream configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamInfo {
    /// Sample ready instances before every planner call.
    pub eager: bool,

    /// Expected cost of one call, used to prioritize and bound search.
    pub effort: f64,

    /// Optimistic value of a function stream (a lower bound on its cost).
    pub opt_value: f64,

    /// Cached result source consulted before the procedure.
    pub precomputed: Vec<PrecomputedOutputs>,
}

impl Default for StreamInfo {
    fn default() -> Self {
        Self {
            eager: false,
            effort: 1.0,
            opt_value: 0.0,
            precomputed: Vec::new(),
        }
    }
}

impl StreamInfo {
    pub fn eager() -> Self {
        Self {
            eager: true,
            ..Self::default()
        }
    }

    pub fn with_effort(mut self, effort: f64) -> Self {
        self.effort = effort;
        self
    }

    pub fn with_opt_value(mut self, opt_value: f64) -> Self {
        self.opt_value = opt_value;
        self
    }

    pub fn with_precomputed(mut self, inputs: Vec<Value>, outputs: Vec<Vec<Value>>) -> Self {
        self.precomputed.push(PrecomputedOutputs { inputs, outputs });
        self
    }
}

/// What a stream's procedure returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Generator,
    Test,
    Function,
}

/// A named template wrapping an external procedure.
#[derive(Debug, Clone)]
pub struct Stream {
    /// Unique name within a session.
    pub name: String,

    /// Input parameter names, e.g. `?q1`.
    pub inputs: Vec<String>,

    /// Preconditions over the inputs.
    pub domain: Vec<Fact>,

    /// Output parameter names.
    pub outputs: Vec<String>,

    /// Postconditions over inputs and outputs.
    pub certified: Vec<Fact>,

    /// Configuration record.
    pub info: StreamInfo,

    procedure: Procedure,
}

impl Stream {
    /// Create and validate a stream.
    pub fn new(
        name: impl Into<String>,
        procedure: Procedure,
        inputs: Vec<String>,
        domain: Vec<Fact>,
        outputs: Vec<String>,
        certified: Vec<Fact>,
        info: StreamInfo,
    ) -> Result<Self> {
        let stream = Self {
            name: name.into(),
            inputs,
            domain,
            outputs,
            certified,
            info,
            procedure,
        };
        stream.validate()?;
        Ok(stream)
    }

    /// Start building a stream.
    pub fn builder(name: impl Into<String>) -> StreamBuilder {
        StreamBuilder::new(name)
    }

    pub fn kind(&self) -> StreamKind {
        match self.procedure {
            Procedure::Generator(_) => StreamKind::Generator,
            Procedure::Test(_) => StreamKind::Test,
            Procedure::Function(_) => StreamKind::Function,
        }
    }

    pub fn is_test(&self) -> bool {
        self.kind() == StreamKind::Test
    }

    pub fn is_function(&self) -> bool {
        self.kind() == StreamKind::Function
    }

    pub fn procedure(&self) -> &Procedure {
        &self.procedure
    }

    /// Number of values each output tuple must carry.
    pub fn output_arity(&self) -> usize {
        match self.kind() {
            StreamKind::Function => 1,
            _ => self.outputs.len(),
        }
    }

    /// Precomputed outputs for an input tuple, if any.
    pub fn precomputed(&self, inputs: &[Value]) -> Option<&[Vec<Value>]> {
        self.info
            .precomputed
            .iter()
            .find(|p| p.inputs == inputs)
            .map(|p| p.outputs.as_slice())
    }

    /// Domain facts with the input parameters replaced by `inputs`.
    pub fn instantiate_domain(&self, inputs: &[Term]) -> Vec<Fact> {
        self.domain
            .iter()
            .map(|fact| self.substitute(fact, inputs, &[]))
            .collect()
    }

    /// Certified facts with inputs and outputs replaced.
    pub fn instantiate_certified(&self, inputs: &[Term], outputs: &[Term]) -> Vec<Fact> {
        self.certified
            .iter()
            .map(|fact| self.substitute(fact, inputs, outputs))
            .collect()
    }

    fn substitute(&self, fact: &Fact, inputs: &[Term], outputs: &[Term]) -> Fact {
        fact.map_args(|arg| match arg {
            Term::Param(name) => self
                .inputs
                .iter()
                .position(|p| p == name)
                .and_then(|i| inputs.get(i))
                .or_else(|| {
                    self.outputs
                        .iter()
                        .position(|p| p == name)
                        .and_then(|i| outputs.get(i))
                })
                .cloned()
                .unwrap_or_else(|| arg.clone()),
            other => other.clone(),
        })
    }

    fn invalid(&self, message: impl Into<String>) -> PlanError {
        PlanError::InvalidStream {
            stream: self.name.clone(),
            message: message.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("stream name cannot be empty"));
        }
        let mut seen = HashSet::new();
        for param in self.inputs.iter().chain(&self.outputs) {
            if !param.starts_with('?') {
                return Err(self.invalid(format!("parameter {} must start with '?'", param)));
            }
            if !seen.insert(param.as_str()) {
                return Err(self.invalid(format!("parameter {} is declared twice", param)));
            }
        }

        let domain_params: HashSet<&str> = self.domain.iter().flat_map(|f| f.params()).collect();
        if let Some(input) = self.inputs.iter().find(|i| !domain_params.contains(i.as_str())) {
            return Err(self.invalid(format!("input {} does not appear in a domain fact", input)));
        }
        if let Some(param) = domain_params
            .iter()
            .find(|p| !self.inputs.iter().any(|i| i == *p))
        {
            return Err(self.invalid(format!("domain fact mentions non-input {}", param)));
        }
        if let Some(param) = self
            .certified
            .iter()
            .flat_map(|f| f.params())
            .find(|p| !seen.contains(p))
        {
            return Err(self.invalid(format!("certified fact mentions undeclared {}", param)));
        }

        match self.kind() {
            StreamKind::Test if !self.outputs.is_empty() => {
                Err(self.invalid("test streams cannot have outputs"))
            }
            StreamKind::Function if !self.outputs.is_empty() || !self.certified.is_empty() => {
                Err(self.invalid("function streams have no outputs or certified facts"))
            }
            _ => Ok(()),
        }
    }
}

/// Builder for creating Streams with a fluent API.
#[derive(Debug)]
pub struct StreamBuilder {
    name: String,
    procedure: Option<Procedure>,
    inputs: Vec<String>,
    domain: Vec<Fact>,
    outputs: Vec<String>,
    certified: Vec<Fact>,
    info: StreamInfo,
}

impl StreamBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            procedure: None,
            inputs: Vec::new(),
            domain: Vec::new(),
            outputs: Vec::new(),
            certified: Vec::new(),
            info: StreamInfo::default(),
        }
    }

    pub fn inputs(mut self, inputs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn outputs(mut self, outputs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    /// Add a domain fact.
    pub fn domain(mut self, fact: Fact) -> Self {
        self.domain.push(fact);
        self
    }

    /// Add a certified fact.
    pub fn certified(mut self, fact: Fact) -> Self {
        self.certified.push(fact);
        self
    }

    pub fn info(mut self, info: StreamInfo) -> Self {
        self.info = info;
        self
    }

    pub fn procedure(mut self, procedure: Procedure) -> Self {
        self.procedure = Some(procedure);
        self
    }

    /// Build the Stream.
    pub fn build(self) -> Result<Stream> {
        let procedure = self.procedure.ok_or_else(|| PlanError::InvalidStream {
            stream: self.name.clone(),
            message: "a procedure is required".to_string(),
        })?;
        Stream::new(
            self.name,
            procedure,
            self.inputs,
            self.domain,
            self.outputs,
            self.certified,
            self.info,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::{from_function, from_gen_fn, from_test};

    fn grasp_stream() -> Result<Stream> {
        Stream::builder("sample-grasp")
            .inputs(["?b"])
            .domain(Fact::new("block", ["?b"]))
            .outputs(["?g"])
            .certified(Fact::new("grasp", ["?b", "?g"]))
            .procedure(from_gen_fn(|_| vec![vec![Value::Int(0)]]))
            .build()
    }

    #[test]
    fn test_builder() {
        let stream = grasp_stream().unwrap();
        assert_eq!(stream.kind(), StreamKind::Generator);
        assert_eq!(stream.output_arity(), 1);
        assert_eq!(stream.info, StreamInfo::default());
    }

    #[test]
    fn test_instantiation() {
        let stream = grasp_stream().unwrap();
        let inputs = vec![Term::from("A")];
        let outputs = vec![Term::Object(streamplan_core::ObjectId(0))];
        assert_eq!(stream.instantiate_domain(&inputs), vec![Fact::new("block", ["A"])]);
        assert_eq!(
            stream.instantiate_certified(&inputs, &outputs),
            vec![Fact::new("grasp", [inputs[0].clone(), outputs[0].clone()])]
        );
    }

    #[test]
    fn test_missing_procedure() {
        assert!(Stream::builder("s").build().is_err());
    }

    #[test]
    fn test_input_must_appear_in_domain() {
        let result = Stream::builder("sample-grasp")
            .inputs(["?b"])
            .outputs(["?g"])
            .certified(Fact::new("grasp", ["?b", "?g"]))
            .procedure(from_gen_fn(|_| Vec::<Vec<Value>>::new()))
            .build();
        assert!(matches!(result, Err(PlanError::InvalidStream { .. })));
    }

    #[test]
    fn test_test_streams_have_no_outputs() {
        let result = Stream::builder("test-free")
            .inputs(["?q"])
            .domain(Fact::new("conf", ["?q"]))
            .outputs(["?x"])
            .procedure(from_test(|_| true))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_function_stream() {
        let stream = Stream::builder("distance")
            .inputs(["?q1", "?q2"])
            .domain(Fact::new("conf", ["?q1"]))
            .domain(Fact::new("conf", ["?q2"]))
            .procedure(from_function(|_| 1.0))
            .info(StreamInfo::default().with_opt_value(0.5))
            .build()
            .unwrap();
        assert!(stream.is_function());
        assert_eq!(stream.output_arity(), 1);
    }

    #[test]
    fn test_precomputed_lookup() {
        let info = StreamInfo::default().with_precomputed(
            vec![Value::from("A")],
            vec![vec![Value::Int(1)], vec![Value::Int(2)]],
        );
        let stream = Stream::builder("sample-grasp")
            .inputs(["?b"])
            .domain(Fact::new("block", ["?b"]))
            .outputs(["?g"])
            .certified(Fact::new("grasp", ["?b", "?g"]))
            .procedure(from_gen_fn(|_| Vec::<Vec<Value>>::new()))
            .info(info)
            .build()
            .unwrap();
        assert_eq!(stream.precomputed(&[Value::from("A")]).unwrap().len(), 2);
        assert!(stream.precomputed(&[Value::from("B")]).is_none());
    }

    #[test]
    fn test_info_deserializes_with_defaults() {
        let info: StreamInfo = serde_json::from_str(r#"{"eager": true}"#).unwrap();
        assert!(info.eager);
        assert_eq!(info.effort, 1.0);
    }
}
