//! Memoized stream instances: one per (stream, input tuple), holding the
//! sampling history that every skeleton reusing the instance shares.

use streamplan_core::{InstanceId, PlanError, Result, ResultId, StreamId, Term, Value};
use tracing::debug;

use crate::procedure::{OutputGenerator, Procedure, ProcedureError, StreamOutput};
use crate::stream::Stream;

/// A stream applied to a specific input tuple.
pub struct StreamInstance {
    pub id: InstanceId,
    pub stream: StreamId,
    pub inputs: Vec<Term>,
    generator: Option<Box<dyn OutputGenerator>>,
    history: Vec<Vec<ResultId>>,
    exhausted: bool,
    num_calls: usize,
    opt_result: Option<ResultId>,
}

impl std::fmt::Debug for StreamInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamInstance")
            .field("id", &self.id)
            .field("stream", &self.stream)
            .field("inputs", &self.inputs)
            .field("history", &self.history)
            .field("exhausted", &self.exhausted)
            .field("num_calls", &self.num_calls)
            .finish()
    }
}

impl StreamInstance {
    pub(crate) fn new(id: InstanceId, stream: StreamId, inputs: Vec<Term>) -> Self {
        Self {
            id,
            stream,
            inputs,
            generator: None,
            history: Vec::new(),
            exhausted: false,
            num_calls: 0,
            opt_result: None,
        }
    }

    /// True when every input is a concrete value.
    pub fn is_concrete(&self) -> bool {
        self.inputs.iter().all(|t| t.as_value().is_some())
    }

    /// The concrete input tuple.
    pub fn input_values(&self) -> Result<Vec<Value>> {
        self.inputs
            .iter()
            .map(|term| match term {
                Term::Value(value) => Ok(value.clone()),
                Term::Object(object) => Err(PlanError::UnboundObject { object: *object }),
                Term::Param(name) => Err(PlanError::InvalidFact {
                    message: format!("stream input {} is a free parameter", name),
                }),
            })
            .collect()
    }

    /// Once true, stays true.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn num_calls(&self) -> usize {
        self.num_calls
    }

    /// Batches of real results, one per procedure call.
    pub fn history(&self) -> &[Vec<ResultId>] {
        &self.history
    }

    /// The batch produced by the `index`-th call, if it was made.
    pub fn batch(&self, index: usize) -> Option<&[ResultId]> {
        self.history.get(index).map(Vec::as_slice)
    }

    pub fn opt_result(&self) -> Option<ResultId> {
        self.opt_result
    }

    pub(crate) fn set_opt_result(&mut self, result: ResultId) {
        self.opt_result = Some(result);
    }

    pub(crate) fn record_batch(&mut self, batch: Vec<ResultId>) {
        self.history.push(batch);
    }

    /// Invoke the procedure once. Returns no outputs after exhaustion.
    pub(crate) fn next(&mut self, stream: &Stream) -> Result<Vec<StreamOutput>> {
        if self.exhausted {
            return Ok(Vec::new());
        }
        let inputs = self.input_values()?;
        self.num_calls += 1;

        if let Some(outputs) = stream.precomputed(&inputs) {
            self.exhausted = true;
            let batch: Vec<StreamOutput> = outputs.iter().cloned().map(StreamOutput::new).collect();
            return self.check_arity(stream, batch);
        }

        let failed = |err: ProcedureError| PlanError::stream_failed(&stream.name, err);
        let batch = match stream.procedure() {
            Procedure::Test(test) => {
                self.exhausted = true;
                if test(&inputs).map_err(failed)? {
                    vec![StreamOutput::new(Vec::new())]
                } else {
                    Vec::new()
                }
            }
            Procedure::Function(function) => {
                self.exhausted = true;
                let value = function(&inputs).map_err(failed)?;
                vec![StreamOutput::new(vec![Value::Float(value)])]
            }
            Procedure::Generator(open) => {
                if self.generator.is_none() {
                    self.generator = Some(open(&inputs).map_err(failed)?);
                }
                let next = match self.generator.as_mut() {
                    Some(generator) => generator.next_batch().map_err(failed)?,
                    None => None,
                };
                match next {
                    Some(batch) => batch,
                    None => {
                        debug!(stream = %stream.name, calls = self.num_calls, "Stream instance exhausted");
                        self.exhausted = true;
                        self.generator = None;
                        Vec::new()
                    }
                }
            }
        };
        self.check_arity(stream, batch)
    }

    fn check_arity(&self, stream: &Stream, batch: Vec<StreamOutput>) -> Result<Vec<StreamOutput>> {
        let arity = stream.output_arity();
        for output in &batch {
            if output.values.len() != arity {
                return Err(PlanError::stream_failed(
                    &stream.name,
                    format!("expected {} output values, got {}", arity, output.values.len()),
                ));
            }
            if let Some(fact) = output.facts.iter().find(|f| !f.is_concrete()) {
                return Err(PlanError::stream_failed(
                    &stream.name,
                    format!("wild fact {} is not concrete", fact),
                ));
            }
        }
        Ok(batch)
    }
}
