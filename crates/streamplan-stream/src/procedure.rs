//! The external procedures wrapped by streams, and adapters that build them
//! from plain closures.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use streamplan_core::{Fact, Value};

/// Error raised by a misbehaving procedure.
pub type ProcedureError = Box<dyn std::error::Error + Send + Sync>;

/// Result type of procedure calls.
pub type ProcedureResult<T> = std::result::Result<T, ProcedureError>;

/// One output tuple of a generator, plus any wild facts discovered with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamOutput {
    /// Values for the stream's output parameters, in order.
    pub values: Vec<Value>,

    /// Extra facts beyond the certified ones.
    #[serde(default)]
    pub facts: Vec<Fact>,
}

impl StreamOutput {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            facts: Vec::new(),
        }
    }

    pub fn with_facts(values: Vec<Value>, facts: Vec<Fact>) -> Self {
        Self { values, facts }
    }
}

/// A lazy, non-restartable sequence of output batches.
pub trait OutputGenerator: Send {
    /// The next batch of outputs, or `None` once the sequence is over.
    fn next_batch(&mut self) -> ProcedureResult<Option<Vec<StreamOutput>>>;
}

pub type GeneratorFn =
    Arc<dyn Fn(&[Value]) -> ProcedureResult<Box<dyn OutputGenerator>> + Send + Sync>;
pub type TestFn = Arc<dyn Fn(&[Value]) -> ProcedureResult<bool> + Send + Sync>;
pub type FunctionFn = Arc<dyn Fn(&[Value]) -> ProcedureResult<f64> + Send + Sync>;

/// The callable behind a stream.
#[derive(Clone)]
pub enum Procedure {
    /// Opens a generator of output tuples for an input tuple.
    Generator(GeneratorFn),
    /// Decides whether the certified facts hold for an input tuple.
    Test(TestFn),
    /// Computes a deterministic numeric cost term.
    Function(FunctionFn),
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Generator(_) => write!(f, "Procedure::Generator"),
            Procedure::Test(_) => write!(f, "Procedure::Test"),
            Procedure::Function(_) => write!(f, "Procedure::Function"),
        }
    }
}

struct IterGenerator<I> {
    iter: I,
}

impl<I> OutputGenerator for IterGenerator<I>
where
    I: Iterator<Item = ProcedureResult<StreamOutput>> + Send,
{
    fn next_batch(&mut self) -> ProcedureResult<Option<Vec<StreamOutput>>> {
        match self.iter.next() {
            Some(output) => Ok(Some(vec![output?])),
            None => Ok(None),
        }
    }
}

struct OnceGenerator {
    batch: Option<Vec<StreamOutput>>,
}

impl OutputGenerator for OnceGenerator {
    fn next_batch(&mut self) -> ProcedureResult<Option<Vec<StreamOutput>>> {
        Ok(self.batch.take())
    }
}

/// Generator whose procedure may fail, both when opened and per output.
pub fn from_fallible_gen_fn<F, I>(f: F) -> Procedure
where
    F: Fn(&[Value]) -> ProcedureResult<I> + Send + Sync + 'static,
    I: IntoIterator<Item = ProcedureResult<StreamOutput>>,
    I::IntoIter: Send + 'static,
{
    Procedure::Generator(Arc::new(
        move |inputs: &[Value]| -> ProcedureResult<Box<dyn OutputGenerator>> {
            let iter = f(inputs)?.into_iter();
            Ok(Box::new(IterGenerator { iter }))
        },
    ))
}

/// Generator yielding one output tuple per call.
pub fn from_gen_fn<F, I>(f: F) -> Procedure
where
    F: Fn(&[Value]) -> I + Send + Sync + 'static,
    I: IntoIterator<Item = Vec<Value>>,
    I::IntoIter: Send + 'static,
{
    from_fallible_gen_fn(move |inputs: &[Value]| {
        Ok(f(inputs)
            .into_iter()
            .map(|values| -> ProcedureResult<StreamOutput> { Ok(StreamOutput::new(values)) }))
    })
}

/// Generator whose outputs may carry wild facts.
pub fn from_wild_gen_fn<F, I>(f: F) -> Procedure
where
    F: Fn(&[Value]) -> I + Send + Sync + 'static,
    I: IntoIterator<Item = StreamOutput>,
    I::IntoIter: Send + 'static,
{
    from_fallible_gen_fn(move |inputs: &[Value]| Ok(f(inputs).into_iter().map(Ok::<StreamOutput, ProcedureError>)))
}

/// Generator producing every output tuple in a single call.
pub fn from_list_fn<F>(f: F) -> Procedure
where
    F: Fn(&[Value]) -> Vec<Vec<Value>> + Send + Sync + 'static,
{
    Procedure::Generator(Arc::new(
        move |inputs: &[Value]| -> ProcedureResult<Box<dyn OutputGenerator>> {
            let batch = f(inputs).into_iter().map(StreamOutput::new).collect();
            Ok(Box::new(OnceGenerator { batch: Some(batch) }))
        },
    ))
}

/// Generator producing at most one output tuple.
pub fn from_fn<F>(f: F) -> Procedure
where
    F: Fn(&[Value]) -> Option<Vec<Value>> + Send + Sync + 'static,
{
    from_list_fn(move |inputs: &[Value]| f(inputs).into_iter().collect())
}

/// Boolean test.
pub fn from_test<F>(f: F) -> Procedure
where
    F: Fn(&[Value]) -> bool + Send + Sync + 'static,
{
    Procedure::Test(Arc::new(move |inputs: &[Value]| -> ProcedureResult<bool> {
        Ok(f(inputs))
    }))
}

/// Boolean test that always passes.
pub fn universe_test() -> Procedure {
    from_test(|_| true)
}

/// Deterministic cost function.
pub fn from_function<F>(f: F) -> Procedure
where
    F: Fn(&[Value]) -> f64 + Send + Sync + 'static,
{
    Procedure::Function(Arc::new(move |inputs: &[Value]| -> ProcedureResult<f64> {
        Ok(f(inputs))
    }))
}
