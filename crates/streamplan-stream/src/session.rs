//! The stream session: memo tables for instances and results, the optimistic
//! object arena, and the only path through which procedures are invoked.

use std::collections::HashMap;

use streamplan_core::{
    Fact, InstanceId, ObjectTable, PlanError, Result, ResultId, StreamId, Term, Value,
};
use streamplan_state::{EvaluationSource, EvaluationStore};
use tracing::debug;
use uuid::Uuid;

use crate::instance::StreamInstance;
use crate::result::StreamResult;
use crate::statistics::StreamStatistics;
use crate::stream::Stream;

/// Owns every stream, instance and result created while solving one problem.
#[derive(Debug)]
pub struct StreamSession {
    id: Uuid,
    streams: Vec<Stream>,
    by_name: HashMap<String, StreamId>,
    instances: Vec<StreamInstance>,
    instance_index: HashMap<(StreamId, Vec<Term>), InstanceId>,
    results: Vec<StreamResult>,
    optimistic_index: HashMap<(InstanceId, Vec<Term>), ResultId>,
    objects: ObjectTable,
    statistics: StreamStatistics,
}

impl StreamSession {
    /// Create a session. Stream names must be unique.
    pub fn new(streams: Vec<Stream>) -> Result<Self> {
        let mut by_name = HashMap::new();
        for (i, stream) in streams.iter().enumerate() {
            if by_name.insert(stream.name.clone(), StreamId(i)).is_some() {
                return Err(PlanError::InvalidStream {
                    stream: stream.name.clone(),
                    message: "duplicate stream name".to_string(),
                });
            }
        }
        Ok(Self {
            id: Uuid::new_v4(),
            streams,
            by_name,
            instances: Vec::new(),
            instance_index: HashMap::new(),
            results: Vec::new(),
            optimistic_index: HashMap::new(),
            objects: ObjectTable::new(),
            statistics: StreamStatistics::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn stream(&self, id: StreamId) -> &Stream {
        &self.streams[id.0]
    }

    pub fn stream_id(&self, name: &str) -> Option<StreamId> {
        self.by_name.get(name).copied()
    }

    pub fn instance(&self, id: InstanceId) -> &StreamInstance {
        &self.instances[id.0]
    }

    pub fn instances(&self) -> &[StreamInstance] {
        &self.instances
    }

    pub fn result(&self, id: ResultId) -> &StreamResult {
        &self.results[id.0]
    }

    pub fn results(&self) -> &[StreamResult] {
        &self.results
    }

    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut ObjectTable {
        &mut self.objects
    }

    pub fn statistics(&self) -> &StreamStatistics {
        &self.statistics
    }

    /// The memoized instance of `stream` for an input tuple.
    pub fn get_instance(&mut self, stream: StreamId, inputs: Vec<Term>) -> InstanceId {
        if let Some(&id) = self.instance_index.get(&(stream, inputs.clone())) {
            return id;
        }
        let id = InstanceId(self.instances.len());
        self.instances
            .push(StreamInstance::new(id, stream, inputs.clone()));
        self.instance_index.insert((stream, inputs), id);
        id
    }

    /// The instance's optimistic result: fresh optimistic objects for every
    /// output, created once and reused afterwards.
    pub fn next_optimistic(&mut self, instance: InstanceId) -> ResultId {
        if let Some(result) = self.instances[instance.0].opt_result() {
            return result;
        }
        let num_outputs = self.stream(self.instances[instance.0].stream).outputs.len();
        let outputs: Vec<Term> = (0..num_outputs)
            .map(|slot| Term::Object(self.objects.create(instance, slot)))
            .collect();
        let result = self.push_result(instance, outputs, Vec::new(), true, None);
        self.optimistic_index
            .insert((instance, self.results[result.0].outputs.clone()), result);
        self.instances[instance.0].set_opt_result(result);
        result
    }

    /// An optimistic result whose outputs are supplied by the caller.
    pub fn optimistic_result(&mut self, instance: InstanceId, outputs: Vec<Term>) -> Result<ResultId> {
        let stream = self.stream(self.instances[instance.0].stream);
        if outputs.len() != stream.outputs.len() {
            return Err(PlanError::InvalidStream {
                stream: stream.name.clone(),
                message: format!(
                    "expected {} outputs, got {}",
                    stream.outputs.len(),
                    outputs.len()
                ),
            });
        }
        if let Some(&result) = self.optimistic_index.get(&(instance, outputs.clone())) {
            return Ok(result);
        }
        let result = self.push_result(instance, outputs.clone(), Vec::new(), true, None);
        self.optimistic_index.insert((instance, outputs), result);
        Ok(result)
    }

    /// Domain facts of an instance.
    pub fn instance_domain(&self, instance: InstanceId) -> Vec<Fact> {
        let inst = &self.instances[instance.0];
        self.stream(inst.stream).instantiate_domain(&inst.inputs)
    }

    /// True when the instance is concrete and its domain facts all hold.
    pub fn is_ready(&self, instance: InstanceId, evaluations: &EvaluationStore) -> bool {
        self.instances[instance.0].is_concrete()
            && self
                .instance_domain(instance)
                .iter()
                .all(|fact| evaluations.contains(fact))
    }

    /// Invoke the instance's procedure once and record the resulting batch.
    ///
    /// Certified, wild and function facts of the new results are added to
    /// `evaluations`. Returns the new real results, empty when the call
    /// produced nothing or the instance is exhausted.
    pub fn sample(
        &mut self,
        instance: InstanceId,
        evaluations: &mut EvaluationStore,
    ) -> Result<Vec<ResultId>> {
        if !self.is_ready(instance, evaluations) {
            let inst = &self.instances[instance.0];
            return Err(PlanError::Internal(format!(
                "stream {} sampled before its domain facts hold for {:?}",
                self.stream(inst.stream).name,
                inst.inputs
            )));
        }
        if self.instances[instance.0].is_exhausted() {
            return Ok(Vec::new());
        }

        let stream_id = self.instances[instance.0].stream;
        let stream = &self.streams[stream_id.0];
        let outputs = self.instances[instance.0].next(stream)?;
        let is_function = stream.is_function();
        let name = stream.name.clone();
        self.statistics.record(&name, outputs.len());
        debug!(
            stream = %name,
            instance = instance.0,
            outputs = outputs.len(),
            "Sampled stream instance"
        );

        let mut batch = Vec::with_capacity(outputs.len());
        for output in outputs {
            let (terms, value) = if is_function {
                (Vec::new(), output.values.first().and_then(Value::as_f64))
            } else {
                (output.values.into_iter().map(Term::Value).collect(), None)
            };
            let id = self.push_result(instance, terms, output.facts, false, value);
            let result = &self.results[id.0];
            for fact in &result.certified {
                evaluations.add(fact.clone(), EvaluationSource::Certified { result: id })?;
            }
            for fact in &result.wild {
                evaluations.add(fact.clone(), EvaluationSource::Wild { result: id })?;
            }
            if let Some(fact) = result.function_fact() {
                evaluations.add(fact, EvaluationSource::Certified { result: id })?;
            }
            batch.push(id);
        }
        self.instances[instance.0].record_batch(batch.clone());
        Ok(batch)
    }

    fn push_result(
        &mut self,
        instance: InstanceId,
        outputs: Vec<Term>,
        wild: Vec<Fact>,
        optimistic: bool,
        value: Option<f64>,
    ) -> ResultId {
        let inst = &self.instances[instance.0];
        let stream = &self.streams[inst.stream.0];
        let value = match (stream.is_function(), optimistic) {
            (true, true) => Some(stream.info.opt_value),
            _ => value,
        };
        let id = ResultId(self.results.len());
        self.results.push(StreamResult {
            id,
            instance,
            stream: inst.stream,
            stream_name: stream.name.clone(),
            kind: stream.kind(),
            inputs: inst.inputs.clone(),
            domain: stream.instantiate_domain(&inst.inputs),
            certified: stream.instantiate_certified(&inst.inputs, &outputs),
            outputs,
            wild,
            optimistic,
            value,
            effort: stream.info.effort,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::{from_function, from_gen_fn, from_wild_gen_fn, StreamOutput};
    use crate::stream::StreamInfo;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn pose_stream(calls: Arc<AtomicUsize>) -> Stream {
        Stream::builder("sample-pose")
            .inputs(["?b"])
            .domain(Fact::new("block", ["?b"]))
            .outputs(["?p"])
            .certified(Fact::new("pose", ["?b", "?p"]))
            .procedure(from_gen_fn(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                vec![vec![Value::Int(1)], vec![Value::Int(2)]]
            }))
            .build()
            .unwrap()
    }

    fn cost_stream() -> Stream {
        Stream::builder("dist")
            .inputs(["?p"])
            .domain(Fact::new("pose", ["A", "?p"]))
            .procedure(from_function(|v| v[0].as_f64().unwrap_or(0.0) * 10.0))
            .info(StreamInfo::default().with_opt_value(1.0))
            .build()
            .unwrap()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = StreamSession::new(vec![pose_stream(calls.clone()), pose_stream(calls)]);
        assert!(matches!(result, Err(PlanError::InvalidStream { .. })));
    }

    #[test]
    fn test_instances_are_memoized() {
        let mut session = StreamSession::new(vec![pose_stream(Arc::default())]).unwrap();
        let a = session.get_instance(StreamId(0), vec![Term::from("A")]);
        let b = session.get_instance(StreamId(0), vec![Term::from("A")]);
        let c = session.get_instance(StreamId(0), vec![Term::from("B")]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_next_optimistic_is_memoized() {
        let mut session = StreamSession::new(vec![pose_stream(Arc::default())]).unwrap();
        let inst = session.get_instance(StreamId(0), vec![Term::from("A")]);
        let r1 = session.next_optimistic(inst);
        let r2 = session.next_optimistic(inst);
        assert_eq!(r1, r2);
        let result = session.result(r1);
        assert!(result.optimistic);
        assert_eq!(result.output_objects().count(), 1);
        assert_eq!(session.objects().len(), 1);
    }

    #[test]
    fn test_sample_requires_ready_instance() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut session = StreamSession::new(vec![pose_stream(calls.clone())]).unwrap();
        let mut evaluations = EvaluationStore::new();
        let inst = session.get_instance(StreamId(0), vec![Term::from("A")]);
        assert!(!session.is_ready(inst, &evaluations));
        assert!(session.sample(inst, &mut evaluations).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sample_records_history_and_evaluations() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut session = StreamSession::new(vec![pose_stream(calls.clone())]).unwrap();
        let mut evaluations = EvaluationStore::from_init([Fact::new("block", ["A"])]).unwrap();
        let inst = session.get_instance(StreamId(0), vec![Term::from("A")]);
        assert!(session.is_ready(inst, &evaluations));

        let first = session.sample(inst, &mut evaluations).unwrap();
        assert_eq!(first.len(), 1);
        assert!(evaluations.contains(&Fact::new("pose", [Term::from("A"), Term::from(1i64)])));
        session.sample(inst, &mut evaluations).unwrap();
        assert!(session.sample(inst, &mut evaluations).unwrap().is_empty());
        assert!(session.instance(inst).is_exhausted());
        assert_eq!(session.instance(inst).history().len(), 3);
        // Generator is opened once.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.statistics().get("sample-pose").calls, 3);
    }

    #[test]
    fn test_wild_facts_are_tagged() {
        let stream = Stream::builder("sample-pose")
            .inputs(["?b"])
            .domain(Fact::new("block", ["?b"]))
            .outputs(["?p"])
            .certified(Fact::new("pose", ["?b", "?p"]))
            .procedure(from_wild_gen_fn(|inputs: &[Value]| {
                vec![StreamOutput::with_facts(
                    vec![Value::Int(1)],
                    vec![
                        Fact::new("supported", [Term::Value(inputs[0].clone()), Term::from("table")]),
                        Fact::new("block", ["A"]),
                    ],
                )]
            }))
            .build()
            .unwrap();
        let mut session = StreamSession::new(vec![stream]).unwrap();
        let mut evaluations = EvaluationStore::from_init([Fact::new("block", ["A"])]).unwrap();
        let inst = session.get_instance(StreamId(0), vec![Term::from("A")]);

        let results = session.sample(inst, &mut evaluations).unwrap();
        assert_eq!(results.len(), 1);
        let id = results[0];
        assert_eq!(session.result(id).wild.len(), 2);

        let wild = Fact::new("supported", ["A", "table"]);
        assert_eq!(
            evaluations.get(&wild).map(|e| e.source),
            Some(EvaluationSource::Wild { result: id })
        );
        let certified = Fact::new("pose", [Term::from("A"), Term::from(1i64)]);
        assert_eq!(
            evaluations.get(&certified).map(|e| e.source),
            Some(EvaluationSource::Certified { result: id })
        );
        // Known facts keep their first provenance.
        assert_eq!(
            evaluations.get(&Fact::new("block", ["A"])).map(|e| e.source),
            Some(EvaluationSource::Initial)
        );
    }

    #[test]
    fn test_function_results() {
        let mut session = StreamSession::new(vec![cost_stream()]).unwrap();
        let mut evaluations =
            EvaluationStore::from_init([Fact::new("pose", [Term::from("A"), Term::from(2i64)])]).unwrap();
        let inst = session.get_instance(StreamId(0), vec![Term::from(2i64)]);

        let opt = session.next_optimistic(inst);
        assert_eq!(session.result(opt).value, Some(1.0));

        let real = session.sample(inst, &mut evaluations).unwrap();
        assert_eq!(session.result(real[0]).value, Some(20.0));
        assert!(evaluations.contains(&Fact::new("dist", [Term::from(2i64), Term::from(20.0)])));
    }

    #[test]
    fn test_optimistic_result_checks_arity() {
        let mut session = StreamSession::new(vec![pose_stream(Arc::default())]).unwrap();
        let inst = session.get_instance(StreamId(0), vec![Term::from("A")]);
        assert!(session.optimistic_result(inst, Vec::new()).is_err());
        let object = session.objects_mut().create_parameter("?p");
        let r1 = session.optimistic_result(inst, vec![Term::Object(object)]).unwrap();
        let r2 = session.optimistic_result(inst, vec![Term::Object(object)]).unwrap();
        assert_eq!(r1, r2);
    }
}
