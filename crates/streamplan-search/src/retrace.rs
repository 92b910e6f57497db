//! Backward retracing from goal facts to the stream results that could
//! certify them.

use std::collections::HashSet;

use streamplan_core::{match_fact, Assignment, Fact, InstanceId, ObjectId, Result, ResultId, StreamId, Term};
use streamplan_state::EvaluationStore;
use streamplan_stream::StreamSession;

/// Optimistic results able to certify `goal_facts`, followed backward
/// through every domain fact missing from `evaluations`.
///
/// A certified template matches a fact when predicate and arity agree and
/// every input is mapped. Mapped outputs must be objects in `free`; unmapped
/// outputs receive fresh optimistic objects.
pub fn retrace_results(
    session: &mut StreamSession,
    evaluations: &EvaluationStore,
    goal_facts: &[Fact],
    free: &HashSet<ObjectId>,
) -> Result<Vec<ResultId>> {
    let mut visited: HashSet<Fact> = HashSet::new();
    let mut results: Vec<ResultId> = Vec::new();
    let mut pending: Vec<Fact> = goal_facts.iter().rev().cloned().collect();

    while let Some(fact) = pending.pop() {
        if evaluations.contains(&fact) || !visited.insert(fact.clone()) {
            continue;
        }
        for (instance, outputs) in certifying_instances(session, &fact, free) {
            let result = session.optimistic_result(instance, outputs)?;
            if results.contains(&result) {
                continue;
            }
            results.push(result);
            pending.extend(session.result(result).domain.iter().rev().cloned());
        }
    }
    Ok(results)
}

fn certifying_instances(
    session: &mut StreamSession,
    fact: &Fact,
    free: &HashSet<ObjectId>,
) -> Vec<(InstanceId, Vec<Term>)> {
    let mut found = Vec::new();
    for index in 0..session.streams().len() {
        let stream_id = StreamId(index);
        let matches: Vec<(Vec<Term>, Vec<Option<Term>>)> = {
            let stream = session.stream(stream_id);
            if stream.is_function() {
                continue;
            }
            stream
                .certified
                .iter()
                .filter_map(|template| {
                    let mapping = match_fact(template, fact, &Assignment::new())?;
                    let inputs = stream
                        .inputs
                        .iter()
                        .map(|p| mapping.get(p).cloned())
                        .collect::<Option<Vec<_>>>()?;
                    let outputs: Vec<Option<Term>> =
                        stream.outputs.iter().map(|p| mapping.get(p).cloned()).collect();
                    let bindable = outputs
                        .iter()
                        .flatten()
                        .all(|term| term.as_object().map_or(false, |o| free.contains(&o)));
                    bindable.then_some((inputs, outputs))
                })
                .collect()
        };

        for (inputs, outputs) in matches {
            let instance = session.get_instance(stream_id, inputs);
            let outputs: Vec<Term> = outputs
                .into_iter()
                .enumerate()
                .map(|(slot, term)| {
                    term.unwrap_or_else(|| Term::Object(session.objects_mut().create(instance, slot)))
                })
                .collect();
            found.push((instance, outputs));
        }
    }
    found
}
