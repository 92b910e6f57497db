//! Optimistic instantiation of streams for the focused algorithm.

use std::collections::{HashMap, HashSet};

use streamplan_core::{match_all, Assignment, Fact, FactIndex, Result, ResultId, StreamId, Term};
use streamplan_state::EvaluationStore;
use streamplan_stream::StreamSession;
use tracing::debug;

/// Optimistic results reachable from the current evaluations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instantiation {
    /// Results in the order they were created.
    pub results: Vec<ResultId>,
    /// True if the level limit cut off further results.
    pub truncated: bool,
}

/// Instances of `stream` whose domain facts match `facts`.
fn matching_inputs(session: &StreamSession, stream: StreamId, facts: &FactIndex<'_>) -> Vec<Vec<Term>> {
    let stream = session.stream(stream);
    match_all(&stream.domain, facts, &Assignment::new())
        .into_iter()
        .filter_map(|assignment| {
            stream
                .inputs
                .iter()
                .map(|p| assignment.get(p).cloned())
                .collect::<Option<Vec<Term>>>()
        })
        .collect()
}

/// Build optimistic results level by level, up to `levels` levels.
///
/// Level-0 facts are the real evaluations. Each level instantiates every
/// stream whose domain holds over the facts so far and adds the certified
/// facts of its optimistic result. Concrete instances that are already
/// exhausted are skipped. Results whose accumulated effort exceeds
/// `max_effort` are pruned.
pub fn instantiate_optimistic(
    session: &mut StreamSession,
    evaluations: &EvaluationStore,
    levels: usize,
    max_effort: Option<f64>,
) -> Instantiation {
    let max_effort = max_effort.unwrap_or(f64::INFINITY);
    let mut effort: HashMap<Fact, f64> = evaluations.facts().map(|f| (f.clone(), 0.0)).collect();
    let mut visited: HashSet<(StreamId, Vec<Term>)> = HashSet::new();
    let mut instantiation = Instantiation::default();

    for level in 0.. {
        let candidates: Vec<(StreamId, Vec<Term>)> = {
            let index = FactIndex::new(effort.keys());
            let streams: &StreamSession = session;
            (0..streams.streams().len())
                .map(StreamId)
                .filter(|&stream| !streams.stream(stream).is_function())
                .flat_map(|stream| {
                    matching_inputs(streams, stream, &index)
                        .into_iter()
                        .map(move |inputs| (stream, inputs))
                })
                .filter(|candidate| !visited.contains(candidate))
                .collect()
        };
        if candidates.is_empty() {
            break;
        }
        if level == levels {
            instantiation.truncated = true;
            break;
        }

        let mut new_facts: Vec<(Fact, f64)> = Vec::new();
        for (stream, inputs) in candidates {
            if !visited.insert((stream, inputs.clone())) {
                continue;
            }
            let instance = session.get_instance(stream, inputs);
            let inst = session.instance(instance);
            if inst.is_concrete() && inst.is_exhausted() {
                continue;
            }
            let cost = session
                .instance_domain(instance)
                .iter()
                .map(|f| effort.get(f).copied().unwrap_or(0.0))
                .fold(0.0, f64::max)
                + session.stream(stream).info.effort;
            if cost > max_effort {
                continue;
            }
            let result = session.next_optimistic(instance);
            instantiation.results.push(result);
            for fact in &session.result(result).certified {
                new_facts.push((fact.clone(), cost));
            }
        }
        for (fact, cost) in new_facts {
            let entry = effort.entry(fact).or_insert(f64::INFINITY);
            *entry = entry.min(cost);
        }
    }
    debug!(
        results = instantiation.results.len(),
        truncated = instantiation.truncated,
        "Optimistic instantiation"
    );
    instantiation
}

/// Sample every ready, non-exhausted instance of `streams` once, over a
/// snapshot of the evaluations per stream. Returns the number of calls made.
pub fn sample_ready(
    session: &mut StreamSession,
    evaluations: &mut EvaluationStore,
    streams: &[StreamId],
) -> Result<usize> {
    let mut calls = 0;
    for &stream in streams {
        let matches = {
            let index = evaluations.fact_index();
            matching_inputs(session, stream, &index)
        };
        for inputs in matches {
            let instance = session.get_instance(stream, inputs);
            if session.instance(instance).is_exhausted() || !session.is_ready(instance, evaluations) {
                continue;
            }
            session.sample(instance, evaluations)?;
            calls += 1;
        }
    }
    Ok(calls)
}

/// Sample the eager streams once.
pub fn sample_eager(session: &mut StreamSession, evaluations: &mut EvaluationStore) -> Result<usize> {
    let eager: Vec<StreamId> = (0..session.streams().len())
        .map(StreamId)
        .filter(|&s| session.stream(s).info.eager)
        .collect();
    sample_ready(session, evaluations, &eager)
}
