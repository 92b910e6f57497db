//! Disable axioms: derived facts that stop the planner from proposing a
//! cluster of stream results that already failed to sample.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use streamplan_core::Fact;
use streamplan_planner::{Axiom, Literal};
use streamplan_stream::StreamResult;

use crate::reorder::partial_orders;

/// Derived predicate that no plan may make true.
pub const UNSATISFIABLE: &str = "_unsatisfiable";

/// The goal literal every stream-aware planning problem carries.
pub fn satisfiable_goal() -> Literal {
    Literal::neg(Fact::atom(UNSATISFIABLE))
}

/// Chooses which results of a failed binding are blocked together.
///
/// `results` holds the realized prefix of a skeleton followed by the result
/// that failed (always last). Each returned cluster is a list of indices into
/// `results` and becomes one axiom.
pub trait ClusterPolicy: Send + Sync + fmt::Debug {
    fn clusters(&self, results: &[&StreamResult]) -> Vec<Vec<usize>>;
}

/// The failed result and everything it transitively depends on.
#[derive(Debug, Clone, Copy, Default)]
pub struct CausalCluster;

/// The connected component of the failed result, ignoring edge direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectedCluster;

/// Every result up to the failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeSkeleton;

fn grow(results: &[&StreamResult], directed: bool) -> Vec<Vec<usize>> {
    let Some(failed) = results.len().checked_sub(1) else {
        return Vec::new();
    };
    let orders = partial_orders(results);
    let mut cluster = BTreeSet::from([failed]);
    let mut frontier = VecDeque::from([failed]);
    while let Some(current) = frontier.pop_front() {
        for &(before, after) in &orders {
            let neighbor = if after == current {
                Some(before)
            } else if !directed && before == current {
                Some(after)
            } else {
                None
            };
            if let Some(n) = neighbor {
                if cluster.insert(n) {
                    frontier.push_back(n);
                }
            }
        }
    }
    vec![cluster.into_iter().collect()]
}

impl ClusterPolicy for CausalCluster {
    fn clusters(&self, results: &[&StreamResult]) -> Vec<Vec<usize>> {
        grow(results, true)
    }
}

impl ClusterPolicy for ConnectedCluster {
    fn clusters(&self, results: &[&StreamResult]) -> Vec<Vec<usize>> {
        grow(results, false)
    }
}

impl ClusterPolicy for WholeSkeleton {
    fn clusters(&self, results: &[&StreamResult]) -> Vec<Vec<usize>> {
        if results.is_empty() {
            Vec::new()
        } else {
            vec![(0..results.len()).collect()]
        }
    }
}

/// Axiom deriving [`UNSATISFIABLE`] whenever every result of `cluster` is
/// part of the plan.
pub fn disable_axiom(cluster: &[&StreamResult]) -> Axiom {
    Axiom::new(
        Vec::new(),
        cluster.iter().map(|r| r.stream_fact()).collect(),
        Fact::atom(UNSATISFIABLE),
    )
}
