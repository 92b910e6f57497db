//! The skeleton queue: incremental sampling of partially bound plans.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use streamplan_core::{PlanError, Result, ResultId, Term};
use streamplan_planner::Axiom;
use streamplan_stream::{StreamResult, StreamSession};
use tracing::{debug, warn};

use crate::context::SolveContext;
use crate::disable::{disable_axiom, ClusterPolicy};
use crate::skeleton::{Binding, Skeleton, SkeletonCandidate, SkeletonState};

type Priority = (usize, usize, usize, usize);

#[derive(Debug)]
struct QueueEntry {
    priority: Priority,
    binding: Binding,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority)
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of bindings over every admitted skeleton.
///
/// Bindings are popped lowest complexity first, then by fewest sampling
/// attempts on their skeleton, then by skeleton and binding age.
#[derive(Debug, Default)]
pub struct SkeletonQueue {
    skeletons: Vec<Skeleton>,
    heap: BinaryHeap<Reverse<QueueEntry>>,
    deferred: Vec<Binding>,
}

impl SkeletonQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every skeleton ever admitted, in admission order.
    pub fn skeletons(&self) -> &[Skeleton] {
        &self.skeletons
    }

    pub fn skeleton(&self, id: usize) -> Option<&Skeleton> {
        self.skeletons.get(id)
    }

    /// Skeletons still being sampled.
    pub fn num_live(&self) -> usize {
        self.skeletons.iter().filter(|s| s.is_live()).count()
    }

    /// Queued plus deferred bindings.
    pub fn len(&self) -> usize {
        self.heap.len() + self.deferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bindings held back by the complexity limit of the last `process`.
    pub fn num_deferred(&self) -> usize {
        self.deferred.len()
    }

    /// True if a skeleton with the same stream and action plan was admitted.
    pub fn contains(&self, candidate: &SkeletonCandidate) -> bool {
        self.skeletons.iter().any(|s| s.same_plan(candidate))
    }

    /// Admit a candidate unless it is redundant. Returns its skeleton id.
    pub fn admit(&mut self, ctx: &mut SolveContext, candidate: SkeletonCandidate) -> Result<Option<usize>> {
        if self.contains(&candidate) {
            debug!(
                results = candidate.stream_plan.len(),
                actions = candidate.action_plan.len(),
                "Skipping redundant skeleton"
            );
            return Ok(None);
        }
        let id = self.skeletons.len();
        let mut skeleton = Skeleton::new(id, candidate);
        let root = skeleton.root_binding();
        debug!(
            skeleton = id,
            results = skeleton.stream_plan.len(),
            actions = skeleton.action_plan.len(),
            cost = skeleton.cost,
            "Admitted skeleton"
        );
        self.skeletons.push(skeleton);
        if root.is_bound(&self.skeletons[id]) {
            self.complete(ctx, root)?;
        } else {
            self.push(root);
        }
        Ok(Some(id))
    }

    /// Admit `candidate` if given, then sample bindings for up to `max_time`.
    ///
    /// Bindings whose complexity exceeds `complexity_limit` are deferred to
    /// the next call. Returns the number of bindings processed.
    pub fn process(
        &mut self,
        ctx: &mut SolveContext,
        candidate: Option<SkeletonCandidate>,
        complexity_limit: usize,
        max_time: Duration,
    ) -> Result<usize> {
        if let Some(candidate) = candidate {
            self.admit(ctx, candidate)?;
        }
        for binding in std::mem::take(&mut self.deferred) {
            self.skeletons[binding.skeleton].live -= 1;
            self.push(binding);
        }

        let start = Instant::now();
        let mut processed = 0;
        while !ctx.store.is_terminated() && start.elapsed() < max_time {
            let Some(Reverse(entry)) = self.heap.pop() else {
                break;
            };
            self.step(ctx, entry.binding, complexity_limit)?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Axioms blocking the failed clusters of every skeleton whose most
    /// advanced binding is stuck.
    pub fn disable_axioms(&self, session: &StreamSession, policy: &dyn ClusterPolicy) -> Vec<Axiom> {
        let mut axioms: Vec<Axiom> = Vec::new();
        for skeleton in &self.skeletons {
            let best = skeleton.best;
            if best.index >= skeleton.stream_plan.len() {
                continue;
            }
            let stuck = match skeleton.state {
                SkeletonState::Complete => false,
                SkeletonState::Dead => skeleton.failed,
                SkeletonState::Pending | SkeletonState::Sampling => best.attempts > 0,
            };
            if !stuck {
                continue;
            }
            let results: Vec<&StreamResult> = skeleton.stream_plan[..=best.index]
                .iter()
                .map(|&id| session.result(id))
                .collect();
            for cluster in policy.clusters(&results) {
                let members: Vec<&StreamResult> = cluster.iter().map(|&i| results[i]).collect();
                let axiom = disable_axiom(&members);
                if !axioms.contains(&axiom) {
                    axioms.push(axiom);
                }
            }
        }
        axioms
    }

    fn push(&mut self, binding: Binding) {
        let skeleton = &mut self.skeletons[binding.skeleton];
        skeleton.live += 1;
        let priority = binding.priority(skeleton.attempts);
        self.heap.push(Reverse(QueueEntry { priority, binding }));
    }

    fn retire(&mut self, skeleton: usize, failed: bool) {
        let skeleton = &mut self.skeletons[skeleton];
        skeleton.failed |= failed;
        if skeleton.live == 0 && skeleton.is_live() {
            debug!(skeleton = skeleton.id, attempts = skeleton.attempts, "Skeleton is dead");
            skeleton.state = SkeletonState::Dead;
        }
    }

    fn complete(&mut self, ctx: &mut SolveContext, binding: Binding) -> Result<()> {
        let skeleton = &mut self.skeletons[binding.skeleton];
        let plan = skeleton
            .action_plan
            .iter()
            .map(|action| binding.resolution.ground_action(action))
            .collect::<Result<Vec<_>>>()?;
        skeleton.observe(&binding);
        skeleton.state = SkeletonState::Complete;
        debug!(skeleton = skeleton.id, cost = binding.cost, "Skeleton fully bound");
        ctx.store.add_plan(plan, binding.cost);
        Ok(())
    }

    /// Realize the next result of `binding` once.
    fn step(&mut self, ctx: &mut SolveContext, mut binding: Binding, complexity_limit: usize) -> Result<()> {
        let id = binding.skeleton;
        self.skeletons[id].live -= 1;
        if !ctx.store.could_improve(binding.cost) {
            debug!(skeleton = id, cost = binding.cost, "Binding cannot improve on the best plan");
            self.retire(id, false);
            return Ok(());
        }
        if binding.total_complexity() > complexity_limit {
            self.skeletons[id].live += 1;
            self.deferred.push(binding);
            return Ok(());
        }

        let result_id = self.skeletons[id].stream_plan[binding.index];
        let result = ctx.session.result(result_id).clone();
        let inputs = binding.resolution.ground_terms(&result.inputs)?;
        let instance = ctx
            .session
            .get_instance(result.stream, inputs.into_iter().map(Term::Value).collect());
        if self.skeletons[id].state == SkeletonState::Pending {
            self.skeletons[id].state = SkeletonState::Sampling;
        }

        let batch = match ctx.session.instance(instance).batch(binding.attempts) {
            Some(batch) => Some(batch.to_vec()),
            None if ctx.session.instance(instance).is_exhausted() => None,
            None if !ctx.session.is_ready(instance, &ctx.evaluations) => {
                warn!(
                    skeleton = id,
                    stream = %result.stream_name,
                    "Stream instance is not ready, dropping binding"
                );
                None
            }
            None => Some(ctx.session.sample(instance, &mut ctx.evaluations)?),
        };
        let Some(batch) = batch else {
            debug!(skeleton = id, index = binding.index, "Binding failed");
            self.retire(id, true);
            return Ok(());
        };

        for real in batch {
            if let Some(child) = self.extend(ctx, &binding, &result, real)? {
                if child.is_bound(&self.skeletons[id]) {
                    self.complete(ctx, child)?;
                } else {
                    self.skeletons[id].observe(&child);
                    self.push(child);
                }
            }
        }

        binding.attempts += 1;
        self.skeletons[id].attempts += 1;
        self.skeletons[id].observe(&binding);
        let instance = ctx.session.instance(instance);
        if instance.is_exhausted() && instance.history().len() <= binding.attempts {
            self.retire(id, true);
        } else {
            self.push(binding);
        }
        Ok(())
    }

    /// Child of `parent` realizing `result` with the real result `real`, or
    /// `None` if the values conflict with the parent's resolution.
    fn extend(
        &mut self,
        ctx: &SolveContext,
        parent: &Binding,
        result: &StreamResult,
        real: ResultId,
    ) -> Result<Option<Binding>> {
        let real = ctx.session.result(real);
        let mut resolution = parent.resolution.clone();
        for (optimistic, actual) in result.outputs.iter().zip(&real.outputs) {
            let Term::Value(value) = actual else {
                return Err(PlanError::Internal(format!(
                    "real result of {} has a non-concrete output",
                    real.stream_name
                )));
            };
            match optimistic {
                Term::Object(object) if resolution.is_resolved(*object) => {
                    if resolution.value(*object)? != value {
                        return Ok(None);
                    }
                }
                Term::Object(object) => resolution.resolve(*object, value.clone())?,
                Term::Value(expected) if expected != value => return Ok(None),
                _ => {}
            }
        }

        let mut cost = parent.cost;
        if let (true, Some(optimistic), Some(actual)) = (result.is_function(), result.value, real.value) {
            cost += actual - optimistic;
        }
        let skeleton = &mut self.skeletons[parent.skeleton];
        Ok(Some(Binding {
            skeleton: parent.skeleton,
            seq: skeleton.allocate_seq(),
            index: parent.index + 1,
            resolution,
            cost,
            complexity: parent.total_complexity(),
            attempts: 0,
        }))
    }
}
