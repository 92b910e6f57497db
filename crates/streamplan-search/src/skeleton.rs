//! Plan skeletons and their bindings.

use serde::{Deserialize, Serialize};
use streamplan_core::{PlanAction, Resolution, ResultId};

/// Lifecycle of a skeleton in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkeletonState {
    /// Admitted, no binding attempted yet.
    Pending,
    /// At least one binding has been sampled.
    Sampling,
    /// A fully bound plan was handed to the solution store.
    Complete,
    /// No live binding remains.
    Dead,
}

/// A freshly planned stream plan and action plan, offered to the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonCandidate {
    /// Optimistic stream results in sampling order.
    pub stream_plan: Vec<ResultId>,
    /// Action plan over optimistic objects.
    pub action_plan: Vec<PlanAction>,
    /// Optimistic cost of the action plan.
    pub cost: f64,
}

/// How far the most advanced binding of a skeleton has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub seq: usize,
    pub index: usize,
    pub attempts: usize,
}

/// A queued stream plan plus action-plan template.
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub id: usize,
    pub stream_plan: Vec<ResultId>,
    pub action_plan: Vec<PlanAction>,
    pub cost: f64,
    pub state: SkeletonState,
    /// Sampling attempts over all bindings.
    pub attempts: usize,
    /// Most advanced binding so far.
    pub best: Progress,
    /// Bindings queued or deferred.
    pub(crate) live: usize,
    /// A binding died because a stream could not produce a value.
    pub failed: bool,
    next_seq: usize,
}

impl Skeleton {
    pub(crate) fn new(id: usize, candidate: SkeletonCandidate) -> Self {
        Self {
            id,
            stream_plan: candidate.stream_plan,
            action_plan: candidate.action_plan,
            cost: candidate.cost,
            state: SkeletonState::Pending,
            attempts: 0,
            best: Progress::default(),
            live: 0,
            failed: false,
            next_seq: 0,
        }
    }

    /// The binding with nothing resolved.
    pub(crate) fn root_binding(&mut self) -> Binding {
        Binding {
            skeleton: self.id,
            seq: self.allocate_seq(),
            index: 0,
            resolution: Resolution::new(),
            cost: self.cost,
            complexity: 0,
            attempts: 0,
        }
    }

    pub(crate) fn allocate_seq(&mut self) -> usize {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, SkeletonState::Pending | SkeletonState::Sampling)
    }

    /// True if the stream and action plans match.
    pub fn same_plan(&self, candidate: &SkeletonCandidate) -> bool {
        self.stream_plan == candidate.stream_plan && self.action_plan == candidate.action_plan
    }

    /// Track the most advanced binding, preferring more attempts on ties.
    pub(crate) fn observe(&mut self, binding: &Binding) {
        let progress = Progress {
            seq: binding.seq,
            index: binding.index,
            attempts: binding.attempts,
        };
        if progress.index > self.best.index
            || (progress.index == self.best.index && progress.attempts >= self.best.attempts)
        {
            self.best = progress;
        }
    }
}

/// Partial assignment of values to a skeleton's optimistic objects.
///
/// The first `index` results of the stream plan have been realized.
#[derive(Debug, Clone)]
pub struct Binding {
    pub skeleton: usize,
    pub seq: usize,
    /// Position of the next result to realize.
    pub index: usize,
    pub resolution: Resolution,
    /// Cost of the action plan under this binding.
    pub cost: f64,
    /// History positions consumed along this binding's path.
    pub complexity: usize,
    /// Calls made for the current result.
    pub attempts: usize,
}

impl Binding {
    pub fn is_bound(&self, skeleton: &Skeleton) -> bool {
        self.index >= skeleton.stream_plan.len()
    }

    /// Complexity including attempts on the current result.
    pub fn total_complexity(&self) -> usize {
        self.complexity + self.attempts
    }

    /// Queue key, minimized.
    pub fn priority(&self, skeleton_attempts: usize) -> (usize, usize, usize, usize) {
        (
            self.total_complexity(),
            skeleton_attempts,
            self.skeleton,
            self.seq,
        )
    }
}
