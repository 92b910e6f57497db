//! The search/sample loop shared by every entry point.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use streamplan_core::Result;
use tracing::{debug, info};

use crate::config::SolveConfig;
use crate::context::SolveContext;
use crate::queue::SkeletonQueue;
use crate::skeleton::SkeletonCandidate;

/// What one search phase produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// A new skeleton for the queue.
    Found(SkeletonCandidate),
    /// Nothing new this time, but a later search may succeed.
    Retry,
    /// No further skeletons can be produced.
    Exhausted,
}

/// Produces plan skeletons for the loop.
#[async_trait]
pub trait SkeletonSource: Send {
    async fn search(&mut self, ctx: &mut SolveContext, queue: &SkeletonQueue) -> Result<SearchOutcome>;

    /// Complexity up to which queued bindings are sampled.
    fn complexity_limit(&self) -> usize;
}

/// Accumulated timings of a loop run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopStats {
    pub iterations: usize,
    pub search_time: Duration,
    pub sample_time: Duration,
}

/// Time the queue may spend after a search phase.
///
/// A zero ratio never samples. After a failed search the remaining queue
/// may run without limit, otherwise sampling catches up to
/// `ratio * search_time`.
pub fn allocated_sample_time(
    ratio: f64,
    search_time: Duration,
    sample_time: Duration,
    failure: bool,
) -> Duration {
    if ratio <= 0.0 {
        Duration::ZERO
    } else if failure {
        Duration::MAX
    } else {
        Duration::try_from_secs_f64(search_time.as_secs_f64() * ratio)
            .unwrap_or(Duration::MAX)
            .saturating_sub(sample_time)
    }
}

/// Alternate search and sampling until the solution store terminates or
/// the source is exhausted.
pub async fn search_sample_loop(
    ctx: &mut SolveContext,
    queue: &mut SkeletonQueue,
    source: &mut dyn SkeletonSource,
    config: &SolveConfig,
) -> Result<LoopStats> {
    let ratio = config.sample_ratio();
    let mut stats = LoopStats::default();

    while !ctx.store.is_terminated() {
        stats.iterations += 1;
        info!(
            session = %ctx.session.id(),
            iteration = stats.iterations,
            skeletons = queue.num_live(),
            queue = queue.len(),
            evaluations = ctx.evaluations.len(),
            cost = ctx.store.best_cost(),
            search_time = stats.search_time.as_secs_f64(),
            sample_time = stats.sample_time.as_secs_f64(),
            total_time = ctx.store.elapsed().as_secs_f64(),
            "Search/sample iteration"
        );

        let start = Instant::now();
        let at_capacity = config
            .max_skeletons
            .map_or(false, |cap| queue.num_live() >= cap);
        let outcome = if at_capacity {
            debug!(skeletons = queue.num_live(), "Skeleton limit reached, skipping search");
            SearchOutcome::Exhausted
        } else {
            source.search(ctx, queue).await?
        };
        stats.search_time += start.elapsed();

        let failure = outcome == SearchOutcome::Exhausted;
        let candidate = match outcome {
            SearchOutcome::Found(candidate) => Some(candidate),
            SearchOutcome::Retry | SearchOutcome::Exhausted => None,
        };
        let budget = allocated_sample_time(ratio, stats.search_time, stats.sample_time, failure);
        let complexity_limit = if failure {
            usize::MAX
        } else {
            source.complexity_limit()
        };

        let start = Instant::now();
        queue.process(ctx, candidate, complexity_limit, budget)?;
        stats.sample_time += start.elapsed();

        if failure {
            break;
        }
    }

    ctx.session.statistics().log();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use streamplan_core::{Fact, PlanAction, Term};

    #[test]
    fn test_allocated_sample_time() {
        let second = Duration::from_secs(1);
        assert_eq!(allocated_sample_time(0.0, second, Duration::ZERO, true), Duration::ZERO);
        assert_eq!(allocated_sample_time(1.0, second, Duration::ZERO, true), Duration::MAX);
        assert_eq!(allocated_sample_time(2.0, second, Duration::ZERO, false), 2 * second);
        assert_eq!(allocated_sample_time(1.0, second, 3 * second, false), Duration::ZERO);
    }

    /// Retries a fixed number of times, then offers a bound plan.
    struct Scripted {
        retries: usize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SkeletonSource for Scripted {
        async fn search(&mut self, _ctx: &mut SolveContext, _queue: &SkeletonQueue) -> Result<SearchOutcome> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.retries {
                return Ok(SearchOutcome::Retry);
            }
            Ok(SearchOutcome::Found(SkeletonCandidate {
                stream_plan: Vec::new(),
                action_plan: vec![PlanAction::new("noop", Vec::<Term>::new())],
                cost: 0.0,
            }))
        }

        fn complexity_limit(&self) -> usize {
            0
        }
    }

    /// Never finds anything.
    struct Barren;

    #[async_trait]
    impl SkeletonSource for Barren {
        async fn search(&mut self, _ctx: &mut SolveContext, _queue: &SkeletonQueue) -> Result<SearchOutcome> {
            Ok(SearchOutcome::Exhausted)
        }

        fn complexity_limit(&self) -> usize {
            0
        }
    }

    fn context() -> SolveContext {
        SolveContext::new(Vec::new(), vec![Fact::atom("ready")], &SolveConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_loop_runs_until_solved() {
        let mut ctx = context();
        let mut queue = SkeletonQueue::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut source = Scripted {
            retries: 2,
            calls: calls.clone(),
        };
        let stats = search_sample_loop(&mut ctx, &mut queue, &mut source, &SolveConfig::default())
            .await
            .unwrap();
        assert_eq!(stats.iterations, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(ctx.store.has_solution());
    }

    #[tokio::test]
    async fn test_loop_stops_on_exhaustion() {
        let mut ctx = context();
        let mut queue = SkeletonQueue::new();
        let stats = search_sample_loop(&mut ctx, &mut queue, &mut Barren, &SolveConfig::default())
            .await
            .unwrap();
        assert_eq!(stats.iterations, 1);
        assert!(!ctx.store.has_solution());
    }

    #[tokio::test]
    async fn test_skeleton_limit_skips_search() {
        let mut ctx = context();
        let mut queue = SkeletonQueue::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut source = Scripted {
            retries: 0,
            calls: calls.clone(),
        };
        let config = SolveConfig::default().with_max_skeletons(0);
        search_sample_loop(&mut ctx, &mut queue, &mut source, &config)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!ctx.store.has_solution());
    }
}
