//! Solver configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use streamplan_state::SolutionStore;

/// Limits and knobs shared by every solving entry point. `None` means
/// unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveConfig {
    /// Plans costing more than this are never adopted.
    pub max_cost: Option<f64>,

    /// Stop as soon as a plan at most this expensive is found. Unbounded
    /// means the first plan ends the session.
    pub success_cost: Option<f64>,

    /// Wall-clock deadline in milliseconds.
    pub max_time_ms: Option<u64>,

    /// Optimistic results more expensive than this are not instantiated.
    pub max_effort: Option<f64>,

    /// Skip planning while this many skeletons are still being sampled.
    pub max_skeletons: Option<usize>,

    /// Sampling time allowed per unit of search time.
    pub search_sample_ratio: f64,

    /// Levels of optimistic instantiation before the first planner call.
    pub complexity_limit: usize,

    /// Treat every action as costing 1.
    pub unit_costs: bool,

    /// Include cost terms in constraint satisfaction.
    pub costs: bool,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            max_cost: None,
            success_cost: None,
            max_time_ms: None,
            max_effort: None,
            max_skeletons: None,
            search_sample_ratio: 1.0,
            complexity_limit: 3,
            unit_costs: false,
            costs: true,
        }
    }
}

impl SolveConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wall-clock deadline.
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time_ms = Some(max_time.as_millis() as u64);
        self
    }

    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = Some(max_cost);
        self
    }

    pub fn with_success_cost(mut self, success_cost: f64) -> Self {
        self.success_cost = Some(success_cost);
        self
    }

    pub fn with_max_effort(mut self, max_effort: f64) -> Self {
        self.max_effort = Some(max_effort);
        self
    }

    pub fn with_max_skeletons(mut self, max_skeletons: usize) -> Self {
        self.max_skeletons = Some(max_skeletons);
        self
    }

    pub fn with_search_sample_ratio(mut self, ratio: f64) -> Self {
        self.search_sample_ratio = ratio;
        self
    }

    pub fn with_complexity_limit(mut self, complexity_limit: usize) -> Self {
        self.complexity_limit = complexity_limit;
        self
    }

    pub fn with_unit_costs(mut self, unit_costs: bool) -> Self {
        self.unit_costs = unit_costs;
        self
    }

    pub fn with_costs(mut self, costs: bool) -> Self {
        self.costs = costs;
        self
    }

    pub fn max_time(&self) -> Option<Duration> {
        self.max_time_ms.map(Duration::from_millis)
    }

    /// Sampling ratio, with negative and NaN values read as zero.
    pub fn sample_ratio(&self) -> f64 {
        if self.search_sample_ratio.is_nan() {
            0.0
        } else {
            self.search_sample_ratio.max(0.0)
        }
    }

    /// A fresh solution store enforcing these limits.
    pub fn solution_store(&self) -> SolutionStore {
        SolutionStore::new(self.max_time(), self.success_cost, self.max_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SolveConfig::default();
        assert_eq!(config.search_sample_ratio, 1.0);
        assert_eq!(config.complexity_limit, 3);
        assert!(config.costs);
        assert!(config.max_time().is_none());
    }

    #[test]
    fn test_builder() {
        let config = SolveConfig::new()
            .with_max_time(Duration::from_secs(2))
            .with_max_skeletons(4)
            .with_search_sample_ratio(-1.0);
        assert_eq!(config.max_time_ms, Some(2000));
        assert_eq!(config.max_skeletons, Some(4));
        assert_eq!(config.sample_ratio(), 0.0);
    }

    #[test]
    fn test_partial_json() {
        let config: SolveConfig = serde_json::from_str(r#"{"max_time_ms": 500, "unit_costs": true}"#).unwrap();
        assert_eq!(config.max_time(), Some(Duration::from_millis(500)));
        assert!(config.unit_costs);
        assert_eq!(config.complexity_limit, 3);
    }
}
