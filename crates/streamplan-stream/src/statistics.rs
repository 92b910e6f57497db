//! Per-stream call counters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Counters for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCounts {
    /// Procedure calls.
    pub calls: usize,
    /// Output tuples produced.
    pub outputs: usize,
    /// Calls that produced at least one output.
    pub successes: usize,
}

impl StreamCounts {
    pub fn success_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.successes as f64 / self.calls as f64
        }
    }
}

/// Sampling statistics for a session, keyed by stream name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStatistics {
    pub streams: BTreeMap<String, StreamCounts>,
}

impl StreamStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call that produced `outputs` tuples.
    pub fn record(&mut self, stream: &str, outputs: usize) {
        let counts = self.streams.entry(stream.to_string()).or_default();
        counts.calls += 1;
        counts.outputs += outputs;
        if outputs > 0 {
            counts.successes += 1;
        }
    }

    pub fn get(&self, stream: &str) -> StreamCounts {
        self.streams.get(stream).copied().unwrap_or_default()
    }

    pub fn total_calls(&self) -> usize {
        self.streams.values().map(|c| c.calls).sum()
    }

    pub fn log(&self) {
        for (name, counts) in &self.streams {
            info!(
                stream = %name,
                calls = counts.calls,
                outputs = counts.outputs,
                successes = counts.successes,
                success_rate = counts.success_rate(),
                "Stream statistics"
            );
        }
    }
}
