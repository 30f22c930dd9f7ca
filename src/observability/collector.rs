use std::sync::Arc;
use std::time::Duration;

use super::StageMetrics;

pub const SIGNAL: &str = "signal";
pub const INGEST: &str = "ingest";
pub const TRACKING: &str = "tracking";
pub const SEND: &str = "send";
pub const CYCLE: &str = "cycle";

#[derive(Debug, Clone, PartialEq)]
pub struct StageSnapshot {
    pub stage: String,
    pub successes: u64,
    pub failures: u64,
    pub avg_latency: Duration,
    pub last_latency: Duration,
}

/// Per-stage metrics of the relay loop, in cycle order.
#[derive(Clone)]
pub struct MetricsCollector {
    stages: Vec<Arc<StageMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Register a stage. A stage already registered under the same name is replaced.
    pub fn register(&mut self, metrics: Arc<StageMetrics>) {
        match self.stages.iter_mut().find(|m| m.stage() == metrics.stage()) {
            Some(slot) => *slot = metrics,
            None => self.stages.push(metrics),
        }
    }

    pub fn stage(&self, stage: &str) -> Option<Arc<StageMetrics>> {
        self.stages.iter().find(|m| m.stage() == stage).cloned()
    }

    pub fn snapshot(&self) -> Vec<StageSnapshot> {
        self.stages
            .iter()
            .map(|m| StageSnapshot {
                stage: m.stage().to_string(),
                successes: m.successes(),
                failures: m.failures(),
                avg_latency: m.avg_latency(),
                last_latency: m.last_latency(),
            })
            .collect()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
