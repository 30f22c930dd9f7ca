use super::MetricsCollector;

/// Renders the loop metrics into a log-friendly summary.
pub struct LoopMonitor {
    collector: MetricsCollector,
}

impl LoopMonitor {
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }

    pub fn generate_report(&self, frame_count: u64) -> String {
        let snapshot = self.collector.snapshot();

        if snapshot.is_empty() {
            return "No stages registered".to_string();
        }

        let mut report = format!("=== Relay Metrics after {} cycles ===", frame_count);

        for stage in &snapshot {
            report.push_str(&format!(
                "\n[{}] ok: {}  failed: {}  avg: {:.3}ms  last: {:.3}ms",
                stage.stage,
                stage.successes,
                stage.failures,
                stage.avg_latency.as_secs_f64() * 1000.0,
                stage.last_latency.as_secs_f64() * 1000.0,
            ));
        }

        report
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }
}
