pub mod collector;
pub mod metrics;
pub mod monitor;

pub use collector::{MetricsCollector, StageSnapshot};
pub use metrics::StageMetrics;
pub use monitor::LoopMonitor;

/// Install the `tracing` subscriber that writes diagnostics to stderr.
///
/// Honours `RUST_LOG`; defaults to `info`. Safe to call more than once.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
