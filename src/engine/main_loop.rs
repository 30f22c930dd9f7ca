use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, info};

use super::{CycleContext, CycleOutcome, CycleState};
use crate::config::BridgeConfig;
use crate::core::{FrameImage, PerformanceReport, ReportPayload};
use crate::error::BridgeError;
use crate::ingest::decode_frame;
use crate::ipc::{
    ExitSignal, HubSignalChannel, ModelerNotifier, ReportSink, SignalChannel, SignalSession,
    WaitPolicy,
};
use crate::observability::collector::{CYCLE, INGEST, SEND, SIGNAL, TRACKING};
use crate::observability::{LoopMonitor, MetricsCollector, StageMetrics};
use crate::resilience::{contain_panic, RecoveryPolicy};
use crate::shm::FrameSource;
use crate::tracking::Tracker;

/// Tunables of the main loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub wait_timeout: Option<Duration>,
    pub recovery: RecoveryPolicy,
    pub park_interval: Duration,
    pub metrics_log_interval: u64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            wait_timeout: None,
            recovery: RecoveryPolicy::Immediate,
            park_interval: Duration::from_millis(100),
            metrics_log_interval: 0,
        }
    }
}

impl LoopSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            wait_timeout: config.wait_timeout(),
            recovery: config.recovery_policy(),
            park_interval: config.park_interval(),
            metrics_log_interval: config.metrics_log_interval,
        }
    }
}

struct StageHandles {
    signal: Arc<StageMetrics>,
    ingest: Arc<StageMetrics>,
    tracking: Arc<StageMetrics>,
    send: Arc<StageMetrics>,
    cycle: Arc<StageMetrics>,
}

impl StageHandles {
    fn register(collector: &mut MetricsCollector) -> Self {
        let mut add = |stage: &str| {
            let metrics = Arc::new(StageMetrics::new(stage));
            collector.register(Arc::clone(&metrics));
            metrics
        };

        Self {
            signal: add(SIGNAL),
            ingest: add(INGEST),
            tracking: add(TRACKING),
            send: add(SEND),
            cycle: add(CYCLE),
        }
    }
}

/// Drives the relay cycle: wait for the HUB, ingest, track, report.
///
/// Owns the only state that outlives a cycle: the latest decoded frame and
/// the performance counters.
pub struct MainLoop {
    signal: Box<dyn SignalChannel>,
    frames: Box<dyn FrameSource>,
    tracker: Box<dyn Tracker>,
    sink: Box<dyn ReportSink>,
    wait: WaitPolicy,
    settings: LoopSettings,
    current_frame: Option<FrameImage>,
    performance: PerformanceReport,
    state: CycleState,
    stages: StageHandles,
    monitor: LoopMonitor,
}

impl MainLoop {
    pub fn new(
        signal: Box<dyn SignalChannel>,
        frames: Box<dyn FrameSource>,
        tracker: Box<dyn Tracker>,
        sink: Box<dyn ReportSink>,
        exit: ExitSignal,
        settings: LoopSettings,
    ) -> Self {
        let mut collector = MetricsCollector::new();
        let stages = StageHandles::register(&mut collector);

        Self {
            signal,
            frames,
            tracker,
            sink,
            wait: WaitPolicy::new(exit, settings.wait_timeout),
            settings,
            current_frame: None,
            performance: PerformanceReport::default(),
            state: CycleState::Idle,
            stages,
            monitor: LoopMonitor::new(collector),
        }
    }

    /// Wire the real channels and shared buffer named in the config.
    pub fn from_config(config: &BridgeConfig, tracker: Box<dyn Tracker>, exit: ExitSignal) -> Self {
        Self::new(
            Box::new(HubSignalChannel::new(config.hub_addr())),
            Box::new(config.frame_buffer()),
            tracker,
            Box::new(ModelerNotifier::new(config.modeler_addr())),
            exit,
            LoopSettings::from_config(config),
        )
    }

    pub fn frame_count(&self) -> u64 {
        self.performance.frame_count
    }

    pub fn performance(&self) -> &PerformanceReport {
        &self.performance
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn current_frame(&self) -> Option<&FrameImage> {
        self.current_frame.as_ref()
    }

    pub fn metrics(&self) -> &MetricsCollector {
        self.monitor.collector()
    }

    /// Run forever. Once exit is requested the loop parks; only external
    /// termination ends the process.
    pub async fn run(&mut self) {
        loop {
            self.tick().await;
        }
    }

    /// One loop iteration. Never fails: errors abandon the cycle and are
    /// logged. The frame counter advances either way.
    pub async fn tick(&mut self) -> CycleOutcome {
        let started = Instant::now();
        let index = self.performance.frame_count;

        let outcome = if self.wait.exit.is_exit_requested() {
            tokio::time::sleep(self.settings.park_interval).await;
            CycleOutcome::Parked
        } else {
            // A previous tick dropped mid-cycle leaves its state behind.
            self.state = CycleState::Idle;
            match self.run_cycle(CycleContext::new(index)).await {
                Ok(outcome) => outcome,
                Err(err) => self.abandon(index, err).await,
            }
        };

        let elapsed = started.elapsed();
        self.performance.overall = elapsed;
        self.performance.frame_count += 1;

        if outcome.is_completed() {
            self.stages.cycle.record_success(elapsed);
        }
        self.log_metrics_if_due();

        outcome
    }

    async fn run_cycle(&mut self, ctx: CycleContext) -> Result<CycleOutcome> {
        self.advance(CycleState::WaitSignal);
        let ctx = self.receive_signal(ctx).await?;

        self.advance(CycleState::Track);
        let ctx = self.track(ctx)?;

        self.advance(CycleState::BuildReport);
        let payload = self.build_report(&ctx);

        self.advance(CycleState::Send);
        self.send(payload).await?;

        self.advance(CycleState::Idle);
        debug!(
            cycle = ctx.index,
            signal_ms = ctx.signal_time.as_secs_f64() * 1000.0,
            tracking_ms = ctx.tracking_time.as_secs_f64() * 1000.0,
            "cycle completed"
        );

        Ok(CycleOutcome::Completed {
            signal: ctx
                .signal
                .ok_or_else(|| anyhow!("cycle finished without a HUB signal"))?,
            ingested: ctx.ingested,
            tracked: ctx.tracked,
        })
    }

    async fn abandon(&mut self, index: u64, err: anyhow::Error) -> CycleOutcome {
        let failed_in = self.state;
        let message = format!("{err:#}");
        self.stages.cycle.record_failure();

        let cancelled = err
            .chain()
            .filter_map(|cause| cause.downcast_ref::<BridgeError>())
            .any(BridgeError::is_cancelled);
        if cancelled {
            info!(cycle = index, state = %failed_in, "cycle interrupted by exit request");
        } else {
            error!(cycle = index, state = %failed_in, error = %message, "cycle abandoned");
        }

        self.state = CycleState::Idle;
        if !cancelled {
            self.settings.recovery.after_failure().await;
        }

        CycleOutcome::Abandoned {
            failed_in,
            error: message,
        }
    }

    /// WAIT_SIGNAL and the optional INGEST, both inside one producer
    /// connection. The endpoint is released on every path.
    async fn receive_signal(&mut self, mut ctx: CycleContext) -> Result<CycleContext> {
        let started = Instant::now();

        let mut session = match self.signal.accept(&self.wait).await {
            Ok(session) => session,
            Err(e) => {
                self.stages.signal.record_failure();
                return Err(e).context("Failed to accept HUB connection");
            }
        };

        let handled = self.handle_session(session.as_mut(), &mut ctx).await;
        let released = session.release().await;

        if handled.is_err() || released.is_err() {
            self.stages.signal.record_failure();
        }
        handled?;
        released.context("Failed to release HUB channel")?;

        ctx.signal_time = started.elapsed();
        self.performance.signal = ctx.signal_time;
        self.stages.signal.record_success(ctx.signal_time);
        Ok(ctx)
    }

    async fn handle_session(
        &mut self,
        session: &mut dyn SignalSession,
        ctx: &mut CycleContext,
    ) -> Result<()> {
        let signal = session
            .read_signal(&self.wait)
            .await
            .context("Failed to read HUB signal")?;
        ctx.signal = Some(signal);

        if signal.is_frame_ready() {
            self.advance(CycleState::Ingest);
            self.ingest()?;
            ctx.ingested = true;
        } else {
            debug!(cycle = ctx.index, ?signal, "no new frame");
        }
        Ok(())
    }

    fn ingest(&mut self) -> Result<()> {
        let started = Instant::now();
        let decoded = self
            .frames
            .read_content()
            .context("Failed to read shared frame buffer")
            .and_then(|raw| decode_frame(&raw).context("Failed to decode frame"));

        match decoded {
            Ok(frame) => {
                self.stages.ingest.record_success(started.elapsed());
                debug!(width = frame.width(), height = frame.height(), "frame ingested");
                self.current_frame = Some(frame);
                Ok(())
            }
            Err(e) => {
                self.stages.ingest.record_failure();
                Err(e)
            }
        }
    }

    fn track(&mut self, mut ctx: CycleContext) -> Result<CycleContext> {
        let Some(frame) = self.current_frame.as_ref() else {
            debug!(cycle = ctx.index, "no frame held yet, tracking skipped");
            self.performance.tracking = Duration::ZERO;
            return Ok(ctx);
        };

        let started = Instant::now();
        let tracker = &mut self.tracker;
        let index = ctx.index;
        let result = contain_panic("tracking", || tracker.track(frame, index));
        ctx.tracking_time = started.elapsed();
        self.performance.tracking = ctx.tracking_time;

        match result {
            Ok(tracking) => {
                self.stages.tracking.record_success(ctx.tracking_time);
                if tracking.is_none() {
                    debug!(cycle = index, "tracking not converged, reporting zero pose");
                }
                ctx.tracked = true;
                ctx.tracking = tracking;
                Ok(ctx)
            }
            Err(e) => {
                self.stages.tracking.record_failure();
                Err(e)
            }
        }
    }

    fn build_report(&self, ctx: &CycleContext) -> ReportPayload {
        let result = ctx.tracking.unwrap_or_default();
        ReportPayload::build(&result.pose, result.point_count, &self.performance)
    }

    async fn send(&mut self, payload: ReportPayload) -> Result<()> {
        let started = Instant::now();
        match self.sink.send(payload, &self.wait).await {
            Ok(()) => {
                self.stages.send.record_success(started.elapsed());
                Ok(())
            }
            Err(e) => {
                self.stages.send.record_failure();
                Err(e).context("Failed to notify Modeler")
            }
        }
    }

    fn advance(&mut self, next: CycleState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "invalid cycle transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    fn log_metrics_if_due(&self) {
        let interval = self.settings.metrics_log_interval;
        if interval > 0 && self.performance.frame_count % interval == 0 {
            info!("{}", self.monitor.generate_report(self.performance.frame_count));
        }
    }
}
