use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use ptamlink::core::{FrameImage, Pose, ReportPayload, TrackingResult};
use ptamlink::engine::{CycleOutcome, CycleState, LoopSettings, MainLoop};
use ptamlink::ipc::mock::{RecordingSink, ScriptedSignal, SignalStep, StaticFrameSource};
use ptamlink::ipc::{ExitSignal, HubSignal};
use ptamlink::tracking::{PlaceholderTracker, Tracker};

fn frame_payload() -> Vec<u8> {
    let img = RgbaImage::from_pixel(10, 10, Rgba([10, 20, 30, 255]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Bmp)
        .unwrap();
    STANDARD.encode(bytes).into_bytes()
}

/// Tracker double returning a fixed result and counting calls.
#[derive(Clone)]
struct CountingTracker {
    calls: Arc<AtomicUsize>,
    result: Option<TrackingResult>,
}

impl CountingTracker {
    fn new(result: Option<TrackingResult>) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            result,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Tracker for CountingTracker {
    fn track(&mut self, _frame: &FrameImage, _index: u64) -> anyhow::Result<Option<TrackingResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result)
    }
}

struct PanickingTracker;

impl Tracker for PanickingTracker {
    fn track(&mut self, _frame: &FrameImage, _index: u64) -> anyhow::Result<Option<TrackingResult>> {
        panic!("tracker blew up");
    }
}

struct Harness {
    signal: ScriptedSignal,
    frames: StaticFrameSource,
    sink: RecordingSink,
    exit: ExitSignal,
    main_loop: MainLoop,
}

fn harness(steps: impl IntoIterator<Item = SignalStep>, tracker: Box<dyn Tracker>) -> Harness {
    let signal = ScriptedSignal::new(steps);
    let frames = StaticFrameSource::new(frame_payload());
    let sink = RecordingSink::new();
    let exit = ExitSignal::new();

    let settings = LoopSettings {
        park_interval: Duration::from_millis(1),
        ..LoopSettings::default()
    };
    let main_loop = MainLoop::new(
        Box::new(signal.clone()),
        Box::new(frames.clone()),
        tracker,
        Box::new(sink.clone()),
        exit.clone(),
        settings,
    );

    Harness {
        signal,
        frames,
        sink,
        exit,
        main_loop,
    }
}

#[tokio::test]
async fn test_frame_counter_counts_every_iteration() {
    use SignalStep::*;
    let mut h = harness(
        [Byte(b'y'), BindFailure, Byte(b'n'), ReadFailure, Byte(b'y')],
        Box::new(PlaceholderTracker::new()),
    );

    for expected in 1..=5u64 {
        h.main_loop.tick().await;
        assert_eq!(h.main_loop.frame_count(), expected);
    }

    // Script exhausted: every further cycle fails, the counter still moves.
    let outcome = h.main_loop.tick().await;
    assert!(outcome.is_abandoned());
    assert_eq!(h.main_loop.frame_count(), 6);
    assert_eq!(h.sink.delivered_count(), 3);
}

#[tokio::test]
async fn test_non_ready_byte_skips_buffer_read() {
    let tracker = CountingTracker::new(None);
    let mut h = harness([SignalStep::Byte(b'n')], Box::new(tracker.clone()));

    let outcome = h.main_loop.tick().await;

    assert_eq!(
        outcome,
        CycleOutcome::Completed {
            signal: HubSignal::NoFrame(Some(b'n')),
            ingested: false,
            tracked: false,
        }
    );
    assert_eq!(h.frames.reads(), 0);
    assert_eq!(tracker.calls(), 0);

    let delivered = h.sink.take_delivered();
    assert_eq!(delivered.len(), 1);
    let report = ReportPayload::parse(delivered[0].as_str()).unwrap();
    assert_eq!(report.pose, Pose::default());
    assert_eq!(report.point_count, 0);
}

#[tokio::test]
async fn test_non_ready_byte_reuses_held_frame() {
    use SignalStep::*;
    let tracker = CountingTracker::new(None);
    let mut h = harness([Byte(b'y'), Byte(b'n'), Closed], Box::new(tracker.clone()));

    assert!(h.main_loop.tick().await.is_completed());
    assert_eq!(h.frames.reads(), 1);

    let outcome = h.main_loop.tick().await;
    assert_eq!(
        outcome,
        CycleOutcome::Completed {
            signal: HubSignal::NoFrame(Some(b'n')),
            ingested: false,
            tracked: true,
        }
    );

    // A producer hanging up without a byte counts as "no new frame".
    let outcome = h.main_loop.tick().await;
    assert!(matches!(
        outcome,
        CycleOutcome::Completed {
            signal: HubSignal::NoFrame(None),
            ..
        }
    ));

    assert_eq!(h.frames.reads(), 1);
    assert_eq!(tracker.calls(), 3);
    let frame = h.main_loop.current_frame().unwrap();
    assert_eq!((frame.width(), frame.height()), (10, 10));
}

#[tokio::test]
async fn test_corrupt_frame_abandons_cycle() {
    use SignalStep::*;
    let mut h = harness([Byte(b'y'), Byte(b'y')], Box::new(PlaceholderTracker::new()));
    h.frames.set_payload("this is %% not base64");

    match h.main_loop.tick().await {
        CycleOutcome::Abandoned { failed_in, error } => {
            assert_eq!(failed_in, CycleState::Ingest);
            assert!(error.contains("Failed to decode frame"), "{}", error);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(h.main_loop.state(), CycleState::Idle);
    assert_eq!(h.sink.attempts(), 0);
    assert!(h.main_loop.current_frame().is_none());

    h.frames.set_payload(frame_payload());
    assert!(h.main_loop.tick().await.is_completed());

    // The second cycle went back through WAIT_SIGNAL.
    assert_eq!(h.signal.accepted(), 2);
    assert_eq!(h.sink.delivered_count(), 1);
}

#[tokio::test]
async fn test_modeler_absent_keeps_looping() {
    use SignalStep::*;
    let mut h = harness(
        [Byte(b'y'), Byte(b'y'), Byte(b'y')],
        Box::new(PlaceholderTracker::new()),
    );
    h.sink.set_refusing(true);

    for _ in 0..2 {
        match h.main_loop.tick().await {
            CycleOutcome::Abandoned { failed_in, .. } => assert_eq!(failed_in, CycleState::Send),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
    assert_eq!(h.sink.attempts(), 2);
    assert_eq!(h.signal.accepted(), 2);

    h.sink.set_refusing(false);
    assert!(h.main_loop.tick().await.is_completed());
    assert_eq!(h.sink.delivered_count(), 1);
    assert_eq!(h.main_loop.frame_count(), 3);
}

#[tokio::test]
async fn test_consecutive_cycles_produce_independent_payloads() {
    use SignalStep::*;
    let mut h = harness([Byte(b'y'), Byte(b'y')], Box::new(PlaceholderTracker::new()));

    h.main_loop.tick().await;
    assert_eq!(h.main_loop.frame_count(), 1);
    h.main_loop.tick().await;
    assert_eq!(h.main_loop.frame_count(), 2);

    let delivered = h.sink.take_delivered();
    assert_eq!(delivered.len(), 2);
    assert_ne!(delivered[0], delivered[1]);

    let first = ReportPayload::parse(delivered[0].as_str()).unwrap();
    let second = ReportPayload::parse(delivered[1].as_str()).unwrap();
    assert_eq!(first.pose.position, [0, 2, -5]);
    assert_eq!(second.pose.position, [1, 3, -4]);
}

#[tokio::test]
async fn test_report_carries_tracking_result() {
    let result = TrackingResult {
        pose: Pose::new([5, 6, 7], [0.25, 0.5, 0.75]),
        point_count: 812,
    };
    let mut h = harness([SignalStep::Byte(b'y')], Box::new(CountingTracker::new(Some(result))));

    h.main_loop.tick().await;

    let delivered = h.sink.take_delivered();
    let report = ReportPayload::parse(delivered[0].as_str()).unwrap();
    assert_eq!(report.pose, result.pose);
    assert_eq!(report.point_count, 812);
    // Overall time is carried over from the previous iteration.
    assert_eq!(report.overall, Duration::ZERO);
    assert!(h.main_loop.performance().overall > Duration::ZERO);
}

#[tokio::test]
async fn test_tracking_panic_is_contained() {
    use SignalStep::*;
    let mut h = harness([Byte(b'y'), Byte(b'n')], Box::new(PanickingTracker));

    match h.main_loop.tick().await {
        CycleOutcome::Abandoned { failed_in, error } => {
            assert_eq!(failed_in, CycleState::Track);
            assert!(error.contains("tracker blew up"), "{}", error);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert!(h.main_loop.tick().await.is_abandoned());
    assert_eq!(h.main_loop.frame_count(), 2);
    assert_eq!(h.sink.attempts(), 0);
}

#[tokio::test]
async fn test_exit_request_parks_loop() {
    let mut h = harness([SignalStep::Byte(b'y')], Box::new(PlaceholderTracker::new()));
    h.exit.request_exit();

    assert_eq!(h.main_loop.tick().await, CycleOutcome::Parked);
    assert_eq!(h.main_loop.tick().await, CycleOutcome::Parked);

    assert_eq!(h.signal.accepted(), 0);
    assert_eq!(h.sink.attempts(), 0);
    assert_eq!(h.main_loop.frame_count(), 2);
}

#[tokio::test]
async fn test_session_released_on_every_path() {
    use SignalStep::*;
    let mut h = harness(
        [Byte(b'y'), ReadFailure, Byte(b'n')],
        Box::new(PlaceholderTracker::new()),
    );
    h.frames.set_payload("corrupt!");

    for _ in 0..3 {
        h.main_loop.tick().await;
    }

    assert_eq!(h.signal.accepted(), 3);
    assert_eq!(h.signal.released(), 3);
}

#[tokio::test]
async fn test_stage_metrics_recorded() {
    use SignalStep::*;
    let mut h = harness([Byte(b'y'), BindFailure], Box::new(PlaceholderTracker::new()));

    h.main_loop.tick().await;
    h.main_loop.tick().await;

    let cycle = h.main_loop.metrics().stage("cycle").unwrap();
    assert_eq!(cycle.successes(), 1);
    assert_eq!(cycle.failures(), 1);

    let signal = h.main_loop.metrics().stage("signal").unwrap();
    assert_eq!(signal.successes(), 1);
    assert_eq!(signal.failures(), 1);

    let ingest = h.main_loop.metrics().stage("ingest").unwrap();
    assert_eq!(ingest.successes(), 1);
}
