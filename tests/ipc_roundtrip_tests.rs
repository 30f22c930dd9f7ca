#![cfg(unix)]

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use ptamlink::config::BridgeConfig;
use ptamlink::core::ReportPayload;
use ptamlink::engine::{CycleOutcome, CycleState, MainLoop};
use ptamlink::ipc::{ExitSignal, HubPeer, HubSignal, ModelerPeer};
use ptamlink::shm::FrameBufferWriter;
use ptamlink::tracking::PlaceholderTracker;
use tempfile::tempdir;

const PATIENCE: Duration = Duration::from_secs(5);

fn config_in(dir: &Path, wait_timeout_ms: Option<u64>) -> BridgeConfig {
    BridgeConfig {
        runtime_dir: dir.to_path_buf(),
        shm_dir: dir.to_path_buf(),
        wait_timeout_ms,
        ..BridgeConfig::default()
    }
}

fn bitmap() -> Vec<u8> {
    let img = RgbaImage::from_pixel(16, 12, Rgba([200, 100, 50, 255]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Bmp)
        .unwrap();
    bytes
}

fn main_loop(config: &BridgeConfig, exit: ExitSignal) -> MainLoop {
    MainLoop::from_config(config, Box::new(PlaceholderTracker::new()), exit)
}

#[tokio::test]
async fn test_full_cycle_over_real_channels() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path(), Some(5_000));

    let mut writer = FrameBufferWriter::create(dir.path(), &config.frame_buffer, 64 * 1024).unwrap();
    writer.write_image(&bitmap()).unwrap();

    let hub = HubPeer::new(config.hub_addr());
    let mut modeler = ModelerPeer::bind(&config.modeler_addr()).await.unwrap();
    let mut main_loop = main_loop(&config, ExitSignal::new());

    let (outcome, hub_result, received) = tokio::join!(
        main_loop.tick(),
        hub.signal(b'y', PATIENCE),
        modeler.receive()
    );

    assert_eq!(
        outcome,
        CycleOutcome::Completed {
            signal: HubSignal::FrameReady,
            ingested: true,
            tracked: true,
        }
    );
    hub_result.unwrap();

    let report = ReportPayload::parse(&received.unwrap()).unwrap();
    assert_eq!(report.pose.position, [0, 2, -5]);
    assert_eq!(report.point_count, 0);

    let frame = main_loop.current_frame().unwrap();
    assert_eq!((frame.width(), frame.height()), (16, 12));
    assert_eq!(main_loop.frame_count(), 1);

    // The signal endpoint does not outlive its cycle.
    assert!(!config.hub_addr().socket_path().exists());
}

#[tokio::test]
async fn test_no_frame_byte_leaves_buffer_untouched() {
    let dir = tempdir().unwrap();
    // No segment exists: reading it would fail the cycle.
    let config = config_in(dir.path(), Some(5_000));

    let hub = HubPeer::new(config.hub_addr());
    let mut modeler = ModelerPeer::bind(&config.modeler_addr()).await.unwrap();
    let mut main_loop = main_loop(&config, ExitSignal::new());

    let (outcome, hub_result, received) = tokio::join!(
        main_loop.tick(),
        hub.signal(b'n', PATIENCE),
        modeler.receive()
    );

    assert_eq!(
        outcome,
        CycleOutcome::Completed {
            signal: HubSignal::NoFrame(Some(b'n')),
            ingested: false,
            tracked: false,
        }
    );
    hub_result.unwrap();
    let report = ReportPayload::parse(&received.unwrap()).unwrap();
    assert_eq!(report.pose.position, [0, 0, 0]);
}

#[tokio::test]
async fn test_missing_segment_abandons_ingest() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path(), Some(5_000));

    let hub = HubPeer::new(config.hub_addr());
    let mut main_loop = main_loop(&config, ExitSignal::new());

    let (outcome, hub_result) = tokio::join!(main_loop.tick(), hub.signal(b'y', PATIENCE));

    match outcome {
        CycleOutcome::Abandoned { failed_in, error } => {
            assert_eq!(failed_in, CycleState::Ingest);
            assert!(error.contains("shared frame buffer"), "{}", error);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    // The producer is still released.
    hub_result.unwrap();
}

#[tokio::test]
async fn test_absent_modeler_is_retried_next_cycle() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path(), Some(5_000));

    let mut writer = FrameBufferWriter::create(dir.path(), &config.frame_buffer, 64 * 1024).unwrap();
    writer.write_image(&bitmap()).unwrap();

    let hub = HubPeer::new(config.hub_addr());
    let mut main_loop = main_loop(&config, ExitSignal::new());

    let (outcome, hub_result) = tokio::join!(main_loop.tick(), hub.signal(b'y', PATIENCE));
    match outcome {
        CycleOutcome::Abandoned { failed_in, error } => {
            assert_eq!(failed_in, CycleState::Send);
            assert!(error.contains("Failed to notify Modeler"), "{}", error);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    hub_result.unwrap();
    assert_eq!(main_loop.frame_count(), 1);

    let mut modeler = ModelerPeer::bind(&config.modeler_addr()).await.unwrap();
    let (outcome, hub_result, received) = tokio::join!(
        main_loop.tick(),
        hub.signal(b'n', PATIENCE),
        modeler.receive()
    );

    assert!(outcome.is_completed());
    hub_result.unwrap();
    // The second cycle tracks the frame held from the first.
    let report = ReportPayload::parse(&received.unwrap()).unwrap();
    assert_eq!(report.pose.position, [1, 3, -4]);
    assert_eq!(main_loop.frame_count(), 2);
}

#[tokio::test]
async fn test_stale_socket_is_replaced() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path(), Some(5_000));

    // A std listener leaves its socket file behind, like a crashed process.
    let stale = std::os::unix::net::UnixListener::bind(config.hub_addr().socket_path()).unwrap();
    drop(stale);
    assert!(config.hub_addr().socket_path().exists());

    let hub = HubPeer::new(config.hub_addr());
    let mut modeler = ModelerPeer::bind(&config.modeler_addr()).await.unwrap();
    let mut main_loop = main_loop(&config, ExitSignal::new());

    let (outcome, hub_result, received) = tokio::join!(
        main_loop.tick(),
        hub.signal(b'n', PATIENCE),
        modeler.receive()
    );

    assert!(outcome.is_completed(), "{:?}", outcome);
    hub_result.unwrap();
    received.unwrap();
}

#[tokio::test]
async fn test_exit_interrupts_signal_wait() {
    let dir = tempdir().unwrap();
    let config = BridgeConfig {
        park_interval_ms: 1,
        ..config_in(dir.path(), None)
    };
    let exit = ExitSignal::new();
    let mut main_loop = main_loop(&config, exit.clone());

    let trigger = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        exit.request_exit();
    };
    let (outcome, ()) = tokio::join!(main_loop.tick(), trigger);

    match outcome {
        CycleOutcome::Abandoned { failed_in, error } => {
            assert_eq!(failed_in, CycleState::WaitSignal);
            assert!(error.contains("cancelled by exit request"), "{}", error);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(!config.hub_addr().socket_path().exists());

    assert_eq!(main_loop.tick().await, CycleOutcome::Parked);
    assert_eq!(main_loop.frame_count(), 2);
}

#[tokio::test]
async fn test_signal_wait_times_out() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path(), Some(30));
    let mut main_loop = main_loop(&config, ExitSignal::new());

    match main_loop.tick().await {
        CycleOutcome::Abandoned { failed_in, error } => {
            assert_eq!(failed_in, CycleState::WaitSignal);
            assert!(error.contains("timed out"), "{}", error);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(main_loop.frame_count(), 1);
}

#[tokio::test]
async fn test_tick_recovers_after_being_dropped() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path(), Some(5_000));
    let mut main_loop = main_loop(&config, ExitSignal::new());

    // Nobody signals, so the tick is dropped while waiting for the HUB.
    let dropped = tokio::time::timeout(Duration::from_millis(20), main_loop.tick()).await;
    assert!(dropped.is_err());
    assert_eq!(main_loop.state(), CycleState::WaitSignal);
    assert!(!config.hub_addr().socket_path().exists());

    let hub = HubPeer::new(config.hub_addr());
    let mut modeler = ModelerPeer::bind(&config.modeler_addr()).await.unwrap();
    let (outcome, hub_result, received) = tokio::join!(
        main_loop.tick(),
        hub.signal(b'n', PATIENCE),
        modeler.receive()
    );

    assert!(outcome.is_completed(), "{:?}", outcome);
    hub_result.unwrap();
    received.unwrap();
    assert_eq!(main_loop.state(), CycleState::Idle);
    assert_eq!(main_loop.frame_count(), 1);
}

#[tokio::test]
async fn test_live_endpoint_is_not_stolen() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path(), Some(5_000));

    let _owner = ModelerPeer::bind(&config.modeler_addr()).await.unwrap();
    let err = ModelerPeer::bind(&config.modeler_addr()).await.unwrap_err();

    let io_err = err.downcast_ref::<std::io::Error>().unwrap();
    assert_eq!(io_err.kind(), std::io::ErrorKind::AddrInUse);
    assert!(config.modeler_addr().socket_path().exists());
}
