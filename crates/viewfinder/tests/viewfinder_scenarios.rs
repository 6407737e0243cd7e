//! End-to-end viewfinder scenarios against the in-memory camera pool

use std::sync::Arc;
use std::time::Duration;

use barcode_scanner::fake::{RecordingSink, ScriptedDecoder};
use barcode_scanner::{format, ChannelSink, DecodedSymbol, FrameDisposition, Point, BAR_CODE_READ_EVENT};
use camera_capture::fake::{FakePool, Op};
use camera_capture::{CameraSelector, FocusMode, SurfaceBinding, SurfaceId, TorchMode};
use gesture_control::{TouchAction, TouchEvent, TouchOutcome, TouchPoint};
use viewfinder::{SessionState, StartOutcome, ViewFinder, ViewFinderConfig};

const FRAME_LEN: usize = 640 * 480 * 3 / 2;
const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

fn symbol(text: &str) -> DecodedSymbol {
    DecodedSymbol {
        raw_value: text.to_string(),
        format: format::QR_CODE,
        corner_points: vec![Point { x: 10, y: 20 }, Point { x: 110, y: 20 }],
    }
}

fn surface() -> SurfaceBinding {
    SurfaceBinding::new(SurfaceId(1), 1000, 1000)
}

struct Rig {
    pool: Arc<FakePool>,
    decoder: Arc<ScriptedDecoder>,
    sink: Arc<RecordingSink>,
    viewfinder: ViewFinder,
}

fn rig(config: ViewFinderConfig, symbols: Vec<DecodedSymbol>) -> Rig {
    let pool = Arc::new(FakePool::new());
    let decoder = Arc::new(ScriptedDecoder::new(symbols));
    let sink = Arc::new(RecordingSink::new());
    let viewfinder = ViewFinder::new(&config, pool.clone(), decoder.clone(), sink.clone()).unwrap();
    Rig {
        pool,
        decoder,
        sink,
        viewfinder,
    }
}

#[test]
fn test_frame_from_device_publishes_first_symbol_only() {
    let rig = rig(ViewFinderConfig::default(), vec![symbol("first"), symbol("second")]);
    assert_eq!(rig.viewfinder.on_surface_available(surface()), StartOutcome::Started);

    let camera = rig.pool.camera(CameraSelector::Back);
    assert!(camera.deliver_frame(&vec![0u8; FRAME_LEN]));
    assert!(rig.viewfinder.scheduler().wait_idle(IDLE_TIMEOUT));

    let events = rig.sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, BAR_CODE_READ_EVENT);
    assert_eq!(events[0].payload["data"], "first");
    assert_eq!(events[0].payload["type"], format::QR_CODE);
    assert_eq!(events[0].payload["bounds"][1]["x"], "110");
}

#[tokio::test]
async fn test_channel_sink_receives_events() {
    let pool = Arc::new(FakePool::new());
    let (sink, mut events) = ChannelSink::channel();
    let decoder = Arc::new(ScriptedDecoder::new(vec![symbol("ticket-42")]));
    let viewfinder =
        ViewFinder::new(&ViewFinderConfig::default(), pool.clone(), decoder, Arc::new(sink)).unwrap();
    viewfinder.on_surface_available(surface());

    let disposition = viewfinder.on_preview_frame(&vec![0u8; FRAME_LEN]);
    assert!(matches!(disposition, Some(FrameDisposition::Queued(_))));

    let event = tokio::time::timeout(IDLE_TIMEOUT, events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.payload["data"], "ticket-42");
    viewfinder.shutdown();
}

#[test]
fn test_invalid_capture_mode_never_runs_preview() {
    let config = ViewFinderConfig {
        capture_mode: 5,
        ..Default::default()
    };
    let rig = rig(config, Vec::new());

    let outcome = rig.viewfinder.on_surface_available(surface());

    assert!(matches!(outcome, StartOutcome::Failed(_)));
    assert_ne!(rig.viewfinder.session().state(), SessionState::Running);
    assert_eq!(rig.pool.count(&Op::StartPreview(CameraSelector::Back)), 0);
    assert!(rig.viewfinder.on_preview_frame(&[0u8; 16]).is_none());
}

#[test]
fn test_surface_destroyed_stops_decoding() {
    let rig = rig(ViewFinderConfig::default(), vec![symbol("x")]);
    rig.viewfinder.on_surface_available(surface());

    assert!(rig.viewfinder.on_surface_destroyed());
    assert_eq!(rig.viewfinder.session().state(), SessionState::Idle);

    let camera = rig.pool.camera(CameraSelector::Back);
    assert!(!camera.deliver_frame(&vec![0u8; FRAME_LEN]));
    assert!(rig.viewfinder.on_preview_frame(&vec![0u8; FRAME_LEN]).is_none());
    assert!(rig.viewfinder.scheduler().wait_idle(IDLE_TIMEOUT));
    assert_eq!(rig.decoder.calls(), 0);
    assert!(rig.sink.events().is_empty());
}

#[test]
fn test_scanner_disabled_by_host() {
    let rig = rig(ViewFinderConfig::default(), vec![symbol("x")]);
    rig.viewfinder.on_surface_available(surface());
    rig.pool.set_scanner_enabled(false);

    let disposition = rig.viewfinder.on_preview_frame(&vec![0u8; FRAME_LEN]);

    assert!(matches!(disposition, Some(FrameDisposition::ScannerDisabled)));
    assert_eq!(rig.decoder.calls(), 0);
    assert_eq!(rig.viewfinder.scan_stats().frames_disabled, 1);
}

#[test]
fn test_switch_camera_releases_old_device_first() {
    let rig = rig(ViewFinderConfig::default(), Vec::new());
    rig.viewfinder.on_surface_available(surface());
    rig.pool.clear_ops();

    assert!(rig.viewfinder.set_camera_type(CameraSelector::Back).is_none());
    assert!(rig.pool.ops().is_empty());

    rig.viewfinder
        .set_camera_type(CameraSelector::Front)
        .unwrap()
        .join()
        .unwrap();

    let ops = rig.pool.ops();
    let release_back = ops
        .iter()
        .position(|o| *o == Op::Release(CameraSelector::Back))
        .unwrap();
    let acquire_front = ops
        .iter()
        .position(|o| *o == Op::Acquire(CameraSelector::Front))
        .unwrap();
    let configure_front = ops
        .iter()
        .position(|o| *o == Op::SetParameters(CameraSelector::Front))
        .unwrap();
    assert!(release_back < acquire_front);
    assert!(release_back < configure_front);
    assert_eq!(rig.viewfinder.session().state(), SessionState::Running);
    assert_eq!(
        rig.viewfinder.session().current_device().unwrap().selector(),
        CameraSelector::Front
    );
}

#[test]
fn test_concurrent_surface_events_acquire_once() {
    let rig = rig(ViewFinderConfig::default(), Vec::new());
    rig.pool.set_acquire_delay(Duration::from_millis(50));
    let viewfinder = Arc::new(rig.viewfinder);

    let threads: Vec<_> = (0..4)
        .map(|i| {
            let viewfinder = viewfinder.clone();
            std::thread::spawn(move || {
                viewfinder.on_surface_available(SurfaceBinding::new(SurfaceId(i), 1000, 1000))
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(viewfinder.session().settle(), SessionState::Running);
    assert_eq!(rig.pool.count(&Op::Acquire(CameraSelector::Back)), 1);
}

#[test]
fn test_torch_setting_survives_restart() {
    let rig = rig(ViewFinderConfig::default(), Vec::new());
    rig.viewfinder.set_torch_mode(TorchMode::On);
    rig.viewfinder.on_surface_available(surface());
    rig.viewfinder.on_surface_destroyed();
    rig.viewfinder.on_surface_available(surface());

    // Once when set, then once per start
    assert_eq!(rig.pool.count(&Op::TorchMode(CameraSelector::Back, TorchMode::On)), 3);
}

#[test]
fn test_pinch_zoom_through_viewfinder() {
    let rig = rig(ViewFinderConfig::default(), Vec::new());
    rig.viewfinder.on_surface_available(surface());

    let two = |action, spread: f32| {
        TouchEvent::new(
            action,
            vec![TouchPoint { x: 500.0 - spread, y: 500.0 }, TouchPoint { x: 500.0 + spread, y: 500.0 }],
        )
    };
    rig.viewfinder.on_touch(&TouchEvent::single(TouchAction::Down, 450.0, 500.0));
    assert!(matches!(
        rig.viewfinder.on_touch(&two(TouchAction::PointerDown, 50.0)),
        TouchOutcome::ZoomBaseline(_)
    ));
    assert!(matches!(
        rig.viewfinder.on_touch(&two(TouchAction::Move, 80.0)),
        TouchOutcome::Zoomed(1)
    ));
    assert_eq!(rig.pool.camera(CameraSelector::Back).params().zoom, 1);
}

#[test]
fn test_tap_focuses_and_locks() {
    let rig = rig(ViewFinderConfig::default(), Vec::new());
    rig.viewfinder.on_surface_available(surface());

    rig.viewfinder.on_touch(&TouchEvent::single(TouchAction::Down, 500.0, 500.0));
    let outcome = rig.viewfinder.on_touch(&TouchEvent::single(TouchAction::Up, 500.0, 500.0));

    let TouchOutcome::Focusing(lock) = outcome else {
        panic!("expected focusing, got {:?}", outcome);
    };
    assert!(lock.wait());

    let params = rig.pool.camera(CameraSelector::Back).params();
    assert_eq!(params.focus_mode, Some(FocusMode::Auto));
    assert_eq!(params.focus_areas.len(), 1);
    assert_eq!(params.focus_areas[0].rect.left, -100);
    assert_eq!(params.focus_areas[0].weight, 1000);
}

#[test]
fn test_touch_without_session() {
    let rig = rig(ViewFinderConfig::default(), Vec::new());
    let outcome = rig.viewfinder.on_touch(&TouchEvent::single(TouchAction::Up, 1.0, 1.0));
    assert!(matches!(outcome, TouchOutcome::ParametersUnavailable));
}

#[test]
fn test_ratio_and_shutdown() {
    let rig = rig(ViewFinderConfig::default(), Vec::new());
    let ratio = rig.viewfinder.ratio().unwrap();
    assert!((ratio - 4.0 / 3.0).abs() < 1e-9);

    rig.viewfinder.on_surface_available(surface());
    rig.viewfinder.shutdown();

    assert_eq!(rig.viewfinder.session().state(), SessionState::Idle);
    assert!(matches!(
        rig.viewfinder.on_preview_frame(&[0u8; 16]),
        None | Some(FrameDisposition::ShutDown)
    ));
}
