use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use super::*;
use crate::platform::stub::StubPlatform;

fn test_config() -> CacheConfig {
    CacheConfig {
        window_title: "WidgetInc".into(),
        process_name: "WidgetInc.exe".into(),
        period: Duration::from_millis(1000),
        border_target_width: 2054,
        border_color: Rgb::new(12, 10, 16),
        dump_dir: None,
    }
}

#[test]
fn refresh_publishes_letterboxed_frame() {
    let stub = Arc::new(StubPlatform::new());
    let cache = GeometryCache::new(stub, test_config());
    cache.refresh();
    let g = cache.geometry().unwrap();
    assert_eq!(g.frame, FrameArea { x: 150, y: 0, w: 1620, h: 1080 });
    assert_eq!(g.pixel_size, 8.4375);
    // Width is nowhere near the 2054 target, so refinement never ran.
    assert!(!g.refined);
    assert!(!g.refinement_failed);
}

#[test]
fn refinement_shifts_edge_and_snaps_width() {
    let stub = Arc::new(StubPlatform::new());
    let mut config = test_config();
    config.border_target_width = 1618;
    // Probe for shift 0 misses at (149, 540); shift 1 hits at (150, 540).
    stub.set_pixel(150, 540, Rgb::new(12, 10, 16));
    let cache = GeometryCache::new(stub, config);
    cache.refresh();
    let g = cache.geometry().unwrap();
    assert!(g.refined);
    assert!(!g.refinement_failed);
    assert_eq!(g.frame.x, 151);
    assert_eq!(g.frame.w, 1618);
    assert_eq!(g.frame.h, 1080);
}

#[test]
fn refinement_miss_keeps_unrefined_and_is_not_retried() {
    let stub = Arc::new(StubPlatform::new());
    let mut config = test_config();
    config.border_target_width = 1620;
    let cache = GeometryCache::new(stub.clone(), config);
    cache.refresh();
    let g = cache.geometry().unwrap();
    assert!(!g.refined);
    assert!(g.refinement_failed);
    assert_eq!(g.frame.w, 1620);

    // Border shows up later without the window moving: the published
    // snapshot must stay untouched.
    stub.set_pixel(149, 540, Rgb::new(12, 10, 16));
    cache.refresh();
    let g = cache.geometry().unwrap();
    assert!(!g.refined);
    assert!(g.refinement_failed);

    // A rectangle change re-arms refinement.
    stub.set_client(Rect::new(0, 0, 1922, 1080));
    stub.set_pixel(150, 540, Rgb::new(12, 10, 16));
    cache.refresh();
    let g = cache.geometry().unwrap();
    assert!(g.refined);
    assert_eq!(g.frame.x, 151);
    assert_eq!(g.frame.w, 1620);
}

#[test]
fn found_and_lost_transitions_emit_events() {
    let stub = Arc::new(StubPlatform::new());
    let cache = GeometryCache::new(stub.clone(), test_config());
    let (tx, rx) = mpsc::channel();
    cache.set_event_sender(tx);

    cache.refresh();
    match rx.try_recv().unwrap() {
        GeometryEvent::Found { title, .. } => assert_eq!(title, "WidgetInc"),
        other => panic!("expected Found, got {:?}", other),
    }

    // Unchanged geometry: no further event.
    cache.refresh();
    assert!(rx.try_recv().is_err());

    stub.set_window(None);
    cache.refresh();
    assert_eq!(rx.try_recv().unwrap(), GeometryEvent::Lost);
    assert!(cache.geometry().is_none());

    // Already lost: refreshing again stays quiet.
    cache.refresh();
    assert!(rx.try_recv().is_err());
}

#[test]
fn conversions_degrade_to_zero_without_a_window() {
    let stub = Arc::new(StubPlatform::empty());
    let cache = GeometryCache::new(stub, test_config());
    cache.refresh();
    assert_eq!(cache.percent_to_screen(0.5, 0.5), (0, 0));
    assert_eq!(cache.screen_to_percent(400, 300), (0.0, 0.0));
    assert_eq!(cache.frame_to_screen(10, 10), (0, 0));
    assert_eq!(cache.screen_to_frame(10, 10), (0, 0));
    assert_eq!(cache.grid_to_screen(4.0, 4.0), (0, 0));
}

#[test]
fn conversions_use_the_published_frame_area() {
    let stub = Arc::new(StubPlatform::new());
    let cache = GeometryCache::new(stub, test_config());
    cache.refresh();
    assert_eq!(cache.percent_to_screen(0.5, 0.5), (960, 540));
    assert_eq!(cache.screen_to_percent(960, 540), (0.5, 0.5));
    assert_eq!(cache.frame_to_screen(0, 0), (150, 0));
    assert_eq!(cache.screen_to_frame(150, 0), (0, 0));
    // Grid cell (0, 0) lands half a cell in from the frame origin.
    assert_eq!(cache.grid_to_screen(0.0, 0.0), (154, 4));
}

#[test]
fn overlay_anchor_sits_right_of_the_frame() {
    let stub = Arc::new(StubPlatform::new());
    let cache = GeometryCache::new(stub, test_config());
    cache.refresh();
    let g = cache.geometry().unwrap();
    assert_eq!(g.overlay, OverlayAnchor { x: 1773, y: 32, available_height: 948 });
}

#[test]
fn geometry_dump_is_written_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let stub = Arc::new(StubPlatform::new());
    let mut config = test_config();
    config.dump_dir = Some(dir.path().to_path_buf());
    let cache = GeometryCache::new(stub, config);
    cache.refresh();
    let raw = std::fs::read_to_string(dir.path().join("geometry.json")).unwrap();
    let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(v["geometry"]["frame"]["w"], 1620);
    assert!(v["captured_at"].is_string());
}

#[test]
fn refresh_loop_publishes_and_stops() {
    let stub = Arc::new(StubPlatform::new());
    let cache = Arc::new(GeometryCache::new(stub, test_config()));
    let stop = Arc::new(AtomicBool::new(false));
    let handle = {
        let cache = Arc::clone(&cache);
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || run_refresh_loop(cache, stop))
    };
    let deadline = Instant::now() + Duration::from_secs(2);
    while cache.geometry().is_none() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(cache.geometry().is_some());
    stop.store(true, Ordering::Release);
    handle.join().unwrap();
}
