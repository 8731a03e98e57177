use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::*;
use crate::buttons::{palette_entry, ButtonClassifier, ButtonSpec};
use crate::error::ConfigError;
use crate::executor::ExecutorConfig;
use crate::platform::stub::StubPlatform;

fn fast_coordinator(stub: &Arc<StubPlatform>) -> SessionCoordinator {
    let mut exec_config = ExecutorConfig::default();
    exec_config.retry_backoff = Duration::from_millis(2);
    exec_config.post_click_delay = Duration::from_millis(1);
    exec_config.poll_interval = Duration::from_millis(5);
    let exec = Arc::new(ActionExecutor::new(
        stub.clone(),
        ButtonClassifier::new(stub.clone()),
        exec_config,
    ));
    let config = CoordinatorConfig {
        max_run_time: Duration::from_secs(60),
        join_timeout: Duration::from_millis(500),
    };
    SessionCoordinator::new(exec, config)
}

fn recording_callback() -> (UiCallback, Arc<Mutex<Vec<UiEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let cb: UiCallback = Arc::new(move |event| sink.lock().unwrap().push(event));
    (cb, events)
}

fn completions_for(events: &Arc<Mutex<Vec<UiEvent>>>, id: &str) -> usize {
    events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, UiEvent::Completion { frame_id } if frame_id == id))
        .count()
}

fn frame_for(id: &str, buttons: &[(&str, ButtonSpec)]) -> ResolvedFrame {
    ResolvedFrame {
        id: id.into(),
        name: String::new(),
        buttons: buttons
            .iter()
            .map(|(n, s)| (n.to_string(), s.clone()))
            .collect(),
        interactions: HashMap::new(),
        bboxes: HashMap::new(),
    }
}

fn wait_for(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

/// Loops cooperatively until told to stop.
struct Park;

impl Routine for Park {
    fn run(&mut self, ctl: &SessionCtl) -> Result<(), ConfigError> {
        while ctl.should_continue() {
            ctl.sleep(Duration::from_millis(5));
        }
        Ok(())
    }
}

/// Returns as soon as it starts.
struct ExitQuick;

impl Routine for ExitQuick {
    fn run(&mut self, _ctl: &SessionCtl) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Ignores the cancellation surface for longer than the join timeout.
struct IgnoreStop(Duration);

impl Routine for IgnoreStop {
    fn run(&mut self, _ctl: &SessionCtl) -> Result<(), ConfigError> {
        thread::sleep(self.0);
        Ok(())
    }
}

#[test]
fn unmapped_frame_id_is_rejected() {
    let stub = Arc::new(StubPlatform::new());
    let coord = fast_coordinator(&stub);
    let (cb, events) = recording_callback();
    coord.set_ui_callback(cb);
    assert!(!coord.start_automation(frame_for("9.9", &[])));
    assert_eq!(coord.status().active_count, 0);
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn registry_start_and_stop_round_trip() {
    let stub = Arc::new(StubPlatform::new());
    // A lit create button that dims on click keeps the factory routine
    // parked in its polling loop.
    let green = palette_entry("green").unwrap();
    stub.set_pixel(10, 10, green.default);
    stub.set_click_transition(10, 10, green.inactive);
    let coord = fast_coordinator(&stub);
    let (cb, events) = recording_callback();
    coord.set_ui_callback(cb);

    let frame = frame_for("1.3", &[("create", ButtonSpec::new(10, 10, "green"))]);
    assert!(coord.start_automation(frame));

    let status = coord.status();
    assert_eq!(status.active_count, 1);
    assert_eq!(status.frames[0].frame_id, "1.3");
    assert_eq!(status.frames[0].name, Some("Widget Factory"));
    assert_eq!(status.frames[0].state, SessionState::Running);

    assert!(coord.stop_automation("1.3"));
    assert_eq!(coord.status().active_count, 0);
    assert!(completions_for(&events, "1.3") >= 1);
}

#[test]
fn stop_without_session_returns_false_and_stays_silent() {
    let stub = Arc::new(StubPlatform::new());
    let coord = fast_coordinator(&stub);
    let (cb, events) = recording_callback();
    coord.set_ui_callback(cb);
    assert!(!coord.stop_automation("1.1"));
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn second_start_replaces_the_first_session() {
    let stub = Arc::new(StubPlatform::new());
    let coord = fast_coordinator(&stub);
    let (cb, events) = recording_callback();
    coord.set_ui_callback(cb);

    assert!(coord.start_routine("1.1".into(), Box::new(Park)));
    assert!(coord.start_routine("1.1".into(), Box::new(Park)));

    // The first worker was stopped and joined, so its completion fired
    // before the second start returned; one session remains.
    let status = coord.status();
    assert_eq!(status.active_count, 1);
    assert_eq!(status.frames[0].state, SessionState::Running);
    assert!(completions_for(&events, "1.1") >= 1);
    assert!(stub.release_count() >= 1);

    coord.stop_all();
}

#[test]
fn stop_all_stops_every_session() {
    let stub = Arc::new(StubPlatform::new());
    let coord = fast_coordinator(&stub);
    let (cb, events) = recording_callback();
    coord.set_ui_callback(cb);

    assert!(coord.start_routine("1.1".into(), Box::new(Park)));
    assert!(coord.start_routine("3.2".into(), Box::new(Park)));
    assert_eq!(coord.status().active_count, 2);

    coord.stop_all();
    assert_eq!(coord.status().active_count, 0);
    assert!(completions_for(&events, "1.1") >= 1);
    assert!(completions_for(&events, "3.2") >= 1);
}

#[test]
fn stuck_worker_still_hands_control_back() {
    let stub = Arc::new(StubPlatform::new());
    let mut coord = fast_coordinator(&stub);
    coord.config.join_timeout = Duration::from_millis(50);
    let (cb, events) = recording_callback();
    coord.set_ui_callback(cb);

    assert!(coord.start_routine("1.1".into(), Box::new(IgnoreStop(Duration::from_millis(400)))));
    let begin = Instant::now();
    assert!(coord.stop_automation("1.1"));
    assert!(begin.elapsed() < Duration::from_millis(300));

    // The worker is still sleeping, so the one completion on record is
    // the coordinator's unconditional hand-back.
    assert_eq!(completions_for(&events, "1.1"), 1);
    assert_eq!(coord.status().active_count, 0);

    // Let the abandoned worker drain before the stub goes away.
    assert!(wait_for(Duration::from_secs(2), || {
        completions_for(&events, "1.1") == 2
    }));
}

#[test]
fn finished_sessions_are_pruned_lazily() {
    let stub = Arc::new(StubPlatform::new());
    let coord = fast_coordinator(&stub);
    let (cb, events) = recording_callback();
    coord.set_ui_callback(cb);

    assert!(coord.start_routine("1.1".into(), Box::new(ExitQuick)));
    assert!(wait_for(Duration::from_secs(2), || {
        coord.status().active_count == 0
    }));

    // The worker's own exit fired the completion; a later stop finds
    // nothing and fires nothing further.
    assert_eq!(completions_for(&events, "1.1"), 1);
    assert!(!coord.stop_automation("1.1"));
    assert_eq!(completions_for(&events, "1.1"), 1);
}
