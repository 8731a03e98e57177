use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::coordinator::SessionCoordinator;
use crate::logger;
use crate::platform::Platform;

/// Watches the emergency abort input on a dedicated thread and tears
/// every session down when it fires. The pointer is released before the
/// coordinator is told to stop, so a held button lets go even while
/// workers are still winding down.
pub struct EmergencyStopMonitor {
    platform: Arc<dyn Platform>,
    coordinator: Arc<SessionCoordinator>,
    /// How often the abort input is sampled.
    pub poll_interval: Duration,
    /// Quiet period after a triggered stop so one long press does not
    /// fire again.
    pub debounce: Duration,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EmergencyStopMonitor {
    pub fn new(platform: Arc<dyn Platform>, coordinator: Arc<SessionCoordinator>) -> Self {
        logger::register_prefix("estop", logger::COLOR_BLUE);
        Self {
            platform,
            coordinator,
            poll_interval: Duration::from_millis(100),
            debounce: Duration::from_millis(500),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the watcher thread. Starting an already-running monitor is
    /// a no-op.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let platform = Arc::clone(&self.platform);
        let coordinator = Arc::clone(&self.coordinator);
        let running = Arc::clone(&self.running);
        let poll_interval = self.poll_interval;
        let debounce = self.debounce;
        let spawned = thread::Builder::new()
            .name("emergency-stop".into())
            .spawn(move || {
                logger::info_p("estop", "watching the abort input");
                while running.load(Ordering::Acquire) {
                    if platform.abort_pressed() {
                        logger::warn_p("estop", "abort input detected, stopping every session");
                        platform.pointer_release();
                        coordinator.stop_all();
                        wait(&running, debounce);
                    } else {
                        wait(&running, poll_interval);
                    }
                }
            });
        match spawned {
            Ok(handle) => *self.worker.lock().unwrap() = Some(handle),
            Err(err) => {
                self.running.store(false, Ordering::Release);
                logger::error_p("estop", &format!("failed to spawn the watcher: {}", err));
            }
        }
    }

    /// Stop the watcher and wait for it to exit. Safe to call from the
    /// watcher thread itself; the self-join is skipped in that case.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.worker.lock().unwrap().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for EmergencyStopMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

// Sleep in short slices so a stop request is seen promptly.
fn wait(running: &AtomicBool, duration: Duration) {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::Acquire) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buttons::ButtonClassifier;
    use crate::coordinator::CoordinatorConfig;
    use crate::error::ConfigError;
    use crate::executor::{ActionExecutor, ExecutorConfig};
    use crate::platform::stub::StubPlatform;
    use crate::session::{Routine, SessionCtl};

    struct Park;

    impl Routine for Park {
        fn run(&mut self, ctl: &SessionCtl) -> Result<(), ConfigError> {
            while ctl.should_continue() {
                if !ctl.sleep(Duration::from_millis(5)) {
                    break;
                }
            }
            Ok(())
        }
    }

    fn coordinator_for(stub: &Arc<StubPlatform>) -> Arc<SessionCoordinator> {
        let mut exec_config = ExecutorConfig::default();
        exec_config.retry_backoff = Duration::from_millis(2);
        exec_config.post_click_delay = Duration::from_millis(1);
        exec_config.poll_interval = Duration::from_millis(5);
        let exec = Arc::new(ActionExecutor::new(
            stub.clone(),
            ButtonClassifier::new(stub.clone()),
            exec_config,
        ));
        let mut config = CoordinatorConfig::default();
        config.join_timeout = Duration::from_millis(500);
        Arc::new(SessionCoordinator::new(exec, config))
    }

    fn wait_for(what: &str, mut pred: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !pred() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn abort_input_stops_every_running_session() {
        let stub = Arc::new(StubPlatform::new());
        let coordinator = coordinator_for(&stub);
        assert!(coordinator.start_routine("1.1".into(), Box::new(Park)));
        assert!(coordinator.start_routine("3.2".into(), Box::new(Park)));
        assert_eq!(coordinator.status().active_count, 2);

        let mut monitor = EmergencyStopMonitor::new(stub.clone(), coordinator.clone());
        monitor.poll_interval = Duration::from_millis(5);
        monitor.debounce = Duration::from_millis(20);
        monitor.start();

        stub.set_abort(true);
        wait_for("sessions to stop", || coordinator.status().active_count == 0);
        assert!(stub.release_count() >= 1);
        stub.set_abort(false);
        monitor.stop();
    }

    #[test]
    fn held_abort_fires_once_per_debounce_window() {
        let stub = Arc::new(StubPlatform::new());
        let coordinator = coordinator_for(&stub);
        let mut monitor = EmergencyStopMonitor::new(stub.clone(), coordinator);
        monitor.poll_interval = Duration::from_millis(5);
        monitor.debounce = Duration::from_millis(300);
        monitor.start();

        stub.set_abort(true);
        wait_for("the first trigger", || stub.release_count() == 1);
        thread::sleep(Duration::from_millis(100));
        stub.set_abort(false);
        thread::sleep(Duration::from_millis(300));
        assert_eq!(stub.release_count(), 1);
        monitor.stop();
    }

    #[test]
    fn stop_before_start_is_a_no_op() {
        let stub = Arc::new(StubPlatform::new());
        let coordinator = coordinator_for(&stub);
        let monitor = EmergencyStopMonitor::new(stub, coordinator);
        monitor.stop();
        monitor.start();
        monitor.start();
        monitor.stop();
    }
}
