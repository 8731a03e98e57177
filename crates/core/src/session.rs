use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::ConfigError;
use crate::executor::ActionExecutor;
use crate::logger;
use crate::types::{FrameId, SessionState, StopReason, UiCallback, UiEvent};

/// Frame-specific automation strategy run inside a session worker. The
/// routine owns its loop; the session only supplies the cooperative
/// cancellation surface.
pub trait Routine: Send {
    fn run(&mut self, ctl: &SessionCtl) -> Result<(), ConfigError>;
}

/// Shared control block between a session's worker thread and the
/// coordinator/monitor threads. All cross-thread state lives here.
pub struct SessionCtl {
    frame_id: FrameId,
    state: AtomicU8,
    stop_requested: AtomicBool,
    started: OnceLock<Instant>,
    reason: Mutex<Option<StopReason>>,
    max_run_time: Duration,
    executor: Arc<ActionExecutor>,
    ui_callback: Option<UiCallback>,
}

impl SessionCtl {
    pub fn new(
        frame_id: FrameId,
        executor: Arc<ActionExecutor>,
        ui_callback: Option<UiCallback>,
        max_run_time: Duration,
    ) -> Self {
        logger::register_prefix("session", logger::COLOR_BLUE);
        Self {
            frame_id,
            state: AtomicU8::new(SessionState::Idle as u8),
            stop_requested: AtomicBool::new(false),
            started: OnceLock::new(),
            reason: Mutex::new(None),
            max_run_time,
            executor,
            ui_callback,
        }
    }

    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn reason(&self) -> Option<StopReason> {
        *self.reason.lock().unwrap()
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// One predicate unifies explicit stop, failsafe and timeout; the
    /// routine never needs to know why it is stopping. The run-time
    /// budget is enforced here, so a routine that never reads a clock
    /// still times out.
    pub fn should_continue(&self) -> bool {
        if self.state() != SessionState::Running || self.stop_requested.load(Ordering::Acquire) {
            return false;
        }
        if let Some(started) = self.started.get() {
            if started.elapsed() > self.max_run_time {
                logger::warn_p(
                    "session",
                    &format!("frame {}: run time budget exhausted", self.frame_id),
                );
                self.stop(StopReason::Timeout);
                return false;
            }
        }
        true
    }

    /// Request a cooperative stop. Idempotent; the first caller's reason
    /// is the one reported. Releases the pointer on every call so no
    /// path can leave a button held down.
    pub fn stop(&self, reason: StopReason) {
        let first = {
            let mut slot = self.reason.lock().unwrap();
            if slot.is_none() {
                *slot = Some(reason);
                true
            } else {
                false
            }
        };
        let _ = self.state.compare_exchange(
            SessionState::Running as u8,
            SessionState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.stop_requested.store(true, Ordering::Release);
        self.executor.release_pointer();
        if first {
            logger::info_p(
                "session",
                &format!("frame {}: stopping ({})", self.frame_id, reason),
            );
        }
    }

    /// Wrong-frame detection: notify the UI with the human-readable
    /// reason, then stop.
    pub fn trigger_failsafe(&self, reason_text: &str) {
        logger::error_p(
            "session",
            &format!("frame {}: failsafe: {}", self.frame_id, reason_text),
        );
        if let Some(cb) = &self.ui_callback {
            cb(UiEvent::FailsafeStop {
                frame_id: self.frame_id.clone(),
                reason: reason_text.to_string(),
            });
        }
        self.stop(StopReason::Failsafe);
    }

    /// Sleep that keeps watching the stop flag. False when interrupted.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            if self.stop_requested.load(Ordering::Acquire) {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        true
    }

    fn finish(&self) {
        {
            let mut slot = self.reason.lock().unwrap();
            if slot.is_none() {
                *slot = Some(StopReason::Normal);
            }
        }
        self.state.store(SessionState::Stopped as u8, Ordering::Release);
        self.executor.release_pointer();
        let reason = self.reason().unwrap_or(StopReason::Normal);
        logger::info_p(
            "session",
            &format!("frame {}: stopped ({})", self.frame_id, reason),
        );
        if let Some(cb) = &self.ui_callback {
            cb(UiEvent::Completion { frame_id: self.frame_id.clone() });
        }
    }
}

/// One frame's automation: a control block plus the worker thread that
/// runs the routine.
pub struct AutomationSession {
    ctl: Arc<SessionCtl>,
    worker: Option<JoinHandle<()>>,
}

impl AutomationSession {
    pub fn new(ctl: Arc<SessionCtl>) -> Self {
        Self { ctl, worker: None }
    }

    pub fn ctl(&self) -> &Arc<SessionCtl> {
        &self.ctl
    }

    /// Spawn the worker and run the routine to completion on it. False
    /// when the session already left Idle. Whatever way the routine
    /// exits, the worker releases the pointer and fires the completion
    /// callback before it ends.
    pub fn start(&mut self, mut routine: Box<dyn Routine>) -> bool {
        let ctl = Arc::clone(&self.ctl);
        if ctl
            .state
            .compare_exchange(
                SessionState::Idle as u8,
                SessionState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            logger::warn_p(
                "session",
                &format!("frame {}: start ignored, already running", ctl.frame_id),
            );
            return false;
        }
        let _ = ctl.started.set(Instant::now());
        logger::info_p("session", &format!("frame {}: starting", ctl.frame_id));

        let spawned = thread::Builder::new()
            .name(format!("automation-{}", ctl.frame_id))
            .spawn(move || {
                match catch_unwind(AssertUnwindSafe(|| routine.run(&ctl))) {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        logger::error_p("session", &format!("frame {}: {}", ctl.frame_id, err));
                        ctl.stop(StopReason::Error);
                    }
                    Err(_) => {
                        logger::error_p(
                            "session",
                            &format!("frame {}: routine panicked", ctl.frame_id),
                        );
                        ctl.stop(StopReason::Error);
                    }
                }
                ctl.finish();
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                true
            }
            Err(err) => {
                logger::error_p(
                    "session",
                    &format!("frame {}: failed to spawn worker: {}", self.ctl.frame_id, err),
                );
                self.ctl.stop(StopReason::Error);
                self.ctl.finish();
                false
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map(|w| w.is_finished()).unwrap_or(true)
    }

    /// Wait for the worker to exit, up to `timeout`. On timeout the
    /// handle is abandoned (the thread keeps running detached) so a
    /// stuck routine cannot wedge the caller.
    pub fn join_within(&mut self, timeout: Duration) -> bool {
        let Some(worker) = self.worker.take() else {
            return true;
        };
        let deadline = Instant::now() + timeout;
        while !worker.is_finished() {
            if Instant::now() >= deadline {
                logger::warn_p(
                    "session",
                    &format!(
                        "frame {}: worker did not stop within {}ms, abandoning it",
                        self.ctl.frame_id,
                        timeout.as_millis()
                    ),
                );
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        let _ = worker.join();
        true
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
