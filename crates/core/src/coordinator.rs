use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::executor::ActionExecutor;
use crate::frames::ResolvedFrame;
use crate::logger;
use crate::routines;
use crate::session::{AutomationSession, Routine, SessionCtl};
use crate::settings::Settings;
use crate::types::{FrameId, SessionState, StopReason, UiCallback, UiEvent};

/// Timeouts the coordinator applies to the sessions it owns.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Run time budget handed to every new session.
    pub max_run_time: Duration,
    /// How long a stop waits for the worker before abandoning it.
    pub join_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_run_time: Duration::from_secs(300),
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl CoordinatorConfig {
    pub fn from_settings(s: &Settings) -> Self {
        Self {
            max_run_time: Duration::from_secs(s.max_run_time_secs),
            ..Self::default()
        }
    }
}

/// State of one registered session, as reported by [`SessionCoordinator::status`].
#[derive(Debug, Clone)]
pub struct FrameStatus {
    pub frame_id: FrameId,
    pub name: Option<&'static str>,
    pub state: SessionState,
    pub reason: Option<StopReason>,
}

#[derive(Debug, Clone)]
pub struct CoordinatorStatus {
    pub active_count: usize,
    pub frames: Vec<FrameStatus>,
}

/// Single authority over which frame has a live automation session.
/// Starts replace an existing session for the same id rather than
/// rejecting; stops always hand control back to the UI through the
/// completion callback, even when a worker refuses to die.
pub struct SessionCoordinator {
    executor: Arc<ActionExecutor>,
    config: CoordinatorConfig,
    ui_callback: Mutex<Option<UiCallback>>,
    sessions: Mutex<HashMap<FrameId, AutomationSession>>,
    // Serializes start/stop/replace; status reads bypass it.
    mutation: Mutex<()>,
}

impl SessionCoordinator {
    pub fn new(executor: Arc<ActionExecutor>, config: CoordinatorConfig) -> Self {
        logger::register_prefix("coord", logger::COLOR_BLUE);
        Self {
            executor,
            config,
            ui_callback: Mutex::new(None),
            sessions: Mutex::new(HashMap::new()),
            mutation: Mutex::new(()),
        }
    }

    /// Register the callback that receives failsafe and completion
    /// events for every session started after this point.
    pub fn set_ui_callback(&self, callback: UiCallback) {
        *self.ui_callback.lock().unwrap() = Some(callback);
    }

    /// Dispatch `frame` to its routine from the static registry. False
    /// when no routine is mapped for the id.
    pub fn start_automation(&self, frame: ResolvedFrame) -> bool {
        let Some(entry) = routines::lookup(&frame.id) else {
            logger::warn_p(
                "coord",
                &format!("no routine is mapped for frame id {}", frame.id),
            );
            return false;
        };
        let frame_id = frame.id.clone();
        logger::info_p(
            "coord",
            &format!("frame {}: dispatching to {}", frame_id, entry.name),
        );
        self.start_routine(frame_id, entry.build(frame))
    }

    /// Start `routine` for `frame_id`, stopping any session already
    /// registered under that id first.
    pub fn start_routine(&self, frame_id: FrameId, routine: Box<dyn Routine>) -> bool {
        let _guard = self.mutation.lock().unwrap();
        if self.stop_session(&frame_id) {
            logger::info_p(
                "coord",
                &format!("frame {}: previous session replaced", frame_id),
            );
        }
        let ctl = Arc::new(SessionCtl::new(
            frame_id.clone(),
            Arc::clone(&self.executor),
            self.ui_callback(),
            self.config.max_run_time,
        ));
        let mut session = AutomationSession::new(ctl);
        if !session.start(routine) {
            return false;
        }
        self.sessions.lock().unwrap().insert(frame_id, session);
        true
    }

    /// Stop the session for `frame_id` and wait for its worker. False,
    /// with no callback, when no session is registered for the id.
    pub fn stop_automation(&self, frame_id: &str) -> bool {
        let _guard = self.mutation.lock().unwrap();
        let stopped = self.stop_session(frame_id);
        if !stopped {
            logger::warn_p(
                "coord",
                &format!("no active session for frame {}", frame_id),
            );
        }
        stopped
    }

    /// Stop every registered session; the emergency monitor's entry
    /// point. All workers are signalled before any join so they wind
    /// down in parallel.
    pub fn stop_all(&self) {
        let _guard = self.mutation.lock().unwrap();
        self.prune();
        let drained: Vec<(FrameId, AutomationSession)> =
            self.sessions.lock().unwrap().drain().collect();
        if drained.is_empty() {
            return;
        }
        logger::info_p("coord", &format!("stopping {} session(s)", drained.len()));
        for (_, session) in &drained {
            session.ctl().stop(StopReason::Explicit);
        }
        for (frame_id, mut session) in drained {
            session.join_within(self.config.join_timeout);
            self.notify_completion(&frame_id);
        }
    }

    /// Snapshot for diagnostics. Finished sessions are reaped here as
    /// well, so the registry cannot accumulate dead entries between
    /// mutations.
    pub fn status(&self) -> CoordinatorStatus {
        self.prune();
        let sessions = self.sessions.lock().unwrap();
        let mut frames: Vec<FrameStatus> = sessions
            .iter()
            .map(|(id, session)| {
                let ctl = session.ctl();
                FrameStatus {
                    frame_id: id.clone(),
                    name: routines::frame_name(id),
                    state: ctl.state(),
                    reason: ctl.reason(),
                }
            })
            .collect();
        frames.sort_by(|a, b| a.frame_id.cmp(&b.frame_id));
        CoordinatorStatus { active_count: frames.len(), frames }
    }

    fn ui_callback(&self) -> Option<UiCallback> {
        self.ui_callback.lock().unwrap().clone()
    }

    fn notify_completion(&self, frame_id: &str) {
        if let Some(cb) = self.ui_callback() {
            cb(UiEvent::Completion { frame_id: frame_id.to_string() });
        }
    }

    /// Remove and stop the session for `frame_id` if one is registered.
    /// Invokes the completion callback no matter how the join went; the
    /// UI must get its controls back even when the worker is stuck.
    fn stop_session(&self, frame_id: &str) -> bool {
        self.prune();
        let removed = self.sessions.lock().unwrap().remove(frame_id);
        let Some(mut session) = removed else {
            return false;
        };
        session.ctl().stop(StopReason::Explicit);
        session.join_within(self.config.join_timeout);
        self.notify_completion(frame_id);
        true
    }

    /// Drop sessions whose worker already exited. Their completion
    /// callback fired from the worker itself.
    fn prune(&self) {
        let mut sessions = self.sessions.lock().unwrap();
        let finished: Vec<FrameId> = sessions
            .iter()
            .filter(|(_, session)| session.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        for id in finished {
            if let Some(mut session) = sessions.remove(&id) {
                session.join_within(Duration::from_millis(100));
                logger::info_p(
                    "coord",
                    &format!("frame {}: finished session removed from registry", id),
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
