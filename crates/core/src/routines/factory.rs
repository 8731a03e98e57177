use std::time::Duration;

use super::validate_button;
use crate::error::ConfigError;
use crate::frames::ResolvedFrame;
use crate::session::{Routine, SessionCtl};

/// Hammers the single create button whenever it is lit. The button
/// dims while a widget is on the line and lights again when the next
/// one can start, so the loop just follows its state at a short
/// cadence. Runs until stopped or the time budget ends.
pub struct FactoryRoutine {
    frame: ResolvedFrame,
}

impl FactoryRoutine {
    pub fn new(frame: ResolvedFrame) -> Self {
        Self { frame }
    }
}

impl Routine for FactoryRoutine {
    fn run(&mut self, ctl: &SessionCtl) -> Result<(), ConfigError> {
        let create = self.frame.button("create")?.clone();
        if !validate_button(ctl, &self.frame, "create")? {
            return Ok(());
        }
        let exec = ctl.executor();
        while ctl.should_continue() {
            if !exec.classifier().is_inactive(&create) {
                exec.click(&create);
            }
            if !ctl.sleep(Duration::from_millis(10)) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::buttons::{palette_entry, ButtonClassifier, ButtonSpec};
    use crate::executor::{ActionExecutor, ExecutorConfig};
    use crate::platform::stub::StubPlatform;
    use crate::session::AutomationSession;
    use crate::types::StopReason;

    const CREATE: (i32, i32) = (15, 15);

    fn factory_frame() -> ResolvedFrame {
        let mut buttons = HashMap::new();
        buttons.insert("create".into(), ButtonSpec::new(CREATE.0, CREATE.1, "green"));
        ResolvedFrame {
            id: "1.3".into(),
            name: "Widget Factory".into(),
            buttons,
            interactions: HashMap::new(),
            bboxes: HashMap::new(),
        }
    }

    fn session_for(
        stub: &Arc<StubPlatform>,
        max_run_time: Duration,
    ) -> (Arc<SessionCtl>, AutomationSession) {
        let mut config = ExecutorConfig::default();
        config.retry_backoff = Duration::from_millis(2);
        config.post_click_delay = Duration::from_millis(1);
        config.poll_interval = Duration::from_millis(5);
        let exec = Arc::new(ActionExecutor::new(
            stub.clone(),
            ButtonClassifier::new(stub.clone()),
            config,
        ));
        let ctl = Arc::new(SessionCtl::new("1.3".into(), exec, None, max_run_time));
        let session = AutomationSession::new(ctl.clone());
        (ctl, session)
    }

    fn wait_stopped(session: &AutomationSession) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !session.is_finished() {
            assert!(Instant::now() < deadline, "worker did not finish in time");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn lit_create_button_is_clicked_repeatedly() {
        let stub = Arc::new(StubPlatform::new());
        stub.set_pixel(CREATE.0, CREATE.1, palette_entry("green").unwrap().default);
        let (ctl, mut session) = session_for(&stub, Duration::from_secs(60));
        assert!(session.start(Box::new(FactoryRoutine::new(factory_frame()))));
        let deadline = Instant::now() + Duration::from_secs(2);
        while stub.click_count() < 3 {
            assert!(Instant::now() < deadline, "create was not clicked enough");
            std::thread::sleep(Duration::from_millis(5));
        }
        ctl.stop(StopReason::Explicit);
        wait_stopped(&session);
        session.join_within(Duration::from_secs(1));
        assert_eq!(ctl.reason(), Some(StopReason::Explicit));
    }

    #[test]
    fn dim_create_button_is_left_alone() {
        let stub = Arc::new(StubPlatform::new());
        stub.set_pixel(CREATE.0, CREATE.1, palette_entry("green").unwrap().inactive);
        let (ctl, mut session) = session_for(&stub, Duration::from_millis(80));
        assert!(session.start(Box::new(FactoryRoutine::new(factory_frame()))));
        wait_stopped(&session);
        session.join_within(Duration::from_secs(1));
        // Inactive passes validation; the loop waits for the light and
        // the run ends on its time budget.
        assert_eq!(stub.click_count(), 0);
        assert_eq!(ctl.reason(), Some(StopReason::Timeout));
    }

    #[test]
    fn unrecognized_create_button_raises_the_failsafe() {
        let stub = Arc::new(StubPlatform::new());
        let (ctl, mut session) = session_for(&stub, Duration::from_secs(60));
        assert!(session.start(Box::new(FactoryRoutine::new(factory_frame()))));
        wait_stopped(&session);
        session.join_within(Duration::from_secs(1));
        assert_eq!(ctl.reason(), Some(StopReason::Failsafe));
        assert_eq!(stub.click_count(), 0);
    }

    #[test]
    fn missing_create_button_ends_with_an_error() {
        let stub = Arc::new(StubPlatform::new());
        let frame = ResolvedFrame {
            id: "1.3".into(),
            name: "Widget Factory".into(),
            buttons: HashMap::new(),
            interactions: HashMap::new(),
            bboxes: HashMap::new(),
        };
        let (ctl, mut session) = session_for(&stub, Duration::from_secs(60));
        assert!(session.start(Box::new(FactoryRoutine::new(frame))));
        wait_stopped(&session);
        session.join_within(Duration::from_secs(1));
        assert_eq!(ctl.reason(), Some(StopReason::Error));
    }
}
