use std::time::Duration;

use crate::error::ConfigError;
use crate::frames::ResolvedFrame;
use crate::logger;
use crate::session::{Routine, SessionCtl};

/// Drags the power lever from its top stop to the bottom one and keeps
/// it pinned there; the plant only generates while the pointer holds
/// the lever down, so the routine parks inside the hold until told to
/// stop.
pub struct LeverRoutine {
    frame: ResolvedFrame,
}

impl LeverRoutine {
    pub fn new(frame: ResolvedFrame) -> Self {
        Self { frame }
    }
}

impl Routine for LeverRoutine {
    fn run(&mut self, ctl: &SessionCtl) -> Result<(), ConfigError> {
        let up = self.frame.interaction_point("lever_up")?;
        let down = self.frame.interaction_point("lever_down")?;
        let exec = ctl.executor();
        logger::info_p("routine", "pulling the lever and holding it down");
        while ctl.should_continue() {
            exec.hold_at(up.0, up.1, || {
                exec.drag(up, down);
                while ctl.should_continue() {
                    if !ctl.sleep(Duration::from_millis(500)) {
                        break;
                    }
                }
            });
        }
        Ok(())
    }
}
