use std::time::Duration;

use super::validate_button;
use crate::error::ConfigError;
use crate::frames::ResolvedFrame;
use crate::logger;
use crate::session::{Routine, SessionCtl};
use crate::types::StopReason;

/// Two-phase load/smelt cycle. Loading is clicked until the load button
/// stays lit, then one smelt is fired; a smelt button that stays lit
/// after its click means the output storage is full.
pub struct SmelterRoutine {
    frame: ResolvedFrame,
}

impl SmelterRoutine {
    pub fn new(frame: ResolvedFrame) -> Self {
        Self { frame }
    }
}

impl Routine for SmelterRoutine {
    fn run(&mut self, ctl: &SessionCtl) -> Result<(), ConfigError> {
        let load = self.frame.button("load")?.clone();
        let smelt = self.frame.button("smelt")?.clone();
        if !validate_button(ctl, &self.frame, "load")? {
            return Ok(());
        }

        let exec = ctl.executor();
        while ctl.should_continue() {
            if exec.classifier().is_active(&load) {
                exec.click(&load);
                ctl.sleep(Duration::from_millis(100));
                if exec.classifier().is_active(&load) {
                    exec.click(&smelt);
                    if exec.classifier().is_active(&smelt) {
                        logger::info_p(
                            "routine",
                            "storage likely full or resources missing, stopping",
                        );
                        ctl.stop(StopReason::StorageFull);
                        break;
                    }
                    while ctl.should_continue() && exec.classifier().is_inactive(&smelt) {
                        ctl.sleep(Duration::from_millis(200));
                    }
                }
            } else {
                ctl.trigger_failsafe("load button is not active, wrong frame or empty input");
                break;
            }

            while ctl.should_continue() && exec.classifier().is_inactive(&load) {
                if !ctl.sleep(Duration::from_millis(200)) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}
