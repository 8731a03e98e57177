use std::time::Duration;

use super::validate_button;
use crate::buttons::ButtonSpec;
use crate::error::ConfigError;
use crate::frames::ResolvedFrame;
use crate::logger;
use crate::session::{Routine, SessionCtl};
use crate::types::StopReason;

/// Clicks every miner button each cycle and waits for the crew to go
/// idle again. When a whole pass over the miners produces nothing but
/// failures, the in-game storage is full and clicking further is
/// pointless, so the session stops with the storage-full reason.
pub struct MinerRoutine {
    frame: ResolvedFrame,
}

impl MinerRoutine {
    pub fn new(frame: ResolvedFrame) -> Self {
        Self { frame }
    }
}

impl Routine for MinerRoutine {
    fn run(&mut self, ctl: &SessionCtl) -> Result<(), ConfigError> {
        let found = self.frame.buttons_containing("miner");
        if found.is_empty() {
            return Err(ConfigError::MissingButton {
                frame: self.frame.id.clone(),
                button: "miner".into(),
            });
        }
        if !validate_button(ctl, &self.frame, found[0].0)? {
            return Ok(());
        }
        let miners: Vec<ButtonSpec> = found.iter().map(|(_, spec)| (*spec).clone()).collect();

        let exec = ctl.executor();
        while ctl.should_continue() {
            let mut failed = 0;
            for miner in &miners {
                if exec.classifier().is_active(miner) {
                    exec.click(miner);
                    ctl.sleep(Duration::from_millis(100));
                    if exec.classifier().is_active(miner) {
                        failed += 1;
                    }
                } else {
                    failed += 1;
                }
            }

            if failed >= miners.len() {
                logger::info_p("routine", "storage likely full or resources missing, stopping");
                ctl.stop(StopReason::StorageFull);
                break;
            }

            // Wait out the mining cycle, pacing on the first miner.
            while ctl.should_continue() && exec.classifier().is_inactive(&miners[0]) {
                if !ctl.sleep(Duration::from_millis(200)) {
                    return Ok(());
                }
            }
            ctl.sleep(Duration::from_millis(200));
        }
        Ok(())
    }
}
