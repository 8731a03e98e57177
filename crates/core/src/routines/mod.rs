pub mod factory;
pub mod lever;
pub mod miner;
pub mod smelter;

use crate::buttons::ButtonState;
use crate::error::ConfigError;
use crate::frames::ResolvedFrame;
use crate::logger;
use crate::session::{Routine, SessionCtl};

type RoutineFactory = fn(ResolvedFrame) -> Box<dyn Routine>;

/// One supported frame: its id, human-readable name, and the routine
/// that automates it.
pub struct RegistryEntry {
    pub id: &'static str,
    pub name: &'static str,
    factory: RoutineFactory,
}

impl RegistryEntry {
    pub fn build(&self, frame: ResolvedFrame) -> Box<dyn Routine> {
        logger::register_prefix("routine", logger::COLOR_GRAY);
        (self.factory)(frame)
    }
}

/// Frame id to routine mapping, fixed at compile time.
static REGISTRY: &[RegistryEntry] = &[
    RegistryEntry {
        id: "1.1",
        name: "Iron Mine",
        factory: |frame| Box::new(miner::MinerRoutine::new(frame)),
    },
    RegistryEntry {
        id: "1.2",
        name: "Iron Smelter",
        factory: |frame| Box::new(smelter::SmelterRoutine::new(frame)),
    },
    RegistryEntry {
        id: "1.3",
        name: "Widget Factory",
        factory: |frame| Box::new(factory::FactoryRoutine::new(frame)),
    },
    RegistryEntry {
        id: "3.2",
        name: "Oil Power Plant",
        factory: |frame| Box::new(lever::LeverRoutine::new(frame)),
    },
    RegistryEntry {
        id: "4.1",
        name: "Copper Mine",
        factory: |frame| Box::new(miner::MinerRoutine::new(frame)),
    },
    RegistryEntry {
        id: "4.2",
        name: "Copper Forge",
        factory: |frame| Box::new(smelter::SmelterRoutine::new(frame)),
    },
];

pub fn lookup(id: &str) -> Option<&'static RegistryEntry> {
    REGISTRY.iter().find(|entry| entry.id == id)
}

pub fn frame_name(id: &str) -> Option<&'static str> {
    lookup(id).map(|entry| entry.name)
}

/// Start-of-run probe: an Unrecognized button means the wrong frame is
/// showing, which is a failsafe stop rather than an error. Inactive is
/// a legitimate state here.
pub(crate) fn validate_button(
    ctl: &SessionCtl,
    frame: &ResolvedFrame,
    name: &str,
) -> Result<bool, ConfigError> {
    let spec = frame.button(name)?;
    if ctl.executor().classifier().classify(spec) == ButtonState::Unrecognized {
        ctl.trigger_failsafe(&format!("wrong frame, button '{}' is not valid", name));
        return Ok(false);
    }
    Ok(true)
}
