use std::sync::Arc;

use crate::logger;
use crate::platform::Platform;
use crate::types::Rgb;

/// Classification tolerance per color channel.
pub const TOLERANCE: u8 = 5;

/// The three known appearances of one palette color.
#[derive(Debug, Clone, Copy)]
pub struct PaletteEntry {
    pub name: &'static str,
    pub default: Rgb,
    pub focus: Rgb,
    pub inactive: Rgb,
}

/// Fixed button palette of the target UI skin.
pub const PALETTE: &[PaletteEntry] = &[
    PaletteEntry {
        name: "red",
        default: Rgb::new(199, 35, 21),
        focus: Rgb::new(251, 36, 18),
        inactive: Rgb::new(57, 23, 20),
    },
    PaletteEntry {
        name: "blue",
        default: Rgb::new(21, 87, 199),
        focus: Rgb::new(18, 104, 251),
        inactive: Rgb::new(20, 34, 57),
    },
    PaletteEntry {
        name: "green",
        default: Rgb::new(17, 162, 40),
        focus: Rgb::new(15, 204, 45),
        inactive: Rgb::new(16, 46, 22),
    },
    PaletteEntry {
        name: "yellow",
        default: Rgb::new(242, 151, 0),
        focus: Rgb::new(198, 125, 0),
        inactive: Rgb::new(60, 39, 8),
    },
];

pub fn palette_entry(name: &str) -> Option<&'static PaletteEntry> {
    PALETTE.iter().find(|e| e.name == name)
}

/// One clickable target: a screen point plus its nominal palette color.
/// `custom_default` replaces the palette's default appearance where the
/// frame database overrides it per button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonSpec {
    pub x: i32,
    pub y: i32,
    pub color: String,
    pub custom_default: Option<Rgb>,
}

impl ButtonSpec {
    pub fn new(x: i32, y: i32, color: &str) -> Self {
        Self { x, y, color: color.to_string(), custom_default: None }
    }

    pub fn with_custom_default(mut self, color: Rgb) -> Self {
        self.custom_default = Some(color);
        self
    }
}

/// Result of sampling a button's pixel against its palette row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Default,
    Focus,
    Inactive,
    Unrecognized,
}

impl ButtonState {
    /// Default and Focus both count as clickable.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Default | Self::Focus)
    }
}

fn within_tolerance(actual: Rgb, expected: Rgb) -> bool {
    actual.r.abs_diff(expected.r) <= TOLERANCE
        && actual.g.abs_diff(expected.g) <= TOLERANCE
        && actual.b.abs_diff(expected.b) <= TOLERANCE
}

/// Samples the screen through the platform and classifies against the
/// fixed palette.
pub struct ButtonClassifier {
    platform: Arc<dyn Platform>,
}

impl ButtonClassifier {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        logger::register_prefix("buttons", logger::COLOR_GRAY);
        Self { platform }
    }

    /// Specs reach this pre-validated by the frame database loader; an
    /// unknown color name here is a data defect that loading already
    /// refuses, so it only gets an error line, not a crash.
    pub fn classify(&self, spec: &ButtonSpec) -> ButtonState {
        let Some(entry) = palette_entry(&spec.color) else {
            logger::error_p("buttons", &format!("unknown nominal color '{}'", spec.color));
            return ButtonState::Unrecognized;
        };
        let Some(actual) = self.platform.sample_pixel(spec.x, spec.y) else {
            return ButtonState::Unrecognized;
        };
        let default = spec.custom_default.unwrap_or(entry.default);
        if within_tolerance(actual, default) {
            ButtonState::Default
        } else if within_tolerance(actual, entry.focus) {
            ButtonState::Focus
        } else if within_tolerance(actual, entry.inactive) {
            ButtonState::Inactive
        } else {
            ButtonState::Unrecognized
        }
    }

    pub fn is_active(&self, spec: &ButtonSpec) -> bool {
        self.classify(spec).is_active()
    }

    pub fn is_inactive(&self, spec: &ButtonSpec) -> bool {
        self.classify(spec) == ButtonState::Inactive
    }
}
