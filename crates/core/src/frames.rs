use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::buttons::{palette_entry, ButtonSpec};
use crate::error::ConfigError;
use crate::geometry::WindowGeometry;
use crate::logger;
use crate::types::{FrameId, Rect, Rgb};

#[derive(Debug, Deserialize)]
struct DbFile {
    #[serde(default)]
    frames: Vec<FrameDef>,
}

/// One frame as the editing UI stores it: grid-space buttons plus
/// optional interactions, bounding boxes and color overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameDef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub buttons: HashMap<String, Vec<Value>>,
    #[serde(default)]
    pub interactions: HashMap<String, Value>,
    #[serde(default)]
    pub bbox: HashMap<String, [f64; 4]>,
    #[serde(default)]
    pub colors: HashMap<String, [u8; 3]>,
}

/// Frame definitions indexed by id. Values stay in grid space until a
/// session resolves them against the current window geometry.
pub struct FrameDb {
    frames: HashMap<FrameId, FrameDef>,
}

impl FrameDb {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        logger::register_prefix("frames", logger::COLOR_GRAY);
        let text = fs::read_to_string(path.as_ref())?;
        let db: DbFile = serde_json::from_str(&text)?;
        let mut frames = HashMap::new();
        for frame in db.frames {
            frames.insert(frame.id.clone(), frame);
        }
        logger::info_p(
            "frames",
            &format!("loaded {} frame definitions from {}", frames.len(), path.as_ref().display()),
        );
        Ok(Self { frames })
    }

    pub fn empty() -> Self {
        Self { frames: HashMap::new() }
    }

    pub fn get(&self, id: &str) -> Option<&FrameDef> {
        self.frames.get(id)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Resolve a frame's grid-space data to screen space through the
    /// current geometry. Malformed entries are data defects and refuse
    /// resolution outright.
    pub fn resolve(&self, id: &str, geo: &WindowGeometry) -> Result<ResolvedFrame, ConfigError> {
        let def = self
            .frames
            .get(id)
            .ok_or_else(|| ConfigError::UnknownFrame(id.to_string()))?;

        let mut buttons = HashMap::new();
        for (name, vals) in &def.buttons {
            buttons.insert(name.clone(), resolve_button(def, name, vals, geo)?);
        }

        let mut interactions = HashMap::new();
        for (name, value) in &def.interactions {
            let points = parse_points(value).ok_or_else(|| ConfigError::BadInteraction {
                frame: def.id.clone(),
                name: name.clone(),
            })?;
            let resolved = points
                .into_iter()
                .map(|(gx, gy)| geo.grid_to_screen(gx, gy))
                .collect();
            interactions.insert(name.clone(), resolved);
        }

        let mut bboxes = HashMap::new();
        for (name, [x1, y1, x2, y2]) in &def.bbox {
            let (sx1, sy1) = geo.grid_to_screen(*x1, *y1);
            let (sx2, sy2) = geo.grid_to_screen(*x2, *y2);
            bboxes.insert(name.clone(), Rect::new(sx1, sy1, sx2 - sx1, sy2 - sy1));
        }

        Ok(ResolvedFrame {
            id: def.id.clone(),
            name: def.name.clone(),
            buttons,
            interactions,
            bboxes,
        })
    }
}

fn resolve_button(
    def: &FrameDef,
    name: &str,
    vals: &[Value],
    geo: &WindowGeometry,
) -> Result<ButtonSpec, ConfigError> {
    if vals.len() != 3 {
        return Err(ConfigError::ButtonArity {
            frame: def.id.clone(),
            button: name.to_string(),
            len: vals.len(),
        });
    }
    let bad = || ConfigError::BadButton { frame: def.id.clone(), button: name.to_string() };
    let gx = vals[0].as_f64().ok_or_else(bad)?;
    let gy = vals[1].as_f64().ok_or_else(bad)?;
    let color = vals[2].as_str().ok_or_else(bad)?;
    if palette_entry(color).is_none() {
        return Err(ConfigError::UnknownColor {
            frame: def.id.clone(),
            button: name.to_string(),
            color: color.to_string(),
        });
    }
    let (x, y) = geo.grid_to_screen(gx, gy);
    let mut spec = ButtonSpec::new(x, y, color);
    if let Some(rgb) = def.colors.get(name) {
        spec = spec.with_custom_default(Rgb::from(*rgb));
    }
    Ok(spec)
}

// An interaction value is either one [x, y] pair or a list of pairs.
fn parse_points(value: &Value) -> Option<Vec<(f64, f64)>> {
    let arr = value.as_array()?;
    if arr.len() == 2 && arr[0].is_number() && arr[1].is_number() {
        return Some(vec![(arr[0].as_f64()?, arr[1].as_f64()?)]);
    }
    let mut points = Vec::with_capacity(arr.len());
    for item in arr {
        let pair = item.as_array()?;
        if pair.len() != 2 {
            return None;
        }
        points.push((pair[0].as_f64()?, pair[1].as_f64()?));
    }
    Some(points)
}

/// A frame with everything translated to screen space, ready for a
/// routine to use.
#[derive(Debug)]
pub struct ResolvedFrame {
    pub id: FrameId,
    pub name: String,
    pub buttons: HashMap<String, ButtonSpec>,
    pub interactions: HashMap<String, Vec<(i32, i32)>>,
    pub bboxes: HashMap<String, Rect>,
}

impl ResolvedFrame {
    pub fn button(&self, name: &str) -> Result<&ButtonSpec, ConfigError> {
        self.buttons.get(name).ok_or_else(|| ConfigError::MissingButton {
            frame: self.id.clone(),
            button: name.to_string(),
        })
    }

    /// First point of a named interaction.
    pub fn interaction_point(&self, name: &str) -> Result<(i32, i32), ConfigError> {
        self.interactions
            .get(name)
            .and_then(|points| points.first().copied())
            .ok_or_else(|| ConfigError::MissingInteraction {
                frame: self.id.clone(),
                name: name.to_string(),
            })
    }

    /// Buttons whose name contains `needle`, sorted by name for a stable
    /// iteration order.
    pub fn buttons_containing(&self, needle: &str) -> Vec<(&str, &ButtonSpec)> {
        let mut found: Vec<_> = self
            .buttons
            .iter()
            .filter(|(name, _)| name.contains(needle))
            .map(|(name, spec)| (name.as_str(), spec))
            .collect();
        found.sort_by_key(|(name, _)| *name);
        found
    }
}
