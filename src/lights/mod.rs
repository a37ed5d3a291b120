use std::{fmt, time::Duration};

use serde::Serialize;

pub mod color;

pub use color::{Color, ColorSpace, Palette};

// Dimming is reported with two decimals, allow for rounding
const BRIGHTNESS_TOLERANCE: f32 = 1.0;

/// Bridge identifier of a single light
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LightId(pub String);

impl fmt::Display for LightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LightId {
    fn from(id: &str) -> Self {
        LightId(id.to_string())
    }
}

/// Snapshot of a light as reported by the bridge.
#[derive(Clone, Debug, PartialEq)]
pub struct LightState {
    pub id: LightId,
    pub name: Option<String>,
    pub on: bool,
    /// Percentage, 0 to 100. None for lights without dimming.
    pub brightness: Option<f32>,
    /// None for lights that cannot change color
    pub color: Option<Color>,
    pub reachable: bool,
}

impl LightState {
    /// Name for log lines, falls back to the id
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id.0)
    }

    /// Whether two lights look the same: on/off, brightness and color.
    pub fn same_look(&self, other: &LightState) -> bool {
        self.on == other.on
            && brightness_eq(self.brightness, other.brightness)
            && match (&self.color, &other.color) {
                (Some(a), Some(b)) => a.approx_eq(b),
                (None, None) => true,
                _ => false,
            }
    }

    /// Whether `current` shows what this captured state asked for. Fields the
    /// capture did not have are not compared, and two lights that are off
    /// only need to agree on being off.
    pub fn is_restored_in(&self, current: &LightState) -> bool {
        if self.on != current.on {
            return false;
        }
        if !self.on {
            return true;
        }
        let brightness_ok = match (self.brightness, current.brightness) {
            (Some(want), Some(have)) => (want - have).abs() <= BRIGHTNESS_TOLERANCE,
            (Some(_), None) => false,
            (None, _) => true,
        };
        let color_ok = match (&self.color, &current.color) {
            (Some(want), Some(have)) => want.approx_eq(have),
            (Some(_), None) => false,
            (None, _) => true,
        };
        brightness_ok && color_ok
    }
}

fn brightness_eq(a: Option<f32>, b: Option<f32>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() <= BRIGHTNESS_TOLERANCE,
        (None, None) => true,
        _ => false,
    }
}

/// True when every state looks like the first one
pub fn all_same_look(states: &[&LightState]) -> bool {
    match states.split_first() {
        Some((first, rest)) => rest.iter().all(|state| first.same_look(state)),
        None => true,
    }
}

/// A change to apply to one or more lights. Unset fields are left alone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LightCommand {
    pub on: Option<bool>,
    pub brightness: Option<f32>,
    pub color: Option<Color>,
    pub transition: Option<Duration>,
}

impl LightCommand {
    /// Turn on and show `color`
    pub fn show(color: Color, brightness: Option<f32>, transition: Option<Duration>) -> Self {
        Self {
            on: Some(true),
            brightness,
            color: Some(color),
            transition,
        }
    }

    /// Put a light back the way it was captured, carrying nothing the
    /// capture did not have.
    pub fn restore(captured: &LightState, transition: Option<Duration>) -> Self {
        Self {
            on: Some(captured.on),
            brightness: captured.brightness,
            color: captured.color,
            transition,
        }
    }

    /// Apply this command on top of `state`
    pub fn apply_to(&self, state: &mut LightState) {
        if let Some(on) = self.on {
            state.on = on;
        }
        if let Some(brightness) = self.brightness {
            state.brightness = Some(brightness);
        }
        if let Some(color) = self.color {
            state.color = Some(color);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum GroupKind {
    Room,
    Zone,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKind::Room => f.write_str("Room"),
            GroupKind::Zone => f.write_str("Zone"),
        }
    }
}

/// A resolved room or zone and the lights in it
#[derive(Clone, Debug, PartialEq)]
pub struct GroupTarget {
    pub id: String,
    pub name: String,
    pub kind: GroupKind,
    pub lights: Vec<LightId>,
    /// Service that commands the whole group in one request
    pub grouped_light: Option<String>,
}

impl GroupTarget {
    /// Whether `lights` names every member of this group
    pub fn covered_by(&self, lights: &[LightId]) -> bool {
        self.lights.iter().all(|member| lights.contains(member))
    }
}

/// Entry of the group listing
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    pub kind: GroupKind,
    pub light_count: usize,
}
