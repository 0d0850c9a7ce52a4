//! Serializable machine settings, loadable from a TOML fixture file.
//!
//! Settings persistence (EEPROM byte I/O) is out of scope for the motion
//! core itself; this is purely a host-side convenience so test fixtures
//! and the demo binary don't have to hand-write a `Settings` impl.

use serde::{Deserialize, Serialize};
use ucnc_motion::block::{AXIS_COUNT, STEPPER_COUNT};
use ucnc_motion::hal::Settings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimSettings {
    pub steps_per_mm: [f32; STEPPER_COUNT],
    pub backlash_steps: [u32; STEPPER_COUNT],
    pub max_distance: [f32; AXIS_COUNT],
    pub homing_fast_feed_rate: f32,
    pub homing_slow_feed_rate: f32,
    pub homing_offset: f32,
    pub homing_dir_invert_mask: u8,
    #[serde(default)]
    pub limits_invert_mask: u8,
    pub arc_tolerance: f32,
    pub junction_deviation: f32,
    pub acceleration: [f32; AXIS_COUNT],
    pub max_feed_rate: [f32; AXIS_COUNT],
}

impl Default for SimSettings {
    /// 200 steps/mm on every actuator, the figure spec.md's testable
    /// properties (§8) are written against.
    fn default() -> Self {
        Self {
            steps_per_mm: [200.0; STEPPER_COUNT],
            backlash_steps: [2; STEPPER_COUNT],
            max_distance: [300.0; AXIS_COUNT],
            homing_fast_feed_rate: 500.0,
            homing_slow_feed_rate: 50.0,
            homing_offset: 1.0,
            homing_dir_invert_mask: 0,
            limits_invert_mask: 0,
            arc_tolerance: 0.002,
            junction_deviation: 0.01,
            acceleration: [200_000.0; AXIS_COUNT],
            max_feed_rate: [1_200_000.0; AXIS_COUNT],
        }
    }
}

impl SimSettings {
    pub fn from_toml_str(text: &str) -> Result<Self, crate::SimError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::SimError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| crate::SimError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl Settings for SimSettings {
    fn backlash_steps(&self) -> [u32; STEPPER_COUNT] {
        self.backlash_steps
    }
    fn max_distance(&self) -> [f32; AXIS_COUNT] {
        self.max_distance
    }
    fn homing_fast_feed_rate(&self) -> f32 {
        self.homing_fast_feed_rate
    }
    fn homing_slow_feed_rate(&self) -> f32 {
        self.homing_slow_feed_rate
    }
    fn homing_offset(&self) -> f32 {
        self.homing_offset
    }
    fn homing_dir_invert_mask(&self) -> u8 {
        self.homing_dir_invert_mask
    }
    fn limits_invert_mask(&self) -> u8 {
        self.limits_invert_mask
    }
    fn set_limits_invert_mask(&mut self, mask: u8) {
        self.limits_invert_mask = mask;
    }
    fn arc_tolerance(&self) -> f32 {
        self.arc_tolerance
    }
    fn junction_deviation(&self) -> f32 {
        self.junction_deviation
    }
    fn acceleration(&self) -> [f32; AXIS_COUNT] {
        self.acceleration
    }
    fn max_feed_rate(&self) -> [f32; AXIS_COUNT] {
        self.max_feed_rate
    }
}
