//! [`SimWorld`]: one type implementing all four non-MCU collaborator
//! traits over an in-memory machine model, the way `ucnc-motion`'s own
//! `#[cfg(test)]` `MockMachine` does, but promoted to a reusable,
//! externally-drivable harness instead of a test-only fixture.
//!
//! Hardware events (a limit switch closing, a probe making contact, an
//! event-pump failure) have no physical simulation here — tests and the
//! demo binary call the `trigger_*`/`set_*` setters directly to assert
//! them, the same way a bench operator would trip a switch by hand.

use ucnc_motion::block::{Position, StepPosition, AXIS_COUNT};
use ucnc_motion::error::AlarmCode;
use ucnc_motion::hal::{CncState, Io, Kinematics, Settings};
use ucnc_motion::kinematics::CartesianKinematics;
use ucnc_motion::state::ExecState;

use crate::settings::SimSettings;

/// An in-memory machine: Cartesian kinematics over `settings`, a bitflag
/// execution state, and directly-settable limit/probe lines.
pub struct SimWorld {
    pub settings: SimSettings,
    kin: CartesianKinematics,
    exec: ExecState,
    limits: u8,
    homing_filter: u8,
    probe: bool,
    probe_enabled: bool,
    within_bounds: bool,
    /// When `Some(0)`, the next `doevents` call returns `false` (a fatal
    /// condition) instead of ticking normally; used to simulate an abort
    /// arriving mid-wait. Decremented on every call above zero.
    doevents_fail_in: Option<u32>,
    doevents_calls: u32,
    /// Limit mask to apply at a specific future `doevents` call count, the
    /// way a real event pump would observe a switch closing mid-poll.
    scripted_limit_events: std::vec::Vec<(u32, u8)>,
}

impl SimWorld {
    pub fn new(settings: SimSettings) -> Self {
        let kin = CartesianKinematics::new(settings.steps_per_mm);
        Self {
            settings,
            kin,
            exec: ExecState::empty(),
            limits: 0,
            homing_filter: 0,
            probe: false,
            probe_enabled: false,
            within_bounds: true,
            doevents_fail_in: None,
            doevents_calls: 0,
            scripted_limit_events: std::vec::Vec::new(),
        }
    }

    /// Sets the raw limit-switch mask the next `get_limits()` call
    /// observes, e.g. `1 << axis` to simulate that axis's switch closing.
    pub fn set_limits_triggered(&mut self, mask: u8) {
        self.limits = mask;
    }

    pub fn homing_limits_filter(&self) -> u8 {
        self.homing_filter
    }

    /// Simulates probe contact: the next `get_probe()` call (and any
    /// subsequent one, until `clear_probe`) returns `true`.
    pub fn trigger_probe(&mut self) {
        self.probe = true;
    }

    pub fn clear_probe(&mut self) {
        self.probe = false;
    }

    pub fn probe_is_enabled(&self) -> bool {
        self.probe_enabled
    }

    /// Forces `check_boundaries` to return `false` regardless of the
    /// geometric check, simulating a configuration fault independent of
    /// the commanded coordinate.
    pub fn force_out_of_bounds(&mut self, out_of_bounds: bool) {
        self.within_bounds = !out_of_bounds;
    }

    /// Arranges for the `n`th future `doevents` call (0 = the very next
    /// one) to report a fatal condition, simulating e.g. an unrecoverable
    /// reset mid-wait.
    pub fn fail_doevents_after(&mut self, n: u32) {
        self.doevents_fail_in = Some(n);
    }

    /// Schedules `set_limits_triggered(mask)` to happen as a side effect of
    /// the `call_index`-th future call to `doevents` (0 = the very next
    /// one), simulating a switch closing exactly when a homing wait loop
    /// polls it rather than before the loop starts.
    pub fn script_limit_event(&mut self, call_index: u32, mask: u8) {
        self.scripted_limit_events.push((call_index, mask));
    }
}

impl Kinematics for SimWorld {
    fn apply_transform(&self, pos: &mut Position) {
        self.kin.apply_transform(pos)
    }
    fn apply_inverse(&self, pos: &Position, steps_out: &mut StepPosition) {
        self.kin.apply_inverse(pos, steps_out)
    }
    fn apply_forward(&self, steps: &StepPosition, pos_out: &mut Position) {
        self.kin.apply_forward(steps, pos_out)
    }
    fn apply_reverse_transform(&self, pos: &mut Position) {
        self.kin.apply_reverse_transform(pos)
    }
}

impl Settings for SimWorld {
    fn backlash_steps(&self) -> [u32; ucnc_motion::block::STEPPER_COUNT] {
        self.settings.backlash_steps()
    }
    fn max_distance(&self) -> [f32; AXIS_COUNT] {
        self.settings.max_distance()
    }
    fn homing_fast_feed_rate(&self) -> f32 {
        self.settings.homing_fast_feed_rate()
    }
    fn homing_slow_feed_rate(&self) -> f32 {
        self.settings.homing_slow_feed_rate()
    }
    fn homing_offset(&self) -> f32 {
        self.settings.homing_offset()
    }
    fn homing_dir_invert_mask(&self) -> u8 {
        self.settings.homing_dir_invert_mask()
    }
    fn limits_invert_mask(&self) -> u8 {
        self.settings.limits_invert_mask()
    }
    fn set_limits_invert_mask(&mut self, mask: u8) {
        self.settings.set_limits_invert_mask(mask)
    }
    fn arc_tolerance(&self) -> f32 {
        self.settings.arc_tolerance()
    }
    fn junction_deviation(&self) -> f32 {
        self.settings.junction_deviation()
    }
    fn acceleration(&self) -> [f32; AXIS_COUNT] {
        self.settings.acceleration()
    }
    fn max_feed_rate(&self) -> [f32; AXIS_COUNT] {
        self.settings.max_feed_rate()
    }
}

impl Io for SimWorld {
    fn check_boundaries(&self, pos: &Position) -> bool {
        if !self.within_bounds {
            return false;
        }
        let max = self.settings.max_distance;
        pos.iter().enumerate().all(|(i, &p)| p >= 0.0 && p <= max[i])
    }
    fn get_limits(&self) -> u8 {
        self.limits
    }
    fn get_probe(&self) -> bool {
        self.probe
    }
    fn enable_probe(&mut self) {
        self.probe_enabled = true;
    }
    fn disable_probe(&mut self) {
        self.probe_enabled = false;
    }
    fn set_homing_limits_filter(&mut self, mask: u8) {
        self.homing_filter = mask;
    }
    fn probe_isr(&mut self) {}
}

impl CncState for SimWorld {
    fn get_exec_state(&self, mask: ExecState) -> bool {
        self.exec.intersects(mask)
    }
    fn set_exec_state(&mut self, mask: ExecState) {
        self.exec.insert(mask);
    }
    fn clear_exec_state(&mut self, mask: ExecState) {
        self.exec.remove(mask);
    }
    fn unlock(&mut self) {
        self.exec.remove(ExecState::ALARM | ExecState::ABORT);
    }
    fn alarm(&mut self, _code: AlarmCode) {
        self.exec.insert(ExecState::ALARM);
    }
    fn stop(&mut self) {
        self.exec.remove(ExecState::RUN | ExecState::HOLD);
    }
    fn doevents(&mut self) -> bool {
        let call_index = self.doevents_calls;
        self.doevents_calls += 1;

        self.scripted_limit_events.retain(|&(idx, mask)| {
            if idx == call_index {
                self.limits = mask;
                false
            } else {
                true
            }
        });

        match self.doevents_fail_in {
            Some(0) => {
                self.doevents_fail_in = None;
                false
            }
            Some(n) => {
                self.doevents_fail_in = Some(n - 1);
                true
            }
            None => true,
        }
    }
}
