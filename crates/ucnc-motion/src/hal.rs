//! External collaborator traits (spec §6): the seams through which the
//! portable motion core reaches kinematics, settings storage, digital I/O,
//! the process-wide CNC state machine, and the MCU's timer hardware.
//!
//! None of these traits allocate. Implementations are expected to be thin
//! wrappers over concrete hardware (or, for tests, over
//! `ucnc-sim`'s mocks).

use crate::block::{Position, StepPosition, AXIS_COUNT, STEPPER_COUNT};
use crate::error::AlarmCode;
use crate::state::ExecState;

/// Forward/inverse kinematic transform between Cartesian work coordinates
/// and per-actuator step counts.
pub trait Kinematics {
    /// Mutates a work-coordinate Cartesian position in place (e.g. tool
    /// length offsets).
    fn apply_transform(&self, pos: &mut Position);
    /// Cartesian to per-actuator absolute step counts.
    fn apply_inverse(&self, pos: &Position, steps_out: &mut StepPosition);
    /// Per-actuator absolute step counts to Cartesian. Inverse of
    /// `apply_inverse`, used only by `resync_position`.
    fn apply_forward(&self, steps: &StepPosition, pos_out: &mut Position);
    /// Inverse of `apply_transform`.
    fn apply_reverse_transform(&self, pos: &mut Position);
}

/// Read-only (and, for the one mutable field, read/write) access to the
/// machine's configured limits and motion constants.
pub trait Settings {
    fn backlash_steps(&self) -> [u32; STEPPER_COUNT];
    fn max_distance(&self) -> [f32; AXIS_COUNT];
    fn homing_fast_feed_rate(&self) -> f32;
    fn homing_slow_feed_rate(&self) -> f32;
    fn homing_offset(&self) -> f32;
    fn homing_dir_invert_mask(&self) -> u8;
    fn limits_invert_mask(&self) -> u8;
    /// Homing's slow back-off pass temporarily XORs this mask so the ISR
    /// fires on limit release instead of assertion; it must be restored on
    /// every exit path.
    fn set_limits_invert_mask(&mut self, mask: u8);
    fn arc_tolerance(&self) -> f32;
    fn junction_deviation(&self) -> f32;
    fn acceleration(&self) -> [f32; AXIS_COUNT];
    fn max_feed_rate(&self) -> [f32; AXIS_COUNT];
}

/// Digital I/O: soft-limit checking, limit-switch and probe pin state.
pub trait Io {
    fn check_boundaries(&self, pos: &Position) -> bool;
    fn get_limits(&self) -> u8;
    fn get_probe(&self) -> bool;
    fn enable_probe(&mut self);
    fn disable_probe(&mut self);
    /// Restricts which limit-mask bits the homing sequencer currently
    /// cares about, so unrelated limit switches don't abort a homing pass.
    fn set_homing_limits_filter(&mut self, mask: u8);
    /// Invoked when a poll loop (rather than the probe ISR itself) detects
    /// the probe trigger, so the latch path runs exactly as it would from
    /// an interrupt.
    fn probe_isr(&mut self);
}

/// The process-wide CNC state machine: execution-state flags, alarms, and
/// the event pump every foreground wait is built on.
pub trait CncState {
    fn get_exec_state(&self, mask: ExecState) -> bool;
    fn set_exec_state(&mut self, mask: ExecState);
    fn clear_exec_state(&mut self, mask: ExecState);
    /// Clears ALARM/ABORT/HOLD style latches after an external reset.
    fn unlock(&mut self);
    fn alarm(&mut self, code: AlarmCode);
    /// Stops and flushes the interpolator/planner, clearing HOLD if active.
    fn stop(&mut self);
    /// Pumps pending events (serial I/O, safety checks, ...). Returns
    /// `false` on a fatal condition; every foreground wait loop must
    /// propagate that as `StatusCode::CriticalFail` without mutating the
    /// planner.
    fn doevents(&mut self) -> bool;
}

/// The MCU timer/interrupt surface the interpolator drives.
pub trait Mcu {
    /// Maps a step-rate in Hz to a (16-bit period, prescaler-tier) pair.
    fn freq_to_clocks(&self, freq: f32) -> (u16, u8);
    fn start_step_isr(&mut self, period: u16, prescaler: u8);
    fn change_step_isr(&mut self, period: u16, prescaler: u8);
    fn step_stop_isr(&mut self);
    fn enable_interrupts(&mut self);
    fn disable_interrupts(&mut self);
    fn delay_us(&mut self, us: u32);
}

/// Convenience bundle: most core entry points need all four non-MCU
/// collaborators at once, mirroring the single `cnc`/`g_settings`/`io_*`
/// global surface the original firmware exposes as free functions.
pub trait Machine: Kinematics + Settings + Io + CncState {}
impl<T: Kinematics + Settings + Io + CncState + ?Sized> Machine for T {}
