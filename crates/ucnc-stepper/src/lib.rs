//! Interpolator and Step Generator: turns dequeued planner blocks into
//! constant-tick-rate step pulses via a multi-axis Bresenham DDA, driven by
//! a pair of hardware timer interrupts (pulse, pulse-reset).
//!
//! The foreground-side [`StepGenerator::run`] owns the trapezoidal speed
//! profile and reprograms the timer period at segment boundaries; the two
//! ISR entry points ([`StepGenerator::on_step_isr`] and
//! [`StepGenerator::on_step_reset_isr`]) only ever touch GPIO and the DDA
//! accumulator, and are guarded against reentrancy by a `busy` flag — a
//! missed tick is preferable to a reentrant ISR.
//!
//! [`StepGenerator::stop`]/[`StepGenerator::resume`] implement feed hold:
//! `stop` doesn't touch the timer directly, it flags the block for
//! deceleration, which `run` then rides down to rest at the block's own
//! acceleration before it actually halts the timer; `resume` derives a
//! fresh trapezoid for the remaining steps from wherever the ramp stopped.

#![no_std]

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use ucnc_motion::block::{MotionBlock, MotionMode, STEPPER_COUNT};
use ucnc_motion::hal::Mcu;
use ucnc_motion::math::sqrtf;
use ucnc_motion::planner::Planner;

/// A GPIO port that supports atomic set/clear, the way STM32's BSRR (or
/// equivalent) register lets step/direction pins be written in one
/// interrupt-safe instruction.
pub trait AtomicGpioPort {
    fn set_and_clear_atomic(&mut self, set_mask: u8, clear_mask: u8);
    fn write(&mut self, mask: u8);
}

/// Fixed tick rate the interpolator programs the timer to while counting
/// down a `NOMOTION` block's dwell: there is no step vector to derive a
/// rate from, so `dwell` seconds is mapped to a tick count at this rate
/// instead.
const DWELL_TICK_HZ: f32 = 1000.0;

/// Number of ticks a `dwell` (in seconds) takes at [`DWELL_TICK_HZ`].
fn dwell_ticks(dwell_seconds: f32) -> u32 {
    ((dwell_seconds.max(0.0) * DWELL_TICK_HZ) as u32).max(1)
}

/// Per-block Bresenham state: which axes have overflowed their
/// accumulator this tick, reset only when a new block is latched.
struct Dda {
    steps: [u32; STEPPER_COUNT],
    total_steps: u32,
    dirbits: u8,
    acc: [u32; STEPPER_COUNT],
    steps_done: u32,
    /// A `NOMOTION` block (dwell, tool update): `steps` is all zero, so
    /// `tick()` never pulses anything, and `run()` programs the timer at
    /// `DWELL_TICK_HZ` instead of evaluating a speed profile against it.
    is_dwell: bool,
}

impl Dda {
    fn from_block(block: &MotionBlock) -> Self {
        let is_dwell = block.motion_mode.contains(MotionMode::NOMOTION);
        Self {
            steps: block.steps,
            total_steps: if is_dwell {
                dwell_ticks(block.dwell)
            } else {
                block.total_steps.max(1)
            },
            dirbits: block.dirbits,
            acc: [0; STEPPER_COUNT],
            steps_done: 0,
            is_dwell,
        }
    }

    /// Advances the DDA by one tick, returning the pulse mask (one bit per
    /// actuator that should step this tick) and whether the block is now
    /// fully stepped.
    fn tick(&mut self) -> (u8, bool) {
        let mut pulse_mask = 0u8;
        for i in 0..STEPPER_COUNT {
            self.acc[i] += self.steps[i];
            if self.acc[i] >= self.total_steps {
                self.acc[i] -= self.total_steps;
                pulse_mask |= 1 << i;
            }
        }
        self.steps_done += 1;
        (pulse_mask, self.steps_done >= self.total_steps)
    }
}

/// The trapezoidal speed profile derived from a block's planner-filled
/// entry/exit speeds and its acceleration cap, evaluated per step count
/// rather than precomputed into discrete segments.
struct Profile {
    accel: f32,
    entry_speed: f32,
    cruise_speed: f32,
    exit_speed: f32,
    total_steps: f32,
    decel_start_step: f32,
}

impl Profile {
    fn new(entry_speed_sqr: f32, exit_speed_sqr: f32, accel: f32, total_steps: u32) -> Self {
        let accel = accel.max(1.0);
        let total_steps_f = total_steps.max(1) as f32;
        let entry_speed = sqrtf(entry_speed_sqr.max(0.0));
        let exit_speed = sqrtf(exit_speed_sqr.max(0.0));
        // Nominal cruise ceiling: as fast as the entry/exit bounds allow
        // reaching within the block's own distance.
        let nominal_cruise_sqr = entry_speed_sqr.max(exit_speed_sqr)
            + 2.0 * accel * total_steps_f;
        let mut cruise = sqrtf(nominal_cruise_sqr).max(entry_speed).max(exit_speed);

        let mut accel_distance = (cruise * cruise - entry_speed * entry_speed) / (2.0 * accel);
        let mut decel_distance = (cruise * cruise - exit_speed * exit_speed) / (2.0 * accel);

        if accel_distance + decel_distance > total_steps_f {
            // No room for a cruise phase: a triangular profile instead.
            let reduced_cruise_sqr =
                accel * total_steps_f + (entry_speed_sqr + exit_speed_sqr) * 0.5;
            cruise = sqrtf(reduced_cruise_sqr.max(0.0)).max(entry_speed).max(exit_speed);
            accel_distance = (cruise * cruise - entry_speed * entry_speed) / (2.0 * accel);
            decel_distance = total_steps_f - accel_distance;
        }

        let decel_start_step = (total_steps_f - decel_distance).max(0.0);
        Self {
            accel,
            entry_speed,
            cruise_speed: cruise,
            exit_speed,
            total_steps: total_steps_f,
            decel_start_step,
        }
    }

    /// Target step rate (steps/sec, i.e. tick frequency) after `steps_done`
    /// ticks have already been emitted.
    fn speed_at(&self, steps_done: u32) -> f32 {
        let s = steps_done as f32;
        if s < self.decel_start_step {
            let v = sqrtf(self.entry_speed * self.entry_speed + 2.0 * self.accel * s);
            v.min(self.cruise_speed)
        } else {
            let remaining = (self.total_steps - s).max(0.0);
            let v = sqrtf(self.exit_speed * self.exit_speed + 2.0 * self.accel * remaining);
            v.min(self.cruise_speed)
        }
    }
}

/// Minimum step rate programmed into the timer; avoids a zero/near-zero
/// frequency (and the division it would require) at a block's very start
/// when `entry_speed` is exactly zero.
const MIN_STEP_RATE_HZ: f32 = 20.0;

/// How much the target rate must change, relative to the last programmed
/// rate, before `run()` bothers reprogramming the timer. Keeps the
/// foreground from touching the timer registers every single call.
const RATE_REPROGRAM_THRESHOLD: f32 = 0.02;

/// Owns the active block's DDA and speed profile, and drives the timer via
/// an [`Mcu`] collaborator.
pub struct StepGenerator {
    dda: Option<Dda>,
    profile: Option<Profile>,
    busy: AtomicBool,
    /// Pins currently held high by the step ISR; the reset ISR clears
    /// exactly these.
    held_mask: AtomicU8,
    /// Set by the step ISR when a block finishes; cleared by `run()` once
    /// it has advanced the planner head and latched the next block.
    block_done: AtomicBool,
    last_programmed_hz: AtomicU32,
    /// Set by `stop()`, cleared by `resume()`. While set, `run()` ramps the
    /// target rate down to rest at the active block's own acceleration
    /// instead of following its trapezoid toward cruise/exit speed.
    holding: bool,
    /// `(steps_done, step_rate_hz)` latched the first time `run()` observes
    /// `holding`, anchoring the deceleration ramp's starting point.
    hold_origin: Option<(u32, f32)>,
    /// `dda.steps_done` baseline the active `profile` is evaluated against.
    /// Non-zero after `resume()` installs a fresh trapezoid partway through
    /// a block.
    profile_start_step: u32,
}

impl Default for StepGenerator {
    fn default() -> Self {
        Self {
            dda: None,
            profile: None,
            busy: AtomicBool::new(false),
            held_mask: AtomicU8::new(0),
            block_done: AtomicBool::new(false),
            last_programmed_hz: AtomicU32::new(0),
            holding: false,
            hold_origin: None,
            profile_start_step: 0,
        }
    }
}

impl StepGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.dda.is_none()
    }

    pub fn is_holding(&self) -> bool {
        self.holding
    }

    /// Foreground pump. Call often: latches a new block if idle, advances
    /// the planner head if the previous block just finished, and
    /// reprograms the timer period if the computed target rate has moved
    /// enough to matter.
    pub fn run<M: Mcu>(&mut self, planner: &mut Planner, mcu: &mut M) {
        if self.block_done.swap(false, Ordering::Acquire) {
            self.dda = None;
            self.profile = None;
            self.hold_origin = None;
            self.profile_start_step = 0;
            planner.advance_head();
        }

        if self.dda.is_none() {
            if self.holding {
                return;
            }
            let Some(block) = planner.head_block().copied() else {
                mcu.step_stop_isr();
                return;
            };
            planner.lock_head();
            let dda = Dda::from_block(&block);
            // No forward-pass peek at the next block's entry speed is
            // available here, so this generator always plans to reach
            // `exit_speed = 0` at block end when it isn't immediately
            // followed by a latched successor; the planner's own backward
            // pass already guarantees the block can legally stop there.
            self.profile = if dda.is_dwell {
                None
            } else {
                Some(Profile::new(
                    block.entry_speed_sqr,
                    0.0,
                    block.acceleration,
                    block.total_steps,
                ))
            };
            self.dda = Some(dda);
            self.profile_start_step = 0;
            self.last_programmed_hz.store(0, Ordering::Relaxed);
        }

        let Some(dda) = self.dda.as_ref() else {
            return;
        };

        // A dwell/tool-update block has no physical velocity to ramp: tick
        // it at a fixed rate for its counted-down duration. A hold just
        // pauses that count rather than decelerating anything.
        if dda.is_dwell {
            if self.holding {
                mcu.step_stop_isr();
                self.last_programmed_hz.store(0, Ordering::Relaxed);
                return;
            }
            if f32::from_bits(self.last_programmed_hz.load(Ordering::Relaxed)) == 0.0 {
                let (period, prescaler) = mcu.freq_to_clocks(DWELL_TICK_HZ);
                mcu.start_step_isr(period, prescaler);
                self.last_programmed_hz
                    .store(DWELL_TICK_HZ.to_bits(), Ordering::Relaxed);
            }
            return;
        }

        let profile = self
            .profile
            .as_ref()
            .expect("a non-dwell block always carries a profile");

        let raw_target_hz = if self.holding {
            let (hold_start_step, hold_start_hz) = *self.hold_origin.get_or_insert_with(|| {
                (
                    dda.steps_done,
                    f32::from_bits(self.last_programmed_hz.load(Ordering::Relaxed))
                        .max(MIN_STEP_RATE_HZ),
                )
            });
            let steps_since_hold = dda.steps_done.saturating_sub(hold_start_step) as f32;
            let decel_sqr = hold_start_hz * hold_start_hz - 2.0 * profile.accel * steps_since_hold;
            sqrtf(decel_sqr.max(0.0))
        } else {
            profile.speed_at(dda.steps_done.saturating_sub(self.profile_start_step))
        };

        if self.holding && raw_target_hz <= MIN_STEP_RATE_HZ {
            // Ramp has reached rest: halt the timer, but keep the DDA and
            // profile alive for `resume()`.
            mcu.step_stop_isr();
            self.last_programmed_hz.store(0, Ordering::Relaxed);
            return;
        }

        let target_hz = raw_target_hz.max(MIN_STEP_RATE_HZ);
        let last_hz = f32::from_bits(self.last_programmed_hz.load(Ordering::Relaxed));
        let changed_enough = last_hz == 0.0
            || ((target_hz - last_hz).abs() / last_hz) > RATE_REPROGRAM_THRESHOLD;

        if changed_enough {
            let (period, prescaler) = mcu.freq_to_clocks(target_hz);
            if last_hz == 0.0 {
                mcu.start_step_isr(period, prescaler);
            } else {
                mcu.change_step_isr(period, prescaler);
            }
            self.last_programmed_hz
                .store(target_hz.to_bits(), Ordering::Relaxed);
        }
    }

    /// Drops the active block and resets to idle. Used on abort.
    pub fn clear<M: Mcu>(&mut self, mcu: &mut M) {
        mcu.step_stop_isr();
        self.dda = None;
        self.profile = None;
        self.block_done.store(false, Ordering::Relaxed);
        self.last_programmed_hz.store(0, Ordering::Relaxed);
        self.holding = false;
        self.hold_origin = None;
        self.profile_start_step = 0;
    }

    /// Requests a feed hold. Does not touch the timer itself: the next
    /// `run()` calls decelerate the in-flight block to rest at its own
    /// acceleration (or, for a dwell, simply pause its tick count), halting
    /// the timer only once the ramp actually reaches
    /// [`MIN_STEP_RATE_HZ`]. The DDA is untouched throughout, so `resume()`
    /// continues the same block rather than starting a new one.
    pub fn stop(&mut self) {
        self.holding = true;
    }

    /// Clears a pending or completed hold. Derives a fresh trapezoid for
    /// the block's remaining steps from whatever rate the deceleration
    /// ramp actually reached, so the block resumes accelerating back
    /// toward cruise rather than jumping straight to its pre-hold rate. A
    /// held dwell just keeps counting down from where it paused.
    pub fn resume(&mut self) {
        if !self.holding {
            return;
        }
        self.holding = false;
        if let (Some(dda), Some(profile), Some((hold_start_step, hold_start_hz))) =
            (self.dda.as_ref(), self.profile.as_ref(), self.hold_origin)
        {
            let steps_since_hold = dda.steps_done.saturating_sub(hold_start_step) as f32;
            let resumed_speed_sqr =
                (hold_start_hz * hold_start_hz - 2.0 * profile.accel * steps_since_hold).max(0.0);
            let remaining_steps = dda.total_steps.saturating_sub(dda.steps_done);
            let accel = profile.accel;
            self.profile_start_step = dda.steps_done;
            self.profile = Some(Profile::new(resumed_speed_sqr, 0.0, accel, remaining_steps));
        }
        self.hold_origin = None;
    }

    /// Compare-A interrupt: emits the step pulses this tick's Bresenham
    /// accumulators demand, latches direction bits on the block's first
    /// tick, and arms the paired reset interrupt. Re-entrancy-guarded: a
    /// call while already in flight is dropped rather than risking a
    /// partial, re-entrant GPIO write.
    pub fn on_step_isr<STEP: AtomicGpioPort, DIR: AtomicGpioPort>(
        &mut self,
        step_port: &mut STEP,
        dir_port: &mut DIR,
    ) {
        if self.busy.swap(true, Ordering::Acquire) {
            return;
        }

        if let Some(dda) = self.dda.as_mut() {
            if dda.steps_done == 0 {
                dir_port.write(dda.dirbits);
            }
            let (pulse_mask, finished) = dda.tick();
            if pulse_mask != 0 {
                step_port.set_and_clear_atomic(pulse_mask, 0);
                self.held_mask.store(pulse_mask, Ordering::Relaxed);
            }
            if finished {
                self.block_done.store(true, Ordering::Release);
            }
        }

        self.busy.store(false, Ordering::Release);
    }

    /// Compare-B interrupt, fired at half the programmed period: drives
    /// every pin the step ISR most recently set back low, enforcing the
    /// minimum pulse width.
    pub fn on_step_reset_isr<STEP: AtomicGpioPort>(&mut self, step_port: &mut STEP) {
        if self.busy.swap(true, Ordering::Acquire) {
            return;
        }
        let mask = self.held_mask.swap(0, Ordering::Relaxed);
        if mask != 0 {
            step_port.set_and_clear_atomic(0, mask);
        }
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucnc_motion::block::MotionMode;

    #[derive(Default)]
    struct MockPort {
        state: u8,
        dir: u8,
    }
    impl AtomicGpioPort for MockPort {
        fn set_and_clear_atomic(&mut self, set_mask: u8, clear_mask: u8) {
            self.state |= set_mask;
            self.state &= !clear_mask;
        }
        fn write(&mut self, mask: u8) {
            self.dir = mask;
        }
    }

    struct MockMcu {
        started: bool,
        stopped: bool,
        last_period: u16,
    }
    impl Default for MockMcu {
        fn default() -> Self {
            Self {
                started: false,
                stopped: false,
                last_period: 0,
            }
        }
    }
    impl Mcu for MockMcu {
        fn freq_to_clocks(&self, freq: f32) -> (u16, u8) {
            let period = (1_000_000.0 / freq.max(1.0)) as u16;
            (period, 0)
        }
        fn start_step_isr(&mut self, period: u16, _prescaler: u8) {
            self.started = true;
            self.stopped = false;
            self.last_period = period;
        }
        fn change_step_isr(&mut self, period: u16, _prescaler: u8) {
            self.last_period = period;
        }
        fn step_stop_isr(&mut self) {
            self.stopped = true;
        }
        fn enable_interrupts(&mut self) {}
        fn disable_interrupts(&mut self) {}
        fn delay_us(&mut self, _us: u32) {}
    }

    struct FixedSettings;
    impl ucnc_motion::hal::Settings for FixedSettings {
        fn backlash_steps(&self) -> [u32; STEPPER_COUNT] {
            [0; STEPPER_COUNT]
        }
        fn max_distance(&self) -> [f32; ucnc_motion::block::AXIS_COUNT] {
            [500.0; ucnc_motion::block::AXIS_COUNT]
        }
        fn homing_fast_feed_rate(&self) -> f32 {
            500.0
        }
        fn homing_slow_feed_rate(&self) -> f32 {
            50.0
        }
        fn homing_offset(&self) -> f32 {
            1.0
        }
        fn homing_dir_invert_mask(&self) -> u8 {
            0
        }
        fn limits_invert_mask(&self) -> u8 {
            0
        }
        fn set_limits_invert_mask(&mut self, _mask: u8) {}
        fn arc_tolerance(&self) -> f32 {
            0.002
        }
        fn junction_deviation(&self) -> f32 {
            0.01
        }
        fn acceleration(&self) -> [f32; ucnc_motion::block::AXIS_COUNT] {
            [200_000.0; ucnc_motion::block::AXIS_COUNT]
        }
        fn max_feed_rate(&self) -> [f32; ucnc_motion::block::AXIS_COUNT] {
            [1_200_000.0; ucnc_motion::block::AXIS_COUNT]
        }
    }

    fn filled_planner() -> Planner {
        let mut planner = Planner::new();
        let settings = FixedSettings;
        let mut block = MotionBlock {
            motion_mode: MotionMode::FEED,
            feed: 6000.0,
            ..Default::default()
        };
        block.steps = [200, 100, 0];
        block.dir_vect = [1.0, 0.5, 0.0];
        block.recompute_step_summary();
        planner.add_line(Some([200, 100, 0]), block, &settings).unwrap();
        planner
    }

    #[test]
    fn run_latches_head_and_starts_timer() {
        let mut planner = filled_planner();
        let mut mcu = MockMcu::default();
        let mut gen = StepGenerator::new();
        assert!(gen.is_idle());
        gen.run(&mut planner, &mut mcu);
        assert!(!gen.is_idle());
        assert!(mcu.started);
    }

    #[test]
    fn step_isr_pulses_dominant_axis_every_tick() {
        let mut planner = filled_planner();
        let mut mcu = MockMcu::default();
        let mut gen = StepGenerator::new();
        gen.run(&mut planner, &mut mcu);

        let mut step_port = MockPort::default();
        let mut dir_port = MockPort::default();
        gen.on_step_isr(&mut step_port, &mut dir_port);
        assert_eq!(step_port.state & 0b001, 0b001);
    }

    #[test]
    fn reentrant_isr_call_is_dropped() {
        let mut planner = filled_planner();
        let mut mcu = MockMcu::default();
        let mut gen = StepGenerator::new();
        gen.run(&mut planner, &mut mcu);
        gen.busy.store(true, Ordering::Relaxed);

        let mut step_port = MockPort::default();
        let mut dir_port = MockPort::default();
        gen.on_step_isr(&mut step_port, &mut dir_port);
        // Nothing happened: busy guard dropped the call.
        assert_eq!(step_port.state, 0);
    }

    #[test]
    fn block_completion_advances_planner_head_on_next_run() {
        let mut planner = filled_planner();
        let mut mcu = MockMcu::default();
        let mut gen = StepGenerator::new();
        gen.run(&mut planner, &mut mcu);

        let mut step_port = MockPort::default();
        let mut dir_port = MockPort::default();
        for _ in 0..200 {
            gen.on_step_isr(&mut step_port, &mut dir_port);
        }
        assert!(gen.block_done.load(Ordering::Relaxed));

        gen.run(&mut planner, &mut mcu);
        assert!(planner.buffer_is_empty());
    }

    #[test]
    fn clear_stops_timer_and_drops_state() {
        let mut planner = filled_planner();
        let mut mcu = MockMcu::default();
        let mut gen = StepGenerator::new();
        gen.run(&mut planner, &mut mcu);
        gen.clear(&mut mcu);
        assert!(mcu.stopped);
        assert!(gen.is_idle());
    }

    fn dwell_planner(dwell_seconds: f32) -> Planner {
        let mut planner = Planner::new();
        let settings = FixedSettings;
        let block = MotionBlock {
            motion_mode: MotionMode::NOMOTION,
            dwell: dwell_seconds,
            ..Default::default()
        };
        planner.add_line(None, block, &settings).unwrap();
        planner
    }

    #[test]
    fn dwell_block_ticks_without_pulsing_then_finishes() {
        let mut planner = dwell_planner(0.005); // 5 ticks at DWELL_TICK_HZ
        let mut mcu = MockMcu::default();
        let mut gen = StepGenerator::new();
        gen.run(&mut planner, &mut mcu);
        assert!(mcu.started);

        let mut step_port = MockPort::default();
        let mut dir_port = MockPort::default();
        for _ in 0..5 {
            gen.on_step_isr(&mut step_port, &mut dir_port);
        }
        assert_eq!(step_port.state, 0, "a dwell must never pulse a step pin");
        assert!(gen.block_done.load(Ordering::Relaxed));

        gen.run(&mut planner, &mut mcu);
        assert!(planner.buffer_is_empty());
    }

    #[test]
    fn hold_decelerates_to_rest_then_resume_finishes_the_block() {
        let mut planner = filled_planner();
        let mut mcu = MockMcu::default();
        let mut gen = StepGenerator::new();
        gen.run(&mut planner, &mut mcu);

        let mut step_port = MockPort::default();
        let mut dir_port = MockPort::default();
        for _ in 0..20 {
            gen.on_step_isr(&mut step_port, &mut dir_port);
            gen.on_step_reset_isr(&mut step_port);
            gen.run(&mut planner, &mut mcu);
        }

        gen.stop();
        assert!(gen.is_holding());

        let mut guard = 0;
        while !mcu.stopped {
            gen.on_step_isr(&mut step_port, &mut dir_port);
            gen.on_step_reset_isr(&mut step_port);
            gen.run(&mut planner, &mut mcu);
            guard += 1;
            assert!(guard < 10_000, "hold never ramped down to rest");
        }
        assert!(!gen.is_idle(), "the block's DDA must survive a hold");

        gen.resume();
        assert!(!gen.is_holding());
        gen.run(&mut planner, &mut mcu);
        assert!(!mcu.stopped, "resume must reprogram the timer");

        let mut guard = 0;
        while !gen.is_idle() {
            gen.on_step_isr(&mut step_port, &mut dir_port);
            gen.on_step_reset_isr(&mut step_port);
            gen.run(&mut planner, &mut mcu);
            guard += 1;
            assert!(guard < 10_000, "block never finished after resume");
        }
        assert!(planner.buffer_is_empty());
    }
}
