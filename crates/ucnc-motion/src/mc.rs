//! Motion Control: the single entry point everything else funnels motion
//! through before it reaches the planner.
//!
//! `line` decouples the caller's target from the rest of the pipeline,
//! applies kinematic transforms, checks soft limits, derives the step delta
//! against the planner's tracked position, and (if a direction reversed on
//! any actuator) synthesizes a backlash take-up block ahead of the real one.
//! `arc` tessellates a circular move into a sequence of `line` calls using
//! an incremental rotation matrix, periodically re-seeded from exact
//! trigonometry to bound accumulated drift.

use crate::block::{MotionBlock, MotionMode, Position, AXIS_COUNT, STEPPER_COUNT};
use crate::error::{AlarmCode, StatusCode};
use crate::hal::Machine;
use crate::math::{atan2f, cosf, fabsf, floorf, sqrtf};
use crate::planner::Planner;
use crate::state::ExecState;

const COS_TAYLOR_1: f32 = 0.166_666_67;
/// Number of incremental-rotation steps between exact-trig re-corrections.
const N_ARC_CORRECTION: u16 = 12;
const TWO_PI: f32 = 2.0 * core::f32::consts::PI;

/// Tracks the motion pipeline's decoupled state: the last commanded
/// (post-kinematics) target, the previous transformed target used for
/// direction-vector deltas, and the direction bits of the last real move
/// (for backlash-reversal detection).
pub struct MotionControl {
    checkmode: bool,
    last_target: Position,
    prev_transformed_target: Position,
    last_dirbits: u8,
}

impl Default for MotionControl {
    fn default() -> Self {
        Self {
            checkmode: false,
            last_target: [0.0; AXIS_COUNT],
            prev_transformed_target: [0.0; AXIS_COUNT],
            last_dirbits: 0,
        }
    }
}

impl MotionControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkmode(&self) -> bool {
        self.checkmode
    }

    pub fn toggle_checkmode(&mut self) -> bool {
        self.checkmode = !self.checkmode;
        self.checkmode
    }

    /// All motions funnel through here before entering the planner. Applies
    /// kinematic transforms, checks soft limits, derives the step delta
    /// against the planner's tracked position, synthesizes a backlash
    /// take-up block on any direction reversal, then enqueues the block.
    pub fn line<M: Machine>(
        &mut self,
        machine: &mut M,
        planner: &mut Planner,
        mut target: Position,
        block_data: &mut MotionBlock,
    ) -> StatusCode {
        let commanded_feed = block_data.feed;
        block_data.dirbits = 0;
        self.last_target = target;

        if !machine.get_exec_state(ExecState::JOG | ExecState::HOMING) {
            machine.apply_transform(&mut target);
        }

        if !machine.check_boundaries(&target) {
            if machine.get_exec_state(ExecState::JOG) {
                return StatusCode::TravelExceeded;
            }
            machine.alarm(AlarmCode::SoftLimit);
            return StatusCode::Ok;
        }

        if self.checkmode {
            return StatusCode::Ok;
        }

        while planner.buffer_is_full() {
            if !machine.doevents() {
                return StatusCode::CriticalFail;
            }
        }

        let mut step_new_pos = None;
        if !block_data.motion_mode.contains(MotionMode::NOMOTION) {
            let mut new_pos = [0i32; STEPPER_COUNT];
            machine.apply_inverse(&target, &mut new_pos);

            let mut inv_dist_sqr = 0.0f32;
            for i in 0..AXIS_COUNT {
                block_data.dir_vect[i] = target[i] - self.prev_transformed_target[i];
                inv_dist_sqr += block_data.dir_vect[i] * block_data.dir_vect[i];
                self.prev_transformed_target[i] = target[i];
            }
            let inv_dist = if inv_dist_sqr > 0.0 {
                1.0 / sqrtf(inv_dist_sqr)
            } else {
                0.0
            };
            for i in 0..AXIS_COUNT {
                block_data.dir_vect[i] *= inv_dist;
            }

            let prev_steps = planner.get_position();
            block_data.full_steps = 0;
            block_data.total_steps = 0;
            block_data.step_indexer = 0;
            for i in 0..STEPPER_COUNT {
                let delta = new_pos[i] - prev_steps[i];
                if delta < 0 {
                    block_data.dirbits |= 1 << i;
                }
                block_data.steps[i] = delta.unsigned_abs();
                block_data.full_steps += block_data.steps[i];
                if block_data.total_steps < block_data.steps[i] {
                    block_data.total_steps = block_data.steps[i];
                    block_data.step_indexer = i;
                }
            }

            let inverted_steps = self.last_dirbits ^ block_data.dirbits;
            if inverted_steps != 0 {
                let mut backlash = *block_data;
                backlash.steps = [0; STEPPER_COUNT];
                backlash.total_steps = 0;
                backlash.full_steps = 0;
                backlash.feed = f32::MAX;
                backlash.motion_mode = MotionMode::BACKLASH_COMPENSATION;

                let backlash_steps = machine.backlash_steps();
                for i in 0..STEPPER_COUNT {
                    if inverted_steps & (1 << i) != 0 {
                        backlash.steps[i] = backlash_steps[i];
                        backlash.full_steps += backlash.steps[i];
                        if backlash.total_steps < backlash.steps[i] {
                            backlash.total_steps = backlash.steps[i];
                            backlash.step_indexer = i;
                        }
                    }
                }

                let _ = planner.add_line(None, backlash, machine);
                while planner.buffer_is_full() {
                    if !machine.doevents() {
                        return StatusCode::CriticalFail;
                    }
                }
                self.last_dirbits = block_data.dirbits;
            }

            let inv_delta = if !block_data.motion_mode.contains(MotionMode::INVERSEFEED) {
                block_data.feed * inv_dist
            } else {
                1.0 / block_data.feed
            };
            block_data.feed = block_data.total_steps as f32 * inv_delta;
            step_new_pos = Some(new_pos);
        }

        let _ = planner.add_line(step_new_pos, *block_data, machine);
        // Restores the caller's mm/min feed: decouples the step/min rewrite
        // above from the block_data the caller may reuse across segments
        // (arc tessellation reuses one block_data for every segment).
        block_data.feed = commanded_feed;
        StatusCode::Ok
    }

    /// Tessellates a circular arc in the `axis_0`/`axis_1` plane into a
    /// sequence of `line` segments short enough to stay within
    /// `arc_tolerance` of the true circle.
    #[allow(clippy::too_many_arguments)]
    pub fn arc<M: Machine>(
        &mut self,
        machine: &mut M,
        planner: &mut Planner,
        target: Position,
        center_offset_a: f32,
        center_offset_b: f32,
        radius: f32,
        axis_0: usize,
        axis_1: usize,
        clockwise: bool,
        block_data: &mut MotionBlock,
    ) -> StatusCode {
        let mut position = self.get_position();

        let ptcenter_a = position[axis_0] + center_offset_a;
        let ptcenter_b = position[axis_1] + center_offset_b;

        let mut pt0_a = -center_offset_a;
        let mut pt0_b = -center_offset_b;
        let pt1_a = target[axis_0] - ptcenter_a;
        let pt1_b = target[axis_1] - ptcenter_b;

        let dotprod = pt0_a * pt1_a + pt0_b * pt1_b;
        let det = pt0_a * pt1_b - pt0_b * pt1_a;
        let mut arc_angle = atan2f(det, dotprod);

        if clockwise {
            if arc_angle >= 0.0 {
                arc_angle -= TWO_PI;
            }
        } else if arc_angle <= 0.0 {
            arc_angle += TWO_PI;
        }

        let radiusangle = radius * arc_angle * 0.5;
        let diameter = radius * 2.0;
        let arc_tolerance = machine.arc_tolerance();
        let segment_count =
            floorf(fabsf(radiusangle) / sqrtf(arc_tolerance * (diameter - arc_tolerance))) as u32;
        let arc_per_sgm = if segment_count != 0 {
            arc_angle / segment_count as f32
        } else {
            arc_angle
        };

        let mut increment = [0.0f32; AXIS_COUNT];
        let divisor = if segment_count != 0 {
            segment_count as f32
        } else {
            1.0
        };
        for i in 0..AXIS_COUNT {
            increment[i] = (target[i] - position[i]) / divisor;
        }
        increment[axis_0] = 0.0;
        increment[axis_1] = 0.0;

        if block_data.motion_mode.contains(MotionMode::INVERSEFEED) && segment_count != 0 {
            block_data.feed /= segment_count as f32;
        }

        let arc_per_sgm_sqr = arc_per_sgm * arc_per_sgm;
        let mut cos_per_sgm = 1.0 - COS_TAYLOR_1 * arc_per_sgm_sqr;
        let sin_per_sgm = arc_per_sgm * cos_per_sgm;
        cos_per_sgm = arc_per_sgm_sqr * (cos_per_sgm + 1.0);
        cos_per_sgm = 1.0 - cos_per_sgm * 0.25;

        let mut count: u16 = 0;
        for i in 1..segment_count {
            if count < N_ARC_CORRECTION {
                let new_pt = pt0_a * sin_per_sgm + pt0_b * cos_per_sgm;
                pt0_a = pt0_a * cos_per_sgm - pt0_b * sin_per_sgm;
                pt0_b = new_pt;
                count += 1;
            } else {
                let angle = i as f32 * arc_per_sgm;
                let precise_cos = cosf(angle);
                let mut precise_sin = sqrtf(1.0 - precise_cos * precise_cos);
                precise_sin = if angle >= 0.0 {
                    if fabsf(angle) <= core::f32::consts::PI {
                        precise_sin
                    } else {
                        -precise_sin
                    }
                } else if fabsf(angle) <= core::f32::consts::PI {
                    -precise_sin
                } else {
                    precise_sin
                };

                pt0_a = -center_offset_a * precise_cos + center_offset_b * precise_sin;
                pt0_b = -center_offset_a * precise_sin - center_offset_b * precise_cos;
                count = 0;
            }

            position[axis_0] = ptcenter_a + pt0_a;
            position[axis_1] = ptcenter_b + pt0_b;
            for k in 0..AXIS_COUNT {
                if k != axis_0 && k != axis_1 {
                    position[k] += increment[k];
                }
            }

            let status = self.line(machine, planner, position, block_data);
            if !status.is_ok() {
                return status;
            }
        }

        self.line(machine, planner, target, block_data)
    }

    /// Enqueues a zero-distance block so the interpolator spends `dwell`
    /// seconds idle before the next real move starts.
    pub fn dwell<M: Machine>(
        &mut self,
        machine: &mut M,
        planner: &mut Planner,
        mut block_data: MotionBlock,
    ) -> StatusCode {
        if self.checkmode {
            return StatusCode::Ok;
        }
        while planner.buffer_is_full() {
            if !machine.doevents() {
                return StatusCode::CriticalFail;
            }
        }
        block_data.motion_mode.insert(MotionMode::NOMOTION);
        let _ = planner.add_line(None, block_data, machine);
        StatusCode::Ok
    }

    /// Enqueues a zero-distance block carrying a tool/spindle change. Takes
    /// `block_data` by reference and deliberately leaves `NOMOTION` set on
    /// it after returning, a caller-visible side effect: callers must not
    /// reuse a block across `update_tools` and a subsequent `line` without
    /// resetting `motion_mode` themselves.
    pub fn update_tools<M: Machine>(
        &mut self,
        machine: &mut M,
        planner: &mut Planner,
        block_data: &mut MotionBlock,
    ) -> StatusCode {
        if self.checkmode {
            return StatusCode::Ok;
        }
        while planner.buffer_is_full() {
            if !machine.doevents() {
                return StatusCode::CriticalFail;
            }
        }
        block_data.motion_mode.insert(MotionMode::NOMOTION);
        let _ = planner.add_line(None, *block_data, machine);
        StatusCode::Ok
    }

    /// Homes one axis: a fast approach until the limit switch trips,
    /// followed by a slow back-off that releases it. The back-off phase
    /// temporarily XORs the limit invert mask so the same switch ISR fires
    /// on release instead of assertion; the mask is always restored before
    /// returning, on every exit path.
    pub fn home_axis<M: Machine>(
        &mut self,
        machine: &mut M,
        planner: &mut Planner,
        axis: usize,
        axis_limit: u8,
    ) -> StatusCode {
        machine.unlock();

        if machine.get_exec_state(ExecState::HOLD | ExecState::ALARM) || machine.get_limits() != 0
        {
            return StatusCode::Alarm(AlarmCode::HomingFailLimitActive);
        }

        machine.set_homing_limits_filter(axis_limit);

        let axis_mask = 1u8 << axis;
        let mut home_dist = -machine.max_distance()[axis] * 1.5;
        if machine.homing_dir_invert_mask() & axis_mask != 0 {
            home_dist = -home_dist;
        }

        self.resync_position(machine, planner);
        let mut target = self.get_position();
        target[axis] += home_dist;

        let mut block_data = MotionBlock {
            motion_mode: MotionMode::FEED,
            feed: machine.homing_fast_feed_rate(),
            ..Default::default()
        };
        block_data.steps[axis] = fabsf(home_dist) as u32;
        block_data.total_steps = block_data.steps[axis];

        machine.unlock();
        self.line(machine, planner, target, &mut block_data);
        machine.set_exec_state(ExecState::HOMING);
        loop {
            if !machine.doevents() {
                return StatusCode::CriticalFail;
            }
            if !machine.get_exec_state(ExecState::RUN) {
                break;
            }
        }

        machine.stop();
        planner.clear();

        if machine.get_exec_state(ExecState::ABORT) {
            return StatusCode::Alarm(AlarmCode::HomingFailReset);
        }

        let limits_flags = machine.get_limits();
        if limits_flags & axis_limit == 0 {
            return StatusCode::Alarm(AlarmCode::HomingFailApproach);
        }

        // Back off from the switch at the slow feed. Deliberately does not
        // resync against the planner first: the fast approach stopped well
        // short of `target`, and the back-off's own switch-release event is
        // what actually terminates this phase, not distance accuracy.
        let mut back_off_dist = machine.homing_offset() * 5.0;
        target = self.get_position();
        if machine.homing_dir_invert_mask() & axis_mask != 0 {
            back_off_dist = -back_off_dist;
        }
        target[axis] += back_off_dist;

        block_data.feed = machine.homing_slow_feed_rate();
        block_data.total_steps = fabsf(back_off_dist) as u32;
        block_data.steps[axis] = block_data.total_steps;

        machine.set_limits_invert_mask(machine.limits_invert_mask() ^ axis_limit);
        machine.unlock();
        self.line(machine, planner, target, &mut block_data);
        machine.set_exec_state(ExecState::HOMING);
        loop {
            if !machine.doevents() {
                machine.set_limits_invert_mask(machine.limits_invert_mask() ^ axis_limit);
                return StatusCode::CriticalFail;
            }
            if !machine.get_exec_state(ExecState::RUN) {
                break;
            }
        }

        machine.set_limits_invert_mask(machine.limits_invert_mask() ^ axis_limit);
        machine.stop();
        planner.clear();

        if machine.get_exec_state(ExecState::ABORT) {
            return StatusCode::Alarm(AlarmCode::HomingFailReset);
        }

        let limits_flags = machine.get_limits();
        if limits_flags & axis_limit != 0 {
            return StatusCode::Alarm(AlarmCode::HomingFailApproach);
        }

        StatusCode::Ok
    }

    /// Drives toward `target` with the probe armed, latching on contact (or
    /// the probe pin's own ISR having already latched it). Always leaves
    /// the probe disabled and the interpolator/planner flushed.
    pub fn probe<M: Machine>(
        &mut self,
        machine: &mut M,
        planner: &mut Planner,
        target: Position,
        invert_probe: bool,
        block_data: &mut MotionBlock,
    ) -> StatusCode {
        let prev_hold = machine.get_exec_state(ExecState::HOLD);
        machine.enable_probe();

        self.line(machine, planner, target, block_data);

        loop {
            if !machine.doevents() {
                return StatusCode::CriticalFail;
            }
            if machine.get_probe() {
                machine.probe_isr();
                break;
            }
            if !machine.get_exec_state(ExecState::RUN) {
                break;
            }
        }

        machine.disable_probe();
        machine.stop();
        planner.clear();
        if !prev_hold {
            machine.clear_exec_state(ExecState::HOLD);
        }

        let probe_triggered = machine.get_probe();
        let probe_failed = if !invert_probe {
            probe_triggered
        } else {
            !probe_triggered
        };
        if probe_failed {
            return StatusCode::Alarm(AlarmCode::ProbeFailContact);
        }
        StatusCode::Ok
    }

    /// The last commanded (pre-kinematics-reverse) Cartesian position.
    pub fn get_position(&self) -> Position {
        self.last_target
    }

    /// Rebuilds `last_target` from the planner's tracked step position.
    /// Needed after a planner clear leaves `last_target` pointing at a
    /// target that was never actually reached.
    pub fn resync_position<M: Machine>(&mut self, machine: &M, planner: &Planner) {
        let steps = planner.get_position();
        let mut target = [0.0f32; AXIS_COUNT];
        machine.apply_forward(&steps, &mut target);
        machine.apply_reverse_transform(&mut target);
        self.last_target = target;
        self.prev_transformed_target = target;
    }
}
