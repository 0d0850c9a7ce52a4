//! The look-ahead planner: a fixed-capacity ring buffer of [`MotionBlock`]s
//! with backward-pass entry-speed planning.
//!
//! Single-producer/single-consumer by construction: [`Planner::add_line`]
//! (foreground, called from Motion Control) only ever advances `tail`;
//! [`Planner::advance_head`] (called by the interpolator as it finishes a
//! block) only ever advances `head`. No locks are required.

use crate::block::{MotionBlock, MotionMode, StepPosition, STEPPER_COUNT};
use crate::hal::Settings;
use crate::math::sqrtf;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Maximum number of blocks the look-ahead buffer can hold at once.
pub const PLANNER_BUFFER_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerError {
    /// The ring buffer has no free slot.
    BufferFull,
}

/// A fixed-capacity look-ahead queue of motion blocks.
pub struct Planner {
    blocks: [MotionBlock; PLANNER_BUFFER_CAPACITY],
    head: AtomicUsize,
    tail: AtomicUsize,
    /// The absolute step position as of the most recently enqueued block
    /// that carried a real target (i.e. `steps_abs` was `Some`). Blocks
    /// enqueued with `steps_abs = None` (backlash padding, dwells, tool
    /// updates) do not advance this.
    position: StepPosition,
    /// Set while the interpolator has latched the head block for
    /// execution; the look-ahead pass must never touch a latched block.
    head_locked: AtomicBool,
}

impl Default for Planner {
    fn default() -> Self {
        Self {
            blocks: [MotionBlock::default(); PLANNER_BUFFER_CAPACITY],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            position: [0; STEPPER_COUNT],
            head_locked: AtomicBool::new(false),
        }
    }
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(idx: usize) -> usize {
        (idx + 1) % PLANNER_BUFFER_CAPACITY
    }

    pub fn buffer_is_full(&self) -> bool {
        Self::next(self.tail.load(Ordering::Relaxed)) == self.head.load(Ordering::Relaxed)
    }

    pub fn buffer_is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed) == self.tail.load(Ordering::Relaxed)
    }

    /// The tracked absolute step position (see `position` field docs).
    pub fn get_position(&self) -> StepPosition {
        self.position
    }

    /// Directly overwrites the tracked position. Used to resynchronize
    /// after an abort leaves the planner's bookkeeping out of step with
    /// reality (the interpolator's partial progress on a cleared block).
    pub fn sync_position(&mut self, pos: StepPosition) {
        self.position = pos;
    }

    /// Empties the buffer. Only safe while the interpolator is stopped.
    pub fn clear(&mut self) {
        self.head.store(0, Ordering::Relaxed);
        self.tail.store(0, Ordering::Relaxed);
        self.head_locked.store(false, Ordering::Relaxed);
    }

    /// Inserts `block` at the tail, derives its acceleration/rapid-feed
    /// caps and junction speed against the previous block, then runs the
    /// backward look-ahead pass.
    ///
    /// `steps_abs`, when `Some`, becomes the planner's new tracked
    /// position (see the `position` field docs); pass `None` for blocks
    /// that don't represent a real commanded target (backlash padding,
    /// dwells, tool updates).
    pub fn add_line<S: Settings>(
        &mut self,
        steps_abs: Option<StepPosition>,
        mut block: MotionBlock,
        settings: &S,
    ) -> Result<(), PlannerError> {
        if self.buffer_is_full() {
            return Err(PlannerError::BufferFull);
        }

        let tail = self.tail.load(Ordering::Relaxed);
        let prev_idx = if tail == self.head.load(Ordering::Relaxed) {
            None
        } else {
            Some((tail + PLANNER_BUFFER_CAPACITY - 1) % PLANNER_BUFFER_CAPACITY)
        };

        self.derive_caps(&mut block, settings);

        let junction_speed_sqr = match prev_idx {
            Some(p) => {
                Self::junction_speed_sqr(&self.blocks[p], &block, settings.junction_deviation())
            }
            None => 0.0, // first block in the buffer: must start from rest
        };

        let v_max_sqr = Self::block_v_max_sqr(&block);
        block.max_entry_speed_sqr = if junction_speed_sqr < v_max_sqr {
            junction_speed_sqr
        } else {
            v_max_sqr
        };
        block.entry_speed_sqr = block.max_entry_speed_sqr;

        self.blocks[tail] = block;
        self.tail.store(Self::next(tail), Ordering::Relaxed);

        if let Some(pos) = steps_abs {
            self.position = pos;
        }

        self.replan_backward(tail);
        Ok(())
    }

    fn derive_caps<S: Settings>(&self, block: &mut MotionBlock, settings: &S) {
        if block.motion_mode.contains(MotionMode::NOMOTION) || block.total_steps == 0 {
            block.acceleration = 1.0;
            block.rapid_feed = f32::MAX;
            return;
        }

        let accel = settings.acceleration();
        let max_feed = settings.max_feed_rate();
        let total = block.total_steps as f32;

        let mut min_accel = f32::MAX;
        let mut min_rapid = f32::MAX;
        for (i, &s) in block.steps.iter().enumerate() {
            if s == 0 {
                continue;
            }
            let ratio = total / s as f32;
            let a = accel[i] * ratio;
            let r = max_feed[i] * ratio;
            if a < min_accel {
                min_accel = a;
            }
            if r < min_rapid {
                min_rapid = r;
            }
        }
        block.acceleration = min_accel;
        block.rapid_feed = min_rapid;
    }

    /// The block's own cruise-speed ceiling, in (steps/sec)^2.
    fn block_v_max_sqr(block: &MotionBlock) -> f32 {
        let commanded = if block.motion_mode.contains(MotionMode::RAPID) {
            block.rapid_feed
        } else {
            block.feed.min(block.rapid_feed)
        };
        let v = commanded / 60.0;
        v * v
    }

    /// Grbl-style junction-deviation speed cap from the cosine of the angle
    /// between consecutive unit direction vectors.
    fn junction_speed_sqr(prev: &MotionBlock, block: &MotionBlock, junction_deviation: f32) -> f32 {
        let mut cos_theta = 0.0f32;
        for i in 0..prev.dir_vect.len() {
            cos_theta += prev.dir_vect[i] * block.dir_vect[i];
        }
        cos_theta = cos_theta.clamp(-1.0, 1.0);

        if cos_theta > 0.999999 {
            // Colinear continuation: no junction speed limit.
            return f32::MAX;
        }

        let sine_half = sqrtf((1.0 - cos_theta) * 0.5).max(1e-6);
        let min_accel = if prev.acceleration < block.acceleration {
            prev.acceleration
        } else {
            block.acceleration
        };
        // R = junction_deviation * sin(theta/2) / (1 - sin(theta/2))
        // v_junction^2 = R * accel
        let denom = (1.0 - sine_half).max(1e-6);
        let radius = junction_deviation * sine_half / denom;
        radius * min_accel
    }

    /// Recomputes entry speeds backward from `from_idx` toward the head so
    /// every block has enough distance to reach its successor's entry
    /// speed under its own acceleration cap. Never touches a latched head.
    fn replan_backward(&mut self, from_idx: usize) {
        let mut idx = from_idx;
        let mut exit_speed_sqr = 0.0f32;
        loop {
            let head = self.head.load(Ordering::Relaxed);
            if self.head_locked.load(Ordering::Relaxed) && idx == head {
                break;
            }

            let block = &mut self.blocks[idx];
            let reachable = exit_speed_sqr + 2.0 * block.acceleration * block.total_steps as f32;
            let capped = reachable.min(block.max_entry_speed_sqr);
            block.entry_speed_sqr = capped;
            exit_speed_sqr = capped;

            if idx == head {
                break;
            }
            idx = (idx + PLANNER_BUFFER_CAPACITY - 1) % PLANNER_BUFFER_CAPACITY;
        }
    }

    // --- Interpolator-facing (single-consumer) API ---

    /// Peeks the head block without removing it.
    pub fn head_block(&self) -> Option<&MotionBlock> {
        if self.buffer_is_empty() {
            None
        } else {
            Some(&self.blocks[self.head.load(Ordering::Relaxed)])
        }
    }

    /// Marks the head block as latched for execution; the look-ahead pass
    /// will not modify it until [`Planner::advance_head`] is called.
    pub fn lock_head(&self) {
        self.head_locked.store(true, Ordering::Relaxed);
    }

    /// Completes execution of the head block and advances to the next one.
    pub fn advance_head(&mut self) {
        if self.buffer_is_empty() {
            return;
        }
        let head = self.head.load(Ordering::Relaxed);
        self.head.store(Self::next(head), Ordering::Relaxed);
        self.head_locked.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MotionMode;

    struct TestSettings;
    impl Settings for TestSettings {
        fn backlash_steps(&self) -> [u32; STEPPER_COUNT] {
            [0; STEPPER_COUNT]
        }
        fn max_distance(&self) -> [f32; crate::block::AXIS_COUNT] {
            [500.0; crate::block::AXIS_COUNT]
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
        fn acceleration(&self) -> [f32; crate::block::AXIS_COUNT] {
            [200_000.0; crate::block::AXIS_COUNT]
        }
        fn max_feed_rate(&self) -> [f32; crate::block::AXIS_COUNT] {
            [1_200_000.0; crate::block::AXIS_COUNT]
        }
    }

    fn line_block(steps: [i32; STEPPER_COUNT], feed: f32) -> MotionBlock {
        let mut b = MotionBlock::default();
        b.motion_mode = MotionMode::FEED;
        b.feed = feed;
        let mut dist_sqr = 0.0f32;
        for (i, &s) in steps.iter().enumerate() {
            b.steps[i] = s.unsigned_abs();
            if s < 0 {
                b.dirbits |= 1 << i;
            }
            dist_sqr += (s as f32) * (s as f32);
        }
        let dist = sqrtf(dist_sqr).max(1.0);
        for i in 0..STEPPER_COUNT {
            b.dir_vect[i] = steps[i] as f32 / dist;
        }
        b.recompute_step_summary();
        b
    }

    #[test]
    fn empty_buffer_reports_empty_not_full() {
        let p = Planner::new();
        assert!(p.buffer_is_empty());
        assert!(!p.buffer_is_full());
    }

    #[test]
    fn add_line_advances_tail_and_tracks_position() {
        let mut p = Planner::new();
        let settings = TestSettings;
        let block = line_block([200, 0, 0], 6000.0);
        p.add_line(Some([200, 0, 0]), block, &settings).unwrap();
        assert!(!p.buffer_is_empty());
        assert_eq!(p.get_position(), [200, 0, 0]);
    }

    #[test]
    fn steps_abs_none_leaves_position_untouched() {
        let mut p = Planner::new();
        let settings = TestSettings;
        let block = line_block([200, 0, 0], 6000.0);
        p.add_line(Some([200, 0, 0]), block, &settings).unwrap();
        let backlash = line_block([5, 0, 0], 6000.0);
        p.add_line(None, backlash, &settings).unwrap();
        assert_eq!(p.get_position(), [200, 0, 0]);
    }

    #[test]
    fn first_block_starts_from_rest() {
        let mut p = Planner::new();
        let settings = TestSettings;
        let block = line_block([200, 0, 0], 6000.0);
        p.add_line(Some([200, 0, 0]), block, &settings).unwrap();
        let head = p.head_block().unwrap();
        assert_eq!(head.entry_speed_sqr, 0.0);
    }

    #[test]
    fn full_buffer_rejects_further_inserts() {
        let mut p = Planner::new();
        let settings = TestSettings;
        for i in 0..(PLANNER_BUFFER_CAPACITY - 1) {
            let block = line_block([10, 0, 0], 6000.0);
            p.add_line(Some([10 * (i as i32 + 1), 0, 0]), block, &settings)
                .unwrap();
        }
        assert!(p.buffer_is_full());
        let overflow = line_block([10, 0, 0], 6000.0);
        assert_eq!(
            p.add_line(Some([1000, 0, 0]), overflow, &settings),
            Err(PlannerError::BufferFull)
        );
    }

    #[test]
    fn locked_head_survives_replan() {
        let mut p = Planner::new();
        let settings = TestSettings;
        let b1 = line_block([200, 0, 0], 6000.0);
        p.add_line(Some([200, 0, 0]), b1, &settings).unwrap();
        p.lock_head();
        let before = p.head_block().unwrap().entry_speed_sqr;
        let b2 = line_block([0, 200, 0], 6000.0);
        p.add_line(Some([200, 200, 0]), b2, &settings).unwrap();
        let after = p.head_block().unwrap().entry_speed_sqr;
        assert_eq!(before, after);
    }

    #[test]
    fn advance_head_unlocks_and_moves_forward() {
        let mut p = Planner::new();
        let settings = TestSettings;
        let b1 = line_block([200, 0, 0], 6000.0);
        p.add_line(Some([200, 0, 0]), b1, &settings).unwrap();
        let b2 = line_block([0, 200, 0], 6000.0);
        p.add_line(Some([200, 200, 0]), b2, &settings).unwrap();
        p.lock_head();
        p.advance_head();
        assert!(!p.buffer_is_empty());
        let head = p.head_block().unwrap();
        assert_eq!(head.steps[1], 200);
    }
}
