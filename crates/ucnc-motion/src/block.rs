//! The motion data model: positions, step vectors and the planner's unit of
//! work, the [`MotionBlock`].

use bitflags::bitflags;

/// Number of Cartesian axes the kinematics model works in.
pub const AXIS_COUNT: usize = 3;
/// Number of physical stepper actuators driven by the interpolator.
pub const STEPPER_COUNT: usize = 3;

/// A Cartesian position, in millimeters, indexed by axis.
pub type Position = [f32; AXIS_COUNT];
/// An absolute per-actuator step position.
pub type StepPosition = [i32; STEPPER_COUNT];

bitflags! {
    /// Recognized motion modes for a [`MotionBlock`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MotionMode: u8 {
        const FEED = 1 << 0;
        const RAPID = 1 << 1;
        const INVERSEFEED = 1 << 2;
        const NOMOTION = 1 << 3;
        const BACKLASH_COMPENSATION = 1 << 4;
    }
}

/// The unit passed from Motion Control through the planner into the
/// interpolator.
///
/// `steps` holds absolute (unsigned) step magnitudes; `dirbits` carries the
/// sign, one bit per actuator, bit set meaning the negative direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionBlock {
    pub steps: [u32; STEPPER_COUNT],
    /// Dominant-axis step count: `max(steps[*])`.
    pub total_steps: u32,
    /// Sum of `steps[*]`, used for averaged feed conversion.
    pub full_steps: u32,
    /// Index of the dominant axis (achieves `total_steps`).
    pub step_indexer: usize,
    /// One bit per actuator; 1 = negative direction. Latched into hardware
    /// at segment start.
    pub dirbits: u8,
    /// Feed rate. In mm/min on entry to `MotionControl::line`; rewritten to
    /// steps/min before the block is enqueued in the planner.
    pub feed: f32,
    /// Unit vector of the Cartesian move, used for junction-angle math.
    pub dir_vect: [f32; AXIS_COUNT],
    pub motion_mode: MotionMode,
    /// Passthrough spindle actuation hint (RPM or raw duty, caller-defined).
    pub spindle: f32,
    /// Passthrough dwell duration in seconds, for `NOMOTION` blocks.
    pub dwell: f32,

    // --- Planner-filled fields ---
    pub entry_speed_sqr: f32,
    pub max_entry_speed_sqr: f32,
    pub acceleration: f32,
    pub rapid_feed: f32,
}

impl Default for MotionBlock {
    fn default() -> Self {
        Self {
            steps: [0; STEPPER_COUNT],
            total_steps: 0,
            full_steps: 0,
            step_indexer: 0,
            dirbits: 0,
            feed: 0.0,
            dir_vect: [0.0; AXIS_COUNT],
            motion_mode: MotionMode::empty(),
            spindle: 0.0,
            dwell: 0.0,
            entry_speed_sqr: 0.0,
            max_entry_speed_sqr: 0.0,
            acceleration: 0.0,
            rapid_feed: 0.0,
        }
    }
}

impl MotionBlock {
    /// Recomputes `total_steps`, `full_steps` and `step_indexer` from
    /// `steps`. Call after directly mutating `steps`.
    pub fn recompute_step_summary(&mut self) {
        self.total_steps = 0;
        self.full_steps = 0;
        self.step_indexer = 0;
        for (i, &s) in self.steps.iter().enumerate() {
            self.full_steps += s;
            if s > self.total_steps {
                self.total_steps = s;
                self.step_indexer = i;
            }
        }
    }
}
