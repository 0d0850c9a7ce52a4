//! Concrete [`Kinematics`] implementations.
//!
//! The trait itself is an external collaborator (spec §6); these impls are
//! provided because most machines need exactly one of a small family of
//! transforms, the way the reference motion crate ships `CartesianKinematics`
//! and `CoreXYKinematics` alongside the `Kinematics` trait rather than
//! forcing every caller to write their own.

use crate::block::{Position, StepPosition, AXIS_COUNT, STEPPER_COUNT};
use crate::hal::Kinematics;

/// Steps-per-millimeter Cartesian kinematics: each stepper maps directly to
/// one Cartesian axis, no cross-axis coupling.
#[derive(Debug, Clone, Copy)]
pub struct CartesianKinematics {
    pub steps_per_mm: [f32; STEPPER_COUNT],
}

impl CartesianKinematics {
    pub fn new(steps_per_mm: [f32; STEPPER_COUNT]) -> Self {
        Self { steps_per_mm }
    }
}

impl Kinematics for CartesianKinematics {
    fn apply_transform(&self, _pos: &mut Position) {
        // No tool offsets in the base Cartesian model.
    }

    fn apply_inverse(&self, pos: &Position, steps_out: &mut StepPosition) {
        for i in 0..STEPPER_COUNT.min(AXIS_COUNT) {
            steps_out[i] = (pos[i] * self.steps_per_mm[i]).round() as i32;
        }
    }

    fn apply_forward(&self, steps: &StepPosition, pos_out: &mut Position) {
        for i in 0..AXIS_COUNT.min(STEPPER_COUNT) {
            pos_out[i] = steps[i] as f32 / self.steps_per_mm[i];
        }
    }

    fn apply_reverse_transform(&self, _pos: &mut Position) {
        // Identity: inverse of a no-op transform is itself a no-op.
    }
}
