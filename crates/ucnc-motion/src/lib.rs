//! Portable motion core: data model, look-ahead planner and Motion Control
//! entry points.
//!
//! This crate is `no_std` by default (`std` is an opt-in feature used by
//! host-side tooling and tests). It never touches hardware directly; every
//! interaction with timers, GPIO, settings storage or the process-wide
//! state machine goes through the collaborator traits in [`hal`].

#![cfg_attr(not(feature = "std"), no_std)]

pub mod block;
pub mod error;
pub mod hal;
pub mod kinematics;
pub mod math;
pub mod mc;
pub mod planner;
pub mod state;
pub mod trigger;

pub use block::{MotionBlock, MotionMode, Position, StepPosition, AXIS_COUNT, STEPPER_COUNT};
pub use error::{AlarmCode, StatusCode};
pub use hal::{CncState, Io, Kinematics, Machine, Mcu, Settings};
pub use planner::{Planner, PlannerError, PLANNER_BUFFER_CAPACITY};
pub use state::{AtomicExecState, ExecState};
