//! A host-side, in-process simulation harness for the motion pipeline.
//!
//! Where the reference simulation crate drives a real MCU binary over a
//! Unix socket, this harness drives the portable core directly: one
//! process, no IPC, fully deterministic. [`SimWorld`] is a single type
//! implementing all four non-MCU collaborator traits over an in-memory
//! machine model; [`FakeMcu`] stands in for `ucnc_motion::hal::Mcu` with a
//! tick counter instead of a real timer, so tests can assert exactly what
//! frequency the interpolator programmed without timing sensitivity.

pub mod error;
pub mod mcu;
pub mod settings;
pub mod world;

pub use error::SimError;
pub use mcu::FakeMcu;
pub use settings::SimSettings;
pub use world::SimWorld;
