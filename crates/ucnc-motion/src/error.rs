//! Status and alarm codes surfaced by the motion core.
//!
//! Values are part of the contract with whatever executes G-code against
//! this core; they are intentionally plain `Copy` enums rather than
//! `thiserror`-derived types, matching the reference motion crate's
//! `no_std`-friendly error style.

/// Return code for a Motion Control operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    /// A jog move would exceed the configured travel limits.
    TravelExceeded,
    /// An event-pump wait observed abort/reset and unwound without
    /// mutating the planner.
    CriticalFail,
    /// A homing or probe sequence failed; carries the specific alarm.
    Alarm(AlarmCode),
}

impl StatusCode {
    pub fn is_ok(self) -> bool {
        matches!(self, StatusCode::Ok)
    }
}

/// Structured alarm codes, raised into [`crate::hal::CncState::alarm`] or
/// returned directly by homing/probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmCode {
    SoftLimit,
    HomingFailLimitActive,
    HomingFailApproach,
    HomingFailReset,
    ProbeFailContact,
}
