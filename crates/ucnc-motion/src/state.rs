//! Execution state: a process-wide bitflag word mutated from both
//! foreground and interrupt context.

use bitflags::bitflags;
use core::sync::atomic::{AtomicU16, Ordering};

bitflags! {
    /// Recognized execution states. Stored in an [`AtomicExecState`] so
    /// reads/writes are word-atomic on the target platform, per the
    /// concurrency model: each flag is set by exactly one producer (ISR or
    /// foreground) but may be cleared by either.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExecState: u16 {
        const RUN = 1 << 0;
        const HOLD = 1 << 1;
        const JOG = 1 << 2;
        const HOMING = 1 << 3;
        const ALARM = 1 << 4;
        const ABORT = 1 << 5;
        const LIMITS = 1 << 6;
        const DOOR = 1 << 7;
        const CHECKMODE = 1 << 8;
    }
}

/// An atomic, interrupt-safe holder for [`ExecState`].
///
/// Reads are tolerant of staleness within one foreground loop iteration, as
/// the concurrency model allows: a relaxed load is enough since the only
/// synchronization requirement is "observed within one event-pump
/// iteration", not a specific memory order relative to other data.
#[derive(Debug)]
pub struct AtomicExecState(AtomicU16);

impl AtomicExecState {
    pub const fn new(initial: ExecState) -> Self {
        Self(AtomicU16::new(initial.bits()))
    }

    pub fn get(&self) -> ExecState {
        ExecState::from_bits_truncate(self.0.load(Ordering::Relaxed))
    }

    pub fn contains(&self, mask: ExecState) -> bool {
        self.get().intersects(mask)
    }

    pub fn set(&self, mask: ExecState) {
        self.0.fetch_or(mask.bits(), Ordering::Relaxed);
    }

    pub fn clear(&self, mask: ExecState) {
        self.0.fetch_and(!mask.bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicExecState {
    fn default() -> Self {
        Self::new(ExecState::empty())
    }
}
