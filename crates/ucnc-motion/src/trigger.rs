//! Trigger Control: turns debounced limit/control pin masks into
//! [`ExecState`] flag transitions.
//!
//! The debouncing itself (raw pin sampling, settle timers) lives with the
//! hardware-facing digital-input driver; this module is the pure
//! "mask changed → which flags move" logic shared by that driver and by
//! host-side simulation.

use crate::state::{AtomicExecState, ExecState};
use bitflags::bitflags;

bitflags! {
    /// Control-input pin assignment. One bit per logical signal; the
    /// hardware driver is responsible for mapping physical pins onto these.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlInput: u8 {
        const HOLD = 1 << 0;
        const DOOR = 1 << 1;
        const ABORT = 1 << 2;
    }
}

/// Edge-detects limit and control pin masks and dispatches the
/// corresponding `ExecState` flag updates. One instance per MCU pin-change
/// interrupt vector (the spec allows up to four independent ports; each
/// gets its own `TriggerControl` or shares one keyed by a wider mask,
/// depending on how the hardware driver groups its ports).
#[derive(Debug, Default)]
pub struct TriggerControl {
    prev_limits: u8,
    prev_controls: u8,
}

impl TriggerControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatches a limit pin-change event. `mask` is the full debounced
    /// limit-pin state, already polarity-corrected by the driver. Returns
    /// `true` iff the mask changed from the last call (mirrors the pin
    /// ISR's own "level differs from previous" gate).
    pub fn limits_isr(&mut self, mask: u8, exec: &AtomicExecState) -> bool {
        if mask == self.prev_limits {
            return false;
        }
        self.prev_limits = mask;
        if mask != 0 {
            exec.set(ExecState::LIMITS);
        } else {
            exec.clear(ExecState::LIMITS);
        }
        true
    }

    /// Dispatches a control pin-change event (feed-hold, safety door,
    /// reset). A safety-door assertion also raises `HOLD`, since opening
    /// the door must pause motion regardless of the feed-hold input's own
    /// state. `ABORT` is deliberately latched, not cleared on release: a
    /// reset pulse is momentary and the flag must survive until
    /// `CncState::unlock` clears it explicitly.
    pub fn controls_isr(&mut self, mask: u8, exec: &AtomicExecState) -> bool {
        if mask == self.prev_controls {
            return false;
        }
        self.prev_controls = mask;
        let input = ControlInput::from_bits_truncate(mask);

        if input.contains(ControlInput::HOLD) || input.contains(ControlInput::DOOR) {
            exec.set(ExecState::HOLD);
        } else {
            exec.clear(ExecState::HOLD);
        }

        if input.contains(ControlInput::DOOR) {
            exec.set(ExecState::DOOR);
        } else {
            exec.clear(ExecState::DOOR);
        }

        if input.contains(ControlInput::ABORT) {
            exec.set(ExecState::ABORT);
        }

        true
    }
}
