//! A `no_std` driver for debounced limit-switch and control-input pin
//! reads, dispatching level changes into the portable motion core's
//! trigger-control logic.
//!
//! Debouncing here means exactly what spec.md's Trigger Control asks for:
//! compare the freshly sampled level against the previously dispatched
//! one and drop repeats. Settle-time debouncing (ignoring short bounces at
//! the electrical level) is a board concern and belongs in the pin
//! driver/HAL layer beneath `InputPin`, not here.

#![no_std]

use embedded_hal::digital::InputPin;
use ucnc_motion::state::AtomicExecState;
use ucnc_motion::trigger::TriggerControl;

/// A fixed collection of digital inputs read into a single bitmask, one
/// bit per pin in array order. Mirrors the reference endstop driver's
/// `Endstops<N, PIN>` but folds the per-pin booleans into the `u8` mask
/// shape `TriggerControl` expects.
pub struct PinBank<const N: usize, PIN> {
    pins: [PIN; N],
}

impl<const N: usize, PIN, E> PinBank<N, PIN>
where
    PIN: InputPin<Error = E>,
{
    pub fn new(pins: [PIN; N]) -> Self {
        Self { pins }
    }

    /// Samples every pin into a bitmask, bit `i` set when pin `i` reads
    /// high.
    pub fn sample_mask(&mut self) -> Result<u8, E> {
        let mut mask = 0u8;
        for (i, pin) in self.pins.iter_mut().enumerate() {
            if pin.is_high()? {
                mask |= 1 << i;
            }
        }
        Ok(mask)
    }
}

/// Reads the limit-switch bank and the control-input bank (feed-hold,
/// safety door, abort) and dispatches debounced level changes into
/// `ExecState`. One instance typically serves the whole machine; the
/// spec allows hardware to split this across up to four independent
/// pin-change interrupt vectors, in which case each vector's subset of
/// pins samples into the same shared mask convention and calls the same
/// dispatcher.
pub struct EndstopDriver<const LIMITS: usize, const CONTROLS: usize, LPIN, CPIN> {
    limits: PinBank<LIMITS, LPIN>,
    controls: PinBank<CONTROLS, CPIN>,
    trigger: TriggerControl,
    /// XORed against every sampled limit mask before dispatch, so homing's
    /// slow back-off (which flips polarity via
    /// `Settings::set_limits_invert_mask`) is transparent to this driver.
    invert_mask: u8,
}

impl<const LIMITS: usize, const CONTROLS: usize, LPIN, CPIN, E>
    EndstopDriver<LIMITS, CONTROLS, LPIN, CPIN>
where
    LPIN: InputPin<Error = E>,
    CPIN: InputPin<Error = E>,
{
    pub fn new(limit_pins: [LPIN; LIMITS], control_pins: [CPIN; CONTROLS]) -> Self {
        Self {
            limits: PinBank::new(limit_pins),
            controls: PinBank::new(control_pins),
            trigger: TriggerControl::new(),
            invert_mask: 0,
        }
    }

    pub fn set_invert_mask(&mut self, mask: u8) {
        self.invert_mask = mask;
    }

    /// Samples the limit bank and dispatches any change. Call from the
    /// limit pin-change interrupt vector.
    pub fn poll_limits(&mut self, exec: &AtomicExecState) -> Result<bool, E> {
        let mask = self.limits.sample_mask()? ^ self.invert_mask;
        Ok(self.trigger.limits_isr(mask, exec))
    }

    /// Samples the control bank and dispatches any change. Call from the
    /// control pin-change interrupt vector.
    pub fn poll_controls(&mut self, exec: &AtomicExecState) -> Result<bool, E> {
        let mask = self.controls.sample_mask()?;
        Ok(self.trigger.controls_isr(mask, exec))
    }
}
