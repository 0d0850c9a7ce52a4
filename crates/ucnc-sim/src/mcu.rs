//! A deterministic stand-in for `ucnc_motion::hal::Mcu`: instead of a real
//! hardware timer, it records the last programmed period/prescaler and
//! ticks forward under direct test control, so assertions about the
//! interpolator's step-rate decisions never depend on wall-clock timing.

use ucnc_motion::hal::Mcu;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgrammedTimer {
    pub period: u16,
    pub prescaler: u8,
}

#[derive(Debug, Default)]
pub struct FakeMcu {
    running: bool,
    last_programmed: Option<ProgrammedTimer>,
    /// Count of distinct `start`/`change` calls, i.e. how many times the
    /// interpolator reprogrammed the timer across a run.
    reprogram_count: u32,
    ticks: u64,
}

impl FakeMcu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn last_programmed(&self) -> Option<ProgrammedTimer> {
        self.last_programmed
    }

    pub fn reprogram_count(&self) -> u32 {
        self.reprogram_count
    }

    /// Advances the fake clock. Tests drive this directly rather than
    /// sleeping; nothing in the sim harness reads wall-clock time.
    pub fn advance(&mut self, ticks: u64) {
        self.ticks += ticks;
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.ticks
    }
}

impl Mcu for FakeMcu {
    fn freq_to_clocks(&self, freq: f32) -> (u16, u8) {
        // A single prescaler tier covering the whole range the sim cares
        // about; real MCU HALs pick from several to keep the 16-bit period
        // in range at both very low and very high step rates.
        let period = (1_000_000.0 / freq.max(1.0)).min(u16::MAX as f32) as u16;
        (period, 0)
    }

    fn start_step_isr(&mut self, period: u16, prescaler: u8) {
        self.running = true;
        self.last_programmed = Some(ProgrammedTimer { period, prescaler });
        self.reprogram_count += 1;
    }

    fn change_step_isr(&mut self, period: u16, prescaler: u8) {
        self.last_programmed = Some(ProgrammedTimer { period, prescaler });
        self.reprogram_count += 1;
    }

    fn step_stop_isr(&mut self) {
        self.running = false;
    }

    fn enable_interrupts(&mut self) {}
    fn disable_interrupts(&mut self) {}
    fn delay_us(&mut self, us: u32) {
        self.ticks += us as u64;
    }
}
