//! End-to-end pipeline test: Motion Control enqueues a move, the planner
//! plans it, and the step generator drains it into pulses, verifying the
//! final per-actuator step position the interpolator actually reached.

use ucnc_motion::block::MotionBlock;
use ucnc_motion::mc::MotionControl;
use ucnc_motion::planner::Planner;
use ucnc_sim::{FakeMcu, SimSettings, SimWorld};
use ucnc_stepper::{AtomicGpioPort, StepGenerator};

#[derive(Default)]
struct CountingPort {
    pulses: [u32; 3],
    level: u8,
}

impl AtomicGpioPort for CountingPort {
    fn set_and_clear_atomic(&mut self, set_mask: u8, clear_mask: u8) {
        for i in 0..3 {
            if set_mask & (1 << i) != 0 {
                self.pulses[i] += 1;
            }
        }
        self.level |= set_mask;
        self.level &= !clear_mask;
    }
    fn write(&mut self, mask: u8) {
        self.level = mask;
    }
}

#[test]
fn full_move_pipeline_reaches_commanded_position() {
    let mut world = SimWorld::new(SimSettings::default());
    let mut planner = Planner::new();
    let mut mc = MotionControl::new();
    let mut mcu = FakeMcu::new();
    let mut gen = StepGenerator::new();
    let mut step_port = CountingPort::default();
    let mut dir_port = CountingPort::default();

    let mut block = MotionBlock {
        motion_mode: ucnc_motion::block::MotionMode::FEED,
        feed: 6000.0,
        ..Default::default()
    };
    let status = mc.line(&mut world, &mut planner, [1.0, 0.5, 0.0], &mut block);
    assert!(status.is_ok());

    gen.run(&mut planner, &mut mcu);
    assert!(mcu.is_running());

    let mut guard = 0;
    while !gen.is_idle() {
        gen.on_step_isr(&mut step_port, &mut dir_port);
        gen.on_step_reset_isr(&mut step_port);
        gen.run(&mut planner, &mut mcu);
        guard += 1;
        assert!(guard < 10_000, "interpolator never reached idle");
    }

    assert_eq!(step_port.pulses[0], 200);
    assert_eq!(step_port.pulses[1], 100);
    assert_eq!(step_port.pulses[2], 0);
    assert!(!mcu.is_running());
    assert!(planner.buffer_is_empty());
}
