//! Drives a single jog move through the whole pipeline — Motion Control,
//! planner, step generator — against the in-process simulation harness,
//! printing every timer reprogramming event the interpolator makes.
//!
//! ```text
//! cargo run -p ucnc-sim --example jog_demo -- --x 10 --y 5 --feed 1200
//! ```

use clap::Parser;
use tracing::info;
use ucnc_motion::block::MotionBlock;
use ucnc_motion::mc::MotionControl;
use ucnc_motion::planner::Planner;
use ucnc_sim::{FakeMcu, SimSettings, SimWorld};
use ucnc_stepper::{AtomicGpioPort, StepGenerator};

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value_t = 10.0)]
    x: f32,
    #[arg(long, default_value_t = 0.0)]
    y: f32,
    #[arg(long, default_value_t = 0.0)]
    z: f32,
    #[arg(long, default_value_t = 1200.0)]
    feed: f32,
}

struct NullPort;
impl AtomicGpioPort for NullPort {
    fn set_and_clear_atomic(&mut self, _set_mask: u8, _clear_mask: u8) {}
    fn write(&mut self, _mask: u8) {}
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut world = SimWorld::new(SimSettings::default());
    let mut planner = Planner::new();
    let mut mc = MotionControl::new();
    let mut mcu = FakeMcu::new();
    let mut gen = StepGenerator::new();
    let mut step_port = NullPort;
    let mut dir_port = NullPort;

    let mut block = MotionBlock {
        motion_mode: ucnc_motion::block::MotionMode::FEED,
        feed: args.feed,
        ..Default::default()
    };

    let status = mc.line(&mut world, &mut planner, [args.x, args.y, args.z], &mut block);
    info!(?status, "enqueued jog move");

    gen.run(&mut planner, &mut mcu);
    let mut ticks = 0u64;
    while !gen.is_idle() {
        gen.on_step_isr(&mut step_port, &mut dir_port);
        gen.on_step_reset_isr(&mut step_port);
        gen.run(&mut planner, &mut mcu);
        ticks += 1;
        if ticks % 50 == 0 {
            if let Some(p) = mcu.last_programmed() {
                info!(ticks, period = p.period, "interpolator tick");
            }
        }
    }

    info!(
        reprograms = mcu.reprogram_count(),
        final_position = ?planner.get_position(),
        "jog complete"
    );
}
