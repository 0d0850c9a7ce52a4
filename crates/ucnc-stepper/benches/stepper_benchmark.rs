use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ucnc_motion::block::{MotionBlock, MotionMode};
use ucnc_motion::hal::{Mcu, Settings};
use ucnc_motion::planner::Planner;
use ucnc_stepper::{AtomicGpioPort, StepGenerator};

struct BenchSettings;
impl Settings for BenchSettings {
    fn backlash_steps(&self) -> [u32; 3] {
        [0; 3]
    }
    fn max_distance(&self) -> [f32; 3] {
        [500.0; 3]
    }
    fn homing_fast_feed_rate(&self) -> f32 {
        500.0
    }
    fn homing_slow_feed_rate(&self) -> f32 {
        50.0
    }
    fn homing_offset(&self) -> f32 {
        1.0
    }
    fn homing_dir_invert_mask(&self) -> u8 {
        0
    }
    fn limits_invert_mask(&self) -> u8 {
        0
    }
    fn set_limits_invert_mask(&mut self, _mask: u8) {}
    fn arc_tolerance(&self) -> f32 {
        0.002
    }
    fn junction_deviation(&self) -> f32 {
        0.01
    }
    fn acceleration(&self) -> [f32; 3] {
        [200_000.0; 3]
    }
    fn max_feed_rate(&self) -> [f32; 3] {
        [1_200_000.0; 3]
    }
}

struct BenchPort(u8);
impl AtomicGpioPort for BenchPort {
    fn set_and_clear_atomic(&mut self, set_mask: u8, clear_mask: u8) {
        self.0 |= set_mask;
        self.0 &= !clear_mask;
    }
    fn write(&mut self, mask: u8) {
        self.0 = mask;
    }
}

struct BenchMcu;
impl Mcu for BenchMcu {
    fn freq_to_clocks(&self, freq: f32) -> (u16, u8) {
        ((1_000_000.0 / freq.max(1.0)) as u16, 0)
    }
    fn start_step_isr(&mut self, _period: u16, _prescaler: u8) {}
    fn change_step_isr(&mut self, _period: u16, _prescaler: u8) {}
    fn step_stop_isr(&mut self) {}
    fn enable_interrupts(&mut self) {}
    fn disable_interrupts(&mut self) {}
    fn delay_us(&mut self, _us: u32) {}
}

fn line_block(steps: [i32; 3], feed: f32) -> MotionBlock {
    let mut b = MotionBlock {
        motion_mode: MotionMode::FEED,
        feed,
        ..Default::default()
    };
    let dist = ((steps[0] * steps[0] + steps[1] * steps[1] + steps[2] * steps[2]) as f32)
        .sqrt()
        .max(1.0);
    for (i, &s) in steps.iter().enumerate() {
        b.steps[i] = s.unsigned_abs();
        if s < 0 {
            b.dirbits |= 1 << i;
        }
        b.dir_vect[i] = s as f32 / dist;
    }
    b.recompute_step_summary();
    b
}

fn benchmark_stepper(c: &mut Criterion) {
    let settings = BenchSettings;

    c.bench_function("drive_block_to_completion", |b| {
        b.iter(|| {
            let mut planner = Planner::new();
            let block = line_block([400, 100, 0], 6000.0);
            planner
                .add_line(Some(black_box([400, 100, 0])), black_box(block), &settings)
                .unwrap();

            let mut mcu = BenchMcu;
            let mut step_port = BenchPort(0);
            let mut dir_port = BenchPort(0);
            let mut gen = StepGenerator::new();

            gen.run(&mut planner, &mut mcu);
            while !gen.is_idle() {
                gen.on_step_isr(&mut step_port, &mut dir_port);
                gen.on_step_reset_isr(&mut step_port);
                gen.run(&mut planner, &mut mcu);
            }
        })
    });
}

criterion_group!(benches, benchmark_stepper);
criterion_main!(benches);
