use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ucnc_motion::block::{MotionBlock, MotionMode};
use ucnc_motion::hal::Settings;
use ucnc_motion::planner::Planner;

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

fn benchmark_planner(c: &mut Criterion) {
    let settings = BenchSettings;

    c.bench_function("fill_and_drain_lookahead_buffer", |b| {
        b.iter(|| {
            let mut planner = Planner::new();
            let mut pos = [0i32, 0, 0];
            for i in 0..15 {
                pos[0] += 200;
                let dy = if i % 2 == 0 { 0 } else { 50 };
                pos[1] += dy;
                let block = line_block([200, dy, 0], 6000.0);
                planner
                    .add_line(Some(black_box(pos)), black_box(block), &settings)
                    .unwrap();
            }
            while !planner.buffer_is_empty() {
                planner.lock_head();
                planner.advance_head();
            }
        })
    });
}

criterion_group!(benches, benchmark_planner);
criterion_main!(benches);
