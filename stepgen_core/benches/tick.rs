use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use stepgen_core::mocks::CountingPort;
use stepgen_core::{ProfileCell, ProfileState, QFormat, TickScheduler};

fn configured(distance: i64) -> ProfileState {
    let mut s = ProfileState::new(QFormat::default());
    // set_motion_limits only fails on zero
    let _ = s.set_motion_limits(50 << 10, 5 << 10);
    s.enable();
    let _ = s.accept_move(distance);
    s
}

pub fn bench_tick(c: &mut Criterion) {
    let mut g = c.benchmark_group("tick");
    // BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p stepgen_core --bench tick
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    // whole 20 000 count move, engine only
    g.bench_function("calc_steps_full_move", |b| {
        b.iter_batched(
            || configured(20_000),
            |mut s| {
                while !s.is_idle() {
                    black_box(s.calc_steps());
                }
            },
            BatchSize::SmallInput,
        );
    });

    // one scheduler tick over a full port, including the critical section
    for &axes in &[1usize, 8] {
        g.bench_function(format!("scheduler_tick_{axes}_axes"), |b| {
            b.iter_batched(
                || {
                    let mut sched = TickScheduler::new(CountingPort::new());
                    for _ in 0..axes {
                        let _ = sched.attach(Arc::new(ProfileCell::new(configured(1_000_000))));
                    }
                    // run into cruise so every tick emits a full burst
                    for _ in 0..200 {
                        let _ = sched.tick();
                    }
                    sched
                },
                |mut sched| {
                    black_box(sched.tick().ok());
                },
                BatchSize::SmallInput,
            );
        });
    }
    g.finish();
}

criterion_group!(tick, bench_tick);
criterion_main!(tick);
