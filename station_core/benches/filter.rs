use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use station_core::filter::{summarize_iqr, summarize_median};

// Load-cell counts around a base with white noise and rare large spikes
fn synth_batch(n: usize, base: f64, seed: u32) -> Vec<f64> {
    // tiny PRNG
    let mut state = seed.max(1);
    let mut next_f64 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        f64::from(x) / (f64::from(u32::MAX) + 1.0)
    };
    (0..n)
        .map(|i| {
            let noise = (next_f64() * 2.0 - 1.0) * 40.0;
            let spike = if i % 13 == 0 { 25_000.0 } else { 0.0 };
            base + noise + spike
        })
        .collect()
}

pub fn bench_summaries(c: &mut Criterion) {
    let mut g = c.benchmark_group("weight_filter");
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p station_core --bench filter
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(10));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    for &n in &[10usize, 100, 1000] {
        let batch = synth_batch(n, 842_913.0, 0xC0FFEE);
        g.bench_function(format!("median_{n}"), |b| {
            b.iter_batched(
                || batch.clone(),
                |s| black_box(summarize_median(black_box(&s))),
                BatchSize::SmallInput,
            )
        });
        g.bench_function(format!("iqr_{n}"), |b| {
            b.iter_batched(
                || batch.clone(),
                |s| black_box(summarize_iqr(black_box(&s))),
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

criterion_group!(filter, bench_summaries);
criterion_main!(filter);
