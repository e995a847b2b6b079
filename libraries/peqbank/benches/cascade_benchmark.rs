//! Performance benchmarks for the biquad cascade
//!
//! Run with: cargo bench -p peqbank --bench cascade_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use peqbank::design::design_filter;
use peqbank::{FilterList, FilterSpec, PeqBank, ProcessingMode};
use std::f32::consts::PI;

const SAMPLE_RATE: u32 = 48000;

/// Generate an interleaved test signal (1kHz sine wave)
fn generate_test_signal(num_frames: usize, channels: usize) -> Vec<f32> {
    let mut samples = Vec::with_capacity(num_frames * channels);
    for i in 0..num_frames {
        let t = i as f32 / SAMPLE_RATE as f32;
        let value = (2.0 * PI * 1000.0 * t).sin() * 0.5;
        for _ in 0..channels {
            samples.push(value);
        }
    }
    samples
}

/// A list with exactly `stages` biquads
fn list_with_stages(stages: usize) -> FilterList {
    let mut list = FilterList::new();
    let pass_stages = stages.saturating_sub(2).min(8);
    if pass_stages > 0 {
        let order = 2 * pass_stages as u32;
        list.push(FilterSpec::lowpass(16000.0, 0.5, order).unwrap()).unwrap();
    }
    let mut remaining = stages - pass_stages;
    let mut freq = 100.0;
    while remaining > 0 {
        list.push(FilterSpec::peq(freq, 1.0, 0.0, 3.0, 1.5)).unwrap();
        freq *= 2.0;
        remaining -= 1;
    }
    list
}

fn bench_stage_counts(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascade_stages");
    let channels = 2;
    let frames = 512;
    let input = generate_test_signal(frames, channels);
    group.throughput(Throughput::Elements(frames as u64));

    for stages in [1, 4, 8, 16] {
        group.bench_with_input(BenchmarkId::new("fast", stages), &input, |b, input| {
            let mut bank = PeqBank::new(SAMPLE_RATE, channels, frames).unwrap();
            bank.set_mode(ProcessingMode::Fast);
            bank.setup(list_with_stages(stages)).unwrap();
            let mut output = vec![0.0f32; input.len()];

            b.iter(|| black_box(bank.render_f32(black_box(input), &mut output).unwrap()));
        });
    }

    group.finish();
}

fn bench_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascade_modes");
    let channels = 2;
    let frames = 512;
    let input = generate_test_signal(frames, channels);
    group.throughput(Throughput::Elements(frames as u64));

    for mode in [ProcessingMode::Fast, ProcessingMode::Smooth] {
        // Every buffer carries a fresh transition
        group.bench_with_input(
            BenchmarkId::new("update_per_buffer", format!("{:?}", mode)),
            &input,
            |b, input| {
                let mut bank = PeqBank::new(SAMPLE_RATE, channels, frames).unwrap();
                bank.set_mode(mode);
                let lists = [list_with_stages(8), list_with_stages(8)];
                bank.setup(lists[0].clone()).unwrap();
                let mut output = vec![0.0f32; input.len()];
                let mut toggle = 0;

                b.iter(|| {
                    toggle ^= 1;
                    bank.update(lists[toggle].clone()).unwrap();
                    black_box(bank.render_f32(black_box(input), &mut output).unwrap())
                });
            },
        );
    }

    group.finish();
}

fn bench_formats(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascade_formats");
    let channels = 2;
    let frames = 512;
    group.throughput(Throughput::Elements(frames as u64));

    let float_input = generate_test_signal(frames, channels);
    let int_input: Vec<i16> = float_input
        .iter()
        .map(|s| (s * 32767.0).round() as i16)
        .collect();

    let mut bank = PeqBank::new(SAMPLE_RATE, channels, frames).unwrap();
    bank.set_mode(ProcessingMode::Fast);
    bank.setup(list_with_stages(8)).unwrap();

    group.bench_function("i16", |b| {
        let mut output = vec![0i16; int_input.len()];
        b.iter(|| black_box(bank.render_i16(black_box(&int_input), &mut output).unwrap()));
    });

    group.bench_function("f32_in_place", |b| {
        let mut buffer = float_input.clone();
        b.iter(|| black_box(bank.render_f32_in_place(black_box(&mut buffer)).unwrap()));
    });

    group.finish();
}

fn bench_design(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_design");
    let sample_rate = SAMPLE_RATE as f32;

    let specs = [
        ("shelf", FilterSpec::shelf(3.0, 0.0, -2.0, 120.0, 8000.0)),
        ("peq", FilterSpec::peq(1000.0, 1.0, 0.0, 6.0, 3.0)),
        ("lowpass_8", FilterSpec::lowpass(4000.0, 1.0, 8).unwrap()),
        ("highpass_32", FilterSpec::highpass(40.0, 0.0, 32).unwrap()),
    ];

    for (name, spec) in specs {
        group.bench_with_input(BenchmarkId::from_parameter(name), &spec, |b, spec| {
            b.iter(|| black_box(design_filter(sample_rate, black_box(spec))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_stage_counts, bench_modes, bench_formats, bench_design);
criterion_main!(benches);
