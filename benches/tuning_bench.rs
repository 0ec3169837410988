//! Benchmarks for pitch resolution and step scheduling.
//!
//! Run with: cargo bench
//!
//! Scheduling happens on a coarse host timer, so absolute numbers are not
//! deadline-critical the way per-sample DSP is; these mostly guard against
//! accidental blowups in the per-step hot path (lattice resolution, arpeggio
//! expansion, voice construction).

use std::hint::black_box;
use std::rc::Rc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use lattice_seq::engine::Sequencer;
use lattice_seq::provider::fake::FakeProvider;
use lattice_seq::provider::AudioProvider;
use lattice_seq::sequencing::{Arpeggiator, Block, Track};
use lattice_seq::tuning::{frequency, LatticeAxis, LatticeCoord};

fn lattice_grid() -> Vec<LatticeCoord> {
    let mut coords = Vec::new();
    for b in -3..=3 {
        for y in -2..=2 {
            coords.push(LatticeCoord::on_axis(b, y, LatticeAxis::Third));
        }
    }
    coords
}

fn bench_frequency(c: &mut Criterion) {
    let mut group = c.benchmark_group("tuning/frequency");
    let coords = lattice_grid();

    group.bench_function("editable_grid", |b| {
        b.iter(|| {
            for &coord in &coords {
                black_box(frequency(black_box(261.63), coord));
            }
        })
    });

    group.finish();
}

fn bench_arpeggio_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequencing/arpeggio");
    let notes = lattice_grid();

    for octaves in [1u32, 2, 4] {
        let arp = Arpeggiator {
            division: 1,
            octaves,
        };
        group.bench_with_input(
            BenchmarkId::new("expand", octaves),
            &octaves,
            |b, _| b.iter(|| black_box(arp.expand(black_box(&notes), 256))),
        );
    }

    group.finish();
}

fn bench_schedule_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/schedule_step");

    for &chord_size in &[1usize, 4, 8] {
        let provider = Rc::new(FakeProvider::new());
        let mut seq = Sequencer::new(provider.clone() as Rc<dyn AudioProvider>);

        let notes: Vec<LatticeCoord> = (0..chord_size as i32)
            .map(|b| LatticeCoord::on_axis(b % 4, b / 4, LatticeAxis::Third))
            .collect();
        let mut track = Track::melodic(provider.clone() as Rc<dyn AudioProvider>, "bench");
        track.blocks.push(Block::with_notes(0, 8, notes));
        seq.add_track(track);

        group.bench_with_input(
            BenchmarkId::new("chord", chord_size),
            &chord_size,
            |b, _| {
                let mut time = 0.0;
                b.iter(|| {
                    // Fresh start time each pass so voices stack like a
                    // long-running session rather than retriggering
                    time += 0.1;
                    provider.advance(0.1);
                    seq.schedule_step(black_box(0), black_box(time));
                    provider.clear_events();
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_frequency,
    bench_arpeggio_expand,
    bench_schedule_step,
);
criterion_main!(benches);
