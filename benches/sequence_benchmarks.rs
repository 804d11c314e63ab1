use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use lyrical::midi::MidiEncoder;
use lyrical::{Note, SynthRenderer, Tempo, Timeline, decode};

/// Timeline with overlapping notes written out of start order
fn build_timeline(count: usize) -> Timeline {
    let notes = (0..count)
        .map(|i| {
            let start = ((i * 7) % count) as f64 * 0.5;
            Note::new(48 + (i % 36) as u8, start, start + 1.5)
        })
        .collect();
    Timeline::from_notes(notes).unwrap_or_default()
}

/// Benchmark the sorted view used by export and playback
fn bench_sorted_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeline_sorted");

    for count in [16, 256, 4096] {
        let timeline = build_timeline(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &timeline, |b, t| {
            b.iter(|| black_box(t.to_sorted().to_vec()));
        });
    }
    group.finish();
}

/// Benchmark Standard MIDI File encoding
fn bench_midi_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("midi_encode");
    let encoder = MidiEncoder::default();
    let tempo = Tempo::default();

    for count in [16, 256, 4096] {
        let timeline = build_timeline(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &timeline, |b, t| {
            b.iter(|| black_box(encoder.encode_timeline(t, tempo)));
        });
    }
    group.finish();
}

fn bench_midi_decode(c: &mut Criterion) {
    let bytes = MidiEncoder::default()
        .encode_timeline(&build_timeline(1024), Tempo::default())
        .unwrap_or_default();

    c.bench_function("midi_decode_1024", |b| {
        b.iter(|| black_box(decode(black_box(&bytes))));
    });
}

/// Benchmark offline synthesis of a short phrase
fn bench_render(c: &mut Criterion) {
    let renderer = SynthRenderer::default();
    let timeline = build_timeline(32);
    let notes = timeline.to_sorted().to_vec();
    let tempo = Tempo::default();

    c.bench_function("render_samples_32_notes", |b| {
        b.iter(|| black_box(renderer.render_samples(&notes, tempo)));
    });
}

criterion_group!(
    benches,
    bench_sorted_view,
    bench_midi_encode,
    bench_midi_decode,
    bench_render
);
criterion_main!(benches);
