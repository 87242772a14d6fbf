//! Mixer and scheduler throughput.
//!
//! Run with: cargo bench -p et-engine --bench engine_bench

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use et_engine::{AudioEngine, Frame, PlayRequest, PlaybackEngine, SampleCache};
use et_ir::{InstrumentId, Note, Song, TuningProfile, WaveBank, WAVE_LEN};

const RATE: u32 = 44100;

fn sine_cache() -> Arc<SampleCache> {
    let mut wave = [0i8; WAVE_LEN];
    for (i, s) in wave.iter_mut().enumerate() {
        *s = (libm::sin(i as f64 / WAVE_LEN as f64 * std::f64::consts::TAU) * 100.0) as i8;
    }
    let bank = WaveBank {
        waves: vec![wave],
        drums: Vec::new(),
    };
    Arc::new(SampleCache::from_bank(&bank))
}

fn bench_mixer(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixer");
    let cache = sine_cache();

    for voices in [1u16, 16, 64] {
        group.bench_with_input(BenchmarkId::new("render_1024", voices), &voices, |b, &voices| {
            let mut engine = AudioEngine::new(RATE, TuningProfile::Edo38, Arc::clone(&cache));
            for v in 0..voices {
                let req = PlayRequest::new(v * 4, InstrumentId::Melodic(0), 0.0, 1.0e6);
                engine.play_note(&req);
            }
            let mut out = vec![Frame::silence(); 1024];
            b.iter(|| {
                engine.render(&mut out);
                black_box(&out);
            })
        });
    }
    group.finish();
}

fn bench_playback(c: &mut Criterion) {
    let mut song = Song::new("bench");
    for i in 0..2048u32 {
        let mut note = Note::new(i * 120, 240, (i % 300) as u16, InstrumentId::Melodic(0));
        note.track = (i % 8) as u8;
        song.notes.push(note);
    }
    song.sort_notes();

    c.bench_function("playback_one_second", |b| {
        b.iter(|| {
            let mut audio = AudioEngine::new(RATE, TuningProfile::Edo38, sine_cache());
            let mut playback = PlaybackEngine::new(song.clone());
            playback.play(&mut audio, None);
            let mut out = vec![Frame::silence(); RATE as usize];
            playback.render(&mut audio, &mut out);
            black_box(&out);
        })
    });
}

criterion_group!(benches, bench_mixer, bench_playback);
criterion_main!(benches);
