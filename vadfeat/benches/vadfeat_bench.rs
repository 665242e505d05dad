use criterion::{black_box, criterion_group, criterion_main, Criterion};
use giztoy_vadfeat::{
    pcm, Cmvn, ComputeMode, Filterbank, FilterbankConfig, FrontEndConfig, Padding,
    StreamingFrontEnd,
};
use ndarray::Array2;

fn make_sine_pcm(freq_hz: f64, n_samples: usize, sample_rate: usize) -> Vec<u8> {
    let mut audio = Vec::with_capacity(n_samples * 2);
    for i in 0..n_samples {
        let t = i as f64 / sample_rate as f64;
        let sample = (16000.0 * (freq_hz * 2.0 * std::f64::consts::PI * t).sin()) as i16;
        audio.extend_from_slice(&sample.to_le_bytes());
    }
    audio
}

fn front_end(mode: ComputeMode) -> StreamingFrontEnd {
    let cfg = FrontEndConfig {
        mode,
        ..FrontEndConfig::default()
    };
    StreamingFrontEnd::new(cfg, Cmvn::identity(400)).unwrap()
}

fn bench_fbank_1s(c: &mut Criterion) {
    let fbank = Filterbank::new(FilterbankConfig::fsmn_vad(16000)).unwrap();
    let wave: Array2<f32> =
        pcm::waveform_from_pcm16le(&make_sine_pcm(440.0, 16000, 16000)).mapv(|v| v * 32768.0);

    c.bench_function("vadfeat_fbank_1s", |b| {
        b.iter(|| {
            let _ = black_box(fbank.compute(black_box(wave.view())));
        });
    });
}

fn bench_frontend_native_1s(c: &mut Criterion) {
    let fe = front_end(ComputeMode::Native);
    let wave = pcm::waveform_from_pcm16le(&make_sine_pcm(440.0, 16000, 16000));

    c.bench_function("vadfeat_frontend_native_1s", |b| {
        b.iter(|| {
            let _ = black_box(fe.compute(black_box(wave.view()), Padding::new(2, 2)));
        });
    });
}

fn bench_frontend_graph_1s(c: &mut Criterion) {
    let fe = front_end(ComputeMode::GraphCompatible);
    let wave = pcm::waveform_from_pcm16le(&make_sine_pcm(440.0, 16000, 16000));

    c.bench_function("vadfeat_frontend_graph_compatible_1s", |b| {
        b.iter(|| {
            let _ = black_box(fe.compute(black_box(wave.view()), Padding::new(2, 2)));
        });
    });
}

fn bench_frontend_chunk_200ms(c: &mut Criterion) {
    let fe = front_end(ComputeMode::Native);
    let wave = pcm::waveform_from_pcm16le(&make_sine_pcm(440.0, 3200, 16000)); // 200ms

    c.bench_function("vadfeat_frontend_chunk_200ms", |b| {
        b.iter(|| {
            let _ = black_box(fe.compute(black_box(wave.view()), Padding::NONE));
        });
    });
}

criterion_group!(
    benches,
    bench_fbank_1s,
    bench_frontend_native_1s,
    bench_frontend_graph_1s,
    bench_frontend_chunk_200ms,
);
criterion_main!(benches);
