//! Benchmarks for the CPU-bound pipeline stages.
//!
//! Measures stream ranking, HLS master playlist parsing and source
//! classification.
//!
//! Run with: `cargo bench --bench ranking_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reel::stream::classify::Classifier;
use reel::stream::manifest::{parse_hls_master, StreamTemplate};
use reel::stream::ranking::{rank, Candidate};
use reel::{SourceRecord, Stream, UserPreferences};

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

const PROVIDERS: &[&str] = &["Default", "Ac", "Okru", "Mp4upload", "MegaCloud"];
const HEIGHTS: &[u32] = &[144, 240, 360, 480, 720, 1080, 1440, 2160];

fn candidates(n: usize) -> Vec<Candidate> {
    (0..n)
        .map(|i| {
            let provider = PROVIDERS[i % PROVIDERS.len()];
            let height = HEIGHTS[i % HEIGHTS.len()];
            let lang = if i % 2 == 0 { "sub" } else { "dub" };
            let label = format!("{height}p {lang} ({provider} - Hls)");
            let priority = (i % 7) as f64;
            Candidate::new(Stream::new(format!("https://cdn.example/{i}.m3u8"), label, "bench"), priority)
        })
        .collect()
}

fn master_playlist(variants: usize) -> String {
    let mut text = String::from("#EXTM3U\n");
    text.push_str("#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",NAME=\"Japanese\",URI=\"audio/ja.m3u8\"\n");
    for i in 0..variants {
        let height = HEIGHTS[i % HEIGHTS.len()];
        let width = height * 16 / 9;
        text.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={width}x{height},CODECS=\"avc1.4d401f,mp4a.40.2\"\n",
            (i + 1) * 400_000
        ));
        text.push_str(&format!("{height}/index_{i}.m3u8\n"));
    }
    text
}

fn records() -> Vec<SourceRecord> {
    vec![
        SourceRecord::new("-175948514e4c4f57175b54575b5307515c0509", "Default", "internal", 7.0),
        SourceRecord::new("https://ok.ru/videoembed/123", "Ok", "iframe", 3.0),
        SourceRecord::new("https://www.mp4upload.com/embed-abc.html", "Mp4", "iframe", 2.0),
        SourceRecord::new("https://megacloud.tv/embed-2/e-1/xyz", "Vidcloud", "iframe", 2.5),
        SourceRecord::new("https://cdn.example.com/video.mp4", "Yt-mp4", "player", 1.0),
        SourceRecord::new("https://unknown.example/x", "Mystery", "iframe", 0.5),
    ]
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank");
    let default_prefs = UserPreferences::default();
    let named_prefs = UserPreferences {
        preferred_provider_name: "Okru".to_string(),
        ..UserPreferences::default()
    };

    for size in [10, 100, 1000] {
        let input = candidates(size);
        group.bench_with_input(BenchmarkId::new("default_provider", size), &input, |b, input| {
            b.iter(|| rank(black_box(input.clone()), &default_prefs));
        });
        group.bench_with_input(BenchmarkId::new("named_provider", size), &input, |b, input| {
            b.iter(|| rank(black_box(input.clone()), &named_prefs));
        });
    }
    group.finish();
}

fn bench_hls_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("hls_master");
    let template = StreamTemplate::new("bench");
    let url = "https://cdn.example.com/show/ep1/master.m3u8";

    for variants in [4, 16, 64] {
        let text = master_playlist(variants);
        group.bench_with_input(BenchmarkId::from_parameter(variants), &text, |b, text| {
            b.iter(|| parse_hls_master(black_box(text), url, |q| format!("{q} (Bench)"), &template));
        });
    }
    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let classifier = Classifier::default();
    let prefs = UserPreferences::default();
    let records = records();

    c.bench_function("classify_all", |b| {
        b.iter(|| classifier.classify_all(black_box(&records), &prefs));
    });
}

criterion_group!(benches, bench_rank, bench_hls_parse, bench_classify);
criterion_main!(benches);
