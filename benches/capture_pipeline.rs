//! Capture pipeline benchmarks.
//!
//! Measures the two CPU-bound steps of a run:
//! - Cropping a viewport screenshot down to the slide (per page)
//! - Encoding a deck of captures into a PDF (per document)
//!
//! Run with: cargo bench --bench capture_pipeline
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::io::Cursor;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use image::{ImageFormat, Rgb, RgbImage};

use deck_capture::assembly::DocumentEncoder;
use deck_capture::capture::acquirer::crop_to_png;
use deck_capture::viewer::Rect;
use deck_capture::{PageImage, PdfEncoder};

// ============================================================================
// Parameters
// ============================================================================

/// Viewport sizes at device resolution.
const VIEWPORTS: &[(u32, u32)] = &[(1280, 800), (2560, 1600)];

const DECK_SIZES: &[u32] = &[10, 40];

// ============================================================================
// Fixtures
// ============================================================================

fn viewport_png(width: u32, height: u32) -> Vec<u8> {
    let raster = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 251) as u8, (y % 241) as u8, ((x ^ y) % 239) as u8])
    });
    let mut png = Cursor::new(Vec::new());
    raster
        .write_to(&mut png, ImageFormat::Png)
        .expect("encode viewport");
    png.into_inner()
}

fn slide_rect(width: u32, height: u32) -> Rect {
    Rect {
        x: f64::from(width) * 0.1,
        y: f64::from(height) * 0.1,
        width: f64::from(width) * 0.8,
        height: f64::from(height) * 0.75,
    }
}

fn deck(pages: u32) -> Vec<(u32, PageImage)> {
    let raw = viewport_png(1280, 800);
    let slide = crop_to_png(&raw, slide_rect(1280, 800), 1.0).expect("crop slide");
    (1..=pages).map(|page| (page, slide.clone())).collect()
}

// ============================================================================
// Benchmark: Crop
// ============================================================================

fn bench_crop(c: &mut Criterion) {
    let mut group = c.benchmark_group("crop");

    for &(width, height) in VIEWPORTS {
        let raw = viewport_png(width, height);
        let rect = slide_rect(width, height);
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &raw,
            |b, raw| b.iter(|| crop_to_png(black_box(raw), rect, 1.0).expect("crop")),
        );
    }

    group.finish();
}

// ============================================================================
// Benchmark: PDF Assembly
// ============================================================================

fn bench_pdf(c: &mut Criterion) {
    let mut group = c.benchmark_group("pdf_assembly");
    group.sample_size(10);

    let encoder = PdfEncoder::new();
    for &pages in DECK_SIZES {
        let deck = deck(pages);
        group.throughput(Throughput::Elements(u64::from(pages)));
        group.bench_with_input(BenchmarkId::new("pages", pages), &deck, |b, deck| {
            b.iter(|| encoder.encode(black_box(deck), &mut |_| {}).expect("encode"));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_crop, bench_pdf);
criterion_main!(benches);
