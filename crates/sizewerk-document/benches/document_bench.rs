// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the sizewerk-document engine: a single ladder step,
// a full image search, and the in-process PDF rewrite.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, Rgb, RgbImage};

use sizewerk_core::types::{CompressionRequest, RasterFormat, TargetSize};
use sizewerk_document::{
    CompressionOrchestrator, ImageProcessor, NullObserver, PdfReader, PdfWriter,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// 256x256 gradient with enough texture that JPEG quality matters.
fn synthetic_photo() -> DynamicImage {
    let img = RgbImage::from_fn(256, 256, |x, y| {
        Rgb([
            (x % 256) as u8,
            (y % 256) as u8,
            ((x * y / 7) % 256) as u8,
        ])
    });
    DynamicImage::ImageRgb8(img)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// One quality step and one downscale step on the same image.
fn bench_ladder_steps(c: &mut Criterion) {
    let processor =
        ImageProcessor::from_dynamic(synthetic_photo()).normalize_for(RasterFormat::Jpeg);

    c.bench_function("jpeg_quality_step (256x256, q70)", |b| {
        b.iter(|| black_box(processor.encode(RasterFormat::Jpeg, black_box(70)).unwrap()));
    });

    c.bench_function("downscale_step (256x256 -> 50%, q10)", |b| {
        b.iter(|| {
            black_box(
                processor
                    .scaled(black_box(50))
                    .encode(RasterFormat::Jpeg, 10)
                    .unwrap(),
            )
        });
    });
}

/// Worst case for the image search: an unreachable target walks every step.
fn bench_full_image_search(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("photo.jpg");
    let bytes = ImageProcessor::from_dynamic(synthetic_photo())
        .encode(RasterFormat::Jpeg, 95)
        .unwrap();
    std::fs::write(&source, bytes).unwrap();

    let engine = CompressionOrchestrator::with_defaults();
    let request = CompressionRequest::new(&source, TargetSize::bytes(1)).unwrap();

    c.bench_function("image_search_exhaustive (256x256 jpeg)", |b| {
        b.iter(|| black_box(engine.compress_with(&request, &mut NullObserver).unwrap()));
    });
}

/// Structural rewrite of a four-page image PDF with embedded re-encoding.
fn bench_structural_rewrite(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let pages: Vec<_> = (0..4)
        .map(|i| {
            let path = dir.path().join(format!("page{i}.png"));
            synthetic_photo().save(&path).unwrap();
            path
        })
        .collect();
    let pdf = PdfWriter::new().images_to_pdf(&pages).unwrap();
    let reader = PdfReader::from_bytes(&pdf).unwrap();

    c.bench_function("pdf_structural_rewrite (4 pages)", |b| {
        b.iter(|| black_box(reader.rewrite_to_bytes(Some(60)).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_ladder_steps,
    bench_full_image_search,
    bench_structural_rewrite
);
criterion_main!(benches);
