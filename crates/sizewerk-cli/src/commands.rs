// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand handlers. Each returns the JSON value printed on success.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sizewerk_core::config::CompressionConfig;
use sizewerk_core::error::Result;
use sizewerk_core::types::{
    CompressReport, CompressionRequest, SizeUnit, TargetSize, bytes_to_mb,
};
use sizewerk_document::artifact::unique_sibling;
use sizewerk_document::pdf::add_text_watermark;
use sizewerk_document::{
    Attempt, CompressionObserver, CompressionOrchestrator, PdfWriter, RecordingObserver,
    TracingObserver,
};
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompressOutput {
    #[serde(flatten)]
    report: CompressReport,
    degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempts: Option<Vec<Attempt>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactOutput {
    output_artifact: PathBuf,
    size_mb: f64,
}

/// Forwards to tracing and keeps a copy of every callback.
#[derive(Default)]
struct TeeObserver {
    tracing: TracingObserver,
    recording: RecordingObserver,
}

impl CompressionObserver for TeeObserver {
    fn on_start(&mut self, request: &CompressionRequest, original_size: u64) {
        self.tracing.on_start(request, original_size);
    }

    fn on_attempt(&mut self, attempt: &Attempt) {
        self.tracing.on_attempt(attempt);
        self.recording.on_attempt(attempt);
    }

    fn on_fallback(&mut self, stage: &str, reason: &str) {
        self.tracing.on_fallback(stage, reason);
    }

    fn on_finish(&mut self, result: &sizewerk_core::types::CompressionResult) {
        self.tracing.on_finish(result);
    }
}

pub struct CompressArgs {
    pub file: PathBuf,
    pub size: f64,
    pub unit: SizeUnit,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub gs: Option<String>,
    pub attempts: bool,
}

pub fn compress(args: CompressArgs) -> Result<serde_json::Value> {
    let mut config = match &args.config {
        Some(path) => CompressionConfig::load(path)?,
        None => CompressionConfig::default(),
    };
    if let Some(gs) = args.gs {
        config.pdf.ghostscript = gs;
    }
    let engine = CompressionOrchestrator::new(config)?;

    let mut request = CompressionRequest::new(&args.file, TargetSize::new(args.size, args.unit))?;
    if let Some(output) = args.output {
        request = request.with_output(output);
    }

    let mut observer = TeeObserver::default();
    let result = engine.compress_with(&request, &mut observer)?;

    let output = CompressOutput {
        report: result.report(),
        degraded: result.degraded,
        attempts: args.attempts.then_some(observer.recording.attempts),
    };
    Ok(serde_json::to_value(output)?)
}

pub fn images_to_pdf(
    images: &[PathBuf],
    output: &Path,
    title: Option<&str>,
) -> Result<serde_json::Value> {
    let mut writer = PdfWriter::new();
    if let Some(title) = title {
        writer.set_title(title);
    }
    let size = writer.write_images_to_file(images, output)?;
    info!(images = images.len(), size, "Images combined");
    artifact_json(output, size)
}

pub fn watermark(pdf: &Path, text: &str, output: Option<PathBuf>) -> Result<serde_json::Value> {
    let output = output.unwrap_or_else(|| {
        let dir = pdf.parent().unwrap_or_else(|| Path::new("."));
        unique_sibling(dir, "watermarked", "pdf")
    });
    let size = add_text_watermark(pdf, &output, text)?;
    artifact_json(&output, size)
}

fn artifact_json(output: &Path, size: u64) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(ArtifactOutput {
        output_artifact: output.to_path_buf(),
        size_mb: bytes_to_mb(size),
    })?)
}
