// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// sizewerk-document — the compression engine.
//
// Given a document and a target size, searches quality, resolution, and
// re-encoding strategies for an output that fits. Images walk a quality ladder
// and then a downscale sweep, PDFs go through Ghostscript presets with an
// in-process structural rewrite as fallback, and office packages get their
// embedded media recompressed in a single pass. The orchestrator ties the
// three together and always hands back a usable artifact.

pub mod artifact;
pub mod container;
pub mod image;
pub mod observer;
pub mod orchestrator;
pub mod pdf;
pub mod probe;
pub mod registry;
pub mod session;

pub use container::ContainerRecompressor;
pub use image::{ImageCompressor, ImageProcessor};
pub use observer::{
    Attempt, AttemptOutcome, CompressionObserver, NullObserver, RecordingObserver, TracingObserver,
};
pub use orchestrator::CompressionOrchestrator;
pub use pdf::{GhostscriptRewriter, PdfCompressor, PdfReader, PdfRewriter, PdfWriter};
pub use probe::SizeProbe;
pub use registry::StrategyRegistry;
pub use session::{CompressionJob, CompressionSession};
