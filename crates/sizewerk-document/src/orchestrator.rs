// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compression orchestrator — the single entry point. Probes the source,
// short-circuits targets that are already met, dispatches to the compressor
// for the document kind, and turns recoverable failures into a degraded
// copy-through so the caller always gets a usable artifact.
//
// Images are encoded in the format named by the output extension, falling
// back to the source format when that extension is not a raster format.

use std::path::Path;

use sizewerk_core::config::CompressionConfig;
use sizewerk_core::error::{Disposition, Result, SizewerkError};
use sizewerk_core::types::{
    CompressionRequest, CompressionResult, DocumentKind, RasterFormat, Strategy,
};
use tracing::{info, instrument, warn};

use crate::artifact::{copy_through, discard};
use crate::container::ContainerRecompressor;
use crate::image::ImageCompressor;
use crate::observer::{CompressionObserver, TracingObserver};
use crate::pdf::{GhostscriptRewriter, PdfCompressor, PdfRewriter};
use crate::probe::SizeProbe;
use crate::registry::StrategyRegistry;
use crate::session::{CompressionJob, CompressionSession};

/// Long-lived engine state: configuration, the strategy table, and the PDF
/// rewriter. Shared read-only between requests.
pub struct CompressionOrchestrator {
    config: CompressionConfig,
    registry: StrategyRegistry,
    rewriter: Box<dyn PdfRewriter>,
}

impl CompressionOrchestrator {
    /// Validate `config` and build the registry and Ghostscript rewriter from it.
    pub fn new(config: CompressionConfig) -> Result<Self> {
        config.validate()?;
        let registry = StrategyRegistry::from_config(&config);
        let rewriter = Box::new(GhostscriptRewriter::from_settings(&config.pdf));
        Ok(Self {
            config,
            registry,
            rewriter,
        })
    }

    pub fn with_defaults() -> Self {
        let config = CompressionConfig::default();
        Self {
            registry: StrategyRegistry::from_config(&config),
            rewriter: Box::new(GhostscriptRewriter::from_settings(&config.pdf)),
            config,
        }
    }

    /// Replace the external PDF rewriter.
    pub fn with_rewriter(mut self, rewriter: impl PdfRewriter + 'static) -> Self {
        self.rewriter = Box::new(rewriter);
        self
    }

    /// Compress with progress reported as tracing events.
    pub fn compress(&self, request: &CompressionRequest) -> Result<CompressionResult> {
        self.compress_with(request, &mut TracingObserver)
    }

    /// Compress, reporting every attempt to `observer`.
    ///
    /// `NotFound`, invalid input, and cancellation are returned as errors.
    /// Every other failure yields a copy of the original with
    /// `degraded = true`.
    #[instrument(
        skip_all,
        fields(
            source = %request.source().display(),
            kind = request.kind().label(),
            target = request.target_bytes()
        )
    )]
    pub fn compress_with(
        &self,
        request: &CompressionRequest,
        observer: &mut dyn CompressionObserver,
    ) -> Result<CompressionResult> {
        let source = request.source();
        let original_size = SizeProbe::size_of(source)?;
        let output = request.output_path();
        if is_same_file(source, &output) {
            return Err(SizewerkError::InvalidInput(format!(
                "output {} would overwrite the source",
                output.display()
            )));
        }

        let job = CompressionJob {
            source,
            output: &output,
            target_bytes: request.target_bytes(),
            original_size,
        };
        let kind = output_kind(request.kind(), &output);
        let mut session = CompressionSession::new(observer, request.cancellation().clone());
        session.start(request, original_size);

        // A format change always needs an encode, however generous the target.
        if job.target_bytes >= original_size && kind == request.kind() {
            let size = copy_through(source, &output)?;
            info!(size, "Target already met, copied through");
            let result = job.result(Strategy::Identity, size, true, false, 0);
            session.finish(&result);
            return Ok(result);
        }

        let result = match self.dispatch(kind, &job, &mut session) {
            Ok(result) => result,
            Err(err) => match err.disposition() {
                Disposition::Propagate => {
                    discard(&output);
                    return Err(err);
                }
                Disposition::Degrade => {
                    warn!(%err, "Compression failed, copying original through");
                    discard(&output);
                    session.fallback(request.kind().label(), &err.to_string());
                    let size = copy_through(source, &output)?;
                    job.result(
                        Strategy::Identity,
                        size,
                        size <= job.target_bytes,
                        true,
                        session.attempts(),
                    )
                }
            },
        };

        session.finish(&result);
        Ok(result)
    }

    fn dispatch(
        &self,
        kind: DocumentKind,
        job: &CompressionJob<'_>,
        session: &mut CompressionSession<'_>,
    ) -> Result<CompressionResult> {
        let strategies = self.registry.strategies_for(kind);
        match kind {
            DocumentKind::Image(format) => {
                ImageCompressor::new(format).compress(job, strategies, session)
            }
            DocumentKind::Pdf => {
                PdfCompressor::new(self.rewriter.as_ref(), self.config.pdf.embedded_image_quality)
                    .compress(job, strategies, session)
            }
            DocumentKind::Container(flavor) => {
                ContainerRecompressor::new(flavor).compress(job, strategies, session)
            }
            DocumentKind::Unsupported => {
                let size = copy_through(job.source, job.output)?;
                Ok(job.conclude(session, Strategy::Identity, size, size <= job.target_bytes))
            }
        }
    }
}

/// The kind to produce at `output`: images take the raster format of the
/// output extension when it names one.
fn output_kind(source_kind: DocumentKind, output: &Path) -> DocumentKind {
    match source_kind {
        DocumentKind::Image(source_format) => DocumentKind::Image(
            output
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(RasterFormat::from_extension)
                .unwrap_or(source_format),
        ),
        other => other,
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
