// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF compressor — external presets first, in-process structural rewrite as
// the last resort, copy-through if even that fails.

use sizewerk_core::error::Result;
use sizewerk_core::types::{CompressionResult, Strategy};
use tracing::{debug, info, instrument, warn};

use crate::artifact::{copy_through, discard, write_artifact};
use crate::pdf::ghostscript::PdfRewriter;
use crate::pdf::reader::PdfReader;
use crate::probe::SizeProbe;
use crate::session::{CompressionJob, CompressionSession};

/// Sequences PDF strategies for one request.
pub struct PdfCompressor<'a> {
    rewriter: &'a dyn PdfRewriter,
    embedded_image_quality: Option<u8>,
}

impl<'a> PdfCompressor<'a> {
    pub fn new(rewriter: &'a dyn PdfRewriter, embedded_image_quality: Option<u8>) -> Self {
        Self {
            rewriter,
            embedded_image_quality,
        }
    }

    /// Try each preset in order and return the first output that fits.
    ///
    /// A preset that fails is recorded and skipped. Once the presets are
    /// exhausted, the structural rewrite's output is accepted whether or not it
    /// fits. If that also fails, the source is copied through unchanged.
    #[instrument(skip_all, fields(tool = self.rewriter.name(), target = job.target_bytes))]
    pub fn compress(
        &self,
        job: &CompressionJob<'_>,
        strategies: &[Strategy],
        session: &mut CompressionSession<'_>,
    ) -> Result<CompressionResult> {
        for &strategy in strategies {
            match strategy {
                Strategy::PdfPreset { preset } => {
                    session.checkpoint()?;
                    match self.rewriter.rewrite(preset, job.source, job.output) {
                        Ok(()) => {
                            let size = SizeProbe::size_of(job.output)?;
                            if session.record(strategy, size, job.target_bytes) {
                                info!(%strategy, size, "PDF fits target");
                                return Ok(job.conclude(session, strategy, size, true));
                            }
                            debug!(%strategy, size, "Preset output too large");
                        }
                        Err(err) => {
                            discard(job.output);
                            warn!(%strategy, %err, "Preset failed");
                            session.record_failure(strategy, &err);
                        }
                    }
                }
                Strategy::PdfStructuralRewrite => {
                    session.checkpoint()?;
                    return match self.structural_rewrite(job) {
                        Ok(size) => {
                            let fits = session.record(strategy, size, job.target_bytes);
                            if !fits {
                                warn!(
                                    size,
                                    target = job.target_bytes,
                                    "Structural rewrite did not reach target"
                                );
                            }
                            Ok(job.conclude(session, strategy, size, fits))
                        }
                        Err(err) => {
                            discard(job.output);
                            session.record_failure(strategy, &err);
                            session.fallback("pdf-structural-rewrite", &err.to_string());
                            self.copy_original(job, session)
                        }
                    };
                }
                _ => {}
            }
        }

        session.fallback("pdf", "no strategy produced an artifact");
        self.copy_original(job, session)
    }

    fn structural_rewrite(&self, job: &CompressionJob<'_>) -> Result<u64> {
        let bytes = PdfReader::open(job.source)?.rewrite_to_bytes(self.embedded_image_quality)?;
        write_artifact(job.output, &bytes)?;
        SizeProbe::size_of(job.output)
    }

    fn copy_original(
        &self,
        job: &CompressionJob<'_>,
        session: &CompressionSession<'_>,
    ) -> Result<CompressionResult> {
        let size = copy_through(job.source, job.output)?;
        Ok(job.conclude(session, Strategy::Identity, size, size <= job.target_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{AttemptOutcome, RecordingObserver};
    use crate::pdf::reader::tests::sample_pdf;
    use crate::registry::StrategyRegistry;
    use sizewerk_core::error::SizewerkError;
    use sizewerk_core::types::{CancellationToken, DocumentKind, PdfPreset};
    use std::path::Path;
    use std::sync::Mutex;

    /// Writes a fixed-size file per preset and remembers what was asked.
    struct ScriptedRewriter {
        sizes: Vec<(PdfPreset, Option<usize>)>,
        calls: Mutex<Vec<PdfPreset>>,
    }

    impl PdfRewriter for ScriptedRewriter {
        fn name(&self) -> &str {
            "scripted"
        }

        fn rewrite(&self, preset: PdfPreset, _input: &Path, output: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(preset);
            match self.sizes.iter().find(|(p, _)| *p == preset) {
                Some((_, Some(len))) => {
                    std::fs::write(output, vec![b'x'; *len])?;
                    Ok(())
                }
                _ => Err(SizewerkError::ExternalToolFailed {
                    tool: "scripted".into(),
                    detail: "refused".into(),
                }),
            }
        }
    }

    fn run(
        rewriter: &dyn PdfRewriter,
        source: &Path,
        output: &Path,
        target: u64,
        observer: &mut RecordingObserver,
    ) -> Result<CompressionResult> {
        let registry = StrategyRegistry::default();
        let job = CompressionJob {
            source,
            output,
            target_bytes: target,
            original_size: SizeProbe::size_of(source).unwrap(),
        };
        let mut session = CompressionSession::new(observer, CancellationToken::new());
        PdfCompressor::new(rewriter, Some(60)).compress(
            &job,
            registry.strategies_for(DocumentKind::Pdf),
            &mut session,
        )
    }

    #[test]
    fn first_fitting_preset_wins() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.pdf");
        let out = dir.path().join("out.pdf");
        std::fs::write(&src, sample_pdf(1, false)).unwrap();

        let rewriter = ScriptedRewriter {
            sizes: vec![
                (PdfPreset::Default, Some(900)),
                (PdfPreset::Ebook, Some(400)),
                (PdfPreset::Screen, Some(100)),
            ],
            calls: Mutex::new(Vec::new()),
        };
        let mut observer = RecordingObserver::new();
        let result = run(&rewriter, &src, &out, 500, &mut observer).unwrap();

        assert!(result.met_target);
        assert_eq!(result.strategy, Strategy::PdfPreset { preset: PdfPreset::Ebook });
        assert_eq!(result.achieved_size, 400);
        assert_eq!(
            *rewriter.calls.lock().unwrap(),
            vec![PdfPreset::Default, PdfPreset::Ebook]
        );
    }

    #[test]
    fn failing_presets_fall_through_to_structural_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.pdf");
        let out = dir.path().join("out.pdf");
        std::fs::write(&src, sample_pdf(2, true)).unwrap();

        let rewriter = ScriptedRewriter {
            sizes: Vec::new(),
            calls: Mutex::new(Vec::new()),
        };
        let mut observer = RecordingObserver::new();
        let result = run(&rewriter, &src, &out, 1, &mut observer).unwrap();

        assert_eq!(result.strategy, Strategy::PdfStructuralRewrite);
        assert!(!result.met_target);
        assert!(!result.degraded);
        assert_eq!(observer.attempts.len(), 5);
        assert!(
            observer.attempts[..4]
                .iter()
                .all(|a| matches!(a.outcome, AttemptOutcome::Failed { .. }))
        );
        assert_eq!(PdfReader::open(&out).unwrap().page_count(), 2);
    }

    #[test]
    fn broken_pdf_is_copied_through() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.pdf");
        let out = dir.path().join("out.pdf");
        std::fs::write(&src, b"%PDF-1.4 truncated garbage").unwrap();

        let rewriter = ScriptedRewriter {
            sizes: Vec::new(),
            calls: Mutex::new(Vec::new()),
        };
        let mut observer = RecordingObserver::new();
        let result = run(&rewriter, &src, &out, 1, &mut observer).unwrap();

        assert_eq!(result.strategy, Strategy::Identity);
        assert_eq!(std::fs::read(&out).unwrap(), std::fs::read(&src).unwrap());
        assert_eq!(observer.fallbacks.len(), 1);
    }
}
