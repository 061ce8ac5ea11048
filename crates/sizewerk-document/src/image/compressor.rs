// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image compressor — walks the quality ladder, then the downscale sweep, and
// stops at the first step whose output fits.

use sizewerk_core::error::{Result, SizewerkError};
use sizewerk_core::types::{CompressionResult, RasterFormat, Strategy};
use tracing::{debug, info, instrument, warn};

use crate::artifact::write_artifact;
use crate::image::processor::ImageProcessor;
use crate::probe::SizeProbe;
use crate::session::{CompressionJob, CompressionSession};

/// First-fit search over quality and resolution for one raster format.
///
/// The output file is overwritten in place on every step; when no step fits,
/// whatever the last step wrote is the best-effort result.
pub struct ImageCompressor {
    format: RasterFormat,
}

impl ImageCompressor {
    pub fn new(format: RasterFormat) -> Self {
        Self { format }
    }

    /// Compress `job.source` into `job.output`.
    ///
    /// `ImageQuality` steps re-encode the normalised original; `ImageDownscale`
    /// steps resize the normalised original (never a previous step's output).
    /// Other strategy variants are ignored. Lossless encoders ignore quality,
    /// so only the first quality step is encoded for them.
    #[instrument(skip_all, fields(format = ?self.format, target = job.target_bytes))]
    pub fn compress(
        &self,
        job: &CompressionJob<'_>,
        strategies: &[Strategy],
        session: &mut CompressionSession<'_>,
    ) -> Result<CompressionResult> {
        session.checkpoint()?;
        let original = ImageProcessor::open(job.source)?.normalize_for(self.format);

        let mut quality_steps_taken = 0usize;
        let mut last: Option<(Strategy, u64)> = None;

        for &strategy in strategies {
            let candidate = match strategy {
                Strategy::ImageQuality { quality } => {
                    if !self.format.is_lossy() && quality_steps_taken > 0 {
                        debug!(quality, "Skipping quality step for lossless encoder");
                        continue;
                    }
                    quality_steps_taken += 1;
                    session.checkpoint()?;
                    original.encode(self.format, quality)?
                }
                Strategy::ImageDownscale { scale_pct, quality } => {
                    session.checkpoint()?;
                    original.scaled(scale_pct).encode(self.format, quality)?
                }
                _ => continue,
            };

            write_artifact(job.output, &candidate)?;
            let size = SizeProbe::size_of(job.output)?;
            if session.record(strategy, size, job.target_bytes) {
                info!(%strategy, size, "Image fits target");
                return Ok(job.conclude(session, strategy, size, true));
            }
            last = Some((strategy, size));
        }

        match last {
            Some((strategy, size)) => {
                warn!(
                    %strategy,
                    size,
                    target = job.target_bytes,
                    "Could not reach target size, returning smallest attempt"
                );
                Ok(job.conclude(session, strategy, size, false))
            }
            None => Err(SizewerkError::UnsupportedFormat(format!(
                "no image strategies configured for {:?}",
                self.format
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;
    use crate::registry::StrategyRegistry;
    use image::{DynamicImage, Rgb, RgbImage};
    use sizewerk_core::types::{CancellationToken, DocumentKind};
    use std::path::Path;

    /// Pseudo-random noise compresses badly, so every step stays measurable.
    fn noisy_jpeg(path: &Path, width: u32, height: u32) {
        let mut state: u32 = 0x1234_5678;
        let img = RgbImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            Rgb([state as u8, (state >> 8) as u8, (state >> 16) as u8])
        });
        let bytes = ImageProcessor::from_dynamic(DynamicImage::ImageRgb8(img))
            .encode(RasterFormat::Jpeg, 100)
            .unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    fn run(
        source: &Path,
        output: &Path,
        target: u64,
        format: RasterFormat,
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
        ImageCompressor::new(format).compress(
            &job,
            registry.strategies_for(DocumentKind::Image(format)),
            &mut session,
        )
    }

    #[test]
    fn first_fit_stops_at_first_step_under_target() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.jpg");
        let out = dir.path().join("out.jpg");
        noisy_jpeg(&src, 160, 120);

        // Generous target: quality 90 already fits.
        let mut observer = RecordingObserver::new();
        let result = run(&src, &out, u64::MAX / 2, RasterFormat::Jpeg, &mut observer).unwrap();
        assert!(result.met_target);
        assert_eq!(observer.attempts.len(), 1);
        assert_eq!(result.strategy, Strategy::ImageQuality { quality: 90 });
        assert_eq!(result.achieved_size, SizeProbe::size_of(&out).unwrap());
    }

    #[test]
    fn result_size_equals_the_fitting_step() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.jpg");
        let out = dir.path().join("out.jpg");
        noisy_jpeg(&src, 160, 120);

        // Learn the size at quality 50, then ask for exactly that.
        let mut probe_observer = RecordingObserver::new();
        run(&src, &out, 1, RasterFormat::Jpeg, &mut probe_observer).unwrap();
        let q50 = probe_observer
            .attempts
            .iter()
            .find(|a| a.strategy == Strategy::ImageQuality { quality: 50 })
            .and_then(|a| a.size())
            .unwrap();

        let mut observer = RecordingObserver::new();
        let result = run(&src, &out, q50, RasterFormat::Jpeg, &mut observer).unwrap();
        assert!(result.met_target);
        assert!(result.achieved_size <= q50);
        let fitting = observer.attempts.last().unwrap();
        assert_eq!(fitting.size(), Some(result.achieved_size));
        // No step after the fitting one.
        assert_eq!(observer.attempts.len(), result.attempts);
    }

    #[test]
    fn unreachable_target_sweeps_everything_and_returns_last() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.jpg");
        let out = dir.path().join("out.jpg");
        noisy_jpeg(&src, 120, 90);

        let mut observer = RecordingObserver::new();
        let result = run(&src, &out, 1, RasterFormat::Jpeg, &mut observer).unwrap();

        assert!(!result.met_target);
        assert_eq!(observer.attempts.len(), 8 + 7);
        assert_eq!(
            result.strategy,
            Strategy::ImageDownscale { scale_pct: 30, quality: 10 }
        );
        assert_eq!(result.achieved_size, SizeProbe::size_of(&out).unwrap());

        // Strictly decreasing qualities, then strictly decreasing scales.
        let strategies = observer.strategies();
        let qualities: Vec<u8> = strategies
            .iter()
            .filter_map(|s| match s {
                Strategy::ImageQuality { quality } => Some(*quality),
                _ => None,
            })
            .collect();
        let scales: Vec<u8> = strategies
            .iter()
            .filter_map(|s| match s {
                Strategy::ImageDownscale { scale_pct, .. } => Some(*scale_pct),
                _ => None,
            })
            .collect();
        assert!(qualities.windows(2).all(|w| w[0] > w[1]));
        assert!(scales.windows(2).all(|w| w[0] > w[1]));

        let final_image = image::open(&out).unwrap();
        assert_eq!((final_image.width(), final_image.height()), (36, 27));
    }

    #[test]
    fn lossless_format_skips_redundant_quality_steps() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.png");
        let out = dir.path().join("out.png");
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]));
        img.save(&src).unwrap();

        let mut observer = RecordingObserver::new();
        let result = run(&src, &out, 1, RasterFormat::Png, &mut observer).unwrap();
        assert!(!result.met_target);
        assert_eq!(observer.attempts.len(), 1 + 7);
        assert!(observer.attempts.iter().all(|a| a.size().is_some_and(|s| s > 0)));
    }

    #[test]
    fn cancellation_stops_before_next_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.jpg");
        let out = dir.path().join("out.jpg");
        noisy_jpeg(&src, 32, 32);

        let token = CancellationToken::new();
        token.cancel();
        let mut observer = RecordingObserver::new();
        let mut session = CompressionSession::new(&mut observer, token);
        let job = CompressionJob {
            source: &src,
            output: &out,
            target_bytes: 1,
            original_size: SizeProbe::size_of(&src).unwrap(),
        };
        let err = ImageCompressor::new(RasterFormat::Jpeg)
            .compress(
                &job,
                StrategyRegistry::default()
                    .strategies_for(DocumentKind::Image(RasterFormat::Jpeg)),
                &mut session,
            )
            .unwrap_err();
        assert!(matches!(err, SizewerkError::Cancelled));
        assert!(observer.attempts.is_empty());
    }

    #[test]
    fn undecodable_input_is_an_image_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("broken.jpg");
        let out = dir.path().join("out.jpg");
        std::fs::write(&src, b"definitely not a jpeg").unwrap();
        let mut observer = RecordingObserver::new();
        let err = run(&src, &out, 1, RasterFormat::Jpeg, &mut observer).unwrap_err();
        assert!(matches!(err, SizewerkError::ImageError(_)));
    }
}
