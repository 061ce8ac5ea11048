// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Strategy registry — which compression steps each document kind gets, in
// order from least to most aggressive.

use sizewerk_core::config::{CompressionConfig, ImageLadder};
use sizewerk_core::types::{DocumentKind, Strategy};
use tracing::debug;

/// Immutable kind -> ordered strategy table, built once at startup and shared
/// read-only between requests.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    image: Vec<Strategy>,
    pdf: Vec<Strategy>,
    container: Vec<Strategy>,
    identity: [Strategy; 1],
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::from_config(&CompressionConfig::default())
    }
}

impl StrategyRegistry {
    pub fn from_config(config: &CompressionConfig) -> Self {
        let image = image_ladder(&config.image);

        let mut pdf: Vec<Strategy> = config
            .pdf
            .presets
            .iter()
            .map(|&preset| Strategy::PdfPreset { preset })
            .collect();
        pdf.push(Strategy::PdfStructuralRewrite);

        let container = vec![Strategy::ContainerMediaRecompress {
            quality: config.container.media_quality,
        }];

        debug!(
            image_steps = image.len(),
            pdf_steps = pdf.len(),
            "Strategy registry built"
        );

        Self {
            image,
            pdf,
            container,
            identity: [Strategy::Identity],
        }
    }

    /// Ordered strategies for `kind`. Unsupported kinds get a single identity copy.
    pub fn strategies_for(&self, kind: DocumentKind) -> &[Strategy] {
        match kind {
            DocumentKind::Image(_) => &self.image,
            DocumentKind::Pdf => &self.pdf,
            DocumentKind::Container(_) => &self.container,
            DocumentKind::Unsupported => &self.identity,
        }
    }
}

/// Quality steps from `start_quality` down to `min_quality`, then downscale
/// steps from `start_scale_pct` down to `min_scale_pct` at `floor_quality`.
fn image_ladder(ladder: &ImageLadder) -> Vec<Strategy> {
    let mut steps = Vec::new();

    let mut quality = i32::from(ladder.start_quality);
    while quality >= i32::from(ladder.min_quality) {
        steps.push(Strategy::ImageQuality {
            quality: quality as u8,
        });
        quality -= i32::from(ladder.quality_step.max(1));
    }

    let mut scale = i32::from(ladder.start_scale_pct);
    while scale >= i32::from(ladder.min_scale_pct.max(1)) {
        steps.push(Strategy::ImageDownscale {
            scale_pct: scale as u8,
            quality: ladder.floor_quality,
        });
        scale -= i32::from(ladder.scale_step_pct.max(1));
    }

    steps
}
