// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration. The defaults reproduce the stock strategy tables; a
// JSON file can override any subset of them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SizewerkError};
use crate::types::PdfPreset;

/// Bounds of the image quality ladder and downscale sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageLadder {
    /// First quality tried.
    pub start_quality: u8,
    /// Decrement between quality steps.
    pub quality_step: u8,
    /// Lowest quality of the ladder (inclusive).
    pub min_quality: u8,
    /// Quality used for every downscale step.
    pub floor_quality: u8,
    /// First downscale step, percent of the original dimensions.
    pub start_scale_pct: u8,
    pub scale_step_pct: u8,
    /// Smallest downscale step (inclusive).
    pub min_scale_pct: u8,
}

impl Default for ImageLadder {
    fn default() -> Self {
        Self {
            start_quality: 90,
            quality_step: 10,
            min_quality: 20,
            floor_quality: 10,
            start_scale_pct: 90,
            scale_step_pct: 10,
            min_scale_pct: 30,
        }
    }
}

/// PDF rewriting settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfSettings {
    /// Ghostscript executable (`gs`, `gswin64c`, or an absolute path).
    pub ghostscript: String,
    /// Presets tried in order.
    pub presets: Vec<PdfPreset>,
    /// Wall-clock limit for one external invocation.
    pub tool_timeout_secs: u64,
    /// JPEG quality for re-encoding embedded images during the in-process
    /// rewrite. `None` leaves embedded images untouched.
    pub embedded_image_quality: Option<u8>,
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            ghostscript: "gs".into(),
            presets: vec![
                PdfPreset::Default,
                PdfPreset::Ebook,
                PdfPreset::Screen,
                PdfPreset::Printer,
            ],
            tool_timeout_secs: 120,
            embedded_image_quality: Some(60),
        }
    }
}

/// Office package settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// Fixed quality for embedded raster assets.
    pub media_quality: u8,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self { media_quality: 60 }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub image: ImageLadder,
    pub pdf: PdfSettings,
    pub container: ContainerSettings,
}

impl CompressionConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SizewerkError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject ladders that could not terminate or would encode garbage.
    pub fn validate(&self) -> Result<()> {
        let image = &self.image;
        let quality_ok = |q: u8| (1..=100).contains(&q);
        if !quality_ok(image.start_quality)
            || !quality_ok(image.min_quality)
            || !quality_ok(image.floor_quality)
        {
            return Err(SizewerkError::InvalidInput(
                "image qualities must lie in 1..=100".into(),
            ));
        }
        if image.min_quality > image.start_quality {
            return Err(SizewerkError::InvalidInput(
                "image.min_quality exceeds image.start_quality".into(),
            ));
        }
        if image.quality_step == 0 || image.scale_step_pct == 0 {
            return Err(SizewerkError::InvalidInput(
                "ladder steps must be non-zero".into(),
            ));
        }
        if image.start_scale_pct > 100
            || image.min_scale_pct == 0
            || image.min_scale_pct > image.start_scale_pct
        {
            return Err(SizewerkError::InvalidInput(
                "downscale percentages must satisfy 0 < min <= start <= 100".into(),
            ));
        }
        if self.pdf.ghostscript.trim().is_empty() {
            return Err(SizewerkError::InvalidInput(
                "pdf.ghostscript must name an executable".into(),
            ));
        }
        if self.pdf.tool_timeout_secs == 0 {
            return Err(SizewerkError::InvalidInput(
                "pdf.tool_timeout_secs must be positive".into(),
            ));
        }
        if let Some(q) = self.pdf.embedded_image_quality
            && !quality_ok(q)
        {
            return Err(SizewerkError::InvalidInput(
                "pdf.embedded_image_quality must lie in 1..=100".into(),
            ));
        }
        if !quality_ok(self.container.media_quality) {
            return Err(SizewerkError::InvalidInput(
                "container.media_quality must lie in 1..=100".into(),
            ));
        }
        Ok(())
    }
}
