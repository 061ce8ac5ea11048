// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Sizewerk compression engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SizewerkError};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

// -- Sizes --------------------------------------------------------------------

/// Units accepted for a target size. All multiples are binary (1 KB = 1024 B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeUnit {
    B,
    KB,
    MB,
    GB,
    TB,
}

impl SizeUnit {
    /// Number of bytes in one unit.
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::B => 1.0,
            Self::KB => 1024.0,
            Self::MB => BYTES_PER_MB,
            Self::GB => BYTES_PER_MB * 1024.0,
            Self::TB => BYTES_PER_MB * 1024.0 * 1024.0,
        }
    }
}

impl std::str::FromStr for SizeUnit {
    type Err = SizewerkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "B" | "BYTES" => Ok(Self::B),
            "KB" | "K" => Ok(Self::KB),
            "MB" | "M" => Ok(Self::MB),
            "GB" | "G" => Ok(Self::GB),
            "TB" | "T" => Ok(Self::TB),
            other => Err(SizewerkError::InvalidTarget(format!(
                "unknown size unit {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for SizeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::B => "B",
            Self::KB => "KB",
            Self::MB => "MB",
            Self::GB => "GB",
            Self::TB => "TB",
        };
        f.write_str(label)
    }
}

/// A requested output size in any unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSize {
    pub value: f64,
    pub unit: SizeUnit,
}

impl TargetSize {
    pub fn new(value: f64, unit: SizeUnit) -> Self {
        Self { value, unit }
    }

    pub fn bytes(value: u64) -> Self {
        Self::new(value as f64, SizeUnit::B)
    }

    pub fn megabytes(value: f64) -> Self {
        Self::new(value, SizeUnit::MB)
    }

    /// Canonicalise to whole bytes (floored). Rejects non-finite and
    /// non-positive values.
    pub fn to_bytes(&self) -> Result<u64> {
        if !self.value.is_finite() || self.value <= 0.0 {
            return Err(SizewerkError::InvalidTarget(format!(
                "target must be a positive number, got {} {}",
                self.value, self.unit
            )));
        }
        let bytes = (self.value * self.unit.multiplier()).floor();
        if bytes < 1.0 {
            return Err(SizewerkError::InvalidTarget(format!(
                "target {} {} is smaller than one byte",
                self.value, self.unit
            )));
        }
        // Saturates for absurdly large targets, which is what we want.
        Ok(bytes as u64)
    }
}

/// Convert a byte count into megabytes rounded to two decimals.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_MB)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// -- Document classification --------------------------------------------------

/// Raster encodings the image compressor can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RasterFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
    WebP,
}

impl RasterFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Whether the encoder honours a quality setting.
    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

/// ZIP-based office packages, keyed by where they keep embedded media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerFlavor {
    /// WordprocessingML (docx and friends).
    Word,
    /// SpreadsheetML (xlsx).
    Spreadsheet,
    /// PresentationML (pptx).
    Presentation,
    /// OpenDocument text, spreadsheet, and presentation files.
    OpenDocument,
}

impl ContainerFlavor {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "docx" | "docm" | "dotx" | "dotm" => Some(Self::Word),
            "xlsx" | "xlsm" => Some(Self::Spreadsheet),
            "pptx" | "pptm" => Some(Self::Presentation),
            "odt" | "ods" | "odp" => Some(Self::OpenDocument),
            _ => None,
        }
    }

    /// Archive directory holding the embedded raster assets.
    pub fn media_dir(&self) -> &'static str {
        match self {
            Self::Word => "word/media",
            Self::Spreadsheet => "xl/media",
            Self::Presentation => "ppt/media",
            Self::OpenDocument => "Pictures",
        }
    }
}

/// What kind of document an artifact is, decided once from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Image(RasterFormat),
    Pdf,
    Container(ContainerFlavor),
    /// Anything else, including legacy binary `.doc`; copied through.
    Unsupported,
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Self {
        if ext.eq_ignore_ascii_case("pdf") {
            return Self::Pdf;
        }
        if let Some(format) = RasterFormat::from_extension(ext) {
            return Self::Image(format);
        }
        if let Some(flavor) = ContainerFlavor::from_extension(ext) {
            return Self::Container(flavor);
        }
        Self::Unsupported
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unsupported)
    }

    /// Short label for logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Pdf => "pdf",
            Self::Container(_) => "container",
            Self::Unsupported => "unsupported",
        }
    }
}

// -- Strategies ---------------------------------------------------------------

/// Ghostscript `-dPDFSETTINGS` presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfPreset {
    Default,
    Ebook,
    Screen,
    Printer,
}

impl PdfPreset {
    /// Value passed as `-dPDFSETTINGS=/<keyword>`.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Ebook => "ebook",
            Self::Screen => "screen",
            Self::Printer => "printer",
        }
    }

    /// Position in the default escalation order.
    pub fn rank(&self) -> u32 {
        match self {
            Self::Default => 1,
            Self::Ebook => 2,
            Self::Screen => 3,
            Self::Printer => 4,
        }
    }
}

/// One ordered, parameterised compression attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Strategy {
    /// Copy the artifact through untouched.
    Identity,
    /// Re-encode a raster at the given quality (1-100).
    ImageQuality { quality: u8 },
    /// Resize a raster to `scale_pct` percent of its size, then encode at `quality`.
    ImageDownscale { scale_pct: u8, quality: u8 },
    /// Rewrite a PDF through the external tool with a preset.
    PdfPreset { preset: PdfPreset },
    /// Copy every page into a fresh PDF in-process.
    PdfStructuralRewrite,
    /// Re-encode embedded rasters of an office package once.
    ContainerMediaRecompress { quality: u8 },
}

impl Strategy {
    pub fn name(&self) -> String {
        match self {
            Self::Identity => "identity".into(),
            Self::ImageQuality { quality } => format!("image-quality-{quality}"),
            Self::ImageDownscale { scale_pct, quality } => {
                format!("image-downscale-{scale_pct}pct-q{quality}")
            }
            Self::PdfPreset { preset } => format!("pdf-preset-{}", preset.keyword()),
            Self::PdfStructuralRewrite => "pdf-structural-rewrite".into(),
            Self::ContainerMediaRecompress { quality } => {
                format!("container-media-q{quality}")
            }
        }
    }

    /// Monotonic rank within a kind's strategy list: higher means more
    /// fidelity is given up.
    pub fn aggressiveness(&self) -> u32 {
        match self {
            Self::Identity => 0,
            Self::ImageQuality { quality } => 100 - u32::from(*quality).min(100),
            Self::ImageDownscale { scale_pct, .. } => 200 - u32::from(*scale_pct).min(100),
            Self::PdfPreset { preset } => preset.rank(),
            Self::PdfStructuralRewrite => 10,
            Self::ContainerMediaRecompress { quality } => 100 - u32::from(*quality).min(100),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

// -- Cancellation -------------------------------------------------------------

/// Cooperative cancellation flag shared between a caller and a running request.
///
/// Compressors check it before each new attempt, never in the middle of one.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once `cancel` has been called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SizewerkError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// -- Request / result ---------------------------------------------------------

/// A single compression invocation. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    source: PathBuf,
    target: TargetSize,
    target_bytes: u64,
    kind: DocumentKind,
    output: Option<PathBuf>,
    cancel: CancellationToken,
}

impl CompressionRequest {
    /// Build a request, normalising the target to bytes and classifying the
    /// source by extension.
    pub fn new(source: impl Into<PathBuf>, target: TargetSize) -> Result<Self> {
        let source = source.into();
        let target_bytes = target.to_bytes()?;
        let kind = DocumentKind::from_path(&source);
        Ok(Self {
            source,
            target,
            target_bytes,
            kind,
            output: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Write the result to `output` instead of the default `<stem>_compressed.<ext>`.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn target(&self) -> TargetSize {
        self.target
    }

    pub fn target_bytes(&self) -> u64 {
        self.target_bytes
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Output path: the explicit one, or `<dir>/<stem>_compressed.<ext>`.
    pub fn output_path(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }
        let stem = self
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".into());
        let file_name = match self.source.extension() {
            Some(ext) => format!("{stem}_compressed.{}", ext.to_string_lossy()),
            None => format!("{stem}_compressed"),
        };
        self.source.with_file_name(file_name)
    }
}

/// Outcome of one compression request. Produced once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionResult {
    /// Newly created artifact, owned by the caller.
    pub output: PathBuf,
    pub achieved_size: u64,
    pub original_size: u64,
    /// Strategy that produced the output.
    pub strategy: Strategy,
    pub met_target: bool,
    /// True when a compressor failed and the original was copied through.
    pub degraded: bool,
    /// Number of strategy steps actually tried.
    pub attempts: usize,
    pub completed_at: DateTime<Utc>,
}

impl CompressionResult {
    /// `1 - achieved / original`, or 0 for an empty original.
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        1.0 - self.achieved_size as f64 / self.original_size as f64
    }

    pub fn report(&self) -> CompressReport {
        CompressReport::from(self)
    }
}

/// Outbound summary handed to a shell (CLI, web front-end).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressReport {
    #[serde(rename = "originalSize")]
    pub original_size_mb: f64,
    #[serde(rename = "compressedSize")]
    pub compressed_size_mb: f64,
    #[serde(rename = "compressionRatio")]
    pub compression_ratio_pct: f64,
    pub output_artifact: PathBuf,
    pub met_target: bool,
    pub strategy: String,
}

impl From<&CompressionResult> for CompressReport {
    fn from(result: &CompressionResult) -> Self {
        Self {
            original_size_mb: bytes_to_mb(result.original_size),
            compressed_size_mb: bytes_to_mb(result.achieved_size),
            compression_ratio_pct: round2(result.compression_ratio() * 100.0),
            output_artifact: result.output.clone(),
            met_target: result.met_target,
            strategy: result.strategy.name(),
        }
    }
}
