// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Sizewerk.
//
// Only a handful of errors ever reach the caller. Everything else is absorbed
// by the orchestrator and turned into a best-effort result; `disposition()`
// draws that line.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all Sizewerk operations.
#[derive(Debug, Error)]
pub enum SizewerkError {
    // -- Input validation --
    #[error("artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid target size: {0}")]
    InvalidTarget(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    // -- External collaborators --
    #[error("external tool unavailable: {0}")]
    ExternalToolUnavailable(String),

    #[error("external tool {tool} failed: {detail}")]
    ExternalToolFailed { tool: String, detail: String },

    // -- Codec errors --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("container operation failed: {0}")]
    ContainerError(String),

    // -- Output --
    #[error("failed writing {}: {source}", path.display())]
    PartialWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("compression cancelled")]
    Cancelled,

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What the orchestrator does with an error raised inside a compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Hand the error to the caller unchanged.
    Propagate,
    /// Swallow it and fall back to a copy-through result.
    Degrade,
}

impl SizewerkError {
    /// Classify this error for the orchestrator boundary.
    pub fn disposition(&self) -> Disposition {
        match self {
            SizewerkError::NotFound(_)
            | SizewerkError::InvalidTarget(_)
            | SizewerkError::InvalidInput(_)
            | SizewerkError::Cancelled => Disposition::Propagate,

            SizewerkError::UnsupportedFormat(_)
            | SizewerkError::ExternalToolUnavailable(_)
            | SizewerkError::ExternalToolFailed { .. }
            | SizewerkError::ImageError(_)
            | SizewerkError::PdfError(_)
            | SizewerkError::ContainerError(_)
            | SizewerkError::PartialWrite { .. }
            | SizewerkError::Serialization(_) => Disposition::Degrade,

            // A vanished source is still fatal even when it surfaces as a raw io error.
            SizewerkError::Io(io_err) => match io_err.kind() {
                std::io::ErrorKind::NotFound => Disposition::Propagate,
                _ => Disposition::Degrade,
            },
        }
    }

    /// Build a `PartialWrite` for `path`.
    pub fn partial_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SizewerkError::PartialWrite {
            path: path.into(),
            source,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SizewerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_propagates() {
        let err = SizewerkError::NotFound(PathBuf::from("/nope.jpg"));
        assert_eq!(err.disposition(), Disposition::Propagate);
        assert!(err.to_string().contains("/nope.jpg"));
    }

    #[test]
    fn tool_failures_degrade() {
        let unavailable = SizewerkError::ExternalToolUnavailable("gs".into());
        let failed = SizewerkError::ExternalToolFailed {
            tool: "gs".into(),
            detail: "exit status 1".into(),
        };
        assert_eq!(unavailable.disposition(), Disposition::Degrade);
        assert_eq!(failed.disposition(), Disposition::Degrade);
    }

    #[test]
    fn cancellation_propagates() {
        assert_eq!(SizewerkError::Cancelled.disposition(), Disposition::Propagate);
    }

    #[test]
    fn io_not_found_propagates_other_io_degrades() {
        let missing = SizewerkError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        let denied =
            SizewerkError::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert_eq!(missing.disposition(), Disposition::Propagate);
        assert_eq!(denied.disposition(), Disposition::Degrade);
    }

    #[test]
    fn partial_write_mentions_path() {
        let err = SizewerkError::partial_write(
            "/tmp/out.pdf",
            std::io::Error::other("disk full"),
        );
        assert_eq!(err.disposition(), Disposition::Degrade);
        assert!(err.to_string().contains("/tmp/out.pdf"));
    }
}
