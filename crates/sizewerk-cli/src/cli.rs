// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sizewerk_core::types::SizeUnit;

#[derive(Debug, Parser)]
#[command(name = "sizewerk", version, about = "Compress documents to a target size")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compress an image, PDF, or office document to fit a target size.
    Compress {
        /// File to compress.
        file: PathBuf,
        /// Target size, in `--unit`s.
        size: f64,
        /// B, KB, MB, GB, or TB (binary multiples).
        #[arg(short, long, default_value = "MB")]
        unit: SizeUnit,
        /// Output path. Defaults to `<stem>_compressed.<ext>` next to the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// JSON engine configuration.
        #[arg(short, long, env = "SIZEWERK_CONFIG")]
        config: Option<PathBuf>,
        /// Ghostscript executable, overriding the configuration.
        #[arg(long, env = "SIZEWERK_GS")]
        gs: Option<String>,
        /// Include every attempted strategy in the report.
        #[arg(long)]
        attempts: bool,
    },
    /// Combine images into a PDF, one page per image.
    ImagesToPdf {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        #[arg(short, long, default_value = "images.pdf")]
        output: PathBuf,
        /// Document title stored in the PDF metadata.
        #[arg(short, long)]
        title: Option<String>,
    },
    /// Stamp diagonal text across every page of a PDF.
    Watermark {
        pdf: PathBuf,
        text: String,
        /// Output path. Defaults to `watermarked_<uuid>.pdf` next to the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_defaults_to_megabytes() {
        let cli = Cli::try_parse_from(["sizewerk", "compress", "scan.pdf", "1.5"]).unwrap();
        match cli.command {
            Command::Compress {
                file, size, unit, output, attempts, ..
            } => {
                assert_eq!(file, PathBuf::from("scan.pdf"));
                assert_eq!(size, 1.5);
                assert_eq!(unit, SizeUnit::MB);
                assert!(output.is_none());
                assert!(!attempts);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unit_is_case_insensitive() {
        let cli =
            Cli::try_parse_from(["sizewerk", "compress", "a.jpg", "300", "--unit", "kb"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Compress { unit: SizeUnit::KB, .. }
        ));
    }

    #[test]
    fn unknown_unit_is_rejected() {
        assert!(
            Cli::try_parse_from(["sizewerk", "compress", "a.jpg", "3", "--unit", "parsec"]).is_err()
        );
    }

    #[test]
    fn images_to_pdf_needs_an_image() {
        assert!(Cli::try_parse_from(["sizewerk", "images-to-pdf"]).is_err());
        let cli =
            Cli::try_parse_from(["sizewerk", "images-to-pdf", "a.png", "b.jpg", "-o", "out.pdf"])
                .unwrap();
        match cli.command {
            Command::ImagesToPdf {
                images,
                output,
                title,
            } => {
                assert_eq!(images.len(), 2);
                assert_eq!(output, PathBuf::from("out.pdf"));
                assert!(title.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
