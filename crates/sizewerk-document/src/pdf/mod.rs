// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — external preset rewriting, in-process structural rewriting,
// the compressor that sequences them, and the image/watermark utilities.

pub mod compressor;
pub mod ghostscript;
pub mod reader;
pub mod watermark;
pub mod writer;

pub use compressor::PdfCompressor;
pub use ghostscript::{GhostscriptRewriter, PdfRewriter};
pub use reader::PdfReader;
pub use watermark::add_text_watermark;
pub use writer::PdfWriter;
