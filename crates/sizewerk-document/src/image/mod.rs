// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — encoding pipeline and the quality/downscale search.

pub mod compressor;
pub mod processor;

pub use compressor::ImageCompressor;
pub use processor::ImageProcessor;
