// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ZIP-based office packages (OOXML and OpenDocument).

pub mod recompressor;

pub use recompressor::ContainerRecompressor;
