// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sizewerk — Core types, error taxonomy, and configuration shared across all crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::CompressionConfig;
pub use error::{Disposition, Result, SizewerkError};
pub use types::*;
