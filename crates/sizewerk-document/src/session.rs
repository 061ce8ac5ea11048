// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-request state threaded through the compressors: the fixed job
// parameters, the observer, the cancellation flag, and the attempt count.

use std::path::Path;

use chrono::Utc;
use sizewerk_core::error::{Result, SizewerkError};
use sizewerk_core::types::{CancellationToken, CompressionRequest, CompressionResult, Strategy};

use crate::observer::{Attempt, AttemptOutcome, CompressionObserver};

/// Fixed inputs of one compression call.
#[derive(Debug, Clone, Copy)]
pub struct CompressionJob<'a> {
    pub source: &'a Path,
    pub output: &'a Path,
    pub target_bytes: u64,
    pub original_size: u64,
}

impl<'a> CompressionJob<'a> {
    /// Build the result for an output produced by `strategy`.
    pub fn conclude(
        &self,
        session: &CompressionSession<'_>,
        strategy: Strategy,
        achieved_size: u64,
        met_target: bool,
    ) -> CompressionResult {
        self.result(strategy, achieved_size, met_target, false, session.attempts())
    }

    pub fn result(
        &self,
        strategy: Strategy,
        achieved_size: u64,
        met_target: bool,
        degraded: bool,
        attempts: usize,
    ) -> CompressionResult {
        CompressionResult {
            output: self.output.to_path_buf(),
            achieved_size,
            original_size: self.original_size,
            strategy,
            met_target,
            degraded,
            attempts,
            completed_at: Utc::now(),
        }
    }
}

/// Mutable bookkeeping for one request.
pub struct CompressionSession<'a> {
    observer: &'a mut dyn CompressionObserver,
    cancel: CancellationToken,
    attempts: usize,
}

impl<'a> CompressionSession<'a> {
    pub fn new(observer: &'a mut dyn CompressionObserver, cancel: CancellationToken) -> Self {
        Self {
            observer,
            cancel,
            attempts: 0,
        }
    }

    pub fn start(&mut self, request: &CompressionRequest, original_size: u64) {
        self.observer.on_start(request, original_size);
    }

    /// Called before every new attempt.
    pub fn checkpoint(&self) -> Result<()> {
        self.cancel.check()
    }

    /// Record a produced artifact. Returns whether it fits under `target`.
    pub fn record(&mut self, strategy: Strategy, size: u64, target: u64) -> bool {
        let fits = size <= target;
        self.attempts += 1;
        self.observer.on_attempt(&Attempt {
            index: self.attempts,
            strategy,
            outcome: AttemptOutcome::Produced { size, fits },
        });
        fits
    }

    /// Record a step that produced nothing usable.
    pub fn record_failure(&mut self, strategy: Strategy, err: &SizewerkError) {
        self.attempts += 1;
        self.observer.on_attempt(&Attempt {
            index: self.attempts,
            strategy,
            outcome: AttemptOutcome::Failed {
                reason: err.to_string(),
            },
        });
    }

    pub fn fallback(&mut self, stage: &str, reason: &str) {
        self.observer.on_fallback(stage, reason);
    }

    pub fn finish(&mut self, result: &CompressionResult) {
        self.observer.on_finish(result);
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }
}
