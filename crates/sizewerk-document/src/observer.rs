// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-request progress reporting.
//
// The compressors never log progress on their own authority; they report each
// attempt to an observer supplied with the request. `TracingObserver` turns
// those reports into tracing events, `RecordingObserver` keeps them for the
// caller, and `NullObserver` drops them.

use serde::Serialize;
use sizewerk_core::types::{CompressionRequest, CompressionResult, Strategy};
use tracing::{info, warn};

/// What a single strategy step produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// An artifact was written and probed.
    Produced { size: u64, fits: bool },
    /// The step could not produce an artifact.
    Failed { reason: String },
}

/// One strategy step as seen by an observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    /// 1-based position within the request.
    pub index: usize,
    pub strategy: Strategy,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

impl Attempt {
    /// Probed size, if the step produced an artifact.
    pub fn size(&self) -> Option<u64> {
        match self.outcome {
            AttemptOutcome::Produced { size, .. } => Some(size),
            AttemptOutcome::Failed { .. } => None,
        }
    }
}

/// Receives progress for one compression request.
pub trait CompressionObserver {
    fn on_start(&mut self, _request: &CompressionRequest, _original_size: u64) {}

    fn on_attempt(&mut self, _attempt: &Attempt) {}

    /// A stage gave up and the request moved to a weaker path.
    fn on_fallback(&mut self, _stage: &str, _reason: &str) {}

    fn on_finish(&mut self, _result: &CompressionResult) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl CompressionObserver for NullObserver {}

/// Emits a tracing event for every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CompressionObserver for TracingObserver {
    fn on_start(&mut self, request: &CompressionRequest, original_size: u64) {
        info!(
            source = %request.source().display(),
            kind = request.kind().label(),
            original_size,
            requested = request.target().value,
            unit = %request.target().unit,
            target = request.target_bytes(),
            "Compression started"
        );
    }

    fn on_attempt(&mut self, attempt: &Attempt) {
        match &attempt.outcome {
            AttemptOutcome::Produced { size, fits } => info!(
                index = attempt.index,
                strategy = %attempt.strategy,
                size,
                fits,
                "Strategy attempted"
            ),
            AttemptOutcome::Failed { reason } => warn!(
                index = attempt.index,
                strategy = %attempt.strategy,
                reason = %reason,
                "Strategy failed"
            ),
        }
    }

    fn on_fallback(&mut self, stage: &str, reason: &str) {
        warn!(stage, reason, "Falling back");
    }

    fn on_finish(&mut self, result: &CompressionResult) {
        info!(
            output = %result.output.display(),
            achieved = result.achieved_size,
            original = result.original_size,
            strategy = %result.strategy,
            met_target = result.met_target,
            degraded = result.degraded,
            "Compression finished"
        );
    }
}

/// Keeps every callback for later inspection.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub attempts: Vec<Attempt>,
    pub fallbacks: Vec<(String, String)>,
    pub finished: Option<CompressionResult>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strategies in the order they were tried.
    pub fn strategies(&self) -> Vec<Strategy> {
        self.attempts.iter().map(|a| a.strategy).collect()
    }
}

impl CompressionObserver for RecordingObserver {
    fn on_attempt(&mut self, attempt: &Attempt) {
        self.attempts.push(attempt.clone());
    }

    fn on_fallback(&mut self, stage: &str, reason: &str) {
        self.fallbacks.push((stage.to_string(), reason.to_string()));
    }

    fn on_finish(&mut self, result: &CompressionResult) {
        self.finished = Some(result.clone());
    }
}
