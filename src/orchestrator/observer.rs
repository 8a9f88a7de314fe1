//! Observer hooks for loop generation events.

use crate::error::LoopGenError;
use crate::strategy::StrategyId;

/// Receives progress events from the orchestrator and its strategies.
///
/// Every method has an empty default, so implementors only override what they
/// care about.
pub trait LoopObserver: Send + Sync {
    /// Silence pruning finished; lengths are in samples
    fn silence_pruned(&self, _before: usize, _after: usize, _sample_rate: u32) {}

    fn strategy_evaluated(&self, _id: StrategyId, _suitable: bool) {}

    /// An analysis error made a strategy unsuitable
    fn analysis_failed(&self, _id: StrategyId, _error: &LoopGenError) {}

    fn loop_created(&self, _id: StrategyId, _duration_ms: u64) {}

    /// A suitable strategy failed to build its loop; the next one is tried
    fn creation_failed(&self, _id: StrategyId, _error: &LoopGenError) {}

    /// The global crossfade did not fit the loop and was left out
    fn crossfade_skipped(&self, _error: &LoopGenError) {}

    fn no_loop_found(&self, _attempted: &[StrategyId]) {}

    fn cancelled(&self) {}
}

/// Forwards every event to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl LoopObserver for TracingObserver {
    fn silence_pruned(&self, before: usize, after: usize, sample_rate: u32) {
        if after < before {
            tracing::info!(
                removed_ms = (before - after) as u64 * 1000 / sample_rate.max(1) as u64,
                before,
                after,
                "pruned silence"
            );
        }
    }

    fn strategy_evaluated(&self, id: StrategyId, suitable: bool) {
        tracing::debug!(strategy = %id, suitable, "strategy evaluated");
    }

    fn analysis_failed(&self, id: StrategyId, error: &LoopGenError) {
        tracing::warn!(strategy = %id, code = error.error_code(), "analysis failed: {}", error);
    }

    fn loop_created(&self, id: StrategyId, duration_ms: u64) {
        tracing::info!(strategy = %id, duration_ms, "loop created");
    }

    fn creation_failed(&self, id: StrategyId, error: &LoopGenError) {
        tracing::warn!(strategy = %id, code = error.error_code(), "loop creation failed: {}", error);
    }

    fn crossfade_skipped(&self, error: &LoopGenError) {
        tracing::warn!("global crossfade skipped: {}", error);
    }

    fn no_loop_found(&self, attempted: &[StrategyId]) {
        tracing::info!(attempted = ?attempted, "no loop found");
    }

    fn cancelled(&self) {
        tracing::info!("loop generation cancelled");
    }
}
