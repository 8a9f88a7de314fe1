//! Loop Orchestrator
//!
//! Drives one loop request end to end:
//! 1. Validate the request
//! 2. Prune silence
//! 3. Try the candidate strategies in priority order, stopping at the first
//!    loop that builds
//! 4. Optionally blend the result's tail into its head, dropping the blended
//!    head so the loop wraps without a jump
//!
//! Cancellation and deadlines are honoured between strategy attempts.

mod observer;

pub use observer::{LoopObserver, TracingObserver};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::analysis::{SignalAnalysis, SpectralAnalyzer};
use crate::config::{EngineConfig, LoopParams};
use crate::dsp::crossfade::{loop_crossfade_in_place, CurveShape, FadeLevels};
use crate::dsp::SilencePruner;
use crate::engine::AudioBuffer;
use crate::error::Result;
use crate::strategy::{LoopState, LoopStrategy, StrategyContext, StrategyId};

/// Strategies tried when fade fallback is disabled, in priority order
pub const DEFAULT_CANDIDATES: [StrategyId; 3] = [
    StrategyId::BeatAligned,
    StrategyId::TransientAligned,
    StrategyId::SpectralCrossFade,
];

/// A finished loop
#[derive(Debug, Clone)]
pub struct LoopResult {
    pub audio: AudioBuffer,
    pub strategy_id: StrategyId,
}

/// How a loop request ended
#[derive(Debug, Clone)]
pub enum LoopOutcome {
    Created(LoopResult),
    /// Every candidate was unsuitable or failed
    NoLoopFound,
    /// Stopped by the cancellation flag or deadline
    Cancelled,
}

impl LoopOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, LoopOutcome::Created(_))
    }

    pub fn into_result(self) -> Option<LoopResult> {
        match self {
            LoopOutcome::Created(result) => Some(result),
            _ => None,
        }
    }
}

/// Suitability of one strategy for a buffer
#[derive(Debug, Clone, Serialize)]
pub struct StrategyReport {
    pub strategy: StrategyId,
    pub suitable: bool,
    pub state: LoopState,
}

/// Runs loop requests against a fixed configuration
pub struct LoopOrchestrator {
    config: EngineConfig,
    analysis: Arc<dyn SignalAnalysis>,
    observer: Arc<dyn LoopObserver>,
    cancel: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl LoopOrchestrator {
    /// # Errors
    /// `InvalidParameter` if the configuration does not validate
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let analysis = Arc::new(SpectralAnalyzer::with_settings(config.analyzer));
        Ok(Self {
            config,
            analysis,
            observer: Arc::new(TracingObserver),
            cancel: None,
            deadline: None,
        })
    }

    /// Replace the spectral analysis backend
    pub fn with_analysis(mut self, analysis: Arc<dyn SignalAnalysis>) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LoopObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Stop before the next strategy once `flag` is set
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Stop before the next strategy once `deadline` has passed
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Strategies to try, in order.
    ///
    /// A pinned strategy is the only candidate; pinning the fade fallback
    /// works even when it is disabled.
    pub fn candidates(&self, pinned: Option<StrategyId>) -> Vec<StrategyId> {
        if let Some(id) = pinned {
            return vec![id];
        }
        let mut ids = DEFAULT_CANDIDATES.to_vec();
        if self.config.enable_fade_fallback {
            ids.push(StrategyId::FadeFallback);
        }
        ids
    }

    fn should_stop(&self) -> bool {
        let cancelled = self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed));
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        cancelled || expired
    }

    fn context<'a>(&'a self, audio: &'a AudioBuffer, min_duration_ms: u64) -> StrategyContext<'a> {
        StrategyContext {
            audio,
            min_duration_ms,
            analysis: Arc::clone(&self.analysis),
            observer: Arc::clone(&self.observer),
            settings: &self.config.strategies,
        }
    }

    fn prune(&self, audio: &AudioBuffer) -> Result<AudioBuffer> {
        let pruned = SilencePruner::new(self.config.silence)?.prune(audio)?;
        self.observer
            .silence_pruned(audio.len(), pruned.len(), audio.sample_rate());
        Ok(pruned)
    }

    /// Generate a loop from `audio`.
    ///
    /// On success `params.strategy_id` names the strategy that built the loop.
    ///
    /// # Errors
    /// `InvalidParameter` for bad parameters, `InvalidState` for a strategy
    /// driven out of order. Strategy-local failures are not errors; they move
    /// on to the next candidate and end in `NoLoopFound` if none is left.
    pub fn generate(&self, audio: &AudioBuffer, params: &mut LoopParams) -> Result<LoopOutcome> {
        params.validate()?;
        let pruned = self.prune(audio)?;
        let candidates = self.candidates(params.pinned_strategy_id);

        for &id in &candidates {
            if self.should_stop() {
                self.observer.cancelled();
                return Ok(LoopOutcome::Cancelled);
            }

            let mut strategy = LoopStrategy::new(id, self.context(&pruned, params.min_duration));
            if !strategy.evaluate() {
                continue;
            }

            match strategy.create_loop() {
                Ok(looped) => {
                    let looped = self.finish(looped)?;
                    params.strategy_id = Some(id);
                    self.observer.loop_created(id, looped.duration_ms());
                    return Ok(LoopOutcome::Created(LoopResult {
                        audio: looped,
                        strategy_id: id,
                    }));
                }
                Err(e) if e.is_recoverable() => self.observer.creation_failed(id, &e),
                Err(e) => return Err(e),
            }
        }

        self.observer.no_loop_found(&candidates);
        Ok(LoopOutcome::NoLoopFound)
    }

    /// Evaluate every strategy against the pruned buffer without building
    /// any loop.
    pub fn assess(&self, audio: &AudioBuffer, params: &LoopParams) -> Result<Vec<StrategyReport>> {
        params.validate()?;
        let pruned = self.prune(audio)?;

        Ok(StrategyId::ALL
            .iter()
            .map(|&id| {
                let mut strategy =
                    LoopStrategy::new(id, self.context(&pruned, params.min_duration));
                let suitable = strategy.evaluate();
                StrategyReport {
                    strategy: id,
                    suitable,
                    state: strategy.state(),
                }
            })
            .collect())
    }

    /// Apply the global crossfade, if enabled and if it fits.
    ///
    /// The head samples blended into the tail are dropped so the loop wraps
    /// onto the sample that follows them.
    fn finish(&self, looped: AudioBuffer) -> Result<AudioBuffer> {
        if !self.config.global_crossfade {
            return Ok(looped);
        }

        let sr = looped.sample_rate();
        let mut channels = looped.samples().to_vec();
        match loop_crossfade_in_place(
            &mut channels,
            sr,
            self.config.global_crossfade_ms,
            CurveShape::EqualPower,
            FadeLevels::default(),
        ) {
            Ok(()) => AudioBuffer::new(channels, sr),
            Err(e) => {
                self.observer.crossfade_skipped(&e);
                Ok(looped)
            }
        }
    }
}

impl std::fmt::Debug for LoopOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopOrchestrator")
            .field("config", &self.config)
            .field("cancellable", &self.cancel.is_some())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
