//! Loop Strategies
//!
//! Each strategy decides whether it can loop a buffer (`evaluate`) and then
//! builds the loop (`create_loop`). The orchestrator tries them in priority
//! order and stops at the first that succeeds.
//!
//! Lifecycle per instance:
//! `Unevaluated -> {Suitable, Unsuitable} -> {LoopCreated, Failed}`

mod beat_aligned;
mod fade_fallback;
mod spectral_crossfade;
mod transient_aligned;

pub use beat_aligned::BeatAligned;
pub use fade_fallback::FadeFallback;
pub use spectral_crossfade::SpectralCrossFade;
pub use transient_aligned::TransientAligned;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::SignalAnalysis;
use crate::dsp::BlendSettings;
use crate::engine::AudioBuffer;
use crate::error::{LoopGenError, Result};
use crate::orchestrator::LoopObserver;

// ============================================================================
// Identity and state
// ============================================================================

/// Strategy identifier. Also accepts the legacy names on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyId {
    #[serde(alias = "BeatDetect")]
    BeatAligned,
    TransientAligned,
    #[serde(alias = "CrossFade")]
    SpectralCrossFade,
    #[serde(alias = "FadeInOut")]
    FadeFallback,
}

impl StrategyId {
    /// Every strategy, in priority order
    pub const ALL: [StrategyId; 4] = [
        StrategyId::BeatAligned,
        StrategyId::TransientAligned,
        StrategyId::SpectralCrossFade,
        StrategyId::FadeFallback,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyId::BeatAligned => "BeatAligned",
            StrategyId::TransientAligned => "TransientAligned",
            StrategyId::SpectralCrossFade => "SpectralCrossFade",
            StrategyId::FadeFallback => "FadeFallback",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyId {
    type Err = LoopGenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BeatAligned" | "BeatDetect" => Ok(StrategyId::BeatAligned),
            "TransientAligned" => Ok(StrategyId::TransientAligned),
            "SpectralCrossFade" | "CrossFade" => Ok(StrategyId::SpectralCrossFade),
            "FadeFallback" | "FadeInOut" => Ok(StrategyId::FadeFallback),
            other => Err(LoopGenError::invalid_parameter(
                "strategy_id",
                other,
                "BeatAligned, TransientAligned, SpectralCrossFade or FadeFallback",
            )),
        }
    }
}

/// Where a strategy instance is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Unevaluated,
    Suitable,
    Unsuitable,
    LoopCreated,
    Failed,
}

// ============================================================================
// Settings and context
// ============================================================================

/// Per-strategy tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// Minimum mel correlation for transient endpoints (default: 0.8)
    pub similarity_threshold: f32,
    /// Start and end candidates tried per search (default: 120)
    pub max_candidates: usize,
    /// Centroid variance below which a buffer is steady enough to crossfade,
    /// in Hz² (default: 250000)
    pub centroid_variance_threshold: f64,
    /// Tail-into-head crossfade of the spectral strategy (default: 1000)
    pub crossfade_ms: u64,
    /// Closing fade-out of the spectral strategy (default: 600)
    pub fade_out_ms: u64,
    /// Fade length of the fallback strategy (default: 200)
    pub fade_fallback_ms: u64,
    /// Slice-and-blend tuning for the beat and transient strategies
    pub blend: BlendSettings,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            max_candidates: 120,
            centroid_variance_threshold: 250_000.0,
            crossfade_ms: 1000,
            fade_out_ms: 600,
            fade_fallback_ms: 200,
            blend: BlendSettings::default(),
        }
    }
}

impl StrategySettings {
    pub fn validate(&self) -> Result<()> {
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(LoopGenError::invalid_parameter(
                "similarity_threshold",
                self.similarity_threshold,
                "-1.0 to 1.0",
            ));
        }
        if self.max_candidates == 0 {
            return Err(LoopGenError::invalid_parameter(
                "max_candidates",
                self.max_candidates,
                "> 0",
            ));
        }
        if !self.centroid_variance_threshold.is_finite() || self.centroid_variance_threshold <= 0.0
        {
            return Err(LoopGenError::invalid_parameter(
                "centroid_variance_threshold",
                self.centroid_variance_threshold,
                "finite and > 0",
            ));
        }
        Ok(())
    }
}

/// What every strategy gets to work with
#[derive(Clone)]
pub struct StrategyContext<'a> {
    pub audio: &'a AudioBuffer,
    /// Shortest acceptable loop in milliseconds
    pub min_duration_ms: u64,
    pub analysis: Arc<dyn SignalAnalysis>,
    pub observer: Arc<dyn LoopObserver>,
    pub settings: &'a StrategySettings,
}

impl fmt::Debug for StrategyContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyContext")
            .field("samples", &self.audio.len())
            .field("sample_rate", &self.audio.sample_rate())
            .field("min_duration_ms", &self.min_duration_ms)
            .finish_non_exhaustive()
    }
}

/// Memoized evaluation result plus lifecycle state
#[derive(Debug, Clone, Copy)]
struct Status {
    state: LoopState,
    verdict: Option<bool>,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            state: LoopState::Unevaluated,
            verdict: None,
        }
    }
}

// ============================================================================
// Strategy enum
// ============================================================================

/// A loop strategy bound to one buffer
#[derive(Debug)]
pub enum LoopStrategy<'a> {
    BeatAligned(BeatAligned<'a>),
    TransientAligned(TransientAligned<'a>),
    SpectralCrossFade(SpectralCrossFade<'a>),
    FadeFallback(FadeFallback<'a>),
}

impl<'a> LoopStrategy<'a> {
    pub fn new(id: StrategyId, ctx: StrategyContext<'a>) -> Self {
        match id {
            StrategyId::BeatAligned => LoopStrategy::BeatAligned(BeatAligned::new(ctx)),
            StrategyId::TransientAligned => {
                LoopStrategy::TransientAligned(TransientAligned::new(ctx))
            }
            StrategyId::SpectralCrossFade => {
                LoopStrategy::SpectralCrossFade(SpectralCrossFade::new(ctx))
            }
            StrategyId::FadeFallback => LoopStrategy::FadeFallback(FadeFallback::new(ctx)),
        }
    }

    pub fn id(&self) -> StrategyId {
        match self {
            LoopStrategy::BeatAligned(_) => StrategyId::BeatAligned,
            LoopStrategy::TransientAligned(_) => StrategyId::TransientAligned,
            LoopStrategy::SpectralCrossFade(_) => StrategyId::SpectralCrossFade,
            LoopStrategy::FadeFallback(_) => StrategyId::FadeFallback,
        }
    }

    pub fn state(&self) -> LoopState {
        self.status().state
    }

    fn status(&self) -> &Status {
        match self {
            LoopStrategy::BeatAligned(s) => &s.status,
            LoopStrategy::TransientAligned(s) => &s.status,
            LoopStrategy::SpectralCrossFade(s) => &s.status,
            LoopStrategy::FadeFallback(s) => &s.status,
        }
    }

    fn status_mut(&mut self) -> &mut Status {
        match self {
            LoopStrategy::BeatAligned(s) => &mut s.status,
            LoopStrategy::TransientAligned(s) => &mut s.status,
            LoopStrategy::SpectralCrossFade(s) => &mut s.status,
            LoopStrategy::FadeFallback(s) => &mut s.status,
        }
    }

    fn observer(&self) -> Arc<dyn LoopObserver> {
        let ctx = match self {
            LoopStrategy::BeatAligned(s) => &s.ctx,
            LoopStrategy::TransientAligned(s) => &s.ctx,
            LoopStrategy::SpectralCrossFade(s) => &s.ctx,
            LoopStrategy::FadeFallback(s) => &s.ctx,
        };
        Arc::clone(&ctx.observer)
    }

    /// Decide whether this strategy can loop the buffer.
    ///
    /// The first call runs the analysis; later calls return the same answer.
    /// Analysis errors are reported to the observer and count as unsuitable.
    pub fn evaluate(&mut self) -> bool {
        if let Some(verdict) = self.status().verdict {
            return verdict;
        }

        let id = self.id();
        let result = match self {
            LoopStrategy::BeatAligned(s) => s.assess(),
            LoopStrategy::TransientAligned(s) => s.assess(),
            LoopStrategy::SpectralCrossFade(s) => s.assess(),
            LoopStrategy::FadeFallback(s) => s.assess(),
        };
        let suitable = match result {
            Ok(suitable) => suitable,
            Err(e) => {
                self.observer().analysis_failed(id, &e);
                false
            }
        };

        let status = self.status_mut();
        status.verdict = Some(suitable);
        status.state = if suitable {
            LoopState::Suitable
        } else {
            LoopState::Unsuitable
        };
        self.observer().strategy_evaluated(id, suitable);
        suitable
    }

    /// Build the loop.
    ///
    /// # Errors
    /// `InvalidState` unless `evaluate` returned true; otherwise whatever the
    /// strategy's DSP chain fails with, which also marks it `Failed`.
    pub fn create_loop(&mut self) -> Result<AudioBuffer> {
        let state = self.state();
        if !matches!(state, LoopState::Suitable | LoopState::LoopCreated) {
            return Err(LoopGenError::InvalidState {
                strategy: self.id().to_string(),
                reason: format!("create_loop called in state {:?}", state),
            });
        }

        let result = match self {
            LoopStrategy::BeatAligned(s) => s.build(),
            LoopStrategy::TransientAligned(s) => s.build(),
            LoopStrategy::SpectralCrossFade(s) => s.build(),
            LoopStrategy::FadeFallback(s) => s.build(),
        };
        self.status_mut().state = match result {
            Ok(_) => LoopState::LoopCreated,
            Err(_) => LoopState::Failed,
        };
        result
    }
}

/// `InvalidState` for a strategy asked to build without loop points
fn missing_points(id: StrategyId) -> LoopGenError {
    LoopGenError::InvalidState {
        strategy: id.to_string(),
        reason: "no loop points found during evaluation".to_string(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::analysis::SpectralAnalyzer;
    use crate::orchestrator::TracingObserver;

    pub fn context<'a>(
        audio: &'a AudioBuffer,
        min_duration_ms: u64,
        settings: &'a StrategySettings,
    ) -> StrategyContext<'a> {
        StrategyContext {
            audio,
            min_duration_ms,
            analysis: Arc::new(SpectralAnalyzer::new()),
            observer: Arc::new(TracingObserver),
            settings,
        }
    }
}
