//! Engine configuration and per-request loop parameters.
//!
//! Both are plain serde structs stored as JSON. Missing fields fall back to
//! their defaults, so a config file only needs the values it changes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::AnalyzerSettings;
use crate::dsp::SilenceSettings;
use crate::error::{LoopGenError, Result};
use crate::strategy::{StrategyId, StrategySettings};

/// Shortest loop requested when nothing else is given, in milliseconds
pub const DEFAULT_MIN_DURATION_MS: u64 = 10_000;

// ============================================================================
// Loop parameters
// ============================================================================

/// One loop request.
///
/// `prompt`, `bpm` and `seed` describe how the source audio was generated and
/// are carried along untouched. `strategy_id` is filled in with the strategy
/// that produced the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopParams {
    pub prompt: Option<String>,
    pub bpm: Option<u32>,
    pub seed: Option<u64>,
    /// Shortest acceptable loop in milliseconds
    pub min_duration: u64,
    /// Longest requested source, in milliseconds
    pub max_duration: Option<u64>,
    /// Restrict generation to a single strategy
    pub pinned_strategy_id: Option<StrategyId>,
    /// Strategy that produced the loop
    pub strategy_id: Option<StrategyId>,
}

impl Default for LoopParams {
    fn default() -> Self {
        Self {
            prompt: None,
            bpm: None,
            seed: None,
            min_duration: DEFAULT_MIN_DURATION_MS,
            max_duration: None,
            pinned_strategy_id: None,
            strategy_id: None,
        }
    }
}

impl LoopParams {
    pub fn new(min_duration_ms: u64) -> Self {
        Self {
            min_duration: min_duration_ms,
            ..Default::default()
        }
    }

    pub fn pinned(mut self, id: StrategyId) -> Self {
        self.pinned_strategy_id = Some(id);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_duration == 0 {
            return Err(LoopGenError::invalid_parameter(
                "min_duration",
                self.min_duration,
                "> 0 ms",
            ));
        }
        if let Some(max) = self.max_duration {
            if max < self.min_duration {
                return Err(LoopGenError::invalid_parameter(
                    "max_duration",
                    max,
                    format!(">= min_duration ({} ms)", self.min_duration),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Engine configuration
// ============================================================================

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub silence: SilenceSettings,
    /// Apply a final tail-into-head crossfade to every loop (default: false).
    /// The crossfade shortens the loop by `global_crossfade_ms`.
    pub global_crossfade: bool,
    /// Length of the final crossfade (default: 50)
    pub global_crossfade_ms: u64,
    /// Try the fade fallback after every other strategy (default: false)
    pub enable_fade_fallback: bool,
    pub analyzer: AnalyzerSettings,
    pub strategies: StrategySettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            silence: SilenceSettings::default(),
            global_crossfade: false,
            global_crossfade_ms: 50,
            enable_fade_fallback: false,
            analyzer: AnalyzerSettings::default(),
            strategies: StrategySettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.silence.validate()?;
        self.analyzer.validate()?;
        self.strategies.validate()?;
        Ok(())
    }

    /// Load and validate a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LoopGenError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
