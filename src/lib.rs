//! Loopgen - Seamless Audio Loop Generation
//!
//! Turns a finished recording into a loop that repeats without an audible
//! click, phase jump or energy dip.
//!
//! # Architecture
//!
//! Data flows strictly downward:
//! - `engine`: audio buffers and WAV/PCM I/O
//! - `analysis`: beat, onset, transient and spectral analysis behind the
//!   `SignalAnalysis` trait
//! - `dsp`: zero crossings, crossfades, phase alignment, slice-and-blend,
//!   silence pruning
//! - `strategy`: the four loop strategies
//! - `orchestrator`: prunes silence and tries strategies in priority order
//!
//! ```no_run
//! use loopgen::{EngineConfig, LoopOrchestrator, LoopOutcome, LoopParams};
//! use loopgen::engine::import_wav;
//!
//! # fn main() -> loopgen::Result<()> {
//! let audio = import_wav(std::path::Path::new("take.wav"))?;
//! let orchestrator = LoopOrchestrator::new(EngineConfig::default())?;
//! let mut params = LoopParams::new(8_000);
//! if let LoopOutcome::Created(result) = orchestrator.generate(&audio, &mut params)? {
//!     println!("{} ms loop via {}", result.audio.duration_ms(), result.strategy_id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod strategy;

pub use config::{EngineConfig, LoopParams};
pub use engine::AudioBuffer;
pub use error::{LoopGenError, Result};
pub use orchestrator::{LoopObserver, LoopOrchestrator, LoopOutcome, LoopResult};
pub use strategy::{LoopState, LoopStrategy, StrategyId};
