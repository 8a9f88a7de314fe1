//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command. Every command prints a
//! JSON report on stdout; progress goes to the tracing subscriber on stderr.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::LoopOptions;
use crate::config::{EngineConfig, LoopParams};
use crate::dsp::crossfade::{crossfade_join, CurveShape};
use crate::engine::{checksum, encode_pcm, export_wav, import_wav, WavFormat};
use crate::orchestrator::{LoopOrchestrator, LoopOutcome, StrategyReport};
use crate::strategy::StrategyId;

/// How a loop command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    Created,
    NoLoopFound,
    Cancelled,
}

/// Printed after each loop attempt
#[derive(Debug, Clone, Serialize)]
pub struct LoopReport {
    pub input: PathBuf,
    pub outcome: ReportOutcome,
    pub output: Option<PathBuf>,
    pub strategy: Option<StrategyId>,
    pub duration_ms: u64,
    pub sample_rate: u32,
    pub channels: usize,
    /// SHA-256 of the loop's PCM payload
    pub checksum: Option<String>,
    pub params: LoopParams,
    pub created_at: DateTime<Utc>,
}

impl LoopReport {
    pub fn is_created(&self) -> bool {
        self.outcome == ReportOutcome::Created
    }
}

#[derive(Debug, Serialize)]
struct AnalysisReport<'a> {
    input: &'a Path,
    duration_ms: u64,
    sample_rate: u32,
    channels: usize,
    min_duration: u64,
    strategies: Vec<StrategyReport>,
}

impl LoopOptions {
    /// Config file (or defaults) with the command-line overrides applied
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if self.crossfade {
            config.global_crossfade = true;
        }
        if self.no_crossfade {
            config.global_crossfade = false;
        }
        if self.fade_fallback {
            config.enable_fade_fallback = true;
        }
        Ok(config)
    }

    pub fn loop_params(&self) -> LoopParams {
        let max_duration_ms = self.max_duration * 1000;
        LoopParams {
            min_duration: self.min_duration.unwrap_or(max_duration_ms / 2),
            max_duration: Some(max_duration_ms),
            pinned_strategy_id: self.strategy,
            ..Default::default()
        }
    }

    pub fn wav_format(&self) -> Result<WavFormat> {
        match self.bit_depth {
            16 | 24 => Ok(WavFormat::new(self.bit_depth)),
            32 => Ok(WavFormat::float()),
            other => bail!("unsupported bit depth {} (expected 16, 24 or 32)", other),
        }
    }
}

/// `<timestamp>-<secs>s-<bpm>bpm.wav` next to the input
pub fn default_output_path(
    input: &Path,
    duration_ms: u64,
    bpm: Option<u32>,
    created_at: DateTime<Utc>,
) -> PathBuf {
    let tempo = bpm.map(|b| format!("-{}bpm", b)).unwrap_or_default();
    let name = format!(
        "{}-{}s{}.wav",
        created_at.format("%Y%m%d%H%M%S%f"),
        duration_ms / 1000,
        tempo
    );
    input
        .parent()
        .map(|dir| dir.join(&name))
        .unwrap_or_else(|| PathBuf::from(name))
}

/// Read `input`, generate a loop and write it to `output` (or a default path).
pub fn generate_loop(
    input: &Path,
    output: Option<&Path>,
    mut params: LoopParams,
    options: &LoopOptions,
) -> Result<LoopReport> {
    let config = options.engine_config()?;
    let format = options.wav_format()?;
    let audio =
        import_wav(input).with_context(|| format!("failed to read {}", input.display()))?;
    info!(
        input = %input.display(),
        duration_ms = audio.duration_ms(),
        sample_rate = audio.sample_rate(),
        channels = audio.channels(),
        "generating loop"
    );

    let orchestrator = LoopOrchestrator::new(config)?;
    let outcome = orchestrator.generate(&audio, &mut params)?;
    let created_at = Utc::now();

    let mut report = LoopReport {
        input: input.to_path_buf(),
        outcome: ReportOutcome::NoLoopFound,
        output: None,
        strategy: None,
        duration_ms: 0,
        sample_rate: audio.sample_rate(),
        channels: audio.channels(),
        checksum: None,
        params: params.clone(),
        created_at,
    };

    match outcome {
        LoopOutcome::Created(result) => {
            let looped = result.audio;
            let path = output.map(Path::to_path_buf).unwrap_or_else(|| {
                default_output_path(input, looped.duration_ms(), params.bpm, created_at)
            });
            export_wav(&looped, &path, format)
                .with_context(|| format!("failed to write {}", path.display()))?;

            report.outcome = ReportOutcome::Created;
            report.output = Some(path);
            report.strategy = Some(result.strategy_id);
            report.duration_ms = looped.duration_ms();
            report.checksum = Some(checksum(&encode_pcm(&looped)));
        }
        LoopOutcome::NoLoopFound => warn!(input = %input.display(), "no loop found"),
        LoopOutcome::Cancelled => report.outcome = ReportOutcome::Cancelled,
    }

    Ok(report)
}

/// `loop`: returns whether a loop was written
pub fn run_loop(
    input: &Path,
    output: Option<&Path>,
    bpm: Option<u32>,
    prompt: Option<String>,
    seed: Option<u64>,
    options: &LoopOptions,
) -> Result<bool> {
    let mut params = options.loop_params();
    params.bpm = bpm;
    params.prompt = prompt;
    params.seed = seed;

    let report = generate_loop(input, output, params, options)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.is_created())
}

/// `analyze`: evaluate every strategy and print their suitability
pub fn analyze(input: &Path, options: &LoopOptions) -> Result<()> {
    let config = options.engine_config()?;
    let params = options.loop_params();
    let audio =
        import_wav(input).with_context(|| format!("failed to read {}", input.display()))?;

    let orchestrator = LoopOrchestrator::new(config)?;
    let report = AnalysisReport {
        input,
        duration_ms: audio.duration_ms(),
        sample_rate: audio.sample_rate(),
        channels: audio.channels(),
        min_duration: params.min_duration,
        strategies: orchestrator.assess(&audio, &params)?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// `join`: crossfade two files end to start
pub fn join(first: &Path, second: &Path, output: &Path, crossfade_ms: u64) -> Result<()> {
    let a = import_wav(first).with_context(|| format!("failed to read {}", first.display()))?;
    let b = import_wav(second).with_context(|| format!("failed to read {}", second.display()))?;

    let joined = crossfade_join(&a, &b, crossfade_ms, CurveShape::EqualPower)?;
    export_wav(&joined, output, WavFormat::default())
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(output = %output.display(), duration_ms = joined.duration_ms(), "joined");
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "output": output,
            "duration_ms": joined.duration_ms(),
            "checksum": checksum(&encode_pcm(&joined)),
        }))?
    );
    Ok(())
}

/// WAV files under `dir`, sorted by path
pub fn find_wav_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
        })
        .collect();
    files.sort();
    files
}

/// `batch`: returns whether every file produced a loop
pub fn batch(input_dir: &Path, output_dir: &Path, options: &LoopOptions) -> Result<bool> {
    if !input_dir.is_dir() {
        bail!("input directory {} does not exist", input_dir.display());
    }
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let files = find_wav_files(input_dir);
    info!(files = files.len(), input_dir = %input_dir.display(), "batch");

    let mut reports = Vec::with_capacity(files.len());
    let mut failures = 0;
    for file in &files {
        let stem = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("audio");
        let output = output_dir.join(format!("{}_loop.wav", stem));

        match generate_loop(file, Some(&output), options.loop_params(), options) {
            Ok(report) => reports.push(report),
            Err(e) => {
                failures += 1;
                warn!(file = %file.display(), "skipped: {:#}", e);
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(failures == 0 && reports.iter().all(LoopReport::is_created))
}
