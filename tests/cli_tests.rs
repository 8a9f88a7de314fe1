//! CLI Command Tests
//!
//! Exercises the command implementations against WAV files on disk.

use std::f32::consts::PI;
use std::path::Path;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use loopgen::cli::commands::{
    batch, default_output_path, find_wav_files, generate_loop, join, ReportOutcome,
};
use loopgen::cli::LoopOptions;
use loopgen::engine::{checksum, encode_pcm, export_wav, import_wav, WavFormat};
use loopgen::{AudioBuffer, EngineConfig, StrategyId};

const SR: u32 = 22050;

fn options() -> LoopOptions {
    LoopOptions {
        min_duration: Some(2000),
        max_duration: 4,
        strategy: None,
        config: None,
        crossfade: false,
        no_crossfade: false,
        fade_fallback: false,
        bit_depth: 32,
    }
}

fn write_drone(path: &Path, secs: usize) {
    let samples = (0..SR as usize * secs)
        .map(|i| 0.5 * (2.0 * PI * 220.5 * i as f32 / SR as f32).sin())
        .collect();
    let audio = AudioBuffer::from_mono(samples, SR).unwrap();
    export_wav(&audio, path, WavFormat::float()).unwrap();
}

#[test]
fn test_generate_loop_writes_output_and_report() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("pad.wav");
    let output = dir.path().join("pad_loop.wav");
    write_drone(&input, 4);

    let report = generate_loop(&input, Some(&output), options().loop_params(), &options()).unwrap();

    assert_eq!(report.outcome, ReportOutcome::Created);
    assert_eq!(report.strategy, Some(StrategyId::SpectralCrossFade));
    assert_eq!(report.params.strategy_id, Some(StrategyId::SpectralCrossFade));

    let written = import_wav(&output).unwrap();
    assert_eq!(report.duration_ms, written.duration_ms());
    assert_eq!(report.checksum, Some(checksum(&encode_pcm(&written))));
}

#[test]
fn test_no_loop_found_writes_nothing() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("pad.wav");
    write_drone(&input, 4);

    let mut opts = options();
    opts.strategy = Some(StrategyId::BeatAligned);
    let report = generate_loop(&input, None, opts.loop_params(), &opts).unwrap();

    assert_eq!(report.outcome, ReportOutcome::NoLoopFound);
    assert!(report.output.is_none());
    assert_eq!(find_wav_files(dir.path()).len(), 1);
}

#[test]
fn test_config_file_overrides_apply() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("engine.json");
    let config = EngineConfig {
        global_crossfade: true,
        ..Default::default()
    };
    config.to_file(&config_path).unwrap();

    let mut opts = options();
    opts.config = Some(config_path);
    opts.no_crossfade = true;
    opts.fade_fallback = true;

    let loaded = opts.engine_config().unwrap();
    assert!(!loaded.global_crossfade);
    assert!(loaded.enable_fade_fallback);
}

#[test]
fn test_crossfade_flag_enables_final_blend() {
    assert!(!options().engine_config().unwrap().global_crossfade);

    let mut opts = options();
    opts.crossfade = true;
    assert!(opts.engine_config().unwrap().global_crossfade);
}

#[test]
fn test_min_duration_defaults_to_half_of_max() {
    let mut opts = options();
    opts.min_duration = None;
    opts.max_duration = 30;
    let params = opts.loop_params();
    assert_eq!(params.min_duration, 15_000);
    assert_eq!(params.max_duration, Some(30_000));
}

#[test]
fn test_unsupported_bit_depth_rejected() {
    let mut opts = options();
    opts.bit_depth = 12;
    assert!(opts.wav_format().is_err());
}

#[test]
fn test_default_output_name() {
    let created_at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
    let path = default_output_path(Path::new("/tmp/in/take.wav"), 12_345, Some(96), created_at);
    assert_eq!(
        path,
        Path::new("/tmp/in/20240309140507000000000-12s-96bpm.wav")
    );

    let path = default_output_path(Path::new("take.wav"), 8_000, None, created_at);
    assert_eq!(path.file_name().unwrap(), "20240309140507000000000-8s.wav");
}

#[test]
fn test_join_crossfades_files() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.wav");
    let b = dir.path().join("b.wav");
    let out = dir.path().join("joined.wav");
    write_drone(&a, 1);
    write_drone(&b, 2);

    join(&a, &b, &out, 100).unwrap();

    let joined = import_wav(&out).unwrap();
    assert_eq!(joined.len(), SR as usize * 3 - SR as usize / 10);
}

#[test]
fn test_batch_processes_nested_wav_files() {
    let input_dir = tempdir().unwrap();
    let output_dir = tempdir().unwrap();
    std::fs::create_dir(input_dir.path().join("nested")).unwrap();
    write_drone(&input_dir.path().join("one.wav"), 4);
    write_drone(&input_dir.path().join("nested").join("two.WAV"), 4);
    std::fs::write(input_dir.path().join("notes.txt"), "not audio").unwrap();

    assert_eq!(find_wav_files(input_dir.path()).len(), 2);
    assert!(batch(input_dir.path(), output_dir.path(), &options()).unwrap());
    assert!(output_dir.path().join("one_loop.wav").exists());
    assert!(output_dir.path().join("two_loop.wav").exists());
}

#[test]
fn test_batch_missing_input_dir() {
    let output_dir = tempdir().unwrap();
    assert!(batch(Path::new("/definitely/not/here"), output_dir.path(), &options()).is_err());
}
