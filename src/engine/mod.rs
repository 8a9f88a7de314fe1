//! Audio Engine Module
//!
//! Core audio containers and file/payload I/O:
//! - Audio buffer with cached mono downmix
//! - WAV import/export and raw PCM payloads

pub mod buffer;
pub mod io;

pub use buffer::{db_to_linear, ms_to_samples, samples_to_ms, AudioBuffer, ChannelLayout};
pub use io::{checksum, decode_pcm, encode_pcm, export_wav, import_wav, WavFormat};
