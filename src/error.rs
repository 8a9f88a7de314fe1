//! Error handling for loopgen
//!
//! Strategy-local failures (short segments, analysis hiccups, crossfades that
//! do not fit) are recoverable: the orchestrator demotes the strategy and moves
//! on. Parameter and state errors terminate the call.

use thiserror::Error;

/// Result type alias for loopgen operations
pub type Result<T> = std::result::Result<T, LoopGenError>;

/// Main error type for loop generation
#[derive(Error, Debug)]
pub enum LoopGenError {
    // Parameter Errors
    #[error("Invalid parameter '{param}': got {value}, expected {expected}")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    // Audio Errors
    #[error("Invalid audio: {reason}")]
    InvalidAudio { reason: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // Analysis Errors
    #[error("Segment too short: needed {needed} samples, {available} available")]
    SegmentTooShort { needed: usize, available: usize },

    #[error("Crossfade too long: {requested} samples requested, {available} available")]
    CrossfadeTooLong { requested: usize, available: usize },

    #[error("Channel count mismatch: {left} vs {right}")]
    ChannelMismatch { left: usize, right: usize },

    #[error("Analysis failed: {reason}")]
    Analysis { reason: String },

    // Strategy Errors
    #[error("Strategy {strategy} in invalid state: {reason}")]
    InvalidState { strategy: String, reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LoopGenError {
    /// Shorthand for building an `InvalidParameter` error
    pub fn invalid_parameter(
        param: impl Into<String>,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        LoopGenError::InvalidParameter {
            param: param.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            LoopGenError::InvalidParameter { .. } => "INVALID_PARAMETER",
            LoopGenError::InvalidAudio { .. } => "INVALID_AUDIO",
            LoopGenError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            LoopGenError::FileNotFound { .. } => "FILE_NOT_FOUND",
            LoopGenError::SegmentTooShort { .. } => "SEGMENT_TOO_SHORT",
            LoopGenError::CrossfadeTooLong { .. } => "CROSSFADE_TOO_LONG",
            LoopGenError::ChannelMismatch { .. } => "CHANNEL_MISMATCH",
            LoopGenError::Analysis { .. } => "ANALYSIS_FAILED",
            LoopGenError::InvalidState { .. } => "INVALID_STATE",
            LoopGenError::Io(_) => "IO_ERROR",
            LoopGenError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors are local to a single strategy attempt.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LoopGenError::SegmentTooShort { .. }
                | LoopGenError::CrossfadeTooLong { .. }
                | LoopGenError::ChannelMismatch { .. }
                | LoopGenError::Analysis { .. }
                | LoopGenError::InvalidAudio { .. }
        )
    }
}
