//! Error handling for sampler-fx
//!
//! Only control-side operations can fail (state decoding, configuration,
//! parameter binding, offline file I/O). Everything reachable from an audio
//! callback is infallible by construction.

use thiserror::Error;

/// Result type alias for sampler-fx operations
pub type Result<T> = std::result::Result<T, FxError>;

/// Main error type for sampler-fx operations
#[derive(Error, Debug)]
pub enum FxError {
    // Configuration Errors
    #[error("Invalid configuration: {field} = {value} ({expected})")]
    InvalidConfig {
        field: String,
        value: String,
        expected: String,
    },

    // Parameter Errors
    #[error("Unknown parameter: {name}")]
    UnknownParameter { name: String },

    #[error("Parameter target out of range: effect {effect_index}, parameter {parameter_index}")]
    ParameterOutOfRange {
        effect_index: usize,
        parameter_index: usize,
    },

    #[error("Duplicate parameter name: {name}")]
    DuplicateParameter { name: String },

    // State Errors
    #[error("Malformed state: {reason}")]
    MalformedState { reason: String },

    #[error("Unknown effect type: {tag}")]
    UnknownEffectType { tag: String },

    // Audio I/O Errors
    #[error("Audio file error: {path}")]
    AudioFile {
        path: String,
        #[source]
        source: hound::Error,
    },

    #[error("Unsupported audio format: {details}")]
    UnsupportedFormat { details: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FxError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::InvalidConfig { .. } => "INVALID_CONFIG",
            FxError::UnknownParameter { .. } => "UNKNOWN_PARAMETER",
            FxError::ParameterOutOfRange { .. } => "PARAMETER_OUT_OF_RANGE",
            FxError::DuplicateParameter { .. } => "DUPLICATE_PARAMETER",
            FxError::MalformedState { .. } => "MALFORMED_STATE",
            FxError::UnknownEffectType { .. } => "UNKNOWN_EFFECT_TYPE",
            FxError::AudioFile { .. } => "AUDIO_FILE",
            FxError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            FxError::Io(_) => "IO_ERROR",
            FxError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable without restarting the host
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FxError::Io(_))
    }

    /// Returns a suggested recovery action for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            FxError::InvalidConfig { .. } => "Fix the configuration value or remove it to use the default",
            FxError::UnknownParameter { .. } => "Check the parameter name against the effect's descriptor table",
            FxError::ParameterOutOfRange { .. } => "Bind only to effects and parameters that exist in the chain",
            FxError::DuplicateParameter { .. } => "Give every host parameter a unique name",
            FxError::MalformedState { .. } => "The saved state is damaged; load a different preset",
            FxError::UnknownEffectType { .. } => "Valid types: Reverb, Delay, Filter, Distortion, Saturation, PitchShift",
            FxError::AudioFile { .. } => "Check that the file exists and is a valid WAV file",
            FxError::UnsupportedFormat { .. } => "Convert to 16/24-bit integer or 32-bit float WAV",
            _ => "Check the error details and try again",
        }
    }
}
