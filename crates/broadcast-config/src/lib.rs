//! Configuration compiler for the broadcast session controller.
//!
//! Turns the host's declarative JSON configuration into a validated
//! `SessionConfiguration`. Compilation is a pure function of its input: it
//! validates what is present, forwards it, and leaves everything else to the
//! engine's defaults.

mod compile;
mod endpoint;
mod error;
mod types;

pub use compile::{compile, compile_audio, compile_mixer, compile_video, SUPPORTED_SAMPLE_RATES};
pub use endpoint::Endpoint;
pub use error::CompileError;
pub use types::{
    AudioConfig, CameraPosition, Color, MixerConfig, MixerSlot, QualityOptimization,
    ReconnectionConfig, SessionConfiguration, Size, VideoCodec, VideoConfig,
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL, QUALITY_OPTIMIZATIONS, VIDEO_CODECS,
};

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;
