//! Compiled session configuration.
//!
//! Every engine-tunable field is optional: `None` means "use the engine
//! default". The compiler validates what is present and forwards it.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compile::SUPPORTED_SAMPLE_RATES;
use crate::error::CompileError;
use crate::CompileResult;

/// Default number of reconnection attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default delay between reconnection attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// Encoder tuning preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QualityOptimization {
    #[default]
    Latency,
    Quality,
}

/// Recognized `qualityOptimization` strings. `Latency` is the default entry.
pub const QUALITY_OPTIMIZATIONS: &[(&str, QualityOptimization)] = &[
    ("latency", QualityOptimization::Latency),
    ("quality", QualityOptimization::Quality),
];

/// Video codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VideoCodec {
    #[default]
    H264,
    H265,
}

/// Recognized `codec` strings.
pub const VIDEO_CODECS: &[(&str, VideoCodec)] =
    &[("h264", VideoCodec::H264), ("h265", VideoCodec::H265)];

/// Initial camera position requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CameraPosition {
    Front,
    Back,
}

/// Recognized `cameraPosition` strings.
pub const CAMERA_POSITIONS: &[(&str, CameraPosition)] = &[
    ("front", CameraPosition::Front),
    ("back", CameraPosition::Back),
];

/// Video encoder settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    pub size: Option<Size>,
    pub initial_bitrate: Option<u32>,
    pub min_bitrate: Option<u32>,
    pub max_bitrate: Option<u32>,
    pub target_framerate: Option<u32>,
    /// Keyframe interval in seconds.
    pub keyframe_interval: Option<u32>,
    pub quality_optimization: Option<QualityOptimization>,
    pub codec: Option<VideoCodec>,
    pub enable_transcoding: Option<bool>,
}

impl VideoConfig {
    /// Overlay the present fields of `update` on top of `self`.
    pub fn merged(&self, update: &VideoConfig) -> CompileResult<VideoConfig> {
        let merged = VideoConfig {
            size: update.size.or(self.size),
            initial_bitrate: update.initial_bitrate.or(self.initial_bitrate),
            min_bitrate: update.min_bitrate.or(self.min_bitrate),
            max_bitrate: update.max_bitrate.or(self.max_bitrate),
            target_framerate: update.target_framerate.or(self.target_framerate),
            keyframe_interval: update.keyframe_interval.or(self.keyframe_interval),
            quality_optimization: update.quality_optimization.or(self.quality_optimization),
            codec: update.codec.or(self.codec),
            enable_transcoding: update.enable_transcoding.or(self.enable_transcoding),
        };
        merged.check_bitrate_range("video")?;
        Ok(merged)
    }

    pub fn validate(&self) -> CompileResult<()> {
        check_positive("video.bitrate", self.initial_bitrate)?;
        check_positive("video.minBitrate", self.min_bitrate)?;
        check_positive("video.maxBitrate", self.max_bitrate)?;
        check_positive("video.targetFramerate", self.target_framerate)?;
        check_positive("video.keyframeInterval", self.keyframe_interval)?;
        check_size("video.width", "video.height", self.size)?;
        self.check_bitrate_range("video")
    }

    /// min ≤ initial ≤ max for whichever bounds are present.
    pub(crate) fn check_bitrate_range(&self, path: &str) -> CompileResult<()> {
        if let (Some(min), Some(max)) = (self.min_bitrate, self.max_bitrate) {
            if min > max {
                return Err(CompileError::invalid(
                    format!("{path}.minBitrate"),
                    format!("{min} exceeds maxBitrate {max}"),
                ));
            }
        }
        if let Some(initial) = self.initial_bitrate {
            if let Some(min) = self.min_bitrate.filter(|min| initial < *min) {
                return Err(CompileError::invalid(
                    format!("{path}.bitrate"),
                    format!("{initial} is below minBitrate {min}"),
                ));
            }
            if let Some(max) = self.max_bitrate.filter(|max| initial > *max) {
                return Err(CompileError::invalid(
                    format!("{path}.bitrate"),
                    format!("{initial} is above maxBitrate {max}"),
                ));
            }
        }
        Ok(())
    }
}

/// Audio encoder settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub bitrate: Option<u32>,
    /// 1 or 2.
    pub channels: Option<u8>,
    pub sample_rate: Option<u32>,
    pub echo_cancellation: Option<bool>,
    pub noise_suppression: Option<bool>,
}

impl AudioConfig {
    /// Overlay the present fields of `update` on top of `self`.
    pub fn merged(&self, update: &AudioConfig) -> AudioConfig {
        AudioConfig {
            bitrate: update.bitrate.or(self.bitrate),
            channels: update.channels.or(self.channels),
            sample_rate: update.sample_rate.or(self.sample_rate),
            echo_cancellation: update.echo_cancellation.or(self.echo_cancellation),
            noise_suppression: update.noise_suppression.or(self.noise_suppression),
        }
    }

    pub fn validate(&self) -> CompileResult<()> {
        check_positive("audio.bitrate", self.bitrate)?;
        if let Some(count) = self.channels.filter(|count| !matches!(*count, 1 | 2)) {
            return Err(CompileError::invalid(
                "audio.channels",
                format!("{count} is not 1 or 2"),
            ));
        }
        if let Some(rate) = self.sample_rate.filter(|rate| !SUPPORTED_SAMPLE_RATES.contains(rate)) {
            return Err(CompileError::invalid(
                "audio.sampleRate",
                format!("{rate} Hz is not supported"),
            ));
        }
        Ok(())
    }
}

/// ARGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub alpha: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    /// Parse `#RRGGBB` or `#AARRGGBB`.
    pub fn parse(text: &str) -> Option<Color> {
        let hex = text.strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let value = u32::from_str_radix(hex, 16).ok()?;
        let argb = match hex.len() {
            6 => 0xFF00_0000 | value,
            8 => value,
            _ => return None,
        };
        let [alpha, red, green, blue] = argb.to_be_bytes();
        Some(Color {
            alpha,
            red,
            green,
            blue,
        })
    }
}

/// A named, z-ordered compositing layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerSlot {
    pub name: String,
    pub z_index: Option<i32>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub size: Option<Size>,
}

/// Compositing canvas settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MixerConfig {
    pub canvas: Option<Size>,
    pub background_color: Option<Color>,
    /// Slots in declaration order. Names are unique.
    pub slots: Option<Vec<MixerSlot>>,
}

impl MixerConfig {
    /// Overlay the present fields of `update` on top of `self`. Slots are
    /// replaced as a whole.
    pub fn merged(&self, update: &MixerConfig) -> MixerConfig {
        MixerConfig {
            canvas: update.canvas.or(self.canvas),
            background_color: update.background_color.or(self.background_color),
            slots: update.slots.clone().or_else(|| self.slots.clone()),
        }
    }

    /// Look up a slot by name.
    pub fn slot(&self, name: &str) -> Option<&MixerSlot> {
        self.slots
            .as_deref()
            .and_then(|slots| slots.iter().find(|slot| slot.name == name))
    }

    pub fn validate(&self) -> CompileResult<()> {
        check_size("mixer.canvasWidth", "mixer.canvasHeight", self.canvas)?;

        let mut names = HashSet::new();
        for (index, slot) in self.slots.iter().flatten().enumerate() {
            let prefix = format!("mixer.slots[{index}]");
            if slot.name.is_empty() {
                return Err(CompileError::invalid(format!("{prefix}.name"), "required"));
            }
            if !names.insert(slot.name.as_str()) {
                return Err(CompileError::invalid(
                    format!("{prefix}.name"),
                    format!("duplicate slot name `{}`", slot.name),
                ));
            }
            check_size(
                &format!("{prefix}.width"),
                &format!("{prefix}.height"),
                slot.size,
            )?;
        }
        Ok(())
    }
}

/// Automatic reconnection policy settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectionConfig {
    pub enabled: bool,
    pub max_retries: u32,
    pub retry_interval: Duration,
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl ReconnectionConfig {
    pub fn validate(&self) -> CompileResult<()> {
        if self.enabled && self.retry_interval.is_zero() {
            return Err(CompileError::invalid(
                "autoReconnectRetryInterval",
                "must be greater than zero when reconnection is enabled",
            ));
        }
        Ok(())
    }
}

/// A fully validated session configuration. Immutable once compiled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfiguration {
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub mixer: MixerConfig,
    pub reconnection: ReconnectionConfig,
    pub camera_position: Option<CameraPosition>,
}

impl SessionConfiguration {
    /// Check the invariants `compile` enforces. For configurations built
    /// in code rather than compiled from the host's input.
    pub fn validate(&self) -> CompileResult<()> {
        self.video.validate()?;
        self.audio.validate()?;
        self.mixer.validate()?;
        self.reconnection.validate()
    }
}

fn check_positive(field: &str, value: Option<u32>) -> CompileResult<()> {
    match value {
        Some(0) => Err(CompileError::invalid(field, "0 is not positive")),
        _ => Ok(()),
    }
}

fn check_size(width_field: &str, height_field: &str, size: Option<Size>) -> CompileResult<()> {
    let Some(size) = size else {
        return Ok(());
    };
    check_positive(width_field, Some(size.width))?;
    check_positive(height_field, Some(size.height))
}
