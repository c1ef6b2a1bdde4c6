//! Declarative configuration → `SessionConfiguration`.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::CompileError;
use crate::types::{
    AudioConfig, CameraPosition, Color, MixerConfig, MixerSlot, ReconnectionConfig,
    SessionConfiguration, Size, VideoCodec, VideoConfig, CAMERA_POSITIONS, QUALITY_OPTIMIZATIONS,
    VIDEO_CODECS,
};
use crate::CompileResult;

/// Sample rates the engine accepts.
pub const SUPPORTED_SAMPLE_RATES: &[u32] = &[8000, 16000, 22050, 24000, 44100, 48000];

/// Compile a full declarative configuration.
///
/// Absent fields stay `None` so the engine applies its own defaults; a
/// `null` or empty object compiles to `SessionConfiguration::default()`.
pub fn compile(raw: &Value) -> CompileResult<SessionConfiguration> {
    let Some(root) = Fields::root(raw)? else {
        return Ok(SessionConfiguration::default());
    };

    let video = match root.child("video")? {
        Some(fields) => video_fields(&fields)?,
        None => VideoConfig::default(),
    };
    let audio = match root.child("audio")? {
        Some(fields) => audio_fields(&fields)?,
        None => AudioConfig::default(),
    };
    let mixer = match root.child("mixer")? {
        Some(fields) => mixer_fields(&fields)?,
        None => MixerConfig::default(),
    };

    Ok(SessionConfiguration {
        video,
        audio,
        mixer,
        reconnection: reconnection_fields(&root)?,
        camera_position: root.enumerated::<CameraPosition>("cameraPosition", CAMERA_POSITIONS)?,
    })
}

/// Compile a standalone video section (partial update).
pub fn compile_video(raw: &Value) -> CompileResult<VideoConfig> {
    match Fields::section(raw, "video")? {
        Some(fields) => video_fields(&fields),
        None => Ok(VideoConfig::default()),
    }
}

/// Compile a standalone audio section (partial update).
pub fn compile_audio(raw: &Value) -> CompileResult<AudioConfig> {
    match Fields::section(raw, "audio")? {
        Some(fields) => audio_fields(&fields),
        None => Ok(AudioConfig::default()),
    }
}

/// Compile a standalone mixer layout (partial update).
pub fn compile_mixer(raw: &Value) -> CompileResult<MixerConfig> {
    match Fields::section(raw, "mixer")? {
        Some(fields) => mixer_fields(&fields),
        None => Ok(MixerConfig::default()),
    }
}

fn video_fields(fields: &Fields<'_>) -> CompileResult<VideoConfig> {
    let codec = fields.enumerated("codec", VIDEO_CODECS)?;
    let legacy_h265 = fields.boolean("useH265")?;
    let codec = match (codec, legacy_h265) {
        (Some(codec), Some(h265)) if (codec == VideoCodec::H265) != h265 => {
            return Err(CompileError::invalid(
                fields.path("useH265"),
                "conflicts with codec",
            ));
        }
        (Some(codec), _) => Some(codec),
        (None, Some(true)) => Some(VideoCodec::H265),
        (None, Some(false)) => Some(VideoCodec::H264),
        (None, None) => None,
    };

    let target_framerate = match fields.positive_u32("targetFramerate")? {
        Some(fps) => Some(fps),
        None => fields.positive_u32("framerate")?,
    };

    let video = VideoConfig {
        size: fields.size("width", "height")?,
        initial_bitrate: fields.positive_u32("bitrate")?,
        min_bitrate: fields.positive_u32("minBitrate")?,
        max_bitrate: fields.positive_u32("maxBitrate")?,
        target_framerate,
        keyframe_interval: fields.positive_u32("keyframeInterval")?,
        quality_optimization: fields.enumerated("qualityOptimization", QUALITY_OPTIMIZATIONS)?,
        codec,
        enable_transcoding: fields.boolean("enableTranscoding")?,
    };
    video.check_bitrate_range(fields.prefix)?;
    Ok(video)
}

fn audio_fields(fields: &Fields<'_>) -> CompileResult<AudioConfig> {
    let channels = match fields.positive_u32("channels")? {
        Some(count @ (1 | 2)) => Some(count as u8),
        Some(count) => {
            return Err(CompileError::invalid(
                fields.path("channels"),
                format!("{count} is not 1 or 2"),
            ))
        }
        None => None,
    };

    let sample_rate = fields.positive_u32("sampleRate")?;
    if let Some(rate) = sample_rate.filter(|rate| !SUPPORTED_SAMPLE_RATES.contains(rate)) {
        return Err(CompileError::invalid(
            fields.path("sampleRate"),
            format!("{rate} Hz is not supported"),
        ));
    }

    Ok(AudioConfig {
        bitrate: fields.positive_u32("bitrate")?,
        channels,
        sample_rate,
        echo_cancellation: fields.boolean("enableEchoCancellation")?,
        noise_suppression: fields.boolean("enableNoiseSuppression")?,
    })
}

fn mixer_fields(fields: &Fields<'_>) -> CompileResult<MixerConfig> {
    let background_color = match fields.string("backgroundColor")? {
        Some(text) => Some(Color::parse(text).ok_or_else(|| {
            CompileError::invalid(
                fields.path("backgroundColor"),
                format!("`{text}` is not #RRGGBB or #AARRGGBB"),
            )
        })?),
        None => None,
    };

    Ok(MixerConfig {
        canvas: fields.size("canvasWidth", "canvasHeight")?,
        background_color,
        slots: slot_list(fields)?,
    })
}

fn slot_list(fields: &Fields<'_>) -> CompileResult<Option<Vec<MixerSlot>>> {
    let Some(value) = fields.get("slots") else {
        return Ok(None);
    };
    let items = value
        .as_array()
        .ok_or_else(|| CompileError::invalid(fields.path("slots"), "expected an array"))?;

    let mut names = HashSet::new();
    let mut slots = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let prefix = format!("{}[{index}]", fields.path("slots"));
        let slot = Fields::object(item, &prefix)?;

        let name = slot
            .string("name")?
            .filter(|name| !name.is_empty())
            .ok_or_else(|| CompileError::invalid(slot.path("name"), "required"))?;
        if !names.insert(name.to_string()) {
            return Err(CompileError::invalid(
                slot.path("name"),
                format!("duplicate slot name `{name}`"),
            ));
        }

        slots.push(MixerSlot {
            name: name.to_string(),
            z_index: slot.i32("zIndex")?,
            x: slot.i32("x")?,
            y: slot.i32("y")?,
            size: slot.size("width", "height")?,
        });
    }

    Ok(Some(slots))
}

fn reconnection_fields(root: &Fields<'_>) -> CompileResult<ReconnectionConfig> {
    let mut reconnection = ReconnectionConfig::default();

    if let Some(enabled) = root.boolean("enableAutoReconnect")? {
        reconnection.enabled = enabled;
    }
    if let Some(retries) = root.u32("autoReconnectMaxRetries")? {
        reconnection.max_retries = retries;
    }
    if let Some(interval) = root.seconds("autoReconnectRetryInterval")? {
        reconnection.retry_interval = interval;
    }

    reconnection.validate()?;
    Ok(reconnection)
}

/// Typed accessors over one JSON object, reporting errors by field path.
struct Fields<'a> {
    prefix: &'a str,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn root(value: &'a Value) -> CompileResult<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::Object(map) => Ok(Some(Self { prefix: "", map })),
            _ => Err(CompileError::invalid("<root>", "expected an object")),
        }
    }

    fn section(value: &'a Value, prefix: &'a str) -> CompileResult<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            _ => Self::object(value, prefix).map(Some),
        }
    }

    fn object(value: &'a Value, prefix: &'a str) -> CompileResult<Self> {
        value
            .as_object()
            .map(|map| Self { prefix, map })
            .ok_or_else(|| CompileError::invalid(prefix, "expected an object"))
    }

    fn path(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.prefix)
        }
    }

    /// A present, non-null value.
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|value| !value.is_null())
    }

    fn child(&self, key: &'a str) -> CompileResult<Option<Fields<'a>>> {
        match self.get(key) {
            Some(value) => Self::object(value, key).map(Some),
            None => Ok(None),
        }
    }

    fn integer(&self, key: &str) -> CompileResult<Option<i64>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        if let Some(int) = value.as_i64() {
            return Ok(Some(int));
        }
        match value.as_f64() {
            Some(float) if float.fract() == 0.0 && float.abs() < i64::MAX as f64 => {
                Ok(Some(float as i64))
            }
            _ => Err(CompileError::invalid(self.path(key), "expected an integer")),
        }
    }

    fn u32(&self, key: &str) -> CompileResult<Option<u32>> {
        match self.integer(key)? {
            Some(int) => u32::try_from(int).map(Some).map_err(|_| {
                CompileError::invalid(self.path(key), format!("{int} is out of range"))
            }),
            None => Ok(None),
        }
    }

    fn positive_u32(&self, key: &str) -> CompileResult<Option<u32>> {
        match self.integer(key)? {
            Some(int) if int <= 0 => {
                Err(CompileError::invalid(self.path(key), format!("{int} is not positive")))
            }
            Some(int) => u32::try_from(int).map(Some).map_err(|_| {
                CompileError::invalid(self.path(key), format!("{int} is out of range"))
            }),
            None => Ok(None),
        }
    }

    fn i32(&self, key: &str) -> CompileResult<Option<i32>> {
        match self.integer(key)? {
            Some(int) => i32::try_from(int).map(Some).map_err(|_| {
                CompileError::invalid(self.path(key), format!("{int} is out of range"))
            }),
            None => Ok(None),
        }
    }

    fn boolean(&self, key: &str) -> CompileResult<Option<bool>> {
        match self.get(key) {
            Some(value) => value
                .as_bool()
                .map(Some)
                .ok_or_else(|| CompileError::invalid(self.path(key), "expected a boolean")),
            None => Ok(None),
        }
    }

    fn string(&self, key: &str) -> CompileResult<Option<&'a str>> {
        match self.get(key) {
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or_else(|| CompileError::invalid(self.path(key), "expected a string")),
            None => Ok(None),
        }
    }

    /// Non-negative seconds as a `Duration`.
    fn seconds(&self, key: &str) -> CompileResult<Option<Duration>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let seconds = value
            .as_f64()
            .ok_or_else(|| CompileError::invalid(self.path(key), "expected a number"))?;
        Duration::try_from_secs_f64(seconds)
            .map(Some)
            .map_err(|_| CompileError::invalid(self.path(key), format!("{seconds} is out of range")))
    }

    /// Look a string up in a mapping table. Unrecognized strings are errors.
    fn enumerated<T: Copy>(&self, key: &str, table: &[(&str, T)]) -> CompileResult<Option<T>> {
        let Some(text) = self.string(key)? else {
            return Ok(None);
        };
        table
            .iter()
            .find(|(name, _)| *name == text)
            .map(|(_, value)| Some(*value))
            .ok_or_else(|| {
                let expected: Vec<&str> = table.iter().map(|(name, _)| *name).collect();
                CompileError::invalid(
                    self.path(key),
                    format!("`{text}` is not one of {}", expected.join(", ")),
                )
            })
    }

    /// A width/height pair that must be given together.
    fn size(&self, width_key: &str, height_key: &str) -> CompileResult<Option<Size>> {
        match (
            self.positive_u32(width_key)?,
            self.positive_u32(height_key)?,
        ) {
            (Some(width), Some(height)) => Ok(Some(Size { width, height })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(CompileError::invalid(
                self.path(height_key),
                format!("required together with {width_key}"),
            )),
            (None, Some(_)) => Err(CompileError::invalid(
                self.path(width_key),
                format!("required together with {height_key}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::QualityOptimization;

    fn field_of(result: CompileResult<SessionConfiguration>) -> String {
        result.unwrap_err().field().unwrap_or_default().to_string()
    }

    #[test]
    fn test_empty_config_yields_defaults() {
        assert_eq!(compile(&json!({})).unwrap(), SessionConfiguration::default());
        assert_eq!(compile(&Value::Null).unwrap(), SessionConfiguration::default());
    }

    #[test]
    fn test_negative_bitrate_is_invalid() {
        assert_eq!(field_of(compile(&json!({"video": {"bitrate": -5}}))), "video.bitrate");
    }

    #[test]
    fn test_zero_bitrate_is_invalid() {
        assert_eq!(field_of(compile(&json!({"audio": {"bitrate": 0}}))), "audio.bitrate");
    }

    #[test]
    fn test_channel_count_outside_range() {
        assert_eq!(field_of(compile(&json!({"audio": {"channels": 3}}))), "audio.channels");
        let config = compile(&json!({"audio": {"channels": 1}})).unwrap();
        assert_eq!(config.audio.channels, Some(1));
    }

    #[test]
    fn test_unknown_quality_optimization_is_invalid() {
        let err = compile(&json!({"video": {"qualityOptimization": "smooth"}})).unwrap_err();
        assert!(matches!(err, CompileError::InvalidField { ref field, .. } if field == "video.qualityOptimization"));

        let config = compile(&json!({"video": {"qualityOptimization": "quality"}})).unwrap();
        assert_eq!(
            config.video.quality_optimization,
            Some(QualityOptimization::Quality)
        );
    }

    #[test]
    fn test_codec_and_legacy_flag() {
        let config = compile(&json!({"video": {"useH265": true}})).unwrap();
        assert_eq!(config.video.codec, Some(VideoCodec::H265));

        let config = compile(&json!({"video": {"codec": "h264", "useH265": false}})).unwrap();
        assert_eq!(config.video.codec, Some(VideoCodec::H264));

        assert_eq!(
            field_of(compile(&json!({"video": {"codec": "h264", "useH265": true}}))),
            "video.useH265"
        );
        assert_eq!(field_of(compile(&json!({"video": {"codec": "vp9"}}))), "video.codec");
    }

    #[test]
    fn test_video_size_requires_both_dimensions() {
        assert_eq!(field_of(compile(&json!({"video": {"width": 1280}}))), "video.height");

        let config = compile(&json!({"video": {"width": 1280, "height": 720}})).unwrap();
        assert_eq!(
            config.video.size,
            Some(Size {
                width: 1280,
                height: 720
            })
        );
    }

    #[test]
    fn test_framerate_alias() {
        let config = compile(&json!({"video": {"framerate": 30}})).unwrap();
        assert_eq!(config.video.target_framerate, Some(30));
    }

    #[test]
    fn test_bitrate_bounds() {
        let raw = json!({"video": {"bitrate": 500, "minBitrate": 1000}});
        assert_eq!(field_of(compile(&raw)), "video.bitrate");

        let raw = json!({"video": {"minBitrate": 3000, "maxBitrate": 1000}});
        assert_eq!(field_of(compile(&raw)), "video.minBitrate");
    }

    #[test]
    fn test_wrong_types_are_invalid() {
        assert_eq!(field_of(compile(&json!({"video": {"bitrate": "fast"}}))), "video.bitrate");
        assert_eq!(field_of(compile(&json!({"video": {"bitrate": 1.5}}))), "video.bitrate");
        assert_eq!(field_of(compile(&json!({"video": 12}))), "video");
        assert_eq!(field_of(compile(&json!([1, 2]))), "<root>");
    }

    #[test]
    fn test_unsupported_sample_rate() {
        assert_eq!(field_of(compile(&json!({"audio": {"sampleRate": 12345}}))), "audio.sampleRate");
        let config = compile(&json!({"audio": {"sampleRate": 44100}})).unwrap();
        assert_eq!(config.audio.sample_rate, Some(44100));
    }

    #[test]
    fn test_mixer_slots() {
        let config = compile(&json!({
            "mixer": {
                "canvasWidth": 1920,
                "canvasHeight": 1080,
                "backgroundColor": "#000000",
                "slots": [
                    {"name": "camera", "zIndex": 1},
                    {"name": "overlay", "zIndex": 2, "x": 10, "y": 10, "width": 320, "height": 180}
                ]
            }
        }))
        .unwrap();

        let slots = config.mixer.slots.as_deref().unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].name, "camera");
        assert_eq!(config.mixer.slot("overlay").and_then(|s| s.z_index), Some(2));
    }

    #[test]
    fn test_duplicate_slot_names() {
        let raw = json!({"mixer": {"slots": [{"name": "a"}, {"name": "a"}]}});
        assert_eq!(field_of(compile(&raw)), "mixer.slots[1].name");
    }

    #[test]
    fn test_slot_without_name() {
        let raw = json!({"mixer": {"slots": [{"zIndex": 3}]}});
        assert_eq!(field_of(compile(&raw)), "mixer.slots[0].name");
    }

    #[test]
    fn test_bad_background_color() {
        let raw = json!({"mixer": {"backgroundColor": "red"}});
        assert_eq!(field_of(compile(&raw)), "mixer.backgroundColor");
    }

    #[test]
    fn test_reconnection_settings() {
        let config = compile(&json!({
            "enableAutoReconnect": true,
            "autoReconnectMaxRetries": 0,
            "autoReconnectRetryInterval": 0.5
        }))
        .unwrap();

        assert!(config.reconnection.enabled);
        assert_eq!(config.reconnection.max_retries, 0);
        assert_eq!(config.reconnection.retry_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_reconnection_invalid_values() {
        assert_eq!(
            field_of(compile(&json!({"autoReconnectMaxRetries": -1}))),
            "autoReconnectMaxRetries"
        );
        assert_eq!(
            field_of(compile(&json!({"enableAutoReconnect": true, "autoReconnectRetryInterval": 0}))),
            "autoReconnectRetryInterval"
        );
        assert_eq!(
            field_of(compile(&json!({"autoReconnectRetryInterval": -2.0}))),
            "autoReconnectRetryInterval"
        );
    }

    #[test]
    fn test_camera_position() {
        let config = compile(&json!({"cameraPosition": "back"})).unwrap();
        assert_eq!(config.camera_position, Some(CameraPosition::Back));
        assert_eq!(field_of(compile(&json!({"cameraPosition": "side"}))), "cameraPosition");
    }

    #[test]
    fn test_partial_sections() {
        let video = compile_video(&json!({"bitrate": 2_500_000})).unwrap();
        assert_eq!(video.initial_bitrate, Some(2_500_000));

        let err = compile_audio(&json!({"channels": 0})).unwrap_err();
        assert_eq!(err.field(), Some("audio.channels"));

        let mixer = compile_mixer(&json!({"slots": [{"name": "pip"}]})).unwrap();
        assert!(mixer.slot("pip").is_some());
    }
}
