use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "sdfview.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Contents of `sdfview.toml`. Every setting is optional; unset values fall
/// back to the viewer defaults or to command-line flags.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViewerFile {
    pub version: u32,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub camera: CameraSection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub shader: ShaderSection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WindowSection {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CameraSection {
    pub fly_speed: Option<f32>,
    pub mouse_sensitivity: Option<f32>,
    pub wheel_speed_factor: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TimingSection {
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        serialize_with = "serialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub poll_interval: Option<Duration>,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        serialize_with = "serialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub query_interval: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ShaderSection {
    pub path: Option<PathBuf>,
}

impl Default for ViewerFile {
    fn default() -> Self {
        Self {
            version: 1,
            window: WindowSection::default(),
            camera: CameraSection::default(),
            timing: TimingSection::default(),
            shader: ShaderSection::default(),
        }
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be a non-negative number"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration_opt<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(duration) => {
            serializer.serialize_str(&humantime::format_duration(*duration).to_string())
        }
        None => serializer.serialize_none(),
    }
}

impl ViewerFile {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: ViewerFile = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates a config file. A relative `shader.path` is taken
    /// relative to the directory holding the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut file = Self::from_toml_str(&input)?;
        if let Some(base) = path.parent() {
            file.resolve_relative_paths(base);
        }
        Ok(file)
    }

    /// Like [`ViewerFile::load`], but a missing file yields `Ok(None)`.
    pub fn load_if_present(path: &Path) -> Result<Option<Self>, ConfigError> {
        match Self::load(path) {
            Ok(file) => Ok(Some(file)),
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn surface_size(&self) -> Option<(u32, u32)> {
        Some((self.window.width?, self.window.height?))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.window.width == Some(0) || self.window.height == Some(0) {
            return Err(ConfigError::Invalid(
                "window width and height must be greater than zero".into(),
            ));
        }

        if self.window.width.is_some() != self.window.height.is_some() {
            return Err(ConfigError::Invalid(
                "window width and height must be set together".into(),
            ));
        }

        if let Some(speed) = self.camera.fly_speed {
            if !speed.is_finite() || speed <= 0.0 {
                return Err(ConfigError::Invalid(
                    "camera.fly_speed must be greater than zero".into(),
                ));
            }
        }

        for (name, value) in [
            ("camera.mouse_sensitivity", self.camera.mouse_sensitivity),
            ("camera.wheel_speed_factor", self.camera.wheel_speed_factor),
        ] {
            if value.is_some_and(|value| !value.is_finite()) {
                return Err(ConfigError::Invalid(format!("{name} must be a finite number")));
            }
        }

        for (name, value) in [
            ("timing.poll_interval", self.timing.poll_interval),
            ("timing.query_interval", self.timing.query_interval),
        ] {
            if value.is_some_and(|value| value.is_zero()) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        if let Some(path) = &self.shader.path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("shader.path may not be empty".into()));
            }
        }

        Ok(())
    }

    fn resolve_relative_paths(&mut self, base: &Path) {
        if let Some(path) = self.shader.path.as_mut() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}
