use crate::error::{Error, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strum::{Display, EnumString};
use tracing::warn;

pub const DEFAULT_FIRST_INDEX: i32 = 0;
pub const DEFAULT_LAST_INDEX: i32 = 3;
pub const DEFAULT_OUTPUT_DIR: &str = ".";
pub const ENV_FIRST_INDEX: &str = "CAMPROBE_FIRST_INDEX";
pub const ENV_LAST_INDEX: &str = "CAMPROBE_LAST_INDEX";
pub const ENV_OUTPUT_DIR: &str = "CAMPROBE_OUTPUT_DIR";
pub const ENV_BACKEND: &str = "CAMPROBE_BACKEND";

/// Which capture API to ask for when opening a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendKind {
    V4l2,
    Auto,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(target_os = "linux") {
            BackendKind::V4l2
        } else {
            BackendKind::Auto
        }
    }
}

/// Values given explicitly on the command line. They win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub first_index: Option<i32>,
    pub last_index: Option<i32>,
    pub output_dir: Option<PathBuf>,
    pub backend: Option<BackendKind>,
}

/// Effective probe settings resolved from flags, environment, config file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub first_index: i32,
    pub last_index: i32,
    pub output_dir: PathBuf,
    pub backend: BackendKind,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    first_index: Option<i32>,
    last_index: Option<i32>,
    output_dir: Option<PathBuf>,
    backend: Option<BackendKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigDoctor {
    pub first_index: i32,
    pub last_index: i32,
    pub output_dir: String,
    pub backend: BackendKind,
    pub config_file: Option<String>,
    pub config_file_present: bool,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            first_index: DEFAULT_FIRST_INDEX,
            last_index: DEFAULT_LAST_INDEX,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            backend: BackendKind::default(),
        }
    }
}

impl ProbeSettings {
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let contents = config_path().and_then(|path| fs::read_to_string(path).ok());
        Self::resolve(overrides, |key| std::env::var(key).ok(), contents.as_deref())
    }

    /// Flags are trusted as given. Environment and file values that fail to
    /// parse are logged and skipped so a stray setting never stops a run.
    pub(crate) fn resolve(
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
        file_contents: Option<&str>,
    ) -> Result<Self> {
        let file = match file_contents.map(toml::from_str::<ConfigFile>).transpose() {
            Ok(file) => file.unwrap_or_default(),
            Err(err) => {
                warn!(%err, "ignoring unreadable config file");
                ConfigFile::default()
            }
        };

        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let mut first_index = overrides
            .first_index
            .or_else(|| env_parsed(&env, ENV_FIRST_INDEX))
            .or(file.first_index)
            .unwrap_or(DEFAULT_FIRST_INDEX);
        let mut last_index = overrides
            .last_index
            .or_else(|| env_parsed(&env, ENV_LAST_INDEX))
            .or(file.last_index)
            .unwrap_or(DEFAULT_LAST_INDEX);
        let output_dir = overrides
            .output_dir
            .clone()
            .or_else(|| env(ENV_OUTPUT_DIR).map(PathBuf::from))
            .or(file.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let backend = overrides
            .backend
            .or_else(|| env_parsed(&env, ENV_BACKEND))
            .or(file.backend)
            .unwrap_or_default();

        if first_index > last_index {
            match (overrides.first_index, overrides.last_index) {
                (Some(_), Some(_)) => {
                    return Err(Error::InvalidConfig(format!(
                        "first index {first_index} is greater than last index {last_index}"
                    )));
                }
                (None, Some(_)) => first_index = last_index,
                _ => last_index = first_index,
            }
            warn!(first_index, last_index, "index range was inverted; narrowed it");
        }

        Ok(Self {
            first_index,
            last_index,
            output_dir,
            backend,
        })
    }

    pub fn indices(&self) -> RangeInclusive<i32> {
        self.first_index..=self.last_index
    }

    pub fn ensure_output_dir(&self) -> Result<&Path> {
        fs::create_dir_all(&self.output_dir).map_err(|err| {
            Error::InvalidConfig(format!(
                "failed to create output dir {}: {err}",
                self.output_dir.display()
            ))
        })?;
        Ok(&self.output_dir)
    }

    pub fn doctor(&self) -> ConfigDoctor {
        let path = config_path();
        ConfigDoctor {
            first_index: self.first_index,
            last_index: self.last_index,
            output_dir: self.output_dir.display().to_string(),
            backend: self.backend,
            config_file_present: path.as_ref().is_some_and(|p| p.is_file()),
            config_file: path.map(|p| p.display().to_string()),
        }
    }
}

fn env_parsed<T>(env: impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, value = %raw, %err, "ignoring unparsable environment value");
            None
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("camprobe").join("config.toml"))
}
