//! Startup configuration – reads/writes `~/.twinboard/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use twinboard_runtime::BoardConfig;
use twinboard_types::ConfigError;

/// How the CLI drives the simulated boards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop after this many cycles. Runs until Ctrl-C when unset.
    pub max_cycles: Option<u64>,
    /// Frames each loopback direction buffers before a send is refused.
    pub link_capacity: usize,
    /// Seconds between status lines.
    pub status_interval_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_cycles: None,
            link_capacity: 8,
            status_interval_secs: 1,
        }
    }
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub board: BoardConfig,
    pub run: RunConfig,
}

/// Return the path to `~/.twinboard/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".twinboard").join("config.toml")
}

/// Load, apply `TWINBOARD_*` overrides and validate.
///
/// An explicit `path` must exist. Without one, a missing default file means
/// built-in defaults.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut cfg = match path {
        Some(p) => load_from(p)?.ok_or_else(|| {
            ConfigError::Invalid(format!("config file {} does not exist", p.display()))
        })?,
        None => load_from(&config_path())?.unwrap_or_default(),
    };
    apply_env_overrides(&mut cfg)?;
    cfg.board.validate()?;
    Ok(cfg)
}

/// `None` if the file does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        ConfigError::Invalid(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| ConfigError::Invalid(format!("failed to parse config: {e}")))?;
    Ok(Some(cfg))
}

/// Apply `TWINBOARD_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TWINBOARD_ROLE` | `board.role` (`full`, `chassis-side`, `gimbal-side`) |
/// | `TWINBOARD_KINEMATICS` | `board.kinematics` (`omni`, `mecanum`) |
/// | `TWINBOARD_VISION` | `board.vision` (`virtual-serial`, `hardware-uart`, `absent`) |
/// | `TWINBOARD_OPERATOR_LINK` | `board.operator_link` (`remote`, `video-link`) |
/// | `TWINBOARD_RATE` | `board.dispatch.rate_hz` |
/// | `TWINBOARD_CYCLES` | `run.max_cycles` |
///
/// A set but unparsable variable is an error rather than silently ignored:
/// running the wrong board role is worse than not starting.
pub fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    if let Ok(v) = std::env::var("TWINBOARD_ROLE") {
        cfg.board.role = v.parse()?;
    }
    if let Ok(v) = std::env::var("TWINBOARD_KINEMATICS") {
        cfg.board.kinematics = v.parse()?;
    }
    if let Ok(v) = std::env::var("TWINBOARD_VISION") {
        cfg.board.vision = v.parse()?;
    }
    if let Ok(v) = std::env::var("TWINBOARD_OPERATOR_LINK") {
        cfg.board.operator_link = v.parse()?;
    }
    if let Ok(v) = std::env::var("TWINBOARD_RATE") {
        cfg.board.dispatch.rate_hz = parse_number("TWINBOARD_RATE", &v)?;
    }
    if let Ok(v) = std::env::var("TWINBOARD_CYCLES") {
        cfg.run.max_cycles = Some(parse_number("TWINBOARD_CYCLES", &v)?);
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{name}='{value}' is not a number")))
}

/// Write `cfg` to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ConfigError::Invalid(format!("failed to create config directory: {e}"))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| ConfigError::Invalid(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        ConfigError::Invalid(format!("failed to write config at {}: {e}", path.display()))
    })
}
