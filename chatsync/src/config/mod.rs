//! Engine configuration.
//!
//! Compiled defaults, optionally overridden by a TOML file
//! (`~/.config/chatsync/config.toml` by default). A missing default file
//! is not an error; an explicit path that doesn't exist is.

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    limits: LimitsFileConfig,
    typing: TypingFileConfig,
    engine: EngineFileConfig,
}

/// `[limits]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct LimitsFileConfig {
    max_attachment_bytes: Option<u64>,
    max_text_len: Option<usize>,
}

/// `[typing]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct TypingFileConfig {
    ttl_ms: Option<u64>,
    debounce_ms: Option<u64>,
}

/// `[engine]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct EngineFileConfig {
    event_buffer: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Ceiling on attachment payload size in bytes. The chat profile uses
    /// 10 MiB; a coursework profile would raise this, it is not a
    /// universal constant.
    pub max_attachment_bytes: u64,
    /// Ceiling on message text length in bytes.
    pub max_text_len: usize,
    /// How long a peer's typing indicator stays alive without renewal.
    pub typing_ttl: Duration,
    /// Idle window after the last keystroke before "typing end" is emitted.
    pub typing_debounce: Duration,
    /// Buffer size for the engine's UI event channel.
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attachment_bytes: 10 * 1024 * 1024,
            max_text_len: chatsync_proto::message::DEFAULT_MAX_TEXT_LEN,
            typing_ttl: Duration::from_secs(2),
            typing_debounce: Duration::from_secs(2),
            event_buffer: 64,
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional TOML file over the defaults.
    ///
    /// If `path` is given, the file must exist and parse. If it is `None`,
    /// the default path (`~/.config/chatsync/config.toml`) is tried and
    /// silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit config file cannot be read
    /// or any file fails to parse.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let file = load_config_file(path)?;
        Ok(Self::resolve(&file))
    }

    /// Resolve an `EngineConfig` from a parsed config file.
    ///
    /// Priority: file > default. Separated from `load()` to enable unit
    /// testing without filesystem access.
    #[must_use]
    fn resolve(file: &ConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            max_attachment_bytes: file
                .limits
                .max_attachment_bytes
                .unwrap_or(defaults.max_attachment_bytes),
            max_text_len: file.limits.max_text_len.unwrap_or(defaults.max_text_len),
            typing_ttl: file
                .typing
                .ttl_ms
                .map_or(defaults.typing_ttl, Duration::from_millis),
            typing_debounce: file
                .typing
                .debounce_ms
                .map_or(defaults.typing_debounce, Duration::from_millis),
            event_buffer: file.engine.event_buffer.unwrap_or(defaults.event_buffer),
        }
    }
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and a missing
/// file is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("chatsync").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
