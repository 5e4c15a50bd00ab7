//! Store capacities and parts format versions.
//!
//! With the `config-loader` feature, a [`SaveConfig`] can be read from a RON,
//! TOML or JSON file. Missing fields take their defaults.

use crate::dialogue_log::DIALOGUE_LOG_CAPACITY;
use crate::glyph::DEFAULT_GLYPH_CAPACITY;
use crate::parts::PARTS_VERSION;
use crate::scene_cache::SCENE_CACHE_CAPACITY;
use serde::{Deserialize, Serialize};

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be at least 1")]
    ZeroCapacity { field: &'static str },

    #[error("{field} = {value} is outside the supported versions 1..={supported}")]
    UnsupportedVersion {
        field: &'static str,
        value: u32,
        supported: u32,
    },

    #[cfg(feature = "config-loader")]
    #[error("unsupported config format: {file}")]
    UnsupportedFormat { file: std::path::PathBuf },

    #[cfg(feature = "config-loader")]
    #[error("parse error in {file}: {detail}")]
    Parse {
        file: std::path::PathBuf,
        detail: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Config types
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartsConfig {
    /// Version written by `PartsEngine::save`.
    pub write_version: u32,
    /// Newest version `PartsEngine::load` accepts.
    pub max_load_version: u32,
}

impl Default for PartsConfig {
    fn default() -> Self {
        Self {
            write_version: PARTS_VERSION,
            max_load_version: PARTS_VERSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    pub dialogue_log_capacity: usize,
    pub scene_cache_capacity: usize,
    /// Initial capacity. The pool doubles when full.
    pub glyph_pool_capacity: usize,
    pub parts: PartsConfig,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            dialogue_log_capacity: DIALOGUE_LOG_CAPACITY,
            scene_cache_capacity: SCENE_CACHE_CAPACITY,
            glyph_pool_capacity: DEFAULT_GLYPH_CAPACITY,
            parts: PartsConfig::default(),
        }
    }
}

impl SaveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("dialogue_log_capacity", self.dialogue_log_capacity),
            ("scene_cache_capacity", self.scene_cache_capacity),
            ("glyph_pool_capacity", self.glyph_pool_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroCapacity { field });
            }
        }
        for (field, value) in [
            ("parts.write_version", self.parts.write_version),
            ("parts.max_load_version", self.parts.max_load_version),
        ] {
            if !(1..=PARTS_VERSION).contains(&value) {
                return Err(ConfigError::UnsupportedVersion {
                    field,
                    value,
                    supported: PARTS_VERSION,
                });
            }
        }
        Ok(())
    }
}

// ===========================================================================
// Loading
// ===========================================================================

#[cfg(feature = "config-loader")]
pub use loader::{Format, detect_format, load_config, parse_config};

#[cfg(feature = "config-loader")]
mod loader {
    use super::{ConfigError, SaveConfig};
    use std::path::Path;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Format {
        Ron,
        Toml,
        Json,
    }

    /// Detect the format of a config file from its extension.
    pub fn detect_format(path: &Path) -> Result<Format, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ron") => Ok(Format::Ron),
            Some("toml") => Ok(Format::Toml),
            Some("json") => Ok(Format::Json),
            _ => Err(ConfigError::UnsupportedFormat {
                file: path.to_path_buf(),
            }),
        }
    }

    /// Parse and validate a config held in memory.
    pub fn parse_config(text: &str, format: Format) -> Result<SaveConfig, ConfigError> {
        parse_named(text, format, Path::new("<memory>"))
    }

    /// Read, parse and validate a config file.
    pub fn load_config(path: &Path) -> Result<SaveConfig, ConfigError> {
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        let config = parse_named(&content, format, path)?;
        tracing::debug!(path = %path.display(), ?format, "loaded save config");
        Ok(config)
    }

    fn parse_named(text: &str, format: Format, file: &Path) -> Result<SaveConfig, ConfigError> {
        let parse_error = |detail: String| ConfigError::Parse {
            file: file.to_path_buf(),
            detail,
        };
        let config: SaveConfig = match format {
            Format::Ron => ron::from_str(text).map_err(|e| parse_error(e.to_string()))?,
            Format::Toml => toml::from_str(text).map_err(|e| parse_error(e.to_string()))?,
            Format::Json => serde_json::from_str(text).map_err(|e| parse_error(e.to_string()))?,
        };
        config.validate()?;
        Ok(config)
    }
}
