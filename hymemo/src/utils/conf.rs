use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    blueprint::{EvaluatorKind, select},
    magic::{ENV_MEMO_CONFIG_PATH, HYPERION_CONFIG_DIR_NAME, MEMO_CONFIG_FILE_NAME},
    utils::error::{MemoError, MemoResult},
};

/// Configuration applied to blueprints created through [`crate::Blueprint::with_config`].
///
/// ```toml
/// immutable = true
/// trace_evaluations = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoConfig {
    /// Compute every attribute eagerly at construction time.
    pub immutable: bool,

    /// Emit a `trace` log line on each evaluation and cache hit.
    pub trace_evaluations: bool,
}

impl MemoConfig {
    /// Evaluator selected by this configuration.
    pub const fn kind(&self) -> EvaluatorKind {
        select(self.immutable)
    }

    /// Get the default path to the hymemo configuration file.
    pub fn default_path() -> PathBuf {
        if let Ok(config_path) = std::env::var(ENV_MEMO_CONFIG_PATH) {
            return config_path.into();
        }

        let mut path = PathBuf::new();

        #[cfg(target_os = "windows")]
        {
            if let Ok(appdata) = std::env::var("APPDATA") {
                path.push(appdata);
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
                path.push(xdg_config_home);
            } else if let Ok(home) = std::env::var("HOME") {
                path.push(home);
                path.push(".config");
            }
        }

        path.push(HYPERION_CONFIG_DIR_NAME);
        path.push(MEMO_CONFIG_FILE_NAME);
        path
    }

    /// Parse a configuration from a TOML string. Missing keys take their default value.
    pub fn from_toml_str(toml_str: &str) -> MemoResult<Self> {
        toml::from_str(toml_str).map_err(|e| MemoError::ConfigParseError {
            source: e,
            file: "<string>".to_string(),
        })
    }

    /// Load a configuration from a TOML file.
    pub fn load_from_toml(path: &Path) -> MemoResult<Self> {
        let toml_str = std::fs::read_to_string(path)?;
        toml::from_str(&toml_str).map_err(|e| MemoError::ConfigParseError {
            source: e,
            file: path.display().to_string(),
        })
    }

    /// Load the configuration at [`Self::default_path`], falling back to the defaults when the
    /// file does not exist.
    pub fn load_or_default() -> MemoResult<Self> {
        let path = Self::default_path();
        if path.is_file() {
            Self::load_from_toml(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the configuration to a TOML file, creating parent directories as needed.
    pub fn save_to_toml(&self, path: &Path) -> MemoResult<()> {
        let toml_str = toml::to_string(self).map_err(|e| {
            MemoError::Unknown(format!(
                "Failed during serialization of TOML to path `{}`: {}",
                path.display(),
                e
            ))
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, toml_str)?;
        Ok(())
    }
}
