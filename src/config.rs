//! Translator configuration.
//!
//! Generated kernels bake in the external compiler command and the include
//! path the runtime cache hands to it. Both come from an `mjit.toml` found
//! by searching upward from the input file, with CLI flags overriding and
//! usable defaults when neither is present.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Root configuration structure matching mjit.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MjitConfig {
    /// External compiler settings
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Paths baked into generated cache construction
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Compiler executable invoked by the runtime kernel cache.
    #[serde(default = "default_command")]
    pub command: String,

    /// Flags appended to every compilation.
    #[serde(default = "default_flags")]
    pub flags: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Include directory handed to the external compiler.
    #[serde(default = "default_include_dir")]
    pub include_dir: String,
}

fn default_command() -> String {
    "c++".to_string()
}

fn default_flags() -> String {
    "-O3 -std=c++11 -fPIC -shared".to_string()
}

fn default_include_dir() -> String {
    ".".to_string()
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            flags: default_flags(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            include_dir: default_include_dir(),
        }
    }
}

impl MjitConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MjitConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Find and load configuration by searching up from the given
    /// directory. Falls back to defaults when no mjit.toml exists.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join("mjit.toml");
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                return Ok(Self::default());
            }
        }
    }

    /// Full external compiler command line as baked into generated code.
    pub fn command_line(&self) -> String {
        format!("{} {}", self.compiler.command, self.compiler.flags)
    }
}
