//! Bridge configuration.
//!
//! Loaded from TOML; every field has a default so an empty document is a
//! valid configuration.
//!
//! ```toml
//! selector_variable = "ScriptSelector_Name"
//! libraries = ["table", "string", "math"]
//! memory_limit_bytes = 16777216
//! binding_retention = "discard"
//!
//! [log]
//! level = "info"
//! format = "json"
//! ```

use crate::codec::is_valid_identifier;
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Default global holding the key chosen by the selector script.
pub const DEFAULT_SELECTOR_VARIABLE: &str = "ScriptSelector_Name";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format: {s}. Expected pretty or json")),
        }
    }
}

/// Lua standard libraries that may be opened in the runtime.
///
/// `debug` and `ffi` are deliberately absent: they can only be loaded
/// through mlua's unsafe constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LuaLibrary {
    Coroutine,
    Table,
    Io,
    Os,
    String,
    Utf8,
    Math,
    Package,
}

impl LuaLibrary {
    pub const ALL: [Self; 8] = [
        Self::Coroutine,
        Self::Table,
        Self::Io,
        Self::Os,
        Self::String,
        Self::Utf8,
        Self::Math,
        Self::Package,
    ];

    pub fn std_lib(self) -> mlua::StdLib {
        match self {
            Self::Coroutine => mlua::StdLib::COROUTINE,
            Self::Table => mlua::StdLib::TABLE,
            Self::Io => mlua::StdLib::IO,
            Self::Os => mlua::StdLib::OS,
            Self::String => mlua::StdLib::STRING,
            Self::Utf8 => mlua::StdLib::UTF8,
            Self::Math => mlua::StdLib::MATH,
            Self::Package => mlua::StdLib::PACKAGE,
        }
    }

    /// Combine a set of libraries into mlua flags.
    pub fn combine(libraries: &[Self]) -> mlua::StdLib {
        libraries
            .iter()
            .fold(mlua::StdLib::NONE, |acc, lib| acc | lib.std_lib())
    }
}

/// What happens to bound objects when an execution cycle fails.
///
/// Successful cycles always discard their bindings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingRetention {
    /// Discard bindings after every cycle, failed or not.
    #[default]
    Discard,
    /// Keep bindings after a failed cycle so `execute` can be retried.
    RetainOnFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Global the selector script must set to a registered key.
    pub selector_variable: String,

    /// Standard libraries opened in the Lua state. The base library is
    /// always present.
    pub libraries: Vec<LuaLibrary>,

    /// Upper bound on Lua heap usage; unlimited when unset.
    pub memory_limit_bytes: Option<usize>,

    pub binding_retention: BindingRetention,

    pub log: LogConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            selector_variable: DEFAULT_SELECTOR_VARIABLE.to_string(),
            libraries: LuaLibrary::ALL.to_vec(),
            memory_limit_bytes: None,
            binding_retention: BindingRetention::default(),
            log: LogConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded bridge config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_identifier(&self.selector_variable) {
            return Err(ConfigError::Invalid(format!(
                "selector_variable '{}' is not a valid Lua identifier",
                self.selector_variable
            )));
        }
        if self.memory_limit_bytes == Some(0) {
            return Err(ConfigError::Invalid(
                "memory_limit_bytes must be greater than zero; omit it for no limit".to_string(),
            ));
        }
        Ok(())
    }
}
