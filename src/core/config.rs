//! TOML configuration: adb executable, knowledge-base source, restore output.
//!
//! Only a resolved executable path and the knowledge-base source mode are read
//! by the engine itself; the feature toggles are carried for the settings layer.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, UadError};

/// Environment variable replacing `adb.executable`.
pub const ADB_ENV_OVERRIDE: &str = "UAD_ADB";

/// Knowledge-base source modes the settings layer may select.
pub const KNOWN_SOURCE_MODES: [&str; 2] = ["local", "remote"];

const MAX_DEBOUNCE_MS: u64 = 5_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub adb: AdbConfig,
    pub knowledge_base: KnowledgeBaseConfig,
    pub restore: RestoreConfig,
    pub filter: FilterConfig,
    pub features: FeatureConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdbConfig {
    /// Program name or path of the device-management executable.
    pub executable: String,
    /// Directory of a managed platform-tools install; empty when unused.
    pub platform_tools_dir: PathBuf,
}

impl Default for AdbConfig {
    fn default() -> Self {
        Self {
            executable: "adb".to_string(),
            platform_tools_dir: PathBuf::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    pub source: String,
    pub dir: PathBuf,
    /// Appended to the normalized manufacturer key to form the pack file name.
    pub suffix: String,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            source: "local".to_string(),
            dir: PathBuf::from("oem-packs"),
            suffix: "-20251113.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Base directory for restore scripts; empty selects `<config dir>/restore`.
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub debounce_ms: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { debounce_ms: 160 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub auto_update_platform_tools: bool,
    pub telemetry_opt_in: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            auto_update_platform_tools: true,
            telemetry_opt_in: false,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is tried
    /// and defaults are used when nothing is there.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(UadError::MissingConfig {
                        path: path.to_path_buf(),
                    });
                }
                Self::from_file(path)?
            }
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides(std::env::var(ADB_ENV_OVERRIDE).ok().as_deref());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| UadError::io(path, e))?;
        Ok(toml::from_str(&raw)?)
    }

    fn apply_env_overrides(&mut self, adb: Option<&str>) {
        if let Some(value) = adb.map(str::trim).filter(|v| !v.is_empty()) {
            self.adb.executable = value.to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !KNOWN_SOURCE_MODES.contains(&self.knowledge_base.source.as_str()) {
            return Err(UadError::InvalidConfig {
                details: format!(
                    "knowledge_base.source must be one of {KNOWN_SOURCE_MODES:?}, got {:?}",
                    self.knowledge_base.source
                ),
            });
        }
        if self.knowledge_base.suffix.trim().is_empty() {
            return Err(UadError::InvalidConfig {
                details: "knowledge_base.suffix must not be empty".to_string(),
            });
        }
        if self.filter.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(UadError::InvalidConfig {
                details: format!(
                    "filter.debounce_ms must be <= {MAX_DEBOUNCE_MS}, got {}",
                    self.filter.debounce_ms
                ),
            });
        }
        Ok(())
    }

    /// Executable path handed to the command runner.
    #[must_use]
    pub fn resolved_adb_path(&self) -> String {
        let executable = self.adb.executable.trim();
        let executable = if executable.is_empty() {
            "adb"
        } else {
            executable
        };
        if executable == "adb" && !self.adb.platform_tools_dir.as_os_str().is_empty() {
            let binary = if cfg!(windows) { "adb.exe" } else { "adb" };
            return self
                .adb
                .platform_tools_dir
                .join(binary)
                .to_string_lossy()
                .into_owned();
        }
        executable.to_string()
    }

    #[must_use]
    pub fn restore_dir(&self) -> PathBuf {
        if self.restore.dir.as_os_str().is_empty() {
            config_dir().map_or_else(|| PathBuf::from("restore"), |dir| dir.join("restore"))
        } else {
            self.restore.dir.clone()
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| UadError::Serialization {
            context: "toml",
            details: e.to_string(),
        })
    }
}

/// Per-user configuration directory.
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        if let Some(appdata) = std::env::var_os("APPDATA").filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(appdata).join("UniversalADB"));
        }
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg).join("universal-adb-debloater"));
    }
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|v| !v.is_empty())
        .map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("universal-adb-debloater")
        })
}

#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}
