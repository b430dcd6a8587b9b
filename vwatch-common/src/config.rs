//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "vwatch.db";

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "VWATCH_ROOT_FOLDER";

/// Environment variable overriding the TOML config file location
pub const CONFIG_FILE_ENV: &str = "VWATCH_CONFIG";

/// Optional on-disk configuration
///
/// Missing file or missing keys are not errors; every field falls back
/// to the next source in the resolution order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// Parse configuration text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Load configuration from a file path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

/// Root folder resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, env_var_name: &str) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    match config_file_path() {
        Ok(config_path) => match TomlConfig::load(&config_path) {
            Ok(TomlConfig { root_folder: Some(root), .. }) => return root,
            Ok(_) => debug!("Config file {} has no root_folder", config_path.display()),
            Err(e) => warn!("Ignoring config file {}: {}", config_path.display(), e),
        },
        Err(e) => debug!("No config file: {}", e),
    }

    default_root_folder()
}

/// Path of the SQLite database inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

/// Locate the configuration file for the platform
///
/// `VWATCH_CONFIG` wins; otherwise the user config dir, then `/etc` on Linux.
fn config_file_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        let path = PathBuf::from(path);
        return if path.exists() {
            Ok(path)
        } else {
            Err(Error::Config(format!("Config file not found: {:?}", path)))
        };
    }

    let user_config = dirs::config_dir().map(|d| d.join("vwatch").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/vwatch/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("vwatch"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/vwatch"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("vwatch"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/vwatch"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("vwatch"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\vwatch"))
    } else {
        PathBuf::from("./vwatch_data")
    }
}
