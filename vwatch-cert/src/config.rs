//! vwatch-cert specific configuration

use crate::certification::CertificationPolicy;
use std::path::{Path, PathBuf};
use vwatch_common::config::{database_path, resolve_root_folder, ROOT_FOLDER_ENV};
use vwatch_common::events::WatchedFrom;

/// Service configuration resolved at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub root_folder: PathBuf,
    pub db_path: PathBuf,
    pub port: u16,
    /// User whose views this process certifies
    pub user_id: String,
    /// Hosting context recorded on every watch record
    pub context: WatchedFrom,
}

impl Config {
    /// Resolve the root folder (CLI, env, TOML, OS default) and derive the database path
    pub fn new(cli_root_folder: Option<&Path>, port: u16, user_id: impl Into<String>, context: WatchedFrom) -> Self {
        let root_folder = resolve_root_folder(cli_root_folder, ROOT_FOLDER_ENV);
        let db_path = database_path(&root_folder);
        Self {
            root_folder,
            db_path,
            port,
            user_id: user_id.into(),
            context,
        }
    }
}

/// Runtime policy parameters loaded from the `settings` table
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub policy: CertificationPolicy,
    pub countdown_seconds: u32,
    pub rewatch_cooldown_ms: i64,
    /// Client recompute interval for locked-video countdowns
    pub rewatch_refresh_interval_secs: u64,
    pub seconds_per_token: f64,
    pub stats_batch_size: usize,
    pub event_bus_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            policy: CertificationPolicy::default(),
            countdown_seconds: 5,
            rewatch_cooldown_ms: 3_600_000,
            rewatch_refresh_interval_secs: 30,
            seconds_per_token: 600.0,
            stats_batch_size: 10,
            event_bus_capacity: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_root_folder_sets_db_path() {
        let config = Config::new(Some(Path::new("/tmp/vwatch-root")), 5780, "user-1", WatchedFrom::Room);
        assert_eq!(config.root_folder, PathBuf::from("/tmp/vwatch-root"));
        assert_eq!(config.db_path, PathBuf::from("/tmp/vwatch-root/vwatch.db"));
        assert_eq!(config.context, WatchedFrom::Room);
    }
}
