//! Root folder resolution tests
//!
//! Tests that manipulate process environment variables are marked
//! `#[serial]` so they never run concurrently.

use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use vwatch_common::config::{resolve_root_folder, CONFIG_FILE_ENV};

const TEST_ENV: &str = "VWATCH_TEST_ROOT_FOLDER";

#[test]
#[serial]
fn test_cli_argument_wins() {
    env::set_var(TEST_ENV, "/from/env");
    let root = resolve_root_folder(Some(Path::new("/from/cli")), TEST_ENV);
    assert_eq!(root, PathBuf::from("/from/cli"));
    env::remove_var(TEST_ENV);
}

#[test]
#[serial]
fn test_env_var_used_without_cli() {
    env::set_var(TEST_ENV, "/from/env");
    let root = resolve_root_folder(None, TEST_ENV);
    assert_eq!(root, PathBuf::from("/from/env"));
    env::remove_var(TEST_ENV);
}

#[test]
#[serial]
fn test_config_file_used_without_cli_or_env() {
    env::remove_var(TEST_ENV);
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(&config_path, "root_folder = \"/from/toml\"\n").unwrap();
    env::set_var(CONFIG_FILE_ENV, &config_path);

    let root = resolve_root_folder(None, TEST_ENV);
    assert_eq!(root, PathBuf::from("/from/toml"));

    env::remove_var(CONFIG_FILE_ENV);
}

#[test]
#[serial]
fn test_broken_config_file_falls_back_to_default() {
    env::remove_var(TEST_ENV);
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(&config_path, "root_folder = [").unwrap();
    env::set_var(CONFIG_FILE_ENV, &config_path);

    let root = resolve_root_folder(None, TEST_ENV);
    assert!(!root.as_os_str().is_empty());
    assert_ne!(root, PathBuf::from("/from/toml"));

    env::remove_var(CONFIG_FILE_ENV);
}
