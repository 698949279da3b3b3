//! Configuration loading and root folder resolution
//!
//! Tests that touch PKS_ROOT_FOLDER are marked #[serial] so they never race
//! on the process environment.

use pks_common::config::{
    load_toml_config, CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig,
    DATABASE_FILE_NAME, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_defaults_match_original_deployment() {
    let config = TomlConfig::default();

    assert_eq!(config.port, 5000);
    assert_eq!(config.bind_address, "0.0.0.0");
    assert_eq!(config.lane_count, 3);
    assert_eq!(config.webdriver_url, "http://localhost:9515");
    assert_eq!(config.logging.level, "info");
    assert!(config.root_folder.is_none());
}

#[test]
fn test_partial_toml_fills_defaults() {
    let config = TomlConfig::from_toml_str(
        r#"
        port = 8080
        lane_count = 5

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    assert_eq!(config.port, 8080);
    assert_eq!(config.lane_count, 5);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.webdriver_url, "http://localhost:9515");
}

#[test]
fn test_zero_lanes_rejected() {
    let result = TomlConfig::from_toml_str("lane_count = 0");
    assert!(result.is_err());
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_toml_config(Some(&dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config.port, 5000);
}

#[test]
fn test_malformed_config_file_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lot.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    assert!(load_toml_config(Some(&path)).is_err());
}

#[test]
fn test_config_file_is_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lot.toml");
    std::fs::write(&path, "root_folder = \"/srv/pks\"\nwebdriver_url = \"http://grid:4444\"").unwrap();

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/pks")));
    assert_eq!(config.webdriver_url, "http://grid:4444");
}

#[test]
#[serial]
fn test_resolver_cli_arg_wins() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/pks-from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/pks-from-config")),
        ..TomlConfig::default()
    };

    let root = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/pks-from-cli")))
        .with_config(&config)
        .resolve();

    assert_eq!(root, PathBuf::from("/tmp/pks-from-cli"));
    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_env_beats_config() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/pks-from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/pks-from-config")),
        ..TomlConfig::default()
    };

    let root = RootFolderResolver::new("test-module").with_config(&config).resolve();

    assert_eq!(root, PathBuf::from("/tmp/pks-from-env"));
    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_config_then_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/pks-from-config")),
        ..TomlConfig::default()
    };

    let from_config = RootFolderResolver::new("test-module").with_config(&config).resolve();
    assert_eq!(from_config, PathBuf::from("/tmp/pks-from-config"));

    let fallback = RootFolderResolver::new("test-module").resolve();
    assert_eq!(fallback, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
fn test_initializer_creates_directory_idempotently() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("nested").join("pks");
    let initializer = RootFolderInitializer::new(root.clone());

    assert!(!initializer.database_exists());
    initializer.ensure_directory_exists().unwrap();
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(initializer.database_path(), root.join(DATABASE_FILE_NAME));
}
