//! Integration tests for teflon-config
//!
//! These tests verify config parsing and merging with real files on disk.

use std::path::PathBuf;
use tempfile::tempdir;
use teflon_config::{Config, ConfigError};

/// Test config loading from a real config file
#[test]
fn test_load_config_from_file() {
    let temp = tempdir().unwrap();
    let teflon_dir = temp.path().join(".teflon");
    std::fs::create_dir_all(&teflon_dir).unwrap();

    let config_content = r#"
[preload]
library = "/usr/lib/teflon/libteflon_inception_layer.so"
marker = "libteflon"

[log]
level = "debug"
"#;
    std::fs::write(teflon_dir.join("config.toml"), config_content).unwrap();

    let config = Config::from_file(&teflon_dir.join("config.toml")).unwrap();

    assert_eq!(
        config.preload.library,
        Some(PathBuf::from(
            "/usr/lib/teflon/libteflon_inception_layer.so"
        ))
    );
    assert_eq!(config.preload.marker, "libteflon");
    assert_eq!(config.log.level, "debug");
}

/// Test that missing sections fall back to defaults
#[test]
fn test_partial_config_uses_defaults() {
    let config: Config = toml::from_str("[log]\nlevel = \"info\"\n").unwrap();

    assert_eq!(config.log.level, "info");
    assert_eq!(config.preload.marker, "teflon");
    assert!(config.preload.library.is_none());
}

/// Test config hierarchy: project config overrides global
#[test]
fn test_config_hierarchy_project_overrides_global() {
    let temp = tempdir().unwrap();
    let global = temp.path().join("global.toml");
    let project = temp.path().join("project.toml");
    std::fs::write(
        &global,
        r#"
[preload]
library = "/opt/global/libteflon_inception_layer.so"
marker = "global-marker"

[log]
level = "debug"
"#,
    )
    .unwrap();
    std::fs::write(
        &project,
        r#"
[preload]
library = "/opt/project/libteflon_inception_layer.so"

[log]
level = "warn"
"#,
    )
    .unwrap();

    let merged = Config::from_layers([
        Config::read_layer(&global).unwrap(),
        Config::read_layer(&project).unwrap(),
    ])
    .unwrap();

    assert_eq!(
        merged.preload.library,
        Some(PathBuf::from("/opt/project/libteflon_inception_layer.so"))
    );
    // Project did not mention the marker, so the global value survives
    assert_eq!(merged.preload.marker, "global-marker");
    // Project spelled out the default level, which still overrides
    assert_eq!(merged.log.level, "warn");
}

#[test]
fn test_invalid_layer_is_reported() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[preload\nmarker = ").unwrap();

    assert!(matches!(Config::read_layer(&path), Err(ConfigError::Toml(_))));
}

#[test]
fn test_invalid_toml_is_reported() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[preload\nmarker = ").unwrap();

    assert!(matches!(Config::from_file(&path), Err(ConfigError::Toml(_))));
}

#[test]
fn test_missing_file_is_io_error() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("absent.toml");

    assert!(matches!(Config::from_file(&path), Err(ConfigError::Io(_))));
}
