use std::fs;
use std::time::Duration;

use tempfile::TempDir;
use uibind::config::{Config, ConfigError, DispatcherConfig};

/// Test that Config::default() produces the documented values.
#[test]
fn test_config_default_values() {
    let config = Config::default();

    assert_eq!(config.dispatcher.poll_interval_ms, 16);
    assert_eq!(config.dispatcher.poll_interval(), Duration::from_millis(16));
    assert_eq!(config.dispatcher.max_callbacks_per_cycle, 256);
    assert_eq!(config.dispatcher.worker_name_prefix, "uibind-worker");

    assert_eq!(config.logging.filter, "info");

    assert_eq!(config.signin.latency_ms, 200);
    assert_eq!(config.signin.accepted_ids, vec!["admin".to_string()]);
}

#[test]
fn test_config_path_ends_with_expected() {
    let path = Config::config_path();
    assert!(path.ends_with("uibind/config.toml"));
}

#[test]
fn test_validation_passes_for_default() {
    assert!(Config::default().validate().is_ok());
}

/// Missing file means defaults, not an error.
#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
}

/// Test that a partial file keeps defaults for everything it omits.
#[test]
fn test_partial_file_merges_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[dispatcher]
max_callbacks_per_cycle = 8

[signin]
latency_ms = 5
accepted_ids = ["admin", "operator"]
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();

    assert_eq!(config.dispatcher.max_callbacks_per_cycle, 8);
    assert_eq!(config.dispatcher.poll_interval_ms, 16);
    assert_eq!(config.logging.filter, "info");
    assert_eq!(config.signin.latency(), Duration::from_millis(5));
    assert_eq!(config.signin.accepted_ids, vec!["admin", "operator"]);
}

#[test]
fn test_full_file_round_trips_through_toml() {
    let mut config = Config::default();
    config.logging.filter = "uibind=debug".to_string();
    config.dispatcher.worker_name_prefix = "bg".to_string();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[dispatcher\npoll_interval_ms = ").unwrap();

    match Config::load_from(&path).unwrap_err() {
        ConfigError::ParseError { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("Expected ParseError, got {other:?}"),
    }
}

#[test]
fn test_wrong_type_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[dispatcher]\npoll_interval_ms = \"fast\"\n").unwrap();

    assert!(matches!(
        Config::load_from(&path),
        Err(ConfigError::ParseError { .. })
    ));
}

#[test]
fn test_validation_fails_zero_poll_interval() {
    let config = Config {
        dispatcher: DispatcherConfig {
            poll_interval_ms: 0,
            ..DispatcherConfig::default()
        },
        ..Config::default()
    };

    match config.validate().unwrap_err() {
        ConfigError::ValidationError { message } => {
            assert!(message.contains("poll_interval_ms"));
        }
        _ => panic!("Expected ValidationError"),
    }
}

#[test]
fn test_validation_fails_zero_callback_budget() {
    let config = Config {
        dispatcher: DispatcherConfig {
            max_callbacks_per_cycle: 0,
            ..DispatcherConfig::default()
        },
        ..Config::default()
    };

    match config.validate().unwrap_err() {
        ConfigError::ValidationError { message } => {
            assert!(message.contains("max_callbacks_per_cycle"));
        }
        _ => panic!("Expected ValidationError"),
    }
}

/// Validation runs on load, so a bad file never produces a Config.
#[test]
fn test_load_rejects_blank_worker_prefix() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[dispatcher]\nworker_name_prefix = \"  \"\n").unwrap();

    match Config::load_from(&path).unwrap_err() {
        ConfigError::ValidationError { message } => {
            assert!(message.contains("worker_name_prefix"));
        }
        _ => panic!("Expected ValidationError"),
    }
}

#[test]
fn test_unreadable_path_is_read_error() {
    let dir = TempDir::new().unwrap();
    let err = Config::load_from(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ReadError { .. }));
}
