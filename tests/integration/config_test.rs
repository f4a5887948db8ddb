//! Configuration loading from files and the environment

use assert_matches::assert_matches;
use fieldsync::shared::{AppConfig, ConfigError};
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_file_then_environment_precedence() {
    let file = write_config(
        r#"
        server_url = "https://file.example.com"
        database_path = "/var/lib/fieldsync/offline.db"
        sync_interval_secs = 120
        log_level = "debug"
        "#,
    );

    std::env::set_var("FIELDSYNC_LOG", "fieldsync=trace");
    let config = AppConfig::from_file(file.path());
    std::env::remove_var("FIELDSYNC_LOG");
    let config = config.unwrap();

    assert_eq!(config.server_url, "https://file.example.com");
    assert_eq!(config.database_path(), PathBuf::from("/var/lib/fieldsync/offline.db"));
    assert_eq!(config.sync_interval, Duration::from_secs(120));
    assert_eq!(config.log_level, "fieldsync=trace");
    assert_eq!(config.max_retries, 3);
}

#[test]
#[serial]
fn test_missing_file_is_an_io_error() {
    let result = AppConfig::from_file("/nonexistent/fieldsync.toml");
    assert_matches!(result, Err(ConfigError::Io { .. }));
}

#[test]
#[serial]
fn test_file_values_are_validated() {
    let file = write_config("server_url = \"dispatch.example.com\"");
    assert_matches!(AppConfig::from_file(file.path()), Err(ConfigError::InvalidUrl(_)));
}
