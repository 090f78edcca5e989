//! TOML config file loading

use std::io::Write;
use tempfile::NamedTempFile;
use wastewise_common::config::{load_toml_config, ConfigOverrides, ServiceConfig};

#[test]
fn test_missing_explicit_file_yields_defaults() {
    let missing = std::path::Path::new("/nonexistent/wastewise.toml");
    let config = load_toml_config(Some(missing)).unwrap();
    assert!(config.port.is_none());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_loads_file_values() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
host = "0.0.0.0"
port = 4000
upload_dir = "/srv/uploads"

[logging]
level = "debug"
"#
    )
    .unwrap();

    let toml = load_toml_config(Some(file.path())).unwrap();
    let config = ServiceConfig::resolve(ConfigOverrides::default(), toml).unwrap();

    assert_eq!(config.bind_address(), "0.0.0.0:4000");
    assert_eq!(config.upload_dir, std::path::PathBuf::from("/srv/uploads"));
    assert_eq!(config.log_level, "debug");
}

#[test]
fn test_malformed_file_is_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "port = \"not a number\"").unwrap();

    assert!(load_toml_config(Some(file.path())).is_err());
}
