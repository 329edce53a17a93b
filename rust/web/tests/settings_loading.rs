use gemstone_web::settings::CONFIG_ENV;
use gemstone_web::{AppContext, AppSettings, LogFormat, SettingsError};
use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const OVERRIDES: &[&str] = &[
    "GEMSTONE_HOST",
    "GEMSTONE_PORT",
    "GEMSTONE_STORAGE_TIMEOUT_MS",
    "GEMSTONE_HUB_INTAKE_CAPACITY",
    "GEMSTONE_OUTBOUND_QUEUE_CAPACITY",
    "GEMSTONE_KEEP_ALIVE_SECS",
    "GEMSTONE_LOG_FORMAT",
    "GEMSTONE_CATALOG_PATH",
    "GEMSTONE_SEED",
];

/// Clears every settings variable on creation and again on drop.
struct CleanEnv;

impl CleanEnv {
    fn new() -> Self {
        Self::clear();
        CleanEnv
    }

    fn clear() {
        std::env::remove_var(CONFIG_ENV);
        for name in OVERRIDES {
            std::env::remove_var(name);
        }
    }
}

impl Drop for CleanEnv {
    fn drop(&mut self) {
        Self::clear();
    }
}

fn settings_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write settings");
    file
}

#[test]
#[serial]
fn defaults_apply_without_file_or_env() {
    let _env = CleanEnv::new();
    let settings = AppSettings::load().expect("load");
    assert_eq!(settings, AppSettings::default());
    assert_eq!(settings.storage_timeout(), Duration::from_millis(2000));
}

#[test]
#[serial]
fn file_then_env_layers_override_defaults() {
    let _env = CleanEnv::new();
    let file = settings_file(
        r#"
port = 9000
storage_timeout_ms = 750
log_format = "json"
seed = 11
"#,
    );
    std::env::set_var(CONFIG_ENV, file.path());
    std::env::set_var("GEMSTONE_PORT", "9500");
    std::env::set_var("GEMSTONE_OUTBOUND_QUEUE_CAPACITY", "32");

    let settings = AppSettings::load().expect("load");
    assert_eq!(settings.port, 9500);
    assert_eq!(settings.storage_timeout_ms, 750);
    assert_eq!(settings.outbound_queue_capacity, 32);
    assert_eq!(settings.log_format, LogFormat::Json);
    assert_eq!(settings.seed, Some(11));
    assert_eq!(settings.host, "127.0.0.1");
}

#[test]
#[serial]
fn missing_file_is_an_io_error() {
    let _env = CleanEnv::new();
    std::env::set_var(CONFIG_ENV, "/definitely/not/here/gemstone.toml");

    let err = AppSettings::load().unwrap_err();
    assert!(matches!(err, SettingsError::Io { .. }), "{err}");
}

#[test]
#[serial]
fn malformed_file_is_a_parse_error() {
    let _env = CleanEnv::new();
    let file = settings_file("port = \"eighty\"\n");
    std::env::set_var(CONFIG_ENV, file.path());

    let err = AppSettings::load().unwrap_err();
    assert!(matches!(err, SettingsError::Parse(_)), "{err}");
}

#[test]
#[serial]
fn invalid_values_are_rejected_after_layering() {
    let _env = CleanEnv::new();
    std::env::set_var("GEMSTONE_STORAGE_TIMEOUT_MS", "0");
    let err = AppSettings::load().unwrap_err();
    assert!(err.to_string().contains("storage_timeout_ms"));

    std::env::set_var("GEMSTONE_STORAGE_TIMEOUT_MS", "100");
    std::env::set_var("GEMSTONE_LOG_FORMAT", "xml");
    let err = AppSettings::load().unwrap_err();
    assert!(matches!(err, SettingsError::InvalidValue(_)));
}

#[tokio::test]
#[serial]
async fn bad_catalog_path_fails_context_construction() {
    let _env = CleanEnv::new();
    let settings = AppSettings {
        catalog_path: Some("/definitely/not/here/cards.json".into()),
        ..AppSettings::default()
    };

    assert!(AppContext::new(&settings).is_err());
}
