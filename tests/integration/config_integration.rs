//! Integration tests for configuration loading and validation

use folio::config::ConfigLoader;
use folio::error::ApiError;
use tempfile::TempDir;

#[test]
fn test_run_settings_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("folio.toml");
    std::fs::write(
        &config_file,
        r#"
[orchestrator]
strict = true

[orchestrator.limiter]
initial = 2
hard_min = 1
hard_max = 3

[orchestrator.quality]
min_score = 80.0
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    assert!(config.orchestrator.ensure_valid().is_ok());
    assert!(config.orchestrator.strict);
    assert_eq!(config.orchestrator.limiter.hard_max, 3);
    assert_eq!(config.orchestrator.quality.min_score, 80.0);
    // untouched sections keep their defaults
    assert_eq!(config.orchestrator.writing.max_attempts, 3);
}

#[test]
fn test_every_violation_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("folio.toml");
    std::fs::write(
        &config_file,
        r#"
[orchestrator.writing]
max_attempts = 0

[orchestrator.quality]
min_section_words = 900
max_section_words = 100
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    let errors = config.orchestrator.validate().unwrap_err();
    assert_eq!(errors.len(), 2);

    match config.orchestrator.ensure_valid() {
        Err(ApiError::ConfigError(message)) => {
            assert!(message.contains("max_attempts"));
            assert!(message.contains("min_section_words"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_missing_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    assert!(ConfigLoader::load_from_file(&temp_dir.path().join("absent.toml")).is_err());
}
