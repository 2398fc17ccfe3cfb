//! Tests for configuration loading and credential resolution
//!
//! Covers:
//! - Missing config files degrade to compiled defaults
//! - Config path priority (CLI → ENV → platform default)
//! - TOML schema parsing for every provider section
//! - API key priority (ENV → TOML) and fail-fast on missing keys
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.

use crqm_common::config::{
    load_config, resolve_api_key, resolve_config_path, EnrichmentStrategy, SelectionPolicy,
    TomlConfig, CONFIG_ENV_VAR,
};
use crqm_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const FULL_CONFIG: &str = r#"
[logging]
level = "debug"

[pipeline]
strategy = "merge-all"
timeout_secs = 3
selection = "pick-first"

[defaults]
employees = 2500
industry = "Unclassified"

[providers.suggest]
base_url = "http://localhost:9000/v1"

[providers.company_data]
api_key = "toml-key"
priority = 5

[[providers.scrapers]]
name = "exchange-page"
url_template = "https://exchange.example/quote/{handle}"

[providers.scrapers.rules.revenue]
selector = "td.revenue"
pattern = "([0-9.,]+\\s*(?:Crore|Billion))"

[providers.scrapers.rules.sector]
selector = "meta[name=sector]"
attribute = "content"

[[registry]]
name = "Tata Group"
aliases = ["tata"]
handle = "NOT_LISTED"
affiliates = [
    { name = "Tata Consultancy Services", handle = "TCS.NS" },
    { name = "Tata Motors", handle = "TATAMOTORS.NS" },
]

[classification]
levels = ["L1", "L2", "L3"]
"#;

fn write_temp_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_config_parses() {
    let file = write_temp_config(FULL_CONFIG);
    let config = TomlConfig::load(file.path()).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.pipeline.strategy, EnrichmentStrategy::MergeAll);
    assert_eq!(config.pipeline.timeout_secs, 3);
    assert_eq!(config.pipeline.selection, SelectionPolicy::PickFirst);

    // Unspecified defaults keep their compiled values
    assert_eq!(config.defaults.employees, 2500);
    assert_eq!(config.defaults.revenue_usd_billions, 1.0);
    assert_eq!(config.defaults.industry, "Unclassified");
    assert_eq!(config.defaults.sector, "Unknown");

    let suggest = config.providers.suggest.as_ref().unwrap();
    assert_eq!(suggest.base_url, "http://localhost:9000/v1");
    assert_eq!(suggest.priority, 20);

    let company_data = config.providers.company_data.as_ref().unwrap();
    assert_eq!(company_data.api_key.as_deref(), Some("toml-key"));
    assert_eq!(company_data.priority, 5);

    assert_eq!(config.providers.scrapers.len(), 1);
    let scraper = &config.providers.scrapers[0];
    assert_eq!(scraper.priority, 30);
    assert_eq!(scraper.rules.len(), 2);
    assert_eq!(
        scraper.rules["sector"].attribute.as_deref(),
        Some("content")
    );

    assert!(config.providers.assistant.is_none());

    assert_eq!(config.registry.len(), 1);
    assert_eq!(config.registry[0].handle.as_deref(), Some("NOT_LISTED"));
    assert_eq!(config.registry[0].affiliates.len(), 2);

    assert_eq!(config.classification.levels, vec!["L1", "L2", "L3"]);
}

#[test]
fn test_invalid_level_count_rejected() {
    let file = write_temp_config(
        r#"
[classification]
levels = ["1", "2", "3", "4", "5", "6", "7", "8"]
"#,
    );
    let result = TomlConfig::load(file.path());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_malformed_toml_is_an_error() {
    let file = write_temp_config("[pipeline\nstrategy = ");
    assert!(matches!(TomlConfig::load(file.path()), Err(Error::Toml(_))));
}

#[test]
#[serial]
fn test_missing_explicit_file_uses_defaults() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let config = load_config(Some(&missing)).unwrap();
    assert_eq!(config.pipeline.timeout_secs, 10);
    assert_eq!(config.pipeline.strategy, EnrichmentStrategy::FirstSuccess);
}

#[test]
#[serial]
fn test_cli_path_beats_env_path() {
    let cli_file = write_temp_config("[pipeline]\ntimeout_secs = 4\n");
    let env_file = write_temp_config("[pipeline]\ntimeout_secs = 7\n");
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let resolved = resolve_config_path(Some(cli_file.path())).unwrap();
    assert_eq!(resolved, cli_file.path());

    let from_env = resolve_config_path(None).unwrap();
    assert_eq!(from_env, env_file.path());
    assert_eq!(load_config(None).unwrap().pipeline.timeout_secs, 7);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_api_key_env_beats_toml() {
    env::set_var("CRQM_TEST_KEY_A", "env-key");
    let key = resolve_api_key("TestProvider", &["CRQM_TEST_KEY_A"], Some("toml-key")).unwrap();
    assert_eq!(key, "env-key");
    env::remove_var("CRQM_TEST_KEY_A");
}

#[test]
#[serial]
fn test_api_key_falls_back_through_env_list_then_toml() {
    env::remove_var("CRQM_TEST_KEY_B1");
    env::set_var("CRQM_TEST_KEY_B2", "second-env-key");
    let key = resolve_api_key(
        "TestProvider",
        &["CRQM_TEST_KEY_B1", "CRQM_TEST_KEY_B2"],
        Some("toml-key"),
    )
    .unwrap();
    assert_eq!(key, "second-env-key");
    env::remove_var("CRQM_TEST_KEY_B2");

    let key = resolve_api_key("TestProvider", &["CRQM_TEST_KEY_B1"], Some(" toml-key ")).unwrap();
    assert_eq!(key, "toml-key");
}

#[test]
#[serial]
fn test_missing_api_key_fails_fast() {
    env::remove_var("CRQM_TEST_KEY_C");
    let result = resolve_api_key("TestProvider", &["CRQM_TEST_KEY_C"], Some("   "));
    match result {
        Err(Error::MissingCredential { provider, env_var }) => {
            assert_eq!(provider, "TestProvider");
            assert_eq!(env_var, "CRQM_TEST_KEY_C");
        }
        other => panic!("expected MissingCredential, got {:?}", other),
    }
}
