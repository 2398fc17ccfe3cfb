//! Provider construction from a config file
//!
//! Keyed providers without a key are skipped; bad scraper rules are errors.
//! Uses serial_test because keys resolve from the environment.

use crqm_common::config::{load_config, ASSISTANT_KEY_ENV_VARS, COMPANY_DATA_KEY_ENV_VAR};
use crqm_common::Error;
use crqm_wizard::providers::build_providers;
use crqm_wizard::Resolver;
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

const PROVIDERS_CONFIG: &str = r#"
[pipeline]
timeout_secs = 2

[providers.suggest]
base_url = "http://127.0.0.1:1/v1"

[providers.company_data]
base_url = "http://127.0.0.1:1/v2"

[providers.assistant]
base_url = "http://127.0.0.1:1/v1"

[[providers.scrapers]]
name = "quote_page"
url_template = "http://127.0.0.1:1/quote/{handle}"

[providers.scrapers.rules.sector]
selector = "td.sector"
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn clear_keys() {
    env::remove_var(COMPANY_DATA_KEY_ENV_VAR);
    for var in ASSISTANT_KEY_ENV_VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_keyless_providers_are_skipped() {
    clear_keys();
    let file = write_config(PROVIDERS_CONFIG);
    let config = load_config(Some(file.path())).unwrap();

    let names: Vec<String> = build_providers(&config)
        .unwrap()
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert_eq!(names, vec!["registry", "suggest", "quote_page"]);
}

#[test]
#[serial]
fn test_keys_from_environment_enable_providers() {
    clear_keys();
    env::set_var(COMPANY_DATA_KEY_ENV_VAR, "env-company-key");
    env::set_var("OPENAI_API_KEY", "env-assistant-key");

    let file = write_config(PROVIDERS_CONFIG);
    let config = load_config(Some(file.path())).unwrap();
    let resolver = Resolver::from_config(&config).unwrap();

    assert_eq!(
        resolver.provider_names(),
        vec!["registry", "company_data", "suggest", "quote_page", "assistant"]
    );
    clear_keys();
}

#[test]
#[serial]
fn test_bad_scraper_rule_is_a_config_error() {
    clear_keys();
    let file = write_config(
        r#"
[[providers.scrapers]]
name = "broken"
url_template = "http://127.0.0.1:1/{name}"

[providers.scrapers.rules.headcount]
selector = "td"
"#,
    );
    let config = load_config(Some(file.path())).unwrap();

    assert!(matches!(build_providers(&config), Err(Error::Config(_))));
}
