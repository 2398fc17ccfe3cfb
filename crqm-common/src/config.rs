//! Configuration loading and credential resolution
//!
//! Bootstrap configuration comes from a single TOML file. Its location is
//! resolved in this order:
//! 1. Command-line argument (highest priority)
//! 2. `CRQM_CONFIG` environment variable
//! 3. `<user config dir>/crqm/config.toml`
//!
//! A missing file is not an error: the compiled defaults are used and a
//! warning is logged. A file that exists but does not parse is an error.
//!
//! API keys are never stored in code. Each keyed provider resolves its key
//! from the environment first and the TOML file second.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CRQM_CONFIG";

/// Environment variable holding the structured company-data API key
pub const COMPANY_DATA_KEY_ENV_VAR: &str = "CRQM_COMPANY_DATA_API_KEY";

/// Environment variables holding the assistant API key, in priority order
pub const ASSISTANT_KEY_ENV_VARS: &[&str] = &["CRQM_ASSISTANT_API_KEY", "OPENAI_API_KEY"];

/// Bounds on the number of sensitivity levels
pub const MIN_SENSITIVITY_LEVELS: usize = 3;
pub const MAX_SENSITIVITY_LEVELS: usize = 7;

// ============================================================================
// Pipeline policies
// ============================================================================

/// How the enrichment orchestrator consults profile providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnrichmentStrategy {
    /// Query in priority order, stop at the first result carrying revenue or
    /// headcount; identity-only results on the way are merged in
    #[default]
    FirstSuccess,
    /// Query every provider and merge all results
    MergeAll,
}

impl fmt::Display for EnrichmentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichmentStrategy::FirstSuccess => write!(f, "first-success"),
            EnrichmentStrategy::MergeAll => write!(f, "merge-all"),
        }
    }
}

impl FromStr for EnrichmentStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "first-success" | "first_success" => Ok(EnrichmentStrategy::FirstSuccess),
            "merge-all" | "merge_all" => Ok(EnrichmentStrategy::MergeAll),
            other => Err(Error::Config(format!(
                "Unknown enrichment strategy '{}' (expected first-success or merge-all)",
                other
            ))),
        }
    }
}

/// How one candidate is chosen when disambiguation yields several
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Ask the user
    #[default]
    Prompt,
    /// Non-interactive: take the first candidate
    PickFirst,
}

impl FromStr for SelectionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "prompt" => Ok(SelectionPolicy::Prompt),
            "pick-first" | "pick_first" => Ok(SelectionPolicy::PickFirst),
            other => Err(Error::Config(format!(
                "Unknown selection policy '{}' (expected prompt or pick-first)",
                other
            ))),
        }
    }
}

// ============================================================================
// TOML schema
// ============================================================================

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Resolution pipeline behavior
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Safe defaults substituted for fields no provider supplies
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// External lookup providers
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Additional known-company entries merged into the built-in registry
    #[serde(default)]
    pub registry: Vec<RegistryEntry>,

    /// Asset classification settings
    #[serde(default)]
    pub classification: ClassificationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub strategy: EnrichmentStrategy,

    /// Per-provider call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub selection: SelectionPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: EnrichmentStrategy::default(),
            timeout_secs: default_timeout_secs(),
            selection: SelectionPolicy::default(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

/// Hardcoded safe defaults used by the profile merger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_revenue")]
    pub revenue_usd_billions: f64,
    #[serde(default = "default_employees")]
    pub employees: u64,
    #[serde(default = "unknown")]
    pub industry: String,
    #[serde(default = "unknown")]
    pub sector: String,
    #[serde(default = "unknown")]
    pub region: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            revenue_usd_billions: default_revenue(),
            employees: default_employees(),
            industry: unknown(),
            sector: unknown(),
            region: unknown(),
        }
    }
}

fn default_revenue() -> f64 {
    1.0
}

fn default_employees() -> u64 {
    10_000
}

fn unknown() -> String {
    "Unknown".to_string()
}

/// External provider configuration. Absent sections disable the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub suggest: Option<SuggestConfig>,
    #[serde(default)]
    pub company_data: Option<CompanyDataConfig>,
    #[serde(default)]
    pub scrapers: Vec<ScraperConfig>,
    #[serde(default)]
    pub assistant: Option<AssistantConfig>,
}

/// Name-suggestion (autocomplete) service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestConfig {
    #[serde(default = "default_suggest_url")]
    pub base_url: String,
    #[serde(default = "default_suggest_priority")]
    pub priority: u8,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            base_url: default_suggest_url(),
            priority: default_suggest_priority(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

fn default_suggest_url() -> String {
    "https://autocomplete.clearbit.com/v1".to_string()
}

fn default_suggest_priority() -> u8 {
    20
}

fn default_requests_per_second() -> u32 {
    5
}

/// Structured financial-data service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyDataConfig {
    #[serde(default = "default_company_data_url")]
    pub base_url: String,
    /// Fallback when `CRQM_COMPANY_DATA_API_KEY` is unset
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_company_data_priority")]
    pub priority: u8,
}

impl Default for CompanyDataConfig {
    fn default() -> Self {
        Self {
            base_url: default_company_data_url(),
            api_key: None,
            priority: default_company_data_priority(),
        }
    }
}

fn default_company_data_url() -> String {
    "https://company.clearbit.com/v2".to_string()
}

fn default_company_data_priority() -> u8 {
    10
}

/// One HTML page scraper. `url_template` may contain `{handle}` and `{name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub name: String,
    pub url_template: String,
    #[serde(default = "default_scraper_priority")]
    pub priority: u8,
    /// Profile field name -> extraction rule
    #[serde(default)]
    pub rules: BTreeMap<String, ExtractionRule>,
}

fn default_scraper_priority() -> u8 {
    30
}

/// How one field is pulled out of a scraped page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRule {
    /// CSS selector; the first matching element is used
    pub selector: String,
    /// Read this attribute instead of the element text
    #[serde(default)]
    pub attribute: Option<String>,
    /// Optional regex; capture group 1 (or the whole match) becomes the value
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Chat-completion assistant prompted for structured facts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_url")]
    pub base_url: String,
    #[serde(default = "default_assistant_model")]
    pub model: String,
    /// Fallback when no assistant key is set in the environment
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_assistant_priority")]
    pub priority: u8,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: default_assistant_url(),
            model: default_assistant_model(),
            api_key: None,
            priority: default_assistant_priority(),
        }
    }
}

fn default_assistant_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_assistant_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_assistant_priority() -> u8 {
    40
}

/// Known-company registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Ticker or domain; the literal `NOT_LISTED` marks an unlisted group
    #[serde(default)]
    pub handle: Option<String>,
    /// Listed subsidiaries or affiliates of an unlisted group
    #[serde(default)]
    pub affiliates: Vec<AffiliateEntry>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateEntry {
    pub name: String,
    #[serde(default)]
    pub handle: Option<String>,
}

/// Asset classification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Ordered sensitivity level names, least sensitive first
    #[serde(default = "default_levels")]
    pub levels: Vec<String>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            levels: default_levels(),
        }
    }
}

fn default_levels() -> Vec<String> {
    ["Public", "Internal", "Confidential", "Restricted", "Highly Restricted"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ============================================================================
// Loading
// ============================================================================

impl TomlConfig {
    /// Read and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TomlConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the pipeline misbehave
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.timeout_secs == 0 {
            return Err(Error::Config("pipeline.timeout_secs must be at least 1".to_string()));
        }

        let levels = self.classification.levels.len();
        if !(MIN_SENSITIVITY_LEVELS..=MAX_SENSITIVITY_LEVELS).contains(&levels) {
            return Err(Error::Config(format!(
                "classification.levels must have {} to {} entries, found {}",
                MIN_SENSITIVITY_LEVELS, MAX_SENSITIVITY_LEVELS, levels
            )));
        }

        if self.defaults.employees == 0 {
            return Err(Error::Config("defaults.employees must be at least 1".to_string()));
        }
        if !self.defaults.revenue_usd_billions.is_finite() || self.defaults.revenue_usd_billions < 0.0 {
            return Err(Error::Config(
                "defaults.revenue_usd_billions must be a non-negative number".to_string(),
            ));
        }

        for scraper in &self.providers.scrapers {
            if scraper.name.trim().is_empty() {
                return Err(Error::Config("scraper name must not be empty".to_string()));
            }
            if !scraper.url_template.contains("{handle}") && !scraper.url_template.contains("{name}") {
                warn!(
                    scraper = %scraper.name,
                    "Scraper URL template has no {{handle}} or {{name}} placeholder; every company maps to the same page"
                );
            }
        }

        Ok(())
    }
}

/// Resolve which config file to read, if any
///
/// Returns `None` when no explicit path was given and the default location
/// holds no file.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path().filter(|p| p.exists())
}

/// `<user config dir>/crqm/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("crqm").join("config.toml"))
}

/// Load configuration with graceful degradation
///
/// A missing file yields compiled defaults. An explicitly named file that
/// does not exist is reported as a warning, not an error.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            TomlConfig::load(&path)
        }
        Some(path) => {
            warn!(
                "Config file {} not found; using compiled defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            debug!("No config file found; using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Load a `.env` file from the working directory if one exists
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Resolve a provider API key
///
/// **Priority:** environment variables (in the given order) → TOML value.
/// Fails with [`Error::MissingCredential`] so that a provider cannot be
/// constructed without its key.
pub fn resolve_api_key(
    provider: &str,
    env_vars: &[&str],
    toml_value: Option<&str>,
) -> Result<String> {
    let env_key = env_vars.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .filter(|k| is_valid_key(k))
            .map(|k| (*name, k))
    });
    let toml_key = toml_value.filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "{} API key found in both environment and TOML. Using environment (higher priority).",
            provider
        );
    }

    if let Some((name, key)) = env_key {
        info!("{} API key loaded from environment variable {}", provider, name);
        return Ok(key.trim().to_string());
    }

    if let Some(key) = toml_key {
        info!("{} API key loaded from TOML config", provider);
        return Ok(key.trim().to_string());
    }

    Err(Error::MissingCredential {
        provider: provider.to_string(),
        env_var: env_vars.first().copied().unwrap_or("<unset>").to_string(),
    })
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
