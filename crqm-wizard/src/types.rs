//! Core Types for the company resolution pipeline
//!
//! Data flows through these types in one direction:
//! - [`CompanyQuery`]: raw user text plus its normalized forms
//! - [`CompanyCandidate`]: a disambiguated identity, prior to enrichment
//! - [`ProviderResult`]: one provider's raw answer for one candidate
//! - [`CompanyProfile`]: the reconciled profile with per-field provenance

use crate::normalizer;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Sentinel a provider returns in place of a handle for an entity that is
/// known not to be independently listed
pub const NOT_LISTED_SENTINEL: &str = "NOT_LISTED";

/// Source name recorded for candidates synthesized from raw input
pub const INPUT_SOURCE: &str = "input";

// ============================================================================
// Query
// ============================================================================

/// Raw user text plus its normalized forms. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyQuery {
    raw: String,
    search_key: String,
    display_fallback: String,
}

impl CompanyQuery {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            search_key: normalizer::search_key(&raw),
            display_fallback: normalizer::display_name(&raw),
            raw,
        }
    }

    /// Text exactly as the user typed it
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Trimmed, lowercased key used for provider lookups
    pub fn search_key(&self) -> &str {
        &self.search_key
    }

    /// Title-cased name shown when nothing richer resolves
    pub fn display_fallback(&self) -> &str {
        &self.display_fallback
    }

    pub fn is_empty(&self) -> bool {
        self.search_key.is_empty()
    }
}

// ============================================================================
// Candidate
// ============================================================================

/// Canonical financial-data handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FinancialHandle {
    /// Market ticker, e.g. `SBIN.NS`
    Ticker(String),
    /// Company web domain, e.g. `americanexpress.com`
    Domain(String),
}

impl FinancialHandle {
    /// Classify a provider-supplied handle string
    ///
    /// Lowercase dotted names with an alphabetic TLD are domains; everything
    /// else is a ticker. Returns `None` for empty text.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let looks_like_domain = text.contains('.')
            && text
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
            && text
                .rsplit('.')
                .next()
                .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()));

        if looks_like_domain {
            Some(FinancialHandle::Domain(text.to_string()))
        } else {
            Some(FinancialHandle::Ticker(text.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FinancialHandle::Ticker(s) | FinancialHandle::Domain(s) => s,
        }
    }
}

impl fmt::Display for FinancialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A possible company identity produced by disambiguation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyCandidate {
    pub display_name: String,
    pub handle: Option<FinancialHandle>,
    /// Provider flagged this entity as not independently listed
    pub not_listed: bool,
    /// Name of the unlisted parent this candidate was found under.
    /// A back-reference only: the parent is not owned or resolved.
    pub parent: Option<String>,
    /// Provider that suggested the candidate
    pub source: String,
}

impl CompanyCandidate {
    pub fn new(display_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into().trim().to_string(),
            handle: None,
            not_listed: false,
            parent: None,
            source: source.into(),
        }
    }

    /// Attach a handle. The [`NOT_LISTED_SENTINEL`] marks the candidate as
    /// unlisted instead of becoming a handle.
    pub fn with_handle(mut self, handle: Option<&str>) -> Self {
        match handle.map(str::trim) {
            Some(h) if h.eq_ignore_ascii_case(NOT_LISTED_SENTINEL) => {
                self.not_listed = true;
                self.handle = None;
            }
            Some(h) => self.handle = FinancialHandle::parse(h),
            None => {}
        }
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Fallback identity built from the raw input when no provider answers
    pub fn degraded(query: &CompanyQuery) -> Self {
        Self::new(query.display_fallback(), INPUT_SOURCE)
    }

    pub fn is_degraded(&self) -> bool {
        self.source == INPUT_SOURCE
    }

    /// Key used to detect the same company suggested twice
    pub fn dedup_key(&self) -> String {
        match &self.handle {
            Some(handle) => handle.as_str().to_lowercase(),
            None => normalizer::match_key(&self.display_name),
        }
    }
}

// ============================================================================
// Provider results
// ============================================================================

/// Canonical profile fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Name,
    Region,
    Industry,
    Sector,
    Revenue,
    Employees,
}

impl ProfileField {
    pub const ALL: [ProfileField; 6] = [
        ProfileField::Name,
        ProfileField::Region,
        ProfileField::Industry,
        ProfileField::Sector,
        ProfileField::Revenue,
        ProfileField::Employees,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::Name => "name",
            ProfileField::Region => "region",
            ProfileField::Industry => "industry",
            ProfileField::Sector => "sector",
            ProfileField::Revenue => "revenue",
            ProfileField::Employees => "employees",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ProfileField::Revenue | ProfileField::Employees)
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(ProfileField::Name),
            "region" | "country" => Ok(ProfileField::Region),
            "industry" => Ok(ProfileField::Industry),
            "sector" => Ok(ProfileField::Sector),
            "revenue" => Ok(ProfileField::Revenue),
            "employees" => Ok(ProfileField::Employees),
            other => Err(format!("unknown profile field '{}'", other)),
        }
    }
}

/// Placeholder strings providers use instead of leaving a field out
const PLACEHOLDERS: &[&str] = &["unknown", "n/a", "na", "none", "null", "-", "--", "not available"];

/// A raw provider value, before unit normalization
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Text(String),
    Number(f64),
}

impl RawValue {
    /// Empty values never take part in a merge
    pub fn is_empty(&self) -> bool {
        match self {
            RawValue::Text(s) => {
                let t = s.trim();
                t.is_empty() || PLACEHOLDERS.contains(&t.to_lowercase().as_str())
            }
            RawValue::Number(n) => !n.is_finite(),
        }
    }

    /// Build from a JSON scalar; objects, arrays and nulls yield `None`
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(RawValue::Text(s.clone())),
            serde_json::Value::Number(n) => n.as_f64().map(RawValue::Number),
            _ => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(s) => f.write_str(s.trim()),
            RawValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

/// One provider's raw answer for one candidate
///
/// Ephemeral: produced per call and consumed by the merger.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResult {
    pub provider: String,
    /// Trust rank, lower is more trusted
    pub priority: u8,
    pub fields: BTreeMap<ProfileField, RawValue>,
}

impl ProviderResult {
    pub fn empty(provider: impl Into<String>, priority: u8) -> Self {
        Self {
            provider: provider.into(),
            priority,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style insert; empty values are dropped
    pub fn with_field(mut self, field: ProfileField, value: impl Into<RawValue>) -> Self {
        self.set(field, value);
        self
    }

    /// Insert a value unless it is empty
    pub fn set(&mut self, field: ProfileField, value: impl Into<RawValue>) {
        let value = value.into();
        if !value.is_empty() {
            self.fields.insert(field, value);
        }
    }

    /// Non-empty value for a field
    pub fn get(&self, field: ProfileField) -> Option<&RawValue> {
        self.fields.get(&field).filter(|v| !v.is_empty())
    }

    /// At least one non-empty field
    pub fn is_usable(&self) -> bool {
        self.fields.values().any(|v| !v.is_empty())
    }
}

// ============================================================================
// Profile
// ============================================================================

/// Where a profile field's final value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    Provider(String),
    Default,
    UserOverride,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Provider(name) => f.write_str(name),
            Provenance::Default => f.write_str("default"),
            Provenance::UserOverride => f.write_str("user override"),
        }
    }
}

impl Serialize for Provenance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Two providers disagreed on a field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictReport {
    pub field: ProfileField,
    pub source1: String,
    pub value1: String,
    pub source2: String,
    pub value2: String,
    pub similarity: Option<f64>,
}

/// Reconciled company profile
///
/// Built by the profile merger; afterwards mutable only through
/// [`crate::draft::ProfileDraft`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyProfile {
    pub(crate) name: String,
    pub(crate) region: String,
    pub(crate) industry: String,
    pub(crate) sector: String,
    pub(crate) revenue_usd_billions: f64,
    pub(crate) employees: u64,
    pub(crate) handle: Option<FinancialHandle>,
    pub(crate) parent: Option<String>,
    pub(crate) provenance: BTreeMap<ProfileField, Provenance>,
    pub(crate) conflicts: Vec<ConflictReport>,
    /// Share of fields supplied by a provider rather than a default (0.0-1.0)
    pub(crate) completeness: f64,
}

impl CompanyProfile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn industry(&self) -> &str {
        &self.industry
    }

    pub fn sector(&self) -> &str {
        &self.sector
    }

    pub fn revenue_usd_billions(&self) -> f64 {
        self.revenue_usd_billions
    }

    pub fn employees(&self) -> u64 {
        self.employees
    }

    pub fn handle(&self) -> Option<&FinancialHandle> {
        self.handle.as_ref()
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn provenance(&self, field: ProfileField) -> &Provenance {
        self.provenance.get(&field).unwrap_or(&Provenance::Default)
    }

    pub fn conflicts(&self) -> &[ConflictReport] {
        &self.conflicts
    }

    pub fn completeness(&self) -> f64 {
        self.completeness
    }

    /// Display form of a field's value
    pub fn display_value(&self, field: ProfileField) -> String {
        match field {
            ProfileField::Name => self.name.clone(),
            ProfileField::Region => self.region.clone(),
            ProfileField::Industry => self.industry.clone(),
            ProfileField::Sector => self.sector.clone(),
            ProfileField::Revenue => format!("{}", self.revenue_usd_billions),
            ProfileField::Employees => self.employees.to_string(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failure inside a provider call
///
/// Never escapes a provider's total operations: the pipeline sees an empty
/// result instead.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Call exceeded its deadline
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx response
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Response did not have the expected shape
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Provider cannot serve this request (missing handle, wrong handle kind)
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else if let Some(status) = e.status() {
            ProviderError::Status {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_listed_sentinel_is_not_a_handle() {
        let candidate = CompanyCandidate::new("Aditya Birla Group", "registry")
            .with_handle(Some("NOT_LISTED"));
        assert!(candidate.not_listed);
        assert!(candidate.handle.is_none());
    }

    #[test]
    fn test_handle_classification() {
        assert_eq!(
            FinancialHandle::parse("americanexpress.com"),
            Some(FinancialHandle::Domain("americanexpress.com".into()))
        );
        assert_eq!(
            FinancialHandle::parse("SBIN.NS"),
            Some(FinancialHandle::Ticker("SBIN.NS".into()))
        );
        assert_eq!(
            FinancialHandle::parse("AXP"),
            Some(FinancialHandle::Ticker("AXP".into()))
        );
        assert_eq!(FinancialHandle::parse("  "), None);
    }

    #[test]
    fn test_placeholder_values_are_empty() {
        assert!(RawValue::from("Unknown").is_empty());
        assert!(RawValue::from("  n/a ").is_empty());
        assert!(RawValue::from("").is_empty());
        assert!(RawValue::Number(f64::NAN).is_empty());
        assert!(!RawValue::from("Banking").is_empty());
        assert!(!RawValue::Number(0.0).is_empty());
    }

    #[test]
    fn test_provider_result_drops_empty_values() {
        let result = ProviderResult::empty("scraper", 30)
            .with_field(ProfileField::Sector, "Banking")
            .with_field(ProfileField::Industry, "Unknown");
        assert_eq!(result.fields.len(), 1);
        assert!(result.is_usable());
        assert!(result.get(ProfileField::Industry).is_none());
        assert!(!ProviderResult::empty("x", 0).is_usable());
    }

    #[test]
    fn test_provenance_serializes_as_text() {
        let json = serde_json::to_string(&Provenance::UserOverride).unwrap();
        assert_eq!(json, "\"user override\"");
        let json = serde_json::to_string(&Provenance::Provider("scraper".into())).unwrap();
        assert_eq!(json, "\"scraper\"");
    }

    #[test]
    fn test_query_normalization() {
        let query = CompanyQuery::new("  aditya   BIRLA ");
        assert_eq!(query.search_key(), "aditya birla");
        assert_eq!(query.display_fallback(), "Aditya Birla");
        assert_eq!(query.raw(), "  aditya   BIRLA ");
    }
}
