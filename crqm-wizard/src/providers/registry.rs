//! Known-company registry
//!
//! In-process table of companies the wizard recognizes without a network
//! call: a built-in seed plus `[[registry]]` entries from the config file.
//! It is the only source that can say with certainty that a group is not
//! independently listed, and which of its affiliates are.
//!
//! Matching, in order:
//! 1. Exact match of the query's match key against the name or any alias
//! 2. Best fuzzy match (normalized Levenshtein) at or above the threshold

use crate::normalizer;
use crate::providers::{Capabilities, LookupProvider};
use crate::types::{CompanyCandidate, CompanyQuery, ProfileField, ProviderError, ProviderResult};
use async_trait::async_trait;
use crqm_common::config::{AffiliateEntry, RegistryEntry};
use tracing::debug;

/// Registry provider identifier
pub const REGISTRY_SOURCE: &str = "registry";

const DEFAULT_PRIORITY: u8 = 0;
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

pub struct RegistryProvider {
    entries: Vec<RegistryEntry>,
    similarity_threshold: f64,
    priority: u8,
}

impl Default for RegistryProvider {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl RegistryProvider {
    /// Built-in entries plus configured ones. A configured entry replaces a
    /// built-in entry with the same match key.
    pub fn new(extra: &[RegistryEntry]) -> Self {
        let mut entries = builtin_entries();
        for entry in extra {
            let key = normalizer::match_key(&entry.name);
            entries.retain(|e| normalizer::match_key(&e.name) != key);
            entries.push(entry.clone());
        }

        Self {
            entries,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            priority: DEFAULT_PRIORITY,
        }
    }

    /// Registry with only the given entries (no built-in seed)
    pub fn with_entries(entries: Vec<RegistryEntry>) -> Self {
        Self {
            entries,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry a name refers to
    pub fn find(&self, name: &str) -> Option<&RegistryEntry> {
        let key = normalizer::match_key(name);
        if key.is_empty() {
            return None;
        }

        let exact = self.entries.iter().find(|entry| {
            std::iter::once(&entry.name)
                .chain(entry.aliases.iter())
                .any(|n| normalizer::match_key(n) == key)
        });
        if exact.is_some() {
            return exact;
        }

        let mut best: Option<(&RegistryEntry, f64)> = None;
        for entry in &self.entries {
            let score = std::iter::once(&entry.name)
                .chain(entry.aliases.iter())
                .map(|n| normalizer::similarity(n, name))
                .fold(0.0, f64::max);
            if score >= self.similarity_threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((entry, score));
            }
        }

        if let Some((entry, score)) = best {
            debug!("Registry fuzzy match '{}' -> '{}' ({:.2})", name, entry.name, score);
        }
        best.map(|(entry, _)| entry)
    }

    fn candidate(&self, entry: &RegistryEntry) -> CompanyCandidate {
        CompanyCandidate::new(&entry.name, REGISTRY_SOURCE).with_handle(entry.handle.as_deref())
    }

    fn affiliate_candidate(&self, parent: &str, affiliate: &AffiliateEntry) -> CompanyCandidate {
        CompanyCandidate::new(&affiliate.name, REGISTRY_SOURCE)
            .with_handle(affiliate.handle.as_deref())
            .with_parent(parent)
    }
}

#[async_trait]
impl LookupProvider for RegistryProvider {
    fn name(&self) -> &str {
        REGISTRY_SOURCE
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            suggest: true,
            affiliates: true,
            profile: true,
        }
    }

    async fn try_suggest(&self, query: &CompanyQuery) -> Result<Vec<CompanyCandidate>, ProviderError> {
        Ok(self
            .find(query.search_key())
            .map(|entry| vec![self.candidate(entry)])
            .unwrap_or_default())
    }

    async fn try_affiliates(
        &self,
        parent: &CompanyCandidate,
    ) -> Result<Vec<CompanyCandidate>, ProviderError> {
        Ok(self
            .find(&parent.display_name)
            .map(|entry| {
                entry
                    .affiliates
                    .iter()
                    .map(|a| self.affiliate_candidate(&parent.display_name, a))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn try_fetch(&self, candidate: &CompanyCandidate) -> Result<ProviderResult, ProviderError> {
        let mut result = ProviderResult::empty(REGISTRY_SOURCE, self.priority);

        let by_handle = candidate.handle.as_ref().and_then(|handle| {
            self.entries.iter().find(|e| {
                e.handle
                    .as_deref()
                    .is_some_and(|h| h.eq_ignore_ascii_case(handle.as_str()))
            })
        });

        if let Some(entry) = by_handle.or_else(|| self.find(&candidate.display_name)) {
            result.set(ProfileField::Name, entry.name.as_str());
            if let Some(industry) = &entry.industry {
                result.set(ProfileField::Industry, industry.as_str());
            }
            if let Some(sector) = &entry.sector {
                result.set(ProfileField::Sector, sector.as_str());
            }
            if let Some(region) = &entry.region {
                result.set(ProfileField::Region, region.as_str());
            }
        }

        Ok(result)
    }
}

fn entry(
    name: &str,
    aliases: &[&str],
    handle: &str,
    sector: Option<(&str, &str)>,
    region: &str,
    affiliates: &[(&str, &str)],
) -> RegistryEntry {
    RegistryEntry {
        name: name.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        handle: Some(handle.to_string()),
        affiliates: affiliates
            .iter()
            .map(|(name, handle)| AffiliateEntry {
                name: name.to_string(),
                handle: Some(handle.to_string()),
            })
            .collect(),
        industry: sector.map(|(industry, _)| industry.to_string()),
        sector: sector.map(|(_, sector)| sector.to_string()),
        region: Some(region.to_string()),
    }
}

/// Built-in seed entries
pub fn builtin_entries() -> Vec<RegistryEntry> {
    vec![
        entry(
            "State Bank of India",
            &["sbi", "state bank"],
            "SBIN.NS",
            Some(("Financial Services", "Banking")),
            "India",
            &[],
        ),
        entry(
            "Reliance Industries",
            &["reliance", "ril"],
            "RELIANCE.NS",
            Some(("Energy", "Oil & Gas")),
            "India",
            &[],
        ),
        entry(
            "Aditya Birla Group",
            &["aditya birla", "birla group", "abg"],
            crate::types::NOT_LISTED_SENTINEL,
            None,
            "India",
            &[
                ("UltraTech Cement", "ULTRACEMCO.NS"),
                ("Grasim Industries", "GRASIM.NS"),
                ("Hindalco Industries", "HINDALCO.NS"),
                ("Aditya Birla Capital", "ABCAPITAL.NS"),
            ],
        ),
        entry(
            "Tata Group",
            &["tata", "tata sons"],
            crate::types::NOT_LISTED_SENTINEL,
            None,
            "India",
            &[
                ("Tata Consultancy Services", "TCS.NS"),
                ("Tata Motors", "TATAMOTORS.NS"),
                ("Tata Steel", "TATASTEEL.NS"),
            ],
        ),
        entry(
            "American Express",
            &["amex", "axp"],
            "americanexpress.com",
            Some(("Financial Services", "Consumer Finance")),
            "United States",
            &[],
        ),
    ]
}
