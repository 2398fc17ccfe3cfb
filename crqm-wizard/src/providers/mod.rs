//! Lookup Providers - Independent Company Data Sources
//!
//! Every source implements [`LookupProvider`]. Five implementations:
//! registry (in-process), name suggestion service, structured company-data
//! service, HTML page scraper, chat-completion assistant.
//!
//! Providers implement the fallible `try_*` half of the trait. The pipeline
//! only calls the total half (`suggest_candidates`, `suggest_affiliates`,
//! `fetch_profile`), which absorbs every [`ProviderError`] into an empty
//! answer so that one source failing never aborts a resolution.

pub mod assistant_client;
pub mod company_data_client;
pub mod page_scraper;
pub mod registry;
pub mod suggest_client;

pub use assistant_client::AssistantClient;
pub use company_data_client::CompanyDataClient;
pub use page_scraper::PageScraper;
pub use registry::RegistryProvider;
pub use suggest_client::SuggestClient;

use crate::types::{CompanyCandidate, CompanyQuery, ProviderError, ProviderResult};
use async_trait::async_trait;
use crqm_common::config::TomlConfig;
use crqm_common::Error;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Shared handle to a provider
pub type SharedProvider = Arc<dyn LookupProvider>;

/// Which operations a provider can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub suggest: bool,
    pub affiliates: bool,
    pub profile: bool,
}

/// Uniform capability contract for company data sources
///
/// # Example
/// ```rust,ignore
/// struct FixedProvider;
///
/// #[async_trait::async_trait]
/// impl LookupProvider for FixedProvider {
///     fn name(&self) -> &str { "fixed" }
///     fn priority(&self) -> u8 { 50 }
///     fn capabilities(&self) -> Capabilities {
///         Capabilities { suggest: false, affiliates: false, profile: true }
///     }
///
///     async fn try_fetch(&self, _c: &CompanyCandidate) -> Result<ProviderResult, ProviderError> {
///         Ok(ProviderResult::empty("fixed", 50).with_field(ProfileField::Sector, "Banking"))
///     }
/// }
/// ```
#[async_trait]
pub trait LookupProvider: Send + Sync {
    /// Provider identifier recorded as provenance
    fn name(&self) -> &str;

    /// Trust rank, lower is more trusted
    fn priority(&self) -> u8;

    fn capabilities(&self) -> Capabilities;

    /// Candidate identities for a query
    async fn try_suggest(&self, _query: &CompanyQuery) -> Result<Vec<CompanyCandidate>, ProviderError> {
        Err(ProviderError::NotSupported(format!("{} does not suggest candidates", self.name())))
    }

    /// Listed subsidiaries or affiliates of an unlisted parent
    async fn try_affiliates(
        &self,
        _parent: &CompanyCandidate,
    ) -> Result<Vec<CompanyCandidate>, ProviderError> {
        Err(ProviderError::NotSupported(format!("{} does not list affiliates", self.name())))
    }

    /// Profile fields for a selected candidate
    async fn try_fetch(&self, _candidate: &CompanyCandidate) -> Result<ProviderResult, ProviderError> {
        Err(ProviderError::NotSupported(format!("{} does not fetch profiles", self.name())))
    }

    /// Total form of [`try_suggest`](Self::try_suggest): failures become an empty list
    async fn suggest_candidates(&self, query: &CompanyQuery) -> Vec<CompanyCandidate> {
        match self.try_suggest(query).await {
            Ok(candidates) => {
                debug!(provider = self.name(), count = candidates.len(), "Suggestions received");
                candidates
            }
            Err(e) => {
                warn!(provider = self.name(), error = %e, "Suggestion lookup failed (non-fatal)");
                Vec::new()
            }
        }
    }

    /// Total form of [`try_affiliates`](Self::try_affiliates)
    async fn suggest_affiliates(&self, parent: &CompanyCandidate) -> Vec<CompanyCandidate> {
        match self.try_affiliates(parent).await {
            Ok(affiliates) => affiliates,
            Err(e) => {
                warn!(provider = self.name(), error = %e, "Affiliate lookup failed (non-fatal)");
                Vec::new()
            }
        }
    }

    /// Total form of [`try_fetch`](Self::try_fetch): failures become an empty result
    async fn fetch_profile(&self, candidate: &CompanyCandidate) -> ProviderResult {
        match self.try_fetch(candidate).await {
            Ok(result) => {
                debug!(
                    provider = self.name(),
                    fields = result.fields.len(),
                    "Profile fields received"
                );
                result
            }
            Err(e) => {
                warn!(provider = self.name(), error = %e, "Profile fetch failed (non-fatal)");
                ProviderResult::empty(self.name(), self.priority())
            }
        }
    }
}

/// Await a total provider call under a deadline, substituting `fallback`
/// when the deadline passes
pub async fn within_deadline<T, F>(provider: &str, limit: Duration, fallback: T, call: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(value) => value,
        Err(_) => {
            warn!(
                provider = provider,
                error = %ProviderError::Timeout(limit),
                "Provider call abandoned (non-fatal)"
            );
            fallback
        }
    }
}

/// Sort providers by trust rank; ties keep registration order
pub fn by_priority(mut providers: Vec<SharedProvider>) -> Vec<SharedProvider> {
    providers.sort_by_key(|p| p.priority());
    providers
}

/// Build every configured provider
///
/// The registry is always present. A keyed provider without a key is
/// skipped with a warning; any other construction error (bad selector, bad
/// regex, unknown field name) is returned.
pub fn build_providers(config: &TomlConfig) -> crqm_common::Result<Vec<SharedProvider>> {
    let timeout = Duration::from_secs(config.pipeline.timeout_secs);
    let mut providers: Vec<SharedProvider> = vec![Arc::new(RegistryProvider::new(&config.registry))];

    if let Some(suggest) = &config.providers.suggest {
        providers.push(Arc::new(SuggestClient::new(suggest, timeout)?));
    }

    if let Some(company_data) = &config.providers.company_data {
        match CompanyDataClient::from_config(company_data, timeout) {
            Ok(client) => providers.push(Arc::new(client)),
            Err(e @ Error::MissingCredential { .. }) => warn!("Skipping company-data provider: {}", e),
            Err(e) => return Err(e),
        }
    }

    for scraper in &config.providers.scrapers {
        providers.push(Arc::new(PageScraper::from_config(scraper, timeout)?));
    }

    if let Some(assistant) = &config.providers.assistant {
        match AssistantClient::from_config(assistant, timeout) {
            Ok(client) => providers.push(Arc::new(client)),
            Err(e @ Error::MissingCredential { .. }) => warn!("Skipping assistant provider: {}", e),
            Err(e) => return Err(e),
        }
    }

    debug!(
        "Configured providers: {}",
        providers.iter().map(|p| p.name().to_string()).collect::<Vec<_>>().join(", ")
    );

    Ok(by_priority(providers))
}

/// Shared HTTP client builder for provider clients
pub(crate) fn http_client(timeout: Duration) -> crqm_common::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("crqm-wizard/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))
}

/// Map a non-2xx response into a [`ProviderError::Status`]
pub(crate) async fn status_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message: String = body.chars().take(200).collect();
    ProviderError::Status { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProfileField;

    struct FailingProvider;

    #[async_trait]
    impl LookupProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn priority(&self) -> u8 {
            5
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities {
                suggest: true,
                affiliates: false,
                profile: true,
            }
        }

        async fn try_suggest(&self, _q: &CompanyQuery) -> Result<Vec<CompanyCandidate>, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }

        async fn try_fetch(&self, _c: &CompanyCandidate) -> Result<ProviderResult, ProviderError> {
            Err(ProviderError::Malformed("not json".into()))
        }
    }

    #[tokio::test]
    async fn test_total_operations_absorb_errors() {
        let provider = FailingProvider;
        let query = CompanyQuery::new("acme");
        let candidate = CompanyCandidate::new("Acme", "test");

        assert!(provider.suggest_candidates(&query).await.is_empty());
        assert!(provider.suggest_affiliates(&candidate).await.is_empty());

        let result = provider.fetch_profile(&candidate).await;
        assert_eq!(result.provider, "failing");
        assert_eq!(result.priority, 5);
        assert!(result.get(ProfileField::Revenue).is_none());
    }

    #[tokio::test]
    async fn test_deadline_substitutes_fallback() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            vec![1, 2, 3]
        };
        let value = within_deadline("slow", Duration::from_millis(20), Vec::new(), slow).await;
        assert!(value.is_empty());
    }

    #[test]
    fn test_default_config_builds_registry_only() {
        let providers = build_providers(&TomlConfig::default()).unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].name(), "registry");
    }
}
