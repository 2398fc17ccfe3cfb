// Enricher - the fallback chain over profile-capable providers
//
// first-success: sequential, priority order, stop at the first result with a
//                parsable revenue or headcount; identity-only results met on
//                the way are kept for the merge
// merge-all:     concurrent, every provider, all usable results kept
//
// Never fails. A provider that errors or exceeds the deadline contributes
// nothing; cancellation discards everything gathered so far.

use crate::parsers::{employees_from_raw, revenue_from_raw};
use crate::providers::{by_priority, within_deadline, SharedProvider};
use crate::types::{CompanyCandidate, ProfileField, ProviderResult};
use crqm_common::config::EnrichmentStrategy;
use futures::future::join_all;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct Enricher {
    providers: Vec<SharedProvider>,
    strategy: EnrichmentStrategy,
    timeout: Duration,
    cancel: CancellationToken,
}

impl Enricher {
    /// Keeps only profile-capable providers, sorted by priority
    pub fn new(providers: Vec<SharedProvider>, strategy: EnrichmentStrategy, timeout: Duration) -> Self {
        let providers = by_priority(
            providers
                .into_iter()
                .filter(|p| p.capabilities().profile)
                .collect(),
        );

        Self {
            providers,
            strategy,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn strategy(&self) -> EnrichmentStrategy {
        self.strategy
    }

    /// Provider results for one candidate, sorted by (priority, provider name)
    pub async fn enrich(&self, candidate: &CompanyCandidate) -> Vec<ProviderResult> {
        let mut results = match self.strategy {
            EnrichmentStrategy::FirstSuccess => self.first_success(candidate).await,
            EnrichmentStrategy::MergeAll => self.merge_all(candidate).await,
        };

        results.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.provider.cmp(&b.provider))
        });

        info!(
            strategy = %self.strategy,
            candidate = %candidate.display_name,
            "Enrichment complete: {} usable results",
            results.len()
        );
        results
    }

    fn fetch<'a>(
        &'a self,
        provider: &'a SharedProvider,
        candidate: &'a CompanyCandidate,
    ) -> impl std::future::Future<Output = ProviderResult> + 'a {
        within_deadline(
            provider.name(),
            self.timeout,
            ProviderResult::empty(provider.name(), provider.priority()),
            provider.fetch_profile(candidate),
        )
    }

    async fn first_success(&self, candidate: &CompanyCandidate) -> Vec<ProviderResult> {
        let mut gathered = Vec::new();

        for provider in &self.providers {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Enrichment cancelled before {}", provider.name());
                    return Vec::new();
                }
                result = self.fetch(provider, candidate) => result,
            };

            if !result.is_usable() {
                debug!(provider = provider.name(), "No usable fields; trying next provider");
                continue;
            }

            let done = has_financials(&result);
            gathered.push(result);
            if done {
                return gathered;
            }
            debug!(provider = provider.name(), "Identity fields only; trying next provider");
        }

        gathered
    }

    async fn merge_all(&self, candidate: &CompanyCandidate) -> Vec<ProviderResult> {
        let calls = self.providers.iter().map(|p| self.fetch(p, candidate));

        tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("Enrichment cancelled; discarding in-flight results");
                Vec::new()
            }
            results = join_all(calls) => results.into_iter().filter(ProviderResult::is_usable).collect(),
        }
    }
}

/// Result carries a revenue or headcount the merger can use
fn has_financials(result: &ProviderResult) -> bool {
    result
        .get(ProfileField::Revenue)
        .is_some_and(|v| revenue_from_raw(v).is_ok())
        || result
            .get(ProfileField::Employees)
            .is_some_and(|v| employees_from_raw(v).is_ok())
}
