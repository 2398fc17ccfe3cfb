//! Resolution Pipeline
//!
//! Ties the stages together for one company:
//! raw text → [`CompanyQuery`] → [`Disambiguator`] → selected candidate
//! → [`Enricher`] → [`merge_profile`] → [`CompanyProfile`]
//!
//! Selection between the two halves is left to the caller (interactive
//! prompt or pick-first policy). Nothing here fails: every path ends in a
//! profile, degraded to defaults where providers had nothing.
//!
//! # Example
//! ```rust,ignore
//! let resolver = Resolver::from_config(&config)?;
//! let candidates = resolver.suggest("sbi").await;
//! let profile = resolver.build_profile(candidates.first()).await;
//! ```

use crate::fusion::{merge_profile, Disambiguation, Disambiguator, Enricher, MergeDefaults};
use crate::providers::{build_providers, by_priority, SharedProvider};
use crate::types::{CompanyCandidate, CompanyProfile, CompanyQuery};
use crqm_common::config::{EnrichmentStrategy, TomlConfig};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

pub struct Resolver {
    providers: Vec<SharedProvider>,
    strategy: EnrichmentStrategy,
    timeout: Duration,
    defaults: MergeDefaults,
    cancel: CancellationToken,
}

impl Resolver {
    pub fn new(
        providers: Vec<SharedProvider>,
        strategy: EnrichmentStrategy,
        timeout: Duration,
        defaults: MergeDefaults,
    ) -> Self {
        Self {
            providers: by_priority(providers),
            strategy,
            timeout,
            defaults,
            cancel: CancellationToken::new(),
        }
    }

    /// Build every configured provider and the pipeline around them
    pub fn from_config(config: &TomlConfig) -> crqm_common::Result<Self> {
        Ok(Self::new(
            build_providers(config)?,
            config.pipeline.strategy,
            Duration::from_secs(config.pipeline.timeout_secs),
            MergeDefaults::from(&config.defaults),
        ))
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that abandons resolutions in progress when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn strategy(&self) -> EnrichmentStrategy {
        self.strategy
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Candidate identities for free text. Never empty.
    pub async fn suggest(&self, raw: &str) -> Disambiguation {
        let query = CompanyQuery::new(raw);
        let span = info_span!("suggest", request_id = %Uuid::new_v4(), query = %query.search_key());

        async {
            let disambiguation = Disambiguator::new(self.providers.clone(), self.timeout)
                .with_cancellation(self.cancel.clone())
                .disambiguate(&query)
                .await;
            info!(
                "{} candidate(s) ({:?})",
                disambiguation.len(),
                disambiguation.outcome()
            );
            disambiguation
        }
        .instrument(span)
        .await
    }

    /// Enrich and merge a selected candidate
    pub async fn build_profile(&self, candidate: &CompanyCandidate) -> CompanyProfile {
        let span = info_span!(
            "build_profile",
            request_id = %Uuid::new_v4(),
            candidate = %candidate.display_name
        );

        async {
            let results = Enricher::new(self.providers.clone(), self.strategy, self.timeout)
                .with_cancellation(self.cancel.clone())
                .enrich(candidate)
                .await;
            let profile = merge_profile(candidate, &results, &self.defaults);
            info!(
                completeness = profile.completeness(),
                conflicts = profile.conflicts().len(),
                "Profile built for {}",
                profile.name()
            );
            profile
        }
        .instrument(span)
        .await
    }

    /// Non-interactive resolution: suggest, pick the first candidate, build
    pub async fn resolve_first(&self, raw: &str) -> (Disambiguation, CompanyProfile) {
        let disambiguation = self.suggest(raw).await;
        let profile = self.build_profile(disambiguation.first()).await;
        (disambiguation, profile)
    }
}
