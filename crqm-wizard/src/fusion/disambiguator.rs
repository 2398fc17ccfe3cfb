// Disambiguator - free text to an ordered, never-empty candidate list
//
// 1. Ask suggestion-capable providers in priority order; the first one that
//    yields any candidate wins
// 2. Nothing from anyone: synthesize one degraded candidate from the input
// 3. Top candidate flagged NOT_LISTED: replace the list with its listed
//    affiliates, each carrying a back-reference to the parent name

use crate::providers::{within_deadline, SharedProvider};
use crate::types::{CompanyCandidate, CompanyQuery};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How the candidate list was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisambiguationOutcome {
    /// Suggestions from a provider
    Resolved { provider: String },
    /// Listed affiliates of an unlisted parent
    Affiliates { parent: String, provider: String },
    /// No provider answered; single candidate built from the input
    Degraded,
}

/// Ordered candidates for one query. Never empty.
#[derive(Debug, Clone)]
pub struct Disambiguation {
    candidates: Vec<CompanyCandidate>,
    outcome: DisambiguationOutcome,
}

impl Disambiguation {
    fn degraded(query: &CompanyQuery) -> Self {
        Self {
            candidates: vec![CompanyCandidate::degraded(query)],
            outcome: DisambiguationOutcome::Degraded,
        }
    }

    pub fn candidates(&self) -> &[CompanyCandidate] {
        &self.candidates
    }

    pub fn outcome(&self) -> &DisambiguationOutcome {
        &self.outcome
    }

    /// Candidate chosen by the pick-first policy
    pub fn first(&self) -> &CompanyCandidate {
        &self.candidates[0]
    }

    pub fn select(&self, index: usize) -> Option<&CompanyCandidate> {
        self.candidates.get(index)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Never true once built
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn into_candidates(self) -> Vec<CompanyCandidate> {
        self.candidates
    }
}

pub struct Disambiguator {
    providers: Vec<SharedProvider>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl Disambiguator {
    /// `providers` must already be in priority order
    pub fn new(providers: Vec<SharedProvider>, timeout: Duration) -> Self {
        Self {
            providers,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn disambiguate(&self, query: &CompanyQuery) -> Disambiguation {
        let Some((provider, candidates)) = self.first_suggestions(query).await else {
            info!("No provider recognized '{}'; using input as-is", query.search_key());
            return Disambiguation::degraded(query);
        };

        let top = &candidates[0];
        if top.not_listed {
            let parent = top.display_name.clone();
            match self.affiliates_of(top).await {
                Some((affiliate_provider, affiliates)) => {
                    info!(
                        "'{}' is not independently listed; offering {} listed affiliates",
                        parent,
                        affiliates.len()
                    );
                    return Disambiguation {
                        candidates: affiliates,
                        outcome: DisambiguationOutcome::Affiliates {
                            parent,
                            provider: affiliate_provider,
                        },
                    };
                }
                None => debug!("'{}' is not listed and has no known affiliates", parent),
            }
        }

        Disambiguation {
            candidates,
            outcome: DisambiguationOutcome::Resolved { provider },
        }
    }

    async fn first_suggestions(&self, query: &CompanyQuery) -> Option<(String, Vec<CompanyCandidate>)> {
        if query.is_empty() {
            return None;
        }

        for provider in self.providers.iter().filter(|p| p.capabilities().suggest) {
            let call = within_deadline(
                provider.name(),
                self.timeout,
                Vec::new(),
                provider.suggest_candidates(query),
            );
            let candidates = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                candidates = call => dedup(candidates),
            };

            if !candidates.is_empty() {
                debug!(provider = provider.name(), count = candidates.len(), "Candidates found");
                return Some((provider.name().to_string(), candidates));
            }
        }

        None
    }

    async fn affiliates_of(&self, parent: &CompanyCandidate) -> Option<(String, Vec<CompanyCandidate>)> {
        for provider in self.providers.iter().filter(|p| p.capabilities().affiliates) {
            let call = within_deadline(
                provider.name(),
                self.timeout,
                Vec::new(),
                provider.suggest_affiliates(parent),
            );
            let affiliates = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                affiliates = call => affiliates,
            };

            let affiliates: Vec<_> = affiliates
                .into_iter()
                .map(|a| {
                    if a.parent.is_some() {
                        a
                    } else {
                        a.with_parent(&parent.display_name)
                    }
                })
                .collect();
            let affiliates = dedup(affiliates);

            if !affiliates.is_empty() {
                return Some((provider.name().to_string(), affiliates));
            }
        }

        None
    }
}

/// Drop later duplicates (same handle, or same normalized name), keeping order
pub fn dedup(candidates: Vec<CompanyCandidate>) -> Vec<CompanyCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| !c.display_name.is_empty() && seen.insert(c.dedup_key()))
        .collect()
}
