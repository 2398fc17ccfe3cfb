//! Name-suggestion (autocomplete) service client
//!
//! Queries `GET {base_url}/companies/suggest?query=<search key>` and maps each
//! `{name, domain}` entry to a candidate whose handle is the domain. Requests
//! are rate limited client-side.

use crate::providers::{http_client, status_error, Capabilities, LookupProvider};
use crate::types::{CompanyCandidate, CompanyQuery, ProviderError};
use async_trait::async_trait;
use crqm_common::config::SuggestConfig;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

pub const SUGGEST_SOURCE: &str = "suggest";

#[derive(Debug, Deserialize)]
struct SuggestionEntry {
    name: Option<String>,
    domain: Option<String>,
}

pub struct SuggestClient {
    client: Client,
    base_url: String,
    priority: u8,
    rate_limiter: DefaultDirectRateLimiter,
}

impl SuggestClient {
    pub fn new(config: &SuggestConfig, timeout: Duration) -> crqm_common::Result<Self> {
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client: http_client(timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            priority: config.priority,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }
}

#[async_trait]
impl LookupProvider for SuggestClient {
    fn name(&self) -> &str {
        SUGGEST_SOURCE
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            suggest: true,
            affiliates: false,
            profile: false,
        }
    }

    async fn try_suggest(&self, query: &CompanyQuery) -> Result<Vec<CompanyCandidate>, ProviderError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        self.rate_limiter.until_ready().await;

        let url = format!(
            "{}/companies/suggest?query={}",
            self.base_url,
            urlencoding::encode(query.search_key())
        );
        debug!("Querying suggestion service: {}", query.search_key());

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let entries: Vec<SuggestionEntry> = response.json().await?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let name = entry.name.filter(|n| !n.trim().is_empty())?;
                Some(CompanyCandidate::new(name, SUGGEST_SOURCE).with_handle(entry.domain.as_deref()))
            })
            .collect())
    }
}
