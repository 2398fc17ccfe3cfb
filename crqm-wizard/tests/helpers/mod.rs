//! Test Helper Utilities
//!
//! Shared utilities for testing crqm-wizard: scripted in-process providers
//! and mock HTTP servers for the network-backed ones.

#![allow(dead_code)]

pub mod mock_servers;

use async_trait::async_trait;
use crqm_wizard::providers::{Capabilities, LookupProvider, SharedProvider};
use crqm_wizard::types::{CompanyCandidate, CompanyQuery, ProfileField, ProviderError, ProviderResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Provider with scripted answers and an optional artificial delay
pub struct ScriptedProvider {
    name: String,
    priority: u8,
    capabilities: Capabilities,
    suggestions: Vec<CompanyCandidate>,
    affiliates: Vec<CompanyCandidate>,
    fields: Vec<(ProfileField, String)>,
    delay: Option<Duration>,
    fail: bool,
    pub fetch_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(name: &str, priority: u8) -> Self {
        Self {
            name: name.to_string(),
            priority,
            capabilities: Capabilities {
                suggest: false,
                affiliates: false,
                profile: true,
            },
            suggestions: Vec::new(),
            affiliates: Vec::new(),
            fields: Vec::new(),
            delay: None,
            fail: false,
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn suggesting(mut self, candidates: Vec<CompanyCandidate>) -> Self {
        self.capabilities.suggest = true;
        self.suggestions = candidates;
        self
    }

    pub fn with_affiliates(mut self, affiliates: Vec<CompanyCandidate>) -> Self {
        self.capabilities.affiliates = true;
        self.affiliates = affiliates;
        self
    }

    pub fn field(mut self, field: ProfileField, value: &str) -> Self {
        self.fields.push((field, value.to_string()));
        self
    }

    pub fn no_profile(mut self) -> Self {
        self.capabilities.profile = false;
        self
    }

    /// Every call sleeps this long first
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every call fails with a network error
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn shared(self) -> SharedProvider {
        Arc::new(self)
    }

    async fn pause(&self) -> Result<(), ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ProviderError::Network("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LookupProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn try_suggest(&self, _query: &CompanyQuery) -> Result<Vec<CompanyCandidate>, ProviderError> {
        self.pause().await?;
        Ok(self.suggestions.clone())
    }

    async fn try_affiliates(&self, _parent: &CompanyCandidate) -> Result<Vec<CompanyCandidate>, ProviderError> {
        self.pause().await?;
        Ok(self.affiliates.clone())
    }

    async fn try_fetch(&self, _candidate: &CompanyCandidate) -> Result<ProviderResult, ProviderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await?;
        let mut result = ProviderResult::empty(&self.name, self.priority);
        for (field, value) in &self.fields {
            result.set(*field, value.as_str());
        }
        Ok(result)
    }
}

/// Shared handle that still allows reading the call counter
pub fn counted(provider: ScriptedProvider) -> (Arc<ScriptedProvider>, SharedProvider) {
    let provider = Arc::new(provider);
    let shared: SharedProvider = provider.clone();
    (provider, shared)
}
