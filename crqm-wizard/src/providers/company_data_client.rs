//! Structured company-data service client
//!
//! Looks a company up by web domain (`GET {base_url}/companies/find?domain=`)
//! with bearer authentication. Only candidates carrying a
//! [`FinancialHandle::Domain`] can be served.
//!
//! Response fields read:
//! - `name`
//! - `metrics.estimatedAnnualRevenue` (raw USD number, or range text such as `$1B-$10B`)
//! - `metrics.employees`
//! - `category.industry`, `category.sector`
//! - `geo.country`

use crate::providers::{http_client, status_error, Capabilities, LookupProvider};
use crate::types::{CompanyCandidate, FinancialHandle, ProfileField, ProviderError, ProviderResult, RawValue};
use async_trait::async_trait;
use crqm_common::config::{resolve_api_key, CompanyDataConfig, COMPANY_DATA_KEY_ENV_VAR};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const COMPANY_DATA_SOURCE: &str = "company_data";

/// JSON pointer for each profile field in a lookup response
const FIELD_POINTERS: &[(ProfileField, &str)] = &[
    (ProfileField::Name, "/name"),
    (ProfileField::Revenue, "/metrics/estimatedAnnualRevenue"),
    (ProfileField::Employees, "/metrics/employees"),
    (ProfileField::Industry, "/category/industry"),
    (ProfileField::Sector, "/category/sector"),
    (ProfileField::Region, "/geo/country"),
];

const USD_PER_BILLION: f64 = 1_000_000_000.0;

pub struct CompanyDataClient {
    client: Client,
    base_url: String,
    api_key: String,
    priority: u8,
}

impl CompanyDataClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        priority: u8,
        timeout: Duration,
    ) -> crqm_common::Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            priority,
        })
    }

    /// Build from config, failing with `MissingCredential` when no key is set
    pub fn from_config(config: &CompanyDataConfig, timeout: Duration) -> crqm_common::Result<Self> {
        let api_key = resolve_api_key(
            "Company data",
            &[COMPANY_DATA_KEY_ENV_VAR],
            config.api_key.as_deref(),
        )?;
        Self::new(&config.base_url, api_key, config.priority, timeout)
    }

    /// Map a lookup response body to a provider result
    pub fn parse_response(&self, body: &Value) -> ProviderResult {
        let mut result = ProviderResult::empty(COMPANY_DATA_SOURCE, self.priority);
        for (field, pointer) in FIELD_POINTERS {
            let Some(value) = body.pointer(pointer).and_then(RawValue::from_json) else {
                continue;
            };
            match (field, value) {
                // Numeric revenue is reported in USD
                (ProfileField::Revenue, RawValue::Number(usd)) => {
                    result.set(*field, RawValue::Number(usd / USD_PER_BILLION))
                }
                (_, value) => result.set(*field, value),
            }
        }
        result
    }
}

#[async_trait]
impl LookupProvider for CompanyDataClient {
    fn name(&self) -> &str {
        COMPANY_DATA_SOURCE
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            suggest: false,
            affiliates: false,
            profile: true,
        }
    }

    async fn try_fetch(&self, candidate: &CompanyCandidate) -> Result<ProviderResult, ProviderError> {
        let domain = match &candidate.handle {
            Some(FinancialHandle::Domain(domain)) => domain,
            Some(FinancialHandle::Ticker(ticker)) => {
                return Err(ProviderError::NotSupported(format!(
                    "lookup requires a domain, got ticker {}",
                    ticker
                )))
            }
            None => {
                return Err(ProviderError::NotSupported(format!(
                    "no handle for {}",
                    candidate.display_name
                )))
            }
        };

        let url = format!(
            "{}/companies/find?domain={}",
            self.base_url,
            urlencoding::encode(domain)
        );
        debug!("Querying company-data service: domain={}", domain);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        match response.status() {
            // Queued for async lookup or unknown: nothing yet
            StatusCode::ACCEPTED | StatusCode::NOT_FOUND => {
                return Ok(ProviderResult::empty(COMPANY_DATA_SOURCE, self.priority))
            }
            status if !status.is_success() => return Err(status_error(response).await),
            _ => {}
        }

        let body: Value = response.json().await?;
        Ok(self.parse_response(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> CompanyDataClient {
        CompanyDataClient::new("http://localhost", "key", 10, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_parse_response_maps_nested_fields() {
        let body = json!({
            "name": "American Express",
            "metrics": { "estimatedAnnualRevenue": "$10B+", "employees": 77000 },
            "category": { "industry": "Diversified Financial Services", "sector": "Financials" },
            "geo": { "country": "United States" }
        });

        let result = client().parse_response(&body);
        assert_eq!(result.get(ProfileField::Revenue), Some(&RawValue::from("$10B+")));
        assert_eq!(result.get(ProfileField::Employees), Some(&RawValue::Number(77000.0)));
        assert_eq!(result.get(ProfileField::Region), Some(&RawValue::from("United States")));
        assert_eq!(result.fields.len(), 6);
    }

    #[test]
    fn test_numeric_revenue_is_raw_usd() {
        let large = client().parse_response(&json!({ "metrics": { "estimatedAnnualRevenue": 57_200_000_000u64 } }));
        assert_eq!(large.get(ProfileField::Revenue), Some(&RawValue::Number(57.2)));

        let small = client().parse_response(&json!({ "metrics": { "estimatedAnnualRevenue": 750000 } }));
        assert_eq!(small.get(ProfileField::Revenue), Some(&RawValue::Number(0.00075)));
    }

    #[test]
    fn test_parse_response_skips_nulls_and_placeholders() {
        let body = json!({
            "name": "Acme",
            "metrics": { "estimatedAnnualRevenue": null, "employees": null },
            "category": { "industry": "Unknown" }
        });

        let result = client().parse_response(&body);
        assert_eq!(result.fields.len(), 1);
        assert!(result.get(ProfileField::Industry).is_none());
    }

    #[tokio::test]
    async fn test_ticker_handle_not_supported() {
        let candidate = CompanyCandidate::new("State Bank of India", "registry").with_handle(Some("SBIN.NS"));
        let err = client().try_fetch(&candidate).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotSupported(_)));
    }
}
