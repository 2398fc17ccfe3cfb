//! HTML page scraper
//!
//! One parameterized provider covers every scraped source: the page URL comes
//! from a template and each profile field has its own extraction rule
//! (CSS selector, optional attribute, optional regex). Rules are compiled once
//! at construction so a bad selector or pattern fails fast.

use crate::providers::{http_client, status_error, Capabilities, LookupProvider};
use crate::types::{CompanyCandidate, ProfileField, ProviderError, ProviderResult};
use async_trait::async_trait;
use crqm_common::config::{ExtractionRule, ScraperConfig};
use crqm_common::Error;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

struct CompiledRule {
    field: ProfileField,
    selector: Selector,
    attribute: Option<String>,
    pattern: Option<Regex>,
}

impl CompiledRule {
    fn compile(scraper: &str, field: &str, rule: &ExtractionRule) -> crqm_common::Result<Self> {
        let field: ProfileField = field
            .parse()
            .map_err(|e| Error::Config(format!("scraper '{}': {}", scraper, e)))?;

        let selector = Selector::parse(&rule.selector).map_err(|e| {
            Error::Config(format!(
                "scraper '{}': invalid CSS selector '{}' for {}: {:?}",
                scraper, rule.selector, field, e
            ))
        })?;

        let pattern = rule
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| {
                Error::Config(format!("scraper '{}': invalid pattern for {}: {}", scraper, field, e))
            })?;

        Ok(Self {
            field,
            selector,
            attribute: rule.attribute.clone(),
            pattern,
        })
    }

    fn extract(&self, document: &Html) -> Option<String> {
        let element = document.select(&self.selector).next()?;

        let raw = match &self.attribute {
            Some(attr) => element.value().attr(attr)?.to_string(),
            None => element.text().collect::<Vec<_>>().join(" "),
        };
        let raw = raw.split_whitespace().collect::<Vec<_>>().join(" ");

        match &self.pattern {
            Some(pattern) => {
                let captures = pattern.captures(&raw)?;
                captures
                    .get(1)
                    .or_else(|| captures.get(0))
                    .map(|m| m.as_str().trim().to_string())
            }
            None => Some(raw),
        }
    }
}

pub struct PageScraper {
    name: String,
    url_template: String,
    priority: u8,
    rules: Vec<CompiledRule>,
    client: Client,
}

impl PageScraper {
    pub fn from_config(config: &ScraperConfig, timeout: Duration) -> crqm_common::Result<Self> {
        let rules = config
            .rules
            .iter()
            .map(|(field, rule)| CompiledRule::compile(&config.name, field, rule))
            .collect::<crqm_common::Result<Vec<_>>>()?;

        Ok(Self {
            name: config.name.clone(),
            url_template: config.url_template.clone(),
            priority: config.priority,
            rules,
            client: http_client(timeout)?,
        })
    }

    /// Page URL for a candidate, or `None` when the template needs a handle
    /// the candidate lacks
    pub fn page_url(&self, candidate: &CompanyCandidate) -> Option<String> {
        let mut url = self.url_template.clone();
        if url.contains("{handle}") {
            let handle = candidate.handle.as_ref()?;
            url = url.replace("{handle}", &urlencoding::encode(handle.as_str()));
        }
        if url.contains("{name}") {
            url = url.replace("{name}", &urlencoding::encode(&candidate.display_name));
        }
        Some(url)
    }

    /// Apply every rule to a page; fields whose rule finds nothing are omitted
    pub fn extract_fields(&self, html: &str) -> ProviderResult {
        let document = Html::parse_document(html);
        let mut result = ProviderResult::empty(&self.name, self.priority);

        for rule in &self.rules {
            match rule.extract(&document) {
                Some(value) => result.set(rule.field, value),
                None => debug!(scraper = %self.name, field = %rule.field, "No match on page"),
            }
        }

        result
    }
}

#[async_trait]
impl LookupProvider for PageScraper {
    fn name(&self) -> &str {
        &self.name
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
        let url = self.page_url(candidate).ok_or_else(|| {
            ProviderError::NotSupported(format!("{} has no handle to scrape", candidate.display_name))
        })?;
        debug!(scraper = %self.name, "Fetching {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body = response.text().await?;
        Ok(self.extract_fields(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const PAGE: &str = r#"
        <html><body>
          <h1 class="title">State Bank of India</h1>
          <table>
            <tr><td>Revenue</td><td id="revenue">Revenue: ₹ 4,500 Crore (FY24)</td></tr>
            <tr><td>Sector</td><td id="sector">  Banking  </td></tr>
          </table>
          <meta name="hq" content="Mumbai, India">
        </body></html>
    "#;

    fn rule(selector: &str, attribute: Option<&str>, pattern: Option<&str>) -> ExtractionRule {
        ExtractionRule {
            selector: selector.to_string(),
            attribute: attribute.map(String::from),
            pattern: pattern.map(String::from),
        }
    }

    fn scraper(rules: BTreeMap<String, ExtractionRule>) -> PageScraper {
        PageScraper::from_config(
            &ScraperConfig {
                name: "scraper".into(),
                url_template: "https://example.test/quote/{handle}".into(),
                priority: 30,
                rules,
            },
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_extract_text_attribute_and_pattern() {
        let mut rules = BTreeMap::new();
        rules.insert("sector".into(), rule("#sector", None, None));
        rules.insert("revenue".into(), rule("#revenue", None, Some(r"(?i)(₹\s*[0-9,.]+\s*crore)")));
        rules.insert("region".into(), rule("meta[name=hq]", Some("content"), Some(r",\s*(\w+)$")));
        rules.insert("employees".into(), rule("#employees", None, None));

        let result = scraper(rules).extract_fields(PAGE);
        assert_eq!(result.get(ProfileField::Sector).unwrap().to_string(), "Banking");
        assert_eq!(result.get(ProfileField::Revenue).unwrap().to_string(), "₹ 4,500 Crore");
        assert_eq!(result.get(ProfileField::Region).unwrap().to_string(), "India");
        assert!(result.get(ProfileField::Employees).is_none());
    }

    #[test]
    fn test_invalid_rules_fail_at_construction() {
        let mut rules = BTreeMap::new();
        rules.insert("sector".into(), rule("##", None, None));
        let config = ScraperConfig {
            name: "broken".into(),
            url_template: "https://example.test/{name}".into(),
            priority: 30,
            rules,
        };
        assert!(matches!(
            PageScraper::from_config(&config, Duration::from_secs(1)),
            Err(Error::Config(_))
        ));

        let mut rules = BTreeMap::new();
        rules.insert("ceo".into(), rule("h1", None, None));
        let config = ScraperConfig { rules, ..config };
        assert!(PageScraper::from_config(&config, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_page_url_requires_handle() {
        let s = scraper(BTreeMap::new());
        let listed = CompanyCandidate::new("SBI", "registry").with_handle(Some("SBIN.NS"));
        assert_eq!(
            s.page_url(&listed).as_deref(),
            Some("https://example.test/quote/SBIN.NS")
        );
        assert!(s.page_url(&CompanyCandidate::new("Acme", "input")).is_none());
    }
}
