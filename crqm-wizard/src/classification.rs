//! Asset classification
//!
//! Each named asset pool (PII records, IP documents, OT devices, ...) is split
//! across an ordered set of sensitivity levels by percentage. Per-level counts
//! are rounded independently, so they may not add back up to the pool total
//! exactly. Percentages that do not sum to 100 produce a [`ValidationWarning`];
//! they are never rejected.

use crqm_common::config::{ClassificationConfig, MAX_SENSITIVITY_LEVELS, MIN_SENSITIVITY_LEVELS};
use crqm_common::{Error, Result};
use serde::Serialize;
use std::fmt;

const PERCENT_TOLERANCE: f64 = 1e-6;

/// Ordered sensitivity level names, least sensitive first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SensitivityLevels(Vec<String>);

impl SensitivityLevels {
    pub fn new(names: Vec<String>) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(|n| n.trim().to_string()).collect();

        if !(MIN_SENSITIVITY_LEVELS..=MAX_SENSITIVITY_LEVELS).contains(&names.len()) {
            return Err(Error::InvalidInput(format!(
                "need {} to {} sensitivity levels, got {}",
                MIN_SENSITIVITY_LEVELS,
                MAX_SENSITIVITY_LEVELS,
                names.len()
            )));
        }
        if names.iter().any(|n| n.is_empty()) {
            return Err(Error::InvalidInput("sensitivity level names must not be empty".into()));
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].iter().any(|n| n.eq_ignore_ascii_case(name)) {
                return Err(Error::InvalidInput(format!("duplicate sensitivity level '{}'", name)));
            }
        }

        Ok(Self(names))
    }

    pub fn from_config(config: &ClassificationConfig) -> Result<Self> {
        Self::new(config.levels.clone())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SensitivityLevels {
    fn default() -> Self {
        Self(ClassificationConfig::default().levels)
    }
}

/// Level name → percentage share, in level order
pub type Distribution = Vec<(String, f64)>;

/// Per-level counts: `round(percent / 100 * total) * scale`, rounded per level
pub fn calc_distribution(total: f64, dist: &[(String, f64)], scale: f64) -> Distribution {
    dist.iter()
        .map(|(level, percent)| (level.clone(), (percent / 100.0 * total).round() * scale))
        .collect()
}

/// Whether the percentages add up to 100
pub fn classification_sums_to_100(dist: &[(String, f64)]) -> bool {
    (percent_total(dist) - 100.0).abs() < PERCENT_TOLERANCE
}

fn percent_total(dist: &[(String, f64)]) -> f64 {
    dist.iter().map(|(_, p)| p).sum()
}

/// Non-blocking advisory: a pool's percentages do not sum to 100
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationWarning {
    pub asset: String,
    pub total_percent: f64,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} percentages sum to {}%, not 100%",
            self.asset, self.total_percent
        )
    }
}

/// One asset pool split across sensitivity levels
#[derive(Debug, Clone, PartialEq)]
pub struct AssetClassification {
    asset: String,
    total: u64,
    distribution: Distribution,
}

impl AssetClassification {
    /// `percents` are given in level order, one per level
    pub fn new(
        asset: impl Into<String>,
        total: u64,
        levels: &SensitivityLevels,
        percents: &[f64],
    ) -> Result<Self> {
        let asset = asset.into().trim().to_string();
        if asset.is_empty() {
            return Err(Error::InvalidInput("asset name must not be empty".into()));
        }
        if percents.len() != levels.len() {
            return Err(Error::InvalidInput(format!(
                "{}: expected {} percentages (one per level), got {}",
                asset,
                levels.len(),
                percents.len()
            )));
        }
        if let Some(bad) = percents.iter().find(|p| !p.is_finite() || **p < 0.0 || **p > 100.0) {
            return Err(Error::InvalidInput(format!(
                "{}: percentage {} is outside 0-100",
                asset, bad
            )));
        }

        Ok(Self {
            asset,
            total,
            distribution: levels
                .names()
                .iter()
                .cloned()
                .zip(percents.iter().copied())
                .collect(),
        })
    }

    /// Parse `NAME=TOTAL:P1,P2,...`
    pub fn parse(text: &str, levels: &SensitivityLevels) -> Result<Self> {
        let invalid = || Error::InvalidInput(format!("expected NAME=TOTAL:P1,P2,..., got '{}'", text));

        let (asset, rest) = text.split_once('=').ok_or_else(invalid)?;
        let (total, percents) = rest.split_once(':').ok_or_else(invalid)?;

        let total = crate::parsers::parse_employee_count(total)
            .map_err(|e| Error::InvalidInput(format!("{}: bad total: {}", asset.trim(), e)))?;
        let percents = percents
            .split(',')
            .map(|p| p.trim().trim_end_matches('%').parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::InvalidInput(format!("{}: bad percentage: {}", asset.trim(), e)))?;

        Self::new(asset, total, levels, &percents)
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn distribution(&self) -> &[(String, f64)] {
        &self.distribution
    }

    pub fn sums_to_100(&self) -> bool {
        classification_sums_to_100(&self.distribution)
    }

    pub fn warning(&self) -> Option<ValidationWarning> {
        (!self.sums_to_100()).then(|| ValidationWarning {
            asset: self.asset.clone(),
            total_percent: percent_total(&self.distribution),
        })
    }

    /// Serializable view with derived per-level counts
    pub fn report(&self, scale: f64) -> AssetReport {
        let counts = calc_distribution(self.total as f64, &self.distribution, scale);
        AssetReport {
            asset: self.asset.clone(),
            total: self.total,
            levels: self
                .distribution
                .iter()
                .zip(counts)
                .map(|((level, percent), (_, count))| LevelAllocation {
                    level: level.clone(),
                    percent: *percent,
                    count,
                })
                .collect(),
            sums_to_100: self.sums_to_100(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelAllocation {
    pub level: String,
    pub percent: f64,
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetReport {
    pub asset: String,
    pub total: u64,
    pub levels: Vec<LevelAllocation>,
    pub sums_to_100: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(pairs: &[(&str, f64)]) -> Distribution {
        pairs.iter().map(|(l, p)| (l.to_string(), *p)).collect()
    }

    fn three_levels() -> SensitivityLevels {
        SensitivityLevels::new(vec!["Low".into(), "Medium".into(), "High".into()]).unwrap()
    }

    #[test]
    fn test_calc_distribution_single_level() {
        let counts = calc_distribution(1_000_000.0, &dist(&[("L1", 100.0)]), 1.0);
        assert_eq!(counts, dist(&[("L1", 1_000_000.0)]));
    }

    #[test]
    fn test_calc_distribution_thirds() {
        let counts = calc_distribution(100.0, &dist(&[("L1", 33.0), ("L2", 33.0), ("L3", 34.0)]), 1.0);
        assert_eq!(counts, dist(&[("L1", 33.0), ("L2", 33.0), ("L3", 34.0)]));
        assert_eq!(counts.iter().map(|(_, c)| c).sum::<f64>(), 100.0);
    }

    #[test]
    fn test_rounding_drift_is_not_corrected() {
        // 3 x round(33.33...) = 99
        let third = 100.0 / 3.0;
        let counts = calc_distribution(100.0, &dist(&[("a", third), ("b", third), ("c", third)]), 1.0);
        assert_eq!(counts.iter().map(|(_, c)| c).sum::<f64>(), 99.0);
    }

    #[test]
    fn test_scale_multiplies_counts() {
        let counts = calc_distribution(10.0, &dist(&[("a", 50.0), ("b", 50.0)]), 1000.0);
        assert_eq!(counts, dist(&[("a", 5000.0), ("b", 5000.0)]));
    }

    #[test]
    fn test_sums_to_100() {
        assert!(classification_sums_to_100(&dist(&[("a", 60.0), ("b", 40.0)])));
        assert!(!classification_sums_to_100(&dist(&[("a", 60.0), ("b", 30.0)])));
        assert!(!classification_sums_to_100(&[]));
    }

    #[test]
    fn test_level_bounds() {
        assert!(SensitivityLevels::new(vec!["a".into(), "b".into()]).is_err());
        assert!(SensitivityLevels::new((0..8).map(|i| i.to_string()).collect()).is_err());
        assert!(SensitivityLevels::new(vec!["a".into(), "A".into(), "b".into()]).is_err());
        assert_eq!(SensitivityLevels::default().len(), 5);
    }

    #[test]
    fn test_warning_does_not_block() {
        let pool = AssetClassification::new("PII", 1000, &three_levels(), &[50.0, 30.0, 10.0]).unwrap();
        let warning = pool.warning().unwrap();
        assert_eq!(warning.total_percent, 90.0);
        assert_eq!(warning.to_string(), "PII percentages sum to 90%, not 100%");

        let report = pool.report(1.0);
        assert!(!report.sums_to_100);
        assert_eq!(report.levels[0].count, 500.0);
        assert_eq!(report.levels[2].level, "High");
    }

    #[test]
    fn test_parse_asset_argument() {
        let pool = AssetClassification::parse("PII=1,000,000:70,20,10", &three_levels()).unwrap();
        assert_eq!(pool.asset(), "PII");
        assert_eq!(pool.total(), 1_000_000);
        assert!(pool.sums_to_100());
        assert!(pool.warning().is_none());

        assert!(AssetClassification::parse("PII:70,20,10", &three_levels()).is_err());
        assert!(AssetClassification::parse("PII=10:70,30", &three_levels()).is_err());
        assert!(AssetClassification::parse("PII=10:70,x,10", &three_levels()).is_err());
        assert!(AssetClassification::parse("PII=10:170,0,0", &three_levels()).is_err());
    }
}
