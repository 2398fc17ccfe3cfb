// Profile Merger - priority order, first non-empty value wins
//
// For each canonical field the results are scanned from most to least
// trusted. Empty values never win. Revenue and employee values that do not
// parse are skipped like empty ones. A field nobody supplies takes the
// configured default and is marked as such.

use crate::normalizer;
use crate::parsers::{employees_from_raw, revenue_from_raw};
use crate::types::{
    CompanyCandidate, CompanyProfile, ConflictReport, ProfileField, Provenance, ProviderResult, RawValue,
};
use crqm_common::config::DefaultsConfig;
use std::collections::BTreeMap;
use tracing::debug;

/// Relative tolerance below which two numeric values agree
const NUMERIC_TOLERANCE: f64 = 1e-6;

/// Safe defaults for fields no provider supplies
#[derive(Debug, Clone, PartialEq)]
pub struct MergeDefaults {
    pub revenue_usd_billions: f64,
    pub employees: u64,
    pub industry: String,
    pub sector: String,
    pub region: String,
}

impl Default for MergeDefaults {
    fn default() -> Self {
        Self::from(&DefaultsConfig::default())
    }
}

impl From<&DefaultsConfig> for MergeDefaults {
    fn from(config: &DefaultsConfig) -> Self {
        Self {
            revenue_usd_billions: config.revenue_usd_billions,
            employees: config.employees,
            industry: config.industry.clone(),
            sector: config.sector.clone(),
            region: config.region.clone(),
        }
    }
}

/// One supplied value: provider name plus the normalized value
struct Supplied<T> {
    provider: String,
    raw: String,
    value: T,
}

/// Reconcile provider results into a profile for `candidate`
///
/// Input order does not matter: results are re-sorted by
/// (priority, provider name) first.
pub fn merge_profile(
    candidate: &CompanyCandidate,
    results: &[ProviderResult],
    defaults: &MergeDefaults,
) -> CompanyProfile {
    let mut ordered: Vec<&ProviderResult> = results.iter().collect();
    ordered.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.provider.cmp(&b.provider))
    });

    let mut provenance = BTreeMap::new();
    let mut conflicts = Vec::new();

    let mut text = |field: ProfileField, fallback: &str| -> String {
        let supplied = collect(&ordered, field, |v| Some(v.to_string()));
        conflicts.extend(text_conflicts(field, &supplied));
        match supplied.into_iter().next() {
            Some(winner) => {
                provenance.insert(field, Provenance::Provider(winner.provider));
                winner.value
            }
            None => {
                provenance.insert(field, Provenance::Default);
                fallback.to_string()
            }
        }
    };

    let name = text(ProfileField::Name, &candidate.display_name);
    let region = text(ProfileField::Region, &defaults.region);
    let industry = text(ProfileField::Industry, &defaults.industry);
    let sector = text(ProfileField::Sector, &defaults.sector);

    let revenue = collect(&ordered, ProfileField::Revenue, |v| revenue_from_raw(v).ok());
    conflicts.extend(numeric_conflicts(ProfileField::Revenue, &revenue, |v| *v));
    let revenue_usd_billions = match revenue.into_iter().next() {
        Some(winner) => {
            provenance.insert(ProfileField::Revenue, Provenance::Provider(winner.provider));
            winner.value
        }
        None => {
            provenance.insert(ProfileField::Revenue, Provenance::Default);
            defaults.revenue_usd_billions
        }
    };

    let headcount = collect(&ordered, ProfileField::Employees, |v| employees_from_raw(v).ok());
    conflicts.extend(numeric_conflicts(ProfileField::Employees, &headcount, |v| *v as f64));
    let employees = match headcount.into_iter().next() {
        Some(winner) => {
            provenance.insert(ProfileField::Employees, Provenance::Provider(winner.provider));
            winner.value
        }
        None => {
            provenance.insert(ProfileField::Employees, Provenance::Default);
            defaults.employees
        }
    };

    let supplied = provenance
        .values()
        .filter(|p| matches!(p, Provenance::Provider(_)))
        .count();
    let completeness = supplied as f64 / ProfileField::ALL.len() as f64;

    debug!(
        "Profile merge complete: {} of {} fields from providers, {} conflicts",
        supplied,
        ProfileField::ALL.len(),
        conflicts.len()
    );

    CompanyProfile {
        name,
        region,
        industry,
        sector,
        revenue_usd_billions,
        employees,
        handle: candidate.handle.clone(),
        parent: candidate.parent.clone(),
        provenance,
        conflicts,
        completeness,
    }
}

/// Every usable value for a field, most trusted first
fn collect<T, F>(ordered: &[&ProviderResult], field: ProfileField, convert: F) -> Vec<Supplied<T>>
where
    F: Fn(&RawValue) -> Option<T>,
{
    ordered
        .iter()
        .filter_map(|result| {
            let raw = result.get(field)?;
            match convert(raw) {
                Some(value) => Some(Supplied {
                    provider: result.provider.clone(),
                    raw: raw.to_string(),
                    value,
                }),
                None => {
                    debug!(
                        provider = %result.provider,
                        field = %field,
                        value = %raw,
                        "Unparsable value skipped"
                    );
                    None
                }
            }
        })
        .collect()
}

fn text_conflicts(field: ProfileField, supplied: &[Supplied<String>]) -> Vec<ConflictReport> {
    let Some((winner, rest)) = supplied.split_first() else {
        return Vec::new();
    };

    rest.iter()
        .filter(|other| normalizer::match_key(&other.value) != normalizer::match_key(&winner.value))
        .map(|other| ConflictReport {
            field,
            source1: winner.provider.clone(),
            value1: winner.value.clone(),
            source2: other.provider.clone(),
            value2: other.value.clone(),
            similarity: Some(strsim::normalized_levenshtein(
                &winner.value.to_lowercase(),
                &other.value.to_lowercase(),
            )),
        })
        .collect()
}

fn numeric_conflicts<T, F>(field: ProfileField, supplied: &[Supplied<T>], as_f64: F) -> Vec<ConflictReport>
where
    F: Fn(&T) -> f64,
{
    let Some((winner, rest)) = supplied.split_first() else {
        return Vec::new();
    };
    let reference = as_f64(&winner.value);

    rest.iter()
        .filter(|other| {
            let value = as_f64(&other.value);
            (value - reference).abs() > NUMERIC_TOLERANCE * reference.abs().max(value.abs()).max(1.0)
        })
        .map(|other| ConflictReport {
            field,
            source1: winner.provider.clone(),
            value1: winner.raw.clone(),
            source2: other.provider.clone(),
            value2: other.raw.clone(),
            similarity: None,
        })
        .collect()
}
