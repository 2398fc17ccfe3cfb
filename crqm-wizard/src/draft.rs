//! Human-override surface
//!
//! A [`ProfileDraft`] wraps the merged profile while a person reviews it.
//! Every field is editable; an edit is validated and marks the field's
//! provenance as a user override. [`ProfileDraft::confirm`] consumes the
//! draft, so a confirmed [`Submission`] can no longer change.

use crate::classification::{AssetClassification, AssetReport, ValidationWarning};
use crate::parsers;
use crate::types::{CompanyCandidate, CompanyProfile, ProfileField, Provenance};
use chrono::{DateTime, Utc};
use crqm_common::{Error, Result};
use serde::Serialize;
use tracing::{info, warn};

/// One field as presented for review
#[derive(Debug, Clone, PartialEq)]
pub struct EditableField {
    pub field: ProfileField,
    pub value: String,
    pub provenance: Provenance,
    /// Value is the configured default, worth double-checking
    pub is_default: bool,
}

#[derive(Debug, Clone)]
pub struct ProfileDraft {
    candidate: CompanyCandidate,
    profile: CompanyProfile,
    classifications: Vec<AssetClassification>,
    scale: f64,
}

impl ProfileDraft {
    pub fn new(candidate: CompanyCandidate, profile: CompanyProfile) -> Self {
        Self {
            candidate,
            profile,
            classifications: Vec::new(),
            scale: 1.0,
        }
    }

    pub fn profile(&self) -> &CompanyProfile {
        &self.profile
    }

    pub fn candidate(&self) -> &CompanyCandidate {
        &self.candidate
    }

    /// Multiplier applied to derived classification counts
    pub fn set_scale(&mut self, scale: f64) -> Result<()> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::InvalidInput(format!("scale must be positive, got {}", scale)));
        }
        self.scale = scale;
        Ok(())
    }

    /// All fields in canonical order
    pub fn fields(&self) -> Vec<EditableField> {
        ProfileField::ALL
            .iter()
            .map(|&field| {
                let provenance = self.profile.provenance(field).clone();
                EditableField {
                    field,
                    value: self.profile.display_value(field),
                    is_default: provenance == Provenance::Default,
                    provenance,
                }
            })
            .collect()
    }

    pub fn set_revenue(&mut self, usd_billions: f64) -> Result<()> {
        if !usd_billions.is_finite() || usd_billions < 0.0 {
            return Err(Error::InvalidInput(format!(
                "revenue must be a non-negative number of USD billions, got {}",
                usd_billions
            )));
        }
        self.profile.revenue_usd_billions = usd_billions;
        self.mark_override(ProfileField::Revenue);
        Ok(())
    }

    pub fn set_employees(&mut self, employees: u64) -> Result<()> {
        if employees == 0 {
            return Err(Error::InvalidInput("employee count must be at least 1".into()));
        }
        self.profile.employees = employees;
        self.mark_override(ProfileField::Employees);
        Ok(())
    }

    /// Set a text field (name, region, industry, sector)
    pub fn set_text(&mut self, field: ProfileField, value: &str) -> Result<()> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::InvalidInput(format!("{} must not be empty", field)));
        }

        let slot = match field {
            ProfileField::Name => &mut self.profile.name,
            ProfileField::Region => &mut self.profile.region,
            ProfileField::Industry => &mut self.profile.industry,
            ProfileField::Sector => &mut self.profile.sector,
            ProfileField::Revenue | ProfileField::Employees => {
                return Err(Error::InvalidInput(format!("{} is numeric", field)))
            }
        };
        *slot = value.to_string();
        self.mark_override(field);
        Ok(())
    }

    /// Set any field from user text; numeric fields go through the value
    /// parsers, so "450 crore" and "12,000" are accepted
    pub fn set_from_text(&mut self, field: ProfileField, text: &str) -> Result<()> {
        match field {
            ProfileField::Revenue => {
                let value = parsers::parse_revenue(text)
                    .map_err(|e| Error::InvalidInput(format!("revenue: {}", e)))?;
                self.set_revenue(value)
            }
            ProfileField::Employees => {
                let value = parsers::parse_employee_count(text)
                    .map_err(|e| Error::InvalidInput(format!("employees: {}", e)))?;
                self.set_employees(value)
            }
            _ => self.set_text(field, text),
        }
    }

    /// Add or replace (by asset name) a classification pool
    pub fn add_classification(&mut self, classification: AssetClassification) {
        if let Some(w) = classification.warning() {
            warn!("{}", w);
        }
        self.classifications
            .retain(|c| !c.asset().eq_ignore_ascii_case(classification.asset()));
        self.classifications.push(classification);
    }

    pub fn classifications(&self) -> &[AssetClassification] {
        &self.classifications
    }

    pub fn warnings(&self) -> Vec<ValidationWarning> {
        self.classifications.iter().filter_map(|c| c.warning()).collect()
    }

    /// Freeze the draft. Warnings are carried along, never blocking.
    pub fn confirm(self) -> Submission {
        let warnings = self.warnings();
        info!(
            company = %self.profile.name,
            warnings = warnings.len(),
            "Profile confirmed"
        );

        Submission {
            company: self.profile,
            candidate: self.candidate,
            classifications: self
                .classifications
                .iter()
                .map(|c| c.report(self.scale))
                .collect(),
            warnings,
            confirmed_at: Utc::now(),
        }
    }

    fn mark_override(&mut self, field: ProfileField) {
        self.profile.provenance.insert(field, Provenance::UserOverride);
    }
}

/// Confirmed, immutable output record for the risk model
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    company: CompanyProfile,
    candidate: CompanyCandidate,
    classifications: Vec<AssetReport>,
    warnings: Vec<ValidationWarning>,
    confirmed_at: DateTime<Utc>,
}

impl Submission {
    pub fn company(&self) -> &CompanyProfile {
        &self.company
    }

    pub fn candidate(&self) -> &CompanyCandidate {
        &self.candidate
    }

    pub fn classifications(&self) -> &[AssetReport] {
        &self.classifications
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    pub fn confirmed_at(&self) -> DateTime<Utc> {
        self.confirmed_at
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
