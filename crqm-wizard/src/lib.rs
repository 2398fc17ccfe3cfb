//! crqm-wizard library interface
//!
//! Company identity resolution and profile enrichment for the CRQM input
//! wizard. Exposes public APIs for the binary and for integration testing.

pub mod classification;
pub mod draft;
pub mod fusion;
pub mod normalizer;
pub mod parsers;
pub mod pipeline;
pub mod providers;
pub mod types;

pub use crate::classification::{AssetClassification, SensitivityLevels, ValidationWarning};
pub use crate::draft::{ProfileDraft, Submission};
pub use crate::pipeline::Resolver;
pub use crate::providers::{LookupProvider, SharedProvider};
pub use crate::types::{CompanyCandidate, CompanyProfile, CompanyQuery, ProfileField, Provenance, ProviderResult};
