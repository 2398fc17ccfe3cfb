// Fusion Module - candidate disambiguation, enrichment and profile merging
//
// Stage order: Disambiguator (candidates) → Enricher (provider results)
// → profile_merger (one reconciled CompanyProfile)

pub mod disambiguator;
pub mod enricher;
pub mod profile_merger;

pub use disambiguator::{Disambiguation, DisambiguationOutcome, Disambiguator};
pub use enricher::Enricher;
pub use profile_merger::{merge_profile, MergeDefaults};
