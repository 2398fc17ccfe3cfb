//! # CRQM Common Library
//!
//! Shared code for the CRQM input wizard crates:
//! - Error type shared by configuration and provider construction
//! - Configuration loading (TOML bootstrap, environment, compiled defaults)
//! - API key resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
