//! Shared types, error model, validation and configuration for listing-intake.
//!
//! This crate is the foundation depended on by all other intake crates.
//! It provides:
//! - [`IntakeError`], the unified error type
//! - Domain types ([`IntakeRecord`], [`IntakeStatusReport`], [`StepOutcome`], [`FieldError`])
//! - The payload validator ([`validate`])
//! - Configuration ([`AppConfig`], [`IntakeConfig`], [`HubSpotConfig`], config loading)

pub mod config;
pub mod error;
pub mod record;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, HubSpotConfig, IntakeConfig, ServerConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_hubspot,
};
pub use error::{IntakeError, Result};
pub use record::{IntakeRecord, validate};
pub use types::{FieldError, IntakeStatusReport, PageContext, StepOutcome};
