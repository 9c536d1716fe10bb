//! Intake orchestration and result reporting for listing-intake.
//!
//! This crate sequences the directory calls for a validated submission
//! ([`orchestrator`]) and maps the outcome onto responses ([`report`]).

pub mod orchestrator;
pub mod report;

pub use orchestrator::{IntakeOrchestrator, IntakeRun, RunOutcome};
pub use report::{IntakeResponse, ResponseBody, ResponseStatus, UiState};
