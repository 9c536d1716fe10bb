//! External directory (CRM) capabilities used by the intake workflow.
//!
//! The orchestrator only ever talks to a [`DirectoryClient`]. The built-in
//! [`HubSpotClient`] implements it against the HubSpot Forms and CRM APIs;
//! [`ScriptedDirectory`] answers from memory for dry runs and tests.

mod hubspot;
mod scripted;

use async_trait::async_trait;
use intake_shared::{IntakeRecord, StepOutcome};

pub use hubspot::HubSpotClient;
pub use scripted::{DirectoryCall, ScriptedDirectory};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// The four directory operations the intake workflow sequences.
///
/// Every method reports through a [`StepOutcome`]; implementations turn their
/// own transport and protocol errors into [`StepOutcome::Failure`] instead of
/// returning them.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Create or update the contact for the record's email.
    async fn submit_contact(&self, record: &IntakeRecord) -> StepOutcome;

    /// Mark the contact with this email as marketing-eligible.
    /// On success the identifier is the contact's directory id.
    async fn grant_consent(&self, email: &str) -> StepOutcome;

    /// Look up the listing whose external key matches.
    /// On success the identifier is the listing's directory id.
    async fn find_related_record(&self, external_key: &str) -> StepOutcome;

    /// Link a contact to a listing.
    async fn create_association(&self, contact_id: &str, record_id: &str) -> StepOutcome;

    /// Human-readable client name for tracing.
    fn name(&self) -> &str;
}
