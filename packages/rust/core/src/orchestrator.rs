//! Intake workflow: validated record → contact → consent → listing → association.
//!
//! Only the contact submission is load-bearing. Consent, listing lookup and
//! association are best-effort enrichments: their failures are recorded in
//! the [`IntakeStatusReport`] and logged, never turned into an overall failure.
//!
//! | Step               | On failure  | Continues?        |
//! |--------------------|-------------|-------------------|
//! | submit contact     | abort       | no                |
//! | grant consent      | record only | yes               |
//! | resolve listing    | record only | yes, skip step 4  |
//! | create association | record only | terminal          |

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use intake_directory::DirectoryClient;
use intake_shared::{IntakeConfig, IntakeRecord, IntakeStatusReport, StepOutcome};

/// Caller-facing message when the contact could not be submitted.
/// Directory detail stays in [`IntakeRun::failure_reason`].
pub const SUBMIT_FAILED_MESSAGE: &str = "Failed to submit contact information";

const MSG_COMPLETE: &str = "Request submitted successfully";
const MSG_LISTING_NOT_FOUND: &str =
    "Contact created successfully, but listing not found for association";
const MSG_CONSENT_MISSING: &str = "Contact created successfully, but marketing consent could not be recorded; listing association skipped";
const MSG_ASSOCIATION_MISSING: &str =
    "Contact created successfully, but the listing association could not be created";

// ---------------------------------------------------------------------------
// IntakeRun
// ---------------------------------------------------------------------------

/// Overall classification of a run.
///
/// Partial success is still `Ok`: the contact exists, and the report says
/// which enrichments are missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Ok,
    Failed,
}

/// Result of [`IntakeOrchestrator::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeRun {
    pub outcome: RunOutcome,
    pub report: IntakeStatusReport,
    /// Message safe to show the submitter.
    pub message: String,
    /// Directory detail behind a failed run. Logged, never sent to callers.
    pub failure_reason: Option<String>,
}

impl IntakeRun {
    fn failed(reason: String) -> Self {
        Self {
            outcome: RunOutcome::Failed,
            report: IntakeStatusReport::default(),
            message: SUBMIT_FAILED_MESSAGE.to_string(),
            failure_reason: Some(reason),
        }
    }

    fn completed(report: IntakeStatusReport) -> Self {
        Self {
            outcome: RunOutcome::Ok,
            report,
            message: summary_message(&report).to_string(),
            failure_reason: None,
        }
    }

    /// The contact was submitted but at least one enrichment step did not complete.
    pub fn is_partial(&self) -> bool {
        self.outcome == RunOutcome::Ok && !self.report.is_complete()
    }
}

/// Pick the message for a run whose contact submission succeeded.
fn summary_message(report: &IntakeStatusReport) -> &'static str {
    if !report.related_record_found {
        MSG_LISTING_NOT_FOUND
    } else if !report.consent_granted {
        MSG_CONSENT_MISSING
    } else if !report.association_created {
        MSG_ASSOCIATION_MISSING
    } else {
        MSG_COMPLETE
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives one [`DirectoryClient`] through the intake steps.
///
/// Holds no per-request state; one instance serves every request.
pub struct IntakeOrchestrator {
    directory: Arc<dyn DirectoryClient>,
    config: IntakeConfig,
}

impl IntakeOrchestrator {
    pub fn new(directory: Arc<dyn DirectoryClient>, config: IntakeConfig) -> Self {
        Self { directory, config }
    }

    /// Run the full intake sequence for one record.
    #[instrument(skip_all, fields(
        directory = self.directory.name(),
        email = %record.email(),
        external_key = %record.external_key(),
    ))]
    pub async fn run(&self, record: &IntakeRecord) -> IntakeRun {
        let mut report = IntakeStatusReport::default();

        // --- Step 1: contact (fatal) ---
        if let StepOutcome::Failure(reason) = self.submit_contact(record).await {
            error!(%reason, "contact submission failed, aborting intake");
            return IntakeRun::failed(reason);
        }
        report.contact_submitted = true;

        // --- Step 2: consent ---
        self.settle().await;
        let consent = self.grant_consent(record.email()).await;
        report.consent_granted = consent.is_success();

        // --- Step 3: listing ---
        let listing = self.resolve_related_record(record.external_key()).await;
        report.related_record_found = listing.is_success();

        // --- Step 4: association ---
        if report.related_record_found {
            let association = self
                .associate(consent.identifier(), listing.identifier())
                .await;
            report.association_created = association.is_some_and(|a| a.is_success());
        }

        let run = IntakeRun::completed(report);
        info!(
            partial = run.is_partial(),
            consent = report.consent_granted,
            listing = report.related_record_found,
            association = report.association_created,
            "intake finished"
        );
        run
    }

    async fn submit_contact(&self, record: &IntakeRecord) -> StepOutcome {
        self.directory.submit_contact(record).await
    }

    /// Give the directory time to make a just-submitted contact readable.
    async fn settle(&self) {
        if let Some(delay) = self.config.consent_delay() {
            debug!(delay_ms = self.config.consent_delay_ms, "waiting before consent update");
            tokio::time::sleep(delay).await;
        }
    }

    async fn grant_consent(&self, email: &str) -> StepOutcome {
        let outcome = self.directory.grant_consent(email).await;
        if let StepOutcome::Failure(reason) = &outcome {
            warn!(step = "grant_consent", %reason, "failed to set marketing consent");
        }
        outcome
    }

    async fn resolve_related_record(&self, external_key: &str) -> StepOutcome {
        let outcome = self.directory.find_related_record(external_key).await;
        if let StepOutcome::Failure(reason) = &outcome {
            warn!(step = "find_related_record", %reason, "listing not found");
        }
        outcome
    }

    /// Link contact and listing. `None` when either id is missing and the call was skipped.
    async fn associate(
        &self,
        contact_id: Option<&str>,
        record_id: Option<&str>,
    ) -> Option<StepOutcome> {
        let (Some(contact_id), Some(record_id)) = (contact_id, record_id) else {
            warn!(
                step = "create_association",
                has_contact_id = contact_id.is_some(),
                has_record_id = record_id.is_some(),
                "association skipped for lack of an identifier"
            );
            return None;
        };

        let outcome = self
            .directory
            .create_association(contact_id, record_id)
            .await;
        if let StepOutcome::Failure(reason) = &outcome {
            warn!(step = "create_association", %reason, "failed to create association");
        }
        Some(outcome)
    }
}
