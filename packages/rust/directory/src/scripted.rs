//! In-memory [`DirectoryClient`] with scripted outcomes.
//!
//! Backs `intake submit --dry-run` and the orchestrator/server tests. Every
//! call is recorded so callers can check which steps actually ran.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use intake_shared::{IntakeRecord, StepOutcome};
use tracing::info;

use crate::DirectoryClient;

/// One recorded call against a [`ScriptedDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    SubmitContact { email: String },
    GrantConsent { email: String },
    FindRelatedRecord { external_key: String },
    CreateAssociation { contact_id: String, record_id: String },
}

/// Directory that answers every capability with a fixed [`StepOutcome`].
#[derive(Debug)]
pub struct ScriptedDirectory {
    submit: StepOutcome,
    consent: StepOutcome,
    lookup: StepOutcome,
    association: StepOutcome,
    calls: Mutex<Vec<DirectoryCall>>,
}

impl ScriptedDirectory {
    /// Every step succeeds, with placeholder contact and listing ids.
    pub fn all_succeed() -> Self {
        Self {
            submit: StepOutcome::done(),
            consent: StepOutcome::with_id("dry-run-contact"),
            lookup: StepOutcome::with_id("dry-run-listing"),
            association: StepOutcome::done(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn submit(mut self, outcome: StepOutcome) -> Self {
        self.submit = outcome;
        self
    }

    pub fn consent(mut self, outcome: StepOutcome) -> Self {
        self.consent = outcome;
        self
    }

    pub fn lookup(mut self, outcome: StepOutcome) -> Self {
        self.lookup = outcome;
        self
    }

    pub fn association(mut self, outcome: StepOutcome) -> Self {
        self.association = outcome;
        self
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DirectoryCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: DirectoryCall, outcome: &StepOutcome) -> StepOutcome {
        info!(?call, ?outcome, "scripted directory call");
        self.lock().push(call);
        outcome.clone()
    }
}

impl Default for ScriptedDirectory {
    fn default() -> Self {
        Self::all_succeed()
    }
}

#[async_trait]
impl DirectoryClient for ScriptedDirectory {
    async fn submit_contact(&self, record: &IntakeRecord) -> StepOutcome {
        self.record(
            DirectoryCall::SubmitContact {
                email: record.email().to_string(),
            },
            &self.submit,
        )
    }

    async fn grant_consent(&self, email: &str) -> StepOutcome {
        self.record(
            DirectoryCall::GrantConsent {
                email: email.to_string(),
            },
            &self.consent,
        )
    }

    async fn find_related_record(&self, external_key: &str) -> StepOutcome {
        self.record(
            DirectoryCall::FindRelatedRecord {
                external_key: external_key.to_string(),
            },
            &self.lookup,
        )
    }

    async fn create_association(&self, contact_id: &str, record_id: &str) -> StepOutcome {
        self.record(
            DirectoryCall::CreateAssociation {
                contact_id: contact_id.to_string(),
                record_id: record_id.to_string(),
            },
            &self.association,
        )
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
