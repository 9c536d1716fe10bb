//! Core domain types shared by the validator, orchestrator and directory clients.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// FieldError
// ---------------------------------------------------------------------------

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Inbound field name (`email`, `external_listing_id`, ... or `body`).
    pub field: String,
    /// Human-readable message shown to the submitter.
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PageContext
// ---------------------------------------------------------------------------

/// Where the form was submitted from. Advisory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

// ---------------------------------------------------------------------------
// StepOutcome
// ---------------------------------------------------------------------------

/// Result of one call against the external directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The call succeeded, optionally yielding the identifier of the record it touched.
    Success(Option<String>),
    /// The call failed; the reason is for logs, never for end users.
    Failure(String),
}

impl StepOutcome {
    /// Success carrying an identifier.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self::Success(Some(id.into()))
    }

    /// Success without an identifier.
    pub fn done() -> Self {
        Self::Success(None)
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Identifier returned on success, if any.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Success(id) => id.as_deref(),
            Self::Failure(_) => None,
        }
    }

    /// Failure reason, if this step failed.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(reason) => Some(reason),
        }
    }
}

impl<E: std::fmt::Display> From<std::result::Result<Option<String>, E>> for StepOutcome {
    fn from(result: std::result::Result<Option<String>, E>) -> Self {
        match result {
            Ok(id) => Self::Success(id),
            Err(e) => Self::Failure(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// IntakeStatusReport
// ---------------------------------------------------------------------------

/// Per-step success flags for one intake run.
///
/// Every flag starts `false` and is only flipped on a confirmed
/// [`StepOutcome::Success`]. Serialized with the names the form frontend reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeStatusReport {
    #[serde(rename = "contactSubmitted")]
    pub contact_submitted: bool,
    #[serde(rename = "marketingConsentSet")]
    pub consent_granted: bool,
    #[serde(rename = "listingFound")]
    pub related_record_found: bool,
    #[serde(rename = "associationCreated")]
    pub association_created: bool,
}

impl IntakeStatusReport {
    /// True when every step completed.
    pub fn is_complete(&self) -> bool {
        self.contact_submitted
            && self.consent_granted
            && self.related_record_found
            && self.association_created
    }
}
