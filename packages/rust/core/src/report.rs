//! Projection of intake results onto transport responses and end-user UI state.
//!
//! Everything here is pure: the HTTP server and the CLI both render the same
//! [`IntakeResponse`] values.

use serde::{Deserialize, Serialize};

use intake_shared::{FieldError, IntakeStatusReport};

use crate::orchestrator::{IntakeRun, RunOutcome};

/// Message for errors nobody anticipated (panics, join failures).
pub const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred";

/// Message for any method other than POST on the intake endpoint.
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed. Use POST to submit form data.";

const VALIDATION_FAILED_MESSAGE: &str = "Validation failed";

/// Fallback shown in the UI when a failed response carries no message.
const GENERIC_UI_ERROR: &str = "An error occurred while submitting the form.";

/// Wire-level status tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Submitted,
    Rejected,
    Failed,
}

/// JSON body returned to the form frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub status: ResponseStatus,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<IntakeStatusReport>,
}

/// Transport response: HTTP status code plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeResponse {
    pub status_code: u16,
    pub body: ResponseBody,
}

/// 400 with every field error, in validator order.
pub fn rejected(errors: Vec<FieldError>) -> IntakeResponse {
    IntakeResponse {
        status_code: 400,
        body: ResponseBody {
            status: ResponseStatus::Rejected,
            success: false,
            message: VALIDATION_FAILED_MESSAGE.to_string(),
            errors,
            details: None,
        },
    }
}

/// 200 for any run whose contact was submitted, 500 otherwise.
pub fn from_run(run: &IntakeRun) -> IntakeResponse {
    match run.outcome {
        RunOutcome::Ok => IntakeResponse {
            status_code: 200,
            body: ResponseBody {
                status: ResponseStatus::Submitted,
                success: true,
                message: run.message.clone(),
                errors: Vec::new(),
                details: Some(run.report),
            },
        },
        RunOutcome::Failed => failed(run.message.clone()),
    }
}

/// Generic 500 for failures outside the workflow's own policy.
pub fn unexpected() -> IntakeResponse {
    failed(UNEXPECTED_MESSAGE.to_string())
}

/// 405 for non-POST access.
pub fn method_not_allowed() -> IntakeResponse {
    IntakeResponse {
        status_code: 405,
        body: ResponseBody {
            status: ResponseStatus::Rejected,
            success: false,
            message: METHOD_NOT_ALLOWED_MESSAGE.to_string(),
            errors: Vec::new(),
            details: None,
        },
    }
}

fn failed(message: String) -> IntakeResponse {
    IntakeResponse {
        status_code: 500,
        body: ResponseBody {
            status: ResponseStatus::Failed,
            success: false,
            message,
            errors: Vec::new(),
            details: Some(IntakeStatusReport::default()),
        },
    }
}

// ---------------------------------------------------------------------------
// UI state
// ---------------------------------------------------------------------------

/// What the inquiry form shows after a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiState {
    /// "Thank you" panel.
    Submitted,
    /// Inline error text above the form.
    Error(String),
}

impl From<&IntakeResponse> for UiState {
    /// Both the transport status and the body must report success.
    fn from(response: &IntakeResponse) -> Self {
        let ok = (200..300).contains(&response.status_code);
        if ok && response.body.success {
            Self::Submitted
        } else {
            Self::Error(error_text(&response.body))
        }
    }
}

fn error_text(body: &ResponseBody) -> String {
    if !body.errors.is_empty() {
        return body
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join(". ");
    }

    if body.message.is_empty() {
        GENERIC_UI_ERROR.to_string()
    } else {
        body.message.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(outcome: RunOutcome, report: IntakeStatusReport, message: &str) -> IntakeRun {
        IntakeRun {
            outcome,
            report,
            message: message.to_string(),
            failure_reason: None,
        }
    }

    #[test]
    fn full_success_body() {
        let report = IntakeStatusReport {
            contact_submitted: true,
            consent_granted: true,
            related_record_found: true,
            association_created: true,
        };
        let response = from_run(&run(RunOutcome::Ok, report, "Request submitted successfully"));

        assert_eq!(response.status_code, 200);
        let body = serde_json::to_value(&response.body).expect("serialize");
        assert_eq!(
            body,
            json!({
                "status": "submitted",
                "success": true,
                "message": "Request submitted successfully",
                "details": {
                    "contactSubmitted": true,
                    "marketingConsentSet": true,
                    "listingFound": true,
                    "associationCreated": true,
                }
            })
        );
    }

    #[test]
    fn partial_success_is_still_submitted() {
        let report = IntakeStatusReport {
            contact_submitted: true,
            consent_granted: true,
            ..Default::default()
        };
        let response = from_run(&run(RunOutcome::Ok, report, "listing not found"));

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body.status, ResponseStatus::Submitted);
        assert_eq!(response.body.details, Some(report));
        assert_eq!(UiState::from(&response), UiState::Submitted);
    }

    #[test]
    fn failed_run_has_all_false_details() {
        let response = from_run(&IntakeRun {
            outcome: RunOutcome::Failed,
            report: IntakeStatusReport::default(),
            message: "Failed to submit contact information".into(),
            failure_reason: Some("HTTP 502 from forms API".into()),
        });

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body.status, ResponseStatus::Failed);
        assert_eq!(response.body.details, Some(IntakeStatusReport::default()));

        let raw = serde_json::to_string(&response.body).expect("serialize");
        assert!(!raw.contains("502"), "failure detail leaked: {raw}");
    }

    #[test]
    fn rejection_lists_errors_in_order() {
        let response = rejected(vec![
            FieldError::new("email", "Email is required"),
            FieldError::new("lastname", "Last name is required"),
        ]);

        assert_eq!(response.status_code, 400);
        let body = serde_json::to_value(&response.body).expect("serialize");
        assert_eq!(body["status"], "rejected");
        assert_eq!(body["errors"][0]["field"], "email");
        assert_eq!(body["errors"][1]["field"], "lastname");
        assert!(body.get("details").is_none());

        assert_eq!(
            UiState::from(&response),
            UiState::Error("Email is required. Last name is required".into())
        );
    }

    #[test]
    fn unexpected_and_method_not_allowed() {
        let response = unexpected();
        assert_eq!(response.status_code, 500);
        assert_eq!(response.body.message, UNEXPECTED_MESSAGE);
        assert_eq!(
            UiState::from(&response),
            UiState::Error(UNEXPECTED_MESSAGE.into())
        );

        let response = method_not_allowed();
        assert_eq!(response.status_code, 405);
        assert!(!response.body.success);
        assert_eq!(response.body.details, None);
    }

    #[test]
    fn ui_falls_back_to_generic_error() {
        let response = IntakeResponse {
            status_code: 500,
            body: ResponseBody {
                status: ResponseStatus::Failed,
                success: false,
                message: String::new(),
                errors: Vec::new(),
                details: None,
            },
        };
        assert_eq!(
            UiState::from(&response),
            UiState::Error(GENERIC_UI_ERROR.into())
        );
    }

    #[test]
    fn ui_requires_a_successful_status_code() {
        let mut response = from_run(&run(
            RunOutcome::Ok,
            IntakeStatusReport::default(),
            "Request submitted successfully",
        ));
        assert_eq!(UiState::from(&response), UiState::Submitted);

        response.status_code = 502;
        assert_eq!(
            UiState::from(&response),
            UiState::Error("Request submitted successfully".into())
        );
    }
}
