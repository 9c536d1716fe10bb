//! Inbound payload validation.
//!
//! [`validate`] is the only way to obtain an [`IntakeRecord`]: it turns an
//! arbitrary JSON value into a sanitized record, or returns every field error
//! it found in one pass.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{FieldError, PageContext};

/// Same permissive shape the form frontend checks: `local@domain.tld`.
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

const CONSENT_MESSAGE: &str =
    "You must agree to receive marketing communications to submit this form.";

// ---------------------------------------------------------------------------
// IntakeRecord
// ---------------------------------------------------------------------------

/// A validated contact submission, ready for the directory.
///
/// Fields are private: a record can only come out of [`validate`], so holding
/// one means every required field is present and consent was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeRecord {
    given_name: String,
    family_name: String,
    email: String,
    phone: Option<String>,
    external_key: String,
    page_context: PageContext,
}

impl IntakeRecord {
    pub fn given_name(&self) -> &str {
        &self.given_name
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    /// Trimmed, lower-cased email address.
    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    /// Join key used to resolve the listing record.
    pub fn external_key(&self) -> &str {
        &self.external_key
    }

    /// Always `true`; records without consent are rejected before construction.
    pub fn marketing_consent(&self) -> bool {
        true
    }

    pub fn page_context(&self) -> &PageContext {
        &self.page_context
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate and normalize a raw request body.
///
/// All checks run even after one fails; the returned errors are ordered
/// email, external_listing_id, marketing_opt_in, firstname, lastname.
pub fn validate(raw: &Value) -> Result<IntakeRecord, Vec<FieldError>> {
    let Some(data) = raw.as_object() else {
        return Err(vec![FieldError::new(
            "body",
            "Request body must be a JSON object",
        )]);
    };

    let mut errors = Vec::new();

    let email = required_str(data, "email");
    match email {
        None => errors.push(FieldError::new("email", "Email is required")),
        Some(e) if !EMAIL_RE.is_match(e) => errors.push(FieldError::new(
            "email",
            "Email must be a valid email address",
        )),
        Some(_) => {}
    }

    let external_key = required_str(data, "external_listing_id");
    if external_key.is_none() {
        errors.push(FieldError::new(
            "external_listing_id",
            "External listing ID is required",
        ));
    }

    // Only a JSON boolean `true` counts; "true" or 1 do not.
    if data.get("marketing_opt_in") != Some(&Value::Bool(true)) {
        errors.push(FieldError::new("marketing_opt_in", CONSENT_MESSAGE));
    }

    let given_name = required_str(data, "firstname");
    if given_name.is_none() {
        errors.push(FieldError::new("firstname", "First name is required"));
    }

    let family_name = required_str(data, "lastname");
    if family_name.is_none() {
        errors.push(FieldError::new("lastname", "Last name is required"));
    }

    match (email, external_key, given_name, family_name) {
        (Some(email), Some(external_key), Some(given_name), Some(family_name))
            if errors.is_empty() =>
        {
            Ok(IntakeRecord {
                given_name: given_name.to_string(),
                family_name: family_name.to_string(),
                email: email.to_lowercase(),
                phone: optional_str(data, "phone"),
                external_key: external_key.to_string(),
                page_context: PageContext {
                    uri: optional_str(data, "pageUri"),
                    title: optional_str(data, "pageName"),
                },
            })
        }
        _ => Err(errors),
    }
}

/// Trimmed value of a required string field, `None` if missing, not a string, or blank.
fn required_str<'a>(data: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn optional_str(data: &Map<String, Value>, key: &str) -> Option<String> {
    required_str(data, key).map(String::from)
}
