//! HubSpot-backed [`DirectoryClient`].
//!
//! - contact upsert goes through the Forms submission API (email-deduplicated,
//!   no token needed)
//! - consent, listing lookup and association use the CRM v3/v4 object APIs
//!   with a private app bearer token

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};
use url::Url;

use intake_shared::{HubSpotConfig, IntakeError, IntakeRecord, Result, StepOutcome};

use crate::DirectoryClient;

/// User-Agent string for directory requests.
const USER_AGENT: &str = concat!("listing-intake/", env!("CARGO_PKG_VERSION"));

/// How much of an error response body to keep in a failure reason.
const MAX_ERROR_BODY_CHARS: usize = 512;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FormSubmission<'a> {
    /// Milliseconds since the epoch, as a string.
    submitted_at: String,
    fields: Vec<FormField<'a>>,
    context: FormContext<'a>,
}

#[derive(Debug, Serialize)]
struct FormField<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FormContext<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    page_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_name: Option<&'a str>,
}

/// Any CRM object; only the id matters here.
#[derive(Debug, Deserialize)]
struct CrmObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<CrmObject>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Directory client talking to a HubSpot portal.
pub struct HubSpotClient {
    config: HubSpotConfig,
    client: Client,
    access_token: Option<String>,
}

impl HubSpotClient {
    /// Build a client from config. The access token is read from
    /// `config.access_token_env` once, here.
    pub fn new(config: HubSpotConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IntakeError::Network(format!("failed to build HTTP client: {e}")))?;

        let access_token = config.access_token();

        Ok(Self {
            config,
            client,
            access_token,
        })
    }

    /// Use an explicit access token instead of the env var.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn bearer(&self) -> Result<&str> {
        self.access_token.as_deref().ok_or_else(|| {
            IntakeError::config(format!(
                "HubSpot access token not set (expected in {})",
                self.config.access_token_env
            ))
        })
    }

    /// `base` joined with percent-encoded path segments.
    fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(base)
            .map_err(|e| IntakeError::config(format!("invalid base URL '{base}': {e}")))?;
        url.path_segments_mut()
            .map_err(|()| IntakeError::config(format!("base URL '{base}' cannot carry a path")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn crm_endpoint(&self, segments: &[&str]) -> Result<Url> {
        Self::endpoint(&self.config.api_base_url, segments)
    }

    async fn try_submit_contact(&self, record: &IntakeRecord) -> Result<Option<String>> {
        let url = Self::endpoint(
            &self.config.forms_base_url,
            &[
                "submissions",
                "v3",
                "integration",
                "submit",
                self.config.portal_id.as_str(),
                self.config.form_guid.as_str(),
            ],
        )?;

        let mut fields = vec![
            FormField {
                name: "firstname",
                value: record.given_name(),
            },
            FormField {
                name: "lastname",
                value: record.family_name(),
            },
            FormField {
                name: "email",
                value: record.email(),
            },
        ];
        if let Some(phone) = record.phone() {
            fields.push(FormField {
                name: "phone",
                value: phone,
            });
        }
        fields.push(FormField {
            name: "external_listing_id",
            value: record.external_key(),
        });

        let page = record.page_context();
        let submission = FormSubmission {
            submitted_at: Utc::now().timestamp_millis().to_string(),
            fields,
            context: FormContext {
                page_uri: page.uri.as_deref(),
                page_name: page.title.as_deref(),
            },
        };

        let response = send(self.client.post(url).json(&submission), "form submission").await?;
        ensure_success(response, "form submission").await?;
        Ok(None)
    }

    async fn try_grant_consent(&self, email: &str) -> Result<Option<String>> {
        let token = self.bearer()?;

        let mut lookup = self.crm_endpoint(&["crm", "v3", "objects", "contacts", email])?;
        lookup.query_pairs_mut().append_pair("idProperty", "email");

        let response = send(self.client.get(lookup).bearer_auth(token), "contact lookup").await?;
        let contact: CrmObject = read_json(response, "contact lookup").await?;

        let mut properties = Map::new();
        properties.insert(
            self.config.consent_property.clone(),
            Value::String("true".into()),
        );

        let update = self.crm_endpoint(&["crm", "v3", "objects", "contacts", contact.id.as_str()])?;
        let response = send(
            self.client
                .patch(update)
                .bearer_auth(token)
                .json(&json!({ "properties": properties })),
            "consent update",
        )
        .await?;
        ensure_success(response, "consent update").await?;

        Ok(Some(contact.id))
    }

    async fn try_find_related_record(&self, external_key: &str) -> Result<Option<String>> {
        let token = self.bearer()?;
        let url = self.crm_endpoint(&[
            "crm",
            "v3",
            "objects",
            self.config.listing_object_type.as_str(),
            "search",
        ])?;

        let property = &self.config.listing_key_property;
        let query = json!({
            "filterGroups": [{
                "filters": [{
                    "propertyName": property,
                    "operator": "EQ",
                    "value": external_key,
                }]
            }],
            "properties": [property],
            "limit": 1,
        });

        let response = send(
            self.client.post(url).bearer_auth(token).json(&query),
            "listing search",
        )
        .await?;
        let found: SearchResponse = read_json(response, "listing search").await?;

        found
            .results
            .into_iter()
            .next()
            .map(|listing| Some(listing.id))
            .ok_or_else(|| {
                IntakeError::Directory(format!("no listing found with {property} = {external_key}"))
            })
    }

    async fn try_create_association(
        &self,
        contact_id: &str,
        record_id: &str,
    ) -> Result<Option<String>> {
        let token = self.bearer()?;
        let to_type = self.config.listing_object_type.as_str();

        let request = match self.config.association_type_id {
            Some(type_id) => {
                let url = self.crm_endpoint(&[
                    "crm",
                    "v4",
                    "objects",
                    "contacts",
                    contact_id,
                    "associations",
                    to_type,
                    record_id,
                ])?;
                self.client.put(url).json(&json!([{
                    "associationCategory": "USER_DEFINED",
                    "associationTypeId": type_id,
                }]))
            }
            None => {
                let url = self.crm_endpoint(&[
                    "crm",
                    "v4",
                    "objects",
                    "contacts",
                    contact_id,
                    "associations",
                    "default",
                    to_type,
                    record_id,
                ])?;
                self.client.put(url)
            }
        };

        let response = send(request.bearer_auth(token), "association").await?;
        ensure_success(response, "association").await?;
        Ok(None)
    }
}

#[async_trait]
impl DirectoryClient for HubSpotClient {
    #[instrument(skip_all, fields(client = "hubspot", email = %record.email()))]
    async fn submit_contact(&self, record: &IntakeRecord) -> StepOutcome {
        let outcome: StepOutcome = self.try_submit_contact(record).await.into();
        debug!(?outcome, "form submission finished");
        outcome
    }

    #[instrument(skip_all, fields(client = "hubspot", email = %email))]
    async fn grant_consent(&self, email: &str) -> StepOutcome {
        let outcome: StepOutcome = self.try_grant_consent(email).await.into();
        debug!(?outcome, "consent update finished");
        outcome
    }

    #[instrument(skip_all, fields(client = "hubspot", external_key = %external_key))]
    async fn find_related_record(&self, external_key: &str) -> StepOutcome {
        let outcome: StepOutcome = self.try_find_related_record(external_key).await.into();
        debug!(?outcome, "listing search finished");
        outcome
    }

    #[instrument(
        skip_all,
        fields(client = "hubspot", contact_id = %contact_id, record_id = %record_id)
    )]
    async fn create_association(&self, contact_id: &str, record_id: &str) -> StepOutcome {
        let outcome: StepOutcome = self
            .try_create_association(contact_id, record_id)
            .await
            .into();
        debug!(?outcome, "association finished");
        outcome
    }

    fn name(&self) -> &str {
        "hubspot"
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn send(request: reqwest::RequestBuilder, what: &str) -> Result<Response> {
    request
        .send()
        .await
        .map_err(|e| IntakeError::Network(format!("{what}: {e}")))
}

/// Turn a non-2xx response into a [`IntakeError::Directory`] carrying a clipped body.
async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    Err(IntakeError::Directory(format!("{what}: HTTP {status}: {body}")))
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    let response = ensure_success(response, what).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| IntakeError::Directory(format!("{what}: malformed response body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "pat-test-token";

    fn test_config(server: &MockServer) -> HubSpotConfig {
        HubSpotConfig {
            portal_id: "123456".into(),
            form_guid: "form-guid".into(),
            api_base_url: server.uri(),
            forms_base_url: server.uri(),
            access_token_env: "INTAKE_TEST_UNSET_HUBSPOT_TOKEN".into(),
            ..HubSpotConfig::default()
        }
    }

    fn client(server: &MockServer) -> HubSpotClient {
        HubSpotClient::new(test_config(server))
            .expect("build client")
            .with_access_token(TOKEN)
    }

    fn record(phone: Option<&str>) -> IntakeRecord {
        let mut payload = json!({
            "firstname": "Grace",
            "lastname": "Hopper",
            "email": "grace@example.com",
            "external_listing_id": "LST-7",
            "marketing_opt_in": true,
            "pageUri": "https://homes.example.com/listings/7",
            "pageName": "7 Harbor View",
        });
        if let Some(phone) = phone {
            payload["phone"] = json!(phone);
        }
        intake_shared::validate(&payload).expect("valid record")
    }

    #[tokio::test]
    async fn submit_contact_posts_form_fields() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/submissions/v3/integration/submit/123456/form-guid"))
            .and(body_partial_json(json!({
                "context": {
                    "pageUri": "https://homes.example.com/listings/7",
                    "pageName": "7 Harbor View",
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "inlineMessage": "Thanks for submitting the form."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server).submit_contact(&record(Some("555-0100"))).await;
        assert_eq!(outcome, StepOutcome::done());

        let requests = server.received_requests().await.expect("recording enabled");
        let body: Value = serde_json::from_slice(&requests[0].body).expect("json body");
        let names: Vec<&str> = body["fields"]
            .as_array()
            .expect("fields array")
            .iter()
            .filter_map(|f| f["name"].as_str())
            .collect();
        assert_eq!(
            names,
            vec!["firstname", "lastname", "email", "phone", "external_listing_id"]
        );
        assert!(body["submittedAt"].as_str().is_some());
        // Forms API needs no token
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn submit_contact_omits_missing_phone() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let outcome = client(&server).submit_contact(&record(None)).await;
        assert!(outcome.is_success());

        let requests = server.received_requests().await.expect("recording enabled");
        let body: Value = serde_json::from_slice(&requests[0].body).expect("json body");
        let has_phone = body["fields"]
            .as_array()
            .expect("fields array")
            .iter()
            .any(|f| f["name"] == "phone");
        assert!(!has_phone);
    }

    #[tokio::test]
    async fn submit_contact_reports_http_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"status":"error","message":"invalid form"}"#),
            )
            .mount(&server)
            .await;

        let outcome = client(&server).submit_contact(&record(None)).await;
        let reason = outcome.reason().expect("failure");
        assert!(reason.contains("HTTP 400"), "{reason}");
        assert!(reason.contains("invalid form"), "{reason}");
    }

    #[tokio::test]
    async fn grant_consent_updates_contact_and_returns_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/contacts/grace@example.com"))
            .and(query_param("idProperty", "email"))
            .and(header("authorization", "Bearer pat-test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "501",
                "properties": { "email": "grace@example.com" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PATCH"))
            .and(path("/crm/v3/objects/contacts/501"))
            .and(body_partial_json(json!({
                "properties": { "marketing_opt_in": "true" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "501" })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server).grant_consent("grace@example.com").await;
        assert_eq!(outcome, StepOutcome::with_id("501"));
    }

    #[tokio::test]
    async fn grant_consent_fails_when_contact_not_readable_yet() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/contacts/grace@example.com"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let outcome = client(&server).grant_consent("grace@example.com").await;
        assert!(outcome.reason().expect("failure").contains("HTTP 404"));
    }

    #[tokio::test]
    async fn grant_consent_fails_when_update_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/contacts/grace@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "501" })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PATCH"))
            .and(path("/crm/v3/objects/contacts/501"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server).grant_consent("grace@example.com").await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.identifier(), None);
        let reason = outcome.reason().expect("failure");
        assert!(reason.contains("HTTP 500"), "{reason}");
    }

    #[tokio::test]
    async fn crm_steps_fail_without_token() {
        let server = MockServer::start().await;
        let client = HubSpotClient::new(test_config(&server)).expect("build client");

        let outcome = client.grant_consent("grace@example.com").await;
        assert!(outcome.reason().expect("failure").contains("access token"));

        let outcome = client.find_related_record("LST-7").await;
        assert!(!outcome.is_success());

        // no request should have left the client
        let requests = server.received_requests().await.expect("recording enabled");
        assert!(requests.is_empty());
    }

    #[tokio::test]
    async fn find_related_record_returns_first_match() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/listings/search"))
            .and(body_partial_json(json!({ "limit": 1 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 1,
                "results": [{ "id": "9001", "properties": { "external_listing_id": "LST-7" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server).find_related_record("LST-7").await;
        assert_eq!(outcome, StepOutcome::with_id("9001"));

        let requests = server.received_requests().await.expect("recording enabled");
        let body: Value = serde_json::from_slice(&requests[0].body).expect("json body");
        let filter = &body["filterGroups"][0]["filters"][0];
        assert_eq!(filter["propertyName"], "external_listing_id");
        assert_eq!(filter["operator"], "EQ");
        assert_eq!(filter["value"], "LST-7");
    }

    #[tokio::test]
    async fn find_related_record_with_no_results_fails() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/listings/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "total": 0, "results": [] })),
            )
            .mount(&server)
            .await;

        let outcome = client(&server).find_related_record("LST-404").await;
        let reason = outcome.reason().expect("failure");
        assert!(reason.contains("no listing found"), "{reason}");
        assert!(reason.contains("LST-404"), "{reason}");
    }

    #[tokio::test]
    async fn malformed_body_becomes_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/listings/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let outcome = client(&server).find_related_record("LST-7").await;
        assert!(outcome.reason().expect("failure").contains("malformed"));
    }

    #[tokio::test]
    async fn default_association_uses_default_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/crm/v4/objects/contacts/501/associations/default/listings/9001"))
            .and(header("authorization", "Bearer pat-test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "COMPLETE" })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server).create_association("501", "9001").await;
        assert_eq!(outcome, StepOutcome::done());
    }

    #[tokio::test]
    async fn labeled_association_sends_type_id() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/crm/v4/objects/contacts/501/associations/listings/9001"))
            .and(body_partial_json(json!([{
                "associationCategory": "USER_DEFINED",
                "associationTypeId": 77,
            }])))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let config = HubSpotConfig {
            association_type_id: Some(77),
            ..test_config(&server)
        };
        let client = HubSpotClient::new(config)
            .expect("build client")
            .with_access_token(TOKEN);

        let outcome = client.create_association("501", "9001").await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn unreachable_directory_becomes_failure() {
        // Port 9 (discard) on localhost is not listening in test environments.
        let config = HubSpotConfig {
            portal_id: "1".into(),
            form_guid: "g".into(),
            forms_base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..HubSpotConfig::default()
        };
        let client = HubSpotClient::new(config).expect("build client");

        let outcome = client.submit_contact(&record(None)).await;
        assert!(outcome.reason().expect("failure").starts_with("network error"));
    }

    #[test]
    fn endpoint_encodes_segments_and_ignores_trailing_slash() {
        let url = HubSpotClient::endpoint("https://api.hubapi.com/", &["crm", "v3", "a b"])
            .expect("url");
        assert_eq!(url.as_str(), "https://api.hubapi.com/crm/v3/a%20b");
    }
}
