//! Brevo (ex-Sendinblue) HTTP client.
//!
//! Implements the domain [`EmailTransport`] against the v3 REST API:
//! transactional sends (immediate or `scheduledAt`), cancellation of scheduled
//! messages, and contact lookup/upsert. No retries; the batch re-evaluates.

use async_trait::async_trait;
use domain::models::Contact;
use domain::services::{format_scheduled_at, EmailTransport, TransactionalEmail, TransportError};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::BrevoConfig;

const API_KEY_HEADER: &str = "api-key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody<'a> {
    template_id: i64,
    to: &'a [domain::services::Recipient],
    #[serde(skip_serializing_if = "no_params")]
    params: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheduled_at: Option<String>,
    #[serde(skip_serializing_if = "no_tags")]
    tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<[&'a domain::services::Attachment; 1]>,
}

fn no_params(params: &&BTreeMap<String, String>) -> bool {
    params.is_empty()
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailResponse {
    message_id: Option<String>,
    #[serde(default)]
    message_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertContactBody<'a> {
    email: &'a str,
    attributes: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    list_ids: Vec<i64>,
    update_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the Brevo v3 API.
#[derive(Debug, Clone)]
pub struct BrevoClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl BrevoClient {
    pub fn new(config: &BrevoConfig) -> Result<Self, TransportError> {
        if config.api_key.is_empty() {
            return Err(TransportError::NotConfigured);
        }

        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| TransportError::Http(format!("Invalid Brevo base URL: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// Builds `{base}/v3/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Http("Brevo base URL cannot be a base".into()))?
            .pop_if_empty()
            .push("v3")
            .extend(segments);
        Ok(url)
    }

    /// Turns a non-2xx response into [`TransportError::Api`].
    async fn api_error(response: Response) -> TransportError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|e| match (e.code, e.message) {
                (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
                (None, Some(message)) => Some(message),
                (Some(code), None) => Some(code),
                (None, None) => None,
            })
            .unwrap_or(body);

        warn!(status = status, message = %message, "Brevo API request failed");
        TransportError::Api { status, message }
    }
}

fn http_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Http("request to Brevo timed out".into())
    } else {
        TransportError::Http(e.to_string())
    }
}

#[async_trait]
impl EmailTransport for BrevoClient {
    async fn schedule_email(&self, email: &TransactionalEmail) -> Result<String, TransportError> {
        let body = SendEmailBody {
            template_id: email.template_id,
            to: &email.to,
            params: &email.params,
            scheduled_at: email.scheduled_at.map(format_scheduled_at),
            tags: &email.tags,
            attachment: email.attachment.as_ref().map(|a| [a]),
        };

        let response = self
            .client
            .post(self.endpoint(&["smtp", "email"])?)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let parsed: SendEmailResponse = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        let message_id = parsed
            .message_id
            .or_else(|| parsed.message_ids.into_iter().next())
            .ok_or_else(|| TransportError::InvalidResponse("missing messageId".into()))?;

        debug!(
            template_id = email.template_id,
            message_id = %message_id,
            scheduled = email.scheduled_at.is_some(),
            "Brevo accepted email"
        );
        Ok(message_id)
    }

    async fn cancel_scheduled(&self, message_id: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .delete(self.endpoint(&["smtp", "email", message_id])?)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(http_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn get_contact(&self, email: &str) -> Result<Option<Contact>, TransportError> {
        let response = self
            .client
            .get(self.endpoint(&["contacts", email])?)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(http_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<Contact>()
                .await
                .map(Some)
                .map_err(|e| TransportError::InvalidResponse(e.to_string())),
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn add_contact_to_list(
        &self,
        email: &str,
        list_id: Option<i64>,
        attributes: &Map<String, Value>,
    ) -> Result<bool, TransportError> {
        let body = UpsertContactBody {
            email,
            attributes,
            list_ids: list_id.into_iter().collect(),
            update_enabled: true,
        };

        let response = self
            .client
            .post(self.endpoint(&["contacts"])?)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;

        if response.status().is_success() {
            Ok(true)
        } else {
            Err(Self::api_error(response).await)
        }
    }
}
