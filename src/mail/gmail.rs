//! Gmail REST implementation of [`MessageSource`].
//!
//! Token acquisition and refresh happen elsewhere; this client only attaches
//! a ready bearer token to each request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::SourceError;
use crate::mail::source::MessageSource;
use crate::mail::types::{ListPage, RawMessage};

pub const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// `error.errors[].reason` values Gmail sends with a 403 when a per-user or
/// per-project quota window is exhausted.
const RATE_LIMIT_REASONS: &[&str] = &["rateLimitExceeded", "userRateLimitExceeded"];

/// Gmail message source for the authenticated user (`users/me`).
pub struct GmailSource {
    client: Client,
    api_base: String,
    access_token: SecretString,
}

impl GmailSource {
    pub fn new(api_base: impl Into<String>, access_token: SecretString) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/users/me/messages", self.api_base)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        subject: &str,
    ) -> Result<T, SourceError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(self.access_token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(from_transport)?;

        let response = check_status(response, subject).await?;
        let body = response.bytes().await.map_err(from_transport)?;
        serde_json::from_slice(&body)
            .map_err(|e| SourceError::InvalidResponse(format!("{subject}: {e}")))
    }
}

#[async_trait]
impl MessageSource for GmailSource {
    fn name(&self) -> &str {
        "gmail"
    }

    async fn list_page(
        &self,
        query: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<ListPage, SourceError> {
        let mut params = vec![("maxResults", page_size.to_string())];
        if !query.is_empty() {
            params.push(("q", query.to_string()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let page: ListPage = self
            .get_json(&self.messages_url(), &params, "message listing")
            .await?;
        debug!(
            count = page.messages.len(),
            has_next = page.next_page_token.is_some(),
            "Listed message page"
        );
        Ok(page)
    }

    async fn fetch_message(&self, id: &str) -> Result<RawMessage, SourceError> {
        let url = format!("{}/{id}", self.messages_url());
        self.get_json(&url, &[("format", "full".to_string())], id)
            .await
    }
}

/// Map a non-success HTTP status onto the source error taxonomy.
async fn check_status(response: Response, subject: &str) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();

    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited { retry_after },
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => SourceError::Unavailable {
            status: status.as_u16(),
        },
        StatusCode::FORBIDDEN if is_rate_limit_body(&body) => {
            SourceError::RateLimited { retry_after }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SourceError::Auth(format!("HTTP {}: {}", status.as_u16(), truncate(&body)))
        }
        StatusCode::NOT_FOUND => SourceError::NotFound(subject.to_string()),
        other => SourceError::InvalidResponse(format!(
            "{subject}: HTTP {}: {}",
            other.as_u16(),
            truncate(&body)
        )),
    })
}

// ── Error body ──────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    errors: Vec<ErrorReason>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorReason {
    #[serde(default)]
    reason: String,
}

/// True when a Google API error body names a rate-limit reason.
fn is_rate_limit_body(body: &str) -> bool {
    serde_json::from_str::<ErrorEnvelope>(body).is_ok_and(|envelope| {
        envelope
            .error
            .errors
            .iter()
            .any(|e| RATE_LIMIT_REASONS.contains(&e.reason.as_str()))
    })
}

fn from_transport(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Network(err.to_string())
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
