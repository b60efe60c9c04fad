//! Outbound calls to the n8n workflow.
//!
//! Every call is single-shot. Failures are mapped onto [`ApiError::Upstream`] so the
//! handler can answer 502 without inspecting reqwest errors itself.

use crate::error::{truncate_diagnostic, ApiError, MAX_DIAGNOSTIC_CHARS};
use crate::signer::{SignedPayload, PAYLOAD_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use axum::body::Bytes;
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;

/// Largest candidate feed accepted from the read workflow.
pub const MAX_FEED_BYTES: usize = 8 * 1024 * 1024;

/// Enough bytes to hold `MAX_DIAGNOSTIC_CHARS` characters of any UTF-8 text.
const MAX_DIAGNOSTIC_BYTES: usize = MAX_DIAGNOSTIC_CHARS * 4;

/// A validated submission as it is handed to the webhook.
#[derive(Debug, Clone)]
pub struct ForwardedSubmission {
    pub name: String,
    pub email: String,
    pub job_title: String,
    pub timestamp: String,
    pub ip: String,
    pub user_agent: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Clone)]
pub struct UpstreamForwarder {
    client: Client,
}

impl UpstreamForwarder {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("resumrr/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET the candidate feed and parse it as JSON.
    pub async fn fetch_candidates(&self, url: &str, auth: Option<&str>) -> Result<Value, ApiError> {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-store");
        if let Some(auth) = auth {
            request = request.header(AUTHORIZATION, auth);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "Candidate feed unreachable");
            ApiError::upstream("Upstream error")
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = read_diagnostic(response).await;
            return Err(ApiError::Upstream {
                message: "Upstream returned error".to_string(),
                status: Some(status.as_u16()),
                body: Some(truncate_diagnostic(&body)),
            });
        }

        let (body, truncated) = read_capped(response, MAX_FEED_BYTES).await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to read candidate feed body");
            ApiError::upstream("Upstream error")
        })?;
        if truncated {
            tracing::warn!(limit = MAX_FEED_BYTES, "Candidate feed exceeds size limit");
            return Err(ApiError::upstream("Upstream response too large"));
        }

        serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(error = %e, "Candidate feed returned non-JSON body");
            ApiError::upstream("Invalid upstream JSON")
        })
    }

    /// POST the submission as multipart with the signature headers attached.
    pub async fn forward_submission(
        &self,
        url: &str,
        submission: ForwardedSubmission,
        signed: &SignedPayload,
    ) -> Result<(), ApiError> {
        let resume = Part::bytes(submission.bytes.to_vec())
            .file_name(submission.file_name)
            .mime_str(&submission.content_type)
            .map_err(|_| ApiError::bad_request("Unsupported file type"))?;

        let form = Form::new()
            .text("name", submission.name)
            .text("email", submission.email)
            .text("jobTitle", submission.job_title)
            .text("timestamp", submission.timestamp)
            .text("ip", submission.ip)
            .text("userAgent", submission.user_agent)
            .part("resume", resume);

        let response = self
            .client
            .post(url)
            .header(PAYLOAD_HEADER, &signed.payload)
            .header(SIGNATURE_HEADER, &signed.signature)
            .header(TIMESTAMP_HEADER, &signed.timestamp)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Webhook unreachable");
                ApiError::upstream("Failed to reach n8n")
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = read_diagnostic(response).await;
            let detail = if text.trim().is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                truncate_diagnostic(&text)
            };
            return Err(ApiError::Upstream {
                message: format!("n8n error: {}", detail),
                status: Some(status.as_u16()),
                body: None,
            });
        }

        tracing::info!(status = %status, "Submission forwarded");
        Ok(())
    }
}

/// Leading part of an error body, enough for the truncated echo. Unreadable bodies are empty.
async fn read_diagnostic(response: Response) -> String {
    read_capped(response, MAX_DIAGNOSTIC_BYTES)
        .await
        .map(|(bytes, _)| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Read at most `limit` bytes of the body. The flag is set when the body was longer.
async fn read_capped(mut response: Response, limit: usize) -> Result<(Vec<u8>, bool), reqwest::Error> {
    let mut buf = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit - buf.len();
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            return Ok((buf, true));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok((buf, false))
}
