use crate::error::ApiError;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Cloudflare Turnstile token check. Only constructed when a secret is configured.
#[derive(Clone)]
pub struct TurnstileVerifier {
    client: Client,
    secret: String,
    verify_url: String,
}

impl TurnstileVerifier {
    pub fn new(client: Client, secret: impl Into<String>, verify_url: impl Into<String>) -> Self {
        Self {
            client,
            secret: secret.into(),
            verify_url: verify_url.into(),
        }
    }

    pub async fn verify(&self, token: &str, remote_ip: &str) -> Result<(), ApiError> {
        if token.is_empty() {
            return Err(ApiError::bad_request("Turnstile token missing"));
        }

        let params = [
            ("secret", self.secret.as_str()),
            ("response", token),
            ("remoteip", remote_ip),
        ];

        let verdict: SiteverifyResponse = self
            .client
            .post(&self.verify_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Turnstile unreachable");
                ApiError::upstream("Turnstile verification error")
            })?
            .json()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Turnstile returned an unreadable verdict");
                ApiError::upstream("Turnstile verification error")
            })?;

        if !verdict.success {
            tracing::info!(error_codes = ?verdict.error_codes, "Turnstile rejected token");
            return Err(ApiError::bad_request("Turnstile verification failed"));
        }

        Ok(())
    }
}
