use axum::{
    extract::{multipart::MultipartError, ConnectInfo, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use constant_time_eq::constant_time_eq;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::candidate::normalize;
use crate::config::Config;
use crate::error::ApiError;
use crate::forwarder::{ForwardedSubmission, UpstreamForwarder};
use crate::middleware::client_ip;
use crate::rate_limiter::RateLimiter;
use crate::response::{CandidatesResponse, HealthResponse, SubmitResponse};
use crate::signer::{SubmissionMetadata, SubmissionSigner};
use crate::validation::{sanitize_filename, RequestValidator, ResumeFile, SubmissionForm};
use crate::verifier::TurnstileVerifier;

const LANDING_PAGE: &str = include_str!("../static/index.html");
const DASHBOARD_PAGE: &str = include_str!("../static/dashboard.html");

/// Shared application state
pub type SharedState = Arc<AppState>;

/// Process-wide context built once at startup and handed to every handler
pub struct AppState {
    pub config: Config,
    pub rate_limiter: RateLimiter,
    pub forwarder: UpstreamForwarder,
    pub signer: Option<SubmissionSigner>,
    pub verifier: Option<TurnstileVerifier>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let forwarder = UpstreamForwarder::new(config.upstream_timeout())?;
        Ok(Self::with_forwarder(config, forwarder))
    }

    pub fn with_forwarder(config: Config, forwarder: UpstreamForwarder) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit_capacity, config.rate_limit_window());
        let signer = config.webhook_secret().map(SubmissionSigner::new);
        let verifier = config.turnstile_secret().map(|secret| {
            TurnstileVerifier::new(
                forwarder.client().clone(),
                secret,
                config.turnstile_verify_url.clone(),
            )
        });

        Self {
            config,
            rate_limiter,
            forwarder,
            signer,
            verifier,
        }
    }
}

/// Candidate feed for the dashboard
pub async fn recruiter_data(
    State(state): State<SharedState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let expected = RequestValidator::expected_origin(&headers, &state.config);
    RequestValidator::check_same_origin(&headers, expected.as_deref(), true)?;

    let ip = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    let ip = if ip.is_empty() { "unknown".to_string() } else { ip };
    if !state.rate_limiter.take(&ip) {
        tracing::info!(client_ip = %ip, "Rate limit exceeded");
        return Err(ApiError::RateLimited);
    }

    let url = state.config.read_url().ok_or(ApiError::NotConfigured)?;
    let raw = state
        .forwarder
        .fetch_candidates(url, state.config.read_auth())
        .await?;

    let data = normalize(&raw);
    tracing::debug!(count = data.len(), "Served candidate feed");

    let mut response = Json(CandidatesResponse::new(data)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

/// Resume intake
pub async fn submit(
    State(state): State<SharedState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    let expected = RequestValidator::expected_origin(&headers, &state.config);
    RequestValidator::check_same_origin(&headers, expected.as_deref(), false)?;

    let (Some(webhook_url), Some(signer)) = (state.config.webhook_url(), state.signer.as_ref())
    else {
        return Err(ApiError::NotConfigured);
    };

    let form = read_submission_form(multipart).await?;
    let resume = RequestValidator::validate_submission(&form)?;

    let ip = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));

    if let Some(verifier) = &state.verifier {
        verifier.verify(&form.turnstile_token, &ip).await?;
    }

    let now = chrono::Utc::now().timestamp_millis();
    let timestamp = now.to_string();
    let metadata = SubmissionMetadata {
        name: form.name.clone(),
        email: form.email.clone(),
        job_title: form.job_title.clone(),
        timestamp: timestamp.clone(),
        ip: ip.clone(),
    };
    let signed = signer.sign(&metadata).map_err(|e| {
        tracing::error!(error = %e, "Failed to serialize submission metadata");
        ApiError::Internal
    })?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let submission = ForwardedSubmission {
        name: metadata.name,
        email: metadata.email,
        job_title: metadata.job_title,
        timestamp,
        ip,
        user_agent,
        file_name: sanitize_filename(resume.file_name.as_deref().unwrap_or_default(), now),
        content_type: resume.content_type.clone().unwrap_or_default(),
        bytes: resume.bytes.clone(),
    };

    tracing::info!(
        job_title = %submission.job_title,
        file_name = %submission.file_name,
        size = submission.bytes.len(),
        "Forwarding submission"
    );

    state
        .forwarder
        .forward_submission(webhook_url, submission, &signed)
        .await?;

    Ok(Json(SubmitResponse::accepted()))
}

async fn read_submission_form(mut multipart: Multipart) -> Result<SubmissionForm, ApiError> {
    let mut form = SubmissionForm::default();

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "resume" {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(form_error)?;

            // an empty text field counts as no resume at all
            if file_name.is_none() && bytes.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            form.resume = Some(ResumeFile {
                file_name,
                content_type,
                bytes,
            });
            continue;
        }

        let slot = match name.as_str() {
            "name" => &mut form.name,
            "email" => &mut form.email,
            "jobTitle" => &mut form.job_title,
            "company" => &mut form.company,
            "turnstileToken" => &mut form.turnstile_token,
            _ => continue,
        };
        *slot = field.text().await.map_err(form_error)?.trim().to_string();
    }

    Ok(form)
}

fn form_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("File too large (max 10MB)".to_string())
    } else {
        tracing::debug!(error = %err.body_text(), "Unreadable multipart body");
        ApiError::bad_request("Invalid form submission")
    }
}

/// Dashboard shell, only reachable with the exact recruiter key
pub async fn dashboard(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let authorized = state
        .config
        .recruiter_key()
        .is_some_and(|secret| constant_time_eq(secret.as_bytes(), key.as_bytes()));
    if !authorized {
        return Err(ApiError::NotFound);
    }

    let mut response = Html(DASHBOARD_PAGE).into_response();
    response.headers_mut().insert(
        "x-robots-tag",
        HeaderValue::from_static("noindex, nofollow"),
    );
    Ok(response)
}

/// Landing page with the submission form
pub async fn landing(State(state): State<SharedState>) -> Html<String> {
    let widget = state
        .config
        .turnstile_site_key()
        .map(|site_key| {
            let site_key: String = site_key
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect();
            format!(
                r#"<div class="cf-turnstile" data-sitekey="{}" data-response-field-name="turnstileToken"></div>"#,
                site_key
            )
        })
        .unwrap_or_default();

    Html(LANDING_PAGE.replace("{{TURNSTILE_WIDGET}}", &widget))
}

/// Unknown routes answer exactly like a wrong dashboard key
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    Json(HealthResponse::healthy(state.rate_limiter.len()))
}
