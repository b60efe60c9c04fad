use crate::config::Config;
use crate::error::ApiError;
use axum::body::Bytes;
use axum::http::{header, HeaderMap};
use regex::Regex;
use std::sync::LazyLock;
use validator::Validate;

/// Largest accepted resume, in bytes
pub const MAX_RESUME_BYTES: usize = 10 * 1024 * 1024;

pub const ALLOWED_RESUME_TYPES: [&str; 3] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_.-]").expect("valid filename pattern"));

static UNDERSCORE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("valid underscore pattern"));

/// Uploaded resume as received from the client
#[derive(Debug, Clone, Default)]
pub struct ResumeFile {
    /// `None` when the part was a plain text field rather than a file
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Submission form fields, already trimmed
#[derive(Debug, Clone, Default, Validate)]
pub struct SubmissionForm {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub job_title: String,
    /// Honeypot; real visitors never see this field
    pub company: String,
    pub turnstile_token: String,
    pub resume: Option<ResumeFile>,
}

/// Request guard checks shared by the intake and dashboard-data routes
pub struct RequestValidator;

impl RequestValidator {
    /// The origin this server is reachable at. `PUBLIC_ORIGIN` wins over request headers.
    pub fn expected_origin(headers: &HeaderMap, config: &Config) -> Option<String> {
        if let Some(origin) = config.public_origin() {
            return Some(origin.to_string());
        }

        let host = header_str(headers, "x-forwarded-host")
            .or_else(|| header_str(headers, header::HOST.as_str()))?;
        let proto = header_str(headers, "x-forwarded-proto").unwrap_or("http");
        let host = host.split(',').next().unwrap_or(host).trim();
        let proto = proto.split(',').next().unwrap_or(proto).trim();

        Some(format!("{}://{}", proto, host))
    }

    /// Rejects requests whose `Origin` (and, when `check_referer`, `Referer`) points elsewhere.
    /// Absent headers pass.
    pub fn check_same_origin(
        headers: &HeaderMap,
        expected: Option<&str>,
        check_referer: bool,
    ) -> Result<(), ApiError> {
        let origin = header_str(headers, header::ORIGIN.as_str());
        let referer = if check_referer {
            header_str(headers, header::REFERER.as_str())
        } else {
            None
        };

        if origin.is_none() && referer.is_none() {
            return Ok(());
        }

        let Some(expected) = expected else {
            tracing::warn!("Cannot determine own origin, rejecting cross-origin checked request");
            return Err(ApiError::Forbidden);
        };

        if let Some(origin) = origin {
            if origin != expected {
                tracing::warn!(origin, "Rejected request from foreign origin");
                return Err(ApiError::Forbidden);
            }
        }

        if let Some(referer) = referer {
            if !Self::referer_matches(referer, expected) {
                tracing::warn!(referer, "Rejected request with foreign referer");
                return Err(ApiError::Forbidden);
            }
        }

        Ok(())
    }

    // prefix match must end on the origin boundary so `https://app.example.evil` fails
    fn referer_matches(referer: &str, expected: &str) -> bool {
        match referer.strip_prefix(expected) {
            Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
            None => false,
        }
    }

    /// Validates a submission in a fixed order and returns the resume on success.
    pub fn validate_submission(form: &SubmissionForm) -> Result<&ResumeFile, ApiError> {
        // honeypot reason is never revealed
        if !form.company.is_empty() {
            tracing::info!("Honeypot field filled, dropping submission");
            return Err(ApiError::bad_request("Bad request"));
        }

        let resume = match (form.validate(), &form.resume) {
            (Ok(()), Some(resume)) => resume,
            _ => return Err(ApiError::bad_request("Missing required fields")),
        };

        if !is_valid_email(&form.email) {
            return Err(ApiError::bad_request("Invalid email"));
        }

        if resume.file_name.is_none() {
            return Err(ApiError::bad_request("Invalid file"));
        }

        let content_type = resume.content_type.as_deref().unwrap_or_default();
        if !ALLOWED_RESUME_TYPES.contains(&content_type) {
            return Err(ApiError::bad_request("Unsupported file type"));
        }

        if resume.bytes.len() > MAX_RESUME_BYTES {
            return Err(ApiError::PayloadTooLarge("File too large (max 10MB)".to_string()));
        }

        Ok(resume)
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// `<millis>_<name>` with unsafe characters replaced and underscore runs collapsed.
pub fn sanitize_filename(name: &str, timestamp_ms: i64) -> String {
    let name = if name.is_empty() { "resume" } else { name };
    let replaced = UNSAFE_FILENAME_CHARS.replace_all(name, "_");
    let collapsed = UNDERSCORE_RUNS.replace_all(&replaced, "_");
    format!("{}_{}", timestamp_ms, collapsed)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
