use crate::candidate::Candidate;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatesResponse {
    pub ok: bool,
    pub updated_at: String,
    pub data: Vec<Candidate>,
}

impl CandidatesResponse {
    pub fn new(data: Vec<Candidate>) -> Self {
        Self {
            ok: true,
            updated_at: crate::candidate::now_iso(),
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub ok: bool,
}

impl SubmitResponse {
    pub fn accepted() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub rate_limit_buckets: usize,
}

impl HealthResponse {
    pub fn healthy(rate_limit_buckets: usize) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            rate_limit_buckets,
        }
    }
}
