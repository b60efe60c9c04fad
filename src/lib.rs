pub mod candidate;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod forwarder;
pub mod handlers;
pub mod middleware;
pub mod rate_limiter;
pub mod response;
pub mod server;
pub mod signer;
pub mod validation;
pub mod verifier;

pub use candidate::{normalize, Candidate};
pub use config::Config;
pub use error::ApiError;
pub use handlers::{AppState, SharedState};
pub use rate_limiter::RateLimiter;
pub use server::{create_app, Server};
pub use signer::SubmissionSigner;
