use crate::config::Config;

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates an outbound URL
    pub fn validate_url(name: &str, url: &str) -> Result<(), String> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!("{} must start with 'http://' or 'https://'", name));
        }

        Ok(())
    }

    /// Validates an origin such as `https://app.example`
    pub fn validate_origin(origin: &str) -> Result<(), String> {
        Self::validate_url("PUBLIC_ORIGIN", origin)?;

        let rest = origin.split_once("://").map(|(_, rest)| rest).unwrap_or_default();
        if rest.is_empty() || rest.contains('/') {
            return Err("PUBLIC_ORIGIN must be scheme://host[:port] without a path".to_string());
        }

        Ok(())
    }

    /// Validates rate limit parameters
    pub fn validate_rate_limit(capacity: u32, window_secs: u64) -> Result<(), String> {
        if capacity == 0 {
            return Err("Rate limit capacity must be greater than 0".to_string());
        }

        if window_secs == 0 {
            return Err("Rate limit window must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Validates the whole configuration. Missing upstream settings are not errors here;
    /// the affected route answers 500 instead.
    pub fn validate_config(config: &Config) -> Result<(), String> {
        Self::validate_rate_limit(config.rate_limit_capacity, config.rate_limit_window_secs)?;

        if config.rate_limit_sweep_secs == 0 {
            return Err("Sweep interval must be greater than 0".to_string());
        }

        if config.upstream_timeout_secs == 0 {
            return Err("Upstream timeout must be greater than 0".to_string());
        }

        if let Some(origin) = config.public_origin() {
            Self::validate_origin(origin)?;
        }
        if let Some(url) = config.read_url() {
            Self::validate_url("N8N_READ_URL", url)?;
        }
        if let Some(url) = config.webhook_url() {
            Self::validate_url("N8N_WEBHOOK_URL", url)?;
        }
        Self::validate_url("TURNSTILE_VERIFY_URL", &config.turnstile_verify_url)?;

        Ok(())
    }
}
