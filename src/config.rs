use envconfig::Envconfig;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_TURNSTILE_VERIFY_URL: &str =
    "https://challenges.cloudflare.com/turnstile/v0/siteverify";

#[derive(Envconfig, Clone)]
pub struct Config {
    /// Server bind address
    #[envconfig(from = "BIND_ADDR", default = "127.0.0.1:3000")]
    pub bind_addr: SocketAddr,

    /// Default tracing level for the crate
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,

    /// Canonical origin used by the same-origin guard, e.g. `https://app.example`
    #[envconfig(from = "PUBLIC_ORIGIN")]
    pub public_origin: Option<String>,

    /// Upstream endpoint serving candidate records
    #[envconfig(from = "N8N_READ_URL")]
    pub read_url: Option<String>,

    /// Authorization header value sent to the read endpoint
    #[envconfig(from = "N8N_READ_AUTH")]
    pub read_auth: Option<String>,

    /// Upstream webhook receiving submissions
    #[envconfig(from = "N8N_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// HMAC key shared with the webhook
    #[envconfig(from = "N8N_WEBHOOK_SECRET")]
    pub webhook_secret: Option<String>,

    /// Turnstile server secret; verification is skipped when unset
    #[envconfig(from = "TURNSTILE_SECRET_KEY")]
    pub turnstile_secret: Option<String>,

    /// Turnstile public site key rendered into the landing page
    #[envconfig(from = "TURNSTILE_SITE_KEY")]
    pub turnstile_site_key: Option<String>,

    #[envconfig(
        from = "TURNSTILE_VERIFY_URL",
        default = "https://challenges.cloudflare.com/turnstile/v0/siteverify"
    )]
    pub turnstile_verify_url: String,

    /// Path secret gating the recruiter dashboard
    #[envconfig(from = "RECRUITER_KEY")]
    pub recruiter_key: Option<String>,

    /// Requests admitted per client IP per window
    #[envconfig(from = "RATE_LIMIT_CAPACITY", default = "30")]
    pub rate_limit_capacity: u32,

    #[envconfig(from = "RATE_LIMIT_WINDOW_SECS", default = "300")]
    pub rate_limit_window_secs: u64,

    /// Interval between sweeps of expired rate limit buckets
    #[envconfig(from = "RATE_LIMIT_SWEEP_SECS", default = "300")]
    pub rate_limit_sweep_secs: u64,

    #[envconfig(from = "UPSTREAM_TIMEOUT_SECS", default = "30")]
    pub upstream_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    pub fn public_origin(&self) -> Option<&str> {
        present(&self.public_origin).map(|origin| origin.trim_end_matches('/'))
    }

    pub fn read_url(&self) -> Option<&str> {
        present(&self.read_url)
    }

    pub fn read_auth(&self) -> Option<&str> {
        present(&self.read_auth)
    }

    pub fn webhook_url(&self) -> Option<&str> {
        present(&self.webhook_url)
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        present(&self.webhook_secret)
    }

    pub fn turnstile_secret(&self) -> Option<&str> {
        present(&self.turnstile_secret)
    }

    pub fn turnstile_site_key(&self) -> Option<&str> {
        present(&self.turnstile_site_key)
    }

    pub fn recruiter_key(&self) -> Option<&str> {
        present(&self.recruiter_key)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_sweep_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

/// Empty values count as unset.
fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            log_level: "info".to_string(),
            public_origin: None,
            read_url: None,
            read_auth: None,
            webhook_url: None,
            webhook_secret: None,
            turnstile_secret: None,
            turnstile_site_key: None,
            turnstile_verify_url: DEFAULT_TURNSTILE_VERIFY_URL.to_string(),
            recruiter_key: None,
            rate_limit_capacity: 30,
            rate_limit_window_secs: 300,
            rate_limit_sweep_secs: 300,
            upstream_timeout_secs: 30,
        }
    }
}

fn redacted(value: &Option<String>) -> &'static str {
    if present(value).is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("public_origin", &self.public_origin)
            .field("read_url", &self.read_url)
            .field("read_auth", &redacted(&self.read_auth))
            .field("webhook_url", &self.webhook_url)
            .field("webhook_secret", &redacted(&self.webhook_secret))
            .field("turnstile_secret", &redacted(&self.turnstile_secret))
            .field("turnstile_site_key", &self.turnstile_site_key)
            .field("turnstile_verify_url", &self.turnstile_verify_url)
            .field("recruiter_key", &redacted(&self.recruiter_key))
            .field("rate_limit_capacity", &self.rate_limit_capacity)
            .field("rate_limit_window_secs", &self.rate_limit_window_secs)
            .field("rate_limit_sweep_secs", &self.rate_limit_sweep_secs)
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .finish()
    }
}
