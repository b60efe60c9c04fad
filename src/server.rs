use crate::config::Config;
use crate::handlers::{
    dashboard, health_check, landing, not_found, recruiter_data, submit, AppState, SharedState,
};
use crate::middleware::logging_middleware;
use crate::rate_limiter::spawn_sweeper;
use crate::validation::MAX_RESUME_BYTES;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Room for the text fields and multipart framing around a maximum-size resume
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the router around an existing state
pub fn create_app(state: SharedState) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/r/:key", get(dashboard))
        .route("/api/recruiter/data", get(recruiter_data))
        .route(
            "/api/submit",
            post(submit).layer(DefaultBodyLimit::max(MAX_RESUME_BYTES + FORM_OVERHEAD_BYTES)),
        )
        .route("/health", get(health_check))
        .fallback(not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(logging_middleware))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("no-referrer"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                )),
        )
}

pub struct Server {
    app: Router,
    state: SharedState,
    bind_addr: SocketAddr,
    sweep_interval: Duration,
}

impl Server {
    pub fn new(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let bind_addr = config.bind_addr;
        let sweep_interval = config.sweep_interval();
        let state: SharedState = Arc::new(AppState::new(config)?);
        let app = create_app(state.clone());

        Ok(Self {
            app,
            state,
            bind_addr,
            sweep_interval,
        })
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        let config = &self.state.config;
        tracing::info!("Resumrr server listening on {}", self.bind_addr);
        tracing::info!(
            read_proxy = config.read_url().is_some(),
            write_proxy = config.webhook_url().is_some() && config.webhook_secret().is_some(),
            turnstile = self.state.verifier.is_some(),
            dashboard = config.recruiter_key().is_some(),
            "Feature configuration"
        );

        let sweeper = spawn_sweeper(self.state.rate_limiter.clone(), self.sweep_interval);

        // Run server with graceful shutdown
        let result = axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        sweeper.abort();
        result?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
