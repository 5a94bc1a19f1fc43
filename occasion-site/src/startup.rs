//! Application startup and lifecycle management.
//!
//! The site listener serves the relay route and static assets. An optional
//! second listener serves health and metrics for operators.

use crate::config::{RelaySettings, SiteConfig};
use crate::handlers::{
    dispatch, function_method_not_allowed, health_check, metrics_endpoint, send_notification,
    MAX_BODY_BYTES,
};
use crate::services::{
    MailProvider, MockMailProvider, NotificationRelay, SendGridProvider, StaticFiles,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub const RELAY_ROUTE: &str = "/api/send-notification";

/// Shared application state. Everything in it is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub relay: NotificationRelay,
    pub relay_settings: Arc<RelaySettings>,
    pub static_files: Arc<StaticFiles>,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn MailProvider>,
        relay_settings: RelaySettings,
        static_files: StaticFiles,
    ) -> Self {
        Self {
            relay: NotificationRelay::new(provider),
            relay_settings: Arc::new(relay_settings),
            static_files: Arc::new(static_files),
        }
    }
}

/// Site router: `POST` on the relay route relays, everything else is
/// dispatched to the static responder or rejected with 405.
pub fn site_router(state: AppState) -> Router {
    Router::new()
        .route(
            RELAY_ROUTE,
            post(send_notification)
                .fallback(dispatch)
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The relay as a standalone function endpoint, for platforms that route
/// one path to one handler. A platform adapter serves it on its own
/// listener with `axum::serve`, the way [`Application`] serves `site_router`.
pub fn function_router(state: AppState) -> Router {
    Router::new()
        .route(
            RELAY_ROUTE,
            post(send_notification)
                .fallback(function_method_not_allowed)
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn ops_router() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .layer(TraceLayer::new_for_http())
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    ops_port: Option<u16>,
    listener: TcpListener,
    ops_listener: Option<TcpListener>,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: SiteConfig) -> Result<Self, AppError> {
        let provider: Arc<dyn MailProvider> = if config.sendgrid.enabled {
            let provider = SendGridProvider::new(&config.sendgrid).map_err(|e| {
                tracing::error!("Failed to initialize SendGrid provider: {}", e);
                AppError::ConfigError(anyhow::anyhow!(e))
            })?;
            tracing::info!(
                api_url = %config.sendgrid.api_url,
                timeout_secs = config.sendgrid.timeout.as_secs(),
                "SendGrid provider initialized"
            );
            Arc::new(provider)
        } else {
            tracing::info!("SendGrid provider disabled, using mock mail provider");
            Arc::new(MockMailProvider::new())
        };

        match config.relay.resolve() {
            Ok(provider_config) => tracing::info!(
                recipients = provider_config.recipients.len(),
                "Notification relay configured"
            ),
            Err(missing) => tracing::warn!(
                error = %missing,
                "Notification relay is not configured; sends will fail until it is"
            ),
        }

        let static_files = StaticFiles::new(&config.content.root, &config.content.index_document)
            .map_err(|e| {
                tracing::error!(
                    "Content root {} is not usable: {}",
                    config.content.root.display(),
                    e
                );
                AppError::ConfigError(anyhow::anyhow!(
                    "content root {}: {}",
                    config.content.root.display(),
                    e
                ))
            })?;

        let state = AppState::new(provider, config.relay.clone(), static_files);

        // port 0 = random port for testing
        let addr = format!("{}:{}", config.common.host, config.common.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind site listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let ops_listener = match config.common.ops_port {
            Some(ops_port) => {
                let ops_addr = format!("{}:{}", config.common.host, ops_port);
                let listener = TcpListener::bind(&ops_addr).await.map_err(|e| {
                    tracing::error!("Failed to bind ops listener to {}: {}", ops_addr, e);
                    AppError::from(e)
                })?;
                Some(listener)
            }
            None => None,
        };
        let ops_port = match &ops_listener {
            Some(listener) => Some(listener.local_addr()?.port()),
            None => None,
        };

        tracing::info!(
            port,
            ops_port = ?ops_port,
            content_root = %state.static_files.root().display(),
            "Occasion site listening"
        );

        Ok(Self {
            port,
            ops_port,
            listener,
            ops_listener,
            state,
        })
    }

    /// Get the port the site is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the port the ops listener is bound to, if enabled.
    pub fn ops_port(&self) -> Option<u16> {
        self.ops_port
    }

    /// Run the application until stopped.
    ///
    /// Serves the site and, when enabled, the ops listener concurrently.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let site = axum::serve(self.listener, site_router(self.state));

        let Some(ops_listener) = self.ops_listener else {
            return site.await.map_err(|e| {
                tracing::error!("Site server error: {}", e);
                e
            });
        };

        tokio::select! {
            result = site => {
                if let Err(e) = result {
                    tracing::error!("Site server error: {}", e);
                    return Err(e);
                }
            }
            result = axum::serve(ops_listener, ops_router()) => {
                if let Err(e) = result {
                    tracing::error!("Ops server error: {}", e);
                    return Err(e);
                }
            }
        }

        Ok(())
    }
}
