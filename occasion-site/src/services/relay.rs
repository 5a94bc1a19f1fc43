//! Coupon redemption relay.
//!
//! Turns one inbound redemption event into one templated email request at
//! the mail provider and maps the outcome to a [`NotificationResult`].
//! Every failure is terminal for the request: nothing is retried, queued
//! or remembered.

use crate::config::{MissingSettings, ProviderConfig, RelaySettings};
use crate::models::{NotificationRequest, NotificationResult};
use crate::services::metrics::{record_notification, record_provider_call};
use crate::services::providers::{MailProvider, ProviderError, TemplatedEmail};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Missing required SendGrid environment variables")]
    Configuration(#[from] MissingSettings),

    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("SendGrid request failed")]
    Rejected {
        status: StatusCode,
        body: String,
        message_id: Option<String>,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Rejected { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            RelayError::Configuration(_) => "misconfigured",
            RelayError::Rejected { .. } => "rejected",
            RelayError::InvalidBody(_) | RelayError::Provider(_) => "failed",
        }
    }

    pub fn to_result(&self) -> NotificationResult {
        match self {
            RelayError::Configuration(missing) => {
                NotificationResult::failed(self.to_string(), Some(missing.to_string()), None)
            }
            RelayError::Rejected {
                body, message_id, ..
            } => NotificationResult::failed(
                self.to_string(),
                Some(body.clone()),
                message_id.clone(),
            ),
            RelayError::InvalidBody(e) => NotificationResult::failed(
                "Server error while sending email",
                Some(e.to_string()),
                None,
            ),
            RelayError::Provider(e) => NotificationResult::failed(
                "Server error while sending email",
                Some(e.to_string()),
                None,
            ),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_result())).into_response()
    }
}

/// A send the provider accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message_id: Option<String>,
}

#[derive(Clone)]
pub struct NotificationRelay {
    provider: Arc<dyn MailProvider>,
}

impl NotificationRelay {
    pub fn new(provider: Arc<dyn MailProvider>) -> Self {
        Self { provider }
    }

    /// Relay a raw request body. Settings are checked before the body is
    /// parsed, and neither failure reaches the provider.
    pub async fn relay_body(
        &self,
        settings: &RelaySettings,
        body: &[u8],
    ) -> Result<Delivery, RelayError> {
        let result = match settings.resolve() {
            Ok(config) => match NotificationRequest::from_json(body) {
                Ok(request) => self.send(request, &config).await,
                Err(e) => Err(RelayError::from(e)),
            },
            Err(missing) => {
                tracing::error!(error = %missing, "Relay is not configured");
                Err(RelayError::from(missing))
            }
        };

        record_notification(match &result {
            Ok(_) => "delivered",
            Err(e) => e.outcome(),
        });

        result
    }

    /// Build the templated email for `request` and hand it to the provider
    /// exactly once.
    pub async fn send(
        &self,
        request: NotificationRequest,
        config: &ProviderConfig,
    ) -> Result<Delivery, RelayError> {
        let email = TemplatedEmail::new(config, request.into_template_data(Utc::now()));
        let provider = self.provider.name();

        let reply = match self.provider.send(&config.api_key, &email).await {
            Ok(reply) => reply,
            Err(e) => {
                record_provider_call(provider, "error");
                tracing::error!(provider, error = %e, "Mail provider call failed");
                return Err(e.into());
            }
        };

        record_provider_call(provider, reply.status.as_str());

        if !reply.status.is_success() {
            tracing::warn!(
                provider,
                status = %reply.status,
                message_id = ?reply.message_id,
                "Mail provider rejected the send"
            );
            return Err(RelayError::Rejected {
                status: reply.status,
                body: reply.body,
                message_id: reply.message_id,
            });
        }

        tracing::info!(
            provider,
            message_id = ?reply.message_id,
            recipients = email.recipients.len(),
            coupon_title = %email.data.coupon_title,
            "Notification relayed"
        );

        Ok(Delivery {
            message_id: reply.message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::DEFAULT_COUPON_TITLE;
    use crate::services::providers::MockMailProvider;
    use secrecy::Secret;

    fn settings() -> RelaySettings {
        RelaySettings {
            api_key: Some(Secret::new("SG.test".to_string())),
            template_id: Some("d-template".to_string()),
            from_email: Some("from@example.com".to_string()),
            recipients: vec!["a@x.com".to_string(), "b@y.com".to_string()],
        }
    }

    fn relay_with(provider: &Arc<MockMailProvider>) -> NotificationRelay {
        NotificationRelay::new(provider.clone())
    }

    #[tokio::test]
    async fn accepted_send_returns_message_id() {
        let provider = Arc::new(MockMailProvider::new());
        let relay = relay_with(&provider);

        let delivery = relay
            .relay_body(&settings(), br#"{"coupon_title": "Picnic"}"#)
            .await
            .unwrap();

        assert_eq!(delivery.message_id.as_deref(), Some("mock-email-1"));
        let sent = provider.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data.coupon_title, "Picnic");
        assert_eq!(sent[0].recipients, vec!["a@x.com", "b@y.com"]);
        assert_eq!(sent[0].template_id, "d-template");
        assert_eq!(sent[0].from_email, "from@example.com");
    }

    #[tokio::test]
    async fn missing_recipients_short_circuit() {
        let provider = Arc::new(MockMailProvider::new());
        let relay = relay_with(&provider);
        let settings = RelaySettings {
            recipients: Vec::new(),
            ..settings()
        };

        let err = relay.relay_body(&settings, b"{}").await.unwrap_err();

        assert!(matches!(err, RelayError::Configuration(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_result().success);
        assert_eq!(provider.send_count(), 0);
    }

    #[tokio::test]
    async fn configuration_is_checked_before_the_body() {
        let provider = Arc::new(MockMailProvider::new());
        let relay = relay_with(&provider);

        let err = relay
            .relay_body(&RelaySettings::default(), b"{not json")
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Configuration(_)));
    }

    #[tokio::test]
    async fn malformed_body_never_reaches_the_provider() {
        let provider = Arc::new(MockMailProvider::new());
        let relay = relay_with(&provider);

        let err = relay.relay_body(&settings(), b"{not json").await.unwrap_err();
        let result = err.to_result();

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!result.success);
        assert!(result.details.unwrap().contains("key must be a string"));
        assert_eq!(provider.send_count(), 0);
    }

    #[tokio::test]
    async fn provider_rejection_passes_status_through() {
        let provider = Arc::new(MockMailProvider::with_status(StatusCode::TOO_MANY_REQUESTS));
        let relay = relay_with(&provider);

        let err = relay.relay_body(&settings(), b"").await.unwrap_err();
        let result = err.to_result();

        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(result.error.as_deref(), Some("SendGrid request failed"));
        assert_eq!(
            result.details.as_deref(),
            Some("mock provider rejected send #1")
        );
        assert_eq!(provider.sent()[0].data.coupon_title, DEFAULT_COUPON_TITLE);
    }

    #[tokio::test]
    async fn repeated_requests_are_sent_independently() {
        let provider = Arc::new(MockMailProvider::new());
        let relay = relay_with(&provider);
        let body = br#"{"coupon_title": "Picnic", "timestamp": "now"}"#;

        let first = relay.relay_body(&settings(), body).await.unwrap();
        let second = relay.relay_body(&settings(), body).await.unwrap();

        assert_eq!(provider.send_count(), 2);
        assert_ne!(first.message_id, second.message_id);
    }
}
