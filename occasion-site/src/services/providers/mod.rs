pub mod mock;
pub mod sendgrid;

use crate::config::ProviderConfig;
use crate::models::TemplateData;
use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::Secret;
use std::time::Duration;
use thiserror::Error;

pub use mock::MockMailProvider;
pub use sendgrid::SendGridProvider;

/// Failures of the outbound call itself. A provider that answers with an
/// error status is not one of these; see [`ProviderReply`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Provider did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Connection error: {0}")]
    Transport(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// A templated email fanned out to every configured recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplatedEmail {
    pub from_email: String,
    pub recipients: Vec<String>,
    pub template_id: String,
    pub data: TemplateData,
}

impl TemplatedEmail {
    pub fn new(config: &ProviderConfig, data: TemplateData) -> Self {
        Self {
            from_email: config.from_email.clone(),
            recipients: config.recipients.clone(),
            template_id: config.template_id.clone(),
            data,
        }
    }
}

/// What the provider answered, success or not.
#[derive(Debug, Clone)]
pub struct ProviderReply {
    pub status: StatusCode,
    pub message_id: Option<String>,
    /// Response body, only read when the status is not a success.
    pub body: String,
}

#[async_trait]
pub trait MailProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Issue exactly one send request. Never retries.
    async fn send(
        &self,
        api_key: &Secret<String>,
        email: &TemplatedEmail,
    ) -> Result<ProviderReply, ProviderError>;
}
