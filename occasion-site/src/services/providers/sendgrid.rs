//! SendGrid Mail Send API client.
//!
//! Sends dynamic-template emails with a single personalization that lists
//! every recipient. Authentication is a bearer API key.

use super::{MailProvider, ProviderError, ProviderReply, TemplatedEmail};
use crate::config::SendGridConfig;
use crate::models::TemplateData;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::time::Duration;

pub const MESSAGE_ID_HEADER: &str = "x-message-id";

pub struct SendGridProvider {
    client: Client,
    api_url: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct MailSendRequest<'a> {
    from: Address<'a>,
    personalizations: Vec<Personalization<'a>>,
    template_id: &'a str,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
    dynamic_template_data: &'a TemplateData,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

impl<'a> From<&'a TemplatedEmail> for MailSendRequest<'a> {
    fn from(email: &'a TemplatedEmail) -> Self {
        MailSendRequest {
            from: Address {
                email: &email.from_email,
            },
            personalizations: vec![Personalization {
                to: email
                    .recipients
                    .iter()
                    .map(|to| Address { email: to })
                    .collect(),
                dynamic_template_data: &email.data,
            }],
            template_id: &email.template_id,
        }
    }
}

impl SendGridProvider {
    pub fn new(config: &SendGridConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            timeout: config.timeout,
        })
    }

    fn map_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            ProviderError::Transport(format!("Failed to reach SendGrid: {}", e))
        }
    }
}

#[async_trait]
impl MailProvider for SendGridProvider {
    fn name(&self) -> &'static str {
        "sendgrid"
    }

    async fn send(
        &self,
        api_key: &Secret<String>,
        email: &TemplatedEmail,
    ) -> Result<ProviderReply, ProviderError> {
        let request = MailSendRequest::from(email);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        let message_id = response
            .headers()
            .get(MESSAGE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = if status.is_success() {
            String::new()
        } else {
            response.text().await.map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout)
                } else {
                    ProviderError::InvalidResponse(format!(
                        "Failed to read SendGrid response: {}",
                        e
                    ))
                }
            })?
        };

        tracing::debug!(status = %status, message_id = ?message_id, "SendGrid mail send response");

        Ok(ProviderReply {
            status,
            message_id,
            body,
        })
    }
}
