use super::{MailProvider, ProviderError, ProviderReply, TemplatedEmail};
use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::Secret;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Mock mail provider for local development and testing.
///
/// Logs instead of sending and answers every call with a fixed status.
pub struct MockMailProvider {
    status: StatusCode,
    send_count: AtomicU64,
    sent: Mutex<Vec<TemplatedEmail>>,
}

impl MockMailProvider {
    pub fn new() -> Self {
        Self::with_status(StatusCode::ACCEPTED)
    }

    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            send_count: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    /// Every email handed to this provider, oldest first.
    pub fn sent(&self) -> Vec<TemplatedEmail> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl Default for MockMailProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailProvider for MockMailProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn send(
        &self,
        _api_key: &Secret<String>,
        email: &TemplatedEmail,
    ) -> Result<ProviderReply, ProviderError> {
        let count = self.send_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }

        tracing::info!(
            recipients = email.recipients.len(),
            template_id = %email.template_id,
            coupon_title = %email.data.coupon_title,
            "[MOCK] Email would be sent"
        );

        if self.status.is_success() {
            Ok(ProviderReply {
                status: self.status,
                message_id: Some(format!("mock-email-{}", count)),
                body: String::new(),
            })
        } else {
            Ok(ProviderReply {
                status: self.status,
                message_id: None,
                body: format!("mock provider rejected send #{}", count),
            })
        }
    }
}
