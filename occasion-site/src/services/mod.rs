pub mod metrics;
pub mod providers;
pub mod relay;
pub mod static_files;

pub use metrics::{get_metrics, init_metrics, record_notification, record_provider_call};
pub use providers::{
    MailProvider, MockMailProvider, ProviderError, ProviderReply, SendGridProvider,
    TemplatedEmail,
};
pub use relay::{Delivery, NotificationRelay, RelayError};
pub use static_files::{StaticAsset, StaticError, StaticFiles};
