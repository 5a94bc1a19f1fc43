//! HTTP handlers for the occasion site.

pub mod health;
pub mod notification;
pub mod site;

pub use health::{health_check, metrics_endpoint};
pub use notification::{function_method_not_allowed, send_notification, MAX_BODY_BYTES};
pub use site::{dispatch, method_not_allowed};
