pub mod notification;

pub use notification::{NotificationRequest, NotificationResult, TemplateData};
