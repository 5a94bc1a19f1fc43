use secrecy::Secret;
use service_core::config::{self as core_config, EnvSource};
use service_core::error::AppError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3/mail/send";
pub const DEFAULT_SENDGRID_TIMEOUT_SECS: u64 = 10;

pub const SENDGRID_API_KEY: &str = "SENDGRID_API_KEY";
pub const SENDGRID_TEMPLATE_ID: &str = "SENDGRID_TEMPLATE_ID";
pub const SENDGRID_FROM_EMAIL: &str = "SENDGRID_FROM_EMAIL";
pub const NOTIFY_TO_EMAILS: &str = "NOTIFY_TO_EMAILS";
pub const NOTIFY_TO_EMAIL: &str = "NOTIFY_TO_EMAIL";

#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub common: core_config::Config,
    pub content: ContentConfig,
    pub sendgrid: SendGridConfig,
    pub relay: RelaySettings,
}

#[derive(Debug, Clone)]
pub struct ContentConfig {
    pub root: PathBuf,
    pub index_document: String,
}

/// Transport settings for the SendGrid Mail Send API.
#[derive(Debug, Clone)]
pub struct SendGridConfig {
    pub api_url: String,
    pub timeout: Duration,
    /// When false a logging mock stands in for the real provider.
    pub enabled: bool,
}

/// Relay settings as captured at startup. Any of them may be missing;
/// [`RelaySettings::resolve`] decides whether the relay can run.
#[derive(Debug, Clone, Default)]
pub struct RelaySettings {
    pub api_key: Option<Secret<String>>,
    pub template_id: Option<String>,
    pub from_email: Option<String>,
    pub recipients: Vec<String>,
}

/// Fully populated provider settings. Only obtainable through
/// [`RelaySettings::resolve`], so `recipients` is never empty.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Secret<String>,
    pub template_id: String,
    pub from_email: String,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required settings: {}", .0.join(", "))]
pub struct MissingSettings(pub Vec<&'static str>);

impl SiteConfig {
    pub fn load(env: &EnvSource) -> Result<Self, AppError> {
        let common = core_config::Config::load(env)?;

        let timeout_secs = match env.get("SENDGRID_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!(
                    "SENDGRID_TIMEOUT_SECS must be a whole number of seconds: {}",
                    e
                ))
            })?,
            None => DEFAULT_SENDGRID_TIMEOUT_SECS,
        };

        let enabled = match env.get("SENDGRID_ENABLED") {
            Some(raw) => raw.parse().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!(
                    "SENDGRID_ENABLED must be true or false: {}",
                    e
                ))
            })?,
            None => true,
        };

        Ok(SiteConfig {
            common,
            content: ContentConfig {
                root: PathBuf::from(env.get("CONTENT_ROOT").unwrap_or(".")),
                index_document: env.get("INDEX_DOCUMENT").unwrap_or("index.html").to_string(),
            },
            sendgrid: SendGridConfig {
                api_url: env
                    .get("SENDGRID_API_URL")
                    .unwrap_or(DEFAULT_SENDGRID_API_URL)
                    .to_string(),
                timeout: Duration::from_secs(timeout_secs),
                enabled,
            },
            relay: RelaySettings::from_env(env),
        })
    }
}

impl RelaySettings {
    pub fn from_env(env: &EnvSource) -> Self {
        RelaySettings {
            api_key: env.get(SENDGRID_API_KEY).map(|v| Secret::new(v.to_string())),
            template_id: env.get(SENDGRID_TEMPLATE_ID).map(str::to_string),
            from_email: env.get(SENDGRID_FROM_EMAIL).map(str::to_string),
            recipients: parse_recipients(env.get(NOTIFY_TO_EMAILS), env.get(NOTIFY_TO_EMAIL)),
        }
    }

    /// Check that every required setting is present and produce the
    /// provider config, or name everything that is missing.
    pub fn resolve(&self) -> Result<ProviderConfig, MissingSettings> {
        let mut missing = Vec::new();
        if self.api_key.is_none() {
            missing.push(SENDGRID_API_KEY);
        }
        if self.template_id.is_none() {
            missing.push(SENDGRID_TEMPLATE_ID);
        }
        if self.from_email.is_none() {
            missing.push(SENDGRID_FROM_EMAIL);
        }
        if self.recipients.is_empty() {
            missing.push(NOTIFY_TO_EMAILS);
        }

        match (&self.api_key, &self.template_id, &self.from_email) {
            (Some(api_key), Some(template_id), Some(from_email)) if missing.is_empty() => {
                Ok(ProviderConfig {
                    api_key: api_key.clone(),
                    template_id: template_id.clone(),
                    from_email: from_email.clone(),
                    recipients: self.recipients.clone(),
                })
            }
            _ => Err(MissingSettings(missing)),
        }
    }
}

/// Split the comma separated multi-value setting, falling back to the
/// single-value one when the former yields nothing. Entries are trimmed,
/// empties dropped and order kept.
pub fn parse_recipients(multi: Option<&str>, single: Option<&str>) -> Vec<String> {
    let split = |raw: &str| -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    };

    let recipients = multi.map(split).unwrap_or_default();
    if !recipients.is_empty() {
        return recipients;
    }

    single.map(split).unwrap_or_default()
}
