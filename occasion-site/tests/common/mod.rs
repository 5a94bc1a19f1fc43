#![allow(dead_code)]

use occasion_site::config::{ContentConfig, RelaySettings, SendGridConfig, SiteConfig};
use occasion_site::startup::{Application, RELAY_ROUTE};
use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

pub const SENDGRID_PATH: &str = "/v3/mail/send";
pub const INDEX_HTML: &str = "<!doctype html><title>Happy Birthday</title>";

pub struct TestApp {
    pub address: String,
    pub ops_address: String,
    pub port: u16,
    pub provider: MockServer,
    pub content_root: TempDir,
}

pub fn complete_settings() -> RelaySettings {
    RelaySettings {
        api_key: Some(Secret::new("SG.test-key".to_string())),
        template_id: Some("d-coupon-template".to_string()),
        from_email: Some("site@example.com".to_string()),
        recipients: vec!["a@x.com".to_string(), "b@y.com".to_string()],
    }
}

/// A small content root resembling the real site.
pub fn site_fixture() -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create content root");
    std::fs::write(dir.path().join("index.html"), INDEX_HTML).unwrap();
    std::fs::create_dir(dir.path().join("js")).unwrap();
    std::fs::write(dir.path().join("js").join("coupons.js"), "const cards = [];").unwrap();
    std::fs::create_dir(dir.path().join("images")).unwrap();
    std::fs::write(dir.path().join("images").join("us.webp"), [0u8, 1, 2, 3]).unwrap();
    std::fs::write(dir.path().join(".env"), "SENDGRID_API_KEY=SG.file-key").unwrap();
    dir
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(complete_settings()).await
    }

    pub async fn spawn_with(relay: RelaySettings) -> Self {
        Self::spawn_configured(relay, Duration::from_secs(5)).await
    }

    pub async fn spawn_configured(relay: RelaySettings, timeout: Duration) -> Self {
        let provider = MockServer::start().await;
        let content_root = site_fixture();

        // Use random ports for testing (port 0)
        let config = SiteConfig {
            common: CoreConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                ops_port: Some(0),
            },
            content: ContentConfig {
                root: content_root.path().to_path_buf(),
                index_document: "index.html".to_string(),
            },
            sendgrid: SendGridConfig {
                api_url: format!("{}{}", provider.uri(), SENDGRID_PATH),
                timeout,
                enabled: true,
            },
            relay,
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let ops_port = app.ops_port().expect("ops listener should be enabled");
        let address = format!("http://127.0.0.1:{}", port);
        let ops_address = format!("http://127.0.0.1:{}", ops_port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", ops_address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            ops_address,
            port,
            provider,
            content_root,
        }
    }

    pub fn relay_url(&self) -> String {
        format!("{}{}", self.address, RELAY_ROUTE)
    }

    pub async fn post_notification(&self, body: impl Into<reqwest::Body>) -> reqwest::Response {
        reqwest::Client::new()
            .post(self.relay_url())
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Number of requests the mock provider has seen.
    pub async fn provider_calls(&self) -> usize {
        self.provider
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}
