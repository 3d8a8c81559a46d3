//! Common test utilities
#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;
use vantage::config::AppConfig;
use vantage::models::{AuditConfig, Scan};
use vantage::pipeline::Store;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ADMIN_TOKEN: &str = "test-admin-token-0123456789";

/// A page that passes most on-page checks
pub const GOOD_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en"><head>
  <title>Smith Plumbing | Emergency Plumber in Leeds</title>
  <meta name="description" content="Fast, friendly emergency plumbing across Leeds. Fixed prices, no call-out fee, available 24/7.">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <link rel="canonical" href="https://example.com/">
  <meta property="og:title" content="Smith Plumbing">
  <meta property="og:description" content="Emergency plumbing">
  <meta property="og:image" content="https://example.com/og.png">
  <script type="application/ld+json">{"@type":"Plumber"}</script>
  <script async src="https://www.googletagmanager.com/gtag/js?id=G-1"></script>
</head><body>
  <h1>Emergency plumbing in Leeds</h1>
  <img src="van.png" alt="Our van">
  <a href="tel:+441134960000">0113 496 0000</a>
  <p>Write to hello@example.com</p>
  <form>
    <label for="email">Email</label><input id="email" type="email" name="email">
    <textarea aria-label="Message" name="message"></textarea>
    <button>Get a free quote</button>
  </form>
</body></html>"#;

/// A page that fails most on-page checks
pub const BARE_PAGE: &str = "<html><body><p>Hello</p><img src=\"a.png\"></body></html>";

/// Audit settings suited to a local mock server
pub fn audit_config() -> AuditConfig {
    AuditConfig {
        timeout_secs: 5,
        rate_limit: None,
        workers: 1,
        job_timeout_secs: 30,
        // Mock sites listen on loopback
        allow_private_targets: true,
        ..AuditConfig::default()
    }
}

pub fn app_config(data_dir: Option<&Path>) -> AppConfig {
    let mut config = AppConfig {
        audit: audit_config(),
        ..AppConfig::default()
    };
    config.server.bind = "127.0.0.1:0".to_string();
    config.server.admin_token = Some(ADMIN_TOKEN.to_string());
    config.storage.data_dir = data_dir.map(|d| d.join("data"));
    config.storage.reports_dir = data_dir.map(|d| d.join("reports"));
    config
}

/// Serves `html` at `/` along with robots.txt and sitemap.xml
pub async fn mount_site(server: &MockServer, html: &str) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html; charset=utf-8")
                .set_body_string(html),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /\n"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<urlset></urlset>"))
        .mount(server)
        .await;
}

/// Polls until the scan is COMPLETE or FAILED
pub async fn wait_for_terminal(store: &Store, scan_id: &str) -> Scan {
    for _ in 0..200 {
        if let Some(scan) = store.get_scan(scan_id).await {
            if scan.status.is_terminal() {
                return scan;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("scan {scan_id} did not finish in time");
}
