//! Transport and header security heuristics

use super::dom;
use super::Page;
use crate::error::Result;
use crate::http::HttpClient;
use crate::models::{AuditCheck, Category, CheckStatus, Level};
use async_trait::async_trait;
use scraper::Html;
use tracing::debug;

/// Checks HTTPS, HSTS, mixed content and protective headers
pub struct SecurityAuditor;

enum HeaderResult {
    Missing,
    Weak(String),
    Ok,
}

fn validate_hsts(value: Option<&str>) -> HeaderResult {
    match value {
        None => HeaderResult::Missing,
        Some(v) => {
            let max_age = v
                .split(';')
                .find_map(|part| part.trim().strip_prefix("max-age="))
                .and_then(|s| s.trim().trim_matches('"').parse::<u64>().ok());
            match max_age {
                Some(age) if age >= 31_536_000 => HeaderResult::Ok,
                Some(age) => {
                    HeaderResult::Weak(format!("HSTS max-age is {age} (should be >= 31536000)"))
                }
                None => HeaderResult::Weak("HSTS header has no valid max-age".to_string()),
            }
        }
    }
}

fn validate_x_content_type(value: Option<&str>) -> HeaderResult {
    match value {
        None => HeaderResult::Missing,
        Some(v) if v.trim().eq_ignore_ascii_case("nosniff") => HeaderResult::Ok,
        Some(v) => HeaderResult::Weak(format!("Expected 'nosniff', got '{v}'")),
    }
}

fn validate_framing(x_frame_options: Option<&str>, csp: Option<&str>) -> HeaderResult {
    if csp.is_some_and(|c| c.to_lowercase().contains("frame-ancestors")) {
        return HeaderResult::Ok;
    }
    match x_frame_options {
        None => HeaderResult::Missing,
        Some(v) => {
            let upper = v.trim().to_uppercase();
            if upper == "DENY" || upper == "SAMEORIGIN" {
                HeaderResult::Ok
            } else {
                HeaderResult::Weak(format!("Unexpected X-Frame-Options value: {v}"))
            }
        }
    }
}

/// Server or X-Powered-By values that reveal a version number
fn version_disclosure(server: Option<&str>, powered_by: Option<&str>) -> Option<String> {
    let mut leaks = Vec::new();
    if let Some(v) = server {
        if v.chars().any(|c| c.is_ascii_digit()) {
            leaks.push(format!("Server: {v}"));
        }
    }
    if let Some(v) = powered_by {
        leaks.push(format!("X-Powered-By: {v}"));
    }
    if leaks.is_empty() {
        None
    } else {
        Some(leaks.join(", "))
    }
}

fn check_https(page: &Page) -> AuditCheck {
    let id = "security.https";
    let title = "HTTPS";
    if page.is_https() {
        AuditCheck::pass(id, title, Category::Security).with_detail("The site is served over HTTPS.")
    } else {
        AuditCheck::new(id, title, Category::Security, CheckStatus::Red, 40)
            .with_detail(format!("The page was served over plain HTTP ({}).", page.final_url))
            .with_recommendation(
                "Install a TLS certificate and redirect every HTTP request to HTTPS. Browsers label HTTP pages as 'Not secure'.",
            )
            .with_effort(Level::Medium)
            .with_impact(Level::High)
    }
}

fn check_hsts(page: &Page) -> AuditCheck {
    let id = "security.hsts";
    let title = "Strict-Transport-Security";
    let rec = "Add 'Strict-Transport-Security: max-age=31536000; includeSubDomains'.";
    match validate_hsts(page.header("strict-transport-security")) {
        HeaderResult::Ok => {
            AuditCheck::pass(id, title, Category::Security).with_detail("HSTS is enabled.")
        }
        HeaderResult::Missing => {
            AuditCheck::new(id, title, Category::Security, CheckStatus::Amber, 10)
                .with_detail("The Strict-Transport-Security header is missing.")
                .with_recommendation(rec)
                .with_effort(Level::Low)
                .with_impact(Level::Medium)
        }
        HeaderResult::Weak(detail) => {
            AuditCheck::new(id, title, Category::Security, CheckStatus::Amber, 5)
                .with_detail(detail)
                .with_recommendation(rec)
                .with_effort(Level::Low)
                .with_impact(Level::Low)
        }
    }
}

fn check_mixed_content(page: &Page) -> AuditCheck {
    let id = "security.mixed_content";
    let title = "Mixed content";
    if !page.is_https() {
        return AuditCheck::pass(id, title, Category::Security)
            .with_detail("Not applicable to HTTP pages.");
    }

    let doc = Html::parse_document(&page.body);
    let insecure: Vec<String> = [
        ("img[src]", "src"),
        ("script[src]", "src"),
        ("iframe[src]", "src"),
        ("link[href][rel~=stylesheet]", "href"),
        ("source[src]", "src"),
    ]
    .iter()
    .flat_map(|(css, attr)| {
        dom::select(&doc, css)
            .into_iter()
            .filter_map(|el| el.value().attr(attr).map(str::to_string))
            .collect::<Vec<_>>()
    })
    .filter(|url| url.trim().starts_with("http://"))
    .collect();

    if insecure.is_empty() {
        AuditCheck::pass(id, title, Category::Security)
            .with_detail("All embedded resources use HTTPS.")
    } else {
        let sample: Vec<&str> = insecure.iter().take(3).map(String::as_str).collect();
        AuditCheck::new(id, title, Category::Security, CheckStatus::Red, 15)
            .with_detail(format!(
                "{} resource(s) load over HTTP, e.g. {}",
                insecure.len(),
                sample.join(", ")
            ))
            .with_recommendation("Change embedded resource URLs to https://.")
            .with_effort(Level::Low)
            .with_impact(Level::High)
    }
}

fn check_content_type_options(page: &Page) -> AuditCheck {
    let id = "security.content_type_options";
    let title = "X-Content-Type-Options";
    match validate_x_content_type(page.header("x-content-type-options")) {
        HeaderResult::Ok => AuditCheck::pass(id, title, Category::Security)
            .with_detail("nosniff is set."),
        HeaderResult::Missing | HeaderResult::Weak(_) => {
            AuditCheck::new(id, title, Category::Security, CheckStatus::Amber, 5)
                .with_detail("X-Content-Type-Options: nosniff is not set.")
                .with_recommendation("Add 'X-Content-Type-Options: nosniff'.")
                .with_effort(Level::Low)
                .with_impact(Level::Low)
        }
    }
}

fn check_framing(page: &Page) -> AuditCheck {
    let id = "security.framing";
    let title = "Clickjacking protection";
    match validate_framing(
        page.header("x-frame-options"),
        page.header("content-security-policy"),
    ) {
        HeaderResult::Ok => AuditCheck::pass(id, title, Category::Security)
            .with_detail("Framing by other sites is restricted."),
        HeaderResult::Missing => {
            AuditCheck::new(id, title, Category::Security, CheckStatus::Amber, 5)
                .with_detail("Neither X-Frame-Options nor CSP frame-ancestors is set.")
                .with_recommendation(
                    "Add 'X-Frame-Options: SAMEORIGIN' or a CSP frame-ancestors directive.",
                )
                .with_effort(Level::Low)
                .with_impact(Level::Low)
        }
        HeaderResult::Weak(detail) => {
            AuditCheck::new(id, title, Category::Security, CheckStatus::Amber, 5)
                .with_detail(detail)
                .with_recommendation("Use 'DENY' or 'SAMEORIGIN'.")
                .with_effort(Level::Low)
                .with_impact(Level::Low)
        }
    }
}

fn check_version_disclosure(page: &Page) -> AuditCheck {
    let id = "security.version_disclosure";
    let title = "Software version disclosure";
    match version_disclosure(page.header("server"), page.header("x-powered-by")) {
        None => AuditCheck::pass(id, title, Category::Security)
            .with_detail("Response headers do not reveal software versions."),
        Some(detail) => AuditCheck::new(id, title, Category::Security, CheckStatus::Amber, 3)
            .with_detail(detail)
            .with_recommendation(
                "Hide version numbers so automated attacks cannot target known flaws.",
            )
            .with_effort(Level::Low)
            .with_impact(Level::Low),
    }
}

#[async_trait]
impl super::Auditor for SecurityAuditor {
    fn name(&self) -> &str {
        "security"
    }

    fn description(&self) -> &str {
        "Checks HTTPS, HSTS, mixed content, protective headers and version disclosure"
    }

    async fn audit(&self, _client: &HttpClient, page: &Page) -> Result<Vec<AuditCheck>> {
        debug!(
            "Security audit of {} ({} headers)",
            page.final_url,
            page.headers.len()
        );
        Ok(vec![
            check_https(page),
            check_hsts(page),
            check_mixed_content(page),
            check_content_type_options(page),
            check_framing(page),
            check_version_disclosure(page),
        ])
    }
}
