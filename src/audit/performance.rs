//! Page speed heuristics

use super::dom;
use super::Page;
use crate::error::Result;
use crate::http::HttpClient;
use crate::models::{AuditCheck, Category, CheckStatus, Level};
use async_trait::async_trait;
use scraper::Html;
use tracing::debug;

/// Checks response time, page weight, scripts and compression
pub struct PerformanceAuditor;

const FAST_MS: u64 = 800;
const SLOW_MS: u64 = 2000;
const LIGHT_BYTES: usize = 100 * 1024;
const HEAVY_BYTES: usize = 500 * 1024;
const FEW_SCRIPTS: usize = 15;
const MANY_SCRIPTS: usize = 30;

const COMPRESSED_ENCODINGS: [&str; 4] = ["gzip", "br", "deflate", "zstd"];

pub(crate) fn check_response_time(elapsed_ms: u64) -> AuditCheck {
    let id = "performance.response_time";
    let title = "Server response time";
    let detail = format!("The server answered in {elapsed_ms} ms.");
    if elapsed_ms < FAST_MS {
        AuditCheck::pass(id, title, Category::Performance).with_detail(detail)
    } else {
        let (status, delta) = if elapsed_ms < SLOW_MS {
            (CheckStatus::Amber, 10)
        } else {
            (CheckStatus::Red, 25)
        };
        AuditCheck::new(id, title, Category::Performance, status, delta)
            .with_detail(detail)
            .with_recommendation(
                "Use page caching or a faster host so the first byte arrives in under 800 ms.",
            )
            .with_effort(Level::Medium)
            .with_impact(Level::High)
    }
}

pub(crate) fn check_page_weight(size_bytes: usize) -> AuditCheck {
    let id = "performance.page_weight";
    let title = "HTML page weight";
    let kb = size_bytes / 1024;
    let detail = format!("The HTML document is {kb} KB.");
    if size_bytes < LIGHT_BYTES {
        AuditCheck::pass(id, title, Category::Performance).with_detail(detail)
    } else {
        let (status, delta) = if size_bytes < HEAVY_BYTES {
            (CheckStatus::Amber, 8)
        } else {
            (CheckStatus::Red, 20)
        };
        AuditCheck::new(id, title, Category::Performance, status, delta)
            .with_detail(detail)
            .with_recommendation(
                "Move inline styles and scripts into cached files and trim page-builder markup.",
            )
            .with_effort(Level::Medium)
            .with_impact(Level::Medium)
    }
}

fn check_script_count(doc: &Html) -> AuditCheck {
    let id = "performance.scripts";
    let title = "External scripts";
    let scripts = dom::count(doc, "script[src]");
    let detail = format!("{scripts} external script(s) are loaded.");
    if scripts <= FEW_SCRIPTS {
        AuditCheck::pass(id, title, Category::Performance).with_detail(detail)
    } else {
        let (status, delta) = if scripts <= MANY_SCRIPTS {
            (CheckStatus::Amber, 8)
        } else {
            (CheckStatus::Red, 15)
        };
        AuditCheck::new(id, title, Category::Performance, status, delta)
            .with_detail(detail)
            .with_recommendation("Remove unused plugins and bundle the remaining scripts.")
            .with_effort(Level::High)
            .with_impact(Level::Medium)
    }
}

fn check_render_blocking(doc: &Html) -> AuditCheck {
    let id = "performance.render_blocking";
    let title = "Render-blocking scripts";
    let blocking = dom::select(doc, "head script[src]")
        .iter()
        .filter(|el| {
            let v = el.value();
            v.attr("async").is_none()
                && v.attr("defer").is_none()
                && v.attr("type") != Some("module")
        })
        .count();

    if blocking == 0 {
        AuditCheck::pass(id, title, Category::Performance)
            .with_detail("No blocking scripts in <head>.")
    } else {
        AuditCheck::new(id, title, Category::Performance, CheckStatus::Amber, 8)
            .with_detail(format!(
                "{blocking} script(s) in <head> load without async or defer."
            ))
            .with_recommendation("Add `defer` to scripts that are not needed for first paint.")
            .with_effort(Level::Low)
            .with_impact(Level::Medium)
    }
}

pub(crate) fn check_compression(encoding: Option<&str>) -> AuditCheck {
    let id = "performance.compression";
    let title = "Text compression";
    let compressed = encoding
        .map(|e| e.to_lowercase())
        .filter(|e| COMPRESSED_ENCODINGS.iter().any(|c| e.contains(c)));

    match compressed {
        Some(e) => AuditCheck::pass(id, title, Category::Performance)
            .with_detail(format!("Responses are served with {e} compression.")),
        None => AuditCheck::new(id, title, Category::Performance, CheckStatus::Amber, 8)
            .with_detail("The server did not compress the HTML response.")
            .with_recommendation("Enable gzip or Brotli compression on the web server.")
            .with_effort(Level::Low)
            .with_impact(Level::Medium),
    }
}

fn evaluate_markup(page: &Page) -> Vec<AuditCheck> {
    let doc = Html::parse_document(&page.body);
    vec![check_script_count(&doc), check_render_blocking(&doc)]
}

#[async_trait]
impl super::Auditor for PerformanceAuditor {
    fn name(&self) -> &str {
        "performance"
    }

    fn description(&self) -> &str {
        "Measures response time, HTML weight, script load and compression"
    }

    async fn audit(&self, client: &HttpClient, page: &Page) -> Result<Vec<AuditCheck>> {
        let mut checks = vec![
            check_response_time(page.elapsed_ms),
            check_page_weight(page.size_bytes),
        ];
        checks.extend(evaluate_markup(page));

        // The page fetch does not advertise compression support, so probe separately
        let probe = client
            .get_with_headers(
                &page.final_url,
                &[(
                    "Accept-Encoding".to_string(),
                    "gzip, deflate, br".to_string(),
                )],
            )
            .await;
        let encoding = match probe {
            Ok(response) => response
                .headers()
                .get("content-encoding")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            Err(e) => {
                debug!("Compression probe failed: {e}");
                None
            }
        };
        checks.push(check_compression(encoding.as_deref()));

        Ok(checks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_time_thresholds() {
        assert_eq!(check_response_time(200).status, CheckStatus::Green);
        assert_eq!(check_response_time(1200).status, CheckStatus::Amber);
        assert_eq!(check_response_time(3500).status, CheckStatus::Red);
        assert_eq!(check_response_time(3500).score_delta, -25);
    }

    #[test]
    fn test_page_weight_thresholds() {
        assert_eq!(check_page_weight(20 * 1024).status, CheckStatus::Green);
        assert_eq!(check_page_weight(200 * 1024).status, CheckStatus::Amber);
        assert_eq!(check_page_weight(900 * 1024).status, CheckStatus::Red);
    }

    #[test]
    fn test_compression() {
        assert!(check_compression(Some("br")).is_passing());
        assert!(check_compression(Some("GZIP")).is_passing());
        assert!(!check_compression(Some("identity")).is_passing());
        assert!(!check_compression(None).is_passing());
    }

    #[test]
    fn test_render_blocking_scripts() {
        let page = Page::from_parts(
            "https://example.com/",
            &[],
            r#"<html><head>
                <script src="/a.js"></script>
                <script src="/b.js" defer></script>
                <script src="/c.js" type="module"></script>
            </head><body><script src="/d.js"></script></body></html>"#,
            10,
        );
        let checks = evaluate_markup(&page);
        let blocking = checks
            .iter()
            .find(|c| c.id == "performance.render_blocking")
            .expect("check present");
        assert_eq!(blocking.status, CheckStatus::Amber);
        assert!(blocking.detail.starts_with("1 script"));
    }
}
