//! On-page and crawlability SEO heuristics

use super::dom;
use super::Page;
use crate::error::Result;
use crate::http::HttpClient;
use crate::models::{AuditCheck, Category, CheckStatus, Level};
use async_trait::async_trait;
use scraper::Html;
use tracing::debug;

/// Checks titles, descriptions, headings and crawl files
pub struct SeoAuditor;

const TITLE_MIN: usize = 10;
const TITLE_MAX: usize = 60;
const DESCRIPTION_MIN: usize = 50;
const DESCRIPTION_MAX: usize = 160;

fn check_title(doc: &Html) -> AuditCheck {
    let id = "seo.title";
    let title = "Page title";
    match dom::first_text(doc, "title") {
        None => AuditCheck::new(id, title, Category::Seo, CheckStatus::Red, 25)
            .with_detail("The page has no <title> element.")
            .with_recommendation(
                "Add a unique title naming your main service and location, under 60 characters.",
            )
            .with_effort(Level::Low)
            .with_impact(Level::High),
        Some(text) => {
            let len = text.chars().count();
            if (TITLE_MIN..=TITLE_MAX).contains(&len) {
                AuditCheck::pass(id, title, Category::Seo)
                    .with_detail(format!("Title is {len} characters: \"{text}\""))
            } else {
                AuditCheck::new(id, title, Category::Seo, CheckStatus::Amber, 10)
                    .with_detail(format!(
                        "Title is {len} characters (aim for {TITLE_MIN}-{TITLE_MAX}): \"{text}\""
                    ))
                    .with_recommendation(
                        "Rewrite the title so search results show it in full.",
                    )
                    .with_effort(Level::Low)
                    .with_impact(Level::Medium)
            }
        }
    }
}

fn check_meta_description(doc: &Html) -> AuditCheck {
    let id = "seo.meta_description";
    let title = "Meta description";
    match dom::meta_content(doc, "description") {
        None => AuditCheck::new(id, title, Category::Seo, CheckStatus::Red, 20)
            .with_detail("No meta description was found.")
            .with_recommendation(
                "Add a meta description of 50-160 characters that invites the click.",
            )
            .with_effort(Level::Low)
            .with_impact(Level::High),
        Some(text) => {
            let len = text.chars().count();
            if (DESCRIPTION_MIN..=DESCRIPTION_MAX).contains(&len) {
                AuditCheck::pass(id, title, Category::Seo)
                    .with_detail(format!("Meta description is {len} characters."))
            } else {
                AuditCheck::new(id, title, Category::Seo, CheckStatus::Amber, 8)
                    .with_detail(format!(
                        "Meta description is {len} characters (aim for {DESCRIPTION_MIN}-{DESCRIPTION_MAX})."
                    ))
                    .with_recommendation("Adjust the description length so it is not truncated.")
                    .with_effort(Level::Low)
                    .with_impact(Level::Medium)
            }
        }
    }
}

fn check_headings(doc: &Html) -> AuditCheck {
    let id = "seo.h1";
    let title = "Main heading";
    match dom::count(doc, "h1") {
        0 => AuditCheck::new(id, title, Category::Seo, CheckStatus::Red, 15)
            .with_detail("The page has no <h1> heading.")
            .with_recommendation("Add one <h1> that states what the business does.")
            .with_effort(Level::Low)
            .with_impact(Level::High),
        1 => AuditCheck::pass(id, title, Category::Seo).with_detail("Exactly one <h1> found."),
        n => AuditCheck::new(id, title, Category::Seo, CheckStatus::Amber, 5)
            .with_detail(format!("{n} <h1> headings found."))
            .with_recommendation("Keep a single <h1> and demote the others to <h2>.")
            .with_effort(Level::Low)
            .with_impact(Level::Low),
    }
}

fn check_canonical(doc: &Html) -> AuditCheck {
    let id = "seo.canonical";
    let title = "Canonical URL";
    if dom::has_link_rel(doc, "canonical") {
        AuditCheck::pass(id, title, Category::Seo).with_detail("A canonical link is declared.")
    } else {
        AuditCheck::new(id, title, Category::Seo, CheckStatus::Amber, 5)
            .with_detail("No <link rel=\"canonical\"> was found.")
            .with_recommendation("Declare the preferred URL to avoid duplicate-content dilution.")
            .with_effort(Level::Low)
            .with_impact(Level::Low)
    }
}

fn check_open_graph(doc: &Html) -> AuditCheck {
    let id = "seo.open_graph";
    let title = "Social sharing tags";
    let missing: Vec<&str> = ["og:title", "og:description"]
        .into_iter()
        .filter(|key| dom::meta_content(doc, key).is_none())
        .collect();

    if missing.is_empty() {
        let detail = if dom::meta_content(doc, "og:image").is_some() {
            "Open Graph title, description and image are present."
        } else {
            "Open Graph title and description are present; an og:image would improve previews."
        };
        AuditCheck::pass(id, title, Category::Seo).with_detail(detail)
    } else {
        AuditCheck::new(id, title, Category::Seo, CheckStatus::Amber, 5)
            .with_detail(format!("Missing Open Graph tags: {}", missing.join(", ")))
            .with_recommendation(
                "Add Open Graph tags so links shared on social media show a proper preview.",
            )
            .with_effort(Level::Low)
            .with_impact(Level::Low)
    }
}

fn check_structured_data(doc: &Html) -> AuditCheck {
    let id = "seo.structured_data";
    let title = "Structured data";
    let blocks = dom::count(doc, r#"script[type="application/ld+json"]"#);
    if blocks > 0 {
        AuditCheck::pass(id, title, Category::Seo)
            .with_detail(format!("{blocks} JSON-LD block(s) found."))
    } else {
        AuditCheck::new(id, title, Category::Seo, CheckStatus::Amber, 5)
            .with_detail("No JSON-LD structured data was found.")
            .with_recommendation(
                "Add LocalBusiness structured data with address, hours and phone number.",
            )
            .with_effort(Level::Medium)
            .with_impact(Level::Medium)
    }
}

/// Checks that only need the markup
fn evaluate_markup(page: &Page) -> Vec<AuditCheck> {
    let doc = Html::parse_document(&page.body);
    vec![
        check_title(&doc),
        check_meta_description(&doc),
        check_headings(&doc),
        check_canonical(&doc),
        check_open_graph(&doc),
        check_structured_data(&doc),
    ]
}

fn crawl_file_check(id: &str, file: &str, found: bool) -> AuditCheck {
    let title = format!("{file} available");
    if found {
        AuditCheck::pass(id, title, Category::Seo).with_detail(format!("/{file} responded."))
    } else {
        AuditCheck::new(id, title, Category::Seo, CheckStatus::Amber, 5)
            .with_detail(format!("/{file} could not be fetched."))
            .with_recommendation(format!(
                "Publish /{file} so search engines can discover every page."
            ))
            .with_effort(Level::Low)
            .with_impact(Level::Low)
    }
}

#[async_trait]
impl super::Auditor for SeoAuditor {
    fn name(&self) -> &str {
        "seo"
    }

    fn description(&self) -> &str {
        "Checks title, meta description, headings, social tags, structured data and crawl files"
    }

    async fn audit(&self, client: &HttpClient, page: &Page) -> Result<Vec<AuditCheck>> {
        let mut checks = evaluate_markup(page);

        let robots = client.exists(&page.site_url("/robots.txt")?).await;
        let sitemap = client.exists(&page.site_url("/sitemap.xml")?).await;
        debug!("robots.txt: {robots}, sitemap.xml: {sitemap}");

        checks.push(crawl_file_check("seo.robots_txt", "robots.txt", robots));
        checks.push(crawl_file_check("seo.sitemap", "sitemap.xml", sitemap));

        Ok(checks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(html: &str) -> Vec<(String, CheckStatus)> {
        let page = Page::from_parts("https://example.com/", &[], html, 100);
        evaluate_markup(&page)
            .into_iter()
            .map(|c| (c.id, c.status))
            .collect()
    }

    fn status_of(results: &[(String, CheckStatus)], id: &str) -> CheckStatus {
        results
            .iter()
            .find(|(i, _)| i == id)
            .map(|(_, s)| *s)
            .unwrap_or_else(|| panic!("no check {id}"))
    }

    #[test]
    fn test_bare_page_fails_basics() {
        let results = statuses("<html><body><p>hello</p></body></html>");
        assert_eq!(status_of(&results, "seo.title"), CheckStatus::Red);
        assert_eq!(status_of(&results, "seo.meta_description"), CheckStatus::Red);
        assert_eq!(status_of(&results, "seo.h1"), CheckStatus::Red);
        assert_eq!(status_of(&results, "seo.canonical"), CheckStatus::Amber);
    }

    #[test]
    fn test_well_formed_page_passes() {
        let html = r#"<html><head>
            <title>Smith Plumbing | Emergency Plumber in Leeds</title>
            <meta name="description" content="Fast, friendly emergency plumbing across Leeds. Fixed prices, no call-out fee, available 24/7.">
            <link rel="canonical" href="https://example.com/">
            <meta property="og:title" content="Smith Plumbing">
            <meta property="og:description" content="Emergency plumbing">
            <meta property="og:image" content="https://example.com/og.png">
            <script type="application/ld+json">{"@type":"LocalBusiness"}</script>
            </head><body><h1>Emergency plumbing in Leeds</h1></body></html>"#;
        let results = statuses(html);
        assert!(results.iter().all(|(_, s)| *s == CheckStatus::Green), "{results:?}");
    }

    #[test]
    fn test_open_graph_needs_title_and_description_only() {
        let doc = Html::parse_document(
            r#"<html><head>
            <meta property="og:title" content="Smith Plumbing">
            <meta property="og:description" content="Emergency plumbing">
            </head></html>"#,
        );
        let check = check_open_graph(&doc);
        assert_eq!(check.status, CheckStatus::Green);
        assert!(check.detail.contains("og:image"), "{}", check.detail);

        let doc = Html::parse_document(
            r#"<html><head><meta property="og:image" content="https://example.com/og.png"></head></html>"#,
        );
        let check = check_open_graph(&doc);
        assert_eq!(check.status, CheckStatus::Amber);
        assert_eq!(check.score_delta, -5);
        assert!(check.detail.contains("og:title, og:description"), "{}", check.detail);
    }

    #[test]
    fn test_long_title_and_many_headings_are_amber() {
        let html = format!(
            "<html><head><title>{}</title></head><body><h1>a</h1><h1>b</h1></body></html>",
            "x".repeat(80)
        );
        let results = statuses(&html);
        assert_eq!(status_of(&results, "seo.title"), CheckStatus::Amber);
        assert_eq!(status_of(&results, "seo.h1"), CheckStatus::Amber);
    }
}
