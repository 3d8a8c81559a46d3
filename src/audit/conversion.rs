//! Lead-capture heuristics: can a visitor actually get in touch?

use super::dom;
use super::Page;
use crate::error::Result;
use crate::http::HttpClient;
use crate::models::{AuditCheck, Category, CheckStatus, Level};
use async_trait::async_trait;
use regex::Regex;
use scraper::Html;

/// Checks forms, click-to-call, email, calls to action and analytics
pub struct ConversionAuditor;

const CTA_PHRASES: &[&str] = &[
    "book",
    "call",
    "quote",
    "contact",
    "schedule",
    "get started",
    "enquire",
    "inquire",
    "request",
    "free consultation",
    "buy",
    "order",
];

const ANALYTICS_MARKERS: &[(&str, &str)] = &[
    ("googletagmanager.com", "Google Tag Manager"),
    ("google-analytics.com", "Google Analytics"),
    ("gtag(", "Google Analytics"),
    ("plausible.io", "Plausible"),
    ("usefathom.com", "Fathom"),
    ("clarity.ms", "Microsoft Clarity"),
    ("fbq(", "Meta Pixel"),
    ("matomo", "Matomo"),
];

const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";

fn check_contact_form(doc: &Html) -> AuditCheck {
    let id = "conversion.contact_form";
    let title = "Contact form";
    let forms = dom::select(doc, "form");
    let lead_forms = forms
        .iter()
        .filter(|form| {
            let html = form.html().to_lowercase();
            html.contains("type=\"email\"")
                || html.contains("type=\"tel\"")
                || html.contains("<textarea")
                || html.contains("name=\"email\"")
                || html.contains("name=\"phone\"")
        })
        .count();

    if lead_forms > 0 {
        AuditCheck::pass(id, title, Category::Conversion)
            .with_detail(format!("{lead_forms} enquiry form(s) found on the page."))
    } else {
        AuditCheck::new(id, title, Category::Conversion, CheckStatus::Red, 20)
            .with_detail("No enquiry form was found on the page.")
            .with_recommendation(
                "Add a short contact form (name, email or phone, message) above the fold.",
            )
            .with_effort(Level::Medium)
            .with_impact(Level::High)
    }
}

fn check_phone_link(doc: &Html) -> AuditCheck {
    let id = "conversion.phone_link";
    let title = "Click-to-call";
    if dom::count(doc, r#"a[href^="tel:"]"#) > 0 {
        AuditCheck::pass(id, title, Category::Conversion)
            .with_detail("A tap-to-call phone link is present.")
    } else {
        AuditCheck::new(id, title, Category::Conversion, CheckStatus::Amber, 10)
            .with_detail("No tel: link found; mobile visitors cannot tap to call.")
            .with_recommendation("Wrap the phone number in <a href=\"tel:...\">.")
            .with_effort(Level::Low)
            .with_impact(Level::High)
    }
}

fn check_email_contact(doc: &Html, body: &str) -> AuditCheck {
    let id = "conversion.email";
    let title = "Email contact";
    let has_mailto = dom::count(doc, r#"a[href^="mailto:"]"#) > 0;
    let has_address = Regex::new(EMAIL_PATTERN)
        .map(|re| re.is_match(body))
        .unwrap_or(false);

    if has_mailto || has_address {
        AuditCheck::pass(id, title, Category::Conversion)
            .with_detail("An email address is published.")
    } else {
        AuditCheck::new(id, title, Category::Conversion, CheckStatus::Amber, 5)
            .with_detail("No email address or mailto: link was found.")
            .with_recommendation("Publish an email address for visitors who prefer writing.")
            .with_effort(Level::Low)
            .with_impact(Level::Low)
    }
}

fn check_call_to_action(doc: &Html) -> AuditCheck {
    let id = "conversion.call_to_action";
    let title = "Call to action";
    let ctas: Vec<String> = dom::select(doc, "a, button, input[type=submit]")
        .iter()
        .map(|el| {
            let text = dom::text_of(el);
            if text.is_empty() {
                el.value().attr("value").unwrap_or("").to_string()
            } else {
                text
            }
        })
        .filter(|t| {
            let lower = t.to_lowercase();
            CTA_PHRASES.iter().any(|p| lower.contains(p))
        })
        .collect();

    if ctas.is_empty() {
        AuditCheck::new(id, title, Category::Conversion, CheckStatus::Amber, 10)
            .with_detail("No button or link asks the visitor to take the next step.")
            .with_recommendation(
                "Add a clear button such as \"Book a free consultation\" near the top of the page.",
            )
            .with_effort(Level::Low)
            .with_impact(Level::High)
    } else {
        AuditCheck::pass(id, title, Category::Conversion)
            .with_detail(format!("Calls to action found, e.g. \"{}\".", ctas[0]))
    }
}

fn check_analytics(body: &str) -> AuditCheck {
    let id = "conversion.analytics";
    let title = "Visitor analytics";
    let lower = body.to_lowercase();
    let tools: Vec<&str> = ANALYTICS_MARKERS
        .iter()
        .filter(|(marker, _)| lower.contains(marker))
        .map(|(_, name)| *name)
        .collect();

    if let Some(first) = tools.first() {
        AuditCheck::pass(id, title, Category::Conversion)
            .with_detail(format!("Analytics detected: {first}."))
    } else {
        AuditCheck::new(id, title, Category::Conversion, CheckStatus::Amber, 5)
            .with_detail("No analytics tag was detected.")
            .with_recommendation(
                "Install privacy-friendly analytics to see where enquiries come from.",
            )
            .with_effort(Level::Low)
            .with_impact(Level::Medium)
    }
}

fn evaluate_markup(page: &Page) -> Vec<AuditCheck> {
    let doc = Html::parse_document(&page.body);
    vec![
        check_contact_form(&doc),
        check_phone_link(&doc),
        check_email_contact(&doc, &page.body),
        check_call_to_action(&doc),
        check_analytics(&page.body),
    ]
}

#[async_trait]
impl super::Auditor for ConversionAuditor {
    fn name(&self) -> &str {
        "conversion"
    }

    fn description(&self) -> &str {
        "Checks enquiry forms, click-to-call, email, calls to action and analytics"
    }

    async fn audit(&self, _client: &HttpClient, page: &Page) -> Result<Vec<AuditCheck>> {
        Ok(evaluate_markup(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brochure_page_without_funnel() {
        let page = Page::from_parts(
            "https://example.com/",
            &[],
            "<html><body><h1>Welcome</h1><p>We have been in business since 1982.</p></body></html>",
            10,
        );
        let checks = evaluate_markup(&page);
        let failing: Vec<&str> = checks
            .iter()
            .filter(|c| !c.is_passing())
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(
            failing,
            vec![
                "conversion.contact_form",
                "conversion.phone_link",
                "conversion.email",
                "conversion.call_to_action",
                "conversion.analytics",
            ]
        );
    }

    #[test]
    fn test_page_with_funnel() {
        let page = Page::from_parts(
            "https://example.com/",
            &[],
            r#"<html><head><script async src="https://www.googletagmanager.com/gtag/js?id=G-1"></script></head>
            <body>
              <a href="tel:+441234567890">01234 567890</a>
              <p>Write to hello@example.com</p>
              <form><input type="email" name="email"><textarea name="message"></textarea>
              <button>Get a free quote</button></form>
            </body></html>"#,
            10,
        );
        let checks = evaluate_markup(&page);
        assert!(checks.iter().all(|c| c.is_passing()), "{checks:#?}");
    }
}
