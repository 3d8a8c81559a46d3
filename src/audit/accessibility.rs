//! Accessibility and mobile-readiness heuristics

use super::dom;
use super::Page;
use crate::error::Result;
use crate::http::HttpClient;
use crate::models::{AuditCheck, Category, CheckStatus, Level};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use std::collections::HashSet;

/// Checks language, viewport, image alternatives, labels and link text
pub struct AccessibilityAuditor;

const GENERIC_LINK_TEXT: &[&str] = &[
    "click here",
    "here",
    "read more",
    "more",
    "learn more",
    "link",
    "this",
];

fn check_lang(doc: &Html) -> AuditCheck {
    let id = "accessibility.lang";
    let title = "Page language";
    let lang = dom::select(doc, "html[lang]")
        .first()
        .and_then(|el| el.value().attr("lang"))
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from);

    match lang {
        Some(l) => AuditCheck::pass(id, title, Category::Accessibility)
            .with_detail(format!("Language declared as \"{l}\".")),
        None => AuditCheck::new(id, title, Category::Accessibility, CheckStatus::Amber, 10)
            .with_detail("The <html> element has no lang attribute.")
            .with_recommendation("Add lang=\"en\" (or the site's language) to the <html> tag.")
            .with_effort(Level::Low)
            .with_impact(Level::Medium),
    }
}

fn check_viewport(doc: &Html) -> AuditCheck {
    let id = "accessibility.viewport";
    let title = "Mobile viewport";
    match dom::meta_content(doc, "viewport") {
        Some(v) if v.contains("width=device-width") => {
            AuditCheck::pass(id, title, Category::Accessibility)
                .with_detail("A responsive viewport is declared.")
        }
        Some(v) => AuditCheck::new(id, title, Category::Accessibility, CheckStatus::Amber, 10)
            .with_detail(format!("Viewport meta tag does not use device width: \"{v}\""))
            .with_recommendation("Use content=\"width=device-width, initial-scale=1\".")
            .with_effort(Level::Low)
            .with_impact(Level::High),
        None => AuditCheck::new(id, title, Category::Accessibility, CheckStatus::Red, 20)
            .with_detail("No viewport meta tag; the page will not scale on phones.")
            .with_recommendation(
                "Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"> and check the layout on mobile.",
            )
            .with_effort(Level::Medium)
            .with_impact(Level::High),
    }
}

fn check_image_alt(doc: &Html) -> AuditCheck {
    let id = "accessibility.image_alt";
    let title = "Image descriptions";
    let images = dom::select(doc, "img");
    let missing = images
        .iter()
        .filter(|el| el.value().attr("alt").is_none())
        .count();
    let total = images.len();

    if missing == 0 {
        return AuditCheck::pass(id, title, Category::Accessibility)
            .with_detail(format!("All {total} image(s) have alt text."));
    }

    let (status, delta) = if missing * 2 > total {
        (CheckStatus::Red, 20)
    } else {
        (CheckStatus::Amber, 10)
    };
    AuditCheck::new(id, title, Category::Accessibility, status, delta)
        .with_detail(format!("{missing} of {total} image(s) have no alt attribute."))
        .with_recommendation(
            "Describe each meaningful image in its alt attribute; use alt=\"\" for decoration.",
        )
        .with_effort(Level::Low)
        .with_impact(Level::Medium)
}

fn check_form_labels(doc: &Html) -> AuditCheck {
    let id = "accessibility.form_labels";
    let title = "Form labels";
    let labelled_ids: HashSet<String> = dom::select(doc, "label[for]")
        .iter()
        .filter_map(|el| el.value().attr("for").map(String::from))
        .collect();

    let controls = dom::select(
        doc,
        "input:not([type=hidden]):not([type=submit]):not([type=button]):not([type=image]), textarea, select",
    );
    let unlabelled = controls
        .iter()
        .filter(|el| {
            let v = el.value();
            let has_aria = v.attr("aria-label").is_some() || v.attr("aria-labelledby").is_some();
            let by_for = v.attr("id").is_some_and(|i| labelled_ids.contains(i));
            let wrapped = el
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| a.value().name() == "label");
            !(has_aria || by_for || wrapped)
        })
        .count();

    if unlabelled == 0 {
        AuditCheck::pass(id, title, Category::Accessibility)
            .with_detail(format!("{} form control(s), all labelled.", controls.len()))
    } else {
        AuditCheck::new(id, title, Category::Accessibility, CheckStatus::Amber, 8)
            .with_detail(format!("{unlabelled} form control(s) have no label."))
            .with_recommendation(
                "Give every field a visible <label>; placeholders disappear while typing.",
            )
            .with_effort(Level::Low)
            .with_impact(Level::Medium)
    }
}

fn check_link_text(doc: &Html) -> AuditCheck {
    let id = "accessibility.link_text";
    let title = "Descriptive links";
    let generic: Vec<String> = dom::select(doc, "a[href]")
        .iter()
        .map(dom::text_of)
        .filter(|t| GENERIC_LINK_TEXT.contains(&t.to_lowercase().as_str()))
        .collect();

    if generic.is_empty() {
        AuditCheck::pass(id, title, Category::Accessibility)
            .with_detail("Link text describes its destination.")
    } else {
        AuditCheck::new(id, title, Category::Accessibility, CheckStatus::Amber, 5)
            .with_detail(format!(
                "{} link(s) use generic text such as \"{}\".",
                generic.len(),
                generic[0]
            ))
            .with_recommendation("Say where the link goes, e.g. \"See our pricing\".")
            .with_effort(Level::Low)
            .with_impact(Level::Low)
    }
}

fn evaluate_markup(page: &Page) -> Vec<AuditCheck> {
    let doc = Html::parse_document(&page.body);
    vec![
        check_lang(&doc),
        check_viewport(&doc),
        check_image_alt(&doc),
        check_form_labels(&doc),
        check_link_text(&doc),
    ]
}

#[async_trait]
impl super::Auditor for AccessibilityAuditor {
    fn name(&self) -> &str {
        "accessibility"
    }

    fn description(&self) -> &str {
        "Checks language, mobile viewport, image alt text, form labels and link wording"
    }

    async fn audit(&self, _client: &HttpClient, page: &Page) -> Result<Vec<AuditCheck>> {
        Ok(evaluate_markup(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(checks: &[AuditCheck], id: &str) -> AuditCheck {
        checks
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .unwrap_or_else(|| panic!("no check {id}"))
    }

    #[test]
    fn test_inaccessible_page() {
        let page = Page::from_parts(
            "https://example.com/",
            &[],
            r#"<html><body>
                <img src="a.png"><img src="b.png"><img src="c.png" alt="Team">
                <form><input type="text" name="email" placeholder="Email"></form>
                <a href="/about">Click here</a>
            </body></html>"#,
            10,
        );
        let checks = evaluate_markup(&page);
        assert_eq!(find(&checks, "accessibility.lang").status, CheckStatus::Amber);
        assert_eq!(find(&checks, "accessibility.viewport").status, CheckStatus::Red);
        assert_eq!(find(&checks, "accessibility.image_alt").status, CheckStatus::Red);
        assert_eq!(find(&checks, "accessibility.form_labels").status, CheckStatus::Amber);
        assert_eq!(find(&checks, "accessibility.link_text").status, CheckStatus::Amber);
    }

    #[test]
    fn test_wrapped_hidden_input_does_not_cover_unlabelled_field() {
        let doc = Html::parse_document(
            r#"<form>
                <label><input type="hidden" name="t"><input type="checkbox" id="c"> Subscribe</label>
                <input type="text" name="email">
            </form>"#,
        );
        let check = check_form_labels(&doc);
        assert_eq!(check.status, CheckStatus::Amber);
        assert_eq!(check.detail, "1 form control(s) have no label.");
    }

    #[test]
    fn test_accessible_page() {
        let page = Page::from_parts(
            "https://example.com/",
            &[],
            r#"<html lang="en"><head>
                <meta name="viewport" content="width=device-width, initial-scale=1">
                </head><body>
                <img src="a.png" alt="Our van"><img src="divider.png" alt="">
                <form>
                  <label for="name">Name</label><input id="name" type="text">
                  <label>Email <input type="email"></label>
                  <input type="hidden" name="csrf">
                  <textarea aria-label="Message"></textarea>
                  <input type="submit" value="Send">
                </form>
                <a href="/pricing">See our pricing</a>
            </body></html>"#,
            10,
        );
        let checks = evaluate_markup(&page);
        assert!(checks.iter().all(|c| c.is_passing()), "{checks:#?}");
    }
}
