//! Plain-language summary of an audit, written for the business owner

use crate::models::{AuditCheck, Category, Lead, Scores};
use std::cmp::Reverse;

const QUICK_WIN_LIMIT: usize = 3;

/// Keywords in a lead's stated concern mapped to the category they relate to
const CONCERN_KEYWORDS: &[(&str, Category)] = &[
    ("seo", Category::Seo),
    ("google", Category::Seo),
    ("rank", Category::Seo),
    ("search", Category::Seo),
    ("slow", Category::Performance),
    ("speed", Category::Performance),
    ("load", Category::Performance),
    ("hack", Category::Security),
    ("secure", Category::Security),
    ("ssl", Category::Security),
    ("mobile", Category::Accessibility),
    ("phone", Category::Accessibility),
    ("access", Category::Accessibility),
    ("lead", Category::Conversion),
    ("enquir", Category::Conversion),
    ("inquir", Category::Conversion),
    ("call", Category::Conversion),
    ("customer", Category::Conversion),
    ("sales", Category::Conversion),
];

fn verdict(grade: &str) -> &'static str {
    match grade {
        "A" => "is in excellent shape",
        "B" => "is performing well, with a few gaps worth closing",
        "C" => "has a solid base but is leaving enquiries on the table",
        "D" => "has several issues that are holding it back",
        _ => "needs significant work before it can compete for customers",
    }
}

/// Failing checks ordered by impact (high first), effort (low first),
/// then penalty size
pub fn quick_wins(checks: &[AuditCheck]) -> Vec<&AuditCheck> {
    let mut failing: Vec<&AuditCheck> = checks.iter().filter(|c| !c.is_passing()).collect();
    failing.sort_by_key(|c| (Reverse(c.impact), c.effort, c.score_delta, c.id.clone()));
    failing.truncate(QUICK_WIN_LIMIT);
    failing
}

fn concern_category(concern: &str) -> Option<Category> {
    let lower = concern.to_lowercase();
    CONCERN_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, category)| *category)
}

/// Builds the narrative for a completed audit
pub fn generate(scores: &Scores, checks: &[AuditCheck], lead: Option<&Lead>, target: &str) -> String {
    let mut paragraphs = Vec::new();

    let subject = match lead {
        Some(l) => format!("{}, your website ({target})", l.display_name()),
        None => format!("The website {target}"),
    };
    paragraphs.push(format!(
        "{subject} scored {}/100 (grade {}) and {}.",
        scores.overall,
        scores.grade,
        verdict(&scores.grade)
    ));

    let strongest = scores
        .categories
        .iter()
        .max_by_key(|(category, score)| (**score, Reverse(**category)));
    let weakest = scores
        .categories
        .iter()
        .min_by_key(|(category, score)| (**score, **category));
    if let (Some((best, best_score)), Some((worst, worst_score))) = (strongest, weakest) {
        if best != worst {
            paragraphs.push(format!(
                "The strongest area is {best} ({best_score}/100); the weakest is {worst} ({worst_score}/100)."
            ));
        }
    }

    let wins = quick_wins(checks);
    if wins.is_empty() {
        paragraphs.push("We found no outstanding issues on the page we checked.".to_string());
    } else {
        let mut section = String::from("Quick wins:");
        for (i, check) in wins.iter().enumerate() {
            let action = if check.recommendation.is_empty() {
                check.detail.as_str()
            } else {
                check.recommendation.as_str()
            };
            section.push_str(&format!("\n{}. {}: {}", i + 1, check.title, action));
        }
        paragraphs.push(section);
    }

    if let Some(lead) = lead {
        if let Some(concern) = lead.concern.as_deref().filter(|c| !c.trim().is_empty()) {
            let mut sentence = format!("You told us your main concern is \"{}\".", concern.trim());
            if let Some(category) = concern_category(concern) {
                if let Some(score) = scores.categories.get(&category) {
                    sentence.push_str(&format!(
                        " That relates to {category}, which scored {score}/100."
                    ));
                }
            }
            paragraphs.push(sentence);
        }
        if let Some(industry) = lead.industry.as_deref().filter(|i| !i.trim().is_empty()) {
            let conversion = scores
                .categories
                .get(&Category::Conversion)
                .map(|s| format!(" Your conversion score is {s}/100."))
                .unwrap_or_default();
            paragraphs.push(format!(
                "For {} businesses, most new customers decide within seconds whether to call or move on, so clear contact options matter most.{conversion}",
                industry.trim()
            ));
        }
    }

    paragraphs.push(
        "Book a free 20-minute review and we will walk you through each fix.".to_string(),
    );

    paragraphs.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::scoring;
    use crate::models::{CheckStatus, LeadSource, Level};
    use chrono::Utc;

    fn sample_checks() -> Vec<AuditCheck> {
        vec![
            AuditCheck::new("seo.canonical", "Canonical URL", Category::Seo, CheckStatus::Amber, 5)
                .with_impact(Level::Low)
                .with_recommendation("Declare the canonical URL."),
            AuditCheck::new("security.https", "HTTPS", Category::Security, CheckStatus::Red, 40)
                .with_effort(Level::Medium)
                .with_impact(Level::High)
                .with_recommendation("Install a certificate."),
            AuditCheck::new(
                "conversion.phone_link",
                "Click-to-call",
                Category::Conversion,
                CheckStatus::Amber,
                10,
            )
            .with_effort(Level::Low)
            .with_impact(Level::High)
            .with_recommendation("Add a tel: link."),
            AuditCheck::pass("seo.title", "Page title", Category::Seo),
        ]
    }

    fn sample_lead() -> Lead {
        Lead {
            id: "lead-1".to_string(),
            created_at: Utc::now(),
            name: "Jo Smith".to_string(),
            business_name: Some("Smith Plumbing".to_string()),
            email: Some("jo@example.com".to_string()),
            phone: None,
            website: Some("https://example.com/".to_string()),
            concern: Some("Not getting enough calls".to_string()),
            industry: Some("plumbing".to_string()),
            source: LeadSource::Audit,
            scan_id: None,
        }
    }

    #[test]
    fn test_quick_wins_order() {
        let checks = sample_checks();
        let wins: Vec<&str> = quick_wins(&checks).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            wins,
            vec!["conversion.phone_link", "security.https", "seo.canonical"]
        );
    }

    #[test]
    fn test_narrative_mentions_lead_context() {
        let checks = sample_checks();
        let scores = scoring::score(&checks);
        let lead = sample_lead();
        let text = generate(&scores, &checks, Some(&lead), "https://example.com/");

        assert!(text.starts_with("Smith Plumbing, your website (https://example.com/) scored"));
        assert!(text.contains("Quick wins:\n1. Click-to-call: Add a tel: link."));
        assert!(text.contains("That relates to Conversion, which scored 90/100."));
        assert!(text.contains("For plumbing businesses"));
    }

    #[test]
    fn test_narrative_is_deterministic() {
        let checks = sample_checks();
        let scores = scoring::score(&checks);
        let a = generate(&scores, &checks, None, "https://example.com/");
        let b = generate(&scores, &checks, None, "https://example.com/");
        assert_eq!(a, b);
        assert!(a.starts_with("The website https://example.com/ scored"));
    }

    #[test]
    fn test_clean_audit() {
        let checks = vec![AuditCheck::pass("seo.title", "Page title", Category::Seo)];
        let scores = scoring::score(&checks);
        let text = generate(&scores, &checks, None, "https://example.com/");
        assert!(text.contains("no outstanding issues"));
        assert!(!text.contains("strongest area"));
    }
}
