//! Score computation. Scores depend only on the set of checks.

use crate::models::{AuditCheck, Category, Scores};
use std::collections::BTreeMap;

/// Computes per-category and overall scores for a list of checks.
///
/// A category starts at 100 and accumulates the deltas of its checks,
/// clamped to 0..=100. The overall score is the weighted mean of the
/// categories that have at least one check, rounded half up.
pub fn score(checks: &[AuditCheck]) -> Scores {
    let mut totals: BTreeMap<Category, i32> = BTreeMap::new();
    for check in checks {
        *totals.entry(check.category).or_insert(0) += check.score_delta;
    }

    let categories: BTreeMap<Category, u8> = totals
        .into_iter()
        .map(|(category, delta)| (category, (100 + delta).clamp(0, 100) as u8))
        .collect();

    let (weighted, weights) = categories
        .iter()
        .fold((0u32, 0u32), |(sum, total), (category, score)| {
            (
                sum + category.weight() * u32::from(*score),
                total + category.weight(),
            )
        });

    let overall = if weights == 0 {
        0
    } else {
        ((weighted + weights / 2) / weights) as u8
    };

    Scores {
        overall,
        grade: grade(overall).to_string(),
        categories,
    }
}

/// Letter grade for a 0-100 score
pub fn grade(score: u8) -> &'static str {
    match score {
        90..=u8::MAX => "A",
        80..=89 => "B",
        70..=79 => "C",
        60..=69 => "D",
        _ => "F",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckStatus;

    fn check(id: &str, category: Category, status: CheckStatus, delta: i32) -> AuditCheck {
        AuditCheck::new(id, id, category, status, delta)
    }

    #[test]
    fn test_empty_checks_score_zero() {
        let scores = score(&[]);
        assert_eq!(scores.overall, 0);
        assert_eq!(scores.grade, "F");
        assert!(scores.categories.is_empty());
    }

    #[test]
    fn test_weighted_overall() {
        let checks = vec![
            check("seo.title", Category::Seo, CheckStatus::Red, 20),
            check("security.https", Category::Security, CheckStatus::Red, 40),
            check("security.hsts", Category::Security, CheckStatus::Green, 0),
        ];
        let scores = score(&checks);
        assert_eq!(scores.categories.get(&Category::Seo), Some(&80));
        assert_eq!(scores.categories.get(&Category::Security), Some(&60));
        // (25 * 80 + 20 * 60) / 45 = 71.1
        assert_eq!(scores.overall, 71);
        assert_eq!(scores.grade, "C");
    }

    #[test]
    fn test_category_clamped_at_zero() {
        let checks = vec![
            check("a", Category::Conversion, CheckStatus::Red, 60),
            check("b", Category::Conversion, CheckStatus::Red, 60),
        ];
        let scores = score(&checks);
        assert_eq!(scores.categories.get(&Category::Conversion), Some(&0));
        assert_eq!(scores.overall, 0);
    }

    #[test]
    fn test_order_independent() {
        let mut checks = vec![
            check("a", Category::Seo, CheckStatus::Amber, 5),
            check("b", Category::Performance, CheckStatus::Red, 25),
            check("c", Category::Accessibility, CheckStatus::Amber, 10),
            check("d", Category::Conversion, CheckStatus::Green, 0),
        ];
        let forward = score(&checks);
        checks.reverse();
        assert_eq!(forward, score(&checks));
    }

    #[test]
    fn test_grades() {
        assert_eq!(grade(100), "A");
        assert_eq!(grade(90), "A");
        assert_eq!(grade(89), "B");
        assert_eq!(grade(70), "C");
        assert_eq!(grade(60), "D");
        assert_eq!(grade(59), "F");
    }
}
