//! Report rendering for completed scans

pub mod csv;
pub mod html;
pub mod json;
pub mod pdf;

use crate::config::StorageConfig;
use crate::error::Result;
use crate::models::{Lead, Scan};
use tracing::info;

/// Writes the HTML and PDF reports for `scan` into `storage.reports_dir`.
///
/// Returns the PDF path, or None when no reports directory is configured.
pub fn write_reports(
    scan: &Scan,
    lead: Option<&Lead>,
    storage: &StorageConfig,
) -> Result<Option<String>> {
    let Some(ref dir) = storage.reports_dir else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir)?;

    let html_path = dir.join(format!("{}.html", scan.id));
    html::generate(scan, lead, storage.templates_dir.as_deref(), &html_path)?;

    let pdf_path = dir.join(format!("{}.pdf", scan.id));
    pdf::generate(scan, lead, &pdf_path)?;

    info!("Reports for scan {} written to {}", scan.id, dir.display());
    Ok(Some(pdf_path.display().to_string()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{AuditCheck, Category, CheckStatus, Lead, LeadSource, Level, Scan};
    use chrono::Utc;

    pub fn lead() -> Lead {
        Lead {
            id: "lead-1".to_string(),
            created_at: Utc::now(),
            name: "Jo Smith".to_string(),
            business_name: Some("Smith & Sons, Plumbing".to_string()),
            email: Some("jo@example.com".to_string()),
            phone: Some("0113 496 0000".to_string()),
            website: Some("https://example.com/".to_string()),
            concern: Some("Not enough \"calls\"".to_string()),
            industry: Some("plumbing".to_string()),
            source: LeadSource::Audit,
            scan_id: None,
        }
    }

    pub fn completed_scan() -> Scan {
        let mut scan = Scan::new("https://example.com/", Some("lead-1".to_string()));
        scan.start().expect("start");
        let checks = vec![
            AuditCheck::new("security.https", "HTTPS", Category::Security, CheckStatus::Red, 40)
                .with_impact(Level::High)
                .with_detail("The page is served over plain HTTP.")
                .with_recommendation("Install a TLS certificate <today>."),
            AuditCheck::pass("seo.title", "Page title", Category::Seo)
                .with_detail("Title is 42 characters."),
        ];
        scan.complete(checks, "First paragraph.\n\nSecond paragraph.".to_string(), None)
            .expect("complete");
        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_reports_without_directory() {
        let scan = fixtures::completed_scan();
        let out = write_reports(&scan, None, &StorageConfig::default()).expect("no-op");
        assert!(out.is_none());
    }

    #[test]
    fn test_write_reports_to_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = StorageConfig {
            reports_dir: Some(dir.path().join("reports")),
            ..StorageConfig::default()
        };
        let scan = fixtures::completed_scan();
        let lead = fixtures::lead();

        let path = write_reports(&scan, Some(&lead), &storage)
            .expect("write")
            .expect("pdf path");
        assert!(path.ends_with(&format!("{}.pdf", scan.id)));
        let pdf = std::fs::read(&path).expect("pdf exists");
        assert!(pdf.starts_with(b"%PDF"));
        assert!(dir
            .path()
            .join("reports")
            .join(format!("{}.html", scan.id))
            .exists());
    }
}
