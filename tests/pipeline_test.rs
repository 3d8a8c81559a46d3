//! Integration tests for audit intake and background processing

mod common;

use std::sync::Arc;
use vantage::audit::AuditEngine;
use vantage::leads::LeadSubmission;
use vantage::models::ScanStatus;
use vantage::pipeline::{AuditPipeline, Store};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn submission(website: &str) -> LeadSubmission {
    LeadSubmission {
        name: "Jo Smith".to_string(),
        business_name: Some("Smith Plumbing".to_string()),
        email: Some("jo@example.com".to_string()),
        website: Some(website.to_string()),
        concern: Some("The site feels slow".to_string()),
        industry: Some("Plumbing".to_string()),
        ..LeadSubmission::default()
    }
}

#[tokio::test]
async fn test_audit_runs_to_completion() {
    let site = MockServer::start().await;
    common::mount_site(&site, common::GOOD_PAGE).await;
    let dir = tempfile::tempdir().expect("temp dir");

    let config = Arc::new(common::app_config(Some(dir.path())));
    let store = Store::in_memory();
    let pipeline = AuditPipeline::start(
        Arc::clone(&config),
        store.clone(),
        Arc::new(AuditEngine::with_defaults()),
    );

    let ticket = pipeline
        .submit_audit(&submission(&format!("{}/", site.uri())))
        .await
        .expect("submit");
    assert_eq!(ticket.status, ScanStatus::Queued);

    let scan = common::wait_for_terminal(&store, &ticket.scan_id).await;
    assert_eq!(scan.status, ScanStatus::Complete, "{:?}", scan.error);
    assert_eq!(scan.progress, 100);
    assert_eq!(scan.lead_id.as_deref(), Some(ticket.lead_id.as_str()));

    let scores = scan.scores.as_ref().expect("scores");
    assert!(scores.overall > 0);
    assert!(!scan.checks.is_empty());

    let narrative = scan.narrative.as_deref().expect("narrative");
    assert!(narrative.starts_with("Smith Plumbing, your website"));
    assert!(narrative.contains("For plumbing businesses"));

    let report = scan.report_path.as_deref().expect("report path");
    let pdf = std::fs::read(report).expect("pdf written");
    assert!(pdf.starts_with(b"%PDF"));

    let lead = store.get_lead(&ticket.lead_id).await.expect("lead");
    assert_eq!(lead.scan_id.as_deref(), Some(scan.id.as_str()));
}

#[tokio::test]
async fn test_unreachable_target_fails_scan() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&site)
        .await;

    let config = Arc::new(common::app_config(None));
    let store = Store::in_memory();
    let pipeline = AuditPipeline::start(
        config,
        store.clone(),
        Arc::new(AuditEngine::with_defaults()),
    );

    let ticket = pipeline
        .submit_audit(&submission(&format!("{}/", site.uri())))
        .await
        .expect("submit");
    let scan = common::wait_for_terminal(&store, &ticket.scan_id).await;

    assert_eq!(scan.status, ScanStatus::Failed);
    assert!(scan.scores.is_none());
    assert!(scan.error.as_deref().is_some_and(|e| e.contains("503")));
}

#[tokio::test]
async fn test_slow_target_times_out() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(common::GOOD_PAGE)
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&site)
        .await;

    let mut config = common::app_config(None);
    config.audit.job_timeout_secs = 1;
    let store = Store::in_memory();
    let pipeline = AuditPipeline::start(
        Arc::new(config),
        store.clone(),
        Arc::new(AuditEngine::with_defaults()),
    );

    let ticket = pipeline
        .submit_audit(&submission(&format!("{}/", site.uri())))
        .await
        .expect("submit");
    let scan = common::wait_for_terminal(&store, &ticket.scan_id).await;

    assert_eq!(scan.status, ScanStatus::Failed);
    assert!(scan
        .error
        .as_deref()
        .is_some_and(|e| e.contains("timeout")));
}

#[tokio::test]
async fn test_queued_scans_resume_after_restart() {
    let site = MockServer::start().await;
    common::mount_site(&site, common::GOOD_PAGE).await;
    let dir = tempfile::tempdir().expect("temp dir");
    let data_dir = dir.path().join("data");

    let scan_id = {
        let (store, _) = Store::open(&data_dir).await.expect("open");
        let scan = vantage::models::Scan::new(format!("{}/", site.uri()), None);
        store.create_scan(scan).await.expect("create").id
    };

    let (store, pending) = Store::open(&data_dir).await.expect("reopen");
    assert_eq!(pending, vec![scan_id.clone()]);

    let pipeline = AuditPipeline::start(
        Arc::new(common::app_config(None)),
        store.clone(),
        Arc::new(AuditEngine::with_defaults()),
    );
    pipeline.resume(&pending).expect("resume");

    let scan = common::wait_for_terminal(&store, &scan_id).await;
    assert_eq!(scan.status, ScanStatus::Complete, "{:?}", scan.error);
    assert!(scan.narrative.as_deref().is_some_and(|n| n.starts_with("The website")));
}
