//! Audit intake and the background worker pool that processes scans

pub mod portal;
pub mod store;

pub use portal::{PortalSession, PortalSessions};
pub use store::{Store, Summary};

use crate::audit::{self, narrative, AuditEngine, Page};
use crate::config::AppConfig;
use crate::error::{Result, VantageError};
use crate::http::HttpClient;
use crate::leads::{self, LeadSubmission};
use crate::models::{LeadSource, Scan, ScanStatus, Scores};
use crate::report;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Returned to the visitor who requested an audit
#[derive(Debug, Clone, Serialize)]
pub struct AuditTicket {
    pub lead_id: String,
    pub scan_id: String,
    pub portal_token: String,
    pub status: ScanStatus,
    /// True when a recent scan of the same site was handed back
    pub reused: bool,
}

/// Handle for submitting audits to the worker pool
#[derive(Clone)]
pub struct AuditPipeline {
    queue: mpsc::UnboundedSender<String>,
    store: Store,
    config: Arc<AppConfig>,
}

struct WorkerContext {
    store: Store,
    config: Arc<AppConfig>,
    engine: Arc<AuditEngine>,
}

impl AuditPipeline {
    /// Spawns `audit.workers` tasks consuming the scan queue
    pub fn start(config: Arc<AppConfig>, store: Store, engine: Arc<AuditEngine>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let rx = Arc::new(Mutex::new(rx));
        let ctx = Arc::new(WorkerContext {
            store: store.clone(),
            config: Arc::clone(&config),
            engine,
        });

        let workers = config.audit.workers.max(1);
        for worker_id in 0..workers {
            let rx = Arc::clone(&rx);
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(scan_id) = next else { break };
                    run_job(&ctx, &scan_id).await;
                }
                debug!("Audit worker {worker_id} stopped");
            });
        }
        info!("Started {workers} audit workers");

        Self {
            queue: tx,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn portal_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.config.portal.ttl_hours)
    }

    /// Adds a queued scan to the work queue
    pub fn enqueue(&self, scan_id: &str) -> Result<()> {
        self.queue
            .send(scan_id.to_string())
            .map_err(|_| VantageError::QueueClosed)
    }

    /// Re-queues scans recovered from a snapshot
    pub fn resume(&self, pending: &[String]) -> Result<()> {
        for scan_id in pending {
            self.enqueue(scan_id)?;
        }
        if !pending.is_empty() {
            info!("Re-queued {} scans from the previous run", pending.len());
        }
        Ok(())
    }

    /// Validates an audit request, reuses a recent scan of the same site for
    /// the same email when one exists, otherwise records a new lead and a
    /// queued scan. A fresh portal token is issued either way.
    pub async fn submit_audit(&self, submission: &LeadSubmission) -> Result<AuditTicket> {
        let lead = leads::validate(submission, LeadSource::Audit)?;
        let website = lead
            .website
            .clone()
            .ok_or_else(|| VantageError::invalid("website: is required"))?;
        if !self.config.audit.allow_private_targets && leads::is_private_target(&website) {
            return Err(VantageError::invalid("website: must be a public address"));
        }

        let window = self.config.audit.reuse_window_minutes;
        if let (Some(email), true) = (lead.email.as_deref(), window > 0) {
            let since = Utc::now() - chrono::Duration::minutes(window);
            if let Some(existing) = self.store.find_recent_scan(email, &website, since).await {
                let token = self.store.issue_portal(&existing.id, self.portal_ttl()).await?;
                info!("Reusing scan {} for {}", existing.id, website);
                return Ok(AuditTicket {
                    lead_id: existing.lead_id.unwrap_or_default(),
                    scan_id: existing.id,
                    portal_token: token,
                    status: existing.status,
                    reused: true,
                });
            }
        }

        let (lead, scan) = self
            .store
            .create_audit(lead, Scan::new(website, None))
            .await?;
        if let Err(e) = self.enqueue(&scan.id) {
            if let Err(fail) = self.store.fail_scan(&scan.id, "audit queue unavailable").await {
                error!("Could not mark scan {} failed: {fail}", scan.id);
            }
            return Err(e);
        }
        info!("Queued scan {} of {} for lead {}", scan.id, scan.target, lead.id);
        let token = self.store.issue_portal(&scan.id, self.portal_ttl()).await?;

        Ok(AuditTicket {
            lead_id: lead.id,
            scan_id: scan.id,
            portal_token: token,
            status: scan.status,
            reused: false,
        })
    }
}

/// Runs one job under the configured timeout and records any failure
async fn run_job(ctx: &WorkerContext, scan_id: &str) {
    let limit = ctx.config.audit.job_timeout_secs;
    let outcome = match tokio::time::timeout(
        Duration::from_secs(limit),
        process(&ctx.store, &ctx.config, &ctx.engine, scan_id),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(VantageError::AuditTimeout(limit)),
    };

    match outcome {
        Ok(scan) => info!(
            "Scan {} complete: {}/100",
            scan.id,
            scan.scores.as_ref().map_or(0, |s| s.overall)
        ),
        Err(e) => {
            warn!("Scan {scan_id} failed: {e}");
            if let Err(fail_err) = ctx.store.fail_scan(scan_id, &e.to_string()).await {
                error!("Could not mark scan {scan_id} as failed: {fail_err}");
            }
        }
    }
}

/// Fetches the target, runs every enabled auditor, renders reports and
/// completes the scan
pub async fn process(
    store: &Store,
    config: &AppConfig,
    engine: &AuditEngine,
    scan_id: &str,
) -> Result<Scan> {
    let scan = store.start_scan(scan_id).await?;
    let lead = match scan.lead_id {
        Some(ref id) => store.get_lead(id).await,
        None => None,
    };

    let client = HttpClient::from_config(&config.audit)?;
    let page = Page::fetch(&client, &scan.target).await?;
    if !config.audit.allow_private_targets && leads::is_private_target(&page.final_url) {
        return Err(VantageError::TargetUnreachable(format!(
            "{} redirected to a non-public address",
            scan.target
        )));
    }
    store.update_progress(scan_id, 20).await?;

    let auditors = engine.enabled(&config.audit);
    let total = auditors.len().max(1);
    let mut checks = Vec::new();
    for (i, auditor) in auditors.iter().enumerate() {
        checks.extend(audit::run_auditor(auditor.as_ref(), &client, &page).await);
        let progress = 20 + 65 * (i + 1) / total;
        store.update_progress(scan_id, progress as u8).await?;
    }
    let checks = audit::finalize_checks(checks);
    debug!(
        "Scan {scan_id}: {} checks after {} requests",
        checks.len(),
        client.request_count()
    );

    let scores = Scores::from_checks(&checks);
    let narrative = narrative::generate(&scores, &checks, lead.as_ref(), &scan.target);

    let mut finished = scan.clone();
    finished.complete(checks.clone(), narrative.clone(), None)?;
    let report_path = report::write_reports(&finished, lead.as_ref(), &config.storage)?;
    store.update_progress(scan_id, 95).await?;

    store
        .complete_scan(scan_id, checks, narrative, report_path)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_pipeline(config: AppConfig) -> (AuditPipeline, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = AuditPipeline {
            queue: tx,
            store: Store::in_memory(),
            config: Arc::new(config),
        };
        (pipeline, rx)
    }

    fn submission() -> LeadSubmission {
        LeadSubmission {
            name: "Jo".to_string(),
            email: Some("jo@example.com".to_string()),
            website: Some("example.com".to_string()),
            ..LeadSubmission::default()
        }
    }

    #[tokio::test]
    async fn test_submit_queues_scan_and_issues_token() {
        let (pipeline, mut rx) = idle_pipeline(AppConfig::default());
        let ticket = pipeline.submit_audit(&submission()).await.expect("submit");

        assert!(!ticket.reused);
        assert_eq!(ticket.status, ScanStatus::Queued);
        assert_eq!(rx.recv().await.as_deref(), Some(ticket.scan_id.as_str()));

        let session = pipeline
            .store()
            .resolve_portal(&ticket.portal_token)
            .await
            .expect("session");
        assert_eq!(session.scan_id, ticket.scan_id);
        assert_eq!(session.lead_id.as_deref(), Some(ticket.lead_id.as_str()));
    }

    #[tokio::test]
    async fn test_repeat_submission_reuses_scan() {
        let (pipeline, mut rx) = idle_pipeline(AppConfig::default());
        let first = pipeline.submit_audit(&submission()).await.expect("first");
        let second = pipeline.submit_audit(&submission()).await.expect("second");

        assert!(second.reused);
        assert_eq!(second.scan_id, first.scan_id);
        assert_ne!(second.portal_token, first.portal_token);
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
        assert_eq!(pipeline.store().list_scans().await.len(), 1);
    }

    #[tokio::test]
    async fn test_reuse_disabled() {
        let mut config = AppConfig::default();
        config.audit.reuse_window_minutes = 0;
        let (pipeline, _rx) = idle_pipeline(config);
        let first = pipeline.submit_audit(&submission()).await.expect("first");
        let second = pipeline.submit_audit(&submission()).await.expect("second");
        assert_ne!(first.scan_id, second.scan_id);
    }

    #[tokio::test]
    async fn test_private_targets_rejected_unless_allowed() {
        let (pipeline, _rx) = idle_pipeline(AppConfig::default());
        let internal = LeadSubmission {
            website: Some("http://169.254.169.254/latest/meta-data/".to_string()),
            ..submission()
        };
        match pipeline.submit_audit(&internal).await {
            Err(VantageError::ValidationError(fields)) => {
                assert_eq!(fields, vec!["website: must be a public address".to_string()])
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(pipeline.store().list_scans().await.is_empty());

        let mut config = AppConfig::default();
        config.audit.allow_private_targets = true;
        let (pipeline, mut rx) = idle_pipeline(config);
        let ticket = pipeline.submit_audit(&internal).await.expect("allowed");
        assert_eq!(rx.recv().await.as_deref(), Some(ticket.scan_id.as_str()));
    }

    #[tokio::test]
    async fn test_invalid_submission_creates_nothing() {
        let (pipeline, _rx) = idle_pipeline(AppConfig::default());
        let bad = LeadSubmission {
            name: "Jo".to_string(),
            email: Some("jo@example.com".to_string()),
            ..LeadSubmission::default()
        };
        assert!(matches!(
            pipeline.submit_audit(&bad).await,
            Err(VantageError::ValidationError(_))
        ));
        assert!(pipeline.store().list_leads().await.is_empty());
    }

    #[tokio::test]
    async fn test_closed_queue_does_not_leave_reusable_scan() {
        let (pipeline, rx) = idle_pipeline(AppConfig::default());
        drop(rx);
        assert!(matches!(
            pipeline.submit_audit(&submission()).await,
            Err(VantageError::QueueClosed)
        ));
        let scans = pipeline.store().list_scans().await;
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].status, ScanStatus::Failed);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let pipeline = AuditPipeline {
            queue: tx,
            ..pipeline
        };
        let retry = pipeline.submit_audit(&submission()).await.expect("retry");
        assert!(!retry.reused);
        assert_ne!(retry.scan_id, scans[0].id);
        assert_eq!(rx.recv().await.as_deref(), Some(retry.scan_id.as_str()));
    }

    #[tokio::test]
    async fn test_enqueue_after_workers_gone() {
        let (pipeline, rx) = idle_pipeline(AppConfig::default());
        drop(rx);
        assert!(matches!(
            pipeline.enqueue("scan-1"),
            Err(VantageError::QueueClosed)
        ));
    }
}
