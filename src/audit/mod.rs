//! Audit engine and auditor trait definitions

pub mod accessibility;
pub mod conversion;
pub mod dom;
pub mod narrative;
pub mod page;
pub mod performance;
pub mod scoring;
pub mod security;
pub mod seo;

pub use page::Page;

use crate::error::Result;
use crate::http::HttpClient;
use crate::models::{AuditCheck, AuditConfig};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};

/// Trait that all auditor modules must implement
#[async_trait]
pub trait Auditor: Send + Sync {
    /// Returns the module name
    fn name(&self) -> &str;

    /// Returns a description of what this module checks
    fn description(&self) -> &str;

    /// Evaluates the page and returns one check per heuristic
    async fn audit(&self, client: &HttpClient, page: &Page) -> Result<Vec<AuditCheck>>;
}

/// Orchestrates the execution of all registered auditors
pub struct AuditEngine {
    auditors: Vec<Arc<dyn Auditor>>,
}

impl AuditEngine {
    /// Creates a new AuditEngine with no registered auditors
    pub fn new() -> Self {
        Self {
            auditors: Vec::new(),
        }
    }

    /// Creates an AuditEngine with all default auditors registered
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.register(Arc::new(seo::SeoAuditor));
        engine.register(Arc::new(performance::PerformanceAuditor));
        engine.register(Arc::new(security::SecurityAuditor));
        engine.register(Arc::new(accessibility::AccessibilityAuditor));
        engine.register(Arc::new(conversion::ConversionAuditor));
        engine
    }

    /// Registers a new auditor module
    pub fn register(&mut self, auditor: Arc<dyn Auditor>) {
        self.auditors.push(auditor);
    }

    /// Returns information about all registered modules
    pub fn list_auditors(&self) -> Vec<(&str, &str)> {
        self.auditors
            .iter()
            .map(|a| (a.name(), a.description()))
            .collect()
    }

    /// Auditors enabled by the configuration, in registration order
    pub fn enabled(&self, config: &AuditConfig) -> Vec<Arc<dyn Auditor>> {
        self.auditors
            .iter()
            .filter(|a| config.checks.iter().any(|c| c == a.name()))
            .cloned()
            .collect()
    }

    /// Runs every enabled auditor against the page with a terminal progress bar
    pub async fn run(
        &self,
        client: &HttpClient,
        page: &Page,
        config: &AuditConfig,
    ) -> Vec<AuditCheck> {
        let auditors = self.enabled(config);
        let pb = ProgressBar::new(auditors.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        let mut checks = Vec::new();
        for auditor in &auditors {
            pb.set_message(format!("Running {}...", auditor.name()));
            checks.extend(run_auditor(auditor.as_ref(), client, page).await);
            pb.inc(1);
        }
        pb.finish_with_message("Audit complete");

        finalize_checks(checks)
    }
}

impl Default for AuditEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Runs one auditor, logging and swallowing its failure
pub async fn run_auditor(
    auditor: &dyn Auditor,
    client: &HttpClient,
    page: &Page,
) -> Vec<AuditCheck> {
    info!("Executing auditor: {}", auditor.name());
    match auditor.audit(client, page).await {
        Ok(checks) => {
            info!(
                "Auditor '{}' completed: {} checks",
                auditor.name(),
                checks.len()
            );
            checks
        }
        Err(e) => {
            error!("Auditor '{}' failed: {}", auditor.name(), e);
            Vec::new()
        }
    }
}

/// Drops duplicate check ids (first wins) and orders red, amber, green then by id
pub fn finalize_checks(mut checks: Vec<AuditCheck>) -> Vec<AuditCheck> {
    let mut seen = HashSet::new();
    checks.retain(|c| seen.insert(c.id.clone()));
    checks.sort_by(|a, b| a.status.cmp(&b.status).then_with(|| a.id.cmp(&b.id)));
    checks
}
