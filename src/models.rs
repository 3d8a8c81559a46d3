//! Core data models for Vantage

use crate::audit::scoring;
use crate::error::{Result, VantageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Traffic-light outcome of a single audit check
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Red,
    Amber,
    Green,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Red => write!(f, "RED"),
            CheckStatus::Amber => write!(f, "AMBER"),
            CheckStatus::Green => write!(f, "GREEN"),
        }
    }
}

impl CheckStatus {
    /// Returns the HTML color code for reports
    pub fn html_color(&self) -> &str {
        match self {
            CheckStatus::Red => "#dc2626",
            CheckStatus::Amber => "#d97706",
            CheckStatus::Green => "#16a34a",
        }
    }
}

/// Area of the site a check belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Seo,
    Performance,
    Security,
    Accessibility,
    Conversion,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Seo,
        Category::Performance,
        Category::Security,
        Category::Accessibility,
        Category::Conversion,
    ];

    /// Relative weight of the category in the overall score
    pub fn weight(&self) -> u32 {
        match self {
            Category::Seo => 25,
            Category::Performance => 20,
            Category::Security => 20,
            Category::Accessibility => 15,
            Category::Conversion => 20,
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Category::Seo => "SEO",
            Category::Performance => "Performance",
            Category::Security => "Security",
            Category::Accessibility => "Accessibility",
            Category::Conversion => "Conversion",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Effort or impact label attached to a check
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => write!(f, "low"),
            Level::Medium => write!(f, "medium"),
            Level::High => write!(f, "high"),
        }
    }
}

/// One scored heuristic computed against a fetched page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditCheck {
    /// Stable identifier, e.g. `seo.meta_description`
    pub id: String,
    pub title: String,
    pub category: Category,
    pub status: CheckStatus,
    /// Penalty applied to the category score (zero or negative)
    pub score_delta: i32,
    pub effort: Level,
    pub impact: Level,
    /// What was observed on the page
    pub detail: String,
    pub recommendation: String,
}

impl AuditCheck {
    /// Creates a check. Green checks never carry a penalty and penalties
    /// are always stored as negative deltas.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        category: Category,
        status: CheckStatus,
        score_delta: i32,
    ) -> Self {
        let score_delta = match status {
            CheckStatus::Green => 0,
            _ => -score_delta.abs(),
        };
        Self {
            id: id.into(),
            title: title.into(),
            category,
            status,
            score_delta,
            effort: Level::Low,
            impact: Level::Medium,
            detail: String::new(),
            recommendation: String::new(),
        }
    }

    /// Creates a passing check
    pub fn pass(id: impl Into<String>, title: impl Into<String>, category: Category) -> Self {
        Self::new(id, title, category, CheckStatus::Green, 0)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_recommendation(mut self, rec: impl Into<String>) -> Self {
        self.recommendation = rec.into();
        self
    }

    pub fn with_effort(mut self, effort: Level) -> Self {
        self.effort = effort;
        self
    }

    pub fn with_impact(mut self, impact: Level) -> Self {
        self.impact = impact;
        self
    }

    pub fn is_passing(&self) -> bool {
        self.status == CheckStatus::Green
    }
}

/// Overall and per-category scores derived from a list of checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scores {
    pub overall: u8,
    pub grade: String,
    pub categories: BTreeMap<Category, u8>,
}

impl Scores {
    pub fn from_checks(checks: &[AuditCheck]) -> Self {
        scoring::score(checks)
    }
}

/// Lifecycle of a scan. Status only ever moves forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Queued,
    Processing,
    Complete,
    Failed,
}

impl ScanStatus {
    fn rank(&self) -> u8 {
        match self {
            ScanStatus::Queued => 0,
            ScanStatus::Processing => 1,
            ScanStatus::Complete | ScanStatus::Failed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    /// Whether a transition from `self` to `next` moves forward
    pub fn can_advance_to(&self, next: ScanStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStatus::Queued => write!(f, "QUEUED"),
            ScanStatus::Processing => write!(f, "PROCESSING"),
            ScanStatus::Complete => write!(f, "COMPLETE"),
            ScanStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// One run of the website audit against a submitted URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: String,
    pub lead_id: Option<String>,
    pub target: String,
    pub status: ScanStatus,
    /// Percentage, 100 only once complete
    pub progress: u8,
    pub scores: Option<Scores>,
    pub checks: Vec<AuditCheck>,
    pub narrative: Option<String>,
    /// Path of the rendered PDF report, when one was written
    pub report_path: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Scan {
    /// Creates a queued scan
    pub fn new(target: impl Into<String>, lead_id: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            lead_id,
            target: target.into(),
            status: ScanStatus::Queued,
            progress: 0,
            scores: None,
            checks: Vec::new(),
            narrative: None,
            report_path: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    fn advance(&mut self, next: ScanStatus) -> Result<()> {
        if !self.status.can_advance_to(next) {
            return Err(VantageError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// QUEUED -> PROCESSING
    pub fn start(&mut self) -> Result<()> {
        self.advance(ScanStatus::Processing)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Raises progress while processing. Never lowers it and never reports
    /// 100 before completion.
    pub fn set_progress(&mut self, progress: u8) -> Result<()> {
        if self.status != ScanStatus::Processing {
            return Err(VantageError::InvalidTransition {
                from: self.status.to_string(),
                to: ScanStatus::Processing.to_string(),
            });
        }
        self.progress = self.progress.max(progress.min(99));
        Ok(())
    }

    /// PROCESSING -> COMPLETE. Scores are derived from `checks` here and
    /// nowhere else.
    pub fn complete(
        &mut self,
        checks: Vec<AuditCheck>,
        narrative: String,
        report_path: Option<String>,
    ) -> Result<()> {
        if self.status != ScanStatus::Processing {
            return Err(VantageError::InvalidTransition {
                from: self.status.to_string(),
                to: ScanStatus::Complete.to_string(),
            });
        }
        self.advance(ScanStatus::Complete)?;
        self.scores = Some(Scores::from_checks(&checks));
        self.checks = checks;
        self.narrative = Some(narrative);
        self.report_path = report_path;
        self.progress = 100;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// QUEUED | PROCESSING -> FAILED
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<()> {
        self.advance(ScanStatus::Failed)?;
        self.error = Some(reason.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Returns count of checks with the given status
    pub fn count_by_status(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }
}

/// Funnel entry point a lead came through
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LeadSource {
    Contact,
    Audit,
    Booking,
}

impl fmt::Display for LeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeadSource::Contact => write!(f, "contact"),
            LeadSource::Audit => write!(f, "audit"),
            LeadSource::Booking => write!(f, "booking"),
        }
    }
}

/// A prospective customer's contact record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lead {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub business_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    /// Reason for getting in touch, in the lead's own words
    pub concern: Option<String>,
    pub industry: Option<String>,
    pub source: LeadSource,
    pub scan_id: Option<String>,
}

impl Lead {
    /// Best available contact detail for display
    pub fn contact(&self) -> &str {
        self.email
            .as_deref()
            .or(self.phone.as_deref())
            .unwrap_or("")
    }

    /// Business name if given, else the person's name
    pub fn display_name(&self) -> &str {
        self.business_name.as_deref().unwrap_or(&self.name)
    }
}

/// Configuration for fetching and auditing pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User-Agent header value
    pub user_agent: String,
    /// Whether to follow HTTP redirects
    pub follow_redirects: bool,
    /// Largest HTML body read from a target, in bytes
    pub max_page_bytes: usize,
    /// Auditor modules to execute
    pub checks: Vec<String>,
    /// Number of background audit workers
    pub workers: usize,
    /// Upper bound on one audit job, in seconds
    pub job_timeout_secs: u64,
    /// Window during which a repeat request reuses an existing scan
    pub reuse_window_minutes: i64,
    /// Maximum requests per second against a target (None = unlimited)
    pub rate_limit: Option<u32>,
    /// Accept loopback, private and link-local targets from visitors
    pub allow_private_targets: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            user_agent: "Vantage-Audit/0.1.0".to_string(),
            follow_redirects: true,
            max_page_bytes: 5 * 1024 * 1024,
            checks: vec![
                "seo".to_string(),
                "performance".to_string(),
                "security".to_string(),
                "accessibility".to_string(),
                "conversion".to_string(),
            ],
            workers: 2,
            job_timeout_secs: 90,
            reuse_window_minutes: 60,
            rate_limit: Some(10),
            allow_private_targets: false,
        }
    }
}
