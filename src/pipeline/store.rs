//! Shared application state with an optional JSON snapshot on disk

use super::portal::{PortalSession, PortalSessions};
use crate::booking::{Booking, BookingRequest, Scheduler, Slot};
use crate::error::{Result, VantageError};
use crate::models::{AuditCheck, Lead, Scan, ScanStatus};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const SNAPSHOT_FILE: &str = "state.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    leads: HashMap<String, Lead>,
    scans: HashMap<String, Scan>,
    bookings: Vec<Booking>,
    portal: PortalSessions,
}

/// Aggregate figures for the admin summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub leads_total: usize,
    pub leads_by_source: BTreeMap<String, usize>,
    pub leads_by_industry: BTreeMap<String, usize>,
    pub scans_by_status: BTreeMap<String, usize>,
    /// Mean overall score of completed scans
    pub average_score: Option<f64>,
    pub upcoming_bookings: usize,
}

/// Thread-safe store of leads, scans, bookings and portal sessions
#[derive(Clone)]
pub struct Store {
    state: Arc<RwLock<StoreState>>,
    snapshot_path: Option<PathBuf>,
}

impl Store {
    /// Creates a store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            snapshot_path: None,
        }
    }

    /// Opens the store in `data_dir`, loading a previous snapshot if present.
    ///
    /// Recovery: scans still QUEUED are returned so the caller can re-queue
    /// them; scans caught mid-processing are failed.
    pub async fn open(data_dir: &Path) -> Result<(Self, Vec<String>)> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(SNAPSHOT_FILE);

        let mut state = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str::<StoreState>(&content)?
        } else {
            StoreState::default()
        };

        let mut pending = Vec::new();
        for scan in state.scans.values_mut() {
            match scan.status {
                ScanStatus::Queued => pending.push(scan.id.clone()),
                ScanStatus::Processing => {
                    warn!("Scan {} was interrupted by a restart", scan.id);
                    scan.fail("interrupted by restart")?;
                }
                _ => {}
            }
        }
        let purged = state.portal.purge_expired(Utc::now());
        info!(
            "Loaded {} leads, {} scans, {} bookings from {} ({} expired portal sessions dropped)",
            state.leads.len(),
            state.scans.len(),
            state.bookings.len(),
            path.display(),
            purged
        );

        let store = Self {
            state: Arc::new(RwLock::new(state)),
            snapshot_path: Some(path),
        };
        {
            let state = store.state.read().await;
            store.persist(&state)?;
        }
        Ok((store, pending))
    }

    /// Writes the snapshot atomically (temp file + rename)
    fn persist(&self, state: &StoreState) -> Result<()> {
        let Some(ref path) = self.snapshot_path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(state)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        debug!("Snapshot written to {}", path.display());
        Ok(())
    }

    /// Applies a mutation to a copy of the state under the write lock. The
    /// copy replaces the live state only once the snapshot is written, so a
    /// failed mutation or write leaves nothing behind.
    async fn mutate<T>(&self, f: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        let mut state = self.state.write().await;
        let mut draft = state.clone();
        let out = f(&mut draft)?;
        self.persist(&draft)?;
        *state = draft;
        Ok(out)
    }

    pub async fn insert_lead(&self, lead: Lead) -> Result<Lead> {
        self.mutate(|state| {
            state.leads.insert(lead.id.clone(), lead.clone());
            Ok(lead)
        })
        .await
    }

    /// Stores a lead and its scan, linking them 1:1
    pub async fn create_audit(&self, mut lead: Lead, mut scan: Scan) -> Result<(Lead, Scan)> {
        lead.scan_id = Some(scan.id.clone());
        scan.lead_id = Some(lead.id.clone());
        self.mutate(|state| {
            state.leads.insert(lead.id.clone(), lead.clone());
            state.scans.insert(scan.id.clone(), scan.clone());
            Ok((lead, scan))
        })
        .await
    }

    /// Inserts a scan without a lead (CLI and admin use)
    pub async fn create_scan(&self, scan: Scan) -> Result<Scan> {
        self.mutate(|state| {
            state.scans.insert(scan.id.clone(), scan.clone());
            Ok(scan)
        })
        .await
    }

    pub async fn get_scan(&self, id: &str) -> Option<Scan> {
        self.state.read().await.scans.get(id).cloned()
    }

    pub async fn get_lead(&self, id: &str) -> Option<Lead> {
        self.state.read().await.leads.get(id).cloned()
    }

    /// Most recent non-failed audit of `website` requested by `email` since `since`
    pub async fn find_recent_scan(
        &self,
        email: &str,
        website: &str,
        since: DateTime<Utc>,
    ) -> Option<Scan> {
        let state = self.state.read().await;
        state
            .leads
            .values()
            .filter(|l| l.email.as_deref() == Some(email) && l.website.as_deref() == Some(website))
            .filter_map(|l| l.scan_id.as_ref().and_then(|id| state.scans.get(id)))
            .filter(|s| s.status != ScanStatus::Failed && s.created_at >= since)
            .max_by_key(|s| s.created_at)
            .cloned()
    }

    fn scan_mut<'a>(state: &'a mut StoreState, id: &str) -> Result<&'a mut Scan> {
        state
            .scans
            .get_mut(id)
            .ok_or_else(|| VantageError::NotFound(format!("Scan '{id}'")))
    }

    /// QUEUED -> PROCESSING
    pub async fn start_scan(&self, id: &str) -> Result<Scan> {
        self.mutate(|state| {
            let scan = Self::scan_mut(state, id)?;
            scan.start()?;
            scan.set_progress(5)?;
            Ok(scan.clone())
        })
        .await
    }

    /// Raises progress; not persisted, as progress is only meaningful while running
    pub async fn update_progress(&self, id: &str, progress: u8) -> Result<()> {
        let mut state = self.state.write().await;
        Self::scan_mut(&mut state, id)?.set_progress(progress)
    }

    /// PROCESSING -> COMPLETE
    pub async fn complete_scan(
        &self,
        id: &str,
        checks: Vec<AuditCheck>,
        narrative: String,
        report_path: Option<String>,
    ) -> Result<Scan> {
        self.mutate(|state| {
            let scan = Self::scan_mut(state, id)?;
            scan.complete(checks, narrative, report_path)?;
            Ok(scan.clone())
        })
        .await
    }

    /// QUEUED | PROCESSING -> FAILED
    pub async fn fail_scan(&self, id: &str, reason: &str) -> Result<()> {
        self.mutate(|state| Self::scan_mut(state, id)?.fail(reason))
            .await
    }

    /// Issues a portal token for a scan
    pub async fn issue_portal(&self, scan_id: &str, ttl: Duration) -> Result<String> {
        self.mutate(|state| {
            let lead_id = Self::scan_mut(state, scan_id)?.lead_id.clone();
            Ok(state
                .portal
                .issue(scan_id, lead_id.as_deref(), ttl, Utc::now()))
        })
        .await
    }

    /// Resolves a portal token to its session, dropping it if expired
    pub async fn resolve_portal(&self, token: &str) -> Option<PortalSession> {
        let mut state = self.state.write().await;
        let before = state.portal.len();
        let session = state.portal.resolve(token, Utc::now());
        if state.portal.len() != before {
            if let Err(e) = self.persist(&state) {
                warn!("Failed to persist after portal expiry: {e}");
            }
        }
        session
    }

    pub async fn purge_expired_sessions(&self) -> Result<usize> {
        self.mutate(|state| Ok(state.portal.purge_expired(Utc::now())))
            .await
    }

    /// Leads, newest first
    pub async fn list_leads(&self) -> Vec<Lead> {
        let mut leads: Vec<Lead> = self.state.read().await.leads.values().cloned().collect();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        leads
    }

    /// Scans, newest first
    pub async fn list_scans(&self) -> Vec<Scan> {
        let mut scans: Vec<Scan> = self.state.read().await.scans.values().cloned().collect();
        scans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        scans
    }

    /// Bookings in start order
    pub async fn list_bookings(&self) -> Vec<Booking> {
        let mut bookings = self.state.read().await.bookings.clone();
        bookings.sort_by_key(|b| b.starts_at);
        bookings
    }

    pub async fn availability(
        &self,
        scheduler: &Scheduler,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Vec<Slot> {
        let state = self.state.read().await;
        scheduler.availability(date, now, &state.bookings)
    }

    /// Checks the slot and records lead and booking under one lock
    pub async fn book(
        &self,
        scheduler: &Scheduler,
        request: &BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<(Lead, Booking)> {
        self.mutate(|state| {
            let (lead, booking) = scheduler.book(request, now, &state.bookings)?;
            state.leads.insert(lead.id.clone(), lead.clone());
            state.bookings.push(booking.clone());
            Ok((lead, booking))
        })
        .await
    }

    pub async fn summary(&self, now: DateTime<Utc>) -> Summary {
        let state = self.state.read().await;

        let mut leads_by_source = BTreeMap::new();
        let mut leads_by_industry = BTreeMap::new();
        for lead in state.leads.values() {
            *leads_by_source.entry(lead.source.to_string()).or_insert(0) += 1;
            let industry = lead
                .industry
                .clone()
                .unwrap_or_else(|| "unspecified".to_string());
            *leads_by_industry.entry(industry).or_insert(0) += 1;
        }

        let mut scans_by_status = BTreeMap::new();
        let mut score_total = 0u64;
        let mut scored = 0u64;
        for scan in state.scans.values() {
            *scans_by_status.entry(scan.status.to_string()).or_insert(0) += 1;
            if let Some(ref scores) = scan.scores {
                score_total += u64::from(scores.overall);
                scored += 1;
            }
        }

        Summary {
            leads_total: state.leads.len(),
            leads_by_source,
            leads_by_industry,
            scans_by_status,
            average_score: (scored > 0).then(|| score_total as f64 / scored as f64),
            upcoming_bookings: state.bookings.iter().filter(|b| b.starts_at >= now).count(),
        }
    }
}
