//! Consultation booking: availability slots and slot reservation

use crate::config::BookingConfig;
use crate::error::{Result, VantageError};
use crate::leads::{self, LeadSubmission};
use crate::models::{Lead, LeadSource};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A bookable interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// A reserved consultation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub lead_id: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub topic: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.starts_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.starts_at < end && start < self.ends_at()
    }
}

/// Booking form: contact details plus the chosen slot
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    #[serde(flatten)]
    pub contact: LeadSubmission,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub topic: Option<String>,
}

/// Computes availability from the configured opening hours
#[derive(Debug, Clone)]
pub struct Scheduler {
    config: BookingConfig,
    days: Vec<Weekday>,
    offset: FixedOffset,
}

impl Scheduler {
    pub fn new(config: &BookingConfig) -> Result<Self> {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            VantageError::ConfigError(format!(
                "Invalid UTC offset of {} minutes",
                config.utc_offset_minutes
            ))
        })?;
        Ok(Self {
            days: config.open_days()?,
            config: config.clone(),
            offset,
        })
    }

    /// Local calendar date of an instant in the agency's timezone
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// Every slot within opening hours on `date`, ignoring bookings and notice
    fn opening_slots(&self, date: NaiveDate) -> Vec<Slot> {
        if !self.days.contains(&date.weekday()) {
            return Vec::new();
        }

        let slot = self.config.slot_minutes;
        let open = self.config.open_hour * 60;
        let close = self.config.close_hour * 60;

        let mut slots = Vec::new();
        let mut minute = open;
        while minute + slot <= close {
            let local = date
                .and_hms_opt(minute / 60, minute % 60, 0)
                .and_then(|naive| self.offset.from_local_datetime(&naive).single());
            if let Some(start) = local {
                let starts_at = start.with_timezone(&Utc);
                slots.push(Slot {
                    starts_at,
                    ends_at: starts_at + Duration::minutes(i64::from(slot)),
                });
            }
            minute += slot;
        }
        slots
    }

    /// Free slots on a local date, honouring notice, horizon and existing bookings
    pub fn availability(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
        bookings: &[Booking],
    ) -> Vec<Slot> {
        let earliest = now + Duration::hours(self.config.min_notice_hours);
        let latest = now + Duration::days(self.config.horizon_days);

        self.opening_slots(date)
            .into_iter()
            .filter(|s| s.starts_at >= earliest && s.starts_at <= latest)
            .filter(|s| !bookings.iter().any(|b| b.overlaps(s.starts_at, s.ends_at)))
            .collect()
    }

    /// Validates a booking request against availability and returns the
    /// new lead and booking. The caller persists both.
    pub fn book(
        &self,
        request: &BookingRequest,
        now: DateTime<Utc>,
        bookings: &[Booking],
    ) -> Result<(Lead, Booking)> {
        let mut lead = leads::validate(&request.contact, LeadSource::Booking)?;

        let date = self.local_date(request.starts_at);
        let offered = self
            .availability(date, now, &[])
            .into_iter()
            .find(|s| s.starts_at == request.starts_at)
            .ok_or_else(|| {
                VantageError::invalid("starts_at: is not an offered appointment slot")
            })?;

        if bookings
            .iter()
            .any(|b| b.overlaps(offered.starts_at, offered.ends_at))
        {
            return Err(VantageError::Conflict(format!(
                "The slot at {} is already taken",
                offered.starts_at.to_rfc3339()
            )));
        }

        if let Some(ref topic) = request.topic {
            if lead.concern.is_none() && !topic.trim().is_empty() {
                lead.concern = Some(topic.trim().to_string());
            }
        }

        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            lead_id: lead.id.clone(),
            starts_at: offered.starts_at,
            duration_minutes: self.config.slot_minutes,
            topic: request
                .topic
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from),
            created_at: now,
        };
        debug!("Booking {} at {}", booking.id, booking.starts_at);
        Ok((lead, booking))
    }
}
