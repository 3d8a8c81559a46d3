//! Portal sessions: short-lived tokens that let a lead read their own scan

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// A token-keyed grant of read access to one scan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortalSession {
    pub scan_id: String,
    pub lead_id: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PortalSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Generates an opaque URL-safe token with 244 bits of randomness
pub fn generate_token() -> String {
    let mut bytes = Vec::with_capacity(32);
    bytes.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
    bytes.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Storage key for a token. Raw tokens are never kept.
pub fn hash_token(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

/// Active sessions keyed by token hash
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalSessions {
    sessions: HashMap<String, PortalSession>,
}

impl PortalSessions {
    /// Issues a new token for `scan_id` valid for `ttl`
    pub fn issue(
        &mut self,
        scan_id: &str,
        lead_id: Option<&str>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> String {
        let token = generate_token();
        self.sessions.insert(
            hash_token(&token),
            PortalSession {
                scan_id: scan_id.to_string(),
                lead_id: lead_id.map(String::from),
                issued_at: now,
                expires_at: now + ttl,
            },
        );
        token
    }

    /// Looks up a live session. An expired session is removed.
    pub fn resolve(&mut self, token: &str, now: DateTime<Utc>) -> Option<PortalSession> {
        let key = hash_token(token);
        match self.sessions.get(&key) {
            Some(session) if session.is_expired(now) => {
                self.sessions.remove(&key);
                None
            }
            Some(session) => Some(session.clone()),
            None => None,
        }
    }

    /// Drops every expired session, returning how many were removed
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
