//! Snapshot of a fetched page shared by all auditors

use crate::error::{Result, VantageError};
use crate::http::HttpClient;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};
use url::Url;

/// A single fetch of the audited URL
#[derive(Debug, Clone)]
pub struct Page {
    /// URL as submitted
    pub url: String,
    /// URL after redirects
    pub final_url: String,
    pub status: u16,
    /// Response headers with lower-cased names; repeated headers are joined with ", "
    pub headers: HashMap<String, String>,
    pub body: String,
    /// Bytes received for the body, before any truncation
    pub size_bytes: usize,
    /// Time until response headers arrived
    pub elapsed_ms: u64,
}

impl Page {
    /// Fetches `url` and records what the auditors need. Non-2xx final
    /// responses are treated as an unreachable target.
    pub async fn fetch(client: &HttpClient, url: &str) -> Result<Self> {
        let started = Instant::now();
        let response = client.get(url).await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(VantageError::TargetUnreachable(format!(
                "{final_url} returned HTTP {}",
                status.as_u16()
            )));
        }

        let mut headers: HashMap<String, String> = HashMap::new();
        for (name, value) in response.headers() {
            let value = value.to_str().unwrap_or("").to_string();
            headers
                .entry(name.as_str().to_lowercase())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        let (body, size_bytes) = client.read_body(response).await?;
        info!(
            "Fetched {final_url}: HTTP {} in {elapsed_ms} ms, {size_bytes} bytes",
            status.as_u16()
        );
        debug!("{} response headers captured", headers.len());

        Ok(Self {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            headers,
            body,
            size_bytes,
            elapsed_ms,
        })
    }

    /// Builds a snapshot from content that was already retrieved
    pub fn from_parts(url: &str, headers: &[(&str, &str)], body: &str, elapsed_ms: u64) -> Self {
        Self {
            url: url.to_string(),
            final_url: url.to_string(),
            status: 200,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                .collect(),
            body: body.to_string(),
            size_bytes: body.len(),
            elapsed_ms,
        }
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn is_https(&self) -> bool {
        self.final_url.starts_with("https://")
    }

    /// Resolves `path` against the site's origin (after redirects)
    pub fn site_url(&self, path: &str) -> Result<String> {
        let base = Url::parse(&self.final_url)?;
        Ok(base.join(path)?.to_string())
    }
}
