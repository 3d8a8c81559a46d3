//! Outbound HTTP client used to fetch audited sites

pub mod client;
pub use client::HttpClient;
