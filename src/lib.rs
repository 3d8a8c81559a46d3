//! Vantage - Marketing-site backend for a small-business web agency
//!
//! Captures leads from contact, audit and booking forms, runs a heuristic
//! website audit in the background (fetch, score, narrate, render PDF/HTML
//! report), offers consultation slots and exposes a portal for leads plus a
//! token-gated admin surface over HTTP.

pub mod audit;
pub mod booking;
pub mod config;
pub mod error;
pub mod http;
pub mod leads;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod server;
