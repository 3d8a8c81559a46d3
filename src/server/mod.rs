//! HTTP API for lead capture, audits, bookings, portal access and admin
//!
//! Plain hyper HTTP/1 server. Each connection is served on its own task and
//! every request is routed by `handler::handle_request`.

pub mod auth;
pub mod handler;

use crate::audit::AuditEngine;
use crate::booking::Scheduler;
use crate::config::AppConfig;
use crate::error::{Result, VantageError};
use crate::pipeline::{AuditPipeline, Store};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

const PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Everything a request handler needs
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Store,
    pub pipeline: AuditPipeline,
    pub scheduler: Scheduler,
}

impl AppState {
    /// Opens the store, starts the audit workers and re-queues unfinished scans
    pub async fn bootstrap(config: AppConfig) -> Result<Arc<Self>> {
        let config = Arc::new(config);
        let scheduler = Scheduler::new(&config.booking)?;

        let (store, pending) = match config.storage.data_dir {
            Some(ref dir) => Store::open(dir).await?,
            None => {
                warn!("No storage.data_dir configured; state is kept in memory only");
                (Store::in_memory(), Vec::new())
            }
        };

        let engine = Arc::new(AuditEngine::with_defaults());
        let pipeline = AuditPipeline::start(Arc::clone(&config), store.clone(), engine);
        pipeline.resume(&pending)?;

        if config.server.admin_token.is_none() {
            info!("Admin token not set; admin routes are disabled");
        }

        Ok(Arc::new(Self {
            config,
            store,
            pipeline,
            scheduler,
        }))
    }
}

/// API server bound to a listening socket
pub struct ApiServer {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl ApiServer {
    /// Binds to `server.bind`
    pub async fn bind(state: Arc<AppState>) -> Result<Self> {
        let addr = state.config.server.bind.clone();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            VantageError::ConfigError(format!("Failed to bind to {addr}: {e}"))
        })?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the task is cancelled
    pub async fn serve(self) -> Result<()> {
        info!("Vantage API listening on http://{}", self.local_addr()?);

        let store = self.state.store.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PURGE_INTERVAL);
            loop {
                ticker.tick().await;
                match store.purge_expired_sessions().await {
                    Ok(0) => {}
                    Ok(n) => debug!("Purged {n} expired portal sessions"),
                    Err(e) => warn!("Portal purge failed: {e}"),
                }
            }
        });

        loop {
            let (stream, client_addr) = self.listener.accept().await?;
            let io = TokioIo::new(stream);
            let state = Arc::clone(&self.state);

            tokio::task::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let state = Arc::clone(&state);
                    handler::handle_request(req, state)
                });

                if let Err(e) = http1::Builder::new()
                    .serve_connection(io, service)
                    .await
                {
                    let err_str = e.to_string();
                    if !err_str.contains("connection closed") && !err_str.contains("early eof") {
                        debug!("Connection error from {}: {}", client_addr, e);
                    }
                }
            });
        }
    }
}
