//! Request routing and endpoint handlers

use super::auth::{self, AdminAccess};
use super::AppState;
use crate::booking::BookingRequest;
use crate::error::VantageError;
use crate::leads::{self, LeadSubmission};
use crate::models::{AuditCheck, Lead, LeadSource, Scan, ScanStatus, Scores};
use crate::report;
use chrono::{DateTime, NaiveDate, Utc};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderMap, HeaderValue, CACHE_CONTROL, CONTENT_TYPE, SET_COOKIE};
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error, info};

const PORTAL_HEADER: &str = "x-portal-token";

/// Failures surfaced to API clients
#[derive(Debug)]
pub enum ApiError {
    App(VantageError),
    BadRequest(String),
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
}

impl From<VantageError> for ApiError {
    fn from(e: VantageError) -> Self {
        ApiError::App(e)
    }
}

type ApiResult = std::result::Result<Response<Full<Bytes>>, ApiError>;

impl ApiError {
    fn into_response(self) -> Response<Full<Bytes>> {
        let (status, body) = match self {
            ApiError::App(VantageError::ValidationError(fields)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "validation failed", "fields": fields }),
            ),
            ApiError::App(VantageError::JsonError(e)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("malformed JSON body: {e}") }),
            ),
            ApiError::App(e @ VantageError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, json!({ "error": e.to_string() }))
            }
            ApiError::App(e @ (VantageError::Conflict(_) | VantageError::InvalidTransition { .. })) => {
                (StatusCode::CONFLICT, json!({ "error": e.to_string() }))
            }
            ApiError::App(VantageError::QueueClosed) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "audit queue is not accepting work" }),
            ),
            ApiError::App(e) => {
                error!("Request failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal error" }),
                )
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "authentication required" }),
            ),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, json!({ "error": "access denied" })),
            ApiError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": "not found" })),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                json!({ "error": "method not allowed" }),
            ),
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({ "error": "request body too large" }),
            ),
        };
        json_response(status, &body)
    }
}

fn respond(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .header(CACHE_CONTROL, "no-store")
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Error"))))
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => respond(status, "application/json", body),
        Err(e) => {
            error!("Failed to serialize response: {e}");
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "application/json",
                r#"{"error":"internal error"}"#,
            )
        }
    }
}

fn with_cookie(mut response: Response<Full<Bytes>>, cookie: &str) -> Response<Full<Bytes>> {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().insert(SET_COOKIE, value);
    }
    response
}

/// Entry point for every request
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = match route(req, &state).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    debug!("{} {} -> {}", method, path, response.status().as_u16());
    Ok(response)
}

async fn route(req: Request<Incoming>, state: &AppState) -> ApiResult {
    let path = req.uri().path().trim_end_matches('/').to_string();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let method = req.method().clone();

    match (&method, segments.as_slice()) {
        (&Method::GET, ["health"]) => Ok(json_response(
            StatusCode::OK,
            &json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }),
        )),
        (&Method::POST, ["api", "leads"]) => submit_lead(req, state).await,
        (&Method::POST, ["api", "audits"]) => submit_audit(req, state).await,
        (&Method::GET, ["api", "scans", id]) => scan_status(&req, state, id).await,
        (&Method::GET, ["api", "scans", id, "report"]) => scan_report_html(&req, state, id).await,
        (&Method::GET, ["api", "scans", id, "report.pdf"]) => {
            scan_report_pdf(&req, state, id).await
        }
        (&Method::GET, ["api", "portal", token]) => portal(state, token).await,
        (&Method::GET, ["api", "booking", "availability"]) => availability(&req, state).await,
        (&Method::POST, ["api", "bookings"]) => book(req, state).await,
        (_, ["api", "admin", rest @ ..]) => admin(req, state, rest).await,
        (_, ["health"])
        | (_, ["api", "leads" | "audits" | "bookings"])
        | (_, ["api", "scans", ..])
        | (_, ["api", "portal", _])
        | (_, ["api", "booking", "availability"]) => Err(ApiError::MethodNotAllowed),
        _ => Err(ApiError::NotFound),
    }
}

// ---------- request helpers ----------

fn query_param(req: &Request<Incoming>, key: &str) -> Option<String> {
    let query = req.uri().query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

/// Reads the body, rejecting anything over `server.max_body_bytes`
async fn read_body(req: Request<Incoming>, state: &AppState) -> std::result::Result<Bytes, ApiError> {
    let limited = Limited::new(req.into_body(), state.config.server.max_body_bytes);
    match limited.collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(ApiError::PayloadTooLarge),
        Err(e) => Err(ApiError::BadRequest(format!("could not read body: {e}"))),
    }
}

/// Parses a lead form sent as JSON or urlencoded
async fn read_submission(
    req: Request<Incoming>,
    state: &AppState,
) -> std::result::Result<LeadSubmission, ApiError> {
    let form = is_form(req.headers());
    let body = read_body(req, state).await?;
    if form {
        Ok(LeadSubmission::from_form(&body))
    } else {
        Ok(serde_json::from_slice(&body).map_err(VantageError::from)?)
    }
}

fn base_url(state: &AppState) -> &str {
    state
        .config
        .server
        .public_base_url
        .as_deref()
        .map_or("", |u| u.trim_end_matches('/'))
}

// ---------- views ----------

/// Scan as returned to clients. Server-side paths are not exposed.
#[derive(Debug, Serialize)]
struct ScanView<'a> {
    id: &'a str,
    target: &'a str,
    status: ScanStatus,
    progress: u8,
    scores: Option<&'a Scores>,
    checks: &'a [AuditCheck],
    narrative: Option<&'a str>,
    error: Option<&'a str>,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    report_available: bool,
}

impl<'a> ScanView<'a> {
    fn new(scan: &'a Scan) -> Self {
        Self {
            id: &scan.id,
            target: &scan.target,
            status: scan.status,
            progress: scan.progress,
            scores: scan.scores.as_ref(),
            checks: &scan.checks,
            narrative: scan.narrative.as_deref(),
            error: scan.error.as_deref(),
            created_at: scan.created_at,
            finished_at: scan.finished_at,
            report_available: scan.status == ScanStatus::Complete,
        }
    }
}

// ---------- public endpoints ----------

async fn submit_lead(req: Request<Incoming>, state: &AppState) -> ApiResult {
    let submission = read_submission(req, state).await?;
    let lead = leads::validate(&submission, LeadSource::Contact)?;
    let lead = state.store.insert_lead(lead).await?;
    info!("New contact lead {}", lead.id);
    Ok(json_response(
        StatusCode::CREATED,
        &json!({ "lead_id": lead.id }),
    ))
}

async fn submit_audit(req: Request<Incoming>, state: &AppState) -> ApiResult {
    let submission = read_submission(req, state).await?;
    let ticket = state.pipeline.submit_audit(&submission).await?;
    let status_url = format!(
        "{}/api/scans/{}?token={}",
        base_url(state),
        ticket.scan_id,
        ticket.portal_token
    );
    Ok(json_response(
        StatusCode::ACCEPTED,
        &json!({
            "lead_id": ticket.lead_id,
            "scan_id": ticket.scan_id,
            "portal_token": ticket.portal_token,
            "status": ticket.status,
            "reused": ticket.reused,
            "status_url": status_url,
        }),
    ))
}

/// Admin credentials or a portal token bound to `scan_id`
async fn authorize_scan(
    req: &Request<Incoming>,
    state: &AppState,
    scan_id: &str,
) -> std::result::Result<(), ApiError> {
    if auth::authorize(&state.config.server, req.headers()) == AdminAccess::Granted {
        return Ok(());
    }
    let token = query_param(req, "token").or_else(|| {
        req.headers()
            .get(PORTAL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    });
    let Some(token) = token else {
        return Err(ApiError::Unauthorized);
    };
    match state.store.resolve_portal(&token).await {
        Some(session) if session.scan_id == scan_id => Ok(()),
        _ => Err(ApiError::Forbidden),
    }
}

async fn load_scan(state: &AppState, id: &str) -> std::result::Result<Scan, ApiError> {
    state
        .store
        .get_scan(id)
        .await
        .ok_or_else(|| VantageError::NotFound(format!("Scan '{id}'")).into())
}

async fn load_lead(state: &AppState, scan: &Scan) -> Option<Lead> {
    match scan.lead_id {
        Some(ref id) => state.store.get_lead(id).await,
        None => None,
    }
}

fn require_complete(scan: &Scan) -> std::result::Result<(), ApiError> {
    if scan.status == ScanStatus::Complete {
        Ok(())
    } else {
        Err(VantageError::Conflict(format!("Scan {} is {}", scan.id, scan.status)).into())
    }
}

async fn scan_status(req: &Request<Incoming>, state: &AppState, id: &str) -> ApiResult {
    authorize_scan(req, state, id).await?;
    let scan = load_scan(state, id).await?;
    Ok(json_response(StatusCode::OK, &ScanView::new(&scan)))
}

async fn scan_report_html(req: &Request<Incoming>, state: &AppState, id: &str) -> ApiResult {
    authorize_scan(req, state, id).await?;
    let scan = load_scan(state, id).await?;
    require_complete(&scan)?;
    let lead = load_lead(state, &scan).await;
    let html = report::html::render(
        &scan,
        lead.as_ref(),
        state.config.storage.templates_dir.as_deref(),
    )?;
    Ok(respond(StatusCode::OK, "text/html; charset=utf-8", html))
}

async fn scan_report_pdf(req: &Request<Incoming>, state: &AppState, id: &str) -> ApiResult {
    authorize_scan(req, state, id).await?;
    let scan = load_scan(state, id).await?;
    require_complete(&scan)?;

    let stored = match scan.report_path {
        Some(ref path) => tokio::fs::read(path).await.ok(),
        None => None,
    };
    let bytes = match stored {
        Some(bytes) => bytes,
        None => {
            let lead = load_lead(state, &scan).await;
            report::pdf::render(&scan, lead.as_ref())?
        }
    };
    Ok(respond(StatusCode::OK, "application/pdf", bytes))
}

async fn portal(state: &AppState, token: &str) -> ApiResult {
    let session = state
        .store
        .resolve_portal(token)
        .await
        .ok_or(ApiError::Forbidden)?;
    let scan = load_scan(state, &session.scan_id).await?;
    let lead = load_lead(state, &scan).await;

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "scan": ScanView::new(&scan),
            "lead": lead.as_ref().map(|l| json!({
                "name": l.name,
                "business_name": l.business_name,
                "website": l.website,
            })),
            "expires_at": session.expires_at,
        }),
    ))
}

async fn availability(req: &Request<Incoming>, state: &AppState) -> ApiResult {
    let raw = query_param(req, "date")
        .ok_or_else(|| ApiError::BadRequest("date query parameter is required".to_string()))?;
    let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("invalid date '{raw}', expected YYYY-MM-DD")))?;
    let slots = state
        .store
        .availability(&state.scheduler, date, Utc::now())
        .await;
    Ok(json_response(
        StatusCode::OK,
        &json!({ "date": date, "slots": slots }),
    ))
}

fn booking_from_form(body: &[u8]) -> std::result::Result<BookingRequest, ApiError> {
    let mut starts_at = None;
    let mut topic = None;
    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "starts_at" => starts_at = Some(value.into_owned()),
            "topic" => topic = Some(value.into_owned()),
            _ => {}
        }
    }
    let raw = starts_at.ok_or_else(|| VantageError::invalid("starts_at: is required"))?;
    let starts_at = DateTime::parse_from_rfc3339(&raw)
        .map_err(|_| VantageError::invalid("starts_at: must be an RFC 3339 timestamp"))?
        .with_timezone(&Utc);
    Ok(BookingRequest {
        contact: LeadSubmission::from_form(body),
        starts_at,
        topic,
    })
}

async fn book(req: Request<Incoming>, state: &AppState) -> ApiResult {
    let form = is_form(req.headers());
    let body = read_body(req, state).await?;
    let request = if form {
        booking_from_form(&body)?
    } else {
        serde_json::from_slice::<BookingRequest>(&body).map_err(VantageError::from)?
    };

    let (lead, booking) = state
        .store
        .book(&state.scheduler, &request, Utc::now())
        .await?;
    info!("Booking {} for lead {} at {}", booking.id, lead.id, booking.starts_at);
    Ok(json_response(
        StatusCode::CREATED,
        &json!({ "booking": booking, "lead_id": lead.id }),
    ))
}

// ---------- admin ----------

#[derive(Debug, Deserialize)]
struct LoginRequest {
    token: String,
}

async fn admin(req: Request<Incoming>, state: &AppState, rest: &[&str]) -> ApiResult {
    let server = &state.config.server;

    if req.method() == Method::POST && matches!(rest, ["login"]) {
        let form = is_form(req.headers());
        let body = read_body(req, state).await?;
        let token = if form {
            url::form_urlencoded::parse(&body)
                .find(|(k, _)| k == "token")
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default()
        } else {
            serde_json::from_slice::<LoginRequest>(&body)
                .map_err(VantageError::from)?
                .token
        };
        return match auth::check_token(server, &token) {
            AdminAccess::Disabled => Err(ApiError::NotFound),
            AdminAccess::Denied => Err(ApiError::Unauthorized),
            AdminAccess::Granted => {
                info!("Admin login");
                Ok(with_cookie(
                    json_response(StatusCode::OK, &json!({ "ok": true })),
                    &auth::login_cookie(server, &token),
                ))
            }
        };
    }

    match auth::authorize(server, req.headers()) {
        AdminAccess::Disabled => return Err(ApiError::NotFound),
        AdminAccess::Denied => return Err(ApiError::Unauthorized),
        AdminAccess::Granted => {}
    }

    match (req.method(), rest) {
        (&Method::POST, ["logout"]) => Ok(with_cookie(
            json_response(StatusCode::OK, &json!({ "ok": true })),
            &auth::logout_cookie(server),
        )),
        (&Method::GET, ["summary"]) => Ok(json_response(
            StatusCode::OK,
            &state.store.summary(Utc::now()).await,
        )),
        (&Method::GET, ["leads"]) => Ok(json_response(
            StatusCode::OK,
            &state.store.list_leads().await,
        )),
        (&Method::GET, ["leads.csv"]) => {
            let csv = report::csv::leads_to_csv(&state.store.list_leads().await);
            Ok(respond(StatusCode::OK, "text/csv; charset=utf-8", csv))
        }
        (&Method::GET, ["scans"]) => {
            let scans = state.store.list_scans().await;
            let views: Vec<ScanView> = scans.iter().map(ScanView::new).collect();
            Ok(json_response(StatusCode::OK, &views))
        }
        (&Method::GET, ["bookings"]) => Ok(json_response(
            StatusCode::OK,
            &state.store.list_bookings().await,
        )),
        (&Method::POST, ["scans", id, "portal"]) => {
            let ttl = chrono::Duration::hours(state.config.portal.ttl_hours);
            let token = state.store.issue_portal(id, ttl).await?;
            Ok(json_response(
                StatusCode::CREATED,
                &json!({
                    "scan_id": id,
                    "portal_token": token,
                    "expires_in_hours": state.config.portal.ttl_hours,
                }),
            ))
        }
        (_, ["logout" | "summary" | "leads" | "leads.csv" | "scans" | "bookings"]) => {
            Err(ApiError::MethodNotAllowed)
        }
        _ => Err(ApiError::NotFound),
    }
}
