use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use lettre::message::Mailbox;
use lettre::AsyncTransport;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::state::AppState;

// Request models. Fields are optional so missing ones can be reported
// by name instead of failing deserialization.
#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    api_key: Option<String>,
    to: Option<String>,
    subject: Option<String>,
    body: Option<String>,
    from_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsRequest {
    api_key: Option<String>,
}

// Response model
#[derive(Debug, Serialize)]
pub struct SendEmailResponse {
    status: &'static str,
    message: &'static str,
    timestamp: String,
    recipient: String,
}

pub fn router<T>(state: Arc<AppState<T>>) -> Router
where
    T: AsyncTransport + Send + Sync + 'static,
    T::Error: std::fmt::Display,
{
    Router::new()
        .route("/", get(home))
        .route("/health", get(health::<T>))
        .route("/send-email", post(send_email::<T>))
        .route("/stats", post(stats::<T>))
        .fallback(not_found)
        .with_state(state)
}

// Unknown endpoints get the same JSON error body as every other failure.
async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn home() -> impl IntoResponse {
    Json(json!({
        "service": "email-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "online",
        "endpoints": {
            "/health": "Health check",
            "/send-email": "Send email (POST)",
            "/stats": "API statistics (POST)"
        },
        "documentation": "POST to /send-email with JSON body"
    }))
}

async fn health<T>(State(state): State<Arc<AppState<T>>>) -> impl IntoResponse
where
    T: AsyncTransport + Send + Sync + 'static,
    T::Error: std::fmt::Display,
{
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "service": "email-gateway",
        "smtp_configured": !state.config.smtp_user.is_empty()
            && !state.config.smtp_password.is_empty(),
    }))
}

async fn send_email<T>(
    State(state): State<Arc<AppState<T>>>,
    payload: Result<Json<SendEmailRequest>, JsonRejection>,
) -> Result<Json<SendEmailResponse>, ApiError>
where
    T: AsyncTransport + Send + Sync + 'static,
    T::Error: std::fmt::Display,
{
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(format!("JSON body required: {e}")))?;

    check_api_key(req.api_key.as_deref(), &state.config.api_key)?;

    let mut missing = Vec::new();
    let to_raw = require(&req.to, "to", &mut missing);
    let subject = require(&req.subject, "subject", &mut missing);
    let body = require(&req.body, "body", &mut missing);
    if !missing.is_empty() {
        return Err(ApiError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let to: Mailbox = to_raw
        .parse()
        .map_err(|_| ApiError::Validation("Invalid email format".into()))?;

    // limits are in characters, not bytes
    if subject.chars().count() > state.config.max_subject_length {
        return Err(ApiError::Validation(format!(
            "Subject too long (max {} characters)",
            state.config.max_subject_length
        )));
    }
    if body.chars().count() > state.config.max_body_length {
        return Err(ApiError::Validation(format!(
            "Body too long (max {} characters)",
            state.config.max_body_length
        )));
    }

    // Reserve a slot before the SMTP call so two requests at the boundary
    // cannot both be admitted; the slot is given back on delivery failure.
    state.rate_limiter.try_acquire().map_err(|retry| {
        warn!(retry_after_secs = retry.as_secs(), "rate limit exceeded");
        ApiError::RateLimited {
            retry_after_secs: retry.as_secs(),
        }
    })?;

    info!(to = %to_raw, "sending email");
    match state
        .mailer
        .send(to, subject, body, req.from_name.as_deref())
        .await
    {
        Ok(()) => {
            state.stats.record_sent();
            info!(to = %to_raw, "email sent");
            Ok(Json(SendEmailResponse {
                status: "success",
                message: "Email sent successfully",
                timestamp: Utc::now().to_rfc3339(),
                recipient: to_raw.to_string(),
            }))
        }
        Err(e) => {
            state.rate_limiter.release();
            state.stats.record_failed();
            error!(to = %to_raw, error = %e, "failed to send email");
            Err(ApiError::Delivery(e.to_string()))
        }
    }
}

async fn stats<T>(
    State(state): State<Arc<AppState<T>>>,
    payload: Result<Json<StatsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    T: AsyncTransport + Send + Sync + 'static,
    T::Error: std::fmt::Display,
{
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(format!("JSON body required: {e}")))?;

    check_api_key(req.api_key.as_deref(), &state.config.api_key)?;

    Ok(Json(json!({
        "status": "success",
        "stats": {
            "total_sent": state.stats.total_sent(),
            "total_failed": state.stats.total_failed(),
            "last_sent": state.stats.last_sent().map(|t| t.to_rfc3339()),
            "rate_limit": state.rate_limiter.snapshot(),
        },
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

fn check_api_key(provided: Option<&str>, expected: &str) -> Result<(), ApiError> {
    match provided {
        None | Some("") => {
            warn!("missing API key in request");
            Err(ApiError::Unauthorized("API key required"))
        }
        Some(key) if key != expected => {
            warn!("invalid API key attempt");
            Err(ApiError::Unauthorized("Invalid API key"))
        }
        Some(_) => Ok(()),
    }
}

fn require<'a>(
    field: &'a Option<String>,
    name: &'static str,
    missing: &mut Vec<&'static str>,
) -> &'a str {
    match field.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => {
            missing.push(name);
            ""
        }
    }
}
