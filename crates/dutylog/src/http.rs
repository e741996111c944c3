//! HTTP endpoint for the duty log.
//!
//! `POST /api/log` takes a JSON body tagged by `type` and dispatches it to the
//! [`DutyService`]; `GET /api/log` lists duties newest first. Every response
//! body carries a `success` flag, with an `error` message when it is false.

use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::duty::{DutyStatus, Incident, Post};
use crate::error::{DutyError, DutyResult, Error, Result};
use crate::service::DutyService;
use crate::storage::{DutyFilter, Storage};

/// Request types accepted by `POST /api/log`.
const REQUEST_TYPES: [&str; 4] = ["start", "end", "add-incident", "remove-incident"];

/// A duty operation, as posted to `/api/log`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DutyRequest {
    /// Start a duty.
    Start {
        /// Officer name.
        name: String,
        /// Badge number.
        #[serde(rename = "badgeNumber")]
        badge_number: String,
        /// Post name; validated by the service.
        post: String,
    },
    /// End the officer's active duty.
    End {
        /// Officer name.
        name: String,
    },
    /// Attach an incident to the officer's active duty.
    AddIncident {
        /// Officer name.
        name: String,
        /// The incident to attach.
        incident: Incident,
    },
    /// Remove an incident from the officer's active duty.
    RemoveIncident {
        /// Officer name.
        name: String,
        /// Id of the incident to remove.
        #[serde(rename = "incidentId")]
        incident_id: String,
    },
}

impl DutyRequest {
    /// Officer the request is for.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Start { name, .. }
            | Self::End { name }
            | Self::AddIncident { name, .. }
            | Self::RemoveIncident { name, .. } => name,
        }
    }

    /// Parse a request body.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidType`] when `type` is missing or not one
    /// of the known operations, and [`RequestError::Malformed`] for anything
    /// else that does not deserialize.
    pub fn parse(body: &[u8]) -> std::result::Result<Self, RequestError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| RequestError::Malformed(format!("invalid JSON body: {e}")))?;

        let known = value
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| REQUEST_TYPES.contains(&t));
        if !known {
            return Err(RequestError::InvalidType);
        }

        serde_json::from_value(value).map_err(|e| RequestError::Malformed(e.to_string()))
    }
}

/// Why a request body was rejected before reaching the service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// `type` is missing or unrecognised.
    #[error("Invalid operation type")]
    InvalidType,
    /// The body is not valid JSON or lacks required fields.
    #[error("{0}")]
    Malformed(String),
}

/// Query parameters accepted by `GET /api/log`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LogQuery {
    /// `active` or `completed`.
    pub status: Option<DutyStatus>,
    /// Substring of name, badge number or post.
    pub search: Option<String>,
    /// First day to include, `YYYY-MM-DD`.
    pub from: Option<NaiveDate>,
    /// Last day to include, `YYYY-MM-DD`.
    pub to: Option<NaiveDate>,
}

impl From<LogQuery> for DutyFilter {
    fn from(query: LogQuery) -> Self {
        Self {
            status: query.status,
            search: query.search,
            from: query.from,
            to: query.to,
        }
    }
}

/// Shared state handed to every handler.
///
/// The service sits behind a mutex; each request holds the lock for one
/// service call on a blocking thread and releases it before responding.
#[derive(Debug, Clone)]
pub struct AppState {
    service: Arc<Mutex<DutyService<Storage>>>,
}

impl AppState {
    /// Wrap a service for sharing across requests.
    #[must_use]
    pub fn new(service: DutyService<Storage>) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
        }
    }

    async fn run<T, F>(&self, f: F) -> DutyResult<T>
    where
        F: FnOnce(&DutyService<Storage>) -> DutyResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || -> DutyResult<T> {
            let guard = service.lock().map_err(|_| Error::StoragePoisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| Error::internal(format!("request task failed: {e}")))?
    }
}

impl DutyError {
    /// HTTP status reported for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Conflict | Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::IncidentNotFound => StatusCode::NOT_FOUND,
            Self::WriteFailed { .. } | Self::StoreUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for DutyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_client_error() {
            debug!("Request refused: {}", self);
        } else {
            error!("Request failed: {}", self);
        }
        failure(status, self.to_string())
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        debug!("Rejected request body: {}", self);
        failure(StatusCode::BAD_REQUEST, self.to_string())
    }
}

fn success(mut body: Value) -> Response {
    if let Value::Object(map) = &mut body {
        map.insert("success".to_string(), Value::Bool(true));
    }
    (StatusCode::OK, Json(body)).into_response()
}

fn failure(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/log", get(list_logs).post(post_log))
        .route("/api/log/summary", get(summary))
        .route("/api/posts", get(posts))
        .route("/health", get(|| async { "ok\n" }))
        .with_state(state)
}

/// Serve the router on `addr` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })?;

    info!(addr = %addr, "Duty log HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Duty log HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// `POST /api/log`
pub async fn post_log(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match DutyRequest::parse(&body) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    debug!(name = request.name(), "Dispatching {:?}", request);

    let result = state
        .run(move |service| match request {
            DutyRequest::Start {
                name,
                badge_number,
                post,
            } => service
                .start_duty(&name, &badge_number, &post)
                .map(|id| json!({ "id": id })),
            DutyRequest::End { name } => service.end_duty(&name).map(|()| json!({})),
            DutyRequest::AddIncident { name, incident } => {
                service.add_incident(&name, &incident).map(|()| json!({}))
            }
            DutyRequest::RemoveIncident { name, incident_id } => service
                .remove_incident(&name, &incident_id)
                .map(|()| json!({})),
        })
        .await;

    match result {
        Ok(body) => success(body),
        Err(e) => e.into_response(),
    }
}

/// `GET /api/log`
pub async fn list_logs(
    State(state): State<AppState>,
    query: std::result::Result<Query<LogQuery>, QueryRejection>,
) -> Response {
    let filter = match query {
        Ok(Query(query)) => DutyFilter::from(query),
        Err(rejection) => return failure(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    match state
        .run(move |service| service.list_duties_matching(&filter))
        .await
    {
        Ok(logs) => success(json!({ "logs": logs })),
        Err(e) => e.into_response(),
    }
}

/// `GET /api/log/summary`
pub async fn summary(State(state): State<AppState>) -> Response {
    match state.run(DutyService::summary).await {
        Ok(summary) => success(json!({ "summary": summary })),
        Err(e) => e.into_response(),
    }
}

/// `GET /api/posts`
pub async fn posts() -> Response {
    let posts: Vec<&str> = Post::ALL.iter().map(Post::as_str).collect();
    success(json!({ "posts": posts }))
}
