//! Plan record routes
//!
//! - `POST   /v1/plans`          create
//! - `GET    /v1/plans/{id}`     read (conditional on `If-None-Match`)
//! - `PUT    /v1/plans/{id}`     replace (requires a precondition)
//! - `PATCH  /v1/plans/{id}`     merge (requires a precondition)
//! - `DELETE /v1/plans/{id}`     delete (requires `If-Match`)
//! - `POST   /v1/admin/reindex`  republish every record

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{
    HeaderValue, ALLOW, CACHE_CONTROL, CONTENT_TYPE, ETAG, X_CONTENT_TYPE_OPTIONS,
};
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::concurrency::{to_entity_tag, MergeOutcome, Preconditions, ReadOutcome};
use crate::models::Plan;
use crate::server::AppState;
use crate::store::StoredPlan;
use crate::types::{PlanError, Result};

const PLANS_PREFIX: &str = "/v1/plans";
const REINDEX_PATH: &str = "/v1/admin/reindex";

#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Plans,
    Plan(&'a str),
    Reindex,
}

fn match_route(path: &str) -> Option<Route<'_>> {
    if path == REINDEX_PATH {
        return Some(Route::Reindex);
    }
    let rest = path.strip_prefix(PLANS_PREFIX)?;
    match rest.strip_prefix('/') {
        None if rest.is_empty() => Some(Route::Plans),
        Some("") => Some(Route::Plans),
        Some(id) if !id.contains('/') => Some(Route::Plan(id)),
        _ => None,
    }
}

/// Dispatch a request under `/v1`
pub async fn handle_plans_request<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let Some(route) = match_route(&path) else {
        return error_response(PlanError::NotFound(format!("no route for {}", path)));
    };

    let pre = Preconditions::from_headers(req.headers());
    let result = match (&method, route) {
        (&Method::POST, Route::Plans) => create(req.into_body(), state).await,
        (&Method::GET, Route::Plan(id)) => get(id, &pre, state).await,
        (&Method::PUT, Route::Plan(id)) => replace(req.into_body(), id, &pre, state).await,
        (&Method::PATCH, Route::Plan(id)) => merge(req.into_body(), id, &pre, state).await,
        (&Method::DELETE, Route::Plan(id)) => delete(id, &pre, state).await,
        (&Method::POST, Route::Reindex) => reindex(state).await,
        (_, Route::Plans) => return method_not_allowed("POST"),
        (_, Route::Plan(_)) => return method_not_allowed("GET, PUT, PATCH, DELETE"),
        (_, Route::Reindex) => return method_not_allowed("POST"),
    };

    result.unwrap_or_else(error_response)
}

async fn create<B>(body: B, state: &AppState) -> Result<Response<Full<Bytes>>>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let plan: Plan = read_json(body).await?;
    let record = state.controller.create(plan).await?;
    Ok(plan_response(StatusCode::CREATED, &record))
}

async fn get(id: &str, pre: &Preconditions, state: &AppState) -> Result<Response<Full<Bytes>>> {
    let mut response = match state.controller.get(id, pre).await? {
        ReadOutcome::Found(record) => plan_response(StatusCode::OK, &record),
        ReadOutcome::NotModified { etag } => not_modified(&etag),
    };

    let headers = response.headers_mut();
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    Ok(response)
}

async fn replace<B>(
    body: B,
    id: &str,
    pre: &Preconditions,
    state: &AppState,
) -> Result<Response<Full<Bytes>>>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let plan: Plan = read_json(body).await?;
    let record = state.controller.replace(id, plan, pre).await?;
    Ok(plan_response(StatusCode::OK, &record))
}

async fn merge<B>(
    body: B,
    id: &str,
    pre: &Preconditions,
    state: &AppState,
) -> Result<Response<Full<Bytes>>>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let update: JsonValue = read_json(body).await?;
    match state.controller.merge(id, &update, pre).await? {
        MergeOutcome::Updated(record) => Ok(plan_response(StatusCode::OK, &record)),
        MergeOutcome::NotModified { etag } => Ok(not_modified(&etag)),
    }
}

async fn delete(id: &str, pre: &Preconditions, state: &AppState) -> Result<Response<Full<Bytes>>> {
    state.controller.delete(id, pre).await?;
    Ok(empty_response(StatusCode::NO_CONTENT))
}

async fn reindex(state: &AppState) -> Result<Response<Full<Bytes>>> {
    let published = state.controller.reindex_all().await?;
    let body = serde_json::json!({ "published": published });
    Ok(json_response(StatusCode::ACCEPTED, body.to_string()))
}

/// Collect a request body and decode it as JSON
async fn read_json<B, T>(body: B) -> Result<T>
where
    B: Body,
    B::Error: std::fmt::Display,
    T: DeserializeOwned,
{
    let bytes = body
        .collect()
        .await
        .map_err(|e| PlanError::BadRequest(format!("Failed to read body: {}", e)))?
        .to_bytes();

    if bytes.is_empty() {
        return Err(PlanError::BadRequest("Request body is required".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| PlanError::BadRequest(format!("Invalid JSON body: {}", e)))
}

fn json_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Body is the exact serialized form the fingerprint was computed over
fn plan_response(status: StatusCode, record: &StoredPlan) -> Response<Full<Bytes>> {
    let mut response = json_response(status, record.body.clone());
    set_etag(&mut response, &record.etag);
    response
}

fn not_modified(etag: &str) -> Response<Full<Bytes>> {
    let mut response = empty_response(StatusCode::NOT_MODIFIED);
    set_etag(&mut response, etag);
    response
}

fn set_etag(response: &mut Response<Full<Bytes>>, etag: &str) {
    if let Ok(value) = HeaderValue::from_str(&to_entity_tag(etag)) {
        response.headers_mut().insert(ETAG, value);
    }
}

fn method_not_allowed(allow: &'static str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Method not allowed",
        "code": "METHOD_NOT_ALLOWED",
    });
    let mut response = json_response(StatusCode::METHOD_NOT_ALLOWED, body.to_string());
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(allow));
    response
}

/// Render an error as `{"error", "code"}` with its mapped status
pub fn error_response(err: PlanError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    if status.is_server_error() {
        warn!(code = err.code(), "Request failed: {}", err);
    } else {
        debug!(code = err.code(), "Request rejected: {}", err);
    }

    let body = serde_json::json!({
        "error": err.to_string(),
        "code": err.code(),
    });
    json_response(status, body.to_string())
}
