//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Routing is a plain
//! match on method and path; `/v1` routes sit behind the bearer-token gate.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::header::AUTHORIZATION;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::{extract_token_from_header, CallerIdentity, JwtValidator};
use crate::concurrency::PlanController;
use crate::config::Args;
use crate::routes;
use crate::types::{PlanError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub controller: PlanController,
    /// Bearer token validator; `None` when auth is disabled
    pub jwt: Option<JwtValidator>,
    /// Search backend name, reported by `/health`
    pub search_backend: &'static str,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, controller: PlanController, search_backend: &'static str) -> Result<Self> {
        let jwt = if args.auth_enabled() {
            let secret = args
                .jwt_secret
                .clone()
                .ok_or_else(|| PlanError::Config("JWT_SECRET is required".into()))?;
            Some(JwtValidator::new(secret, args.jwt_audience.clone())?)
        } else {
            None
        };

        Ok(Self {
            args,
            controller,
            jwt,
            search_backend,
            started_at: Instant::now(),
        })
    }

    /// Resolve the caller from the `Authorization` header
    fn authenticate(&self, headers: &HeaderMap) -> Result<Option<CallerIdentity>> {
        let Some(jwt) = &self.jwt else {
            return Ok(None);
        };
        let header = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
        let token = extract_token_from_header(header)
            .ok_or_else(|| PlanError::Unauthorized("Bearer token required".into()))?;
        jwt.verify(token).map(Some)
    }
}

/// Start the HTTP server, returning once `shutdown` resolves
pub async fn run(state: Arc<AppState>, shutdown: impl Future<Output = ()>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;
    info!("Plansync listening on {}", state.args.listen);

    if state.jwt.is_none() {
        warn!("Authentication disabled (development mode)");
    }

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("HTTP server stopping");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { Ok::<_, Infallible>(handle_request(state, req).await) }
                        });

                        if let Err(err) = http1::Builder::new()
                            .serve_connection(io, service)
                            .await
                        {
                            error!("Error serving connection from {}: {:?}", addr, err);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {:?}", e);
                }
            }
        }
    }
}

/// Route one HTTP request
pub async fn handle_request<B>(state: Arc<AppState>, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("{} {}", method, path);

    if method == Method::GET && path == "/health" {
        return routes::health_check(&state);
    }

    if path.starts_with("/v1/") {
        match state.authenticate(req.headers()) {
            Ok(Some(caller)) => debug!(subject = %caller.subject, "Authenticated request"),
            Ok(None) => {}
            Err(err) => return routes::error_response(err),
        }
        return routes::handle_plans_request(req, &state).await;
    }

    routes::error_response(PlanError::NotFound(format!("no route for {} {}", method, path)))
}
