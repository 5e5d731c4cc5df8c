//! Axum integration: a middleware function running the coordinator for every
//! request, and extractors for the session and the resulting fuel context.

use crate::coordinator::{Decision, FuelContext, FuelCoordinator, FuelRequest};
use crate::error::Error;
use crate::session::Session;
use crate::store::SessionStore;
use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header::CONTENT_TYPE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// The current request's session, shared between the host's session layer,
/// the fuel middleware and handlers.
///
/// The host session layer loads the record, inserts a handle into the request
/// extensions, and saves the record back (through the coordinator's guarded
/// store) once the response is produced.
#[derive(Debug, Clone)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().await
    }

    /// A copy of the session as it stands now.
    pub async fn snapshot(&self) -> Session {
        self.0.lock().await.clone()
    }
}

#[derive(Debug, Deserialize)]
struct AssertionBody {
    jwt: Option<String>,
}

/// Run the fuel coordinator in front of the wrapped routes.
///
/// Use with `axum::middleware::from_fn_with_state(coordinator, fuel_middleware::<S>)`.
pub async fn fuel_middleware<S>(
    State(fuel): State<Arc<FuelCoordinator<S>>>,
    request: Request,
    next: Next,
) -> Response
where
    S: SessionStore + 'static,
{
    match authorize_request(&fuel, request).await {
        Ok(request) => next.run(request).await,
        Err(response) => response,
    }
}

async fn authorize_request<S>(
    fuel: &FuelCoordinator<S>,
    request: Request,
) -> Result<Request, Response>
where
    S: SessionStore,
{
    let handle = request.extensions().get::<SessionHandle>().cloned();
    let path = request.uri().path().to_owned();

    let (mut request, assertion) = if handle.is_some() && !fuel.is_bypass(&path) {
        read_assertion(request, fuel.options().max_body_bytes).await?
    } else {
        (request, None)
    };

    let fuel_request = FuelRequest {
        path: &path,
        assertion: assertion.as_deref(),
    };

    let decision = match &handle {
        Some(handle) => {
            let mut session = handle.lock().await;
            fuel.authorize(&fuel_request, Some(&mut *session)).await
        }
        None => fuel.authorize(&fuel_request, None).await,
    }
    .map_err(IntoResponse::into_response)?;

    if let Decision::Continue(context) = decision {
        request.extensions_mut().insert(context);
    }

    Ok(request)
}

// Buffers form and JSON bodies to look for a `jwt` field, then puts the bytes
// back so downstream handlers can still read the body.
async fn read_assertion(
    request: Request,
    limit: usize,
) -> Result<(Request, Option<String>), Response> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let is_form = content_type.starts_with("application/x-www-form-urlencoded");
    let is_json = content_type.starts_with("application/json");
    if !is_form && !is_json {
        return Ok((request, None));
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, limit).await.map_err(|e| {
        tracing::warn!(error = %e, "could not buffer request body");
        (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response()
    })?;

    let parsed = if is_form {
        serde_urlencoded::from_bytes::<AssertionBody>(&bytes).ok()
    } else {
        serde_json::from_slice::<AssertionBody>(&bytes).ok()
    };

    let request = Request::<Body>::from_parts(parts, Body::from(bytes));
    Ok((request, parsed.and_then(|body| body.jwt)))
}

impl<S> FromRequestParts<S> for FuelContext
where
    S: Send + Sync,
{
    type Rejection = Error;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let context = parts.extensions.get::<FuelContext>().cloned();

        async move {
            context.ok_or_else(|| {
                Error::Configuration("fuel middleware is not installed on this route".to_string())
            })
        }
    }
}

impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = Error;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let handle = parts.extensions.get::<SessionHandle>().cloned();

        async move { handle.ok_or_else(|| Error::Configuration("no session layer".to_string())) }
    }
}
