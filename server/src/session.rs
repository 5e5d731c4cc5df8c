//! Cookie-keyed sessions backed by the coordinator's guarded store.

use crate::Fuel;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header::COOKIE, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use fuel_session::{Session, SessionHandle, SessionStore};

const COOKIE_NAME: &str = "fuel_sid";

/// Load the session named by the request's cookie (or start a new one),
/// expose it to inner layers as a [`SessionHandle`], and write it back once
/// the response is ready.
pub async fn session_layer(State(fuel): State<Fuel>, mut request: Request, next: Next) -> Response {
    let (id, is_new) = match session_id(request.headers()) {
        Some(id) => (id.to_owned(), false),
        None => (generate_session_id(), true),
    };

    let record = match fuel.store().load(&id).await {
        Ok(record) => record.unwrap_or_default(),
        Err(e) => return e.into_response(),
    };

    let handle = SessionHandle::new(Session::new(id.clone(), record));
    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;

    let session = handle.snapshot().await;
    // A new session that stayed empty is neither stored nor handed a cookie.
    if is_new && session.record.is_empty() {
        return response;
    }

    if let Err(e) = fuel.store().save(&session.id, &session.record).await {
        tracing::error!(session = %session.id, error = %e, "failed to save session");
    }

    if is_new {
        let cookie = format!("{COOKIE_NAME}={id}; Path=/; HttpOnly; SameSite=None; Secure");
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().insert(SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "session cookie is not a valid header"),
        }
    }

    response
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|cookie| {
                cookie
                    .trim()
                    .strip_prefix(COOKIE_NAME)
                    .and_then(|rest| rest.strip_prefix('='))
            })
        })
        .filter(|id| !id.is_empty())
}

fn generate_session_id() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    hex::encode(bytes)
}
