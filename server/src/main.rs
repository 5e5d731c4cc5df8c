use axum::{
    Form, Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use fuel_session::{
    FuelContext, FuelCoordinator, LegacyTicket, MemorySessionStore, SessionHandle, StackRegistry,
    fuel_middleware,
};
use miette::{IntoDiagnostic, Result};
use serde_json::{Value, json};
use std::{path::PathBuf, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod config;
mod session;

pub type Fuel = Arc<FuelCoordinator<MemorySessionStore>>;

/// Landing page the platform posts its assertion to.
async fn handle_root(context: FuelContext, session: SessionHandle) -> Json<Value> {
    let session = session.lock().await;
    let member = session
        .record
        .fuel
        .as_ref()
        .and_then(|fuel| fuel.member_id.clone());

    Json(json!({
        "stack": context.stack.key,
        "deepLink": context.deep_link,
        "member": member,
    }))
}

async fn handle_whoami(context: FuelContext, session: SessionHandle) -> Json<Value> {
    let session = session.lock().await;
    let fuel = session.record.fuel.as_ref();

    Json(json!({
        "stack": context.stack.key,
        "restBase": context.stack.base_url,
        "enterprise": fuel.and_then(|f| f.enterprise_id.clone()),
        "culture": fuel.and_then(|f| f.culture.clone()),
        "expiresAt": fuel.map(|f| f.expires_at),
    }))
}

async fn handle_harness() -> &'static str {
    "ok"
}

/// Stores a legacy ticket in the session, as the platform's classic login
/// flow would. The next request through the fuel middleware exchanges it.
async fn handle_ticket(session: SessionHandle, Form(ticket): Form<LegacyTicket>) -> &'static str {
    tracing::info!(base_url = %ticket.base_url, "legacy ticket stored");
    session.lock().await.record.cas = Some(ticket);
    "ticket stored"
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("server=debug,fuel_session=debug,info")),
        )
        .init();

    let config_path =
        PathBuf::from(std::env::var("FUEL_CONFIG").unwrap_or_else(|_| "fuel.toml".to_string()));
    let config = config::ServerConfig::load(&config_path)?;
    tracing::info!(path = %config_path.display(), stacks = config.stacks.len(), "loaded configuration");

    let registry = StackRegistry::new(config.stacks).into_diagnostic()?;
    let fuel: Fuel = Arc::new(
        FuelCoordinator::builder()
            .registry(registry)
            .options(config.options)
            .session_store(MemorySessionStore::new())
            .build()
            .into_diagnostic()?,
    );

    let protected = Router::new()
        .route("/", get(handle_root).post(handle_root))
        .route("/api/whoami", get(handle_whoami))
        .route("/harness", get(handle_harness))
        .layer(from_fn_with_state(
            fuel.clone(),
            fuel_middleware::<MemorySessionStore>,
        ));

    let app = Router::new()
        .route("/cas", post(handle_ticket))
        .merge(protected)
        .layer(from_fn_with_state(fuel, session::session_layer))
        .layer(TraceLayer::new_for_http());

    let listen = std::env::var("FUEL_LISTEN").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .into_diagnostic()?;
    tracing::info!(%listen, "listening");

    axum::serve(listener, app).await.into_diagnostic()?;
    Ok(())
}
