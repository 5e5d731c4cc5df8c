use crate::config::{FuelOptions, StackConfig};
use crate::error::{Error, Result};
use crate::session::{Session, TokenState};
use crate::stack::StackRegistry;
use crate::store::{ExpiryGuard, SessionStore};
use crate::token::TokenClient;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::Instrument;

const MISSING_SESSION: &str = "a session layer must be in place before the fuel middleware; \
     do not store sessions in cookies";

/// What a request needs to know about its fuel session once it is usable.
#[derive(Debug, Clone)]
pub struct FuelContext {
    /// Stack the session's tokens belong to
    pub stack: Arc<StackConfig>,

    /// Navigation hint carried by a freshly accepted assertion
    pub deep_link: Option<String>,
}

impl FuelContext {
    fn new(stack: Arc<StackConfig>) -> Self {
        Self {
            stack,
            deep_link: None,
        }
    }
}

/// The parts of an inbound request the coordinator looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuelRequest<'a> {
    pub path: &'a str,
    /// Signed assertion posted in the request body, if any
    pub assertion: Option<&'a str>,
}

/// How a request should proceed.
#[derive(Debug, Clone)]
pub enum Decision {
    /// Anonymous path, nothing was attached
    Bypass,
    /// The session holds usable tokens for this stack
    Continue(FuelContext),
}

/// Establishes, tracks and refreshes the fuel tokens of host sessions.
pub struct FuelCoordinator<S> {
    pub(crate) registry: StackRegistry,
    pub(crate) options: FuelOptions,
    pub(crate) store: ExpiryGuard<S>,
    pub(crate) tokens: TokenClient,
    request_counter: AtomicU64,
}

impl<S: SessionStore> FuelCoordinator<S> {
    pub fn builder() -> FuelCoordinatorBuilder<S> {
        FuelCoordinatorBuilder::default()
    }

    pub fn options(&self) -> &FuelOptions {
        &self.options
    }

    pub fn registry(&self) -> &StackRegistry {
        &self.registry
    }

    /// The guarded session store. Hosts save sessions through this so expired
    /// token states never overwrite fresher ones.
    pub fn store(&self) -> &ExpiryGuard<S> {
        &self.store
    }

    pub fn is_bypass(&self, path: &str) -> bool {
        self.options.bypass_path.as_deref() == Some(path)
    }

    /// Decide how a request proceeds, initializing or refreshing the session's
    /// token state on the way.
    ///
    /// `session` is `None` when the host has no session layer, which is a
    /// configuration error.
    pub async fn authorize(
        &self,
        request: &FuelRequest<'_>,
        session: Option<&mut Session>,
    ) -> Result<Decision> {
        let request_num = self.request_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let span = tracing::info_span!("fuel", request = request_num);

        self.decide(request, session).instrument(span).await
    }

    async fn decide(&self, request: &FuelRequest<'_>, session: Option<&mut Session>) -> Result<Decision> {
        let Some(session) = session else {
            return Err(Error::Configuration(MISSING_SESSION.to_string()));
        };

        if self.is_bypass(request.path) {
            return Ok(Decision::Bypass);
        }

        if let Some(assertion) = request.assertion.filter(|a| !a.is_empty()) {
            tracing::info!("initialize session from jwt");
            let initialized = self.init_from_assertion(assertion)?;
            session.record.fuel = Some(initialized.state);
            return Ok(Decision::Continue(FuelContext {
                stack: initialized.stack,
                deep_link: initialized.deep_link,
            }));
        }

        if let Some(fuel) = &session.record.fuel {
            let expired = fuel.is_expired();
            let stack = self.stack_for(fuel)?;
            if expired {
                tracing::info!(stack = %stack.key, "refreshing session");
                self.refresh(session, &stack).await?;
            }
            return Ok(Decision::Continue(FuelContext::new(stack)));
        }

        if session.record.cas.is_some() {
            tracing::info!("initialize session from cas");
            let stack = self.init_from_legacy_ticket(session).await?;
            return Ok(Decision::Continue(FuelContext::new(stack)));
        }

        Err(Error::Unauthorized)
    }

    fn stack_for(&self, fuel: &TokenState) -> Result<Arc<StackConfig>> {
        self.registry.resolve_by_key(&fuel.stack_key).ok_or_else(|| {
            tracing::warn!(stack = %fuel.stack_key, "session refers to an unknown stack");
            Error::UnresolvableTenant("session")
        })
    }
}

pub struct FuelCoordinatorBuilder<S> {
    registry: Option<StackRegistry>,
    options: FuelOptions,
    session_store: Option<S>,
    http_client: Option<reqwest::Client>,
}

impl<S> Default for FuelCoordinatorBuilder<S> {
    fn default() -> Self {
        Self {
            registry: None,
            options: FuelOptions::default(),
            session_store: None,
            http_client: None,
        }
    }
}

impl<S: SessionStore> FuelCoordinatorBuilder<S> {
    pub fn registry(mut self, registry: StackRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn options(mut self, options: FuelOptions) -> Self {
        self.options = options;
        self
    }

    /// The raw session store; it is wrapped in an [`ExpiryGuard`] on build.
    pub fn session_store(mut self, store: S) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(self) -> Result<FuelCoordinator<S>> {
        let registry = self
            .registry
            .ok_or_else(|| Error::Configuration("stack registry required".to_string()))?;
        let store = self
            .session_store
            .ok_or_else(|| Error::Configuration("session_store required".to_string()))?;

        Ok(FuelCoordinator {
            registry,
            options: self.options,
            store: ExpiryGuard::new(store),
            tokens: TokenClient::new(self.http_client.unwrap_or_default()),
            request_counter: AtomicU64::new(0),
        })
    }
}
