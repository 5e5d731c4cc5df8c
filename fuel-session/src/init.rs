//! Establishing a fuel session from a platform assertion or a legacy ticket.

use crate::assertion::{self, AssertionClaims};
use crate::config::StackConfig;
use crate::coordinator::FuelCoordinator;
use crate::error::{Error, Result};
use crate::session::{Session, TokenState, expiry_from, now_millis};
use crate::store::SessionStore;
use std::sync::Arc;

/// Token state derived from an accepted assertion.
#[derive(Debug, Clone)]
pub struct Initialized {
    pub state: TokenState,
    pub stack: Arc<StackConfig>,
    pub deep_link: Option<String>,
}

impl<S: SessionStore> FuelCoordinator<S> {
    /// Build a token state from a signed platform assertion.
    ///
    /// The stack is whichever configured stack's secret verifies the
    /// assertion first, and the issuer must contain the configured marker.
    pub fn init_from_assertion(&self, assertion: &str) -> Result<Initialized> {
        let Some((stack, claims)) = self.registry.resolve_by_signature(assertion) else {
            tracing::warn!(
                stacks = self.registry.len(),
                "no configured stack verifies the assertion"
            );
            return Err(Error::UnresolvableTenant("jwt"));
        };

        match assertion::issuer(&claims) {
            Some(iss) if iss.contains(&self.options.issuer_marker) => {}
            iss => {
                tracing::warn!(stack = %stack.key, issuer = ?iss, "assertion issuer rejected");
                return Err(Error::UnresolvableTenant("jwt"));
            }
        }

        let claims = AssertionClaims::from_value(claims)
            .map_err(|e| Error::InvalidAssertion(e.to_string()))?;
        let deep_link = claims.deep_link().map(str::to_owned);
        let request = claims.request;

        if request.organization.stack_key != stack.key {
            tracing::info!(
                stack = %stack.key,
                claimed = %request.organization.stack_key,
                "assertion names a different stack key than the one that verified it"
            );
        }
        tracing::info!(
            stack = %stack.key,
            organization = ?request.organization.id,
            application = ?request.application.as_ref().and_then(|a| a.id.as_deref()),
            "accepted assertion"
        );

        let state = TokenState {
            access_token: request.user.oauth_token,
            legacy_token: request.user.internal_oauth_token,
            refresh_token: request.user.refresh_token,
            expires_at: expiry_from(
                now_millis(),
                request.user.expires_in,
                self.options.refresh_buffer,
            ),
            stack_key: stack.key.clone(),
            member_id: request.organization.id,
            enterprise_id: request.organization.enterprise_id,
            culture: request.user.culture,
        };

        Ok(Initialized {
            state,
            stack,
            deep_link,
        })
    }

    /// Exchange the session's legacy ticket for a token state and persist it.
    pub async fn init_from_legacy_ticket(&self, session: &mut Session) -> Result<Arc<StackConfig>> {
        let ticket = session.record.cas.clone().ok_or(Error::Unauthorized)?;

        let stack = self
            .registry
            .resolve_by_base_url(&ticket.base_url)
            .ok_or_else(|| {
                tracing::warn!(base_url = %ticket.base_url, "no configured stack for legacy ticket");
                Error::UnresolvableTenant("cas")
            })?;

        let grant = self
            .tokens
            .exchange_ticket(&stack, &ticket.token)
            .await?
            .into_grant()
            .ok_or_else(|| Error::InvalidAssertion("invalid cas session".to_string()))?;

        session.record.fuel = Some(TokenState {
            access_token: grant.access_token,
            legacy_token: grant.legacy_token,
            refresh_token: grant.refresh_token,
            expires_at: expiry_from(now_millis(), grant.expires_in, self.options.refresh_buffer),
            stack_key: stack.key.clone(),
            member_id: None,
            enterprise_id: None,
            culture: None,
        });

        self.store.save(&session.id, &session.record).await?;
        tracing::info!(stack = %stack.key, "session initialized from cas");

        Ok(stack)
    }
}
