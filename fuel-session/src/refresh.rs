//! Refreshing expired fuel sessions, and picking up refreshes made by
//! concurrent requests on the same session.

use crate::config::StackConfig;
use crate::coordinator::FuelCoordinator;
use crate::error::{Error, Result};
use crate::session::{Session, TokenState, expiry_from, now_millis};
use crate::store::SessionStore;

impl<S: SessionStore> FuelCoordinator<S> {
    /// Refresh the session's token state against the stack's endpoint.
    ///
    /// A response carrying a new refresh token is a successful refresh. When
    /// the endpoint hands out no refresh token (typically because another
    /// request already used the refresh token), the session store is polled
    /// for a fresher state instead. Running out of attempts is not an error:
    /// the request continues with the state it has.
    pub async fn refresh(&self, session: &mut Session, stack: &StackConfig) -> Result<()> {
        let current = session.record.fuel.clone().ok_or(Error::Unauthorized)?;

        let response = self.tokens.refresh(stack, &current.refresh_token).await?;

        match response.into_refresh_grant() {
            Some(grant) => {
                session.record.fuel = Some(TokenState {
                    access_token: grant.access_token,
                    legacy_token: grant.legacy_token,
                    refresh_token: grant.refresh_token,
                    expires_at: expiry_from(
                        now_millis(),
                        grant.expires_in,
                        self.options.refresh_buffer,
                    ),
                    ..current
                });
                self.store.save(&session.id, &session.record).await?;
                tracing::info!(stack = %stack.key, "refresh successful");
            }
            None => {
                tracing::info!(stack = %stack.key, "refresh failed, checking for new session");
                self.reload_fresher_state(session, current.expires_at).await;
            }
        }

        Ok(())
    }

    /// Poll the store until it holds a token state expiring strictly later
    /// than `stale_expiry`, then adopt it.
    ///
    /// Reads once immediately and then up to `token_reload_attempts` more
    /// times, sleeping `token_reload_wait` before each retry. Returns whether a
    /// fresher state was adopted.
    pub async fn reload_fresher_state(&self, session: &mut Session, stale_expiry: i64) -> bool {
        // One more read than the attempt budget: the first read is immediate.
        for attempt in 0..=self.options.token_reload_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.options.reload_wait()).await;
            }

            let saved = match self.store.load(&session.id).await {
                Ok(saved) => saved,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "session reload failed");
                    None
                }
            };

            if let Some(fuel) = saved
                .and_then(|record| record.fuel)
                .filter(|fuel| fuel.expires_at > stale_expiry)
            {
                tracing::info!(attempt, "adopting token state refreshed by another request");
                session.record.fuel = Some(fuel);
                return true;
            }
        }

        tracing::warn!(
            attempts = self.options.token_reload_attempts,
            "refresh reload hit max attempts, token could not be refreshed"
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FuelOptions;
    use crate::session::SessionRecord;
    use crate::stack::StackRegistry;
    use crate::store::MemorySessionStore;
    use std::time::Duration;

    fn stack() -> StackConfig {
        StackConfig::new(
            "s1",
            "client",
            "shh",
            "http://127.0.0.1:9/v1/requestToken".parse().unwrap(),
            "sig",
            "http://rest.s1/",
        )
    }

    fn coordinator(store: MemorySessionStore, attempts: u32) -> FuelCoordinator<MemorySessionStore> {
        FuelCoordinator::builder()
            .registry(StackRegistry::new([stack()]).unwrap())
            .options(
                FuelOptions::new()
                    .with_reload_attempts(attempts)
                    .with_reload_wait(Duration::from_millis(20)),
            )
            .session_store(store)
            .build()
            .unwrap()
    }

    fn record(access: &str, expires_at: i64) -> SessionRecord {
        SessionRecord {
            fuel: Some(TokenState {
                access_token: access.into(),
                legacy_token: "l".into(),
                refresh_token: "r".into(),
                expires_at,
                stack_key: "s1".into(),
                member_id: Some("7001".into()),
                enterprise_id: None,
                culture: None,
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn adopts_state_that_appears_during_polling() {
        let store = MemorySessionStore::new();
        let fuel = coordinator(store.clone(), 5);
        let stale = now_millis() - 1;
        let mut session = Session::new("sid", record("stale", stale));

        let fresh = record("fresh", now_millis() + 60_000);
        let writer = {
            let store = store.clone();
            let fresh = fresh.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                store.save(&"sid".to_string(), &fresh).await.unwrap();
            })
        };

        let adopted = fuel.reload_fresher_state(&mut session, stale).await;
        writer.await.unwrap();

        assert!(adopted);
        assert_eq!(session.record.fuel, fresh.fuel);
    }

    #[tokio::test]
    async fn equal_expiry_is_not_fresher() {
        let store = MemorySessionStore::new();
        let stale = now_millis() - 1;
        store
            .save(&"sid".to_string(), &record("other", stale))
            .await
            .unwrap();
        let fuel = coordinator(store, 2);
        let mut session = Session::new("sid", record("mine", stale));

        let adopted = fuel.reload_fresher_state(&mut session, stale).await;

        assert!(!adopted);
        assert_eq!(session.record.fuel.unwrap().access_token, "mine");
    }

    #[tokio::test]
    async fn gives_up_after_attempt_budget() {
        let fuel = coordinator(MemorySessionStore::new(), 3);
        let stale = now_millis() - 1;
        let mut session = Session::new("sid", record("mine", stale));

        let started = std::time::Instant::now();
        let adopted = fuel.reload_fresher_state(&mut session, stale).await;

        assert!(!adopted);
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(session.record.fuel.unwrap().access_token, "mine");
    }
}
