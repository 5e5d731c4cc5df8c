//! # fuel-session
//!
//! Session-bound token lifecycle for apps embedded in a multi-stack platform.
//!
//! The platform hands a user over either with a signed assertion (a JWT posted
//! in the request body) or with a legacy ticket stored in the session. This
//! crate turns either into a token state kept in the host's session, refreshes
//! it against the stack's authorization endpoint shortly before it expires,
//! and keeps concurrent requests on the same session from overwriting a
//! refreshed token state with a stale one.
//!
//! ## Features
//!
//! - **Stack resolution**: by key, by assertion signature, or by ticket base URL
//! - **Proactive refresh**: expiries are pulled forward by a refresh buffer
//! - **Concurrent refresh recovery**: a declined refresh polls the session
//!   store for the winner's token state
//! - **Guarded saves**: [`ExpiryGuard`] drops writes of expired token states
//! - **Axum middleware** (default `axum` feature)
//!
//! ## Example
//!
//! ```rust,no_run
//! use fuel_session::{FuelCoordinator, FuelOptions, MemorySessionStore, StackRegistry};
//! # fn stacks() -> Vec<fuel_session::StackConfig> { unimplemented!() }
//!
//! # fn example() -> fuel_session::Result<()> {
//! let fuel = FuelCoordinator::builder()
//!     .registry(StackRegistry::new(stacks())?)
//!     .options(FuelOptions::new())
//!     .session_store(MemorySessionStore::new())
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod assertion;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod init;
#[cfg(feature = "axum")]
pub mod middleware;
pub mod refresh;
pub mod session;
pub mod stack;
pub mod store;
pub mod token;

pub use config::{FuelOptions, StackConfig};
pub use coordinator::{Decision, FuelContext, FuelCoordinator, FuelCoordinatorBuilder, FuelRequest};
pub use error::{Error, Result};
pub use init::Initialized;
#[cfg(feature = "axum")]
pub use middleware::{SessionHandle, fuel_middleware};
pub use session::{LegacyTicket, Session, SessionId, SessionRecord, TokenState};
pub use stack::StackRegistry;
pub use store::{ExpiryGuard, MemorySessionStore, SaveOutcome, SessionStore};
pub use token::{TokenClient, TokenGrant, TokenResponse};
