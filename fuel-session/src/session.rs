use serde::{Deserialize, Serialize};

/// Unique identifier for a host session
pub type SessionId = String;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Expiry for a token issued at `issued_at` (epoch ms) with a declared
/// lifetime of `expires_in` seconds, pulled forward by `refresh_buffer` ms.
///
/// Saturates at the `i64` bounds; lifetimes come from the network.
pub fn expiry_from(issued_at: i64, expires_in: i64, refresh_buffer: i64) -> i64 {
    issued_at
        .saturating_add(expires_in.saturating_mul(1000))
        .saturating_sub(refresh_buffer)
}

/// Credentials a session currently holds for one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenState {
    pub access_token: String,
    pub legacy_token: String,
    pub refresh_token: String,

    /// Epoch milliseconds after which the state must be refreshed
    pub expires_at: i64,

    /// Key of the `StackConfig` these tokens were issued for
    pub stack_key: String,

    pub member_id: Option<String>,
    pub enterprise_id: Option<String>,
    pub culture: Option<String>,
}

impl TokenState {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Legacy ticket handed over by the platform instead of a signed assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyTicket {
    #[serde(rename = "BaseUrl")]
    pub base_url: String,

    #[serde(rename = "Token")]
    pub token: String,
}

/// What the host session store keeps for a session.
///
/// Anything else the host application puts in the session rides along in
/// `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel: Option<TokenState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cas: Option<LegacyTicket>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SessionRecord {
    /// True when the record carries a token state that is already stale.
    pub fn has_expired_fuel(&self) -> bool {
        self.fuel.as_ref().is_some_and(TokenState::is_expired)
    }

    /// True when nothing has been stored in the record yet.
    pub fn is_empty(&self) -> bool {
        self.fuel.is_none() && self.cas.is_none() && self.extra.is_empty()
    }
}

/// A session as seen by one request: its id and a working copy of the record.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub record: SessionRecord,
}

impl Session {
    pub fn new(id: impl Into<SessionId>, record: SessionRecord) -> Self {
        Self {
            id: id.into(),
            record,
        }
    }
}
