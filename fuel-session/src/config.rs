use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Tunables for the fuel middleware.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FuelOptions {
    /// Extra session reloads after a refresh the endpoint declined (default: 5)
    pub token_reload_attempts: u32,

    /// Milliseconds to wait between session reloads (default: 1000)
    pub token_reload_wait: u64,

    /// Milliseconds subtracted from every declared token lifetime (default: 1000)
    pub refresh_buffer: i64,

    /// Substring an assertion issuer must contain to be accepted
    pub issuer_marker: String,

    /// Path served without any fuel session (the test harness)
    pub bypass_path: Option<String>,

    /// Largest request body buffered while looking for an assertion
    pub max_body_bytes: usize,
}

impl Default for FuelOptions {
    fn default() -> Self {
        Self {
            token_reload_attempts: 5,
            token_reload_wait: 1000,
            refresh_buffer: 1000,
            issuer_marker: "exacttarget".to_string(),
            bypass_path: Some("/harness".to_string()),
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl FuelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reload_attempts(mut self, attempts: u32) -> Self {
        self.token_reload_attempts = attempts;
        self
    }

    pub fn with_reload_wait(mut self, wait: Duration) -> Self {
        self.token_reload_wait = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = i64::try_from(buffer.as_millis()).unwrap_or(i64::MAX);
        self
    }

    pub fn with_issuer_marker(mut self, marker: impl Into<String>) -> Self {
        self.issuer_marker = marker.into();
        self
    }

    /// Set or clear the anonymous bypass path
    pub fn with_bypass_path(mut self, path: Option<String>) -> Self {
        self.bypass_path = path;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn reload_wait(&self) -> Duration {
        Duration::from_millis(self.token_reload_wait)
    }
}

/// One configured stack (tenant) and its credentials for the authorization
/// endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackConfig {
    /// Registry key, referenced by `TokenState::stack_key`
    pub key: String,

    pub client_id: String,

    pub client_secret: String,

    /// Token endpoint used for both refresh and ticket grants
    pub auth_url: Url,

    /// Shared secret the platform signs assertions with
    pub app_signature: String,

    /// REST base URL a legacy ticket is matched against
    pub base_url: String,

    #[serde(default)]
    pub app_id: Option<String>,

    #[serde(default)]
    pub legacy_rest_host: Option<String>,

    #[serde(default)]
    pub fuelapi_rest_host: Option<String>,
}

impl StackConfig {
    pub fn new(
        key: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        auth_url: Url,
        app_signature: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url,
            app_signature: app_signature.into(),
            base_url: base_url.into(),
            app_id: None,
            legacy_rest_host: None,
            fuelapi_rest_host: None,
        }
    }
}
