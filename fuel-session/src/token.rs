use crate::config::StackConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Client for a stack's authorization (token) endpoint.
#[derive(Debug, Clone, Default)]
pub struct TokenClient {
    http: reqwest::Client,
}

impl TokenClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Exchange a refresh token for a new token set.
    pub async fn refresh(&self, stack: &StackConfig, refresh_token: &str) -> Result<TokenResponse> {
        self.request(
            stack,
            &TokenRequest {
                client_id: &stack.client_id,
                client_secret: &stack.client_secret,
                refresh_token: Some(refresh_token),
                scope: None,
                access_type: "offline",
            },
        )
        .await
    }

    /// Exchange a legacy ticket for a token set.
    pub async fn exchange_ticket(&self, stack: &StackConfig, ticket: &str) -> Result<TokenResponse> {
        self.request(
            stack,
            &TokenRequest {
                client_id: &stack.client_id,
                client_secret: &stack.client_secret,
                refresh_token: None,
                scope: Some(format!("cas:{}", ticket)),
                access_type: "offline",
            },
        )
        .await
    }

    // Only transport failures are errors. Whatever the endpoint answers is
    // decoded leniently; a rejection shows up as a response without tokens.
    async fn request(&self, stack: &StackConfig, body: &TokenRequest<'_>) -> Result<TokenResponse> {
        let response = self
            .http
            .post(stack.auth_url.clone())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            tracing::info!(stack = %stack.key, %status, "authorization endpoint declined token request");
            return Ok(TokenResponse::default());
        }

        match serde_json::from_slice(&bytes) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                tracing::info!(stack = %stack.key, error = %e, "unreadable authorization endpoint response");
                Ok(TokenResponse::default())
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    access_type: &'static str,
}

/// Body of an authorization endpoint response. Every field is optional
/// because a declined request answers with some or none of them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub legacy_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// A complete token set granted by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub legacy_token: String,
    pub refresh_token: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

impl TokenResponse {
    /// The granted token set, if the response carries all three tokens.
    pub fn into_grant(self) -> Option<TokenGrant> {
        Some(TokenGrant {
            access_token: self.access_token?,
            legacy_token: self.legacy_token?,
            refresh_token: self.refresh_token?,
            expires_in: self.expires_in.unwrap_or_default(),
        })
    }

    /// The token set of a refresh response. A new refresh token is what marks
    /// the refresh as granted; a missing access or legacy token is left empty.
    pub fn into_refresh_grant(self) -> Option<TokenGrant> {
        Some(TokenGrant {
            refresh_token: self.refresh_token?,
            access_token: self.access_token.unwrap_or_default(),
            legacy_token: self.legacy_token.unwrap_or_default(),
            expires_in: self.expires_in.unwrap_or_default(),
        })
    }
}

impl From<TokenGrant> for TokenResponse {
    fn from(grant: TokenGrant) -> Self {
        Self {
            access_token: Some(grant.access_token),
            legacy_token: Some(grant.legacy_token),
            refresh_token: Some(grant.refresh_token),
            expires_in: Some(grant.expires_in),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn stack(server: &MockServer) -> StackConfig {
        StackConfig::new(
            "s1",
            "client",
            "shh",
            format!("{}/v1/requestToken", server.uri()).parse().unwrap(),
            "sig",
            "http://rest/",
        )
    }

    #[test]
    fn grant_requires_all_three_tokens() {
        let partial = TokenResponse {
            access_token: Some("a".into()),
            legacy_token: None,
            refresh_token: Some("r".into()),
            expires_in: Some(60),
        };
        assert!(partial.into_grant().is_none());

        let full = TokenResponse {
            legacy_token: Some("l".into()),
            ..TokenResponse::from(TokenGrant {
                access_token: "a".into(),
                legacy_token: "x".into(),
                refresh_token: "r".into(),
                expires_in: 60,
            })
        };
        assert_eq!(full.into_grant().unwrap().legacy_token, "l");
    }

    #[test]
    fn refresh_grant_only_needs_a_refresh_token() {
        let rotated = TokenResponse {
            access_token: Some("a".into()),
            legacy_token: None,
            refresh_token: Some("r".into()),
            expires_in: Some(60),
        };
        assert_eq!(
            rotated.into_refresh_grant(),
            Some(TokenGrant {
                access_token: "a".into(),
                legacy_token: String::new(),
                refresh_token: "r".into(),
                expires_in: 60,
            })
        );

        let declined = TokenResponse {
            access_token: Some("a".into()),
            ..Default::default()
        };
        assert!(declined.into_refresh_grant().is_none());
    }

    #[tokio::test]
    async fn refresh_posts_offline_refresh_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/requestToken"))
            .and(body_json(json!({
                "clientId": "client",
                "clientSecret": "shh",
                "refreshToken": "old-refresh",
                "accessType": "offline"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "x",
                "legacyToken": "y",
                "refreshToken": "z",
                "expiresIn": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = TokenClient::default()
            .refresh(&stack(&server), "old-refresh")
            .await
            .unwrap();

        assert_eq!(
            response.into_grant(),
            Some(TokenGrant {
                access_token: "x".into(),
                legacy_token: "y".into(),
                refresh_token: "z".into(),
                expires_in: 3600,
            })
        );
    }

    #[tokio::test]
    async fn ticket_exchange_sends_cas_scope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({
                "clientId": "client",
                "clientSecret": "shh",
                "scope": "cas:ticket-1",
                "accessType": "offline"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let response = TokenClient::default()
            .exchange_ticket(&stack(&server), "ticket-1")
            .await
            .unwrap();

        assert!(response.refresh_token.is_none());
    }

    #[tokio::test]
    async fn rejected_or_unreadable_responses_carry_no_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_grant"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = TokenClient::default();
        let rejected = client.refresh(&stack(&server), "r").await.unwrap();
        let unreadable = client.refresh(&stack(&server), "r").await.unwrap();

        assert!(rejected.refresh_token.is_none());
        assert!(unreadable.refresh_token.is_none());
    }

    #[tokio::test]
    async fn transport_failure_is_an_endpoint_error() {
        let unreachable = StackConfig::new(
            "s1",
            "client",
            "shh",
            "http://127.0.0.1:9/v1/requestToken".parse().unwrap(),
            "sig",
            "http://rest/",
        );

        let result = TokenClient::default().refresh(&unreachable, "r").await;

        assert!(matches!(result, Err(Error::AuthEndpoint(_))));
    }
}
