use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The host pipeline is misconfigured, e.g. no session layer in front of
    /// the fuel middleware.
    #[error("fuel configuration error: {0}")]
    Configuration(String),

    /// No configured stack matches the assertion or legacy ticket.
    #[error("unable to determine stack from {0}")]
    UnresolvableTenant(&'static str),

    /// The assertion or ticket exchange decoded but is missing credentials.
    #[error("invalid assertion: {0}")]
    InvalidAssertion(String),

    /// Transport failure talking to the authorization endpoint.
    #[error("authorization endpoint error: {0}")]
    AuthEndpoint(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("session storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::AuthEndpoint(e.to_string())
    }
}

impl Error {
    /// The HTTP status a host should answer with when a request fails with
    /// this error.
    pub fn status(&self) -> http::StatusCode {
        use http::StatusCode;

        match self {
            Error::Unauthorized | Error::UnresolvableTenant(_) | Error::InvalidAssertion(_) => {
                StatusCode::UNAUTHORIZED
            }
            Error::AuthEndpoint(_) => StatusCode::BAD_REQUEST,
            Error::Configuration(_) | Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        (self.status(), self.to_string()).into_response()
    }
}
