// HTTP transport for the identity service
// One blocking request per call; retry policy lives in the provider

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};

use crate::error::{Error, Result};
use crate::session::SessionState;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Request payload encoding
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/json`
    Json(serde_json::Value),

    /// `application/x-www-form-urlencoded`
    Form(Vec<(&'static str, String)>),
}

/// A single call against the identity service
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Human-readable operation name used in transport errors ("token request")
    pub operation: &'static str,
    pub method: Method,
    /// Path relative to the tenant URL, starting with `/`
    pub path: &'static str,
    pub body: RequestBody,
    /// Attach the session's bearer token
    pub authenticated: bool,
}

/// Sends requests to the identity service
///
/// Implementations must report a 401 on an authenticated request as
/// [`Error::AuthExpired`] and every other non-2xx as [`Error::HttpStatus`].
pub trait Transport {
    fn send(&self, session: &SessionState, request: &ApiRequest) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, session: &SessionState, request: &ApiRequest) -> Result<Vec<u8>> {
        (**self).send(session, request)
    }
}

/// Blocking `reqwest` transport with a fixed timeout
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("summon-wpm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::HttpClient)?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, session: &SessionState, request: &ApiRequest) -> Result<Vec<u8>> {
        let url = join_url(&session.tenant_url, request.path);

        tracing::debug!(
            method = %request.method,
            url = %url,
            authenticated = request.authenticated,
            "Sending HTTP request"
        );

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(ACCEPT, "application/json");

        builder = match &request.body {
            RequestBody::Json(value) => builder.header(CONTENT_TYPE, "application/json").json(value),
            RequestBody::Form(fields) => builder.form(fields),
        };

        if request.authenticated {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", session.auth_token));
        }

        let response = builder.send().map_err(|e| {
            tracing::warn!(
                error_kind = error_kind(&e),
                error = %e,
                url = %url,
                "HTTP request error"
            );
            Error::Transport {
                operation: request.operation,
                source: e,
            }
        })?;

        let status = response.status();
        tracing::debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            tracing::warn!(status = %status, url = %url, "Received error response");
            if status == StatusCode::UNAUTHORIZED && request.authenticated {
                return Err(Error::AuthExpired);
            }
            return Err(Error::HttpStatus(status));
        }

        let body = response.bytes().map_err(|e| Error::Transport {
            operation: request.operation,
            source: e,
        })?;

        Ok(body.to_vec())
    }
}

/// Join the tenant base URL and an endpoint path without doubling slashes
fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim().trim_end_matches('/'), path)
}

/// Categorize a reqwest error for logs
fn error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection_failed"
    } else if e.is_request() {
        "request_error"
    } else if e.is_body() {
        "body_error"
    } else if e.is_decode() {
        "decode_error"
    } else {
        "unknown"
    }
}
