// Service account authentication via the OAuth2 client-credentials grant

use chrono::Utc;
use reqwest::Method;

use super::types::{TokenResponse, TOKEN_ENDPOINT};
use crate::error::{Error, Result};
use crate::http_client::{ApiRequest, RequestBody, Transport};
use crate::session::{SessionState, SettingsStore};

/// Exchange the session's client id and secret for a bearer token
///
/// On success the token is persisted and written into `session`. On any
/// failure `session` is left untouched. The caller checks that both the id
/// and the secret are configured.
pub fn authenticate<R, S>(transport: &R, store: &S, session: &mut SessionState) -> Result<()>
where
    R: Transport + ?Sized,
    S: SettingsStore + ?Sized,
{
    tracing::debug!(
        client_id = %session.client_id,
        "Requesting token with client credentials"
    );

    let request = ApiRequest {
        operation: "token request",
        method: Method::POST,
        path: TOKEN_ENDPOINT,
        body: RequestBody::Form(vec![
            ("grant_type", "client_credentials".to_string()),
            ("client_id", session.client_id.clone()),
            ("client_secret", session.client_secret.clone()),
        ]),
        authenticated: false,
    };

    let body = transport.send(session, &request)?;
    let response: TokenResponse = serde_json::from_slice(&body).map_err(|source| Error::Decode {
        what: "token",
        source,
    })?;

    let access_token = response
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Protocol("no access token received".to_string()))?;

    // A missing or zero lifetime leaves the expiry unknown; the provider then
    // relies on the service rejecting the token to trigger re-authentication.
    // Oversized lifetimes saturate to the far future.
    let expiry = match response.expires_in {
        Some(secs) if secs > 0 => Utc::now().timestamp().saturating_add(secs),
        _ => 0,
    };

    session.store_token(store, access_token, expiry)?;

    tracing::info!(expiry = expiry, "Service account authentication successful");
    Ok(())
}
