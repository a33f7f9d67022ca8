// Credential fetching
// Resolves an app id to its stored secret using the session's bearer token

use reqwest::Method;

use super::types::{AppCredRequest, AppCredResponse, GET_APP_CREDS_ENDPOINT};
use crate::error::{Error, Result};
use crate::http_client::{ApiRequest, RequestBody, Transport};
use crate::session::SessionState;

/// Keys probed inside a `Result` object when the flat `Password` field is absent
const RESULT_SECRET_KEYS: &[&str] = &["Password", "password", "Secret", "secret", "Value", "value"];

/// Fetch the secret stored for `app_id`
///
/// Token expiry is not checked here. A rejected token surfaces as
/// [`Error::AuthExpired`], distinct from every other failure.
pub fn fetch<R: Transport + ?Sized>(
    transport: &R,
    session: &SessionState,
    app_id: &str,
) -> Result<String> {
    tracing::debug!(app_id = %app_id, "Fetching app credentials");

    let body = serde_json::to_value(AppCredRequest { app_id }).map_err(|source| {
        Error::Decode {
            what: "request",
            source,
        }
    })?;

    let request = ApiRequest {
        operation: "app credentials request",
        method: Method::POST,
        path: GET_APP_CREDS_ENDPOINT,
        body: RequestBody::Json(body),
        authenticated: true,
    };

    let body = transport.send(session, &request)?;
    let response: AppCredResponse =
        serde_json::from_slice(&body).map_err(|source| Error::Decode {
            what: "app cred",
            source,
        })?;

    extract_secret(response)
}

/// Pull the secret out of either response shape
///
/// The flat `Password` field wins; otherwise a `Result` object is probed for
/// the keys in [`RESULT_SECRET_KEYS`].
fn extract_secret(response: AppCredResponse) -> Result<String> {
    if !response.success {
        return Err(Error::Protocol(format!(
            "get app credentials failed: {}",
            response.failure.describe()
        )));
    }

    if let Some(password) = response.password.filter(|p| !p.is_empty()) {
        return Ok(password);
    }

    if let Some(serde_json::Value::Object(result)) = &response.result {
        let found = RESULT_SECRET_KEYS
            .iter()
            .find_map(|key| {
                result
                    .get(*key)
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
            });

        if let Some(secret) = found {
            return Ok(secret.to_string());
        }

        // Key names only, never values
        tracing::debug!(
            keys = ?result.keys().collect::<Vec<_>>(),
            "No secret field in app credentials result"
        );
    }

    Err(Error::Protocol(
        "no secret value in app credentials response".to_string(),
    ))
}
