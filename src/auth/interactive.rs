// Interactive multi-factor authentication
//
// START -> CHALLENGE_RECEIVED -> MECHANISM_SELECTED -> ADVANCED
// Only the first challenge returned by StartAuthentication is presented.

use std::time::Duration;

use chrono::Utc;
use reqwest::Method;

use super::types::{
    AdvanceAuthRequest, AdvanceAuthResponse, Mechanism, StartAuthRequest, StartAuthResponse,
    ADVANCE_AUTH_ENDPOINT, START_AUTH_ENDPOINT, START_AUTH_VERSION,
};
use crate::error::{Error, Result};
use crate::http_client::{ApiRequest, RequestBody, Transport};
use crate::session::{SessionState, SettingsStore};
use crate::terminal::Terminal;

/// Lifetime assumed for interactively issued tokens when not configured otherwise
pub const DEFAULT_INTERACTIVE_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// An open challenge/response exchange
///
/// Consumed by exactly one [`advance`] call.
#[derive(Debug)]
pub struct ChallengeSession {
    pub session_id: String,
    pub mechanisms: Vec<Mechanism>,
}

/// Log in as the session's user, prompting on `terminal`
///
/// Assumes the caller already established that a human is attached. The
/// service does not report a lifetime for these tokens, so `token_ttl` is
/// used as the expiry window.
pub fn authenticate<R, T, S>(
    transport: &R,
    terminal: &T,
    store: &S,
    session: &mut SessionState,
    token_ttl: Duration,
) -> Result<()>
where
    R: Transport + ?Sized,
    T: Terminal + ?Sized,
    S: SettingsStore + ?Sized,
{
    let challenge = start(transport, session)?;
    let mechanism = select_mechanism(terminal, &challenge)?.clone();
    let answer = read_answer(terminal, &mechanism)?;
    let token = advance(transport, session, challenge, &mechanism, &answer)?;

    let ttl = i64::try_from(token_ttl.as_secs()).unwrap_or(i64::MAX);
    let expiry = Utc::now().timestamp().saturating_add(ttl);
    session.store_token(store, token, expiry)?;

    tracing::info!(expiry = expiry, "Interactive authentication successful");
    Ok(())
}

/// START: open an authentication session for the configured user
pub fn start<R: Transport + ?Sized>(
    transport: &R,
    session: &SessionState,
) -> Result<ChallengeSession> {
    tracing::debug!(user = %session.username, "Starting interactive authentication");

    let request = ApiRequest {
        operation: "start authentication request",
        method: Method::POST,
        path: START_AUTH_ENDPOINT,
        body: json_body(&StartAuthRequest {
            user: &session.username,
            version: START_AUTH_VERSION,
        })?,
        authenticated: false,
    };

    let body = transport.send(session, &request)?;
    let response: StartAuthResponse =
        serde_json::from_slice(&body).map_err(|source| Error::Decode {
            what: "start auth",
            source,
        })?;

    if !response.success {
        return Err(Error::Protocol(format!(
            "start authentication failed: {}",
            response.failure.describe()
        )));
    }

    let session_id = response
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Protocol("no session id received".to_string()))?;

    let challenge = response
        .challenges
        .and_then(|challenges| challenges.into_iter().next())
        .ok_or_else(|| Error::Protocol("no authentication challenges received".to_string()))?;

    let mechanisms = challenge.mechanisms.unwrap_or_default();
    if mechanisms.is_empty() {
        return Err(Error::Protocol(
            "no authentication mechanisms available".to_string(),
        ));
    }

    Ok(ChallengeSession {
        session_id,
        mechanisms,
    })
}

/// CHALLENGE_RECEIVED: list the mechanisms and read a 1-based choice
///
/// Out-of-range or non-numeric input fails immediately; the prompt is not repeated.
pub fn select_mechanism<'a, T: Terminal + ?Sized>(
    terminal: &T,
    challenge: &'a ChallengeSession,
) -> Result<&'a Mechanism> {
    terminal.show("Available authentication mechanisms:");
    for (i, mechanism) in challenge.mechanisms.iter().enumerate() {
        terminal.show(&format!("{}. {}", i + 1, mechanism.name));
    }

    let count = challenge.mechanisms.len();
    let input = terminal.read_line(&format!("Select mechanism (1-{})", count))?;

    input
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=count).contains(n))
        .map(|n| &challenge.mechanisms[n - 1])
        .ok_or_else(|| {
            Error::UserInput(format!(
                "{:?} is not a number between 1 and {}",
                input.trim(),
                count
            ))
        })
}

/// MECHANISM_SELECTED: read the answer, hidden for password mechanisms
pub fn read_answer<T: Terminal + ?Sized>(terminal: &T, mechanism: &Mechanism) -> Result<String> {
    if is_password_mechanism(mechanism) {
        terminal.read_secret("Enter your response")
    } else {
        Ok(terminal.read_line("Enter your response")?.trim().to_string())
    }
}

/// ADVANCED: submit the answer and return the issued token
pub fn advance<R: Transport + ?Sized>(
    transport: &R,
    session: &SessionState,
    challenge: ChallengeSession,
    mechanism: &Mechanism,
    answer: &str,
) -> Result<String> {
    tracing::debug!(
        mechanism = %mechanism.name,
        "Advancing interactive authentication"
    );

    let request = ApiRequest {
        operation: "advance authentication request",
        method: Method::POST,
        path: ADVANCE_AUTH_ENDPOINT,
        body: json_body(&AdvanceAuthRequest {
            session_id: &challenge.session_id,
            mechanism_id: &mechanism.mechanism_id,
            answer,
        })?,
        authenticated: false,
    };

    let body = transport.send(session, &request)?;
    let response: AdvanceAuthResponse =
        serde_json::from_slice(&body).map_err(|source| Error::Decode {
            what: "advance auth",
            source,
        })?;

    if !response.success {
        return Err(Error::Protocol(format!(
            "advance authentication failed: {}",
            response.failure.describe()
        )));
    }

    response
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Protocol("no token in advance authentication response".to_string()))
}

fn is_password_mechanism(mechanism: &Mechanism) -> bool {
    mechanism.name.to_lowercase().contains("password")
}

fn json_body<T: serde::Serialize>(value: &T) -> Result<RequestBody> {
    serde_json::to_value(value)
        .map(RequestBody::Json)
        .map_err(|source| Error::Decode {
            what: "request",
            source,
        })
}
