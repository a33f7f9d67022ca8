// Identity service wire types

use serde::{Deserialize, Serialize};

/// Begins an interactive authentication session
pub const START_AUTH_ENDPOINT: &str = "/Security/StartAuthentication";

/// Answers one challenge of an interactive session
pub const ADVANCE_AUTH_ENDPOINT: &str = "/Security/AdvanceAuthentication";

/// OAuth2 client-credentials token endpoint
pub const TOKEN_ENDPOINT: &str = "/oauth2/token";

/// Resolves an app id to its stored credential
pub const GET_APP_CREDS_ENDPOINT: &str = "/UserMgmt/GetAppCreds";

/// Protocol version sent with StartAuthentication
pub const START_AUTH_VERSION: &str = "1.0";

/// StartAuthentication request
#[derive(Debug, Serialize)]
pub struct StartAuthRequest<'a> {
    #[serde(rename = "User")]
    pub user: &'a str,
    #[serde(rename = "Version")]
    pub version: &'a str,
}

/// StartAuthentication response
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartAuthResponse {
    pub success: bool,
    #[serde(rename = "SessionId")]
    pub session_id: Option<String>,
    #[serde(rename = "Challenges")]
    pub challenges: Option<Vec<Challenge>>,
    #[serde(flatten)]
    pub failure: ServiceFailure,
}

/// One authentication stage; any of its mechanisms satisfies it
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Challenge {
    #[serde(rename = "Mechanisms")]
    pub mechanisms: Option<Vec<Mechanism>>,
}

/// A second-factor method offered by the identity service
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Mechanism {
    #[serde(rename = "MechanismId")]
    pub mechanism_id: String,
    #[serde(rename = "Name")]
    pub name: String,
}

/// AdvanceAuthentication request
#[derive(Debug, Serialize)]
pub struct AdvanceAuthRequest<'a> {
    #[serde(rename = "SessionId")]
    pub session_id: &'a str,
    #[serde(rename = "MechanismId")]
    pub mechanism_id: &'a str,
    #[serde(rename = "Answer")]
    pub answer: &'a str,
}

/// AdvanceAuthentication response
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AdvanceAuthResponse {
    pub success: bool,
    #[serde(rename = "Token")]
    pub token: Option<String>,
    #[serde(flatten)]
    pub failure: ServiceFailure,
}

/// OAuth2 token response
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// GetAppCreds request
#[derive(Debug, Serialize)]
pub struct AppCredRequest<'a> {
    #[serde(rename = "AppID")]
    pub app_id: &'a str,
}

/// GetAppCreds response
///
/// The secret is either the flat `Password` field or a key inside a `Result` object.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppCredResponse {
    pub success: bool,
    #[serde(rename = "Password")]
    pub password: Option<String>,
    #[serde(rename = "Result")]
    pub result: Option<serde_json::Value>,
    #[serde(flatten)]
    pub failure: ServiceFailure,
}

/// Error text attached to a `success: false` response
///
/// Older tenants report `ErrorMsg`, newer ones `Message`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServiceFailure {
    #[serde(rename = "ErrorMsg")]
    pub error_msg: Option<String>,
    #[serde(rename = "Message")]
    pub message: Option<String>,
}

impl ServiceFailure {
    /// Service-reported error text, or a fallback when the service gave none
    pub fn describe(&self) -> String {
        [&self.error_msg, &self.message]
            .into_iter()
            .flatten()
            .find(|m| !m.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| "no error message provided".to_string())
    }
}
