// Error handling module
// Defines the error taxonomy shared by every component of the provider

use std::fmt;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Which token acquisition path produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Client-credentials grant with a service account
    ServiceAccount,

    /// Multi-factor challenge/response with a human user
    Interactive,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::ServiceAccount => f.write_str("service user"),
            AuthMode::Interactive => f.write_str("interactive"),
        }
    }
}

/// Errors raised while loading or persisting the settings file
#[derive(Error, Debug)]
pub enum SettingsError {
    /// No settings file at the resolved location
    #[error("no configuration found at {}. Run with --config to set up", path.display())]
    NotFound { path: PathBuf },

    /// The settings file exists but is not valid JSON for a session
    #[error("invalid config file format: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },

    /// A field required before talking to the identity service is empty
    #[error("configuration is incomplete: {0} is not set. Run with --config to set up")]
    Incomplete(&'static str),

    /// Reading the settings file failed for a reason other than absence
    #[error("error loading config from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the settings file failed; the previous file is left intact
    #[error("failed to save config to {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while resolving a credential
#[derive(Error, Debug)]
pub enum Error {
    /// Network failure or timeout before any HTTP status was received
    #[error("{operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status
    #[error("request failed with status: {0}")]
    HttpStatus(StatusCode),

    /// 401 on an authenticated request; the only error that triggers re-authentication
    #[error("authentication failed: token expired or invalid")]
    AuthExpired,

    /// Response body parsed but did not have the expected shape
    #[error("{0}")]
    Protocol(String),

    /// Response body was not valid JSON for the expected message
    #[error("error parsing {what} response: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid answer to an interactive prompt
    #[error("invalid selection: {0}")]
    UserInput(String),

    /// Reading from the terminal failed
    #[error("error reading input: {0}")]
    Prompt(#[from] dialoguer::Error),

    /// Missing or malformed settings
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Authentication is needed but no acquisition path is usable
    #[error("authentication required but running in non-interactive mode with no service credentials")]
    ModeUnavailable,

    /// HTTP client could not be constructed
    #[error("failed to create HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// A token acquisition path failed
    #[error("{mode} authentication failed: {source}")]
    Authentication {
        mode: AuthMode,
        #[source]
        source: Box<Error>,
    },

    /// The single re-authentication after a rejected token failed
    #[error("re-authentication failed: {0}")]
    Reauthentication(#[source] Box<Error>),
}

impl Error {
    /// Wrap an acquisition failure with the mode that produced it
    pub fn authentication(mode: AuthMode, source: Error) -> Self {
        Error::Authentication {
            mode,
            source: Box::new(source),
        }
    }

    /// Whether the identity service rejected the bearer token
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Error::AuthExpired)
    }
}

/// Result type alias for provider operations
pub type Result<T> = std::result::Result<T, Error>;
