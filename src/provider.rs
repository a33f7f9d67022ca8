// Credential provider
// Decides how to authenticate, then fetches the credential with one re-authentication retry

use std::time::Duration;

use crate::auth::{credentials, interactive, service, DEFAULT_INTERACTIVE_TOKEN_TTL};
use crate::error::{AuthMode, Error, Result};
use crate::http_client::Transport;
use crate::session::{SessionState, SettingsStore};
use crate::terminal::Terminal;

/// Tunables for the provider
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Expiry window assumed for interactively issued tokens
    pub interactive_token_ttl: Duration,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            interactive_token_ttl: DEFAULT_INTERACTIVE_TOKEN_TTL,
        }
    }
}

/// Resolves app ids to secrets
///
/// Collaborators are injected so tests can substitute the settings store,
/// the terminal and the transport.
pub struct CredentialProvider<S, T, R> {
    store: S,
    terminal: T,
    transport: R,
    options: ProviderOptions,
}

impl<S, T, R> CredentialProvider<S, T, R>
where
    S: SettingsStore,
    T: Terminal,
    R: Transport,
{
    pub fn new(store: S, terminal: T, transport: R, options: ProviderOptions) -> Self {
        Self {
            store,
            terminal,
            transport,
            options,
        }
    }

    /// Return the secret stored for `app_id`
    ///
    /// At most one re-authentication happens per call, and only when the
    /// service rejects the token while fetching.
    pub fn resolve(&self, app_id: &str) -> Result<String> {
        let mut session = self.store.load()?;
        session.validate()?;

        let interactive = self.terminal.is_interactive();

        if session.needs_authentication() {
            tracing::debug!("Authentication required, authenticating...");
            self.authenticate(&mut session, interactive)?;
        }

        match credentials::fetch(&self.transport, &session, app_id) {
            Err(e) if e.is_auth_expired() => {
                tracing::warn!("Authentication token expired or invalid, re-authenticating...");

                self.authenticate(&mut session, interactive)
                    .map_err(|e| Error::Reauthentication(Box::new(e)))?;

                credentials::fetch(&self.transport, &session, app_id)
            }
            result => result,
        }
    }

    /// Authenticate now and persist the token, regardless of the cached one
    pub fn login(&self) -> Result<SessionState> {
        let mut session = self.store.load()?;
        session.validate()?;

        let interactive = self.terminal.is_interactive();
        self.authenticate(&mut session, interactive)?;
        Ok(session)
    }

    /// Acquire a token with the mode-selection rule
    ///
    /// Service account first when configured, falling back to interactive
    /// login only when a human is attached.
    fn authenticate(&self, session: &mut SessionState, interactive: bool) -> Result<()> {
        if session.service_credentials().is_some() {
            match service::authenticate(&self.transport, &self.store, session) {
                Ok(()) => return Ok(()),
                Err(e) if interactive => {
                    tracing::warn!(
                        error = %e,
                        "Service user authentication failed, falling back to interactive login"
                    );
                }
                Err(e) => return Err(Error::authentication(AuthMode::ServiceAccount, e)),
            }
        } else if !interactive {
            return Err(Error::ModeUnavailable);
        }

        interactive::authenticate(
            &self.transport,
            &self.terminal,
            &self.store,
            session,
            self.options.interactive_token_ttl,
        )
        .map_err(|e| Error::authentication(AuthMode::Interactive, e))
    }
}
