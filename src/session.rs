// Session state and settings persistence
// The settings file holds the tenant, identity and the single cached bearer token

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SettingsError};

/// Everything the provider knows between invocations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Base URL of the identity tenant
    #[serde(default)]
    pub tenant_url: String,

    /// Human user for interactive login
    #[serde(default)]
    pub username: String,

    /// Service account id for the client-credentials grant
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_id: String,

    /// Service account secret for the client-credentials grant
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_secret: String,

    /// Bearer token; empty means no valid token
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auth_token: String,

    /// Unix timestamp at which the token expires; 0 means no known expiry
    #[serde(default, skip_serializing_if = "is_zero")]
    pub token_expiry: i64,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl SessionState {
    /// Service account id and secret, if both are configured
    pub fn service_credentials(&self) -> Option<(&str, &str)> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            None
        } else {
            Some((&self.client_id, &self.client_secret))
        }
    }

    /// Check whether a token must be acquired before fetching credentials
    pub fn needs_authentication(&self) -> bool {
        self.needs_authentication_at(Utc::now().timestamp())
    }

    /// Same as [`needs_authentication`](Self::needs_authentication) against an explicit clock
    pub fn needs_authentication_at(&self, now: i64) -> bool {
        self.auth_token.is_empty() || (self.token_expiry > 0 && now > self.token_expiry)
    }

    /// Fail early if the session cannot address the identity service
    pub fn validate(&self) -> Result<()> {
        if self.tenant_url.trim().is_empty() {
            return Err(SettingsError::Incomplete("tenant_url").into());
        }
        Ok(())
    }

    /// Drop the cached token, e.g. after the identity it belonged to changed
    pub fn clear_token(&mut self) {
        self.auth_token.clear();
        self.token_expiry = 0;
    }

    /// Persist a freshly issued token, then adopt it
    ///
    /// The in-memory state is only updated once the store accepted the write,
    /// so a failed save leaves both copies at their previous values.
    pub fn store_token<S: SettingsStore + ?Sized>(
        &mut self,
        store: &S,
        token: String,
        expiry: i64,
    ) -> Result<()> {
        let mut updated = self.clone();
        updated.auth_token = token;
        updated.token_expiry = expiry;

        store.save(&updated)?;
        tracing::debug!(expiry = expiry, "Persisted new bearer token");

        *self = updated;
        Ok(())
    }
}

/// Load/save capability for the session
pub trait SettingsStore {
    /// Load the persisted session
    fn load(&self) -> Result<SessionState>;

    /// Persist the session; a partial write must never be observable
    fn save(&self, session: &SessionState) -> Result<()>;
}

impl<S: SettingsStore + ?Sized> SettingsStore for &S {
    fn load(&self) -> Result<SessionState> {
        (**self).load()
    }

    fn save(&self, session: &SessionState) -> Result<()> {
        (**self).save(session)
    }
}

/// Settings stored as a pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    /// Create a store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the settings file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist_error(&self, source: std::io::Error) -> SettingsError {
        SettingsError::Persist {
            path: self.path.clone(),
            source,
        }
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<SessionState> {
        let data = fs::read(&self.path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                SettingsError::NotFound {
                    path: self.path.clone(),
                }
            } else {
                SettingsError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        let session = serde_json::from_slice(&data).map_err(|source| SettingsError::Parse { source })?;
        Ok(session)
    }

    fn save(&self, session: &SessionState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        create_private_dir(dir).map_err(|e| self.persist_error(e))?;

        let data = serde_json::to_vec_pretty(session)
            .map_err(|e| self.persist_error(std::io::Error::new(ErrorKind::InvalidData, e)))?;

        // Temp file in the same directory so the rename stays on one filesystem.
        // NamedTempFile is created with mode 0600 on unix.
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.persist_error(e))?;
        tmp.write_all(&data).map_err(|e| self.persist_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.persist_error(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.persist_error(e.error))?;

        Ok(())
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;
    use proptest::prelude::*;
    use std::cell::{Cell, RefCell};

    /// In-memory store that counts saves and can be told to reject them
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub(crate) session: RefCell<Option<SessionState>>,
        pub(crate) saves: Cell<usize>,
        pub(crate) fail_saves: Cell<bool>,
    }

    impl MemoryStore {
        pub(crate) fn with(session: SessionState) -> Self {
            Self {
                session: RefCell::new(Some(session)),
                ..Default::default()
            }
        }

        pub(crate) fn saved(&self) -> SessionState {
            self.session.borrow().clone().expect("nothing saved")
        }
    }

    impl SettingsStore for MemoryStore {
        fn load(&self) -> Result<SessionState> {
            self.session.borrow().clone().ok_or_else(|| {
                SettingsError::NotFound {
                    path: PathBuf::from("memory"),
                }
                .into()
            })
        }

        fn save(&self, session: &SessionState) -> Result<()> {
            if self.fail_saves.get() {
                return Err(SettingsError::Persist {
                    path: PathBuf::from("memory"),
                    source: std::io::Error::new(ErrorKind::PermissionDenied, "read-only"),
                }
                .into());
            }
            self.saves.set(self.saves.get() + 1);
            *self.session.borrow_mut() = Some(session.clone());
            Ok(())
        }
    }

    fn session_with_token(token: &str, expiry: i64) -> SessionState {
        SessionState {
            tenant_url: "https://t.example".to_string(),
            username: "user@example.com".to_string(),
            auth_token: token.to_string(),
            token_expiry: expiry,
            ..Default::default()
        }
    }

    proptest! {
        #[test]
        fn test_empty_token_always_needs_auth(expiry in any::<i64>(), now in any::<i64>()) {
            prop_assert!(session_with_token("", expiry).needs_authentication_at(now));
        }

        #[test]
        fn test_zero_expiry_never_expires(now in any::<i64>()) {
            prop_assert!(!session_with_token("tok", 0).needs_authentication_at(now));
        }

        #[test]
        fn test_expiry_relative_to_now(now in 1_000i64..4_000_000_000, delta in 1i64..1_000_000) {
            prop_assert!(session_with_token("tok", now - delta).needs_authentication_at(now));
            prop_assert!(!session_with_token("tok", now + delta).needs_authentication_at(now));
        }
    }

    #[test]
    fn test_needs_authentication_wall_clock() {
        let now = Utc::now().timestamp();
        assert!(session_with_token("tok", now - 3600).needs_authentication());
        assert!(!session_with_token("tok", now + 3600).needs_authentication());
    }

    #[test]
    fn test_service_credentials() {
        let mut session = session_with_token("", 0);
        assert_eq!(session.service_credentials(), None);

        session.client_id = "abc".to_string();
        assert_eq!(session.service_credentials(), None);

        session.client_secret = "xyz".to_string();
        assert_eq!(session.service_credentials(), Some(("abc", "xyz")));
    }

    #[test]
    fn test_validate_requires_tenant() {
        let mut session = SessionState::default();
        assert!(matches!(
            session.validate(),
            Err(Error::Settings(SettingsError::Incomplete("tenant_url")))
        ));

        session.tenant_url = "https://t.example".to_string();
        assert!(session.validate().is_ok());
    }

    #[test]
    fn test_store_token_persists_then_updates() {
        let store = MemoryStore::default();
        let mut session = session_with_token("", 0);

        session.store_token(&store, "tok1".to_string(), 42).unwrap();

        assert_eq!(session.auth_token, "tok1");
        assert_eq!(session.token_expiry, 42);
        assert_eq!(store.saved(), session);
        assert_eq!(store.saves.get(), 1);
    }

    #[test]
    fn test_store_token_failed_save_leaves_state() {
        let store = MemoryStore::default();
        store.fail_saves.set(true);
        let mut session = session_with_token("old", 7);

        let err = session
            .store_token(&store, "new".to_string(), 42)
            .unwrap_err();

        assert!(matches!(err, Error::Settings(SettingsError::Persist { .. })));
        assert_eq!(session.auth_token, "old");
        assert_eq!(session.token_expiry, 7);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("nested").join("cyberark-wpm.json"));

        let session = SessionState {
            tenant_url: "https://t.example".to_string(),
            username: "user@example.com".to_string(),
            client_id: "abc".to_string(),
            client_secret: "xyz".to_string(),
            auth_token: "tok1".to_string(),
            token_expiry: 1_900_000_000,
        };

        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), session);
    }

    #[test]
    fn test_file_store_omits_empty_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("cyberark-wpm.json"));

        store.save(&session_with_token("", 0)).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        let object = raw.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["tenant_url"], "https://t.example");
        assert_eq!(object["username"], "user@example.com");
    }

    #[test]
    fn test_file_store_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("missing.json"));

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::Settings(SettingsError::NotFound { .. })));
        assert!(err.to_string().contains("Run with --config"));
    }

    #[test]
    fn test_file_store_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cyberark-wpm.json");
        fs::write(&path, "{ not json").unwrap();

        let err = FileSettingsStore::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::Settings(SettingsError::Parse { .. })));
        assert!(err.to_string().starts_with("invalid config file format"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_private_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("cfg").join("cyberark-wpm.json"));
        store.save(&session_with_token("tok", 0)).unwrap();

        let file_mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);

        let dir_mode = fs::metadata(dir.path().join("cfg")).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }
}
