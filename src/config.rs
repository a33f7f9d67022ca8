use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{Confirm, Input, Password};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, SettingsError};
use crate::provider::ProviderOptions;
use crate::session::{FileSettingsStore, SessionState, SettingsStore};

/// Settings file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "cyberark-wpm.json";

/// Directory name under the platform config dir
const CONFIG_DIR_NAME: &str = "summon-wpm";

/// CyberArk Workload Password Management provider for Summon
///
/// Prints the password stored for APP_ID to stdout.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Application id to fetch the password for
    #[arg(required_unless_present_any = ["configure", "login"])]
    pub app_id: Option<String>,

    /// Run the configuration wizard
    #[arg(long = "config")]
    pub configure: bool,

    /// Log in to CyberArk Identity and cache the token
    #[arg(long)]
    pub login: bool,

    /// Enable verbose output on stderr
    #[arg(long)]
    pub verbose: bool,

    /// Directory holding the settings file
    #[arg(long, env = "SUMMON_WPM_CONFIG_DIR")]
    pub config_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "SUMMON_WPM_HTTP_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// Lifetime assumed for interactively issued tokens, in seconds
    #[arg(long, env = "SUMMON_WPM_INTERACTIVE_TOKEN_TTL", default_value = "3600")]
    pub interactive_token_ttl: u64,
}

/// What the process was asked to do
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Run the configuration wizard
    Configure,
    /// Authenticate and cache the token
    Login,
    /// Print the secret for an app id
    Resolve(String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub command: Command,
    pub settings_file: PathBuf,
    pub log_level: String,
    pub verbose: bool,
    pub http_timeout: Duration,
    pub interactive_token_ttl: Duration,
}

impl Config {
    /// Load configuration with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_args(CliArgs::parse())
    }

    /// Build the configuration from parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let command = if args.configure {
            Command::Configure
        } else if args.login {
            Command::Login
        } else {
            Command::Resolve(args.app_id.context("APP_ID is required")?)
        };

        let config_dir = match args.config_dir {
            Some(dir) if !dir.is_empty() => expand_tilde(&dir),
            _ => default_config_dir().context("Could not determine the user config directory")?,
        };

        Ok(Config {
            command,
            settings_file: config_dir.join(CONFIG_FILE_NAME),
            log_level: if args.verbose {
                "debug".to_string()
            } else {
                args.log_level
            },
            verbose: args.verbose,
            http_timeout: Duration::from_secs(args.http_timeout),
            interactive_token_ttl: Duration::from_secs(args.interactive_token_ttl),
        })
    }

    /// Options handed to the credential provider
    pub fn provider_options(&self) -> ProviderOptions {
        ProviderOptions {
            interactive_token_ttl: self.interactive_token_ttl,
        }
    }
}

/// `$XDG_CONFIG_HOME/summon-wpm`, else `~/.config/summon-wpm`, on every platform
fn default_config_dir() -> Option<PathBuf> {
    config_dir_from(std::env::var_os("XDG_CONFIG_HOME"), dirs::home_dir())
}

fn config_dir_from(xdg_config_home: Option<OsString>, home: Option<PathBuf>) -> Option<PathBuf> {
    match xdg_config_home {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir).join(CONFIG_DIR_NAME)),
        _ => home.map(|home| home.join(".config").join(CONFIG_DIR_NAME)),
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// === Configuration Wizard ===

/// Interactively collect tenant and identity settings and save them
///
/// Current values are offered as defaults. The cached token is dropped when
/// the identity it was issued to changes.
pub fn run_config_wizard(store: &FileSettingsStore) -> Result<SessionState> {
    eprintln!("CyberArk Workload Password Management (WPM) Configuration");
    eprintln!("===================================================");

    let existing = match store.load() {
        Ok(session) => {
            eprintln!("Loaded existing configuration. Press Enter to keep current values.");
            Some(session)
        }
        Err(Error::Settings(SettingsError::NotFound { .. })) => None,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable configuration");
            None
        }
    };
    let current = existing.unwrap_or_default();
    let mut session = current.clone();

    session.tenant_url = prompt_with_default("Tenant URL", &current.tenant_url)?;
    session.username = prompt_with_default("Username", &current.username)?;

    let use_service = Confirm::new()
        .with_prompt("Do you want to configure a service account (client credentials)?")
        .default(!current.client_id.is_empty())
        .interact()?;

    if use_service {
        session.client_id = prompt_with_default("Client ID", &current.client_id)?;

        let prompt = if current.client_secret.is_empty() {
            "Client Secret".to_string()
        } else {
            format!("Client Secret [{}]", mask_secret(&current.client_secret))
        };
        let client_secret = Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()?;
        if !client_secret.is_empty() {
            session.client_secret = client_secret;
        }
    }

    apply_identity_change(&current, &mut session);

    store.save(&session)?;

    eprintln!("Configuration saved to: {}", store.path().display());
    eprintln!("Run with --login to authenticate now");

    Ok(session)
}

fn prompt_with_default(prompt: &str, current: &str) -> Result<String> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if current.is_empty() {
        input = input.allow_empty(true);
    } else {
        input = input.default(current.to_string());
    }
    let value = input.interact_text()?;
    Ok(value.trim().to_string())
}

/// Clear the cached token if it was issued to a different identity
fn apply_identity_change(before: &SessionState, after: &mut SessionState) {
    let changed = before.tenant_url != after.tenant_url
        || before.username != after.username
        || before.client_id != after.client_id
        || before.client_secret != after.client_secret;

    if changed && !after.auth_token.is_empty() {
        tracing::debug!("Identity changed, discarding cached token");
        after.clear_token();
    }
}

/// Mask a secret for display
fn mask_secret(s: &str) -> &'static str {
    if s.is_empty() {
        ""
    } else {
        "********"
    }
}
