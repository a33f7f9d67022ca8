use anyhow::{Context, Result};
use std::io::Write;
use std::process::ExitCode;

use summon_wpm::config::{self, Command, Config};
use summon_wpm::error::{Error, SettingsError};
use summon_wpm::http_client::HttpTransport;
use summon_wpm::provider::CredentialProvider;
use summon_wpm::session::{FileSettingsStore, SettingsStore};
use summon_wpm::terminal::ConsoleTerminal;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", error_chain(&e));
            ExitCode::FAILURE
        }
    }
}

/// Join the error and its causes, skipping causes the message already spells out
fn error_chain(err: &anyhow::Error) -> String {
    let mut message = err.to_string();
    for cause in err.chain().skip(1) {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
    }
    message
}

fn run() -> Result<()> {
    let config = Config::load()?;

    // Initialize logging on stderr; stdout is reserved for the secret
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!(settings = %config.settings_file.display(), "Configuration loaded");

    let store = FileSettingsStore::new(&config.settings_file);

    match &config.command {
        Command::Configure => {
            config::run_config_wizard(&store)?;
        }
        Command::Login => {
            // First login on a fresh machine goes through the wizard
            if let Err(Error::Settings(SettingsError::NotFound { .. })) = store.load() {
                config::run_config_wizard(&store)?;
            }

            let provider = build_provider(&config, &store)?;
            provider.login()?;
            println!("Authentication successful");
        }
        Command::Resolve(app_id) => {
            if config.verbose {
                eprintln!("Looking up app credentials for: {}", app_id);
            }

            let provider = build_provider(&config, &store)?;
            let secret = provider.resolve(app_id)?;

            // Summon reads the value verbatim, so no trailing newline
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(secret.as_bytes())
                .and_then(|_| stdout.flush())
                .context("Failed to write secret to stdout")?;
        }
    }

    Ok(())
}

fn build_provider<'a>(
    config: &Config,
    store: &'a FileSettingsStore,
) -> Result<CredentialProvider<&'a FileSettingsStore, ConsoleTerminal, HttpTransport>> {
    let transport = HttpTransport::new(config.http_timeout)?;
    Ok(CredentialProvider::new(
        store,
        ConsoleTerminal,
        transport,
        config.provider_options(),
    ))
}
