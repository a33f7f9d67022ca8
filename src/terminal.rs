// Terminal interaction
// Prompts render on stderr so stdout only ever carries the resolved secret

use std::io::IsTerminal;

use dialoguer::{Input, Password};

use crate::error::Result;

/// Console capability used by interactive login
pub trait Terminal {
    /// Whether a human can answer prompts
    fn is_interactive(&self) -> bool;

    /// Show an informational line
    fn show(&self, line: &str);

    /// Read a line of input
    fn read_line(&self, prompt: &str) -> Result<String>;

    /// Read a line of input without echoing it
    fn read_secret(&self, prompt: &str) -> Result<String>;
}

impl<T: Terminal + ?Sized> Terminal for &T {
    fn is_interactive(&self) -> bool {
        (**self).is_interactive()
    }

    fn show(&self, line: &str) {
        (**self).show(line)
    }

    fn read_line(&self, prompt: &str) -> Result<String> {
        (**self).read_line(prompt)
    }

    fn read_secret(&self, prompt: &str) -> Result<String> {
        (**self).read_secret(prompt)
    }
}

/// The process's own terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleTerminal;

impl Terminal for ConsoleTerminal {
    /// Prompts read stdin and render on stderr, so both must be terminals
    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
    }

    fn show(&self, line: &str) {
        eprintln!("{}", line);
    }

    fn read_line(&self, prompt: &str) -> Result<String> {
        let line: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(line)
    }

    fn read_secret(&self, prompt: &str) -> Result<String> {
        let secret = Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()?;
        Ok(secret)
    }
}
