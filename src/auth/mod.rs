// Authentication module
// Token acquisition (service account and interactive) and credential fetching

pub mod credentials;
pub mod interactive;
pub mod service;
pub mod types;

pub use interactive::DEFAULT_INTERACTIVE_TOKEN_TTL;
