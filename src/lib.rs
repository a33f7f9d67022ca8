// Summon WPM provider - Library root for testing

pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod provider;
pub mod session;
pub mod terminal;
