// ABOUTME: Wiring for casestore: configuration from the environment and the LocalServices bundle.
// ABOUTME: One store is built explicitly and shared with the resolver and recorders; no globals.

pub mod config;
pub mod services;

pub use config::{ConfigError, ServicesConfig};
pub use services::{LocalServices, RetentionReport};
