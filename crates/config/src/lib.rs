//! Configuration loading for the memochat client.
//!
//! Uses figment for YAML-based configuration with sensible defaults and
//! `MEMOCHAT_`-prefixed environment overrides.

pub mod schema;

pub use schema::{Config, LogConfig, LogFormat, RetryConfig, RetryStrategy};
