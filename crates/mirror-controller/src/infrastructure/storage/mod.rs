//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration from an explicit
//! path or the platform-appropriate directory, writes it back, and supplies
//! defaults when no file exists yet.

pub mod config;
