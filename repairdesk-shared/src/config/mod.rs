//! Configuration module
//!
//! Resolves client configuration from defaults, files, and the environment.

pub mod client;
